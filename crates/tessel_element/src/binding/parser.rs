//! Binding token parser
//!
//! Scans a string for `{{…}}` and `[[…]]` tokens and compiles the last one
//! into a [`ParsedBinding`]. An unterminated token leaves the whole string
//! unbound.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, recognize},
    error::{context, VerboseError},
    multi::separated_list0,
    number::complete::double,
    sequence::{delimited, pair, preceded, separated_pair},
    IResult,
};
use tessel_core::Value;

use super::BindingMode;

type ParseResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

/// Where a binding reads its value from
#[derive(Clone, Debug, PartialEq)]
pub enum BindingSource {
    /// Property path, optionally negated (`!name`)
    Path { path: String, negate: bool },
    /// Property path written back when the target fires `event` (`name::event`)
    Event { path: String, event: String },
    /// Host method called with the argument values (`method(a, b)`)
    Call { method: String, args: Vec<BindingArg> },
}

/// Argument of a computed binding
#[derive(Clone, Debug, PartialEq)]
pub enum BindingArg {
    Property(String),
    Literal(Value),
}

/// Result of [`parse_binding`]
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedBinding {
    /// Token contents, trimmed
    pub expression: String,
    pub source: BindingSource,
    pub mode: BindingMode,
    /// Literal text before the token
    pub prefix: String,
    /// Literal text after the token
    pub suffix: String,
}

/// Parses the last binding token in `text`
pub fn parse_binding(text: &str) -> Option<ParsedBinding> {
    let mut cursor = 0;
    let mut last = None;
    loop {
        let rest = &text[cursor..];
        let (offset, mode, close) = match (rest.find("{{"), rest.find("[[")) {
            (None, None) => break,
            (Some(two), Some(one)) if one < two => (one, BindingMode::OneWay, "]]"),
            (Some(two), _) => (two, BindingMode::TwoWay, "}}"),
            (None, Some(one)) => (one, BindingMode::OneWay, "]]"),
        };
        let open = cursor + offset;
        let inner = open + 2;
        let length = text[inner..].find(close)?;
        last = Some((open, inner, inner + length, mode));
        cursor = inner + length + 2;
    }

    let (open, start, end, mode) = last?;
    let expression = text[start..end].trim();
    let source = match all_consuming(expression_source)(expression) {
        Ok((_, source)) => source,
        Err(err) => {
            tracing::trace!(expression, error = ?err, "unparsable binding expression");
            return None;
        }
    };
    Some(ParsedBinding {
        expression: expression.to_string(),
        source,
        mode,
        prefix: text[..open].to_string(),
        suffix: text[end + 2..].to_string(),
    })
}

/// `(click)` → `click`
pub fn parse_event_attribute(attribute: &str) -> Option<&str> {
    attribute
        .strip_prefix('(')?
        .strip_suffix(')')
        .filter(|event| !event.is_empty())
}

/// Method name of a listener attribute value: `onSave(event)` → `onSave`
pub fn handler_name(value: &str) -> String {
    let value = value.trim();
    value.split('(').next().unwrap_or(value).trim().to_string()
}

fn identifier(input: &str) -> ParseResult<&str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

fn path(input: &str) -> ParseResult<&str> {
    recognize(pair(
        identifier,
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$' || c == '.'),
    ))(input)
}

fn event_name(input: &str) -> ParseResult<&str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_')(input)
}

fn quoted(input: &str) -> ParseResult<&str> {
    alt((
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
    ))(input)
}

fn argument(input: &str) -> ParseResult<BindingArg> {
    context(
        "argument",
        alt((
            map(quoted, |s| BindingArg::Literal(Value::String(s.to_string()))),
            map(path, |p| BindingArg::Property(p.to_string())),
            map(double, |n| BindingArg::Literal(Value::Number(n))),
        )),
    )(input)
}

fn negated(input: &str) -> ParseResult<BindingSource> {
    map(preceded(pair(char('!'), multispace0), path), |p| {
        BindingSource::Path {
            path: p.to_string(),
            negate: true,
        }
    })(input)
}

fn event_channel(input: &str) -> ParseResult<BindingSource> {
    map(separated_pair(path, tag("::"), event_name), |(p, event)| {
        BindingSource::Event {
            path: p.to_string(),
            event: event.to_string(),
        }
    })(input)
}

fn call(input: &str) -> ParseResult<BindingSource> {
    let separator = delimited(multispace0, char(','), multispace0);
    map(
        pair(
            identifier,
            delimited(
                pair(char('('), multispace0),
                separated_list0(separator, argument),
                pair(multispace0, char(')')),
            ),
        ),
        |(method, args)| BindingSource::Call {
            method: method.to_string(),
            args,
        },
    )(input)
}

fn plain(input: &str) -> ParseResult<BindingSource> {
    map(path, |p| BindingSource::Path {
        path: p.to_string(),
        negate: false,
    })(input)
}

fn expression_source(input: &str) -> ParseResult<BindingSource> {
    context("binding expression", alt((negated, event_channel, call, plain)))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &str) -> BindingSource {
        parse_binding(text).unwrap().source
    }

    #[test]
    fn test_modes() {
        assert_eq!(parse_binding("{{name}}").unwrap().mode, BindingMode::TwoWay);
        assert_eq!(parse_binding("[[name]]").unwrap().mode, BindingMode::OneWay);
        assert!(parse_binding("plain text").is_none());
    }

    #[test]
    fn test_path_and_negation() {
        assert_eq!(
            source("[[ user.name ]]"),
            BindingSource::Path {
                path: "user.name".into(),
                negate: false
            }
        );
        assert_eq!(
            source("[[!hidden]]"),
            BindingSource::Path {
                path: "hidden".into(),
                negate: true
            }
        );
    }

    #[test]
    fn test_event_channel() {
        assert_eq!(
            source("{{value::value-changed}}"),
            BindingSource::Event {
                path: "value".into(),
                event: "value-changed".into()
            }
        );
    }

    #[test]
    fn test_computed() {
        assert_eq!(
            source("[[total(price, count, 'each', 2)]]"),
            BindingSource::Call {
                method: "total".into(),
                args: vec![
                    BindingArg::Property("price".into()),
                    BindingArg::Property("count".into()),
                    BindingArg::Literal(Value::from("each")),
                    BindingArg::Literal(Value::from(2)),
                ],
            }
        );
        assert_eq!(
            source("[[now()]]"),
            BindingSource::Call {
                method: "now".into(),
                args: vec![]
            }
        );
    }

    #[test]
    fn test_last_token_wins() {
        let parsed = parse_binding("{{a}} and [[b]]").unwrap();
        assert_eq!(parsed.expression, "b");
        assert_eq!(parsed.mode, BindingMode::OneWay);
        assert_eq!(parsed.prefix, "{{a}} and ");
        assert_eq!(parsed.suffix, "");
    }

    #[test]
    fn test_affixes() {
        let parsed = parse_binding("Hello {{name}}!").unwrap();
        assert_eq!(parsed.prefix, "Hello ");
        assert_eq!(parsed.suffix, "!");
    }

    #[test]
    fn test_unterminated_is_unbound() {
        assert!(parse_binding("{{name").is_none());
        assert!(parse_binding("[[a]] then {{b").is_none());
        assert!(parse_binding("{{}}").is_none());
        assert!(parse_binding("{{a b}}").is_none());
    }

    #[test]
    fn test_event_attributes() {
        assert_eq!(parse_event_attribute("(click)"), Some("click"));
        assert_eq!(parse_event_attribute("()"), None);
        assert_eq!(parse_event_attribute("click"), None);
        assert_eq!(handler_name(" onSave(event) "), "onSave");
        assert_eq!(handler_name("onSave"), "onSave");
    }
}
