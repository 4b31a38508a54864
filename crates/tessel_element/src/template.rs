//! Template markup
//!
//! Parses the HTML-like template of a component type into [`MarkupNode`]s
//! and materializes them into the host tree. Supports nested elements,
//! quoted, bare and valueless attributes, void elements, self-closing tags,
//! comments and character references. Whitespace-only text is dropped.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, multispace0, multispace1, satisfy},
    combinator::{all_consuming, map, opt, recognize},
    error::{context, VerboseError, VerboseErrorKind},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult,
};
use tessel_core::NodeId;

use crate::runtime::Runtime;

type ParseResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

/// Elements that never have children or a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkupNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

impl MarkupNode {
    pub fn tag(&self) -> Option<&str> {
        match self {
            MarkupNode::Element { tag, .. } => Some(tag.as_str()),
            MarkupNode::Text(_) => None,
        }
    }
}

/// Parses template markup. The error is a readable description of where
/// parsing stopped.
pub fn parse(markup: &str) -> Result<Vec<MarkupNode>, String> {
    match all_consuming(delimited(multispace0, nodes, multispace0))(markup.trim()) {
        Ok((_, nodes)) => Ok(nodes),
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => Err(format_verbose_error(&err)),
        Err(nom::Err::Incomplete(_)) => Err("incomplete markup".to_string()),
    }
}

fn format_verbose_error(err: &VerboseError<&str>) -> String {
    let parts: Vec<String> = err
        .errors
        .iter()
        .map(|(input, kind)| {
            let near: String = input.chars().take(20).collect();
            match kind {
                VerboseErrorKind::Context(ctx) => format!("in {ctx} near \"{near}\""),
                VerboseErrorKind::Char(c) => format!("expected '{c}' near \"{near}\""),
                VerboseErrorKind::Nom(kind) => format!("{kind:?} near \"{near}\""),
            }
        })
        .collect();
    if parts.is_empty() {
        "unknown parse error".to_string()
    } else {
        parts.join(", ")
    }
}

// ============================================================================
// Grammar
// ============================================================================

fn nodes(input: &str) -> ParseResult<Vec<MarkupNode>> {
    map(many0(alt((comment, map(element, Some), text))), |nodes| {
        nodes.into_iter().flatten().collect()
    })(input)
}

fn comment(input: &str) -> ParseResult<Option<MarkupNode>> {
    map(
        delimited(tag("<!--"), take_until("-->"), tag("-->")),
        |_| None,
    )(input)
}

fn text(input: &str) -> ParseResult<Option<MarkupNode>> {
    map(take_while1(|c: char| c != '<'), |raw: &str| {
        if raw.trim().is_empty() {
            None
        } else {
            Some(MarkupNode::Text(
                html_escape::decode_html_entities(raw).into_owned(),
            ))
        }
    })(input)
}

fn tag_name(input: &str) -> ParseResult<&str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'),
    ))(input)
}

fn attribute_name(input: &str) -> ParseResult<&str> {
    take_while1(|c: char| {
        !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'' | '<')
    })(input)
}

fn attribute_value(input: &str) -> ParseResult<&str> {
    alt((
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        take_while1(|c: char| !c.is_whitespace() && c != '>'),
    ))(input)
}

fn attribute(input: &str) -> ParseResult<(String, String)> {
    map(
        pair(
            attribute_name,
            opt(preceded(
                delimited(multispace0, char('='), multispace0),
                context("attribute value", attribute_value),
            )),
        ),
        |(name, value)| {
            (
                name.to_ascii_lowercase(),
                value
                    .map(|v| html_escape::decode_html_entities(v).into_owned())
                    .unwrap_or_default(),
            )
        },
    )(input)
}

fn element(input: &str) -> ParseResult<MarkupNode> {
    let (input, name) = preceded(char('<'), tag_name)(input)?;
    let name = name.to_ascii_lowercase();
    let (input, attributes) = many0(preceded(multispace1, attribute))(input)?;
    let (input, _) = multispace0(input)?;

    if let Ok((input, _)) = tag::<_, _, VerboseError<&str>>("/>")(input) {
        return Ok((input, leaf(name, attributes)));
    }
    let (input, _) = context("start tag", char('>'))(input)?;
    if VOID_ELEMENTS.contains(&name.as_str()) {
        return Ok((input, leaf(name, attributes)));
    }

    let (input, children) = nodes(input)?;
    let (input, close) = context("closing tag", preceded(tag("</"), tag_name))(input)?;
    if !close.eq_ignore_ascii_case(&name) {
        return Err(nom::Err::Failure(VerboseError {
            errors: vec![(input, VerboseErrorKind::Context("matching closing tag"))],
        }));
    }
    let (input, _) = preceded(multispace0, char('>'))(input)?;

    Ok((
        input,
        MarkupNode::Element {
            tag: name,
            attributes,
            children,
        },
    ))
}

fn leaf(tag: String, attributes: Vec<(String, String)>) -> MarkupNode {
    MarkupNode::Element {
        tag,
        attributes,
        children: Vec::new(),
    }
}

// ============================================================================
// Materialization
// ============================================================================

impl Runtime {
    /// Creates host nodes for `nodes` under `parent` and returns the
    /// top-level ones. Registered tags are instantiated but not connected;
    /// their attributes are decoded when the owner connects them.
    pub(crate) fn materialize(&mut self, nodes: &[MarkupNode], parent: NodeId) -> Vec<NodeId> {
        let mut created = Vec::with_capacity(nodes.len());
        for markup in nodes {
            let node = self.materialize_node(markup);
            self.host_mut().append_child(parent, node);
            created.push(node);
        }
        created
    }

    fn materialize_node(&mut self, markup: &MarkupNode) -> NodeId {
        match markup {
            MarkupNode::Text(text) => self.create_text(text),
            MarkupNode::Element {
                tag,
                attributes,
                children,
            } => {
                let node = self.create_element(tag);
                for (name, value) in attributes {
                    self.host_mut().set_attribute(node, name, value);
                }
                self.materialize(children, node);
                node
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::NodeKind;

    fn element(tag: &str, attributes: &[(&str, &str)], children: Vec<MarkupNode>) -> MarkupNode {
        MarkupNode::Element {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children,
        }
    }

    #[test]
    fn test_nested_elements() {
        let nodes = parse(r#"<div class="card"><span id='title'>{{title}}</span></div>"#).unwrap();
        assert_eq!(
            nodes,
            vec![element(
                "div",
                &[("class", "card")],
                vec![element(
                    "span",
                    &[("id", "title")],
                    vec![MarkupNode::Text("{{title}}".into())]
                )]
            )]
        );
    }

    #[test]
    fn test_attribute_forms() {
        let nodes = parse(r#"<input type=checkbox checked (change)="onChange" value="{{value::change}}">"#)
            .unwrap();
        assert_eq!(
            nodes,
            vec![element(
                "input",
                &[
                    ("type", "checkbox"),
                    ("checked", ""),
                    ("(change)", "onChange"),
                    ("value", "{{value::change}}"),
                ],
                vec![]
            )]
        );
    }

    #[test]
    fn test_void_and_self_closing() {
        let nodes = parse("<br><content/><p>a</p>").unwrap();
        let tags: Vec<_> = nodes.iter().filter_map(MarkupNode::tag).collect();
        assert_eq!(tags, vec!["br", "content", "p"]);
    }

    #[test]
    fn test_comments_whitespace_and_entities() {
        let nodes = parse("\n  <!-- header -->\n  <b>a &amp; b</b>\n  ").unwrap();
        assert_eq!(
            nodes,
            vec![element("b", &[], vec![MarkupNode::Text("a & b".into())])]
        );
    }

    #[test]
    fn test_rejects_broken_markup() {
        assert!(parse("<div><span></div>").is_err());
        assert!(parse("<div").is_err());
        assert!(parse("<div>").is_err());
    }

    #[test]
    fn test_materialize() {
        let mut rt = Runtime::headless();
        let parent = rt.create_element("section");
        let nodes = parse(r#"<ul><li id="first">one</li><li>two</li></ul>"#).unwrap();
        let created = rt.materialize(&nodes, parent);

        assert_eq!(created.len(), 1);
        let host = rt.host();
        assert_eq!(host.children(parent), created);
        let items = host.children(created[0]);
        assert_eq!(items.len(), 2);
        assert_eq!(host.attribute(items[0], "id").as_deref(), Some("first"));
        let text = host.children(items[1])[0];
        assert_eq!(host.kind(text), Some(NodeKind::Text));
        assert_eq!(host.text(text), "two");
    }
}
