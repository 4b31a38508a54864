//! Attribute codec
//!
//! Converts typed property values to attribute strings and back.
//!
//! - `boolean` is presence based: any present attribute decodes to `true`,
//!   an absent one to `false`, and `true` serializes to the empty string.
//! - Numeric types keep the `NaN`, `Infinity` and `-Infinity` sentinels and
//!   parse a leading numeric prefix (`"5px"` → `5`).
//! - `array`/`object` travel as JSON. Undecodable input falls back to a named
//!   global, then (arrays only) to a bracket-stripped comma split.
//! - Empty arrays and objects serialize to "no attribute".
//!
//! Decoding never fails: input that cannot be represented decodes to
//! [`Value::Undefined`], which callers treat as "no override".

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rustc_hash::FxHashMap;

use crate::value::{FunctionRef, Value, ValueType};

/// Typed value ⇄ attribute string converter
///
/// Holds the named globals that object, array and function attributes may
/// refer to by name.
#[derive(Clone, Debug, Default)]
pub struct AttributeCodec {
    globals: FxHashMap<String, Value>,
}

impl AttributeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named global value (object, array or function)
    pub fn register_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Registers a function under its own name
    pub fn register_function(&mut self, func: FunctionRef) {
        self.globals
            .insert(func.name().to_string(), Value::Function(func));
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Encodes `value` as an attribute string.
    ///
    /// `None` means the attribute should be absent.
    pub fn serialize(&self, value: &Value, ty: ValueType, nullable: bool) -> Option<String> {
        match value {
            Value::Undefined => return None,
            Value::Null => return nullable.then(|| "null".to_string()),
            _ => {}
        }

        match ty {
            ValueType::Boolean => match value {
                Value::Bool(true) => Some(String::new()),
                Value::Number(n) if *n == 1.0 => Some(String::new()),
                Value::String(s) if s == "true" || s == "1" => Some(String::new()),
                _ => None,
            },
            ValueType::Array | ValueType::Object | ValueType::Composite => encode_json(value),
            ValueType::Any => match value {
                Value::Array(_) | Value::Object(_) => encode_json(value),
                other => Some(other.to_display_string()),
            },
            ValueType::Date => match value {
                Value::Date(date) => Some(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
                other => Some(other.to_display_string()),
            },
            ValueType::Number
            | ValueType::Integer
            | ValueType::Float
            | ValueType::String
            | ValueType::Function => Some(value.to_display_string()),
        }
    }

    /// Decodes an attribute string (`None` when the attribute is absent)
    pub fn deserialize(&self, raw: Option<&str>, ty: ValueType, nullable: bool) -> Value {
        if ty == ValueType::Boolean {
            return match raw {
                None => Value::Bool(false),
                Some("null") if nullable => Value::Null,
                Some(_) => Value::Bool(true),
            };
        }

        let Some(raw) = raw else {
            return Value::Undefined;
        };
        if raw == "null" {
            return if nullable { Value::Null } else { Value::Undefined };
        }

        match ty {
            ValueType::Number | ValueType::Float => Value::Number(
                numeric_sentinel(raw).unwrap_or_else(|| parse_float_prefix(raw)),
            ),
            ValueType::Integer => Value::Number(
                numeric_sentinel(raw).unwrap_or_else(|| parse_int_prefix(raw)),
            ),
            ValueType::String | ValueType::Any => Value::String(raw.to_string()),
            ValueType::Date => parse_date(raw).map(Value::Date).unwrap_or_default(),
            ValueType::Function => match self.globals.get(raw) {
                Some(func @ Value::Function(_)) => func.clone(),
                _ => Value::Undefined,
            },
            ValueType::Array | ValueType::Object | ValueType::Composite => {
                self.decode_structured(raw, ty)
            }
            ValueType::Boolean => Value::Undefined,
        }
    }

    fn decode_structured(&self, raw: &str, ty: ValueType) -> Value {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(json) => {
                let value = Value::from_json(json);
                if value.truthy() {
                    value
                } else {
                    Value::Undefined
                }
            }
            Err(_) => {
                if let Some(global @ (Value::Object(_) | Value::Array(_))) = self.globals.get(raw)
                {
                    return global.clone();
                }
                if ty == ValueType::Array && raw.contains('[') {
                    let stripped = raw
                        .replacen('[', "", 1)
                        .replacen(']', "", 1)
                        .replace(['\'', '"'], "");
                    return Value::Array(
                        stripped
                            .trim()
                            .split(',')
                            .map(|item| Value::String(item.trim().to_string()))
                            .collect(),
                    );
                }
                Value::Undefined
            }
        }
    }
}

fn encode_json(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => other.to_json().map(|json| json.to_string()),
    }
}

fn numeric_sentinel(raw: &str) -> Option<f64> {
    match raw {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

/// Longest leading decimal literal, or `NaN` when there is none
fn parse_float_prefix(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if frac_end > frac_start || digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

/// Leading integer literal, or `NaN` when there is none
fn parse_int_prefix(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if end == digits_start {
        return f64::NAN;
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
