//! Dynamically typed values
//!
//! Component properties, attribute payloads and data-context fields all travel
//! as [`Value`]. The set of variants follows the declared property types of a
//! [`PropertySchema`](crate::PropertySchema): every [`ValueType`] has a
//! variant (or a family of variants) it accepts.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered string-keyed map used for object values
pub type Object = IndexMap<String, Value>;

type NativeFn = dyn Fn(&[Value]) -> Value;

/// A named, callable function value
///
/// Function-typed properties and data-context event handlers hold one of
/// these. Two references are equal when they point at the same closure.
#[derive(Clone)]
pub struct FunctionRef {
    name: String,
    func: Rc<NativeFn>,
}

impl FunctionRef {
    pub fn new(name: impl Into<String>, func: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.func)(args)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionRef({})", self.name)
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

// ============================================================================
// Value
// ============================================================================

/// A dynamically typed property value
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value. Never written to a bound target.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Function(FunctionRef),
    Array(Vec<Value>),
    Object(Object),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `true` for both `Undefined` and `Null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(func) => Some(func),
            _ => None,
        }
    }

    /// Runtime type name, as reported in type-mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Function(_) => "function",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Script-style truthiness, used by negated bindings
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Date(_) | Value::Function(_) | Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Member lookup on object values
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Follows a dotted path (`user.address.city`) one member at a time
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(self, |current, segment| current.get(segment))
    }

    /// Identity comparison used by the property write pipeline.
    ///
    /// Numbers compare with `NaN == NaN`, arrays and objects compare deeply.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(key, x)| b.get(key).is_some_and(|y| x.same_value(y)))
            }
            _ => false,
        }
    }

    /// Text form used for text nodes, plain-string attributes and messages
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.to_rfc3339_opts(SecondsFormat::Millis, true),
            Value::Function(func) => func.name().to_string(),
            Value::Array(items) => items
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => self
                .to_json()
                .map(|json| json.to_string())
                .unwrap_or_default(),
        }
    }

    /// Converts to JSON. Functions and `Undefined` have no JSON form.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Value::Undefined | Value::Function(_) => return None,
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json().unwrap_or(serde_json::Value::Null))
                    .collect(),
            ),
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .filter_map(|(key, value)| value.to_json().map(|json| (key.clone(), json)))
                    .collect(),
            ),
        })
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from_json(value)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            other => f.write_str(&other.to_display_string()),
        }
    }
}

/// Formats a number the way script runtimes print them: integral values
/// without a fraction, and the `NaN`/`Infinity` sentinels spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{n}")
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(map)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Value::Date(date)
    }
}

impl From<FunctionRef> for Value {
    fn from(func: FunctionRef) -> Self {
        Value::Function(func)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// ValueType
// ============================================================================

/// Declared type of a property or method argument
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Integer,
    Float,
    Boolean,
    Date,
    Function,
    Any,
    Array,
    Object,
    Composite,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::Function => "function",
            ValueType::Any => "any",
            ValueType::Array => "array",
            ValueType::Object => "object",
            ValueType::Composite => "composite",
        }
    }

    /// Parses a declaration such as `"number"` or `"string?"`.
    ///
    /// Returns the type and whether it was marked nullable.
    pub fn parse_declaration(declaration: &str) -> Option<(ValueType, bool)> {
        let declaration = declaration.trim();
        let (name, nullable) = match declaration.strip_suffix('?') {
            Some(name) => (name, true),
            None => (declaration, false),
        };
        name.parse().ok().map(|ty| (ty, nullable))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Number | ValueType::Integer | ValueType::Float)
    }

    /// Type-compatibility rule of the property write pipeline.
    ///
    /// `integer`/`float` accept any number, `object` and `composite` accept
    /// arrays, and `null` is accepted only when the property is nullable.
    pub fn accepts(&self, value: &Value, nullable: bool) -> bool {
        match value {
            Value::Null => nullable || *self == ValueType::Any,
            _ if *self == ValueType::Any => true,
            Value::Undefined => false,
            Value::Bool(_) => *self == ValueType::Boolean,
            Value::Number(_) => self.is_numeric(),
            Value::String(_) => *self == ValueType::String,
            Value::Date(_) => *self == ValueType::Date,
            Value::Function(_) => *self == ValueType::Function,
            Value::Array(_) => matches!(
                self,
                ValueType::Array | ValueType::Object | ValueType::Composite
            ),
            Value::Object(_) => matches!(self, ValueType::Object | ValueType::Composite),
        }
    }

    /// Value a boolean or collection attribute falls back to when absent
    pub fn falsy_default(&self) -> Value {
        match self {
            ValueType::Boolean => Value::Bool(false),
            ValueType::Array => Value::Array(Vec::new()),
            ValueType::Object | ValueType::Composite => Value::Object(Object::new()),
            _ => Value::Undefined,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "string" => ValueType::String,
            "number" => ValueType::Number,
            "int" | "integer" => ValueType::Integer,
            "float" => ValueType::Float,
            "bool" | "boolean" => ValueType::Boolean,
            "date" => ValueType::Date,
            "function" => ValueType::Function,
            "any" => ValueType::Any,
            "array" => ValueType::Array,
            "object" => ValueType::Object,
            "composite" | "propertyObject" => ValueType::Composite,
            _ => return Err(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_value_nan() {
        assert!(Value::Number(f64::NAN).same_value(&Value::Number(f64::NAN)));
        assert!(!Value::Number(1.0).same_value(&Value::Number(2.0)));
    }

    #[test]
    fn test_same_value_deep() {
        let a = Value::Array(vec![1.into(), "x".into()]);
        let b = Value::Array(vec![1.into(), "x".into()]);
        assert_eq!(a, b);

        let mut left = Object::new();
        left.insert("k".into(), Value::Number(1.0));
        let mut right = Object::new();
        right.insert("k".into(), Value::Number(2.0));
        assert_ne!(Value::Object(left), Value::Object(right));
    }

    #[test]
    fn test_function_identity() {
        let f = FunctionRef::new("f", |_| Value::Undefined);
        let g = FunctionRef::new("f", |_| Value::Undefined);
        assert_eq!(Value::Function(f.clone()), Value::Function(f));
        assert_ne!(
            Value::Function(g),
            Value::Function(FunctionRef::new("f", |_| Value::Undefined))
        );
    }

    #[test]
    fn test_get_path() {
        let json = serde_json::json!({ "user": { "address": { "city": "Sofia" } } });
        let value = Value::from_json(json);
        assert_eq!(
            value.get_path("user.address.city"),
            Some(&Value::String("Sofia".into()))
        );
        assert_eq!(value.get_path("user.missing.city"), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_truthy() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::String(String::new()).truthy());
        assert!(Value::Array(Vec::new()).truthy());
    }

    #[test]
    fn test_parse_declaration() {
        assert_eq!(
            ValueType::parse_declaration("number?"),
            Some((ValueType::Number, true))
        );
        assert_eq!(
            ValueType::parse_declaration("int"),
            Some((ValueType::Integer, false))
        );
        assert_eq!(ValueType::parse_declaration("nope"), None);
    }

    #[test]
    fn test_accepts() {
        assert!(ValueType::Integer.accepts(&Value::Number(1.5), false));
        assert!(ValueType::Object.accepts(&Value::Array(Vec::new()), false));
        assert!(!ValueType::Array.accepts(&Value::Object(Object::new()), false));
        assert!(!ValueType::String.accepts(&Value::Null, false));
        assert!(ValueType::String.accepts(&Value::Null, true));
        assert!(ValueType::Any.accepts(&Value::Null, false));
        assert!(!ValueType::Boolean.accepts(&Value::Number(1.0), false));
    }
}
