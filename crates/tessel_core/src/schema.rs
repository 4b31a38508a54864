//! Property schemas
//!
//! A [`PropertySchema`] is the declarative description of a component type's
//! properties. It is built once per type, merged with its base types, and
//! consulted by every property write.
//!
//! # Example
//!
//! ```rust
//! use tessel_core::{PropertyDescriptor, PropertySchema, Value, ValueType};
//!
//! let mut schema = PropertySchema::new();
//! schema.declare(PropertyDescriptor::new("maxCount", ValueType::Integer).default(10));
//!
//! let prop = schema.by_attribute("max-count").unwrap();
//! assert_eq!(prop.name(), "maxCount");
//! assert_eq!(prop.default_value(), &Value::Number(10.0));
//! ```

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::error::ElementError;
use crate::value::{Value, ValueType};

/// Kebab-case attribute name of a property (`fooBar` → `foo-bar`).
///
/// Every uppercase letter starts a new segment, so `innerHTML` becomes
/// `inner-h-t-m-l`.
pub fn to_dash(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() && i > 0 {
            out.push('-');
        }
        out.push(ch.to_ascii_lowercase());
    }
    out
}

/// Property name of a kebab-case attribute (`foo-bar` → `fooBar`)
pub fn to_camel_case(attribute: &str) -> String {
    let mut out = String::with_capacity(attribute.len());
    let mut chars = attribute.chars().peekable();
    while let Some(ch) = chars.next() {
        match chars.peek() {
            Some(next) if ch == '-' && next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(ch),
        }
    }
    out
}

// ============================================================================
// PropertyDescriptor
// ============================================================================

/// Metadata of one declared property
#[derive(Clone, Debug)]
pub struct PropertyDescriptor {
    name: String,
    attribute_name: String,
    value_type: Option<ValueType>,
    nullable: bool,
    default: Value,
    allowed_values: Option<Vec<Value>>,
    reflect: bool,
    reflect_default: bool,
    read_only: bool,
    notify: bool,
    validator: Option<String>,
    observer: Option<String>,
    inherit: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        Self {
            attribute_name: to_dash(&name),
            name,
            value_type: Some(value_type),
            nullable: value_type == ValueType::Any,
            default: Value::Undefined,
            allowed_values: None,
            reflect: true,
            reflect_default: false,
            read_only: false,
            notify: false,
            validator: None,
            observer: None,
            inherit: false,
        }
    }

    /// Declares a property from a type string such as `"number?"`.
    ///
    /// An unknown type string leaves the property untyped; registration
    /// reports it as [`ElementError::UnknownPropertyType`].
    pub fn declared(name: impl Into<String>, declaration: &str) -> Self {
        match ValueType::parse_declaration(declaration) {
            Some((ty, nullable)) => Self::new(name, ty).nullable(nullable || ty == ValueType::Any),
            None => Self::untyped(name),
        }
    }

    /// A property declared without a type
    pub fn untyped(name: impl Into<String>) -> Self {
        let mut descriptor = Self::new(name, ValueType::Any);
        descriptor.value_type = None;
        descriptor
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn allowed_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn reflect(mut self, reflect: bool) -> Self {
        self.reflect = reflect;
        self
    }

    /// Writes the default value into the attribute during configuration
    pub fn reflect_default(mut self, reflect_default: bool) -> Self {
        self.reflect_default = reflect_default;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Publishes `<attribute>-changed` after every committed write
    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    /// Names the component method that validates (and may transform) writes
    pub fn validator(mut self, method: impl Into<String>) -> Self {
        self.validator = Some(method.into());
        self
    }

    /// Names the component method invoked with `(old, new)` after a write
    pub fn observer(mut self, method: impl Into<String>) -> Self {
        self.observer = Some(method.into());
        self
    }

    /// Fills unset members from the base type's declaration of the same name
    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    pub fn attribute_name(mut self, attribute: impl Into<String>) -> Self {
        self.attribute_name = attribute.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self) -> &str {
        &self.attribute_name
    }

    /// Declared type; untyped properties behave as `any`
    pub fn value_type(&self) -> ValueType {
        self.value_type.unwrap_or(ValueType::Any)
    }

    pub fn has_type(&self) -> bool {
        self.value_type.is_some()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn allowed(&self) -> Option<&[Value]> {
        self.allowed_values.as_deref()
    }

    pub fn reflects(&self) -> bool {
        self.reflect
    }

    pub fn reflects_default(&self) -> bool {
        self.reflect_default
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn notifies(&self) -> bool {
        self.notify
    }

    pub fn validator_method(&self) -> Option<&str> {
        self.validator.as_deref()
    }

    pub fn observer_method(&self) -> Option<&str> {
        self.observer.as_deref()
    }

    pub fn inherits(&self) -> bool {
        self.inherit
    }

    /// Checks a candidate value against the allowed-value list
    pub fn check_allowed(&self, value: &Value) -> Result<(), ElementError> {
        match &self.allowed_values {
            Some(allowed) if !allowed.iter().any(|v| v.same_value(value)) => {
                Err(ElementError::InvalidPropertyValue {
                    name: self.name.clone(),
                    actual: value.to_display_string(),
                    expected: allowed
                        .iter()
                        .map(Value::to_display_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
            _ => Ok(()),
        }
    }

    /// Checks a candidate value against the declared type
    pub fn check_type(&self, value: &Value) -> Result<(), ElementError> {
        let ty = self.value_type();
        if ty.accepts(value, self.nullable) {
            Ok(())
        } else {
            Err(ElementError::InvalidPropertyValueType {
                name: self.name.clone(),
                actual_type: value.type_name().to_string(),
                expected_type: ty.as_str().to_string(),
            })
        }
    }

    fn fill_from(&mut self, base: &PropertyDescriptor) {
        if self.value_type.is_none() {
            self.value_type = base.value_type;
            self.nullable = base.nullable;
        }
        if self.default.is_undefined() {
            self.default = base.default.clone();
        }
        if self.allowed_values.is_none() {
            self.allowed_values = base.allowed_values.clone();
        }
        if self.validator.is_none() {
            self.validator = base.validator.clone();
        }
        if self.observer.is_none() {
            self.observer = base.observer.clone();
        }
    }
}

// ============================================================================
// PropertySchema
// ============================================================================

/// All declared properties of a component type, in declaration order
#[derive(Clone, Debug, Default)]
pub struct PropertySchema {
    properties: IndexMap<String, PropertyDescriptor>,
    by_attribute: FxHashMap<String, String>,
}

impl PropertySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a property declaration
    pub fn declare(&mut self, descriptor: PropertyDescriptor) {
        if let Some(previous) = self.properties.get(descriptor.name()) {
            self.by_attribute.remove(previous.attribute());
        }
        self.by_attribute
            .insert(descriptor.attribute().to_string(), descriptor.name().to_string());
        self.properties
            .insert(descriptor.name().to_string(), descriptor);
    }

    /// Adds a declaration only if the name is not taken yet
    pub fn declare_if_absent(&mut self, descriptor: PropertyDescriptor) -> bool {
        if self.properties.contains_key(descriptor.name()) {
            return false;
        }
        self.declare(descriptor);
        true
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    pub fn by_attribute(&self, attribute: &str) -> Option<&PropertyDescriptor> {
        self.by_attribute
            .get(attribute)
            .and_then(|name| self.properties.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Merges a base type's schema into this one.
    ///
    /// Base properties the derived schema does not declare are copied over
    /// (ahead of the derived ones). Derived properties marked `inherit` take
    /// unset members from the base declaration.
    pub fn merge_base(&mut self, base: &PropertySchema) {
        let mut merged = PropertySchema::new();
        for base_prop in base.iter() {
            match self.properties.get(base_prop.name()) {
                Some(own) => {
                    let mut own = own.clone();
                    if own.inherits() {
                        own.fill_from(base_prop);
                    }
                    merged.declare(own);
                }
                None => merged.declare(base_prop.clone()),
            }
        }
        for own in self.iter() {
            merged.declare_if_absent(own.clone());
        }
        *self = merged;
    }

    /// Declaration problems: untyped properties and defaults that do not
    /// match their type (unless a validator will transform them)
    pub fn validate(&self) -> Vec<ElementError> {
        let mut problems = Vec::new();
        for prop in self.iter() {
            if !prop.has_type() {
                problems.push(ElementError::UnknownPropertyType {
                    name: prop.name().to_string(),
                });
                continue;
            }
            let default = prop.default_value();
            if default.is_nullish() || prop.validator_method().is_some() {
                continue;
            }
            if let Err(err) = prop.check_type(default) {
                problems.push(err);
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_dash() {
        assert_eq!(to_dash("fooBar"), "foo-bar");
        assert_eq!(to_dash("innerHTML"), "inner-h-t-m-l");
        assert_eq!(to_dash("value"), "value");
        assert_eq!(to_dash("Value"), "value");
    }

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("foo-bar"), "fooBar");
        assert_eq!(to_camel_case("inner-h-t-m-l"), "innerHTML");
        assert_eq!(to_camel_case("plain"), "plain");
    }

    #[test]
    fn test_declared_types() {
        let prop = PropertyDescriptor::declared("count", "number?");
        assert_eq!(prop.value_type(), ValueType::Number);
        assert!(prop.is_nullable());

        let any = PropertyDescriptor::declared("data", "any");
        assert!(any.is_nullable());

        let broken = PropertyDescriptor::declared("x", "numbr");
        assert!(!broken.has_type());
        assert_eq!(broken.value_type(), ValueType::Any);
    }

    #[test]
    fn test_by_attribute_follows_redeclaration() {
        let mut schema = PropertySchema::new();
        schema.declare(PropertyDescriptor::new("label", ValueType::String));
        schema.declare(
            PropertyDescriptor::new("label", ValueType::String).attribute_name("caption"),
        );

        assert!(schema.by_attribute("label").is_none());
        assert_eq!(schema.by_attribute("caption").unwrap().name(), "label");
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn test_check_allowed() {
        let prop = PropertyDescriptor::new("mode", ValueType::String)
            .allowed_values(["a", "b"]);
        assert!(prop.check_allowed(&"a".into()).is_ok());
        let err = prop.check_allowed(&"c".into()).unwrap_err();
        assert_eq!(
            err,
            ElementError::InvalidPropertyValue {
                name: "mode".into(),
                actual: "c".into(),
                expected: "a, b".into(),
            }
        );
    }

    #[test]
    fn test_merge_base() {
        let mut base = PropertySchema::new();
        base.declare(PropertyDescriptor::new("disabled", ValueType::Boolean).default(false));
        base.declare(
            PropertyDescriptor::new("size", ValueType::Number)
                .default(3)
                .validator("clampSize"),
        );

        let mut derived = PropertySchema::new();
        derived.declare(PropertyDescriptor::untyped("size").inherit(true));
        derived.declare(PropertyDescriptor::new("label", ValueType::String));
        derived.merge_base(&base);

        let names: Vec<_> = derived.names().collect();
        assert_eq!(names, vec!["disabled", "size", "label"]);

        let size = derived.get("size").unwrap();
        assert_eq!(size.value_type(), ValueType::Number);
        assert_eq!(size.default_value(), &Value::Number(3.0));
        assert_eq!(size.validator_method(), Some("clampSize"));
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut schema = PropertySchema::new();
        schema.declare(PropertyDescriptor::untyped("mystery"));
        schema.declare(PropertyDescriptor::new("count", ValueType::Number).default("zero"));
        schema.declare(PropertyDescriptor::new("ok", ValueType::Number).default(1));

        let problems = schema.validate();
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].message_key(), "propertyUnknownType");
        assert_eq!(problems[1].message_key(), "propertyInvalidValueType");
    }
}
