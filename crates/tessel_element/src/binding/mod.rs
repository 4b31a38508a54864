//! Declarative bindings
//!
//! Template text and attribute values may hold binding tokens:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `{{name}}` | two-way binding to host property `name` |
//! | `[[name]]` | one-way binding (host → target only) |
//! | `[[!name]]` | negated read |
//! | `[[user.name]]` | dotted path into an object property |
//! | `{{value::input}}` | two-way, written back when the target fires `input` |
//! | `[[total(price, count)]]` | computed; re-evaluated when an argument changes |
//! | `(click)="onClick"` | static listener calling a host method |
//!
//! When a string holds several tokens the **last** one is the binding; the
//! text around it is kept as literal prefix and suffix.
//!
//! The [`BindingTree`] mirrors a component's expanded template once at build
//! time; the engine pushes host property changes into it and writes target
//! changes back.

pub mod engine;
pub mod parser;
pub mod tree;

use tessel_core::{ListenerId, NodeId, PropertyDescriptor, PropertySchema, Value, ValueType};

pub use parser::{handler_name, parse_binding, parse_event_attribute, BindingArg, BindingSource, ParsedBinding};
pub use tree::{BindingNode, BindingNodeId, BindingTree, EventBinding};

/// Target name used for text-node content
pub const TEXT_CONTENT: &str = "textContent";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingMode {
    OneWay,
    TwoWay,
}

/// One bound target property on one template node
#[derive(Clone, Debug)]
pub struct BindingDescriptor {
    pub target: String,
    pub expression: String,
    pub source: BindingSource,
    pub mode: BindingMode,
    pub value_type: ValueType,
    /// Whether `value_type` came from a declared property
    pub declared: bool,
    pub nullable: bool,
    pub reflect: bool,
    pub prefix: String,
    pub suffix: String,
    pub(crate) ready: bool,
    pub(crate) updating: bool,
    pub(crate) value: Value,
    pub(crate) listener: Option<(NodeId, String, ListenerId)>,
}

impl BindingDescriptor {
    /// Descriptor for `target`. Type, nullability and reflection come from
    /// `property`, the host property the binding reads (see
    /// [`source_property`]); a negated read is always boolean.
    pub fn new(
        target: impl Into<String>,
        parsed: ParsedBinding,
        property: Option<&PropertyDescriptor>,
    ) -> Self {
        let negated = matches!(parsed.source, BindingSource::Path { negate: true, .. });
        let value_type = if negated {
            ValueType::Boolean
        } else {
            property.map_or(ValueType::String, PropertyDescriptor::value_type)
        };
        Self {
            target: target.into(),
            expression: parsed.expression,
            source: parsed.source,
            mode: parsed.mode,
            value_type,
            declared: negated || property.is_some(),
            nullable: property.map_or(true, PropertyDescriptor::is_nullable),
            reflect: property.map_or(true, PropertyDescriptor::reflects),
            prefix: parsed.prefix,
            suffix: parsed.suffix,
            ready: false,
            updating: false,
            value: Value::Undefined,
            listener: None,
        }
    }

    pub fn has_affixes(&self) -> bool {
        !self.prefix.is_empty() || !self.suffix.is_empty()
    }

    /// Last value pushed to (or written back from) the target
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Host properties this binding reads
    pub fn dependencies(&self) -> Vec<&str> {
        fn root(path: &str) -> &str {
            path.split('.').next().unwrap_or(path)
        }
        match &self.source {
            BindingSource::Path { path, .. } | BindingSource::Event { path, .. } => vec![root(path)],
            BindingSource::Call { args, .. } => args
                .iter()
                .filter_map(|arg| match arg {
                    BindingArg::Property(path) => Some(root(path)),
                    BindingArg::Literal(_) => None,
                })
                .collect(),
        }
    }

    pub fn depends_on(&self, property: &str) -> bool {
        self.dependencies().contains(&property)
    }

    /// Wraps `value` in the literal text around the token
    pub fn render(&self, value: &Value) -> Value {
        if self.has_affixes() {
            Value::String(format!(
                "{}{}{}",
                self.prefix,
                value.to_display_string(),
                self.suffix
            ))
        } else {
            value.clone()
        }
    }

    /// Attribute type for primitive targets: the declared type, or one
    /// inferred from the value
    pub(crate) fn attribute_type(&self, value: &Value) -> ValueType {
        if self.declared {
            return self.value_type;
        }
        match value {
            Value::Bool(_) => ValueType::Boolean,
            Value::Number(_) => ValueType::Number,
            Value::Array(_) => ValueType::Array,
            Value::Object(_) => ValueType::Object,
            _ => ValueType::String,
        }
    }
}

/// The host property a binding source names, if declared. Dotted paths and
/// computed sources have none.
pub(crate) fn source_property<'a>(
    schema: &'a PropertySchema,
    source: &BindingSource,
) -> Option<&'a PropertyDescriptor> {
    match source {
        BindingSource::Path { path, .. } | BindingSource::Event { path, .. } => schema.get(path),
        BindingSource::Call { .. } => None,
    }
}
