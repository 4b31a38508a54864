//! Property store and write pipeline
//!
//! Every declared property of an instance has exactly one [`PropertySlot`].
//! All writes (from code, attributes, data contexts or bindings) go through
//! [`Runtime::write_property`], which runs:
//!
//! 1. re-entrancy guard (a busy slot discards the write)
//! 2. read-only check
//! 3. allowed-value check
//! 4. validator (may replace the value)
//! 5. identity check (`NaN == NaN`, deep for arrays/objects)
//! 6. type check
//! 7. commit
//! 8. attribute reflection, unless the write came from the attribute
//! 9. once ready: change handler, observer, watcher, then `<attr>-changed`,
//!    bound-node and data-context propagation
//!
//! The slot's [`WriteToken`] brackets the whole sequence, so the cycle
//! property → attribute → property is a no-op on re-entry.

use indexmap::IndexMap;
use tessel_core::{NodeId, PropertyDescriptor, PropertySchema, Result, Value};

use crate::runtime::{ComponentId, Event, Runtime};

/// Per-property write state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteToken {
    #[default]
    Idle,
    CommittingFromCode,
    CommittingFromAttribute,
    CommittingFromContext,
}

/// Where a write comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOrigin {
    /// Public property assignment
    Code,
    /// Attribute decoding (skips reflection back to the attribute)
    Attribute,
    /// Data-context field (skips write-back to the context)
    Context,
    /// Component-internal write that may touch read-only properties
    Internal,
    /// Assignment that skips the change handler, observer and watcher
    Quiet,
}

impl WriteOrigin {
    fn token(self) -> WriteToken {
        match self {
            WriteOrigin::Attribute => WriteToken::CommittingFromAttribute,
            WriteOrigin::Context => WriteToken::CommittingFromContext,
            WriteOrigin::Code | WriteOrigin::Internal | WriteOrigin::Quiet => {
                WriteToken::CommittingFromCode
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct PropertySlot {
    pub(crate) value: Value,
    pub(crate) token: WriteToken,
    /// Set when an owner two-way binds this property
    pub(crate) notify: bool,
}

impl PropertySlot {
    fn new(value: Value) -> Self {
        Self {
            value,
            token: WriteToken::Idle,
            notify: false,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn token(&self) -> WriteToken {
        self.token
    }
}

/// Property values of one instance, in declaration order
#[derive(Clone, Debug, Default)]
pub struct PropertyStore {
    slots: IndexMap<String, PropertySlot>,
}

impl PropertyStore {
    /// One slot per declared property, holding a clone of its default
    pub fn from_schema(schema: &PropertySchema) -> Self {
        Self {
            slots: schema
                .iter()
                .map(|p| (p.name().to_string(), PropertySlot::new(p.default_value().clone())))
                .collect(),
        }
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.slots.get(name).map(|s| &s.value)
    }

    pub fn slot(&self, name: &str) -> Option<&PropertySlot> {
        self.slots.get(name)
    }

    pub(crate) fn slot_mut(&mut self, name: &str) -> Option<&mut PropertySlot> {
        self.slots.get_mut(name)
    }

    /// Adds a slot for a property declared after the instance was created
    pub(crate) fn ensure(&mut self, descriptor: &PropertyDescriptor) {
        self.slots
            .entry(descriptor.name().to_string())
            .or_insert_with(|| PropertySlot::new(descriptor.default_value().clone()));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Runtime {
    /// Current value of a property (`Undefined` if it is not declared)
    pub fn get_property(&self, id: ComponentId, name: &str) -> Value {
        self.components
            .get(id)
            .and_then(|i| i.store.value(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Assigns a property. Returns whether the value changed.
    pub fn set_property(
        &mut self,
        id: ComponentId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<bool> {
        self.write_property(id, name, value.into(), WriteOrigin::Code)
    }

    /// Assigns a property; with `notify == false` the change handler,
    /// observer and watcher are skipped
    pub fn set(
        &mut self,
        id: ComponentId,
        name: &str,
        value: impl Into<Value>,
        notify: bool,
    ) -> Result<bool> {
        let origin = if notify {
            WriteOrigin::Code
        } else {
            WriteOrigin::Quiet
        };
        self.write_property(id, name, value.into(), origin)
    }

    /// Assigns a property from component code, bypassing `read_only`
    pub fn force_property(
        &mut self,
        id: ComponentId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<bool> {
        self.write_property(id, name, value.into(), WriteOrigin::Internal)
    }

    pub(crate) fn write_property(
        &mut self,
        id: ComponentId,
        name: &str,
        value: Value,
        origin: WriteOrigin,
    ) -> Result<bool> {
        let Some(instance) = self.components.get_mut(id) else {
            return Ok(false);
        };
        let Some(descriptor) = instance.ty.schema().get(name).cloned() else {
            tracing::debug!(tag = instance.ty.tag(), property = name, "write to undeclared property ignored");
            return Ok(false);
        };
        let Some(slot) = instance.store.slot_mut(name) else {
            return Ok(false);
        };
        if slot.token != WriteToken::Idle {
            tracing::trace!(property = name, token = ?slot.token, "discarding re-entrant write");
            return Ok(false);
        }
        slot.token = origin.token();

        let result = self.run_write(id, &descriptor, value, origin);

        if let Some(slot) = self
            .components
            .get_mut(id)
            .and_then(|i| i.store.slot_mut(name))
        {
            slot.token = WriteToken::Idle;
        }
        result
    }

    fn run_write(
        &mut self,
        id: ComponentId,
        descriptor: &PropertyDescriptor,
        mut value: Value,
        origin: WriteOrigin,
    ) -> Result<bool> {
        let name = descriptor.name();

        if descriptor.is_read_only() && origin != WriteOrigin::Internal {
            tracing::warn!(property = name, "write to read-only property ignored");
            return Ok(false);
        }

        if let Err(err) = descriptor.check_allowed(&value) {
            self.report(Some(id), err)?;
            return Ok(false);
        }

        let old = self.get_property(id, name);

        if let Some(validator) = descriptor.validator_method() {
            match self.invoke_method(id, validator, &[old.clone(), value.clone()]) {
                Ok(validated) if !validated.is_undefined() => value = validated,
                Ok(_) => {}
                Err(err) => self.log_callback_error(id, validator, &err),
            }
        }

        if old.same_value(&value) {
            return Ok(false);
        }

        if let Err(err) = descriptor.check_type(&value) {
            self.report(Some(id), err)?;
            return Ok(false);
        }

        let Some(instance) = self.components.get_mut(id) else {
            return Ok(false);
        };
        let Some(slot) = instance.store.slot_mut(name) else {
            return Ok(false);
        };
        slot.value = value.clone();
        let notify_override = slot.notify;
        let node = instance.node;
        let quiet = origin == WriteOrigin::Quiet || instance.in_change_handler;
        let bound = instance.bound_properties.contains(name);

        if origin != WriteOrigin::Attribute && descriptor.reflects() {
            self.reflect_attribute(node, descriptor, &value);
        }

        if !self.is_effectively_ready(id) {
            return Ok(true);
        }

        if !quiet {
            self.run_change_handlers(id, descriptor, &old, &value);
        }

        if descriptor.notifies() || notify_override || bound {
            if self.config.dispatch_change_events {
                let event = Event::changed(descriptor.attribute(), node, &old, &value);
                self.dispatch_event(node, event);
            }
            if bound {
                self.update_bound_nodes(id, Some(name));
            }
        }

        if origin != WriteOrigin::Context {
            self.update_data_context_property(id, name);
        }

        Ok(true)
    }

    /// Writes the property's attribute projection on the host node
    pub(crate) fn reflect_attribute(
        &mut self,
        node: NodeId,
        descriptor: &PropertyDescriptor,
        value: &Value,
    ) {
        let encoded = self
            .codec
            .serialize(value, descriptor.value_type(), descriptor.is_nullable());
        match encoded {
            Some(text) => self.host_mut().set_attribute(node, descriptor.attribute(), &text),
            None => {
                self.host_mut().remove_attribute(node, descriptor.attribute());
            }
        }
    }

    fn run_change_handlers(
        &mut self,
        id: ComponentId,
        descriptor: &PropertyDescriptor,
        old: &Value,
        new: &Value,
    ) {
        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        let previous = std::mem::replace(&mut instance.in_change_handler, true);
        let handler = instance.ty.hooks().property_changed.clone();
        let watcher = instance
            .watcher
            .as_ref()
            .filter(|w| w.properties.iter().any(|p| p == descriptor.name()))
            .map(|w| w.callback.clone());

        if let Some(handler) = handler {
            if let Err(err) = handler(self, id, descriptor.name(), old, new) {
                self.log_callback_error(id, "property_changed", &err);
            }
        }

        if let Some(observer) = descriptor.observer_method() {
            if let Err(err) = self.invoke_method(id, observer, &[old.clone(), new.clone()]) {
                self.log_callback_error(id, observer, &err);
            }
        }

        if let Some(watcher) = watcher {
            watcher(self, id, descriptor.name(), old, new);
        }

        if let Some(instance) = self.components.get_mut(id) {
            instance.in_change_handler = previous;
        }
    }

    /// Ready, with an owner (if any) that is ready too
    pub(crate) fn is_effectively_ready(&self, id: ComponentId) -> bool {
        let Some(instance) = self.components.get(id) else {
            return false;
        };
        instance.is_ready()
            && instance
                .owner
                .and_then(|owner| self.components.get(owner))
                .map_or(true, |owner| owner.is_ready())
    }

    /// Applies an attribute change on the host node to the matching property
    pub(crate) fn attribute_changed(
        &mut self,
        id: ComponentId,
        attribute: &str,
        raw: Option<&str>,
    ) -> Result<()> {
        let Some(instance) = self.components.get(id) else {
            return Ok(());
        };
        if !instance.state.is_configured() {
            return Ok(());
        }
        let Some(descriptor) = instance.ty.schema().by_attribute(attribute).cloned() else {
            return Ok(());
        };
        if raw.is_some_and(has_binding_brackets) {
            return Ok(());
        }

        let value = self
            .codec
            .deserialize(raw, descriptor.value_type(), descriptor.is_nullable());
        if value.is_undefined() {
            return Ok(());
        }
        self.write_property(id, descriptor.name(), value, WriteOrigin::Attribute)?;
        Ok(())
    }

    /// Registers a watcher called after writes to any of `properties`.
    /// Replaces the previous watcher.
    pub fn watch<F>(&mut self, id: ComponentId, properties: &[&str], callback: F)
    where
        F: Fn(&mut Runtime, ComponentId, &str, &Value, &Value) + 'static,
    {
        if let Some(instance) = self.components.get_mut(id) {
            instance.watcher = Some(crate::component::Watcher {
                properties: properties.iter().map(|p| p.to_string()).collect(),
                callback: std::rc::Rc::new(callback),
            });
        }
    }

    pub fn unwatch(&mut self, id: ComponentId) {
        if let Some(instance) = self.components.get_mut(id) {
            instance.watcher = None;
        }
    }
}

/// Whether a literal still holds unresolved `{{`/`[[` binding brackets
pub(crate) fn has_binding_brackets(text: &str) -> bool {
    text.contains("{{") || text.contains("[[")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::ValueType;

    #[test]
    fn test_store_clones_defaults() {
        let mut schema = PropertySchema::new();
        schema.declare(PropertyDescriptor::new("items", ValueType::Array).default(vec![Value::from(1)]));
        schema.declare(PropertyDescriptor::new("label", ValueType::String));

        let mut a = PropertyStore::from_schema(&schema);
        let b = PropertyStore::from_schema(&schema);

        if let Some(Value::Array(items)) = a.slot_mut("items").map(|s| &mut s.value) {
            items.push(Value::from(2));
        }
        assert_eq!(a.value("items").and_then(Value::as_array).map(<[Value]>::len), Some(2));
        assert_eq!(b.value("items").and_then(Value::as_array).map(<[Value]>::len), Some(1));
        assert_eq!(b.value("label"), Some(&Value::Undefined));
        assert_eq!(b.names().collect::<Vec<_>>(), vec!["items", "label"]);
    }

    #[test]
    fn test_origin_tokens() {
        assert_eq!(WriteOrigin::Attribute.token(), WriteToken::CommittingFromAttribute);
        assert_eq!(WriteOrigin::Context.token(), WriteToken::CommittingFromContext);
        assert_eq!(WriteOrigin::Quiet.token(), WriteToken::CommittingFromCode);
    }

    #[test]
    fn test_binding_brackets() {
        assert!(has_binding_brackets("{{name}}"));
        assert!(has_binding_brackets("a [[b]]"));
        assert!(!has_binding_brackets("plain"));
    }
}
