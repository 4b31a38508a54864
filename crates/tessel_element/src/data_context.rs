//! Data contexts
//!
//! A data context is an external object whose fields feed a component's
//! declared properties. The component's own attributes name the fields with
//! the binding language (`title="{{user.name}}"`). Contexts live in the
//! runtime; [`Runtime::set_context_field`] is their only write path and
//! signals every bound component as it writes, so no polling is needed.
//!
//! A host attribute `data-context="name"` binds the context registered under
//! that name. Names registered later are resolved when they appear, or when
//! the host tree finishes loading.

use tessel_core::{ListenerId, NodeId, Object, Value};

use crate::binding::engine::set_path;
use crate::binding::{handler_name, parse_binding, parse_event_attribute, BindingMode, BindingSource};
use crate::property::WriteOrigin;
use crate::runtime::{ComponentId, DataContextId, Event, Runtime};

/// Host attribute naming a registered data context
pub const DATA_CONTEXT_ATTRIBUTE: &str = "data-context";

/// External data object
#[derive(Debug, Clone, Default)]
pub struct DataContext {
    fields: Object,
    subscribers: Vec<ComponentId>,
}

impl DataContext {
    pub fn fields(&self) -> &Object {
        &self.fields
    }

    /// Dotted field lookup
    pub fn field(&self, path: &str) -> Option<&Value> {
        let (root, rest) = match path.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (path, None),
        };
        let value = self.fields.get(root)?;
        match rest {
            Some(rest) => value.get_path(rest),
            None => Some(value),
        }
    }

    pub fn subscribers(&self) -> &[ComponentId] {
        &self.subscribers
    }
}

/// One host property fed by a context field
#[derive(Debug, Clone)]
struct ContextField {
    property: String,
    path: String,
    negate: bool,
    mode: BindingMode,
}

impl ContextField {
    fn root(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }

    fn apply(&self, value: Value) -> Value {
        if self.negate && !value.is_undefined() {
            Value::Bool(!value.truthy())
        } else {
            value
        }
    }
}

/// Per-instance binding to a data context
#[derive(Debug, Default)]
pub(crate) struct ContextBinding {
    context: Option<DataContextId>,
    pending_name: Option<String>,
    fields: Vec<ContextField>,
    listeners: Vec<(NodeId, String, ListenerId)>,
}

impl Runtime {
    // ========================================================================
    // Contexts
    // ========================================================================

    pub fn create_data_context(&mut self, fields: Object) -> DataContextId {
        self.contexts.insert(DataContext {
            fields,
            subscribers: Vec::new(),
        })
    }

    pub fn data_context(&self, context: DataContextId) -> Option<&DataContext> {
        self.contexts.get(context)
    }

    /// Makes `context` available to `data-context="name"` hosts. Hosts
    /// already waiting for the name are bound now.
    pub fn register_data_context(&mut self, name: &str, context: DataContextId) {
        self.named_contexts.insert(name.to_string(), context);
        let waiting: Vec<ComponentId> = self
            .components
            .iter()
            .filter(|(_, i)| {
                i.data_context
                    .as_ref()
                    .and_then(|b| b.pending_name.as_deref())
                    == Some(name)
            })
            .map(|(id, _)| id)
            .collect();
        for id in waiting {
            self.bind_data_context(id, context);
        }
    }

    pub fn named_data_context(&self, name: &str) -> Option<DataContextId> {
        self.named_contexts.get(name).copied()
    }

    /// Dotted field lookup; `Undefined` when missing
    pub fn context_field(&self, context: DataContextId, path: &str) -> Value {
        self.contexts
            .get(context)
            .and_then(|c| c.field(path))
            .cloned()
            .unwrap_or_default()
    }

    /// Writes a context field and routes the change to every bound
    /// component. Returns `false` if the context is unknown or the path
    /// does not resolve to an object member.
    pub fn set_context_field(&mut self, context: DataContextId, path: &str, value: Value) -> bool {
        let Some(data) = self.contexts.get_mut(context) else {
            return false;
        };
        let root = match path.split_once('.') {
            None => {
                data.fields.insert(path.to_string(), value);
                path
            }
            Some((root, rest)) => {
                let Some(field) = data.fields.get_mut(root) else {
                    return false;
                };
                if !set_path(field, rest, value) {
                    return false;
                }
                root
            }
        };
        let subscribers = data.subscribers.clone();
        tracing::trace!(field = root, subscribers = subscribers.len(), "data context changed");
        for id in subscribers {
            self.route_context_change(id, context, root);
        }
        true
    }

    // ========================================================================
    // Binding
    // ========================================================================

    /// Binds `context` to the instance, replacing any previous binding,
    /// and pushes the current field values into its properties
    pub fn bind_data_context(&mut self, id: ComponentId, context: DataContextId) -> bool {
        if !self.contexts.contains_key(context) {
            return false;
        }
        let Some(instance) = self.components.get(id) else {
            return false;
        };
        let node = instance.node;
        let ty = instance.ty.clone();
        self.unbind_data_context(id);

        let mut fields = Vec::new();
        let mut events = Vec::new();
        for attribute in self.host().attribute_names(node) {
            let raw = self.host().attribute(node, &attribute).unwrap_or_default();
            if let Some(event) = parse_event_attribute(&attribute) {
                events.push((event.to_string(), handler_name(&raw)));
                continue;
            }
            let Some(property) = ty.schema().by_attribute(&attribute) else {
                continue;
            };
            let Some(parsed) = parse_binding(&raw) else {
                continue;
            };
            let (path, negate) = match parsed.source {
                BindingSource::Path { path, negate } => (path, negate),
                BindingSource::Event { path, .. } => (path, false),
                BindingSource::Call { method, .. } => {
                    tracing::warn!(tag = ty.tag(), method = %method, "computed data context bindings are not supported");
                    continue;
                }
            };
            fields.push(ContextField {
                property: property.name().to_string(),
                path,
                negate,
                mode: parsed.mode,
            });
        }

        let mut listeners = Vec::with_capacity(events.len());
        for (event, handler) in events {
            let callback = handler.clone();
            let listener = self.listen(node, &event, move |rt: &mut Runtime, ev: &Event| {
                match rt.context_field(context, &callback) {
                    Value::Function(func) => {
                        func.call(&[ev.detail.clone()]);
                    }
                    _ => tracing::warn!(handler = %callback, "data context handler is not a function"),
                }
            });
            listeners.push((node, event, listener));
        }

        tracing::debug!(tag = ty.tag(), fields = fields.len(), "data context bound");
        if let Some(instance) = self.components.get_mut(id) {
            instance.data_context = Some(ContextBinding {
                context: Some(context),
                pending_name: None,
                fields,
                listeners,
            });
        }
        if let Some(data) = self.contexts.get_mut(context) {
            if !data.subscribers.contains(&id) {
                data.subscribers.push(id);
            }
        }
        self.refresh_data_context(id);
        true
    }

    pub fn unbind_data_context(&mut self, id: ComponentId) {
        let Some(binding) = self
            .components
            .get_mut(id)
            .and_then(|i| i.data_context.take())
        else {
            return;
        };
        for (node, event, listener) in binding.listeners {
            self.unlisten(node, &event, listener);
        }
        if let Some(data) = binding.context.and_then(|c| self.contexts.get_mut(c)) {
            data.subscribers.retain(|s| *s != id);
        }
    }

    pub fn bound_data_context(&self, id: ComponentId) -> Option<DataContextId> {
        self.components
            .get(id)?
            .data_context
            .as_ref()?
            .context
    }

    /// Binds the context named by the host's `data-context` attribute, or
    /// remembers the name until it is registered
    pub(crate) fn resolve_context_attribute(&mut self, id: ComponentId) {
        let Some(node) = self.components.get(id).map(|i| i.node) else {
            return;
        };
        let Some(name) = self.host().attribute(node, DATA_CONTEXT_ATTRIBUTE) else {
            return;
        };
        match self.named_contexts.get(&name).copied() {
            Some(context) => {
                self.bind_data_context(id, context);
            }
            None => {
                tracing::debug!(name = %name, "data context not registered yet");
                if let Some(instance) = self.components.get_mut(id) {
                    instance.data_context = Some(ContextBinding {
                        pending_name: Some(name),
                        ..ContextBinding::default()
                    });
                }
            }
        }
    }

    /// Binds named contexts still pending once the host tree has loaded
    pub(crate) fn resolve_pending_contexts(&mut self) {
        let pending: Vec<(ComponentId, String)> = self
            .components
            .iter()
            .filter_map(|(id, i)| {
                let name = i.data_context.as_ref()?.pending_name.clone()?;
                Some((id, name))
            })
            .collect();
        for (id, name) in pending {
            match self.named_contexts.get(&name).copied() {
                Some(context) => {
                    self.bind_data_context(id, context);
                }
                None => tracing::warn!(name = %name, "data context is not registered"),
            }
        }
    }

    /// Pushes every bound field into its property
    pub(crate) fn refresh_data_context(&mut self, id: ComponentId) {
        let Some((context, fields)) = self.context_fields(id) else {
            return;
        };
        for field in fields {
            self.push_context_field(id, context, &field);
        }
    }

    /// Writes a changed two-way property back into the bound context
    pub(crate) fn update_data_context_property(&mut self, id: ComponentId, name: &str) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        if instance.updating_data_context {
            return;
        }
        let Some((context, fields)) = self.context_fields(id) else {
            return;
        };
        let Some(field) = fields
            .into_iter()
            .find(|f| f.property == name && f.mode == BindingMode::TwoWay)
        else {
            return;
        };

        let value = field.apply(self.get_property(id, name));
        if let Some(instance) = self.components.get_mut(id) {
            instance.updating_data_context = true;
        }
        if !self.set_context_field(context, &field.path, value) {
            tracing::debug!(path = %field.path, "data context write-back failed");
        }
        if let Some(instance) = self.components.get_mut(id) {
            instance.updating_data_context = false;
        }
    }

    fn context_fields(&self, id: ComponentId) -> Option<(DataContextId, Vec<ContextField>)> {
        let binding = self.components.get(id)?.data_context.as_ref()?;
        Some((binding.context?, binding.fields.clone()))
    }

    fn route_context_change(&mut self, id: ComponentId, context: DataContextId, changed: &str) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        if instance.updating_data_context {
            return;
        }
        let Some((_, fields)) = self.context_fields(id) else {
            return;
        };
        for field in fields.iter().filter(|f| f.root() == changed) {
            self.push_context_field(id, context, field);
        }
    }

    fn push_context_field(&mut self, id: ComponentId, context: DataContextId, field: &ContextField) {
        let value = field.apply(self.context_field(context, &field.path));
        if value.is_undefined() {
            return;
        }
        if let Err(err) = self.write_property(id, &field.property, value, WriteOrigin::Context) {
            tracing::debug!(property = %field.property, error = %err, "data context value rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Object {
        let mut address = Object::new();
        address.insert("city".into(), Value::from("Oslo"));
        let mut fields = Object::new();
        fields.insert("name".into(), Value::from("Ada"));
        fields.insert("address".into(), Value::Object(address));
        fields
    }

    #[test]
    fn test_field_lookup() {
        let mut rt = Runtime::headless();
        let ctx = rt.create_data_context(user());
        assert_eq!(rt.context_field(ctx, "name"), Value::from("Ada"));
        assert_eq!(rt.context_field(ctx, "address.city"), Value::from("Oslo"));
        assert!(rt.context_field(ctx, "missing").is_undefined());
    }

    #[test]
    fn test_set_nested_field() {
        let mut rt = Runtime::headless();
        let ctx = rt.create_data_context(user());
        assert!(rt.set_context_field(ctx, "address.city", Value::from("Bergen")));
        assert_eq!(rt.context_field(ctx, "address.city"), Value::from("Bergen"));
        assert!(!rt.set_context_field(ctx, "name.first", Value::from("A")));
        assert!(!rt.set_context_field(ctx, "missing.x", Value::from(1)));
    }

    #[test]
    fn test_named_contexts() {
        let mut rt = Runtime::headless();
        let ctx = rt.create_data_context(Object::new());
        rt.register_data_context("session", ctx);
        assert_eq!(rt.named_data_context("session"), Some(ctx));
        assert_eq!(rt.named_data_context("other"), None);
    }
}
