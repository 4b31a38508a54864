//! Binding engine
//!
//! Host → target: a host property write pushes every descriptor that reads
//! the property. The value is resolved (path, negation or method call),
//! wrapped in the token's literal text and assigned to the target node:
//! through the property pipeline for component targets, as a node property
//! plus reflected attribute for plain nodes. `Undefined` never reaches a
//! target.
//!
//! Target → host: two-way descriptors listen on the target's `::event`
//! channel or its `<prop>-changed` event, and write the value back through
//! the host's property pipeline. The descriptor's `updating` flag keeps the
//! write-back from echoing.

use tessel_core::{to_dash, NodeId, NodeKind, Object, Value};

use super::parser::{parse_binding, BindingArg, BindingSource};
use super::{source_property, BindingDescriptor, BindingMode, BindingNodeId, TEXT_CONTENT};
use crate::property::{has_binding_brackets, WriteOrigin};
use crate::runtime::{ComponentId, Event, Runtime};

impl Runtime {
    /// First push of a component's own template bindings
    pub(crate) fn push_template_bindings(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        instance.template_bindings_ready = true;
        self.update_text_nodes(id);
        self.update_bound_nodes(id, None);
    }

    /// Pushes text-node bindings. Light text captured for a two-way text
    /// binding in the content slot is first written to the host property.
    pub(crate) fn update_text_nodes(&mut self, id: ComponentId) {
        let Some(light_text) = self
            .components
            .get_mut(id)
            .map(|instance| std::mem::take(&mut instance.light_html))
        else {
            return;
        };
        let Some(instance) = self.components.get(id) else {
            return;
        };
        let content = instance.content;
        let Some(tree) = &instance.bindings else {
            return;
        };

        let mut text_bindings = Vec::new();
        let mut light_target = None;
        for (binding_id, binding) in tree.iter() {
            let Some(descriptor) = binding.data.get(TEXT_CONTENT) else {
                continue;
            };
            text_bindings.push(binding_id);
            if light_target.is_none()
                && descriptor.mode == BindingMode::TwoWay
                && self.host().parent(binding.node) == content
            {
                if let BindingSource::Path { path, negate: false } = &descriptor.source {
                    light_target = Some(path.clone());
                }
            }
        }

        if let (Some(path), false) = (light_target, light_text.is_empty()) {
            self.write_path(id, &path, Value::String(light_text));
        }
        for binding_id in text_bindings {
            self.push_descriptor(id, binding_id, TEXT_CONTENT);
        }
    }

    /// Pushes every descriptor reading `changed` (all of them for `None`)
    pub(crate) fn update_bound_nodes(&mut self, id: ComponentId, changed: Option<&str>) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        if !instance.template_bindings_ready {
            return;
        }
        let Some(tree) = &instance.bindings else {
            return;
        };
        let targets: Vec<(BindingNodeId, String)> = tree
            .iter()
            .flat_map(|(binding_id, binding)| {
                binding
                    .data
                    .iter()
                    .filter(move |(_, d)| changed.map_or(true, |name| d.depends_on(name)))
                    .map(move |(target, _)| (binding_id, target.clone()))
            })
            .collect();

        for (binding_id, target) in targets {
            self.push_descriptor(id, binding_id, &target);
        }
    }

    /// Re-pushes every binding and re-reads the data context. Safe to call
    /// at any rate.
    pub fn refresh(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        if !instance.completed {
            return;
        }
        self.update_text_nodes(id);
        self.update_bound_nodes(id, None);
        self.refresh_data_context(id);
    }

    fn descriptor_mut(
        &mut self,
        id: ComponentId,
        binding_id: BindingNodeId,
        target: &str,
    ) -> Option<&mut BindingDescriptor> {
        self.components
            .get_mut(id)?
            .bindings
            .as_mut()?
            .descriptor_mut(binding_id, target)
    }

    fn push_descriptor(&mut self, id: ComponentId, binding_id: BindingNodeId, target: &str) {
        let Some((descriptor, node, stable_id)) = self.components.get(id).and_then(|instance| {
            let binding = instance.bindings.as_ref()?.get(binding_id)?;
            let descriptor = binding.data.get(target)?;
            Some((descriptor.clone(), binding.node, binding.stable_id.clone()))
        }) else {
            return;
        };
        if descriptor.updating {
            return;
        }
        let Some(target_node) = self.resolve_binding_target(id, node, stable_id.as_deref()) else {
            return;
        };

        if !descriptor.ready {
            if descriptor.mode == BindingMode::TwoWay {
                self.install_write_back(id, binding_id, target_node, &descriptor);
            }
            if let Some(d) = self.descriptor_mut(id, binding_id, target) {
                d.ready = true;
            }
        }

        let value = self.evaluate(id, &descriptor.source);
        if value.is_undefined() {
            return;
        }
        let rendered = descriptor.render(&value);

        if let Some(d) = self.descriptor_mut(id, binding_id, target) {
            d.value = rendered.clone();
            d.updating = true;
        }
        self.assign_target(target_node, &descriptor, rendered);
        if let Some(d) = self.descriptor_mut(id, binding_id, target) {
            d.updating = false;
        }
    }

    /// Resolves a binding source against the host's properties.
    /// Unresolvable sources yield `Undefined`.
    pub(crate) fn evaluate(&mut self, id: ComponentId, source: &BindingSource) -> Value {
        match source {
            BindingSource::Path { path, negate } => {
                let value = self.resolve_path(id, path);
                if *negate && !value.is_undefined() {
                    Value::Bool(!value.truthy())
                } else {
                    value
                }
            }
            BindingSource::Event { path, .. } => self.resolve_path(id, path),
            BindingSource::Call { method, args } => {
                let values: Vec<Value> = args
                    .iter()
                    .map(|arg| match arg {
                        BindingArg::Property(path) => self.resolve_path(id, path),
                        BindingArg::Literal(value) => value.clone(),
                    })
                    .collect();
                match self.invoke_method(id, method, &values) {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::debug!(method = %method, error = %err, "computed binding failed");
                        Value::Undefined
                    }
                }
            }
        }
    }

    /// Dotted path lookup starting at a host property
    pub(crate) fn resolve_path(&self, id: ComponentId, path: &str) -> Value {
        let (root, rest) = match path.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (path, None),
        };
        let value = self.get_property(id, root);
        match rest {
            Some(rest) => value.get_path(rest).cloned().unwrap_or_default(),
            None => value,
        }
    }

    /// Writes `value` at a dotted host path. Nested paths replace the root
    /// property with an updated copy.
    pub(crate) fn write_path(&mut self, id: ComponentId, path: &str, value: Value) {
        let result = match path.split_once('.') {
            None => self.write_property(id, path, value, WriteOrigin::Code),
            Some((root, rest)) => {
                let mut object = self.get_property(id, root);
                if !set_path(&mut object, rest, value) {
                    tracing::debug!(path, "write-back path does not resolve");
                    return;
                }
                self.write_property(id, root, object, WriteOrigin::Code)
            }
        };
        if let Err(err) = result {
            tracing::debug!(path, error = %err, "write-back rejected");
        }
    }

    /// The live node for a binding node: the node itself while it exists,
    /// otherwise a search by stable id below the owner and its detached
    /// children
    fn resolve_binding_target(
        &self,
        id: ComponentId,
        node: NodeId,
        stable_id: Option<&str>,
    ) -> Option<NodeId> {
        if self.host().contains_node(node) {
            return Some(node);
        }
        let stable_id = stable_id?;
        let instance = self.components.get(id)?;
        let attribute = &self.config.stable_id_attribute;
        let mut scopes = vec![instance.node];
        scopes.extend(
            instance
                .detached_children
                .iter()
                .filter_map(|child| self.components.get(*child))
                .map(|child| child.node),
        );
        scopes.into_iter().find_map(|scope| {
            std::iter::once(scope)
                .chain(self.host().descendants(scope))
                .find(|n| self.host().attribute(*n, attribute).as_deref() == Some(stable_id))
        })
    }

    fn assign_target(&mut self, node: NodeId, descriptor: &BindingDescriptor, value: Value) {
        if descriptor.target == TEXT_CONTENT {
            let text = value.to_display_string();
            self.host_mut().set_text(node, &text);
            return;
        }

        if let Some(child) = self.component(node) {
            let declared = self
                .components
                .get(child)
                .is_some_and(|c| c.ty.schema().contains(&descriptor.target));
            if declared {
                if let Err(err) =
                    self.write_property(child, &descriptor.target, value, WriteOrigin::Code)
                {
                    tracing::debug!(target = %descriptor.target, error = %err, "bound write rejected");
                }
                return;
            }
        }

        if self.host().kind(node) != Some(NodeKind::Element) {
            return;
        }
        let attribute = to_dash(&descriptor.target);
        let text = if descriptor.reflect {
            let ty = descriptor.attribute_type(&value);
            self.codec.serialize(&value, ty, descriptor.nullable)
        } else {
            None
        };
        match text {
            Some(text) => self.host_mut().set_attribute(node, &attribute, &text),
            None => {
                self.host_mut().remove_attribute(node, &attribute);
            }
        }
        self.host_mut().set_property(node, &descriptor.target, value);
    }

    fn install_write_back(
        &mut self,
        id: ComponentId,
        binding_id: BindingNodeId,
        target_node: NodeId,
        descriptor: &BindingDescriptor,
    ) {
        if descriptor.target == TEXT_CONTENT || descriptor.has_affixes() {
            return;
        }
        let child = self.component(target_node);
        let attribute = child
            .and_then(|c| self.components.get(c))
            .and_then(|c| c.ty.schema().get(&descriptor.target))
            .map_or_else(|| to_dash(&descriptor.target), |p| p.attribute().to_string());
        let event = match &descriptor.source {
            BindingSource::Event { event, .. } => event.clone(),
            BindingSource::Path { .. } => format!("{attribute}-changed"),
            BindingSource::Call { .. } => return,
        };

        if let Some(slot) = child
            .and_then(|c| self.components.get_mut(c))
            .and_then(|c| c.store.slot_mut(&descriptor.target))
        {
            slot.notify = true;
        }

        let target = descriptor.target.clone();
        let listener = self.listen(target_node, &event, move |rt: &mut Runtime, ev: &Event| {
            rt.write_back(id, binding_id, &target, ev);
        });
        if let Some(d) = self.descriptor_mut(id, binding_id, &descriptor.target) {
            d.listener = Some((target_node, event, listener));
        }
    }

    fn write_back(&mut self, id: ComponentId, binding_id: BindingNodeId, target: &str, ev: &Event) {
        let Some(descriptor) = self
            .components
            .get(id)
            .and_then(|i| i.bindings.as_ref())
            .and_then(|tree| tree.descriptor(binding_id, target))
            .cloned()
        else {
            return;
        };
        if descriptor.updating {
            return;
        }

        let value = match &descriptor.source {
            BindingSource::Event { .. } => self.read_target(ev.current_target, target),
            _ => ev.detail.get("value").cloned().unwrap_or_default(),
        };
        if value.is_undefined() {
            return;
        }
        let (path, value) = match &descriptor.source {
            BindingSource::Path { path, negate: true } => (path.clone(), Value::Bool(!value.truthy())),
            BindingSource::Path { path, .. } | BindingSource::Event { path, .. } => {
                (path.clone(), value)
            }
            BindingSource::Call { .. } => return,
        };

        if let Some(d) = self.descriptor_mut(id, binding_id, target) {
            d.updating = true;
            d.value = value.clone();
        }
        self.write_path(id, &path, value);
        if let Some(d) = self.descriptor_mut(id, binding_id, target) {
            d.updating = false;
        }
    }

    /// Current value of a target property: component property, node
    /// property, then attribute text
    fn read_target(&self, node: NodeId, target: &str) -> Value {
        if let Some(child) = self.component(node) {
            if self
                .components
                .get(child)
                .is_some_and(|c| c.ty.schema().contains(target))
            {
                return self.get_property(child, target);
            }
        }
        self.host()
            .property(node, target)
            .or_else(|| {
                self.host()
                    .attribute(node, &to_dash(target))
                    .map(Value::String)
            })
            .unwrap_or_default()
    }

    fn uninstall_write_back(&mut self, descriptor: &BindingDescriptor) {
        if let Some((node, event, listener)) = &descriptor.listener {
            self.unlisten(*node, event, *listener);
        }
    }

    fn refresh_bound_properties(&mut self, id: ComponentId) {
        if let Some(instance) = self.components.get_mut(id) {
            instance.bound_properties = instance
                .bindings
                .as_ref()
                .map(|tree| tree.dependencies())
                .unwrap_or_default();
        }
    }

    fn find_binding_node(&self, id: ComponentId, stable_id: &str) -> Option<BindingNodeId> {
        let instance = self.components.get(id)?;
        let tree = instance.bindings.as_ref()?;
        tree.find_by_stable_id(stable_id).or_else(|| {
            instance
                .refs
                .get(stable_id)
                .and_then(|node| tree.find_by_node(*node))
        })
    }

    /// Binds `target` on the template node `stable_id` to the host
    /// expression `expression` (`name`, `[[name]]` or `{{name}}`).
    /// Replaces an existing binding of that target.
    pub fn add_property_binding(
        &mut self,
        id: ComponentId,
        expression: &str,
        target: &str,
        stable_id: &str,
    ) -> bool {
        let parsed = if has_binding_brackets(expression) {
            parse_binding(expression)
        } else {
            parse_binding(&format!("[[{expression}]]"))
        };
        let Some(parsed) = parsed else {
            tracing::warn!(expression, "unparsable property binding");
            return false;
        };
        let Some(binding_id) = self.find_binding_node(id, stable_id) else {
            tracing::warn!(stable_id, "property binding target not found");
            return false;
        };

        let host_type = self.components.get(id).map(|i| i.ty.clone());
        let property = host_type
            .as_ref()
            .and_then(|ty| source_property(ty.schema(), &parsed.source));
        let descriptor = BindingDescriptor::new(target, parsed, property);

        let replaced = self
            .components
            .get_mut(id)
            .and_then(|i| i.bindings.as_mut())
            .and_then(|tree| tree.get_mut(binding_id))
            .and_then(|binding| binding.data.insert(target.to_string(), descriptor));
        if let Some(old) = replaced {
            self.uninstall_write_back(&old);
        }
        self.refresh_bound_properties(id);

        if self
            .components
            .get(id)
            .is_some_and(|i| i.template_bindings_ready)
        {
            self.push_descriptor(id, binding_id, target);
        }
        true
    }

    /// Removes the binding of `target` on `stable_id`. An empty
    /// `expression` matches any binding; otherwise it must match.
    pub fn remove_property_binding(
        &mut self,
        id: ComponentId,
        expression: &str,
        target: &str,
        stable_id: &str,
    ) -> bool {
        let Some(binding_id) = self.find_binding_node(id, stable_id) else {
            return false;
        };
        let wanted = if expression.is_empty() {
            None
        } else if has_binding_brackets(expression) {
            parse_binding(expression).map(|p| p.expression)
        } else {
            Some(expression.trim().to_string())
        };

        let Some(binding) = self
            .components
            .get_mut(id)
            .and_then(|i| i.bindings.as_mut())
            .and_then(|tree| tree.get_mut(binding_id))
        else {
            return false;
        };
        let matches = binding
            .data
            .get(target)
            .is_some_and(|d| wanted.as_ref().map_or(true, |w| *w == d.expression));
        if !matches {
            return false;
        }
        let removed = binding.data.shift_remove(target);
        if let Some(old) = removed {
            self.uninstall_write_back(&old);
        }
        self.refresh_bound_properties(id);
        true
    }

    /// Last value pushed through the binding of `target` on `stable_id`
    pub fn binding_value(&self, id: ComponentId, stable_id: &str, target: &str) -> Option<Value> {
        let binding_id = self.find_binding_node(id, stable_id)?;
        self.components
            .get(id)?
            .bindings
            .as_ref()?
            .descriptor(binding_id, target)
            .map(|d| d.value().clone())
    }
}

/// Sets `value` at a dotted `path` inside an object value
pub(crate) fn set_path(root: &mut Value, path: &str, value: Value) -> bool {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(map) = current.as_object_mut() else {
            return false;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return true;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Object::new()));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_path() {
        let mut user = Value::Object(Object::new());
        assert!(set_path(&mut user, "address.city", Value::from("Oslo")));
        assert_eq!(user.get_path("address.city"), Some(&Value::from("Oslo")));

        let mut scalar = Value::from(1);
        assert!(!set_path(&mut scalar, "a", Value::from(2)));
    }
}
