//! Lifecycle controller
//!
//! ```text
//! Unattached → Created → Configured → TemplateApplied → Ready → Attached ⇄ Detached
//! ```
//!
//! - **create**: on instantiation; capability modules get `created`
//! - **configure**: on first connection; host attributes decode into
//!   properties
//! - **apply template**: template expansion, binding tree, content slot
//! - **complete**: once the [`ReadinessBarrier`] clears; first binding push,
//!   `Ready` then `Attached`, listener wiring, when-ready queue
//! - **attach/detach**: toggled as the host moves the node; re-attaching
//!   only rewires listeners
//!
//! A parent waits for every nested component that has not completed yet, so
//! readiness runs strictly bottom-up whatever order children finish in.

use indexmap::IndexMap;
use tessel_core::{ElementError, NodeId, NodeKind, Value, ValueType};

use crate::binding::{BindingMode, TEXT_CONTENT};
use crate::component::{HookFn, Hooks, WiredListener};
use crate::module::ModuleStage;
use crate::property::{has_binding_brackets, WriteOrigin};
use crate::runtime::{ComponentId, Event, Runtime};
use crate::template;

/// Lifecycle state of a component instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    #[default]
    Unattached,
    Created,
    Configured,
    TemplateApplied,
    Ready,
    Attached,
    Detached,
}

impl LifecycleState {
    /// Host attributes have been decoded
    pub fn is_configured(self) -> bool {
        !matches!(self, LifecycleState::Unattached | LifecycleState::Created)
    }

    pub fn is_ready(self) -> bool {
        matches!(
            self,
            LifecycleState::Ready | LifecycleState::Attached | LifecycleState::Detached
        )
    }
}

/// Counted wait for nested components and explicit holds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadinessBarrier {
    pending: usize,
}

impl ReadinessBarrier {
    pub fn hold(&mut self) {
        self.pending += 1;
    }

    /// Drops one hold. Returns `true` when this release cleared the barrier.
    pub fn release(&mut self) -> bool {
        if self.pending == 0 {
            return false;
        }
        self.pending -= 1;
        self.pending == 0
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_clear(&self) -> bool {
        self.pending == 0
    }
}

impl Runtime {
    fn run_hook(&mut self, id: ComponentId, name: &str, pick: fn(&Hooks) -> Option<HookFn>) {
        let Some(hook) = self.components.get(id).and_then(|i| pick(i.ty.hooks())) else {
            return;
        };
        if let Err(err) = hook(self, id) {
            self.log_callback_error(id, name, &err);
        }
    }

    fn set_state(&mut self, id: ComponentId, state: LifecycleState) {
        if let Some(instance) = self.components.get_mut(id) {
            tracing::trace!(tag = instance.ty.tag(), uid = instance.uid, ?state, "lifecycle");
            instance.state = state;
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    pub(crate) fn create(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        if instance.state != LifecycleState::Unattached {
            return;
        }
        self.set_state(id, LifecycleState::Created);
        self.set_module_state(id, ModuleStage::Created);
        self.run_hook(id, "created", |h| h.created.clone());
    }

    /// Brings a component into the live tree: first connection configures
    /// and expands it, later ones re-attach it
    pub(crate) fn connect(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        match instance.state {
            LifecycleState::Created => {
                if self.loading {
                    if !self.pending.contains(&id) {
                        self.pending.push(id);
                    }
                    return;
                }
                self.configure(id);
                self.apply_template(id);
            }
            LifecycleState::Detached => self.attached(id),
            _ => {}
        }
    }

    /// Decodes present host attributes into their properties
    pub(crate) fn configure(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        if instance.state != LifecycleState::Created {
            return;
        }
        let ty = instance.ty.clone();
        let node = instance.node;

        for attribute in self.host().attribute_names(node) {
            let Some(descriptor) = ty.schema().by_attribute(&attribute) else {
                continue;
            };
            let Some(mut raw) = self.host().attribute(node, &attribute) else {
                continue;
            };
            if has_binding_brackets(&raw) {
                continue;
            }
            if descriptor.value_type() == ValueType::Boolean && raw == "false" {
                self.host_mut().set_attribute(node, &attribute, "");
                raw.clear();
            }

            let value =
                self.codec
                    .deserialize(Some(&raw), descriptor.value_type(), descriptor.is_nullable());
            if matches!(value, Value::Number(n) if n.is_nan()) && raw.trim() != "NaN" {
                tracing::warn!(tag = ty.tag(), attribute = %attribute, raw = %raw, "attribute is not a number");
            }
            if value.is_undefined() {
                continue;
            }
            if let Err(err) = self.write_property(id, descriptor.name(), value, WriteOrigin::Attribute) {
                tracing::debug!(error = %err, "attribute rejected during configure");
            }
        }

        self.set_state(id, LifecycleState::Configured);

        for descriptor in ty.schema().iter() {
            if descriptor.reflects()
                && descriptor.reflects_default()
                && !self.host().has_attribute(node, descriptor.attribute())
            {
                let value = self.get_property(id, descriptor.name());
                self.reflect_attribute(node, descriptor, &value);
            }
        }

        self.resolve_context_attribute(id);
    }

    /// Expands the template, builds the binding tree, moves light children
    /// into the content slot and starts waiting for nested components
    pub(crate) fn apply_template(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        if instance.state != LifecycleState::Configured {
            return;
        }
        let ty = instance.ty.clone();
        let node = instance.node;
        let light = self.host().children(node);

        let mut template_nodes = Vec::new();
        let mut relocate = false;
        if let Some(markup) = ty.template() {
            match template::parse(markup) {
                Ok(markup) => {
                    for child in &light {
                        self.host_mut().remove_child(node, *child);
                    }
                    let previous = self.template_owner.replace(id);
                    template_nodes = self.materialize(&markup, node);
                    self.template_owner = previous;
                    relocate = true;
                }
                Err(reason) => self.report_detached(
                    Some(id),
                    ElementError::InvalidTemplate {
                        element_type: ty.tag().to_string(),
                        reason,
                    },
                ),
            }
        }

        let (refs, content) = self.assign_stable_ids(node, &template_nodes);
        let tree = self.build_binding_tree(node, &template_nodes);

        let mut light_text = String::new();
        if relocate {
            let text_only = !light.is_empty()
                && light
                    .iter()
                    .all(|c| self.host().kind(*c) == Some(NodeKind::Text));
            let content_binds_text = tree.iter().any(|(_, b)| {
                self.host().parent(b.node) == Some(content)
                    && b.data
                        .get(TEXT_CONTENT)
                        .is_some_and(|d| d.mode == BindingMode::TwoWay)
            });
            if text_only && content_binds_text {
                light_text = light
                    .iter()
                    .map(|c| self.host().text(*c))
                    .collect::<String>()
                    .trim()
                    .to_string();
            } else {
                for child in &light {
                    self.host_mut().append_child(content, *child);
                }
            }
        }

        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        instance.bound_properties = tree.dependencies();
        instance.bindings = Some(tree);
        instance.refs = refs;
        instance.content = Some(content);
        instance.light_html = light_text;
        instance.barrier.hold();
        self.set_state(id, LifecycleState::TemplateApplied);

        let waiting_on: Vec<ComponentId> = self
            .components_in(node)
            .into_iter()
            .filter(|child| *child != id)
            .filter(|child| self.components.get(*child).is_some_and(|c| !c.completed))
            .collect();
        for child in &waiting_on {
            if let Some(instance) = self.components.get_mut(*child) {
                if !instance.completion_waiters.contains(&id) {
                    instance.completion_waiters.push(id);
                    if let Some(parent) = self.components.get_mut(id) {
                        parent.barrier.hold();
                    }
                }
            }
        }
        tracing::debug!(tag = ty.tag(), children = waiting_on.len(), "template applied");

        for child in waiting_on {
            self.connect(child);
        }
        self.release_ready(id);
    }

    /// Maps template elements to stable ids: their `id` attributes, or
    /// `child<i>` for every element when the template has none.
    /// Returns the refs map and the content slot.
    fn assign_stable_ids(
        &mut self,
        node: NodeId,
        template_nodes: &[NodeId],
    ) -> (IndexMap<String, NodeId>, NodeId) {
        let host = self.host();
        let mut elements: Vec<NodeId> = template_nodes
            .iter()
            .flat_map(|n| std::iter::once(*n).chain(host.descendants(*n)))
            .filter(|n| host.kind(*n) == Some(NodeKind::Element))
            .collect();

        let root = elements.first().copied().unwrap_or(node);
        let slot = elements
            .iter()
            .copied()
            .find(|n| host.tag(*n).as_deref() == Some("content"));
        let mut content = None;
        if let Some(slot) = slot {
            elements.retain(|n| *n != slot);
            if let Some(parent) = self.host().parent(slot) {
                self.host_mut().remove_child(parent, slot);
                content = Some(parent);
            }
        }
        let content = content
            .or_else(|| {
                elements
                    .iter()
                    .copied()
                    .find(|n| self.host().has_attribute(*n, "inner-h-t-m-l"))
            })
            .unwrap_or(root);

        let stable_attribute = self.config.stable_id_attribute.clone();
        let has_ids = elements.iter().any(|n| self.host().has_attribute(*n, "id"));
        let mut refs = IndexMap::new();
        for (index, element) in elements.iter().enumerate() {
            let stable = if has_ids {
                self.host().attribute(*element, "id")
            } else {
                Some(format!("child{index}"))
            };
            if let Some(stable) = stable {
                self.host_mut()
                    .set_attribute(*element, &stable_attribute, &stable);
                refs.insert(stable, *element);
            }
        }
        refs.insert("root".to_string(), root);
        refs.insert("content".to_string(), content);
        (refs, content)
    }

    /// First binding push, `Ready`, `Attached`, listener wiring and the
    /// when-ready queue. Runs once.
    fn complete(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        if instance.completed || instance.state != LifecycleState::TemplateApplied {
            return;
        }
        let ty = instance.ty.clone();
        let mut owner = instance.owner;

        let missing: Vec<&str> = ty
            .requires()
            .iter()
            .map(String::as_str)
            .filter(|name| !ty.has_module(name))
            .collect();
        if !missing.is_empty() {
            self.report_detached(
                Some(id),
                ElementError::MissingCapabilityReference {
                    element_type: ty.tag().to_string(),
                    missing: missing.join(", "),
                },
            );
        }

        let mut owners = Vec::new();
        while let Some(current) = owner {
            owners.push(current);
            owner = self.components.get(current).and_then(|i| i.owner);
        }
        for owner in owners.into_iter().rev() {
            let pending = self
                .components
                .get(owner)
                .is_some_and(|o| !o.template_bindings_ready);
            if pending {
                self.push_template_bindings(owner);
            }
        }
        self.push_template_bindings(id);

        self.set_state(id, LifecycleState::Ready);
        self.set_module_state(id, ModuleStage::Ready);
        self.run_hook(id, "ready", |h| h.ready.clone());

        self.set_state(id, LifecycleState::Attached);
        self.set_module_state(id, ModuleStage::Attached);
        self.run_hook(id, "attached", |h| h.attached.clone());

        self.wire_listeners(id);

        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        instance.completed = true;
        tracing::debug!(tag = ty.tag(), uid = instance.uid, "component ready");
        self.run_hook(id, "completed", |h| h.completed.clone());

        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        let queued = std::mem::take(&mut instance.when_ready);
        for callback in queued {
            if let Err(err) = callback(self, id) {
                self.log_callback_error(id, "when_ready", &err);
            }
        }

        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        let waiters = std::mem::take(&mut instance.completion_waiters);
        for parent in waiters {
            self.release_ready(parent);
        }
    }

    /// Re-attachment after a detach: rewires listeners only
    pub(crate) fn attached(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        if instance.state != LifecycleState::Detached {
            return;
        }
        let node = instance.node;
        let owner = instance.owner;

        self.set_state(id, LifecycleState::Attached);
        self.set_module_state(id, ModuleStage::Attached);
        self.run_hook(id, "attached", |h| h.attached.clone());
        self.wire_listeners(id);

        if let Some(owner) = owner {
            let owner_node = self.components.get(owner).map(|o| o.node);
            if owner_node.is_some_and(|o| self.host().is_descendant(node, o)) {
                if let Some(owner) = self.components.get_mut(owner) {
                    owner.detached_children.retain(|c| *c != id);
                }
            }
        }
    }

    /// The node left the live tree (or moved). Components relocated out of
    /// their owner's subtree are remembered by the owner.
    pub(crate) fn detached(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        let node = instance.node;
        let owner = instance.owner;

        if instance.state == LifecycleState::Attached {
            self.unwire_listeners(id);
            self.set_state(id, LifecycleState::Detached);
            self.set_module_state(id, ModuleStage::Detached);
            self.run_hook(id, "detached", |h| h.detached.clone());
        }
        self.pending.retain(|p| *p != id);

        let Some(owner) = owner else {
            return;
        };
        let Some(owner_node) = self.components.get(owner).map(|o| o.node) else {
            return;
        };
        if !self.host().is_descendant(node, owner_node) {
            if let Some(owner) = self.components.get_mut(owner) {
                if !owner.detached_children.contains(&id) {
                    owner.detached_children.push(id);
                }
            }
        }
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    fn wire_listeners(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get(id) else {
            return;
        };
        if !instance.wired.is_empty() {
            return;
        }
        let node = instance.node;
        let mut targets: Vec<(NodeId, String, String)> = Vec::new();
        for listener in instance.ty.listeners() {
            let target = match &listener.target {
                None => Some(node),
                Some(name) => instance.refs.get(name).copied(),
            };
            match target {
                Some(target) => {
                    targets.push((target, listener.event.clone(), listener.handler.clone()))
                }
                None => tracing::warn!(
                    tag = instance.ty.tag(),
                    target = ?listener.target,
                    "listener target not found"
                ),
            }
        }
        if let Some(tree) = &instance.bindings {
            for (_, binding) in tree.iter() {
                for event in &binding.events {
                    targets.push((binding.node, event.event.clone(), event.handler.clone()));
                }
            }
        }

        let mut wired = Vec::with_capacity(targets.len());
        for (target, event, handler) in targets {
            let listener = self.listen(target, &event, move |rt: &mut Runtime, ev: &Event| {
                if let Err(err) = rt.invoke_method(id, &handler, &[ev.detail.clone()]) {
                    rt.log_callback_error(id, &handler, &err);
                }
            });
            wired.push(WiredListener {
                node: target,
                event,
                listener,
            });
        }
        if let Some(instance) = self.components.get_mut(id) {
            instance.wired = wired;
        }
    }

    fn unwire_listeners(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        for wired in std::mem::take(&mut instance.wired) {
            self.unlisten(wired.node, &wired.event, wired.listener);
        }
    }

    // ========================================================================
    // Barrier
    // ========================================================================

    /// Delays completion until a matching [`Runtime::release_ready`]
    pub fn hold_ready(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        if instance.completed {
            tracing::warn!(tag = instance.ty.tag(), "hold_ready after completion ignored");
            return;
        }
        instance.barrier.hold();
    }

    /// Drops one hold; the component completes when none remain
    pub fn release_ready(&mut self, id: ComponentId) {
        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        if instance.barrier.release() && instance.state == LifecycleState::TemplateApplied {
            self.complete(id);
        }
    }

    // ========================================================================
    // Loading gate
    // ========================================================================

    /// Queues component connections until [`Runtime::finish_loading`]
    pub fn begin_loading(&mut self) {
        self.loading = true;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Connects queued components shallowest first and resolves named data
    /// contexts that were still missing
    pub fn finish_loading(&mut self) {
        if !self.loading {
            return;
        }
        self.loading = false;
        let mut queued = std::mem::take(&mut self.pending);
        queued.sort_by_key(|id| {
            self.components
                .get(*id)
                .map_or(usize::MAX, |i| self.host().depth(i.node))
        });
        tracing::debug!(count = queued.len(), "host tree loaded");
        for id in queued {
            let connected = self
                .components
                .get(id)
                .is_some_and(|i| self.host().is_connected(i.node));
            if connected {
                self.connect(id);
            }
        }
        self.resolve_pending_contexts();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_counts() {
        let mut barrier = ReadinessBarrier::default();
        assert!(barrier.is_clear());
        assert!(!barrier.release());

        barrier.hold();
        barrier.hold();
        assert_eq!(barrier.pending(), 2);
        assert!(!barrier.release());
        assert!(barrier.release());
        assert!(barrier.is_clear());
    }

    #[test]
    fn test_state_predicates() {
        assert!(!LifecycleState::Created.is_configured());
        assert!(LifecycleState::TemplateApplied.is_configured());
        assert!(!LifecycleState::TemplateApplied.is_ready());
        assert!(LifecycleState::Attached.is_ready());
        assert!(LifecycleState::Detached.is_ready());
    }

    #[test]
    fn test_stable_ids_fall_back_to_child_index() {
        let mut rt = Runtime::headless();
        rt.register(
            crate::ComponentType::builder("x-card")
                .template("<div><span>a</span><content></content></div>")
                .build(),
        );
        let node = rt.create_element("x-card");
        let light = rt.create_text("light");
        rt.host_mut().append_child(node, light);
        let root = rt.host().root();
        rt.append_child(root, node);

        let id = rt.component(node).unwrap();
        let instance = rt.instance(id).unwrap();
        let div = instance.node_ref("child0").unwrap();
        assert_eq!(instance.node_ref("root"), Some(div));
        assert_eq!(instance.content(), Some(div));
        assert!(instance.node_ref("child1").is_some());
        assert_eq!(rt.host().attribute(div, "tessel-id").as_deref(), Some("child0"));
        assert_eq!(rt.host().parent(light), Some(div));
        assert!(rt
            .host()
            .descendants(node)
            .iter()
            .all(|n| rt.host().tag(*n).as_deref() != Some("content")));
    }
}
