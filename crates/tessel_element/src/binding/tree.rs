//! Binding tree
//!
//! A shadow of a component's expanded template: one [`BindingNode`] per
//! template node, in the same structure, holding the node's binding
//! descriptors and `(event)` listeners. Built once when the template is
//! applied; nodes stay addressable by stable id after their host nodes are
//! relocated.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use tessel_core::{to_camel_case, NodeId, NodeKind, PropertySchema};

use super::parser::{handler_name, parse_binding, parse_event_attribute};
use super::{source_property, BindingDescriptor, TEXT_CONTENT};
use crate::runtime::Runtime;

new_key_type! {
    pub struct BindingNodeId;
}

/// `(event)="handler"` on a template node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBinding {
    pub event: String,
    pub handler: String,
}

#[derive(Clone, Debug)]
pub struct BindingNode {
    pub node: NodeId,
    pub stable_id: Option<String>,
    pub parent: Option<BindingNodeId>,
    pub children: SmallVec<[BindingNodeId; 4]>,
    /// Target property → descriptor
    pub data: IndexMap<String, BindingDescriptor>,
    pub events: Vec<EventBinding>,
}

impl BindingNode {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            stable_id: None,
            parent: None,
            children: SmallVec::new(),
            data: IndexMap::new(),
            events: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BindingTree {
    nodes: SlotMap<BindingNodeId, BindingNode>,
    root: BindingNodeId,
}

impl BindingTree {
    pub(crate) fn new(root: NodeId) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(BindingNode::new(root));
        Self { nodes, root }
    }

    fn insert(&mut self, parent: BindingNodeId, mut node: BindingNode) -> BindingNodeId {
        node.parent = Some(parent);
        let id = self.nodes.insert(node);
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    pub fn root(&self) -> BindingNodeId {
        self.root
    }

    pub fn get(&self, id: BindingNodeId) -> Option<&BindingNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: BindingNodeId) -> Option<&mut BindingNode> {
        self.nodes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order walk from the root
    pub fn iter(&self) -> impl Iterator<Item = (BindingNodeId, &BindingNode)> + '_ {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
            .into_iter()
            .filter_map(move |id| self.nodes.get(id).map(|node| (id, node)))
    }

    pub fn find_by_stable_id(&self, stable_id: &str) -> Option<BindingNodeId> {
        self.iter()
            .find(|(_, node)| node.stable_id.as_deref() == Some(stable_id))
            .map(|(id, _)| id)
    }

    pub fn find_by_node(&self, node: NodeId) -> Option<BindingNodeId> {
        self.iter()
            .find(|(_, binding)| binding.node == node)
            .map(|(id, _)| id)
    }

    pub fn descriptor(&self, id: BindingNodeId, target: &str) -> Option<&BindingDescriptor> {
        self.nodes.get(id).and_then(|node| node.data.get(target))
    }

    pub(crate) fn descriptor_mut(
        &mut self,
        id: BindingNodeId,
        target: &str,
    ) -> Option<&mut BindingDescriptor> {
        self.nodes.get_mut(id).and_then(|node| node.data.get_mut(target))
    }

    /// Number of bound target properties across the tree
    pub fn descriptor_count(&self) -> usize {
        self.nodes.values().map(|node| node.data.len()).sum()
    }

    /// Host properties read by any binding
    pub fn dependencies(&self) -> FxHashSet<String> {
        self.nodes
            .values()
            .flat_map(|node| node.data.values())
            .flat_map(|descriptor| descriptor.dependencies())
            .map(str::to_string)
            .collect()
    }
}

impl Runtime {
    /// Builds the binding tree of `host_node`'s expanded template
    pub(crate) fn build_binding_tree(&self, host_node: NodeId, template: &[NodeId]) -> BindingTree {
        let mut tree = BindingTree::new(host_node);
        let root = tree.root();
        let host_type = self
            .component(host_node)
            .and_then(|id| self.components.get(id))
            .map(|instance| instance.ty.clone());
        let schema = host_type.as_ref().map(|ty| ty.schema());
        for node in template {
            self.build_binding_node(&mut tree, schema, root, *node);
        }
        tracing::trace!(
            nodes = tree.len(),
            bindings = tree.descriptor_count(),
            "binding tree built"
        );
        tree
    }

    fn build_binding_node(
        &self,
        tree: &mut BindingTree,
        schema: Option<&PropertySchema>,
        parent: BindingNodeId,
        node: NodeId,
    ) {
        let host = self.host();
        let Some(kind) = host.kind(node) else {
            return;
        };
        let stable_attribute = &self.config.stable_id_attribute;
        let mut binding = BindingNode::new(node);
        binding.stable_id = host.attribute(node, stable_attribute);

        match kind {
            NodeKind::Text => {
                if let Some(parsed) = parse_binding(&host.text(node)) {
                    let property = schema.and_then(|s| source_property(s, &parsed.source));
                    binding.data.insert(
                        TEXT_CONTENT.to_string(),
                        BindingDescriptor::new(TEXT_CONTENT, parsed, property),
                    );
                }
            }
            NodeKind::Element => {
                let component = self
                    .component(node)
                    .and_then(|id| self.components.get(id))
                    .map(|instance| instance.ty.clone());
                for attribute in host.attribute_names(node) {
                    if &attribute == stable_attribute {
                        continue;
                    }
                    let raw = host.attribute(node, &attribute).unwrap_or_default();
                    if let Some(event) = parse_event_attribute(&attribute) {
                        binding.events.push(EventBinding {
                            event: event.to_string(),
                            handler: handler_name(&raw),
                        });
                        continue;
                    }
                    let Some(parsed) = parse_binding(&raw) else {
                        continue;
                    };
                    let target = component
                        .as_ref()
                        .and_then(|ty| ty.schema().by_attribute(&attribute))
                        .map(|p| p.name().to_string())
                        .unwrap_or_else(|| to_camel_case(&attribute));
                    let property = schema.and_then(|s| source_property(s, &parsed.source));
                    let descriptor = BindingDescriptor::new(target.clone(), parsed, property);
                    binding.data.insert(target, descriptor);
                }
            }
        }

        let id = tree.insert(parent, binding);
        if kind == NodeKind::Element {
            for child in host.children(node) {
                self.build_binding_node(tree, schema, id, child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_mirrors_template() {
        let mut rt = Runtime::headless();
        let host = rt.create_element("x-host");
        let div = rt.create_element("div");
        rt.host_mut().set_attribute(div, "tessel-id", "panel");
        rt.host_mut().set_attribute(div, "title", "[[heading]]");
        rt.host_mut().set_attribute(div, "(click)", "onClick()");
        let text = rt.create_text("Hello {{name}}");
        rt.host_mut().append_child(host, div);
        rt.host_mut().append_child(div, text);

        let tree = rt.build_binding_tree(host, &[div]);
        assert_eq!(tree.len(), 3);

        let panel = tree.find_by_stable_id("panel").unwrap();
        assert_eq!(tree.find_by_node(div), Some(panel));
        let node = tree.get(panel).unwrap();
        assert!(node.data.contains_key("title"));
        assert_eq!(
            node.events,
            vec![EventBinding {
                event: "click".into(),
                handler: "onClick".into()
            }]
        );

        let text_id = tree.find_by_node(text).unwrap();
        assert!(tree.descriptor(text_id, TEXT_CONTENT).is_some());
        assert_eq!(tree.get(text_id).unwrap().parent, Some(panel));

        let deps = tree.dependencies();
        assert!(deps.contains("heading"));
        assert!(deps.contains("name"));
        assert_eq!(tree.descriptor_count(), 2);
    }

    #[test]
    fn test_iter_is_pre_order() {
        let mut rt = Runtime::headless();
        let host = rt.create_element("x-host");
        let a = rt.create_element("a");
        let b = rt.create_element("b");
        let c = rt.create_element("c");
        rt.host_mut().append_child(a, b);
        rt.host_mut().append_child(host, a);
        rt.host_mut().append_child(host, c);

        let tree = rt.build_binding_tree(host, &[a, c]);
        let order: Vec<NodeId> = tree.iter().map(|(_, n)| n.node).collect();
        assert_eq!(order, vec![host, a, b, c]);
    }
}
