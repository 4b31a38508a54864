//! In-memory host tree
//!
//! [`Document`] is a plain arena-backed node tree implementing [`HostTree`].
//! It is what the runtime drives in tests and in headless embeddings.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::host::{HostTree, ListenerId, NodeId, NodeKind};
use crate::value::Value;

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    tag: String,
    text: String,
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
    attributes: IndexMap<String, String>,
    properties: FxHashMap<String, Value>,
    listeners: FxHashMap<String, SmallVec<[ListenerId; 2]>>,
}

impl NodeData {
    fn new(kind: NodeKind, tag: &str, text: &str) -> Self {
        Self {
            kind,
            tag: tag.to_ascii_lowercase(),
            text: text.to_string(),
            parent: None,
            children: SmallVec::new(),
            attributes: IndexMap::new(),
            properties: FxHashMap::default(),
            listeners: FxHashMap::default(),
        }
    }
}

/// Arena-backed node tree
#[derive(Debug)]
pub struct Document {
    nodes: SlotMap<NodeId, NodeData>,
    root: NodeId,
}

impl Document {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(NodeData::new(NodeKind::Element, "#document", ""));
        Self { nodes, root }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// First element with `id` attribute equal to `id`, searching from the root
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|node| self.attribute(*node, "id").as_deref() == Some(id))
    }

    /// Elements below `scope` whose tag is `tag`, in document order
    pub fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.descendants(scope)
            .into_iter()
            .filter(|node| self.nodes.get(*node).is_some_and(|n| n.tag == tag))
            .collect()
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.nodes.get(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(data) = self.nodes.get_mut(parent) {
            data.children.retain(|c| *c != child);
        }
        if let Some(data) = self.nodes.get_mut(child) {
            data.parent = None;
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTree for Document {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.insert(NodeData::new(NodeKind::Element, tag, ""))
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.nodes.insert(NodeData::new(NodeKind::Text, "#text", text))
    }

    fn root(&self) -> NodeId {
        self.root
    }

    fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(node).map(|n| n.kind)
    }

    fn tag(&self, node: NodeId) -> Option<String> {
        self.nodes
            .get(node)
            .filter(|n| n.kind == NodeKind::Element)
            .map(|n| n.tag.clone())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node)
            .map(|n| n.children.to_vec())
            .unwrap_or_default()
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child
            || !self.nodes.contains_key(parent)
            || !self.nodes.contains_key(child)
            || self.is_descendant(parent, child)
        {
            tracing::warn!(?parent, ?child, "append_child rejected");
            return;
        }
        self.detach(child);
        if let Some(data) = self.nodes.get_mut(child) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.nodes.get_mut(parent) {
            data.children.push(child);
        }
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child);
        true
    }

    fn text(&self, node: NodeId) -> String {
        let Some(data) = self.nodes.get(node) else {
            return String::new();
        };
        match data.kind {
            NodeKind::Text => data.text.clone(),
            NodeKind::Element => data.children.iter().map(|c| self.text(*c)).collect(),
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        let Some(kind) = self.kind(node) else {
            return;
        };
        match kind {
            NodeKind::Text => {
                if let Some(data) = self.nodes.get_mut(node) {
                    data.text = text.to_string();
                }
            }
            NodeKind::Element => {
                for child in self.children(node) {
                    self.detach(child);
                }
                let text_node = self.create_text(text);
                self.append_child(node, text_node);
            }
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .get(node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.nodes.get_mut(node) {
            data.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool {
        self.nodes
            .get_mut(node)
            .is_some_and(|n| n.attributes.shift_remove(name).is_some())
    }

    fn attribute_names(&self, node: NodeId) -> Vec<String> {
        self.nodes
            .get(node)
            .map(|n| n.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn property(&self, node: NodeId, name: &str) -> Option<Value> {
        self.nodes
            .get(node)
            .and_then(|n| n.properties.get(name).cloned())
    }

    fn set_property(&mut self, node: NodeId, name: &str, value: Value) {
        if let Some(data) = self.nodes.get_mut(node) {
            data.properties.insert(name.to_string(), value);
        }
    }

    fn add_listener(&mut self, node: NodeId, event: &str, listener: ListenerId) {
        if let Some(data) = self.nodes.get_mut(node) {
            data.listeners
                .entry(event.to_string())
                .or_default()
                .push(listener);
        }
    }

    fn remove_listener(&mut self, node: NodeId, event: &str, listener: ListenerId) -> bool {
        let Some(list) = self
            .nodes
            .get_mut(node)
            .and_then(|n| n.listeners.get_mut(event))
        else {
            return false;
        };
        let before = list.len();
        list.retain(|l| *l != listener);
        before != list.len()
    }

    fn listeners(&self, node: NodeId, event: &str) -> Vec<ListenerId> {
        self.nodes
            .get(node)
            .and_then(|n| n.listeners.get(event))
            .map(|l| l.to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_moves_node() {
        let mut doc = Document::new();
        let a = doc.create_element("DIV");
        let b = doc.create_element("span");
        let child = doc.create_text("hi");

        doc.append_child(doc.root(), a);
        doc.append_child(a, child);
        assert_eq!(doc.children(a), vec![child]);

        doc.append_child(b, child);
        assert!(doc.children(a).is_empty());
        assert_eq!(doc.parent(child), Some(b));
        assert_eq!(doc.tag(a).as_deref(), Some("div"));
        assert!(doc.is_connected(a));
        assert!(!doc.is_connected(b));
    }

    #[test]
    fn test_append_rejects_cycles() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner);
        doc.append_child(inner, outer);
        assert_eq!(doc.parent(outer), None);
    }

    #[test]
    fn test_text_content() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let a = doc.create_text("Hello ");
        let b = doc.create_text("World");
        doc.append_child(p, a);
        doc.append_child(p, b);
        assert_eq!(doc.text(p), "Hello World");

        doc.set_text(p, "Bye");
        assert_eq!(doc.text(p), "Bye");
        assert_eq!(doc.children(p).len(), 1);
    }

    #[test]
    fn test_attributes_keep_order() {
        let mut doc = Document::new();
        let el = doc.create_element("x-item");
        doc.set_attribute(el, "b", "1");
        doc.set_attribute(el, "a", "2");
        assert_eq!(doc.attribute_names(el), vec!["b", "a"]);
        assert!(doc.remove_attribute(el, "b"));
        assert!(!doc.remove_attribute(el, "b"));
        assert_eq!(doc.attribute(el, "a").as_deref(), Some("2"));
    }

    #[test]
    fn test_listeners() {
        let mut doc = Document::new();
        let el = doc.create_element("button");
        let mut ids: SlotMap<ListenerId, ()> = SlotMap::with_key();
        let first = ids.insert(());
        let second = ids.insert(());

        doc.add_listener(el, "click", first);
        doc.add_listener(el, "click", second);
        assert_eq!(doc.listeners(el, "click"), vec![first, second]);

        assert!(doc.remove_listener(el, "click", first));
        assert!(!doc.remove_listener(el, "click", first));
        assert_eq!(doc.listeners(el, "click"), vec![second]);
    }

    #[test]
    fn test_depth_and_lookup() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.set_attribute(inner, "id", "target");
        doc.append_child(doc.root(), outer);
        doc.append_child(outer, inner);

        assert_eq!(doc.depth(inner), 2);
        assert_eq!(doc.element_by_id("target"), Some(inner));
        assert_eq!(doc.elements_by_tag(doc.root(), "SPAN"), vec![inner]);
    }
}
