//! Host tree interface
//!
//! The runtime never owns the node tree it drives. It reaches it through
//! [`HostTree`], a narrow set of node, attribute, property and listener
//! operations. Listener bodies live with the runtime; the host only records
//! which [`ListenerId`]s are attached to which `(node, event)` pair.

use slotmap::new_key_type;

use crate::value::Value;

new_key_type! {
    /// Handle to a host-tree node
    pub struct NodeId;

    /// Handle to a listener registered with the runtime
    pub struct ListenerId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Text,
}

pub trait HostTree {
    fn create_element(&mut self, tag: &str) -> NodeId;
    fn create_text(&mut self, text: &str) -> NodeId;

    /// The document root. Nodes are connected when it is among their ancestors.
    fn root(&self) -> NodeId;

    fn contains_node(&self, node: NodeId) -> bool;
    fn kind(&self, node: NodeId) -> Option<NodeKind>;

    /// Lowercase tag name of an element
    fn tag(&self, node: NodeId) -> Option<String>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Appends `child` to `parent`, detaching it from its previous parent
    fn append_child(&mut self, parent: NodeId, child: NodeId);

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool;

    /// Text of a text node, or the concatenated descendant text of an element
    fn text(&self, node: NodeId) -> String;

    /// Replaces a text node's text, or an element's children with one text node
    fn set_text(&mut self, node: NodeId, text: &str);

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool;
    fn attribute_names(&self, node: NodeId) -> Vec<String>;

    /// Live (non-attribute) property of a primitive node, e.g. `value`
    fn property(&self, node: NodeId, name: &str) -> Option<Value>;
    fn set_property(&mut self, node: NodeId, name: &str, value: Value);

    fn add_listener(&mut self, node: NodeId, event: &str, listener: ListenerId);
    fn remove_listener(&mut self, node: NodeId, event: &str, listener: ListenerId) -> bool;
    fn listeners(&self, node: NodeId, event: &str) -> Vec<ListenerId>;

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Whether `node` is `ancestor` or lies below it
    fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.is_descendant(node, self.root())
    }

    /// Number of ancestors between `node` and its topmost ancestor
    fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(node);
        while let Some(id) = current {
            depth += 1;
            current = self.parent(id);
        }
        depth
    }

    /// Depth-first, pre-order list of `node`'s descendants (excluding `node`)
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).into_iter().rev());
        }
        out
    }
}
