//! Tag → component type table
//!
//! One [`Registry`] lives inside each [`Runtime`] for the runtime's whole
//! lifetime. Types are composed with the default capability modules when
//! registered; registering late upgrades matching nodes already in the tree.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::component::ComponentType;
use crate::module::{default_modules, Module};
use crate::runtime::{ComponentId, Runtime};

/// Callback run once a tag is registered
pub type RegisteredFn = Box<dyn FnOnce(&mut Runtime)>;

pub struct Registry {
    types: FxHashMap<String, Rc<ComponentType>>,
    default_modules: Vec<Rc<dyn Module>>,
    waiting: FxHashMap<String, Vec<RegisteredFn>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            types: FxHashMap::default(),
            default_modules: default_modules(),
            waiting: FxHashMap::default(),
        }
    }

    pub fn get(&self, tag: &str) -> Option<Rc<ComponentType>> {
        self.types.get(&tag.to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.types.contains_key(&tag.to_ascii_lowercase())
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub(crate) fn replace(&mut self, ty: Rc<ComponentType>) {
        self.types.insert(ty.tag().to_string(), ty);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Registers a component type.
    ///
    /// Returns `false` if the tag is already taken. Schema problems are
    /// reported but do not prevent registration.
    pub fn register(&mut self, mut ty: ComponentType) -> bool {
        if self.registry.contains(ty.tag()) {
            tracing::warn!(tag = ty.tag(), "tag already registered");
            return false;
        }
        ty.compose(&self.registry.default_modules);
        for err in ty.schema().validate() {
            self.report_detached(None, err);
        }

        let ty = Rc::new(ty);
        let tag = ty.tag().to_string();
        self.registry.replace(ty.clone());
        tracing::debug!(tag = %tag, "component type registered");

        if let Some(callbacks) = self.registry.waiting.remove(&tag) {
            for callback in callbacks {
                callback(self);
            }
        }

        self.upgrade(&ty);
        true
    }

    /// Modules composed into every type registered from now on
    pub fn set_default_modules(&mut self, modules: Vec<Rc<dyn Module>>) {
        self.registry.default_modules = modules;
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.registry.contains(tag)
    }

    pub fn component_type(&self, tag: &str) -> Option<Rc<ComponentType>> {
        self.registry.get(tag)
    }

    /// Runs `callback` once `tag` is registered (immediately if it is)
    pub fn when_registered<F>(&mut self, tag: &str, callback: F)
    where
        F: FnOnce(&mut Runtime) + 'static,
    {
        if self.registry.contains(tag) {
            callback(self);
            return;
        }
        self.registry
            .waiting
            .entry(tag.to_ascii_lowercase())
            .or_default()
            .push(Box::new(callback));
    }

    /// Instantiates nodes of a freshly registered tag that are already in
    /// the live tree
    fn upgrade(&mut self, ty: &Rc<ComponentType>) {
        let root = self.host().root();
        let nodes: Vec<_> = self
            .host()
            .descendants(root)
            .into_iter()
            .filter(|node| {
                self.host().tag(*node).as_deref() == Some(ty.tag())
                    && self.component(*node).is_none()
            })
            .collect();

        let mut upgraded = Vec::with_capacity(nodes.len());
        for node in nodes {
            let owner = self.nearest_component(node);
            upgraded.push(self.instantiate(node, ty.clone(), owner));
        }
        if !upgraded.is_empty() {
            tracing::debug!(tag = ty.tag(), count = upgraded.len(), "upgraded existing nodes");
        }
        for id in upgraded {
            self.connect(id);
        }
    }

    fn nearest_component(&self, node: tessel_core::NodeId) -> Option<ComponentId> {
        let mut current = self.host().parent(node);
        while let Some(at) = current {
            if let Some(id) = self.component(at) {
                return Some(id);
            }
            current = self.host().parent(at);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tessel_core::{PropertyDescriptor, ValueType};

    #[test]
    fn test_register_composes_default_modules() {
        let mut rt = Runtime::headless();
        assert!(rt.register(ComponentType::builder("x-a").build()));
        assert!(!rt.register(ComponentType::builder("X-A").build()));

        let ty = rt.component_type("x-a").unwrap();
        assert!(ty.has_module("ErrorModule"));
        assert!(ty.has_module("LocalizationModule"));
        assert!(ty.has_module("BindingModule"));
    }

    #[test]
    fn test_when_registered() {
        let mut rt = Runtime::headless();
        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        rt.when_registered("x-late", move |_| seen.set(seen.get() + 1));
        assert_eq!(hits.get(), 0);

        rt.register(ComponentType::builder("x-late").build());
        assert_eq!(hits.get(), 1);

        let seen = hits.clone();
        rt.when_registered("x-late", move |_| seen.set(seen.get() + 1));
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_late_registration_upgrades_nodes() {
        let mut rt = Runtime::headless();
        let node = rt.create_element("x-late");
        rt.host_mut().set_attribute(node, "count", "3");
        let root = rt.host().root();
        rt.append_child(root, node);
        assert!(rt.component(node).is_none());

        rt.register(
            ComponentType::builder("x-late")
                .property(PropertyDescriptor::new("count", ValueType::Number).default(0))
                .build(),
        );
        let id = rt.component(node).unwrap();
        assert!(rt.instance(id).unwrap().is_ready());
        assert_eq!(rt.get_property(id, "count").as_f64(), Some(3.0));
    }
}
