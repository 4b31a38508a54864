//! Component types and instances
//!
//! A [`ComponentType`] is the static description of a tag: its property
//! schema, template, methods, static listeners, capability modules and
//! lifecycle hooks. It is assembled with a [`ComponentTypeBuilder`], resolved
//! against its base types once at build time, and composed with its
//! capability modules once at registration.
//!
//! A [`ComponentInstance`] is one live occurrence of a type, bound to a host
//! node and owned by the [`Runtime`](crate::Runtime).
//!
//! # Example
//!
//! ```rust
//! use tessel_core::{PropertyDescriptor, Value, ValueType};
//! use tessel_element::ComponentType;
//!
//! let counter = ComponentType::builder("x-counter")
//!     .property(PropertyDescriptor::new("count", ValueType::Number).default(0))
//!     .template("<span>{{count}}</span>")
//!     .method("increment", |rt, id, _args| {
//!         let next = rt.get_property(id, "count").as_f64().unwrap_or(0.0) + 1.0;
//!         rt.set_property(id, "count", Value::Number(next))?;
//!         Ok(Value::Undefined)
//!     })
//!     .build();
//!
//! assert_eq!(counter.tag(), "x-counter");
//! ```

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tessel_core::{ListenerId, NodeId, PropertyDescriptor, PropertySchema, Value};

use crate::binding::BindingTree;
use crate::data_context::ContextBinding;
use crate::lifecycle::{LifecycleState, ReadinessBarrier};
use crate::method::MethodSignature;
use crate::module::{Module, ModuleInstance};
use crate::property::PropertyStore;
use crate::runtime::{ComponentId, Runtime};

/// Component method body: `(runtime, self, args) -> return value`
pub type MethodFn = Rc<dyn Fn(&mut Runtime, ComponentId, &[Value]) -> anyhow::Result<Value>>;

/// Lifecycle hook body
pub type HookFn = Rc<dyn Fn(&mut Runtime, ComponentId) -> anyhow::Result<()>>;

/// Property change handler: `(runtime, self, property, old, new)`
pub type ChangeFn =
    Rc<dyn Fn(&mut Runtime, ComponentId, &str, &Value, &Value) -> anyhow::Result<()>>;

/// Who provides a method in the dispatch table
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MethodOwner {
    Component,
    Module(String),
}

#[derive(Clone)]
pub struct MethodEntry {
    pub owner: MethodOwner,
    pub func: MethodFn,
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Listener declared on the type, wired when an instance completes.
///
/// `target` is a template ref (stable id) or `None` for the host node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticListener {
    pub target: Option<String>,
    pub event: String,
    pub handler: String,
}

#[derive(Clone, Default)]
pub struct Hooks {
    pub created: Option<HookFn>,
    pub ready: Option<HookFn>,
    pub attached: Option<HookFn>,
    pub detached: Option<HookFn>,
    pub completed: Option<HookFn>,
    pub property_changed: Option<ChangeFn>,
}

impl Hooks {
    fn or(self, base: &Hooks) -> Hooks {
        Hooks {
            created: self.created.or_else(|| base.created.clone()),
            ready: self.ready.or_else(|| base.ready.clone()),
            attached: self.attached.or_else(|| base.attached.clone()),
            detached: self.detached.or_else(|| base.detached.clone()),
            completed: self.completed.or_else(|| base.completed.clone()),
            property_changed: self
                .property_changed
                .or_else(|| base.property_changed.clone()),
        }
    }
}

// ============================================================================
// ComponentType
// ============================================================================

/// Static description of a component tag
#[derive(Clone)]
pub struct ComponentType {
    tag: String,
    schema: PropertySchema,
    template: Option<String>,
    own_methods: IndexMap<String, MethodFn>,
    methods: IndexMap<String, MethodEntry>,
    signatures: FxHashMap<String, MethodSignature>,
    listeners: Vec<StaticListener>,
    modules: Vec<Rc<dyn Module>>,
    requires: Vec<String>,
    hooks: Hooks,
}

impl ComponentType {
    pub fn builder(tag: impl Into<String>) -> ComponentTypeBuilder {
        ComponentTypeBuilder::new(tag)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn schema(&self) -> &PropertySchema {
        &self.schema
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn signature(&self, name: &str) -> Option<&MethodSignature> {
        self.signatures.get(name)
    }

    pub fn listeners(&self) -> &[StaticListener] {
        &self.listeners
    }

    pub fn modules(&self) -> &[Rc<dyn Module>] {
        &self.modules
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name() == name)
    }

    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Composes capability modules into the type and builds the method
    /// dispatch table.
    ///
    /// Modules are added once per name; the component's own methods come
    /// first, then each module's in order, and the first owner of a name
    /// keeps it.
    pub(crate) fn compose(&mut self, defaults: &[Rc<dyn Module>]) {
        let declared = std::mem::take(&mut self.modules);
        for module in defaults.iter().chain(declared.iter()) {
            self.add_module(module.clone());
        }
        self.methods.clear();
        for (name, func) in &self.own_methods {
            self.methods.insert(
                name.clone(),
                MethodEntry {
                    owner: MethodOwner::Component,
                    func: func.clone(),
                },
            );
        }
        for module in &self.modules {
            merge_module_methods(&mut self.methods, module.as_ref());
        }
    }

    /// Adds one module. Returns `false` if a module of that name is present.
    pub(crate) fn add_module(&mut self, module: Rc<dyn Module>) -> bool {
        if self.has_module(module.name()) {
            return false;
        }
        for descriptor in module.properties() {
            self.schema.declare_if_absent(descriptor);
        }
        merge_module_methods(&mut self.methods, module.as_ref());
        self.modules.push(module);
        true
    }
}

fn merge_module_methods(table: &mut IndexMap<String, MethodEntry>, module: &dyn Module) {
    for (name, func) in module.methods() {
        table.entry(name).or_insert_with(|| MethodEntry {
            owner: MethodOwner::Module(module.name().to_string()),
            func,
        });
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("tag", &self.tag)
            .field("properties", &self.schema.names().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field(
                "modules",
                &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct ComponentTypeBuilder {
    tag: String,
    schema: PropertySchema,
    template: Option<String>,
    methods: IndexMap<String, MethodFn>,
    signatures: FxHashMap<String, MethodSignature>,
    invalid_signatures: Vec<String>,
    listeners: Vec<StaticListener>,
    modules: Vec<Rc<dyn Module>>,
    requires: Vec<String>,
    hooks: Hooks,
    bases: Vec<ComponentType>,
}

impl ComponentTypeBuilder {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            schema: PropertySchema::new(),
            template: None,
            methods: IndexMap::new(),
            signatures: FxHashMap::default(),
            invalid_signatures: Vec::new(),
            listeners: Vec::new(),
            modules: Vec::new(),
            requires: Vec::new(),
            hooks: Hooks::default(),
            bases: Vec::new(),
        }
    }

    pub fn property(mut self, descriptor: PropertyDescriptor) -> Self {
        self.schema.declare(descriptor);
        self
    }

    pub fn template(mut self, markup: impl Into<String>) -> Self {
        self.template = Some(markup.into());
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Runtime, ComponentId, &[Value]) -> anyhow::Result<Value> + 'static,
    {
        self.methods.insert(name.into(), Rc::new(func));
        self
    }

    /// Declares a method's meta-signature, e.g. `"(a: number, b?: string): boolean"`
    pub fn signature(mut self, method: impl Into<String>, signature: &str) -> Self {
        let method = method.into();
        match MethodSignature::parse(signature) {
            Some(parsed) => {
                self.signatures.insert(method, parsed);
            }
            None => self.invalid_signatures.push(method),
        }
        self
    }

    /// Wires `handler` to `event`. `"button.click"` targets the template
    /// ref `button`; a bare event name targets the host node.
    pub fn listen(mut self, event: &str, handler: impl Into<String>) -> Self {
        let (target, event) = match event.split_once('.') {
            Some((target, event)) => (Some(target.to_string()), event.to_string()),
            None => (None, event.to_string()),
        };
        self.listeners.push(StaticListener {
            target,
            event,
            handler: handler.into(),
        });
        self
    }

    pub fn module(mut self, module: Rc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Names a capability module instances of this type cannot work without
    pub fn requires(mut self, module_name: impl Into<String>) -> Self {
        self.requires.push(module_name.into());
        self
    }

    /// Inherits static members from `base`. Members declared on this type
    /// win over the base's.
    pub fn extends(mut self, base: &ComponentType) -> Self {
        self.bases.push(base.clone());
        self
    }

    pub fn on_created<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Runtime, ComponentId) -> anyhow::Result<()> + 'static,
    {
        self.hooks.created = Some(Rc::new(f));
        self
    }

    pub fn on_ready<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Runtime, ComponentId) -> anyhow::Result<()> + 'static,
    {
        self.hooks.ready = Some(Rc::new(f));
        self
    }

    pub fn on_attached<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Runtime, ComponentId) -> anyhow::Result<()> + 'static,
    {
        self.hooks.attached = Some(Rc::new(f));
        self
    }

    pub fn on_detached<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Runtime, ComponentId) -> anyhow::Result<()> + 'static,
    {
        self.hooks.detached = Some(Rc::new(f));
        self
    }

    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Runtime, ComponentId) -> anyhow::Result<()> + 'static,
    {
        self.hooks.completed = Some(Rc::new(f));
        self
    }

    pub fn on_property_changed<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Runtime, ComponentId, &str, &Value, &Value) -> anyhow::Result<()> + 'static,
    {
        self.hooks.property_changed = Some(Rc::new(f));
        self
    }

    pub fn build(self) -> ComponentType {
        let mut ty = ComponentType {
            tag: self.tag,
            schema: self.schema,
            template: self.template,
            own_methods: self.methods,
            methods: IndexMap::new(),
            signatures: self.signatures,
            listeners: self.listeners,
            modules: self.modules,
            requires: self.requires,
            hooks: self.hooks,
        };

        for name in self.invalid_signatures {
            tracing::warn!(tag = %ty.tag, method = %name, "ignoring unparsable method signature");
        }

        for base in &self.bases {
            ty.schema.merge_base(&base.schema);
            if ty.template.is_none() {
                ty.template = base.template.clone();
            }
            for (name, func) in &base.own_methods {
                ty.own_methods
                    .entry(name.clone())
                    .or_insert_with(|| func.clone());
            }
            for (name, signature) in &base.signatures {
                ty.signatures
                    .entry(name.clone())
                    .or_insert_with(|| signature.clone());
            }
            let mut listeners = base.listeners.clone();
            listeners.retain(|l| !ty.listeners.contains(l));
            listeners.append(&mut ty.listeners);
            ty.listeners = listeners;

            let mut modules = base.modules.clone();
            modules.extend(ty.modules.drain(..));
            ty.modules = modules;

            for require in &base.requires {
                if !ty.requires.contains(require) {
                    ty.requires.push(require.clone());
                }
            }
            ty.hooks = std::mem::take(&mut ty.hooks).or(&base.hooks);
        }

        for (name, func) in &ty.own_methods {
            ty.methods.insert(
                name.clone(),
                MethodEntry {
                    owner: MethodOwner::Component,
                    func: func.clone(),
                },
            );
        }
        ty
    }
}

// ============================================================================
// ComponentInstance
// ============================================================================

/// Callback registered by [`Runtime::watch`]
pub type WatchFn = Rc<dyn Fn(&mut Runtime, ComponentId, &str, &Value, &Value)>;

pub(crate) struct Watcher {
    pub properties: Vec<String>,
    pub callback: WatchFn,
}

/// Listener attached by the instance, removed again on detach
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct WiredListener {
    pub node: NodeId,
    pub event: String,
    pub listener: ListenerId,
}

/// One live component
pub struct ComponentInstance {
    pub(crate) uid: u64,
    pub(crate) ty: Rc<ComponentType>,
    pub(crate) node: NodeId,
    pub(crate) owner: Option<ComponentId>,
    pub(crate) store: PropertyStore,
    pub(crate) bindings: Option<BindingTree>,
    pub(crate) state: LifecycleState,
    pub(crate) modules: Vec<ModuleInstance>,
    pub(crate) refs: IndexMap<String, NodeId>,
    pub(crate) content: Option<NodeId>,
    pub(crate) light_html: String,
    pub(crate) detached_children: Vec<ComponentId>,
    pub(crate) barrier: ReadinessBarrier,
    pub(crate) completed: bool,
    pub(crate) completion_waiters: Vec<ComponentId>,
    pub(crate) when_ready: Vec<HookFn>,
    pub(crate) wired: Vec<WiredListener>,
    pub(crate) watcher: Option<Watcher>,
    pub(crate) template_bindings_ready: bool,
    pub(crate) bound_properties: FxHashSet<String>,
    pub(crate) in_change_handler: bool,
    pub(crate) data_context: Option<ContextBinding>,
    pub(crate) updating_data_context: bool,
}

impl ComponentInstance {
    pub(crate) fn new(
        uid: u64,
        ty: Rc<ComponentType>,
        node: NodeId,
        owner: Option<ComponentId>,
    ) -> Self {
        let store = PropertyStore::from_schema(ty.schema());
        let modules = ty
            .modules()
            .iter()
            .map(|m| ModuleInstance::new(m.clone()))
            .collect();
        Self {
            uid,
            ty,
            node,
            owner,
            store,
            bindings: None,
            state: LifecycleState::Unattached,
            modules,
            refs: IndexMap::new(),
            content: None,
            light_html: String::new(),
            detached_children: Vec::new(),
            barrier: ReadinessBarrier::default(),
            completed: false,
            completion_waiters: Vec::new(),
            when_ready: Vec::new(),
            wired: Vec::new(),
            watcher: None,
            template_bindings_ready: false,
            bound_properties: FxHashSet::default(),
            in_change_handler: false,
            data_context: None,
            updating_data_context: false,
        }
    }

    /// Process-unique instance id
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn tag(&self) -> &str {
        self.ty.tag()
    }

    pub fn component_type(&self) -> &ComponentType {
        &self.ty
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn owner(&self) -> Option<ComponentId> {
        self.owner
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Template node by stable id (`root` and `content` are always present
    /// once the template is applied)
    pub fn node_ref(&self, name: &str) -> Option<NodeId> {
        self.refs.get(name).copied()
    }

    pub fn refs(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.refs.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn content(&self) -> Option<NodeId> {
        self.content
    }

    pub fn detached_children(&self) -> &[ComponentId] {
        &self.detached_children
    }

    pub fn modules(&self) -> &[ModuleInstance] {
        &self.modules
    }

    pub fn bindings(&self) -> Option<&BindingTree> {
        self.bindings.as_ref()
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.store.value(name)
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("uid", &self.uid)
            .field("tag", &self.ty.tag())
            .field("node", &self.node)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
