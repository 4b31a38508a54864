//! Runtime
//!
//! The [`Runtime`] owns the host tree, the type registry, every component
//! instance, event listeners and data contexts. All component code receives
//! `&mut Runtime`, so re-entrant calls (a change handler writing another
//! property, a listener detaching itself) flow through one place.
//!
//! # Example
//!
//! ```rust
//! use tessel_core::{PropertyDescriptor, ValueType};
//! use tessel_element::{ComponentType, Runtime};
//!
//! let mut rt = Runtime::headless();
//! rt.register(
//!     ComponentType::builder("x-counter")
//!         .property(PropertyDescriptor::new("count", ValueType::Number).default(0))
//!         .build(),
//! );
//!
//! let node = rt.create_element("x-counter");
//! let root = rt.host().root();
//! rt.append_child(root, node);
//!
//! let id = rt.component(node).unwrap();
//! rt.set_property(id, "count", 5).unwrap();
//! assert_eq!(rt.host().attribute(node, "count").as_deref(), Some("5"));
//! ```

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use tessel_core::{
    AttributeCodec, Document, ElementError, ErrorMode, HostTree, ListenerId, LogLevel, Localizer,
    Logger, MessageCatalog, NodeId, Object, Result, TracingLogger, Value,
};

use crate::component::{ComponentInstance, ComponentType, HookFn};
use crate::config::RuntimeConfig;
use crate::data_context::DataContext;
use crate::module::Module;
use crate::registry::Registry;

new_key_type! {
    /// Handle to a live component instance
    pub struct ComponentId;
    /// Handle to an external data object
    pub struct DataContextId;
}

// ============================================================================
// Events
// ============================================================================

/// Event dispatched through the host tree
#[derive(Clone, Debug)]
pub struct Event {
    pub kind: String,
    pub target: NodeId,
    pub current_target: NodeId,
    pub detail: Value,
    pub bubbles: bool,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target,
            current_target: target,
            detail: Value::Undefined,
            bubbles: true,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn non_bubbling(mut self) -> Self {
        self.bubbles = false;
        self
    }

    /// `<attribute>-changed` notification with `{ value, oldValue }` detail
    pub fn changed(attribute: &str, node: NodeId, old: &Value, new: &Value) -> Self {
        let mut detail = Object::new();
        detail.insert("value".to_string(), new.clone());
        detail.insert("oldValue".to_string(), old.clone());
        Event::new(format!("{attribute}-changed"), node)
            .with_detail(detail)
            .non_bubbling()
    }
}

/// Event listener body
pub type ListenerFn = Rc<dyn Fn(&mut Runtime, &Event)>;

// ============================================================================
// Runtime
// ============================================================================

pub struct Runtime {
    host: Box<dyn HostTree>,
    pub(crate) codec: AttributeCodec,
    pub(crate) registry: Registry,
    pub(crate) components: SlotMap<ComponentId, ComponentInstance>,
    pub(crate) by_node: FxHashMap<NodeId, ComponentId>,
    listeners: SlotMap<ListenerId, ListenerFn>,
    pub(crate) contexts: SlotMap<DataContextId, DataContext>,
    pub(crate) named_contexts: FxHashMap<String, DataContextId>,
    pub(crate) config: RuntimeConfig,
    pub(crate) logger: Rc<dyn Logger>,
    localizer: Rc<dyn Localizer>,
    /// Owner assigned to components created while a template is expanded
    pub(crate) template_owner: Option<ComponentId>,
    pub(crate) loading: bool,
    pub(crate) pending: Vec<ComponentId>,
    next_uid: u64,
}

impl Runtime {
    pub fn new(host: impl HostTree + 'static) -> Self {
        Self::with_config(host, RuntimeConfig::default())
    }

    pub fn with_config(host: impl HostTree + 'static, config: RuntimeConfig) -> Self {
        let mut catalog = MessageCatalog::english();
        catalog.set_locale(config.locale.clone());
        Self {
            host: Box::new(host),
            codec: AttributeCodec::new(),
            registry: Registry::new(),
            components: SlotMap::with_key(),
            by_node: FxHashMap::default(),
            listeners: SlotMap::with_key(),
            contexts: SlotMap::with_key(),
            named_contexts: FxHashMap::default(),
            config,
            logger: Rc::new(TracingLogger),
            localizer: Rc::new(catalog),
            template_owner: None,
            loading: false,
            pending: Vec::new(),
            next_uid: 1,
        }
    }

    /// Runtime over an empty in-memory [`Document`]
    pub fn headless() -> Self {
        Self::new(Document::new())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn set_logger(&mut self, logger: Rc<dyn Logger>) {
        self.logger = logger;
    }

    pub fn set_localizer(&mut self, localizer: Rc<dyn Localizer>) {
        self.localizer = localizer;
    }

    pub fn host(&self) -> &dyn HostTree {
        self.host.as_ref()
    }

    /// Direct host access. Mutations made here bypass lifecycle tracking;
    /// use [`Runtime::append_child`] and friends for component nodes.
    pub fn host_mut(&mut self) -> &mut dyn HostTree {
        self.host.as_mut()
    }

    pub fn codec(&self) -> &AttributeCodec {
        &self.codec
    }

    /// Global registry used by the codec for named objects and functions
    pub fn codec_mut(&mut self) -> &mut AttributeCodec {
        &mut self.codec
    }

    pub fn component(&self, node: NodeId) -> Option<ComponentId> {
        self.by_node.get(&node).copied()
    }

    pub fn instance(&self, id: ComponentId) -> Option<&ComponentInstance> {
        self.components.get(id)
    }

    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.keys()
    }

    // ========================================================================
    // Types and modules
    // ========================================================================

    /// Adds a capability module to a registered type and to its live
    /// instances. Returns `false` if the type is unknown or already has a
    /// module of that name.
    pub fn add_module(&mut self, tag: &str, module: Rc<dyn Module>) -> bool {
        let Some(ty) = self.registry.get(tag) else {
            return false;
        };
        let mut updated = ComponentType::clone(&ty);
        if !updated.add_module(module.clone()) {
            return false;
        }
        let updated = Rc::new(updated);
        self.registry.replace(updated.clone());

        let ids: Vec<ComponentId> = self
            .components
            .iter()
            .filter(|(_, i)| i.ty.tag() == tag)
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            if let Some(instance) = self.components.get_mut(id) {
                instance.ty = updated.clone();
                for descriptor in updated.schema().iter() {
                    instance.store.ensure(descriptor);
                }
                instance
                    .modules
                    .push(crate::module::ModuleInstance::new(module.clone()));
            }
        }
        tracing::debug!(tag, module = module.name(), "module added");
        true
    }

    // ========================================================================
    // Host tree
    // ========================================================================

    /// Creates an element; registered tags get a component instance
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let node = self.host.create_element(tag);
        if let Some(ty) = self.registry.get(tag) {
            let owner = self.template_owner;
            self.instantiate(node, ty, owner);
        }
        node
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.host.create_text(text)
    }

    pub(crate) fn instantiate(
        &mut self,
        node: NodeId,
        ty: Rc<ComponentType>,
        owner: Option<ComponentId>,
    ) -> ComponentId {
        let uid = self.next_uid;
        self.next_uid += 1;
        let tag = ty.tag().to_string();
        let id = self
            .components
            .insert(ComponentInstance::new(uid, ty, node, owner));
        self.by_node.insert(node, id);
        tracing::trace!(tag = %tag, uid, "component instantiated");
        self.create(id);
        id
    }

    /// Appends `child` under `parent`, moving it if it already has a parent.
    ///
    /// Components in a subtree that leaves the live tree are detached;
    /// components in a subtree that enters it are connected, in document
    /// order.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let was_connected = self.host.is_connected(child);
        self.host.append_child(parent, child);
        if self.host.parent(child) != Some(parent) {
            return;
        }
        let subtree = self.components_in(child);
        if was_connected {
            for id in &subtree {
                self.detached(*id);
            }
        }
        if self.host.is_connected(child) {
            for id in subtree {
                self.connect(id);
            }
        }
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let was_connected = self.host.is_connected(child);
        if !self.host.remove_child(parent, child) {
            return false;
        }
        if was_connected {
            for id in self.components_in(child) {
                self.detached(id);
            }
        }
        true
    }

    /// Component instances at or below `node`, in document order
    pub(crate) fn components_in(&self, node: NodeId) -> Vec<ComponentId> {
        std::iter::once(node)
            .chain(self.host.descendants(node))
            .filter_map(|n| self.component(n))
            .collect()
    }

    /// Sets an attribute; component hosts decode it into the property
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.host.set_attribute(node, name, value);
        match self.component(node) {
            Some(id) => self.attribute_changed(id, name, Some(value)),
            None => Ok(()),
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<()> {
        if !self.host.remove_attribute(node, name) {
            return Ok(());
        }
        match self.component(node) {
            Some(id) => self.attribute_changed(id, name, None),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn listen<F>(&mut self, node: NodeId, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&mut Runtime, &Event) + 'static,
    {
        let listener = self.listeners.insert(Rc::new(callback));
        self.host.add_listener(node, event, listener);
        listener
    }

    /// Removes a listener. Safe to call repeatedly and from inside the
    /// listener itself.
    pub fn unlisten(&mut self, node: NodeId, event: &str, listener: ListenerId) -> bool {
        let removed = self.listeners.remove(listener).is_some();
        self.host.remove_listener(node, event, listener);
        removed
    }

    /// Dispatches `event` at `node`, then up the ancestor chain if it bubbles
    pub fn dispatch_event(&mut self, node: NodeId, mut event: Event) {
        event.target = node;
        let mut current = Some(node);
        while let Some(at) = current {
            event.current_target = at;
            for listener in self.host.listeners(at, &event.kind) {
                let Some(callback) = self.listeners.get(listener).cloned() else {
                    continue;
                };
                callback(self, &event);
            }
            if !event.bubbles {
                break;
            }
            current = self.host.parent(at);
        }
    }

    // ========================================================================
    // Readiness
    // ========================================================================

    /// Runs `callback` once the instance has completed (immediately if it
    /// already has)
    pub fn when_ready<F>(&mut self, id: ComponentId, callback: F)
    where
        F: Fn(&mut Runtime, ComponentId) -> anyhow::Result<()> + 'static,
    {
        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        if !instance.completed {
            let callback: HookFn = Rc::new(callback);
            instance.when_ready.push(callback);
            return;
        }
        if let Err(err) = callback(self, id) {
            self.log_callback_error(id, "when_ready", &err);
        }
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    /// Routes a runtime error to the logger.
    ///
    /// Logged at the error's own [`ElementError::log_level`]. Returns the
    /// error when the runtime escalates errors, or for error-level reports
    /// when the component sets `rethrowError`; otherwise it is only logged.
    pub fn report(&mut self, id: Option<ComponentId>, err: ElementError) -> Result<()> {
        let args = err.message_args();
        let message = self
            .localize_message(id, err.message_key(), &args)
            .unwrap_or_else(|| err.to_string());
        let level = err.log_level();
        let component_debug = id.map_or(true, |id| {
            self.get_property(id, "debugMode").as_bool().unwrap_or(true)
        });
        if self.config.debug_mode && component_debug {
            self.logger.log(level, &message);
        }
        tracing::debug!(key = err.message_key(), ?level, "runtime error reported");

        let rethrow = level == LogLevel::Error
            && id.is_some_and(|id| {
                self.get_property(id, "rethrowError")
                    .as_bool()
                    .unwrap_or(false)
            });
        if self.config.error_mode == ErrorMode::Escalate || rethrow {
            return Err(err);
        }
        Ok(())
    }

    /// Reports from a lifecycle transition, which has no caller to return to
    pub(crate) fn report_detached(&mut self, id: Option<ComponentId>, err: ElementError) {
        if let Err(err) = self.report(id, err) {
            tracing::error!(error = %err, "unhandled runtime error");
        }
    }

    /// Component-level log line, filtered by the component's `debugMode`.
    ///
    /// Error-level lines are returned as errors when the component sets
    /// `rethrowError`.
    pub fn component_log(
        &mut self,
        id: ComponentId,
        level: LogLevel,
        message: &str,
    ) -> anyhow::Result<()> {
        let Some(instance) = self.components.get(id) else {
            return Ok(());
        };
        let line = format!("{}: {}", instance.ty.tag(), message);
        if self.get_property(id, "debugMode").as_bool().unwrap_or(true) {
            self.logger.log(level, &line);
        }
        if level == LogLevel::Error
            && self
                .get_property(id, "rethrowError")
                .as_bool()
                .unwrap_or(false)
        {
            anyhow::bail!(line);
        }
        Ok(())
    }

    /// Logs an error returned by a consumer callback. Never propagates.
    pub(crate) fn log_callback_error(&mut self, id: ComponentId, callback: &str, err: &anyhow::Error) {
        let tag = self
            .components
            .get(id)
            .map(|i| i.ty.tag().to_string())
            .unwrap_or_default();
        tracing::error!(tag = %tag, callback, error = %err, "component callback failed");
        self.logger
            .log(LogLevel::Error, &format!("{tag}: {callback} failed: {err:#}"));
    }

    // ========================================================================
    // Localization
    // ========================================================================

    /// Renders a message key for a component: its own `messages` table
    /// (formatted by `localizeFormatFunction` when set) first, then the
    /// runtime localizer
    pub fn localize(&self, id: ComponentId, key: &str, args: &[(&str, String)]) -> Option<String> {
        self.localize_message(Some(id), key, args)
    }

    fn localize_message(
        &self,
        id: Option<ComponentId>,
        key: &str,
        args: &[(&str, String)],
    ) -> Option<String> {
        if let Some(id) = id {
            if let Some(message) = self.component_message(id, key, args) {
                return Some(message);
            }
        }
        self.localizer.localize(key, args)
    }

    fn component_message(&self, id: ComponentId, key: &str, args: &[(&str, String)]) -> Option<String> {
        let locale = match self.get_property(id, "locale") {
            Value::String(locale) if !locale.is_empty() => locale,
            _ => self.config.locale.clone(),
        };
        let messages = self.get_property(id, "messages");
        let template = messages.get(&locale)?.get(key)?.as_str()?.to_string();

        if let Value::Function(format) = self.get_property(id, "localizeFormatFunction") {
            let named: Object = args
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
                .collect();
            if let Value::String(formatted) =
                format.call(&[Value::String(template.clone()), Value::Object(named)])
            {
                return Some(formatted);
            }
        }
        Some(tessel_core::interpolate(&template, args))
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("components", &self.components.len())
            .field("listeners", &self.listeners.len())
            .field("contexts", &self.contexts.len())
            .field("loading", &self.loading)
            .finish_non_exhaustive()
    }
}
