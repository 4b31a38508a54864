//! Tessel Element Runtime
//!
//! Declarative components over a host tree:
//!
//! - **Properties**: typed, validated properties with attribute reflection
//!   and change notification
//! - **Bindings**: `{{two-way}}` and `[[one-way]]` tokens in templates,
//!   pushed host → target and written back target → host
//! - **Templates**: HTML-like markup expanded per instance, with a content
//!   slot for light children
//! - **Lifecycle**: create, configure, template, ready, attach and detach,
//!   with readiness strictly bottom-up
//! - **Modules**: capability bundles of properties, methods and hooks
//! - **Data contexts**: external objects feeding component properties
//!
//! # Example
//!
//! ```rust
//! use tessel_core::{PropertyDescriptor, Value, ValueType};
//! use tessel_element::{ComponentType, Runtime};
//!
//! let mut rt = Runtime::headless();
//! rt.register(
//!     ComponentType::builder("x-greeting")
//!         .property(PropertyDescriptor::new("name", ValueType::String).default("World"))
//!         .template("<p>Hello {{name}}!</p>")
//!         .build(),
//! );
//!
//! let node = rt.create_element("x-greeting");
//! let root = rt.host().root();
//! rt.append_child(root, node);
//!
//! let id = rt.component(node).unwrap();
//! rt.set_property(id, "name", "Tessel").unwrap();
//! assert_eq!(rt.host().text(node), "Hello Tessel!");
//! ```

pub mod binding;
pub mod component;
pub mod config;
pub mod data_context;
pub mod lifecycle;
pub mod method;
pub mod module;
pub mod property;
pub mod registry;
pub mod runtime;
pub mod template;

pub use binding::{
    parse_binding, BindingArg, BindingDescriptor, BindingMode, BindingNode, BindingNodeId,
    BindingSource, BindingTree, EventBinding, ParsedBinding, TEXT_CONTENT,
};
pub use component::{
    ChangeFn, ComponentInstance, ComponentType, ComponentTypeBuilder, HookFn, Hooks, MethodEntry,
    MethodFn, MethodOwner, StaticListener, WatchFn,
};
pub use config::RuntimeConfig;
pub use data_context::{DataContext, DATA_CONTEXT_ATTRIBUTE};
pub use lifecycle::{LifecycleState, ReadinessBarrier};
pub use method::{MethodParam, MethodSignature};
pub use module::{
    default_modules, BindingModule, ErrorModule, LocalizationModule, Module, ModuleHandle,
    ModuleInstance, ModuleState,
};
pub use property::{PropertySlot, PropertyStore, WriteOrigin, WriteToken};
pub use registry::{RegisteredFn, Registry};
pub use runtime::{ComponentId, DataContextId, Event, ListenerFn, Runtime};
pub use template::MarkupNode;
