//! Capability modules
//!
//! A [`Module`] is an independent unit of properties, methods and lifecycle
//! hooks that is composed into a component type instead of inherited. Types
//! get the three built-in modules by default:
//!
//! | Module | Properties | Methods |
//! |--------|------------|---------|
//! | [`ErrorModule`] | `rethrowError`, `debugMode` | `log`, `warn`, `error` |
//! | [`LocalizationModule`] | `messages`, `locale`, `localizeFormatFunction` | `localize`, `addMessages` |
//! | [`BindingModule`] | | `addPropertyBinding`, `removePropertyBinding` |
//!
//! Module properties live in the owning component's property store; a
//! [`ModuleHandle`] reads and writes them on the module's behalf.

use std::fmt;
use std::rc::Rc;

use tessel_core::{ElementError, LogLevel, Object, PropertyDescriptor, Value, ValueType};

use crate::component::MethodFn;
use crate::runtime::{ComponentId, Runtime};

pub trait Module {
    /// Unique module name; a type holds at most one module per name
    fn name(&self) -> &str;

    fn properties(&self) -> Vec<PropertyDescriptor> {
        Vec::new()
    }

    fn methods(&self) -> Vec<(String, MethodFn)> {
        Vec::new()
    }

    fn created(&self, _rt: &mut Runtime, _handle: &ModuleHandle) -> anyhow::Result<()> {
        Ok(())
    }

    fn ready(&self, _rt: &mut Runtime, _handle: &ModuleHandle) -> anyhow::Result<()> {
        Ok(())
    }

    fn attached(&self, _rt: &mut Runtime, _handle: &ModuleHandle) -> anyhow::Result<()> {
        Ok(())
    }

    fn detached(&self, _rt: &mut Runtime, _handle: &ModuleHandle) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Pass-through accessor from a module onto its owner's properties
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleHandle {
    owner: ComponentId,
    module: String,
}

impl ModuleHandle {
    pub(crate) fn new(owner: ComponentId, module: &str) -> Self {
        Self {
            owner,
            module: module.to_string(),
        }
    }

    pub fn owner(&self) -> ComponentId {
        self.owner
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn get(&self, rt: &Runtime, property: &str) -> Value {
        rt.get_property(self.owner, property)
    }

    pub fn set(&self, rt: &mut Runtime, property: &str, value: Value) -> Result<bool, ElementError> {
        rt.set_property(self.owner, property, value)
    }
}

/// Lifecycle flags of one module on one instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModuleState {
    pub is_created: bool,
    pub is_ready: bool,
    pub is_attached: bool,
    pub is_detached: bool,
}

/// A module as composed into one component instance
#[derive(Clone)]
pub struct ModuleInstance {
    pub(crate) module: Rc<dyn Module>,
    pub(crate) state: ModuleState,
}

impl ModuleInstance {
    pub(crate) fn new(module: Rc<dyn Module>) -> Self {
        Self {
            module,
            state: ModuleState::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.module.name()
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("name", &self.module.name())
            .field("state", &self.state)
            .finish()
    }
}

/// Lifecycle stage a module hook runs for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ModuleStage {
    Created,
    Ready,
    Attached,
    Detached,
}

impl Runtime {
    /// Flags every module of `id` with `stage` and runs its hook
    pub(crate) fn set_module_state(&mut self, id: ComponentId, stage: ModuleStage) {
        let Some(instance) = self.components.get_mut(id) else {
            return;
        };
        let mut modules = Vec::with_capacity(instance.modules.len());
        for entry in &mut instance.modules {
            match stage {
                ModuleStage::Created => entry.state.is_created = true,
                ModuleStage::Ready => entry.state.is_ready = true,
                ModuleStage::Attached => {
                    entry.state.is_attached = true;
                    entry.state.is_detached = false;
                }
                ModuleStage::Detached => {
                    entry.state.is_detached = true;
                    entry.state.is_attached = false;
                }
            }
            modules.push(entry.module.clone());
        }

        for module in modules {
            let handle = ModuleHandle::new(id, module.name());
            let result = match stage {
                ModuleStage::Created => module.created(self, &handle),
                ModuleStage::Ready => module.ready(self, &handle),
                ModuleStage::Attached => module.attached(self, &handle),
                ModuleStage::Detached => module.detached(self, &handle),
            };
            if let Err(err) = result {
                self.log_callback_error(id, module.name(), &err);
            }
        }
    }
}

/// The modules every component type starts with
pub fn default_modules() -> Vec<Rc<dyn Module>> {
    vec![
        Rc::new(ErrorModule),
        Rc::new(LocalizationModule),
        Rc::new(BindingModule),
    ]
}

fn string_arg(args: &[Value], index: usize) -> String {
    args.get(index)
        .map(Value::to_display_string)
        .unwrap_or_default()
}

fn method<F>(name: &str, f: F) -> (String, MethodFn)
where
    F: Fn(&mut Runtime, ComponentId, &[Value]) -> anyhow::Result<Value> + 'static,
{
    (name.to_string(), Rc::new(f))
}

// ============================================================================
// ErrorModule
// ============================================================================

/// Component-level logging with `debugMode` and `rethrowError` switches
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorModule;

impl Module for ErrorModule {
    fn name(&self) -> &str {
        "ErrorModule"
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::new("rethrowError", ValueType::Boolean)
                .default(false)
                .reflect(false),
            PropertyDescriptor::new("debugMode", ValueType::Boolean)
                .default(true)
                .reflect(false),
        ]
    }

    fn methods(&self) -> Vec<(String, MethodFn)> {
        vec![
            method("log", |rt, id, args| {
                rt.component_log(id, LogLevel::Log, &string_arg(args, 0))?;
                Ok(Value::Undefined)
            }),
            method("warn", |rt, id, args| {
                rt.component_log(id, LogLevel::Warn, &string_arg(args, 0))?;
                Ok(Value::Undefined)
            }),
            method("error", |rt, id, args| {
                rt.component_log(id, LogLevel::Error, &string_arg(args, 0))?;
                Ok(Value::Undefined)
            }),
        ]
    }
}

// ============================================================================
// LocalizationModule
// ============================================================================

/// Per-component message tables and `{{name}}` interpolation
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalizationModule;

impl Module for LocalizationModule {
    fn name(&self) -> &str {
        "LocalizationModule"
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::new("messages", ValueType::Object)
                .default(Object::new())
                .reflect(false),
            PropertyDescriptor::new("locale", ValueType::String)
                .default("en")
                .reflect(false),
            PropertyDescriptor::new("localizeFormatFunction", ValueType::Function)
                .nullable(true)
                .default(Value::Null)
                .reflect(false),
        ]
    }

    fn methods(&self) -> Vec<(String, MethodFn)> {
        vec![
            method("localize", |rt, id, args| {
                let key = string_arg(args, 0);
                let named: Vec<(String, String)> = args
                    .get(1)
                    .and_then(Value::as_object)
                    .map(|map| {
                        map.iter()
                            .map(|(k, v)| (k.clone(), v.to_display_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                let named: Vec<(&str, String)> =
                    named.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
                Ok(rt
                    .localize(id, &key, &named)
                    .map(Value::String)
                    .unwrap_or_default())
            }),
            method("addMessages", |rt, id, args| {
                let locale = string_arg(args, 0);
                let Some(incoming) = args.get(1).and_then(Value::as_object) else {
                    return Ok(Value::Undefined);
                };
                let mut messages = rt
                    .get_property(id, "messages")
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                let table = messages
                    .entry(locale)
                    .or_insert_with(|| Value::Object(Object::new()));
                if let Some(table) = table.as_object_mut() {
                    for (key, value) in incoming {
                        table.insert(key.clone(), value.clone());
                    }
                }
                rt.set_property(id, "messages", Value::Object(messages))?;
                Ok(Value::Undefined)
            }),
        ]
    }
}

// ============================================================================
// BindingModule
// ============================================================================

/// Runtime add/remove of template property bindings
#[derive(Clone, Copy, Debug, Default)]
pub struct BindingModule;

impl Module for BindingModule {
    fn name(&self) -> &str {
        "BindingModule"
    }

    fn methods(&self) -> Vec<(String, MethodFn)> {
        vec![
            method("addPropertyBinding", |rt, id, args| {
                let done = rt.add_property_binding(
                    id,
                    &string_arg(args, 0),
                    &string_arg(args, 1),
                    &string_arg(args, 2),
                );
                Ok(Value::Bool(done))
            }),
            method("removePropertyBinding", |rt, id, args| {
                let done = rt.remove_property_binding(
                    id,
                    &string_arg(args, 0),
                    &string_arg(args, 1),
                    &string_arg(args, 2),
                );
                Ok(Value::Bool(done))
            }),
        ]
    }
}
