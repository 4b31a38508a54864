//! Method dispatch and meta-signatures
//!
//! Public method calls go through [`Runtime::call`]: the instance must be
//! ready, and when the type declares a signature such as
//! `"(a: number, b?: string): boolean"` the arguments are checked before
//! the method runs and the return value after.

use std::sync::OnceLock;

use anyhow::anyhow;
use regex::Regex;
use tessel_core::{ElementError, Result, Value, ValueType};

use crate::runtime::{ComponentId, Runtime};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodParam {
    pub name: String,
    /// Accepted types; empty means any
    pub types: Vec<ValueType>,
    pub optional: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSignature {
    pub params: Vec<MethodParam>,
    /// Accepted return types; `None` for `void`/`any`/unspecified
    pub returns: Option<Vec<ValueType>>,
}

fn signature_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\((?P<params>[^)]*)\)\s*(?::\s*(?P<ret>[\w|?\s]+?))?\s*$")
            .unwrap_or_else(|err| panic!("invalid signature pattern: {err}"))
    })
}

fn param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<name>\w+)\s*(?P<opt>\?)?\s*(?::\s*(?P<ty>[\w|?\s]+?))?\s*$")
            .unwrap_or_else(|err| panic!("invalid parameter pattern: {err}"))
    })
}

/// Parses `number|string` style unions; `any` yields an empty list
fn parse_types(text: &str) -> Option<Vec<ValueType>> {
    let mut types = Vec::new();
    for part in text.split('|') {
        let part = part.trim().trim_end_matches('?');
        if part == "any" {
            return Some(Vec::new());
        }
        types.push(part.parse().ok()?);
    }
    Some(types)
}

fn matches_types(types: &[ValueType], value: &Value) -> bool {
    types.is_empty() || types.iter().any(|ty| ty.accepts(value, false))
}

fn types_label(types: &[ValueType]) -> String {
    types
        .iter()
        .map(ValueType::as_str)
        .collect::<Vec<_>>()
        .join("|")
}

impl MethodSignature {
    pub fn parse(signature: &str) -> Option<Self> {
        let caps = signature_regex().captures(signature)?;
        let params_text = caps.name("params").map_or("", |m| m.as_str()).trim();

        let mut params = Vec::new();
        if !params_text.is_empty() {
            for raw in params_text.split(',') {
                let param = param_regex().captures(raw)?;
                let types = match param.name("ty") {
                    Some(ty) => parse_types(ty.as_str())?,
                    None => Vec::new(),
                };
                params.push(MethodParam {
                    name: param["name"].to_string(),
                    types,
                    optional: param.name("opt").is_some(),
                });
            }
        }

        let returns = match caps.name("ret").map(|m| m.as_str().trim()) {
            None | Some("void") | Some("any") => None,
            Some(ret) => Some(parse_types(ret)?).filter(|types| !types.is_empty()),
        };

        Some(Self { params, returns })
    }

    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }

    pub fn check_args(&self, method: &str, args: &[Value]) -> Result<()> {
        let required = self.required_count();
        if args.len() < required {
            return Err(ElementError::InvalidMethodArgumentCount {
                name: method.to_string(),
                actual: args.len(),
                expected: required,
            });
        }
        for (index, (param, arg)) in self.params.iter().zip(args).enumerate() {
            if param.optional && arg.is_undefined() {
                continue;
            }
            if !matches_types(&param.types, arg) {
                return Err(ElementError::InvalidMethodArgumentType {
                    name: method.to_string(),
                    actual_type: arg.type_name().to_string(),
                    expected_type: types_label(&param.types),
                    index,
                });
            }
        }
        Ok(())
    }

    pub fn check_return(&self, method: &str, value: &Value) -> Result<()> {
        match &self.returns {
            Some(types) if !matches_types(types, value) => {
                Err(ElementError::InvalidMethodReturnType {
                    name: method.to_string(),
                    actual_type: value.type_name().to_string(),
                    expected_type: types_label(types),
                })
            }
            _ => Ok(()),
        }
    }
}

impl Runtime {
    /// Calls a public component method.
    ///
    /// Before the instance is ready this reports
    /// [`ElementError::ElementNotAttached`] and does not invoke the method.
    /// Argument errors abort the call; a mistyped return value is reported
    /// but still returned. Errors raised by the method body are logged.
    pub fn call(&mut self, id: ComponentId, method: &str, args: &[Value]) -> Result<Value> {
        let Some(instance) = self.components.get(id) else {
            return Ok(Value::Undefined);
        };
        let ty = instance.ty.clone();
        let Some(entry) = ty.method(method) else {
            self.report(
                Some(id),
                ElementError::UnknownMethod {
                    element_type: ty.tag().to_string(),
                    name: method.to_string(),
                },
            )?;
            return Ok(Value::Undefined);
        };
        if !instance.is_ready() {
            self.report(Some(id), ElementError::ElementNotAttached)?;
            return Ok(Value::Undefined);
        }

        let signature = ty.signature(method);
        if let Some(signature) = signature {
            if let Err(err) = signature.check_args(method, args) {
                self.report(Some(id), err)?;
                return Ok(Value::Undefined);
            }
        }

        let value = match (entry.func)(self, id, args) {
            Ok(value) => value,
            Err(err) => {
                self.log_callback_error(id, method, &err);
                return Ok(Value::Undefined);
            }
        };

        if let Some(signature) = signature {
            if let Err(err) = signature.check_return(method, &value) {
                self.report(Some(id), err)?;
            }
        }
        Ok(value)
    }

    /// Invokes a method from the dispatch table without readiness or
    /// signature checks (observers, validators, listeners, computed bindings)
    pub(crate) fn invoke_method(
        &mut self,
        id: ComponentId,
        method: &str,
        args: &[Value],
    ) -> anyhow::Result<Value> {
        let func = self
            .components
            .get(id)
            .and_then(|i| i.ty.method(method))
            .map(|entry| entry.func.clone())
            .ok_or_else(|| anyhow!("unknown method '{method}'"))?;
        func(self, id, args)
    }

    pub fn has_method(&self, id: ComponentId, method: &str) -> bool {
        self.components
            .get(id)
            .is_some_and(|i| i.ty.method(method).is_some())
    }
}
