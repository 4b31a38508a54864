//! Tessel Core
//!
//! The leaf layer of the Tessel component runtime:
//!
//! - **Values**: the dynamically typed [`Value`] every property, attribute and
//!   data-context field is carried in
//! - **Attribute codec**: typed value ⇄ attribute string conversion
//! - **Property schemas**: declarative property metadata per component type
//! - **Errors**: the [`ElementError`] taxonomy and its localization keys
//! - **Collaborators**: the [`Logger`] and [`Localizer`] seams
//! - **Host tree**: the [`HostTree`] interface and the in-memory [`Document`]
//!
//! # Example
//!
//! ```rust
//! use tessel_core::{AttributeCodec, Value, ValueType};
//!
//! let codec = AttributeCodec::new();
//!
//! assert_eq!(codec.deserialize(Some("42"), ValueType::Number, false), Value::Number(42.0));
//! assert_eq!(codec.deserialize(None, ValueType::Boolean, false), Value::Bool(false));
//! assert_eq!(codec.serialize(&Value::Bool(true), ValueType::Boolean, false), Some(String::new()));
//! ```

pub mod codec;
pub mod dom;
pub mod error;
pub mod host;
pub mod i18n;
pub mod log;
pub mod schema;
pub mod value;

pub use codec::AttributeCodec;
pub use dom::Document;
pub use error::{ElementError, Result};
pub use host::{HostTree, ListenerId, NodeId, NodeKind};
pub use i18n::{interpolate, Localizer, MessageCatalog};
pub use log::{ErrorMode, LogLevel, Logger, MemoryLogger, TracingLogger};
pub use schema::{to_camel_case, to_dash, PropertyDescriptor, PropertySchema};
pub use value::{FunctionRef, Object, Value, ValueType};
