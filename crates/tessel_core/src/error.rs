//! Error taxonomy
//!
//! Every failure the runtime reports maps to one [`ElementError`] variant.
//! Each variant carries a localization key and the named arguments of its
//! message, so a [`Localizer`](crate::Localizer) can render it in the
//! component's locale. The `Display` form is the English message.

use thiserror::Error;

use crate::log::LogLevel;

/// Component runtime error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ElementError {
    #[error("'{name}' property is with undefined 'type' member!")]
    UnknownPropertyType { name: String },

    #[error("Invalid '{name}' property value! Actual value: '{actual}', Expected value: '{expected}'!")]
    InvalidPropertyValue {
        name: String,
        actual: String,
        expected: String,
    },

    #[error("Invalid '{name}' property value type! Actual type: '{actual_type}', Expected type: '{expected_type}'!")]
    InvalidPropertyValueType {
        name: String,
        actual_type: String,
        expected_type: String,
    },

    #[error("Invalid '{name}' method argument value type! Actual type: '{actual_type}', Expected type: '{expected_type}' for argument with index: '{index}'!")]
    InvalidMethodArgumentType {
        name: String,
        actual_type: String,
        expected_type: String,
        index: usize,
    },

    #[error("Invalid '{name}' method arguments count! Actual arguments count: '{actual}', Expected at least: '{expected}' argument(s)!")]
    InvalidMethodArgumentCount {
        name: String,
        actual: usize,
        expected: usize,
    },

    #[error("Invalid '{name}' method return type! Actual type: '{actual_type}', Expected type: '{expected_type}'!")]
    InvalidMethodReturnType {
        name: String,
        actual_type: String,
        expected_type: String,
    },

    #[error("{element_type}: Missing reference to '{missing}'.")]
    MissingCapabilityReference {
        element_type: String,
        missing: String,
    },

    #[error("Element does not exist in DOM! Please, add the element to the DOM, before invoking a method.")]
    ElementNotAttached,

    #[error("{element_type}: invalid template: {reason}")]
    InvalidTemplate {
        element_type: String,
        reason: String,
    },

    #[error("{element_type}: unknown method '{name}'")]
    UnknownMethod { element_type: String, name: String },
}

impl ElementError {
    /// Localization key of the message
    pub fn message_key(&self) -> &'static str {
        match self {
            ElementError::UnknownPropertyType { .. } => "propertyUnknownType",
            ElementError::InvalidPropertyValue { .. } => "propertyInvalidValue",
            ElementError::InvalidPropertyValueType { .. } => "propertyInvalidValueType",
            ElementError::InvalidMethodArgumentType { .. } => "methodInvalidValueType",
            ElementError::InvalidMethodArgumentCount { .. } => "methodInvalidArgumentsCount",
            ElementError::InvalidMethodReturnType { .. } => "methodInvalidReturnType",
            ElementError::MissingCapabilityReference { .. } => "missingReference",
            ElementError::ElementNotAttached => "elementNotInDOM",
            ElementError::InvalidTemplate { .. } => "invalidTemplate",
            ElementError::UnknownMethod { .. } => "methodUnknown",
        }
    }

    /// Level the error is logged at. Type mismatches on a property write,
    /// missing capability modules and broken templates are errors; the
    /// rest are plain log lines.
    pub fn log_level(&self) -> LogLevel {
        match self {
            ElementError::InvalidPropertyValueType { .. }
            | ElementError::MissingCapabilityReference { .. }
            | ElementError::InvalidTemplate { .. } => LogLevel::Error,
            ElementError::UnknownPropertyType { .. }
            | ElementError::InvalidPropertyValue { .. }
            | ElementError::InvalidMethodArgumentType { .. }
            | ElementError::InvalidMethodArgumentCount { .. }
            | ElementError::InvalidMethodReturnType { .. }
            | ElementError::ElementNotAttached
            | ElementError::UnknownMethod { .. } => LogLevel::Log,
        }
    }

    /// Named message arguments, keyed the way message templates spell them
    pub fn message_args(&self) -> Vec<(&'static str, String)> {
        match self {
            ElementError::UnknownPropertyType { name } => vec![("name", name.clone())],
            ElementError::InvalidPropertyValue {
                name,
                actual,
                expected,
            } => vec![
                ("name", name.clone()),
                ("actualValue", actual.clone()),
                ("value", expected.clone()),
            ],
            ElementError::InvalidPropertyValueType {
                name,
                actual_type,
                expected_type,
            }
            | ElementError::InvalidMethodReturnType {
                name,
                actual_type,
                expected_type,
            } => vec![
                ("name", name.clone()),
                ("actualType", actual_type.clone()),
                ("type", expected_type.clone()),
            ],
            ElementError::InvalidMethodArgumentType {
                name,
                actual_type,
                expected_type,
                index,
            } => vec![
                ("name", name.clone()),
                ("actualType", actual_type.clone()),
                ("type", expected_type.clone()),
                ("argumentIndex", index.to_string()),
            ],
            ElementError::InvalidMethodArgumentCount {
                name,
                actual,
                expected,
            } => vec![
                ("name", name.clone()),
                ("actualArgumentsCount", actual.to_string()),
                ("argumentsCount", expected.to_string()),
            ],
            ElementError::MissingCapabilityReference {
                element_type,
                missing,
            } => vec![
                ("elementType", element_type.clone()),
                ("files", missing.clone()),
            ],
            ElementError::ElementNotAttached => Vec::new(),
            ElementError::InvalidTemplate {
                element_type,
                reason,
            } => vec![
                ("elementType", element_type.clone()),
                ("property", "template".to_string()),
                ("reason", reason.clone()),
            ],
            ElementError::UnknownMethod { element_type, name } => vec![
                ("elementType", element_type.clone()),
                ("name", name.clone()),
            ],
        }
    }
}

/// Result type for component runtime operations
pub type Result<T> = std::result::Result<T, ElementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_english_message() {
        let err = ElementError::InvalidPropertyValueType {
            name: "count".into(),
            actual_type: "string".into(),
            expected_type: "number".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid 'count' property value type! Actual type: 'string', Expected type: 'number'!"
        );
        assert_eq!(err.message_key(), "propertyInvalidValueType");
    }

    #[test]
    fn test_message_args() {
        let err = ElementError::InvalidMethodArgumentCount {
            name: "add".into(),
            actual: 1,
            expected: 2,
        };
        let args = err.message_args();
        assert!(args.contains(&("argumentsCount", "2".to_string())));
        assert!(args.contains(&("actualArgumentsCount", "1".to_string())));
    }

    #[test]
    fn test_log_levels() {
        let mismatch = ElementError::InvalidPropertyValueType {
            name: "count".into(),
            actual_type: "string".into(),
            expected_type: "number".into(),
        };
        assert_eq!(mismatch.log_level(), LogLevel::Error);

        let not_allowed = ElementError::InvalidPropertyValue {
            name: "mode".into(),
            actual: "zzz".into(),
            expected: "a, b".into(),
        };
        assert_eq!(not_allowed.log_level(), LogLevel::Log);
        assert_eq!(ElementError::ElementNotAttached.log_level(), LogLevel::Log);
    }
}
