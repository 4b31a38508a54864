//! Runtime configuration
//!
//! Loaded from a `tessel.toml` style file or built in code. Every field has
//! a default, so an empty file is a valid configuration.
//!
//! ```toml
//! error_mode = "escalate"
//! debug_mode = true
//! locale = "en"
//! stable_id_attribute = "tessel-id"
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tessel_core::ErrorMode;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Swallow (log) or escalate (return) runtime errors
    pub error_mode: ErrorMode,
    /// Whether errors are written to the logger at all
    pub debug_mode: bool,
    /// Locale used when a component does not set its own
    pub locale: String,
    /// Attribute carrying a template node's stable id
    pub stable_id_attribute: String,
    /// Publish `<attribute>-changed` events for notifying properties
    pub dispatch_change_events: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Swallow,
            debug_mode: true,
            locale: "en".to_string(),
            stable_id_attribute: "tessel-id".to_string(),
            dispatch_change_events: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse runtime configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize runtime configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            error_mode = "escalate"
            locale = "de"
            "#,
        )
        .unwrap();
        assert_eq!(config.error_mode, ErrorMode::Escalate);
        assert_eq!(config.locale, "de");
        assert!(config.debug_mode);
        assert_eq!(config.stable_id_attribute, "tessel-id");
    }

    #[test]
    fn test_round_trip() {
        let config = RuntimeConfig {
            debug_mode: false,
            ..RuntimeConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(RuntimeConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        assert!(RuntimeConfig::from_toml_str("error_mode = 3").is_err());
    }
}
