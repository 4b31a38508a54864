//! Logging collaborator
//!
//! Components report through a [`Logger`] rather than straight to `tracing`,
//! so embedders can route messages (and tests can record them).

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Severity of a collaborator message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Warn,
    Error,
}

/// What happens to runtime errors after they are logged
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Log and continue; the failing operation is aborted
    #[default]
    Swallow,
    /// Log and return the error to the caller
    Escalate,
}

pub trait Logger {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards collaborator messages to `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Log => tracing::info!(target: "tessel", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "tessel", "{message}"),
            LogLevel::Error => tracing::error!(target: "tessel", "{message}"),
        }
    }
}

/// Records messages in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MemoryLogger {
    entries: Rc<RefCell<Vec<(LogLevel, String)>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.borrow().clone()
    }

    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.borrow().iter().any(|(_, m)| m.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        tracing::trace!(?level, msg = message, "recorded");
        self.entries.borrow_mut().push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_shares_buffer() {
        let logger = MemoryLogger::new();
        let handle = logger.clone();

        logger.log(LogLevel::Warn, "careful");
        logger.log(LogLevel::Error, "broken");

        assert_eq!(handle.len(), 2);
        assert_eq!(handle.messages(LogLevel::Error), vec!["broken".to_string()]);
        assert!(handle.contains("care"));

        handle.clear();
        assert!(logger.is_empty());
    }
}
