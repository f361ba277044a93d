//! Custom error types for key-presser.
//!
//! This module provides structured error types using `thiserror`. Note that
//! the run loop never surfaces injection failures; they are logged and
//! dropped inside [`crate::injector::InputInjector`].

use std::io;
use thiserror::Error;

/// Main error type for key-presser operations.
#[derive(Error, Debug)]
pub enum KpError {
    /// The specified key name or code is invalid or unsupported.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// A macro could not be stored as given.
    #[error("invalid macro '{name}': {reason}")]
    InvalidMacro { name: String, reason: String },

    /// Configuration validation error.
    #[error("configuration error: {0}")]
    ConfigValidation(String),

    /// Error reading or parsing configuration file.
    #[error("failed to load config from '{path}': {reason}")]
    ConfigLoad { path: String, reason: String },

    /// Error writing configuration file.
    #[error("failed to save config to '{path}': {reason}")]
    ConfigSave { path: String, reason: String },

    /// The OS refused or only partially accepted a batch of synthetic input.
    #[error("input injection failed: sent {sent} of {expected} events")]
    Injection { sent: usize, expected: usize },

    /// Platform-specific operation is not supported.
    #[error("operation not supported on this platform: {0}")]
    UnsupportedPlatform(String),

    /// Error registering or handling hotkey.
    #[error("hotkey error: {0}")]
    Hotkey(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for key-presser operations.
pub type Result<T> = std::result::Result<T, KpError>;

impl KpError {
    /// Create a new InvalidKey error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidMacro error.
    pub fn invalid_macro(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMacro {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new ConfigValidation error.
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation(message.into())
    }

    /// Create a new ConfigLoad error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new ConfigSave error.
    pub fn config_save(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigSave {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new Injection error.
    pub fn injection(sent: usize, expected: usize) -> Self {
        Self::Injection { sent, expected }
    }

    /// Create a new UnsupportedPlatform error.
    pub fn unsupported_platform(message: impl Into<String>) -> Self {
        Self::UnsupportedPlatform(message.into())
    }

    /// Create a new Hotkey error.
    pub fn hotkey(message: impl Into<String>) -> Self {
        Self::Hotkey(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KpError::invalid_key("xyz", "unknown key name");
        assert_eq!(err.to_string(), "invalid key 'xyz': unknown key name");

        let err = KpError::invalid_macro("", "name cannot be empty");
        assert_eq!(err.to_string(), "invalid macro '': name cannot be empty");

        let err = KpError::injection(1, 4);
        assert_eq!(
            err.to_string(),
            "input injection failed: sent 1 of 4 events"
        );

        let err = KpError::config_validation("delay must be at least 1 second");
        assert_eq!(
            err.to_string(),
            "configuration error: delay must be at least 1 second"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let kp_err: KpError = io_err.into();
        assert!(matches!(kp_err, KpError::Io(_)));
    }
}
