//! Configuration errors.
//!
//! Every failure is deterministic: a bad manifest or a bad override will fail
//! the same way on every attempt, so callers surface these as fatal startup
//! errors instead of retrying.

use thiserror::Error;

/// Result type used throughout the crate.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading, overriding, resolving or reading settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Schema error at {path}: {message}")]
    Schema { path: String, message: String },

    #[error("Type mismatch at {path}: {message}")]
    TypeMismatch { path: String, message: String },

    #[error("Path not found: {path}: {reason}")]
    PathNotFound { path: String, reason: String },

    #[error("Unresolved sentinel at {path}: {message}")]
    UnresolvedSentinel { path: String, message: String },

    #[error("Invalid assignment '{text}': {message}")]
    InvalidAssignment { text: String, message: String },
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::Io(_) => 70,
            ConfigError::Parse(_) => 71,
            ConfigError::Schema { .. } => 72,
            ConfigError::TypeMismatch { .. } => 73,
            ConfigError::PathNotFound { .. } => 74,
            ConfigError::UnresolvedSentinel { .. } => 75,
            ConfigError::InvalidAssignment { .. } => 76,
        }
    }

    pub(crate) fn schema(path: impl ToString, message: impl Into<String>) -> Self {
        ConfigError::Schema {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(path: impl ToString, message: impl Into<String>) -> Self {
        ConfigError::TypeMismatch {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(path: impl ToString, reason: impl Into<String>) -> Self {
        ConfigError::PathNotFound {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(path: impl ToString, message: impl Into<String>) -> Self {
        ConfigError::UnresolvedSentinel {
            path: path.to_string(),
            message: message.into(),
        }
    }
}
