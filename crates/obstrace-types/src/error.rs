//! Error types for the observability pipeline.

use thiserror::Error;

/// Main error type shared by every crate in the workspace.
#[derive(Error, Debug)]
pub enum ObsError {
    /// Schema, enum, privacy, or sequence violation in a submitted payload.
    /// `path` identifies the offending field (e.g. `steps[1].metadata.prompt`).
    #[error("validation error at {path}: {message}")]
    Validation { path: String, message: String },

    /// Referenced id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or immutability violation, or an idempotent replay that the
    /// caller should treat as a conflict (e.g. concurrent baseline mutation).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Profile/drift sample size below the configured minimum.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Downstream database or webhook call exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Database unreachable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Unexpected condition; logged with structured context by the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ObsError {
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        ObsError::Validation {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ObsError {
    fn from(error: serde_json::Error) -> Self {
        ObsError::validation("<payload>", format!("malformed JSON: {error}"))
    }
}

impl From<sqlx::Error> for ObsError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::PoolTimedOut => ObsError::Timeout("database pool exhausted".into()),
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
                ObsError::Unavailable(format!("database unreachable: {error}"))
            }
            sqlx::Error::RowNotFound => ObsError::NotFound("row not found".into()),
            _ => ObsError::Internal(format!("database error: {error}")),
        }
    }
}

impl From<config::ConfigError> for ObsError {
    fn from(error: config::ConfigError) -> Self {
        ObsError::Internal(format!("configuration error: {error}"))
    }
}

/// Result type used throughout the workspace.
pub type Result<T> = std::result::Result<T, ObsError>;
