// src/error.rs
// Typed error taxonomy for the memory engine

use thiserror::Error;

/// Errors surfaced by the engine's core components.
///
/// The split matters operationally: background workers retry `Transient`
/// failures with backoff and dead-letter everything else, while the HTTP
/// layer maps each variant onto a fixed status code.
#[derive(Debug, Error)]
pub enum EngramError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient upstream failure: {0}")]
    Transient(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("unusable model output: {0}")]
    LlmParse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngramError {
    /// Whether a background job that hit this error should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngramError::Transient(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        EngramError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngramError::NotFound(msg.into())
    }
}

impl From<sqlx::Error> for EngramError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => EngramError::NotFound("row not found".to_string()),
            other => EngramError::Store(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for EngramError {
    fn from(err: reqwest::Error) -> Self {
        // Timeouts, connection drops and mid-body failures all qualify for
        // worker retry; status-code classification happens at the call site
        // where the response is still available.
        EngramError::Transient(err.to_string())
    }
}

impl From<serde_json::Error> for EngramError {
    fn from(err: serde_json::Error) -> Self {
        EngramError::LlmParse(err.to_string())
    }
}

pub type Result<T, E = EngramError> = std::result::Result<T, E>;
