//! Unified error type for the workspace.
//!
//! Crate-local error enums convert into this type at crate boundaries so the
//! binary deals with a single error surface.

use thiserror::Error;

/// Result type used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing secret, malformed file). Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Home Assistant API error.
    #[error("Home Assistant error: {0}")]
    HomeAssistant(String),

    /// Reasoning backend error.
    #[error("LLM backend error: {0}")]
    Llm(String),

    /// Persistence error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation timed out.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Chat transport error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
