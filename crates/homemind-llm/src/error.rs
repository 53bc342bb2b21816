//! Error types for the reasoning backend.

use thiserror::Error;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Backend error types.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the request.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<LlmError> for homemind_core::Error {
    fn from(e: LlmError) -> Self {
        match &e {
            LlmError::Http(inner) if inner.is_timeout() => {
                homemind_core::Error::Timeout(e.to_string())
            }
            _ => homemind_core::Error::Llm(e.to_string()),
        }
    }
}
