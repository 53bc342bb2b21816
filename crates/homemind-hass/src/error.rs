//! Error types for the Home Assistant client.

use thiserror::Error;

/// Result type for Home Assistant operations.
pub type Result<T> = std::result::Result<T, HassError>;

/// Home Assistant client error types.
#[derive(Debug, Error)]
pub enum HassError {
    /// Network-level failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the API.
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<HassError> for homemind_core::Error {
    fn from(e: HassError) -> Self {
        match &e {
            HassError::Http(inner) if inner.is_timeout() => {
                homemind_core::Error::Timeout(e.to_string())
            }
            _ => homemind_core::Error::HomeAssistant(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = HassError::Status {
            status: 404,
            body: "entity not found".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("entity not found"));
    }

    #[test]
    fn test_conversion_to_core_error() {
        let err: homemind_core::Error = HassError::InvalidResponse("bad json".to_string()).into();
        assert!(matches!(err, homemind_core::Error::HomeAssistant(_)));
    }
}
