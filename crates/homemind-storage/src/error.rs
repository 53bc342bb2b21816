//! Error types for the storage crate.

use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StorageError> for homemind_core::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(inner) => homemind_core::Error::Storage(inner.to_string()),
            StorageError::Serialization(inner) => {
                homemind_core::Error::Serialization(inner.to_string())
            }
        }
    }
}
