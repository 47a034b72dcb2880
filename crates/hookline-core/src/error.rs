//! Error types and result handling for core operations.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type shared across the delivery pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input rejected at a boundary.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
