//! Error types for webhook delivery operations.
//!
//! Network and timeout failures are transport errors that count as failed
//! delivery attempts; storage and configuration errors are infrastructure
//! faults that propagate to the caller instead of consuming an attempt.

use hookline_core::CoreError;
use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error types for webhook delivery operations.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// HTTP request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Number of seconds before the request timed out
        timeout_seconds: u64,
    },

    /// Delivery-log or settings store operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Storage error message
        message: String,
    },

    /// Invalid delivery configuration.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// Unexpected internal error.
    #[error("internal delivery error: {message}")]
    Internal {
        /// Internal error message
        message: String,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Returns whether this error is a transport failure of the HTTP
    /// attempt itself.
    ///
    /// Transport failures are recorded against the delivery log and remain
    /// eligible for retry; everything else is an infrastructure fault.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

impl From<CoreError> for DeliveryError {
    fn from(error: CoreError) -> Self {
        Self::Storage { message: error.to_string() }
    }
}
