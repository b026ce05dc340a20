//! Failure of an external gateway call.

use thiserror::Error;

/// Why a gateway call produced no usable data.
///
/// Any of these must be treated as "unknown", never as "empty".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport failure or non-success status.
    #[error("Gateway unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// Request exceeded its deadline.
    #[error("Gateway timeout after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The response could not be decoded.
    #[error("Invalid gateway response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },
}

impl GatewayError {
    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
