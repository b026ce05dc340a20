//! Ledger adapter error types.

use thiserror::Error;

use crate::application::ports::GatewayError;

/// Errors from the HTTP ledger adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerHttpError {
    /// Client construction or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Body did not match the expected schema.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Retries exhausted.
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Attempts made.
        attempts: u32,
        /// Error of the final attempt.
        last_error: String,
    },

    /// No wallet configured or supplied.
    #[error("No wallet configured")]
    MissingWallet,
}

impl From<LedgerHttpError> for GatewayError {
    fn from(err: LedgerHttpError) -> Self {
        match err {
            LedgerHttpError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            LedgerHttpError::JsonParse(message) => Self::InvalidResponse { message },
            other => Self::Unavailable {
                message: other.to_string(),
            },
        }
    }
}
