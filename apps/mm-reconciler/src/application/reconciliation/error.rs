//! Reconciliation error types.
//!
//! Only the operator escape hatches return errors. Sync passes report
//! failures as issues.

use crate::application::ports::{GatewayError, StoreError};

/// Errors from reconciliation operations.
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    /// Exchange gateway failed.
    #[error("Exchange unavailable: {0}")]
    ExchangeUnavailable(GatewayError),

    /// Ledger gateway failed.
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(GatewayError),

    /// Local store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_error_display() {
        let err = ReconciliationError::ExchangeUnavailable(GatewayError::Timeout { timeout_ms: 500 });
        assert_eq!(err.to_string(), "Exchange unavailable: Gateway timeout after 500ms");
    }

    #[test]
    fn test_store_error_from() {
        let err: ReconciliationError = StoreError::Storage("disk full".to_string()).into();
        assert_eq!(err.to_string(), "Store error: Storage error: disk full");
    }
}
