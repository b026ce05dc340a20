//! Audit log entries written by operator-visible actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    /// Summary of one full reconciliation pass.
    Reconciliation,
    /// Local position overwritten from the ledger.
    PositionOverwrite,
    /// Operator escape hatch invoked.
    Operator,
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Category.
    pub category: AuditCategory,
    /// Human-readable summary.
    pub message: String,
    /// Structured payload.
    pub details: serde_json::Value,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Create an entry stamped now.
    #[must_use]
    pub fn new(
        category: AuditCategory,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            details,
            created_at: Utc::now(),
        }
    }
}
