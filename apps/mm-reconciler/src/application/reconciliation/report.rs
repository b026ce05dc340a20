//! Reconciliation report types.
//!
//! Results returned by the sync passes and escape hatches.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use super::issue::{IssueSeverity, SyncIssue};

/// Issues sampled into the audit log entry of a full sync.
pub const AUDIT_SAMPLE_LIMIT: usize = 20;

/// Result of a full sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    /// Whether corrections were applied.
    pub auto_correct: bool,
    /// Tracked orders examined.
    pub orders_checked: usize,
    /// Tracked orders deleted.
    pub orders_removed: usize,
    /// Tracked orders whose price was corrected.
    pub orders_corrected: usize,
    /// Exchange orders not tracked locally.
    pub orphan_orders: usize,
    /// Fills folded directly into local state.
    pub fills_replayed: usize,
    /// Fills staged for ledger confirmation.
    pub fills_staged: usize,
    /// Outcome positions compared with the ledger.
    pub positions_checked: usize,
    /// Outcome positions overwritten from the ledger.
    pub positions_corrected: usize,
    /// Market makers with at least one corrected position.
    pub markets_corrected: usize,
    /// Staged fills confirmed.
    pub pending_confirmed: usize,
    /// Staged fills expired.
    pub pending_expired: usize,
    /// Market makers whose P&L was verified.
    pub pnl_checked: usize,
    /// Sum of absolute P&L mismatches.
    pub pnl_discrepancy_total: Decimal,
    /// Position sync was skipped for the whole pass.
    pub position_sync_skipped: bool,
    /// All findings.
    pub issues: Vec<SyncIssue>,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl SyncResult {
    /// Empty result for a pass starting now.
    #[must_use]
    pub fn new(auto_correct: bool) -> Self {
        Self {
            auto_correct,
            orders_checked: 0,
            orders_removed: 0,
            orders_corrected: 0,
            orphan_orders: 0,
            fills_replayed: 0,
            fills_staged: 0,
            positions_checked: 0,
            positions_corrected: 0,
            markets_corrected: 0,
            pending_confirmed: 0,
            pending_expired: 0,
            pnl_checked: 0,
            pnl_discrepancy_total: Decimal::ZERO,
            position_sync_skipped: false,
            issues: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Record a finding.
    pub fn push(&mut self, issue: SyncIssue) {
        self.issues.push(issue);
    }

    /// Fold a per-market-maker partial result into this one.
    pub fn absorb(&mut self, other: Self) {
        self.orders_checked += other.orders_checked;
        self.orders_removed += other.orders_removed;
        self.orders_corrected += other.orders_corrected;
        self.orphan_orders += other.orphan_orders;
        self.fills_replayed += other.fills_replayed;
        self.fills_staged += other.fills_staged;
        self.positions_checked += other.positions_checked;
        self.positions_corrected += other.positions_corrected;
        self.markets_corrected += other.markets_corrected;
        self.pending_confirmed += other.pending_confirmed;
        self.pending_expired += other.pending_expired;
        self.pnl_checked += other.pnl_checked;
        self.pnl_discrepancy_total += other.pnl_discrepancy_total;
        self.issues.extend(other.issues);
    }

    /// Total writes applied.
    #[must_use]
    pub const fn corrections(&self) -> usize {
        self.orders_removed
            + self.orders_corrected
            + self.fills_replayed
            + self.positions_corrected
            + self.pending_confirmed
    }

    /// Check if there are any critical issues.
    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Critical)
    }

    /// Number of issues at a severity.
    #[must_use]
    pub fn count_severity(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Payload of the audit log entry written after the pass.
    #[must_use]
    pub fn audit_details(&self) -> serde_json::Value {
        let samples: Vec<_> = self
            .issues
            .iter()
            .take(AUDIT_SAMPLE_LIMIT)
            .map(|i| {
                json!({
                    "type": i.issue_type.to_string(),
                    "severity": i.severity.to_string(),
                    "instrument": i.instrument_id.as_ref().map(|t| t.as_str()),
                    "action": i.action.to_string(),
                })
            })
            .collect();

        json!({
            "duration_ms": self.duration_ms,
            "auto_correct": self.auto_correct,
            "orders_checked": self.orders_checked,
            "orders_removed": self.orders_removed,
            "orders_corrected": self.orders_corrected,
            "orphan_orders": self.orphan_orders,
            "fills_replayed": self.fills_replayed,
            "fills_staged": self.fills_staged,
            "positions_checked": self.positions_checked,
            "positions_corrected": self.positions_corrected,
            "markets_corrected": self.markets_corrected,
            "pending_confirmed": self.pending_confirmed,
            "pnl_discrepancy_total": self.pnl_discrepancy_total.to_string(),
            "issue_count": self.issues.len(),
            "issues": samples,
        })
    }
}

/// Result of a quick sync.
#[derive(Debug, Clone, Serialize)]
pub struct QuickSyncResult {
    /// Tracked and exchange open order counts agree.
    pub orders_match: bool,
    /// Aggregate inventory agrees with the ledger within tolerance.
    pub positions_match: bool,
    /// Number of mismatches and unreachable dependencies.
    pub issue_count: usize,
    /// Tracked orders in scope.
    pub local_orders: usize,
    /// Exchange open orders in scope, when reachable.
    pub exchange_orders: Option<usize>,
    /// Aggregate local inventory.
    pub local_inventory: Decimal,
    /// Aggregate ledger inventory, when reachable.
    pub ledger_inventory: Option<Decimal>,
}

/// Result of cancelling exchange orders nothing tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OrphanCancelResult {
    /// Cancels accepted.
    pub cancelled: usize,
    /// Cancels rejected.
    pub failed: usize,
}

/// Result of overwriting local state from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResetResult {
    /// Market makers overwritten.
    pub markets_reset: usize,
    /// Tracked orders deleted.
    pub orders_cleared: usize,
    /// Staged fills discarded.
    pub pending_discarded: usize,
}
