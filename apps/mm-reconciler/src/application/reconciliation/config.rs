//! Reconciliation configuration.
//!
//! Thresholds, tolerances and policy switches for the sync passes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What position sync does with real drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSyncPolicy {
    /// Overwrite local inventory and cost basis with the ledger.
    #[default]
    LedgerAuthoritative,
    /// Raise an issue requiring manual action, write nothing.
    AlertOnly,
}

/// Configuration for reconciliation behavior.
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// Full sync interval in seconds.
    pub full_sync_interval_secs: u64,
    /// Quick sync interval in seconds.
    pub quick_sync_interval_secs: u64,
    /// Apply corrections during scheduled full syncs.
    pub auto_correct: bool,
    /// Log every issue, not just ERROR and CRITICAL.
    pub verbose: bool,
    /// Price difference above which a tracked order is corrected.
    pub price_tolerance: Decimal,
    /// Inventory difference above which drift is real.
    pub size_drift_threshold: Decimal,
    /// Average cost difference above which drift is real.
    pub avg_cost_drift_threshold: Decimal,
    /// Local inventory above which an empty ledger response is distrusted.
    pub empty_ledger_guard: Decimal,
    /// Realized P&L difference above which a mismatch is reported.
    pub pnl_tolerance: Decimal,
    /// P&L mismatch above which severity escalates to ERROR.
    pub pnl_error_threshold: Decimal,
    /// Aggregate inventory tolerance for quick sync.
    pub quick_sync_inventory_tolerance: Decimal,
    /// Ledger size at or above which an unmapped position is reported.
    pub material_position_size: Decimal,
    /// Drift handling policy.
    pub position_policy: PositionSyncPolicy,
    /// Stage inferred fills until the ledger confirms them.
    pub stage_fills: bool,
    /// Seconds a staged fill may wait for confirmation.
    pub pending_fill_ttl_secs: u64,
    /// Consecutive gateway failures before a CRITICAL alert.
    pub failure_alert_threshold: u32,
    /// Prefix of ids a quoting loop mints for orders it never sends anywhere.
    /// Such orders are removed without a detail lookup.
    pub simulated_order_prefix: String,
    /// Market makers reconciled concurrently.
    pub max_concurrent_markets: usize,
    /// Ledger query dust filter.
    pub ledger_min_size: Decimal,
    /// Ledger query page size.
    pub ledger_limit: u32,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            full_sync_interval_secs: 300, // 5 minutes
            quick_sync_interval_secs: 60,
            auto_correct: true,
            verbose: false,
            price_tolerance: Decimal::new(1, 3),           // 0.001
            size_drift_threshold: Decimal::new(1, 1),      // 0.1 shares
            avg_cost_drift_threshold: Decimal::new(1, 4),  // 0.0001
            empty_ledger_guard: Decimal::ONE,              // 1 share
            pnl_tolerance: Decimal::new(1, 2),             // 0.01
            pnl_error_threshold: Decimal::ONE,
            quick_sync_inventory_tolerance: Decimal::ONE,
            material_position_size: Decimal::ONE,
            position_policy: PositionSyncPolicy::LedgerAuthoritative,
            stage_fills: false,
            pending_fill_ttl_secs: 1800, // 30 minutes
            failure_alert_threshold: 3,
            simulated_order_prefix: "dry-run-".to_string(),
            max_concurrent_markets: 4,
            ledger_min_size: Decimal::new(1, 2),
            ledger_limit: 500,
        }
    }
}
