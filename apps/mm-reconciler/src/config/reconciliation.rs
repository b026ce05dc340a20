//! Reconciliation configuration for scheduled sync passes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::reconciliation::{self, PositionSyncPolicy};

/// Reconciliation configuration as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Full sync interval in seconds.
    #[serde(default = "default_full_interval")]
    pub full_sync_interval_secs: u64,
    /// Quick sync interval in seconds.
    #[serde(default = "default_quick_interval")]
    pub quick_sync_interval_secs: u64,
    /// Apply corrections during scheduled full syncs.
    #[serde(default = "default_true")]
    pub auto_correct: bool,
    /// Log every issue, not just ERROR and CRITICAL.
    #[serde(default)]
    pub verbose: bool,
    /// `ledger_authoritative` or `alert_only`.
    #[serde(default)]
    pub position_policy: PositionSyncPolicy,
    /// Stage inferred fills until the ledger confirms them.
    #[serde(default)]
    pub stage_fills: bool,
    /// Seconds a staged fill may wait for confirmation.
    #[serde(default = "default_pending_ttl")]
    pub pending_fill_ttl_secs: u64,
    /// Consecutive gateway failures before a CRITICAL alert.
    #[serde(default = "default_failure_threshold")]
    pub failure_alert_threshold: u32,
    /// Market makers reconciled concurrently.
    #[serde(default = "default_concurrency")]
    pub max_concurrent_markets: usize,
    /// Prefix of ids a quoting loop mints for orders it never sends anywhere.
    /// Such orders are removed without a detail lookup.
    #[serde(default = "default_simulated_prefix")]
    pub simulated_order_prefix: String,
    /// Numeric tolerances.
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

/// Numeric tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// Order price tolerance.
    #[serde(default = "default_price_tolerance")]
    pub price: Decimal,
    /// Position size drift threshold, in shares.
    #[serde(default = "default_size_drift")]
    pub size_drift: Decimal,
    /// Average cost drift threshold.
    #[serde(default = "default_avg_cost_drift")]
    pub avg_cost_drift: Decimal,
    /// Local inventory above which an empty ledger is distrusted.
    #[serde(default = "default_one")]
    pub empty_ledger_guard: Decimal,
    /// Realized P&L tolerance.
    #[serde(default = "default_pnl_tolerance")]
    pub pnl: Decimal,
    /// P&L mismatch above which severity is ERROR.
    #[serde(default = "default_one")]
    pub pnl_error: Decimal,
    /// Aggregate inventory tolerance of quick sync.
    #[serde(default = "default_one")]
    pub quick_sync_inventory: Decimal,
    /// Ledger size reported when no market maps to it.
    #[serde(default = "default_one")]
    pub material_position: Decimal,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            price: default_price_tolerance(),
            size_drift: default_size_drift(),
            avg_cost_drift: default_avg_cost_drift(),
            empty_ledger_guard: default_one(),
            pnl: default_pnl_tolerance(),
            pnl_error: default_one(),
            quick_sync_inventory: default_one(),
            material_position: default_one(),
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            full_sync_interval_secs: default_full_interval(),
            quick_sync_interval_secs: default_quick_interval(),
            auto_correct: true,
            verbose: false,
            position_policy: PositionSyncPolicy::default(),
            stage_fills: false,
            pending_fill_ttl_secs: default_pending_ttl(),
            failure_alert_threshold: default_failure_threshold(),
            max_concurrent_markets: default_concurrency(),
            simulated_order_prefix: default_simulated_prefix(),
            thresholds: ThresholdsConfig::default(),
        }
    }
}

impl ReconciliationConfig {
    /// Convert to the engine's configuration, taking ledger query limits from
    /// the ledger section.
    #[must_use]
    pub fn to_reconciliation_config(
        &self,
        ledger_min_size: Decimal,
        ledger_limit: u32,
    ) -> reconciliation::ReconciliationConfig {
        let t = &self.thresholds;
        reconciliation::ReconciliationConfig {
            full_sync_interval_secs: self.full_sync_interval_secs,
            quick_sync_interval_secs: self.quick_sync_interval_secs,
            auto_correct: self.auto_correct,
            verbose: self.verbose,
            price_tolerance: t.price,
            size_drift_threshold: t.size_drift,
            avg_cost_drift_threshold: t.avg_cost_drift,
            empty_ledger_guard: t.empty_ledger_guard,
            pnl_tolerance: t.pnl,
            pnl_error_threshold: t.pnl_error,
            quick_sync_inventory_tolerance: t.quick_sync_inventory,
            material_position_size: t.material_position,
            position_policy: self.position_policy,
            stage_fills: self.stage_fills,
            pending_fill_ttl_secs: self.pending_fill_ttl_secs,
            failure_alert_threshold: self.failure_alert_threshold,
            simulated_order_prefix: self.simulated_order_prefix.clone(),
            max_concurrent_markets: self.max_concurrent_markets,
            ledger_min_size,
            ledger_limit,
        }
    }
}

pub(super) const fn default_true() -> bool {
    true
}

const fn default_full_interval() -> u64 {
    300 // 5 minutes
}

const fn default_quick_interval() -> u64 {
    60
}

const fn default_pending_ttl() -> u64 {
    1800 // 30 minutes
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_concurrency() -> usize {
    4
}

fn default_simulated_prefix() -> String {
    "dry-run-".to_string()
}

const fn default_price_tolerance() -> Decimal {
    Decimal::from_parts(1, 0, 0, false, 3)
}

const fn default_size_drift() -> Decimal {
    Decimal::from_parts(1, 0, 0, false, 1)
}

const fn default_avg_cost_drift() -> Decimal {
    Decimal::from_parts(1, 0, 0, false, 4)
}

const fn default_pnl_tolerance() -> Decimal {
    Decimal::from_parts(1, 0, 0, false, 2)
}

const fn default_one() -> Decimal {
    Decimal::ONE
}
