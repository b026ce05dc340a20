//! Observability module for metrics.
//!
//! Prometheus export of reconciliation outcomes and gateway health.

mod metrics;

pub use metrics::{
    MetricsConfig, MetricsError, init_metrics, record_corrections, record_issue,
    record_orphan_cancel, record_sync_run, update_failure_streak, update_pnl_discrepancy,
};
