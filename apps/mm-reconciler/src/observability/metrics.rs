//! Prometheus metrics for the reconciler.
//!
//! Sync pass outcomes, issues raised, corrections applied and gateway
//! failure streaks. Recording is a no-op until [`init_metrics`] installs the
//! exporter, so library code can call these unconditionally.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for sync durations (in seconds).
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9091)),
            // 10ms to 2 minutes
            duration_buckets: vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 30.0, 120.0],
        }
    }
}

impl MetricsConfig {
    /// Create a metrics configuration with a custom address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Default::default()
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// Starts an HTTP server that exposes metrics at `/metrics`.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.duration_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Sync Pass Metrics
// ============================================================================

/// Record a completed sync pass.
///
/// # Arguments
///
/// * `kind` - `"full"` or `"quick"`
/// * `duration_seconds` - Wall time of the pass
pub fn record_sync_run(kind: &'static str, duration_seconds: f64) {
    counter!("reconciler_sync_runs_total", "kind" => kind).increment(1);
    histogram!("reconciler_sync_duration_seconds", "kind" => kind).record(duration_seconds);
}

/// Record one issue raised by a pass.
pub fn record_issue(issue_type: &str, severity: &str) {
    counter!(
        "reconciler_issues_total",
        "type" => issue_type.to_string(),
        "severity" => severity.to_string()
    )
    .increment(1);
}

/// Record corrections applied by a full pass.
pub fn record_corrections(fills_replayed: usize, positions_corrected: usize, orders_removed: usize) {
    counter!("reconciler_fills_replayed_total").increment(fills_replayed as u64);
    counter!("reconciler_positions_corrected_total").increment(positions_corrected as u64);
    counter!("reconciler_orders_removed_total").increment(orders_removed as u64);
}

/// Set the aggregate absolute P&L discrepancy seen in the last pass.
pub fn update_pnl_discrepancy(total: f64) {
    gauge!("reconciler_pnl_discrepancy").set(total);
}

// ============================================================================
// Dependency Health Metrics
// ============================================================================

/// Set the consecutive failure streak of a gateway.
///
/// # Arguments
///
/// * `dependency` - `"clob"` or `"data_api"`
/// * `streak` - Consecutive failures (0 after a success)
pub fn update_failure_streak(dependency: &'static str, streak: u32) {
    gauge!("reconciler_gateway_failure_streak", "dependency" => dependency).set(f64::from(streak));
}

/// Record an orphan cancel attempt.
pub fn record_orphan_cancel(accepted: bool) {
    let status = if accepted { "cancelled" } else { "failed" };
    counter!("reconciler_orphan_cancels_total", "status" => status).increment(1);
}
