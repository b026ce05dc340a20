//! Dependency health tracking.
//!
//! Consecutive-failure counters for the exchange and ledger gateways. Owned
//! by the engine instance; a success resets the streak. Reaching the alert
//! threshold logs at CRITICAL and never pauses quoting.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{error, info};

use crate::observability;

// ============================================================================
// Dependencies
// ============================================================================

/// An external data source the engine depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dependency {
    /// Exchange order gateway.
    Exchange,
    /// Settlement ledger gateway.
    Ledger,
}

impl Dependency {
    const fn metric_label(self) -> &'static str {
        match self {
            Self::Exchange => "clob",
            Self::Ledger => "data_api",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exchange => write!(f, "CLOB"),
            Self::Ledger => write!(f, "DATA_API"),
        }
    }
}

// ============================================================================
// Health Tracker
// ============================================================================

/// Snapshot of dependency health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    /// Consecutive exchange failures.
    pub exchange_failures: u32,
    /// Consecutive ledger failures.
    pub ledger_failures: u32,
    /// Exchange streak has reached the alert threshold.
    pub exchange_degraded: bool,
    /// Ledger streak has reached the alert threshold.
    pub ledger_degraded: bool,
}

/// Consecutive-failure counters per dependency.
#[derive(Debug)]
pub struct DependencyHealth {
    exchange_failures: AtomicU32,
    ledger_failures: AtomicU32,
    alert_threshold: u32,
}

impl DependencyHealth {
    /// Create a tracker alerting after `alert_threshold` consecutive failures.
    #[must_use]
    pub const fn new(alert_threshold: u32) -> Self {
        Self {
            exchange_failures: AtomicU32::new(0),
            ledger_failures: AtomicU32::new(0),
            alert_threshold,
        }
    }

    const fn counter(&self, dependency: Dependency) -> &AtomicU32 {
        match dependency {
            Dependency::Exchange => &self.exchange_failures,
            Dependency::Ledger => &self.ledger_failures,
        }
    }

    /// Record a successful call, resetting the streak.
    pub fn record_success(&self, dependency: Dependency) {
        let previous = self.counter(dependency).swap(0, Ordering::SeqCst);
        if previous >= self.alert_threshold {
            info!(
                dependency = %dependency,
                failures = previous,
                "Dependency recovered"
            );
        }
        if previous > 0 {
            observability::update_failure_streak(dependency.metric_label(), 0);
        }
    }

    /// Record a failed call and return the new streak.
    pub fn record_failure(&self, dependency: Dependency, reason: &str) -> u32 {
        let streak = self.counter(dependency).fetch_add(1, Ordering::SeqCst) + 1;
        observability::update_failure_streak(dependency.metric_label(), streak);
        if streak >= self.alert_threshold {
            error!(
                dependency = %dependency,
                failures = streak,
                threshold = self.alert_threshold,
                reason,
                severity = "CRITICAL",
                "Dependency failing repeatedly"
            );
        }
        streak
    }

    /// Current streak of one dependency.
    #[must_use]
    pub fn failures(&self, dependency: Dependency) -> u32 {
        self.counter(dependency).load(Ordering::SeqCst)
    }

    /// Snapshot both counters.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        let exchange_failures = self.failures(Dependency::Exchange);
        let ledger_failures = self.failures(Dependency::Ledger);
        HealthSnapshot {
            exchange_failures,
            ledger_failures,
            exchange_degraded: exchange_failures >= self.alert_threshold,
            ledger_degraded: ledger_failures >= self.alert_threshold,
        }
    }
}
