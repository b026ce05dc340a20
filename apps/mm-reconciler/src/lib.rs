// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Market Maker Reconciler - Rust Core Library
//!
//! Periodically reconciles a market maker's local books against the exchange
//! order book and the settlement ledger, repairing drift in tracked orders,
//! inventory, cost basis and realized P&L.
//!
//! # Architecture
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: market makers, tracked orders, fills, pending fill events,
//!   audit entries
//!
//! - **Application**: port traits for the exchange, ledger and state store;
//!   the reconciliation engine; the scheduler
//!
//! - **Infrastructure**: HTTP ledger adapter, paper exchange, in-memory store
//!
//! Configuration, telemetry and Prometheus metrics sit beside the layers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Layers
// =============================================================================

/// Domain layer - Core business types with no I/O.
pub mod domain;

/// Application layer - Ports, reconciliation engine and scheduling.
pub mod application;

/// Infrastructure layer - Adapters for the ports.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// YAML configuration loading and validation.
pub mod config;

/// Prometheus metrics.
pub mod observability;

/// Tracing subscriber setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use application::reconciliation::{
    IssueAction, IssueSeverity, IssueType, PositionSyncPolicy, ReconciliationConfig,
    ReconciliationEngine, ReconciliationError, SyncIssue, SyncResult,
};
pub use application::services::{ReconciliationScheduler, SchedulerConfig};
pub use domain::{MarketMaker, MarketMakerId, Outcome};
