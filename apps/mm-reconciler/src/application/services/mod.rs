//! Application Services
//!
//! Long-running background services.

pub mod scheduler;

pub use scheduler::{ReconciliationScheduler, SchedulerConfig};
