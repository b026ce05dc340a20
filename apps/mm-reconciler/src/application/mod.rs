//! Application Layer
//!
//! Ports to the outside world, the reconciliation engine, and the scheduler
//! that drives it.

pub mod ports;
pub mod reconciliation;
pub mod services;
