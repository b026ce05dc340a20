//! Infrastructure Layer
//!
//! Adapters implementing the application ports:
//!
//! - `persistence/`: In-memory state store
//! - `ledger/`: Settlement ledger over HTTP
//! - `exchange/`: Paper venue for dry runs

pub mod exchange;
pub mod ledger;
pub mod persistence;
