//! Settlement ledger adapter.
//!
//! HTTP implementation of the ledger port against the public positions API.

mod api_types;
mod config;
mod error;
mod http_client;

pub use api_types::DataApiPosition;
pub use config::{DEFAULT_DATA_API_URL, DataApiConfig, RetryConfig};
pub use error::LedgerHttpError;
pub use http_client::DataApiLedgerGateway;
