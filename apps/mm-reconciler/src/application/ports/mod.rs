//! Application Ports (Driven)
//!
//! Interfaces the reconciliation engine uses to reach the exchange, the
//! settlement ledger and local storage.

mod exchange_port;
mod gateway_error;
mod ledger_port;
mod state_store_port;

pub use exchange_port::{
    ExchangeGateway, ExchangeOrderStatus, OrderDetail, OrderLookup, OrderSummary,
};
pub use gateway_error::GatewayError;
pub use ledger_port::{LedgerGateway, LedgerPosition, LedgerQuery};
pub use state_store_port::{ChangeSet, StateStore, StoreError};
