//! Settlement Ledger Gateway (Driven Port)
//!
//! Settled positions per token for a wallet. Lags the exchange.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::GatewayError;
use crate::domain::shared::InstrumentId;

/// Filter for a positions query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerQuery {
    /// Wallet address. `None` uses the adapter's configured wallet.
    pub wallet: Option<String>,
    /// Ignore dust below this size.
    pub min_size: Decimal,
    /// Page size.
    pub limit: u32,
}

/// One settled position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPosition {
    /// Token id.
    pub instrument_id: InstrumentId,
    /// Settled size.
    pub size: Decimal,
    /// Volume-weighted average entry price. `None` when the ledger omits it.
    pub avg_price: Option<Decimal>,
    /// Mark-to-market value.
    pub current_value: Decimal,
}

/// Port for the settlement ledger.
///
/// An empty `Ok` is ambiguous: the wallet may be flat, or the ledger may be
/// lagging. Callers must guard before acting on it.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Settled positions matching the query.
    async fn get_positions(&self, query: &LedgerQuery) -> Result<Vec<LedgerPosition>, GatewayError>;
}
