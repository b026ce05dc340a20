//! Data API wire types.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::ports::LedgerPosition;
use crate::domain::InstrumentId;

/// One element of `GET /positions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataApiPosition {
    /// Outcome token id.
    pub asset: String,
    /// Condition id of the market.
    #[serde(default)]
    pub condition_id: Option<String>,
    /// Settled size.
    pub size: Decimal,
    /// Average entry price.
    #[serde(default)]
    pub avg_price: Option<Decimal>,
    /// Mark-to-market value.
    #[serde(default)]
    pub current_value: Option<Decimal>,
    /// Current price.
    #[serde(default)]
    pub cur_price: Option<Decimal>,
    /// Outcome label.
    #[serde(default)]
    pub outcome: Option<String>,
}

impl From<DataApiPosition> for LedgerPosition {
    fn from(p: DataApiPosition) -> Self {
        let current_value = p
            .current_value
            .or_else(|| p.cur_price.map(|price| price * p.size))
            .unwrap_or_default();
        Self {
            instrument_id: InstrumentId::new(p.asset),
            size: p.size,
            avg_price: p.avg_price,
            current_value,
        }
    }
}
