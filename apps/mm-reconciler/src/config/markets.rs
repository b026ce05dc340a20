//! Operator-configured markets.

use serde::{Deserialize, Serialize};

use super::reconciliation::default_true;
use crate::domain::{InstrumentId, MarketId, MarketMaker, MarketMakerId};

/// One market the operator has opted in to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Market maker ID.
    pub id: String,
    /// Condition id of the market.
    pub market_id: String,
    /// YES token id.
    #[serde(default)]
    pub yes_token: Option<String>,
    /// NO token id.
    #[serde(default)]
    pub no_token: Option<String>,
    /// Quote this market.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl MarketConfig {
    /// Build a flat market maker for this market.
    #[must_use]
    pub fn to_market_maker(&self) -> MarketMaker {
        let mut mm = MarketMaker::new(
            MarketMakerId::new(self.id.clone()),
            MarketId::new(self.market_id.clone()),
        );
        mm.yes_instrument = self.yes_token.clone().map(InstrumentId::new);
        mm.no_instrument = self.no_token.clone().map(InstrumentId::new);
        mm.active = self.active;
        mm
    }
}
