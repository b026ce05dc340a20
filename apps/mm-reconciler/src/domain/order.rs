//! Tracked Order Entity
//!
//! A resting quote the local system believes is live on the exchange.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::shared::{InstrumentId, MarketMakerId, OrderId, Outcome, QuoteSide};

/// A locally tracked exchange order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedOrder {
    /// Exchange order id.
    pub order_id: OrderId,
    /// Owning market maker.
    pub market_maker_id: MarketMakerId,
    /// Token the order rests on.
    pub instrument_id: InstrumentId,
    /// Outcome of that token.
    pub outcome: Outcome,
    /// Bid or ask.
    pub side: QuoteSide,
    /// Limit price.
    pub price: Decimal,
    /// Original order size.
    pub size: Decimal,
    /// Matched size already folded into local state. Never exceeds `size`.
    pub last_matched_size: Decimal,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

impl TrackedOrder {
    /// Create an unfilled tracked order.
    #[must_use]
    pub fn new(
        order_id: OrderId,
        market_maker_id: MarketMakerId,
        instrument_id: InstrumentId,
        outcome: Outcome,
        side: QuoteSide,
        price: Decimal,
        size: Decimal,
    ) -> Self {
        Self {
            order_id,
            market_maker_id,
            instrument_id,
            outcome,
            side,
            price,
            size,
            last_matched_size: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    /// Matched quantity the exchange reports beyond the local watermark.
    #[must_use]
    pub fn unrecorded_fill(&self, size_matched: Decimal) -> Decimal {
        (size_matched.min(self.size) - self.last_matched_size).max(Decimal::ZERO)
    }

    /// Move the watermark forward, clamped to the order size.
    pub fn advance_watermark(&mut self, size_matched: Decimal) {
        let clamped = size_matched.min(self.size);
        if clamped > self.last_matched_size {
            self.last_matched_size = clamped;
        }
    }

    /// Returns true if the id was minted locally by a dry run.
    #[must_use]
    pub fn is_simulated(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.order_id.as_str().starts_with(prefix)
    }
}
