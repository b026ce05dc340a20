//! Market Maker Aggregate
//!
//! One market maker quotes both outcome tokens of a single binary market and
//! carries the local view of inventory, cost basis and realized P&L for each.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::shared::{InstrumentId, MarketId, MarketMakerId, Outcome, TradeSide};

/// Inventory and cost basis held on one outcome token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SidePosition {
    /// Shares held.
    pub inventory: Decimal,
    /// Volume-weighted average entry price. Zero whenever `inventory` is zero.
    pub avg_cost: Decimal,
}

impl SidePosition {
    /// A position with the given size and cost basis.
    #[must_use]
    pub fn new(inventory: Decimal, avg_cost: Decimal) -> Self {
        if inventory.is_zero() {
            Self::default()
        } else {
            Self {
                inventory,
                avg_cost,
            }
        }
    }

    /// Returns true if no shares are held.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.inventory.is_zero()
    }

    fn buy(&mut self, price: Decimal, qty: Decimal) {
        let new_qty = self.inventory + qty;
        if new_qty.is_zero() {
            *self = Self::default();
            return;
        }
        self.avg_cost = (self.avg_cost * self.inventory + price * qty) / new_qty;
        self.inventory = new_qty;
    }

    /// Reduce inventory and return `(realized, unmatched_qty)`.
    fn sell(&mut self, price: Decimal, qty: Decimal) -> (Decimal, Decimal) {
        let closed = qty.min(self.inventory).max(Decimal::ZERO);
        let realized = (price - self.avg_cost) * closed;
        self.inventory -= closed;
        if self.inventory.is_zero() {
            self.avg_cost = Decimal::ZERO;
        }
        (realized, qty - closed)
    }
}

/// Result of folding one fill into a market maker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillEffect {
    /// P&L realized by a closing trade. `None` for buys.
    pub realized_pnl: Option<Decimal>,
    /// Sell quantity that exceeded held inventory and was ignored.
    pub oversold: Decimal,
}

/// A market maker for one binary market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketMaker {
    /// Market maker ID.
    pub id: MarketMakerId,
    /// Condition id of the quoted market.
    pub market_id: MarketId,
    /// YES token, once resolved.
    pub yes_instrument: Option<InstrumentId>,
    /// NO token, once resolved.
    pub no_instrument: Option<InstrumentId>,
    /// Position on the YES token.
    pub yes: SidePosition,
    /// Position on the NO token.
    pub no: SidePosition,
    /// Cumulative realized P&L.
    pub realized_pnl: Decimal,
    /// Operator has opted this market in.
    pub active: bool,
    /// Quoting paused by the operator.
    pub paused: bool,
    /// Quoting suspended until this instant after a volatility spike.
    pub volatility_pause_until: Option<DateTime<Utc>>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl MarketMaker {
    /// Create a flat, active market maker with unresolved tokens.
    #[must_use]
    pub fn new(id: MarketMakerId, market_id: MarketId) -> Self {
        Self {
            id,
            market_id,
            yes_instrument: None,
            no_instrument: None,
            yes: SidePosition::default(),
            no: SidePosition::default(),
            realized_pnl: Decimal::ZERO,
            active: true,
            paused: false,
            volatility_pause_until: None,
            updated_at: Utc::now(),
        }
    }

    /// Attach the resolved outcome tokens.
    #[must_use]
    pub fn with_instruments(mut self, yes: InstrumentId, no: InstrumentId) -> Self {
        self.yes_instrument = Some(yes);
        self.no_instrument = Some(no);
        self
    }

    /// Token id for an outcome, if resolved.
    #[must_use]
    pub const fn instrument(&self, outcome: Outcome) -> Option<&InstrumentId> {
        match outcome {
            Outcome::Yes => self.yes_instrument.as_ref(),
            Outcome::No => self.no_instrument.as_ref(),
        }
    }

    /// Which outcome an instrument belongs to, if it belongs to this market.
    #[must_use]
    pub fn outcome_for(&self, instrument: &InstrumentId) -> Option<Outcome> {
        Outcome::ALL
            .into_iter()
            .find(|o| self.instrument(*o) == Some(instrument))
    }

    /// Returns true if this market maker trades the instrument.
    #[must_use]
    pub fn trades(&self, instrument: &InstrumentId) -> bool {
        self.outcome_for(instrument).is_some()
    }

    /// Position on one outcome.
    #[must_use]
    pub const fn position(&self, outcome: Outcome) -> &SidePosition {
        match outcome {
            Outcome::Yes => &self.yes,
            Outcome::No => &self.no,
        }
    }

    const fn position_mut(&mut self, outcome: Outcome) -> &mut SidePosition {
        match outcome {
            Outcome::Yes => &mut self.yes,
            Outcome::No => &mut self.no,
        }
    }

    /// Aggregate inventory across both outcomes.
    #[must_use]
    pub fn total_inventory(&self) -> Decimal {
        self.yes.inventory + self.no.inventory
    }

    /// Fold an executed trade into inventory, cost basis and realized P&L.
    ///
    /// Buys move the weighted average cost. Sells realize
    /// `(price - avg_cost) * qty` against the current cost basis; a sell larger
    /// than held inventory is clamped and the excess reported as `oversold`.
    pub fn apply_fill(
        &mut self,
        outcome: Outcome,
        side: TradeSide,
        price: Decimal,
        qty: Decimal,
    ) -> FillEffect {
        self.updated_at = Utc::now();
        let position = self.position_mut(outcome);
        match side {
            TradeSide::Buy => {
                position.buy(price, qty);
                FillEffect {
                    realized_pnl: None,
                    oversold: Decimal::ZERO,
                }
            }
            TradeSide::Sell => {
                let (realized, oversold) = position.sell(price, qty);
                self.realized_pnl += realized;
                FillEffect {
                    realized_pnl: Some(realized),
                    oversold,
                }
            }
        }
    }

    /// Replace one side's inventory and cost basis. Realized P&L is untouched.
    pub fn overwrite_position(&mut self, outcome: Outcome, inventory: Decimal, avg_cost: Decimal) {
        *self.position_mut(outcome) = SidePosition::new(inventory, avg_cost);
        self.updated_at = Utc::now();
    }
}
