//! Fills and staged fill events.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::shared::{FillId, MarketMakerId, OrderId, Outcome, TradeSide};

/// How a fill entered the books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillSource {
    /// Inferred from order drift and applied directly.
    OrderSync,
    /// Staged from order drift, then confirmed against the ledger.
    PendingConfirmed,
}

/// An executed trade recorded against a market maker. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Fill ID.
    pub id: FillId,
    /// Owning market maker.
    pub market_maker_id: MarketMakerId,
    /// Order that produced the fill.
    pub order_id: OrderId,
    /// Outcome token traded.
    pub outcome: Outcome,
    /// Buy or sell.
    pub side: TradeSide,
    /// Execution price.
    pub price: Decimal,
    /// Executed quantity.
    pub size: Decimal,
    /// `price * size`.
    pub value: Decimal,
    /// Realized P&L, present only for closing trades.
    pub realized_pnl: Option<Decimal>,
    /// Provenance.
    pub source: FillSource,
    /// When the fill was recorded.
    pub created_at: DateTime<Utc>,
}

impl Fill {
    /// Record a fill.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market_maker_id: MarketMakerId,
        order_id: OrderId,
        outcome: Outcome,
        side: TradeSide,
        price: Decimal,
        size: Decimal,
        realized_pnl: Option<Decimal>,
        source: FillSource,
    ) -> Self {
        Self {
            id: FillId::generate(),
            market_maker_id,
            order_id,
            outcome,
            side,
            price,
            size,
            value: price * size,
            realized_pnl,
            source,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle of a staged fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingFillStatus {
    /// Awaiting ledger confirmation.
    Pending,
    /// Promoted to a durable fill.
    Confirmed,
    /// Never confirmed within the TTL.
    Expired,
    /// Dropped by a reset.
    Discarded,
}

impl fmt::Display for PendingFillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Discarded => write!(f, "DISCARDED"),
        }
    }
}

/// A fill inferred from order drift, held until the ledger shows the
/// matching inventory change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFillEvent {
    /// Event ID.
    pub id: FillId,
    /// Owning market maker.
    pub market_maker_id: MarketMakerId,
    /// Order that drifted.
    pub order_id: OrderId,
    /// Outcome token traded.
    pub outcome: Outcome,
    /// Buy or sell.
    pub side: TradeSide,
    /// Order price.
    pub price: Decimal,
    /// Inferred quantity.
    pub size: Decimal,
    /// Current status.
    pub status: PendingFillStatus,
    /// When it was staged.
    pub created_at: DateTime<Utc>,
    /// When it left `Pending`.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PendingFillEvent {
    /// Stage a new event.
    #[must_use]
    pub fn new(
        market_maker_id: MarketMakerId,
        order_id: OrderId,
        outcome: Outcome,
        side: TradeSide,
        price: Decimal,
        size: Decimal,
    ) -> Self {
        Self {
            id: FillId::generate(),
            market_maker_id,
            order_id,
            outcome,
            side,
            price,
            size,
            status: PendingFillStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Returns true while awaiting confirmation.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == PendingFillStatus::Pending
    }

    /// Inventory change this event implies: positive for buys.
    #[must_use]
    pub fn signed_size(&self) -> Decimal {
        match self.side {
            TradeSide::Buy => self.size,
            TradeSide::Sell => -self.size,
        }
    }

    /// Returns true if still pending after `ttl`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_pending() && now - self.created_at > ttl
    }

    /// Move to a terminal status.
    pub fn resolve(&mut self, status: PendingFillStatus, at: DateTime<Utc>) {
        self.status = status;
        self.resolved_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_event(side: TradeSide) -> PendingFillEvent {
        PendingFillEvent::new(
            MarketMakerId::new("mm-1"),
            OrderId::new("ord-1"),
            Outcome::Yes,
            side,
            dec!(0.40),
            dec!(5),
        )
    }

    #[test]
    fn fill_value_is_price_times_size() {
        let fill = Fill::new(
            MarketMakerId::new("mm-1"),
            OrderId::new("ord-1"),
            Outcome::No,
            TradeSide::Buy,
            dec!(0.42),
            dec!(10),
            None,
            FillSource::OrderSync,
        );
        assert_eq!(fill.value, dec!(4.20));
    }

    #[test]
    fn signed_size_follows_direction() {
        assert_eq!(make_event(TradeSide::Buy).signed_size(), dec!(5));
        assert_eq!(make_event(TradeSide::Sell).signed_size(), dec!(-5));
    }

    #[test]
    fn staleness_only_applies_to_pending() {
        let mut event = make_event(TradeSide::Buy);
        let later = event.created_at + Duration::minutes(31);
        assert!(event.is_stale(later, Duration::minutes(30)));
        assert!(!event.is_stale(later, Duration::minutes(60)));

        event.resolve(PendingFillStatus::Confirmed, later);
        assert!(!event.is_stale(later, Duration::minutes(30)));
        assert_eq!(event.resolved_at, Some(later));
    }
}
