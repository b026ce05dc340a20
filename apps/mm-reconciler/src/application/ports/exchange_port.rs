//! Exchange Order Gateway (Driven Port)
//!
//! Read and cancel access to the venue's order book for our own orders.
//! Placement and signing live in the quoting loop's client, not here.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::GatewayError;
use crate::domain::shared::{InstrumentId, OrderId, Outcome, QuoteSide};

/// One of our orders currently resting on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    /// Exchange order id.
    pub id: OrderId,
    /// Token the order rests on.
    pub instrument_id: InstrumentId,
    /// Bid or ask.
    pub side: QuoteSide,
    /// Limit price.
    pub price: Decimal,
    /// Original size.
    pub size: Decimal,
    /// Size matched so far.
    pub size_matched: Decimal,
}

/// Exchange-side order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeOrderStatus {
    /// Resting on the book.
    Live,
    /// Accepted but held by the matching engine.
    Delayed,
    /// Fully matched.
    Matched,
    /// Cancelled.
    Cancelled,
    /// Expired.
    Expired,
    /// Status string the adapter did not recognise.
    Unknown,
}

impl ExchangeOrderStatus {
    /// Returns true if the order can no longer match.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Matched | Self::Cancelled | Self::Expired)
    }
}

impl fmt::Display for ExchangeOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "LIVE"),
            Self::Delayed => write!(f, "DELAYED"),
            Self::Matched => write!(f, "MATCHED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Full state of a single order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    /// Current status.
    pub status: ExchangeOrderStatus,
    /// Size matched so far.
    pub size_matched: Decimal,
    /// Original size.
    pub original_size: Decimal,
    /// Limit price.
    pub price: Decimal,
    /// Bid or ask.
    pub side: QuoteSide,
    /// Outcome label, when the venue reports one.
    pub outcome: Option<Outcome>,
    /// Token the order rests on.
    pub instrument_id: InstrumentId,
}

/// Result of looking up a single order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLookup {
    /// The exchange knows the order.
    Found(OrderDetail),
    /// The exchange has no record of the order.
    NotFound,
    /// The lookup failed; the order's state is unknown.
    Error(String),
}

/// Port for exchange order access.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// All of our open orders.
    async fn fetch_open_orders(&self) -> Result<Vec<OrderSummary>, GatewayError>;

    /// Look up one order, including closed ones.
    async fn get_order_detail(&self, order_id: &OrderId) -> OrderLookup;

    /// Cancel one order. Returns true if the exchange accepted the cancel.
    async fn cancel_order(&self, order_id: &OrderId) -> bool;
}
