//! Sides and outcomes of a binary prediction market.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two outcome tokens of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// The YES token.
    Yes,
    /// The NO token.
    No,
}

impl Outcome {
    /// Both outcomes, YES first.
    pub const ALL: [Self; 2] = [Self::Yes, Self::No];
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

/// Side of a resting quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteSide {
    /// Resting buy order.
    Bid,
    /// Resting sell order.
    Ask,
}

impl QuoteSide {
    /// Direction of the trade produced when this quote is matched.
    #[must_use]
    pub const fn trade_side(self) -> TradeSide {
        match self {
            Self::Bid => TradeSide::Buy,
            Self::Ask => TradeSide::Sell,
        }
    }
}

impl fmt::Display for QuoteSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "BID"),
            Self::Ask => write!(f, "ASK"),
        }
    }
}

/// Direction of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    /// Inventory increases.
    Buy,
    /// Inventory decreases.
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}
