//! Shared kernel: identifiers and small value types used across the domain.

mod identifiers;
mod value_objects;

pub use identifiers::{FillId, InstrumentId, MarketId, MarketMakerId, OrderId};
pub use value_objects::{Outcome, QuoteSide, TradeSide};
