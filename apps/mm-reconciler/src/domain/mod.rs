//! Domain layer: market makers, tracked orders, fills and audit records.
//!
//! Pure data and arithmetic. No I/O.

pub mod audit;
pub mod fill;
pub mod market_maker;
pub mod order;
pub mod shared;

pub use audit::{AuditCategory, AuditLogEntry};
pub use fill::{Fill, FillSource, PendingFillEvent, PendingFillStatus};
pub use market_maker::{FillEffect, MarketMaker, SidePosition};
pub use order::TrackedOrder;
pub use shared::{FillId, InstrumentId, MarketId, MarketMakerId, OrderId, Outcome, QuoteSide, TradeSide};
