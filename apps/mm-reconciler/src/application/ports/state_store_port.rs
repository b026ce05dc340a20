//! Local State Store (Driven Port)
//!
//! Persistence for market makers, tracked orders, fills and staged fills.
//! Every mutation goes through [`StateStore::commit`], which applies a
//! [`ChangeSet`] all-or-nothing.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    AuditLogEntry, Fill, MarketMaker, MarketMakerId, OrderId, PendingFillEvent, TrackedOrder,
};

/// State store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced market maker does not exist.
    #[error("Market maker not found: {0}")]
    MarketMakerNotFound(MarketMakerId),

    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// A batch of writes applied atomically.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Market makers to overwrite.
    pub market_makers: Vec<MarketMaker>,
    /// Orders to insert or replace.
    pub upsert_orders: Vec<TrackedOrder>,
    /// Orders to remove.
    pub delete_orders: Vec<OrderId>,
    /// Fills to append.
    pub fills: Vec<Fill>,
    /// Staged fills to insert or replace (by id).
    pub pending_fills: Vec<PendingFillEvent>,
    /// Audit entries to append.
    pub audit: Vec<AuditLogEntry>,
}

impl ChangeSet {
    /// Returns true if the batch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.market_makers.is_empty()
            && self.upsert_orders.is_empty()
            && self.delete_orders.is_empty()
            && self.fills.is_empty()
            && self.pending_fills.is_empty()
            && self.audit.is_empty()
    }
}

/// Port for local bookkeeping.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// All market makers.
    async fn market_makers(&self) -> Result<Vec<MarketMaker>, StoreError>;

    /// One market maker.
    async fn market_maker(&self, id: &MarketMakerId) -> Result<Option<MarketMaker>, StoreError>;

    /// All tracked orders.
    async fn tracked_orders(&self) -> Result<Vec<TrackedOrder>, StoreError>;

    /// Tracked orders owned by one market maker.
    async fn tracked_orders_for(&self, id: &MarketMakerId)
        -> Result<Vec<TrackedOrder>, StoreError>;

    /// Recorded fills of one market maker.
    async fn fills_for(&self, id: &MarketMakerId) -> Result<Vec<Fill>, StoreError>;

    /// Staged fills of one market maker, in any status.
    async fn pending_fills_for(
        &self,
        id: &MarketMakerId,
    ) -> Result<Vec<PendingFillEvent>, StoreError>;

    /// Apply a batch of writes atomically.
    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError>;

    /// Delete a market maker with its orders, fills and staged fills.
    ///
    /// Returns false if it did not exist.
    async fn delete_market_maker(&self, id: &MarketMakerId) -> Result<bool, StoreError>;
}
