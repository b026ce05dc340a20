//! In-memory state store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{ChangeSet, StateStore, StoreError};
use crate::domain::{
    AuditLogEntry, Fill, FillId, MarketMaker, MarketMakerId, OrderId, PendingFillEvent,
    TrackedOrder,
};

#[derive(Debug, Default)]
struct State {
    market_makers: BTreeMap<MarketMakerId, MarketMaker>,
    orders: BTreeMap<OrderId, TrackedOrder>,
    fills: Vec<Fill>,
    pending: BTreeMap<FillId, PendingFillEvent>,
    audit: Vec<AuditLogEntry>,
}

/// In-memory implementation of `StateStore`.
///
/// A single lock guards all tables, so a commit is visible all at once or not
/// at all.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    state: RwLock<State>,
    fail_commits: AtomicBool,
}

impl InMemoryStateStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a market maker (operator opt-in).
    pub fn insert_market_maker(&self, mm: MarketMaker) {
        self.state.write().market_makers.insert(mm.id.clone(), mm);
    }

    /// Track an order (quoting loop placement).
    pub fn insert_order(&self, order: TrackedOrder) {
        self.state.write().orders.insert(order.order_id.clone(), order);
    }

    /// Record a fill outside reconciliation (quoting loop fill handler).
    pub fn insert_fill(&self, fill: Fill) {
        self.state.write().fills.push(fill);
    }

    /// Delete a market maker with its orders, fills and staged fills.
    ///
    /// Returns false if it did not exist.
    pub fn remove_market_maker(&self, id: &MarketMakerId) -> bool {
        let mut state = self.state.write();
        if state.market_makers.remove(id).is_none() {
            return false;
        }
        state.orders.retain(|_, o| &o.market_maker_id != id);
        state.fills.retain(|f| &f.market_maker_id != id);
        state.pending.retain(|_, e| &e.market_maker_id != id);
        true
    }

    /// Every recorded fill.
    #[must_use]
    pub fn all_fills(&self) -> Vec<Fill> {
        self.state.read().fills.clone()
    }

    /// Every staged fill in any status.
    #[must_use]
    pub fn all_pending_fills(&self) -> Vec<PendingFillEvent> {
        self.state.read().pending.values().cloned().collect()
    }

    /// The audit log, oldest first.
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditLogEntry> {
        self.state.read().audit.clone()
    }

    /// Make every subsequent commit fail (for test setup).
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn validate(state: &State, changes: &ChangeSet) -> Result<(), StoreError> {
        let known = |id: &MarketMakerId| {
            state.market_makers.contains_key(id)
                || changes.market_makers.iter().any(|mm| &mm.id == id)
        };
        let referenced = changes
            .upsert_orders
            .iter()
            .map(|o| &o.market_maker_id)
            .chain(changes.fills.iter().map(|f| &f.market_maker_id))
            .chain(changes.pending_fills.iter().map(|e| &e.market_maker_id));
        for id in referenced {
            if !known(id) {
                return Err(StoreError::MarketMakerNotFound(id.clone()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn market_makers(&self) -> Result<Vec<MarketMaker>, StoreError> {
        Ok(self.state.read().market_makers.values().cloned().collect())
    }

    async fn market_maker(&self, id: &MarketMakerId) -> Result<Option<MarketMaker>, StoreError> {
        Ok(self.state.read().market_makers.get(id).cloned())
    }

    async fn tracked_orders(&self) -> Result<Vec<TrackedOrder>, StoreError> {
        Ok(self.state.read().orders.values().cloned().collect())
    }

    async fn tracked_orders_for(
        &self,
        id: &MarketMakerId,
    ) -> Result<Vec<TrackedOrder>, StoreError> {
        Ok(self
            .state
            .read()
            .orders
            .values()
            .filter(|o| &o.market_maker_id == id)
            .cloned()
            .collect())
    }

    async fn fills_for(&self, id: &MarketMakerId) -> Result<Vec<Fill>, StoreError> {
        Ok(self
            .state
            .read()
            .fills
            .iter()
            .filter(|f| &f.market_maker_id == id)
            .cloned()
            .collect())
    }

    async fn pending_fills_for(
        &self,
        id: &MarketMakerId,
    ) -> Result<Vec<PendingFillEvent>, StoreError> {
        Ok(self
            .state
            .read()
            .pending
            .values()
            .filter(|e| &e.market_maker_id == id)
            .cloned()
            .collect())
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("commit rejected".to_string()));
        }

        let mut state = self.state.write();
        Self::validate(&state, &changes)?;

        for mm in changes.market_makers {
            state.market_makers.insert(mm.id.clone(), mm);
        }
        for order in changes.upsert_orders {
            state.orders.insert(order.order_id.clone(), order);
        }
        for id in &changes.delete_orders {
            state.orders.remove(id);
        }
        state.fills.extend(changes.fills);
        for event in changes.pending_fills {
            state.pending.insert(event.id.clone(), event);
        }
        state.audit.extend(changes.audit);
        Ok(())
    }

    async fn delete_market_maker(&self, id: &MarketMakerId) -> Result<bool, StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("delete rejected".to_string()));
        }
        Ok(self.remove_market_maker(id))
    }
}
