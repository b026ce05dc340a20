//! Per-market-maker locks.
//!
//! The quoting loop and the reconciler take the same lock before touching a
//! market maker, so a correction never interleaves with a quote update.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::MarketMakerId;

/// Keyed async mutexes, one per market maker.
#[derive(Debug, Default)]
pub struct MarketMakerLocks {
    inner: Mutex<HashMap<MarketMakerId, Arc<AsyncMutex<()>>>>,
}

impl MarketMakerLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one market maker.
    pub async fn lock(&self, id: &MarketMakerId) -> OwnedMutexGuard<()> {
        let handle = {
            let mut table = self.inner.lock();
            Arc::clone(table.entry(id.clone()).or_default())
        };
        handle.lock_owned().await
    }

    /// Take the lock only if it is free.
    pub fn try_lock(&self, id: &MarketMakerId) -> Option<OwnedMutexGuard<()>> {
        let handle = {
            let mut table = self.inner.lock();
            Arc::clone(table.entry(id.clone()).or_default())
        };
        handle.try_lock_owned().ok()
    }

    /// Number of market makers with a lock entry.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if no lock entry exists.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop the entry of a removed market maker.
    ///
    /// Called by [`ReconciliationEngine::remove_market_maker`](super::ReconciliationEngine::remove_market_maker)
    /// after the deletion commits.
    pub fn forget(&self, id: &MarketMakerId) {
        self.inner.lock().remove(id);
    }
}
