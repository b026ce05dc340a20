//! Operator escape hatches.
//!
//! Destructive, operator-initiated recovery actions. Never scheduled.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use super::error::ReconciliationError;
use super::health::Dependency;
use super::report::{OrphanCancelResult, ResetResult};
use super::ReconciliationEngine;
use crate::application::ports::{
    ChangeSet, ExchangeGateway, LedgerGateway, LedgerPosition, OrderSummary, StateStore,
};
use crate::domain::{
    AuditCategory, AuditLogEntry, InstrumentId, MarketMaker, MarketMakerId, OrderId, Outcome,
    PendingFillStatus,
};
use crate::observability;

impl<E, L, S> ReconciliationEngine<E, L, S>
where
    E: ExchangeGateway,
    L: LedgerGateway,
    S: StateStore,
{
    /// Cancel every exchange order on a tracked instrument that no market
    /// maker tracks.
    pub async fn cancel_orphan_orders(&self) -> Result<OrphanCancelResult, ReconciliationError> {
        let _run = self.run_lock.lock().await;

        let open = match self.exchange.fetch_open_orders().await {
            Ok(open) => {
                self.health.record_success(Dependency::Exchange);
                open
            }
            Err(e) => {
                self.health.record_failure(Dependency::Exchange, &e.to_string());
                return Err(ReconciliationError::ExchangeUnavailable(e));
            }
        };
        let market_makers = self.store.market_makers().await?;
        let tracked: HashSet<OrderId> = self
            .store
            .tracked_orders()
            .await?
            .into_iter()
            .map(|o| o.order_id)
            .collect();
        let owners = instrument_owners(&market_makers);

        let mut candidates: BTreeMap<MarketMakerId, Vec<&OrderSummary>> = BTreeMap::new();
        for order in open.iter().filter(|o| !tracked.contains(&o.id)) {
            if let Some(owner) = owners.get(&order.instrument_id) {
                candidates.entry((*owner).clone()).or_default().push(order);
            }
        }

        let mut result = OrphanCancelResult::default();
        let mut cancelled_ids = Vec::new();
        for (id, orders) in candidates {
            // The quoting loop rests an order before tracking it; re-check under its lock.
            let _guard = self.locks.lock(&id).await;
            let tracked_now: HashSet<OrderId> = self
                .store
                .tracked_orders_for(&id)
                .await?
                .into_iter()
                .map(|o| o.order_id)
                .collect();

            for order in orders {
                if tracked_now.contains(&order.id) {
                    debug!(order_id = %order.id, market_maker = %id, "Order tracked since scan, kept");
                    continue;
                }
                let accepted = self.exchange.cancel_order(&order.id).await;
                observability::record_orphan_cancel(accepted);
                if accepted {
                    result.cancelled += 1;
                    cancelled_ids.push(order.id.as_str().to_string());
                } else {
                    result.failed += 1;
                    warn!(order_id = %order.id, instrument = %order.instrument_id, "Orphan cancel rejected");
                }
            }
        }

        let entry = AuditLogEntry::new(
            AuditCategory::Operator,
            format!("Cancelled {} orphan orders ({} failed)", result.cancelled, result.failed),
            json!({ "cancelled": cancelled_ids, "failed": result.failed }),
        );
        self.store
            .commit(ChangeSet {
                audit: vec![entry],
                ..ChangeSet::default()
            })
            .await?;

        info!(
            cancelled = result.cancelled,
            failed = result.failed,
            "Orphan order cancellation completed"
        );
        Ok(result)
    }

    /// Delete a market maker and everything it owns, then drop its lock entry.
    ///
    /// Waits for any quote update or sync step in progress on it. Returns
    /// false if it did not exist.
    pub async fn remove_market_maker(&self, id: &MarketMakerId) -> Result<bool, ReconciliationError> {
        let _run = self.run_lock.lock().await;

        let removed = {
            let _guard = self.locks.lock(id).await;
            self.store.delete_market_maker(id).await?
        };
        self.locks.forget(id);

        if removed {
            let entry = AuditLogEntry::new(
                AuditCategory::Operator,
                format!("{id} removed"),
                json!({ "market_maker": id.as_str() }),
            );
            if let Err(e) = self
                .store
                .commit(ChangeSet {
                    audit: vec![entry],
                    ..ChangeSet::default()
                })
                .await
            {
                warn!(market_maker = %id, error = %e, "Failed to record market maker removal");
            }
            info!(market_maker = %id, "Market maker removed");
        }
        Ok(removed)
    }

    /// Overwrite every market maker's positions with the ledger, clear all
    /// tracked orders and discard staged fills. Realized P&L is kept.
    pub async fn reset_to_ledger(&self) -> Result<ResetResult, ReconciliationError> {
        let _run = self.run_lock.lock().await;

        let positions = match self.ledger.get_positions(&self.ledger_query()).await {
            Ok(positions) => {
                self.health.record_success(Dependency::Ledger);
                positions
            }
            Err(e) => {
                self.health.record_failure(Dependency::Ledger, &e.to_string());
                return Err(ReconciliationError::LedgerUnavailable(e));
            }
        };
        if positions.is_empty() {
            warn!("Ledger returned no positions; resetting every market maker to flat");
        }
        let ledger: HashMap<InstrumentId, LedgerPosition> = positions
            .into_iter()
            .map(|p| (p.instrument_id.clone(), p))
            .collect();

        let ids: Vec<_> = self
            .store
            .market_makers()
            .await?
            .into_iter()
            .map(|mm| mm.id)
            .collect();

        let now = Utc::now();
        let mut result = ResetResult::default();

        for id in ids {
            let _guard = self.locks.lock(&id).await;
            let Some(mut mm) = self.store.market_maker(&id).await? else {
                continue;
            };
            let orders = self.store.tracked_orders_for(&id).await?;
            let pending = self.store.pending_fills_for(&id).await?;

            let mut changes = ChangeSet::default();
            for outcome in Outcome::ALL {
                let local_avg = mm.position(outcome).avg_cost;
                let (size, avg) = mm
                    .instrument(outcome)
                    .and_then(|token| ledger.get(token))
                    .map_or((Decimal::ZERO, Decimal::ZERO), |p| {
                        (p.size, p.avg_price.unwrap_or(local_avg))
                    });
                mm.overwrite_position(outcome, size, avg);
            }

            changes.delete_orders = orders.into_iter().map(|o| o.order_id).collect();
            for mut event in pending.into_iter().filter(|e| e.is_pending()) {
                event.resolve(PendingFillStatus::Discarded, now);
                changes.pending_fills.push(event);
            }

            let orders_cleared = changes.delete_orders.len();
            let pending_discarded = changes.pending_fills.len();
            changes.audit.push(AuditLogEntry::new(
                AuditCategory::Operator,
                format!("{id} reset to ledger"),
                json!({
                    "market_maker": id.as_str(),
                    "yes_inventory": mm.yes.inventory.to_string(),
                    "no_inventory": mm.no.inventory.to_string(),
                    "orders_cleared": orders_cleared,
                    "pending_discarded": pending_discarded,
                }),
            ));
            changes.market_makers.push(mm);
            self.store.commit(changes).await?;

            result.markets_reset += 1;
            result.orders_cleared += orders_cleared;
            result.pending_discarded += pending_discarded;
        }

        info!(
            markets_reset = result.markets_reset,
            orders_cleared = result.orders_cleared,
            pending_discarded = result.pending_discarded,
            "Reset to ledger completed"
        );
        Ok(result)
    }
}

/// Owning market maker of every tracked instrument.
fn instrument_owners(market_makers: &[MarketMaker]) -> HashMap<&InstrumentId, &MarketMakerId> {
    market_makers
        .iter()
        .flat_map(|mm| {
            [mm.yes_instrument.as_ref(), mm.no_instrument.as_ref()]
                .into_iter()
                .flatten()
                .map(move |token| (token, &mm.id))
        })
        .collect()
}
