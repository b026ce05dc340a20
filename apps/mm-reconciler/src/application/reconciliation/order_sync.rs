//! Order sync.
//!
//! Compares one market maker's tracked orders with the exchange open-order
//! snapshot. Orders the exchange no longer lists are resolved through a
//! per-order detail lookup before anything is deleted.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use super::ReconciliationEngine;
use super::issue::{IssueAction, IssueSeverity, IssueType, SyncIssue};
use super::report::SyncResult;
use crate::application::ports::{
    ChangeSet, ExchangeGateway, LedgerGateway, OrderLookup, OrderSummary, StateStore, StoreError,
};
use crate::domain::{MarketMaker, OrderId, TrackedOrder};

impl<E, L, S> ReconciliationEngine<E, L, S>
where
    E: ExchangeGateway,
    L: LedgerGateway,
    S: StateStore,
{
    pub(super) async fn sync_orders(
        &self,
        mm: &mut MarketMaker,
        open: &HashMap<OrderId, OrderSummary>,
        auto_correct: bool,
        out: &mut SyncResult,
    ) -> Result<(), StoreError> {
        let tracked = self.store.tracked_orders_for(&mm.id).await?;

        for order in tracked {
            if !mm.trades(&order.instrument_id) {
                debug!(
                    market_maker = %mm.id,
                    order_id = %order.order_id,
                    instrument = %order.instrument_id,
                    "Tracked order outside market scope, skipping"
                );
                continue;
            }
            out.orders_checked += 1;

            match open.get(&order.order_id) {
                Some(summary) => {
                    self.reconcile_open_order(mm, order, summary, auto_correct, out)
                        .await?;
                }
                None => self.resolve_missing_order(mm, order, auto_correct, out).await?,
            }
        }
        Ok(())
    }

    /// Order present on both sides: correct price drift, replay new matches.
    async fn reconcile_open_order(
        &self,
        mm: &mut MarketMaker,
        order: TrackedOrder,
        summary: &OrderSummary,
        auto_correct: bool,
        out: &mut SyncResult,
    ) -> Result<(), StoreError> {
        let mut changes = ChangeSet::default();
        let mut updated = order.clone();
        let mut mm_dirty = false;

        if (summary.price - order.price).abs() > self.config.price_tolerance {
            out.push(
                SyncIssue::new(
                    IssueType::OrderMismatch,
                    IssueSeverity::Warn,
                    IssueAction::corrected_if(auto_correct),
                    format!(
                        "Tracked price {} differs from exchange price {}",
                        order.price, summary.price
                    ),
                )
                .market_maker(&mm.id)
                .instrument(&order.instrument_id)
                .order(&order.order_id),
            );
            if auto_correct {
                updated.price = summary.price;
                out.orders_corrected += 1;
            }
        }

        let delta = order.unrecorded_fill(summary.size_matched);
        if delta > Decimal::ZERO {
            mm_dirty =
                self.replay_fill(mm, &order, delta, updated.price, auto_correct, &mut changes, out);
            if auto_correct {
                updated.advance_watermark(summary.size_matched);
            }
        }

        if updated != order {
            changes.upsert_orders.push(updated);
        }
        self.commit_market(mm, mm_dirty, changes).await
    }

    /// Tracked order missing from the open list: ask the exchange what
    /// happened to it.
    async fn resolve_missing_order(
        &self,
        mm: &mut MarketMaker,
        order: TrackedOrder,
        auto_correct: bool,
        out: &mut SyncResult,
    ) -> Result<(), StoreError> {
        let lookup = if order.is_simulated(&self.config.simulated_order_prefix) {
            OrderLookup::NotFound
        } else {
            self.exchange.get_order_detail(&order.order_id).await
        };

        let mut changes = ChangeSet::default();
        let mut mm_dirty = false;

        match lookup {
            OrderLookup::NotFound => {
                out.push(
                    SyncIssue::new(
                        IssueType::OrderInDbNotClob,
                        IssueSeverity::Warn,
                        IssueAction::corrected_if(auto_correct),
                        "Order unknown to exchange; removing tracked order",
                    )
                    .market_maker(&mm.id)
                    .instrument(&order.instrument_id)
                    .order(&order.order_id),
                );
                if auto_correct {
                    changes.delete_orders.push(order.order_id.clone());
                    out.orders_removed += 1;
                }
            }
            OrderLookup::Found(detail) if detail.status.is_terminal() => {
                let delta = order.unrecorded_fill(detail.size_matched);
                if delta > Decimal::ZERO {
                    mm_dirty = self.replay_fill(
                        mm,
                        &order,
                        delta,
                        detail.price,
                        auto_correct,
                        &mut changes,
                        out,
                    );
                }
                out.push(
                    SyncIssue::new(
                        IssueType::OrderInDbNotClob,
                        IssueSeverity::Info,
                        IssueAction::corrected_if(auto_correct),
                        format!(
                            "Order {} on exchange (matched {}); removing tracked order",
                            detail.status, detail.size_matched
                        ),
                    )
                    .market_maker(&mm.id)
                    .instrument(&order.instrument_id)
                    .order(&order.order_id),
                );
                if auto_correct {
                    changes.delete_orders.push(order.order_id.clone());
                    out.orders_removed += 1;
                }
            }
            OrderLookup::Found(detail) => {
                let delta = order.unrecorded_fill(detail.size_matched);
                if delta > Decimal::ZERO {
                    mm_dirty = self.replay_fill(
                        mm,
                        &order,
                        delta,
                        detail.price,
                        auto_correct,
                        &mut changes,
                        out,
                    );
                    if auto_correct {
                        let mut updated = order.clone();
                        updated.advance_watermark(detail.size_matched);
                        changes.upsert_orders.push(updated);
                    }
                }
                out.push(
                    SyncIssue::new(
                        IssueType::OrderInDbNotClob,
                        IssueSeverity::Info,
                        IssueAction::Logged,
                        format!(
                            "Order {} per detail lookup but missing from open orders; keeping",
                            detail.status
                        ),
                    )
                    .market_maker(&mm.id)
                    .instrument(&order.instrument_id)
                    .order(&order.order_id),
                );
            }
            OrderLookup::Error(message) => {
                out.push(
                    SyncIssue::new(
                        IssueType::OrderStatusUnknown,
                        IssueSeverity::Error,
                        IssueAction::RequiresManual,
                        format!("Order detail lookup failed: {message}; keeping tracked order"),
                    )
                    .market_maker(&mm.id)
                    .instrument(&order.instrument_id)
                    .order(&order.order_id),
                );
            }
        }

        self.commit_market(mm, mm_dirty, changes).await
    }
}
