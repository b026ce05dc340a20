//! Fill replay.
//!
//! Matched size the exchange reports beyond an order's watermark is folded
//! into the market maker (direct mode) or staged as a pending fill event
//! (staged mode). Staged events are promoted once the ledger shows the
//! matching inventory change.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;

use super::ReconciliationEngine;
use super::issue::{IssueAction, IssueSeverity, IssueType, SyncIssue};
use super::report::SyncResult;
use crate::application::ports::{ChangeSet, ExchangeGateway, LedgerGateway, StateStore};
use crate::domain::{
    Fill, FillSource, MarketMaker, Outcome, PendingFillEvent, PendingFillStatus, TrackedOrder,
};

impl<E, L, S> ReconciliationEngine<E, L, S>
where
    E: ExchangeGateway,
    L: LedgerGateway,
    S: StateStore,
{
    /// Replay `qty` of unrecorded fill on `order`.
    ///
    /// Returns true if `mm` was mutated.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn replay_fill(
        &self,
        mm: &mut MarketMaker,
        order: &TrackedOrder,
        qty: Decimal,
        price: Decimal,
        auto_correct: bool,
        changes: &mut ChangeSet,
        out: &mut SyncResult,
    ) -> bool {
        let side = order.side.trade_side();

        let issue = |action: IssueAction, message: String| {
            SyncIssue::new(IssueType::FillReplayed, IssueSeverity::Info, action, message)
                .market_maker(&mm.id)
                .instrument(&order.instrument_id)
                .order(&order.order_id)
        };

        if !auto_correct {
            out.push(issue(
                IssueAction::Logged,
                format!("Unrecorded {side} fill of {qty} @ {price}"),
            ));
            return false;
        }

        if self.config.stage_fills {
            changes.pending_fills.push(PendingFillEvent::new(
                mm.id.clone(),
                order.order_id.clone(),
                order.outcome,
                side,
                price,
                qty,
            ));
            out.fills_staged += 1;
            out.push(issue(
                IssueAction::Logged,
                format!("Staged {side} fill of {qty} @ {price} pending ledger confirmation"),
            ));
            return false;
        }

        let replayed = issue(
            IssueAction::Corrected,
            format!("Replayed {side} fill of {qty} @ {price}"),
        );
        let effect = mm.apply_fill(order.outcome, side, price, qty);
        if effect.oversold > Decimal::ZERO {
            warn!(
                market_maker = %mm.id,
                order_id = %order.order_id,
                oversold = %effect.oversold,
                "Sell fill exceeds local inventory; clamped at zero"
            );
        }
        changes.fills.push(Fill::new(
            mm.id.clone(),
            order.order_id.clone(),
            order.outcome,
            side,
            price,
            qty,
            effect.realized_pnl,
            FillSource::OrderSync,
        ));
        out.fills_replayed += 1;
        out.push(replayed);
        true
    }

    /// Promote pending events whose direction and size fit inside the gap
    /// between local inventory and the ledger.
    ///
    /// Returns true if `mm` was mutated.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn confirm_pending(
        &self,
        mm: &mut MarketMaker,
        outcome: Outcome,
        ledger_size: Decimal,
        pending: &mut [PendingFillEvent],
        now: DateTime<Utc>,
        changes: &mut ChangeSet,
        out: &mut SyncResult,
    ) -> bool {
        let mut gap = ledger_size - mm.position(outcome).inventory;
        let mut applied = false;

        for event in pending
            .iter_mut()
            .filter(|e| e.is_pending() && e.outcome == outcome)
        {
            if gap.is_zero() {
                break;
            }
            let implied = event.signed_size();
            let same_direction = implied.is_sign_positive() == gap.is_sign_positive();
            if !same_direction || implied.abs() > gap.abs() + self.config.size_drift_threshold {
                continue;
            }

            let effect = mm.apply_fill(outcome, event.side, event.price, event.size);
            changes.fills.push(Fill::new(
                mm.id.clone(),
                event.order_id.clone(),
                outcome,
                event.side,
                event.price,
                event.size,
                effect.realized_pnl,
                FillSource::PendingConfirmed,
            ));
            event.resolve(PendingFillStatus::Confirmed, now);
            changes.pending_fills.push(event.clone());
            gap -= implied;
            applied = true;

            out.pending_confirmed += 1;
            let mut issue = SyncIssue::new(
                IssueType::PendingFillConfirmed,
                IssueSeverity::Info,
                IssueAction::Corrected,
                format!(
                    "Ledger confirmed staged {} fill of {} @ {}",
                    event.side, event.size, event.price
                ),
            )
            .market_maker(&mm.id)
            .order(&event.order_id);
            if let Some(instrument) = mm.instrument(outcome) {
                issue = issue.instrument(instrument);
            }
            out.push(issue);
        }
        applied
    }
}
