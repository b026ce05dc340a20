//! Position sync.
//!
//! Compares each outcome position of a market maker with the settlement
//! ledger. Staged fills are confirmed or expired first, then any remaining
//! drift above threshold is handled according to the position policy.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;

use super::ReconciliationEngine;
use super::config::PositionSyncPolicy;
use super::issue::{IssueAction, IssueSeverity, IssueType, SyncIssue};
use super::report::SyncResult;
use crate::application::ports::{
    ChangeSet, ExchangeGateway, LedgerGateway, LedgerPosition, StateStore, StoreError,
};
use crate::domain::{
    AuditCategory, AuditLogEntry, InstrumentId, MarketMaker, Outcome, PendingFillStatus,
};

impl<E, L, S> ReconciliationEngine<E, L, S>
where
    E: ExchangeGateway,
    L: LedgerGateway,
    S: StateStore,
{
    pub(super) async fn sync_positions(
        &self,
        mm: &mut MarketMaker,
        ledger: &HashMap<InstrumentId, LedgerPosition>,
        auto_correct: bool,
        out: &mut SyncResult,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let ttl = Duration::seconds(i64::try_from(self.config.pending_fill_ttl_secs).unwrap_or(i64::MAX));

        let mut pending: Vec<_> = self
            .store
            .pending_fills_for(&mm.id)
            .await?
            .into_iter()
            .filter(|e| e.is_pending())
            .collect();
        pending.sort_by_key(|e| e.created_at);

        let mut changes = ChangeSet::default();
        let mut mm_dirty = false;
        let mut market_corrected = false;

        for event in pending.iter_mut().filter(|e| e.is_stale(now, ttl)) {
            out.pending_expired += 1;
            out.push(
                SyncIssue::new(
                    IssueType::PendingFillExpired,
                    IssueSeverity::Warn,
                    IssueAction::corrected_if(auto_correct),
                    format!(
                        "Staged {} fill of {} never confirmed by ledger",
                        event.side, event.size
                    ),
                )
                .market_maker(&mm.id)
                .order(&event.order_id),
            );
            if auto_correct {
                event.resolve(PendingFillStatus::Expired, now);
                changes.pending_fills.push(event.clone());
            }
        }

        for outcome in Outcome::ALL {
            let Some(instrument) = mm.instrument(outcome).cloned() else {
                continue;
            };
            out.positions_checked += 1;

            // A missing ledger position is flat; a missing average is unknown.
            let (ledger_size, ledger_avg) = ledger
                .get(&instrument)
                .map_or((Decimal::ZERO, Some(Decimal::ZERO)), |p| (p.size, p.avg_price));

            if auto_correct {
                mm_dirty |= self.confirm_pending(
                    mm,
                    outcome,
                    ledger_size,
                    &mut pending,
                    now,
                    &mut changes,
                    out,
                );
            }

            let local = *mm.position(outcome);
            let size_drift = (local.inventory - ledger_size).abs();
            // Cost basis is only comparable when both sides hold shares.
            let avg_drift = match ledger_avg {
                Some(avg) if !local.is_flat() && !ledger_size.is_zero() => {
                    (local.avg_cost - avg).abs()
                }
                _ => Decimal::ZERO,
            };
            let ledger_avg_label = ledger_avg.map_or_else(|| "?".to_string(), |avg| avg.to_string());

            if size_drift <= self.config.size_drift_threshold
                && avg_drift <= self.config.avg_cost_drift_threshold
            {
                continue;
            }

            let severity = if size_drift > self.config.size_drift_threshold {
                IssueSeverity::Error
            } else {
                IssueSeverity::Warn
            };
            let overwrite =
                auto_correct && self.config.position_policy == PositionSyncPolicy::LedgerAuthoritative;
            let action = match self.config.position_policy {
                PositionSyncPolicy::AlertOnly => IssueAction::RequiresManual,
                PositionSyncPolicy::LedgerAuthoritative => IssueAction::corrected_if(overwrite),
            };

            out.push(
                SyncIssue::new(
                    IssueType::PositionDrift,
                    severity,
                    action,
                    format!(
                        "{outcome} local {} @ {} vs ledger {} @ {} (size drift {}, avg drift {})",
                        local.inventory, local.avg_cost, ledger_size, ledger_avg_label, size_drift, avg_drift
                    ),
                )
                .market_maker(&mm.id)
                .instrument(&instrument),
            );

            if overwrite {
                mm.overwrite_position(outcome, ledger_size, ledger_avg.unwrap_or(local.avg_cost));
                mm_dirty = true;
                market_corrected = true;
                out.positions_corrected += 1;
                changes.audit.push(AuditLogEntry::new(
                    AuditCategory::PositionOverwrite,
                    format!("{} {outcome} position overwritten from ledger", mm.id),
                    json!({
                        "market_maker": mm.id.as_str(),
                        "instrument": instrument.as_str(),
                        "outcome": outcome.to_string(),
                        "previous_inventory": local.inventory.to_string(),
                        "previous_avg_cost": local.avg_cost.to_string(),
                        "ledger_inventory": ledger_size.to_string(),
                        "ledger_avg_cost": ledger_avg.map(|avg| avg.to_string()),
                    }),
                ));
            }
        }

        if market_corrected {
            out.markets_corrected += 1;
        }
        self.commit_market(mm, mm_dirty, changes).await
    }
}
