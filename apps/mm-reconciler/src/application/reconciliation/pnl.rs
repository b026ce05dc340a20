//! P&L verification.
//!
//! Read-only cross-check of stored realized P&L against the sum of recorded
//! fill P&L.

use rust_decimal::Decimal;

use super::ReconciliationEngine;
use super::issue::{IssueAction, IssueSeverity, IssueType, SyncIssue};
use super::report::SyncResult;
use crate::application::ports::{ExchangeGateway, LedgerGateway, StateStore, StoreError};
use crate::domain::MarketMaker;

impl<E, L, S> ReconciliationEngine<E, L, S>
where
    E: ExchangeGateway,
    L: LedgerGateway,
    S: StateStore,
{
    pub(super) async fn verify_pnl(
        &self,
        mm: &MarketMaker,
        out: &mut SyncResult,
    ) -> Result<(), StoreError> {
        let fills = self.store.fills_for(&mm.id).await?;
        let from_fills: Decimal = fills.iter().filter_map(|f| f.realized_pnl).sum();
        out.pnl_checked += 1;

        let discrepancy = (mm.realized_pnl - from_fills).abs();
        if discrepancy <= self.config.pnl_tolerance {
            return Ok(());
        }

        out.pnl_discrepancy_total += discrepancy;
        let severity = if discrepancy <= self.config.pnl_error_threshold {
            IssueSeverity::Warn
        } else {
            IssueSeverity::Error
        };
        out.push(
            SyncIssue::new(
                IssueType::PnlMismatch,
                severity,
                IssueAction::Logged,
                format!(
                    "Stored realized P&L {} differs from fill sum {} by {discrepancy}",
                    mm.realized_pnl, from_fills
                ),
            )
            .market_maker(&mm.id),
        );
        Ok(())
    }
}
