//! Reconciliation Engine
//!
//! Keeps local market-maker bookkeeping consistent with the exchange order
//! book and the settlement ledger.
//!
//! # Full sync
//!
//! 1. Fetch exchange open orders and ledger positions once each. A failed
//!    fetch aborts only the sub-sync that needed it (fail closed).
//! 2. Report exchange orders nothing tracks (never adopted).
//! 3. Guard against an empty ledger response while local inventory exists.
//! 4. Per market maker, under its lock: order sync, position sync, P&L check.
//!    Market makers run with bounded concurrency.
//! 5. Append one audit log entry.
//!
//! # Quick sync
//!
//! Read-only comparison of order counts and aggregate inventory.
//!
//! # Escape hatches
//!
//! [`ReconciliationEngine::cancel_orphan_orders`] and
//! [`ReconciliationEngine::reset_to_ledger`] are destructive and only run on
//! operator request.

mod config;
mod error;
mod escape;
mod fill_replay;
mod health;
mod issue;
mod locks;
mod order_sync;
mod pnl;
mod position_sync;
mod report;

#[cfg(test)]
mod tests;

pub use config::{PositionSyncPolicy, ReconciliationConfig};
pub use error::ReconciliationError;
pub use health::{Dependency, DependencyHealth, HealthSnapshot};
pub use issue::{IssueAction, IssueSeverity, IssueType, SyncIssue};
pub use locks::MarketMakerLocks;
pub use report::{
    AUDIT_SAMPLE_LIMIT, OrphanCancelResult, QuickSyncResult, ResetResult, SyncResult,
};

use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::application::ports::{
    ChangeSet, ExchangeGateway, LedgerGateway, LedgerPosition, LedgerQuery, OrderSummary,
    StateStore, StoreError,
};
use crate::domain::{
    AuditCategory, AuditLogEntry, InstrumentId, MarketMaker, MarketMakerId, OrderId,
};
use crate::observability;

/// Gateway data fetched once per full pass and shared by every market maker.
struct PassContext {
    auto_correct: bool,
    /// `None` when the exchange was unreachable.
    open_orders: Option<HashMap<OrderId, OrderSummary>>,
    /// `None` when the ledger was unreachable or distrusted.
    ledger_positions: Option<HashMap<InstrumentId, LedgerPosition>>,
}

/// Reconciles local state against the exchange and the settlement ledger.
pub struct ReconciliationEngine<E, L, S>
where
    E: ExchangeGateway,
    L: LedgerGateway,
    S: StateStore,
{
    exchange: Arc<E>,
    ledger: Arc<L>,
    store: Arc<S>,
    config: ReconciliationConfig,
    health: DependencyHealth,
    locks: Arc<MarketMakerLocks>,
    run_lock: AsyncMutex<()>,
}

impl<E, L, S> ReconciliationEngine<E, L, S>
where
    E: ExchangeGateway,
    L: LedgerGateway,
    S: StateStore,
{
    /// Create an engine with its own lock table.
    pub fn new(exchange: Arc<E>, ledger: Arc<L>, store: Arc<S>, config: ReconciliationConfig) -> Self {
        let health = DependencyHealth::new(config.failure_alert_threshold);
        Self {
            exchange,
            ledger,
            store,
            config,
            health,
            locks: Arc::new(MarketMakerLocks::new()),
            run_lock: AsyncMutex::new(()),
        }
    }

    /// Share a lock table with the quoting loop.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<MarketMakerLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// The per-market-maker lock table.
    pub fn locks(&self) -> Arc<MarketMakerLocks> {
        Arc::clone(&self.locks)
    }

    /// Engine configuration.
    pub const fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Current dependency health.
    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    // ========================================================================
    // Full sync
    // ========================================================================

    /// Run order sync, position sync and P&L verification for every market
    /// maker.
    ///
    /// With `auto_correct` false nothing but the audit entry is written. With
    /// `verbose` every issue is logged; otherwise only ERROR and CRITICAL.
    pub async fn full_sync(&self, auto_correct: bool, verbose: bool) -> SyncResult {
        let _run = self.run_lock.lock().await;
        let started = Instant::now();
        let mut result = SyncResult::new(auto_correct);

        debug!(auto_correct, verbose, "Starting full sync");

        let market_makers = match self.store.market_makers().await {
            Ok(market_makers) => market_makers,
            Err(e) => {
                result.push(store_issue(&e, None));
                return self.finish(result, started, verbose).await;
            }
        };
        let scope = instrument_scope(&market_makers);

        let open_orders = self.fetch_open_orders(&mut result).await.map(|orders| {
            orders
                .into_iter()
                .filter(|o| scope.contains(&o.instrument_id))
                .map(|o| (o.id.clone(), o))
                .collect::<HashMap<_, _>>()
        });

        if let Some(open) = &open_orders {
            match self.store.tracked_orders().await {
                Ok(tracked) => {
                    let tracked: HashSet<OrderId> =
                        tracked.into_iter().map(|o| o.order_id).collect();
                    detect_orphans(open, &tracked, &mut result);
                }
                Err(e) => result.push(store_issue(&e, None)),
            }
        }

        let ledger_positions = match self.fetch_ledger(&mut result).await {
            Some(positions) => self.screen_ledger(positions, &market_makers, &scope, &mut result),
            None => None,
        };
        if ledger_positions.is_none() {
            result.position_sync_skipped = true;
        }

        let ctx = PassContext {
            auto_correct,
            open_orders,
            ledger_positions,
        };

        let partials: Vec<SyncResult> = stream::iter(market_makers.into_iter().map(|mm| mm.id))
            .map(|id| self.sync_market_maker(id, &ctx))
            .buffer_unordered(self.config.max_concurrent_markets.max(1))
            .collect()
            .await;
        for partial in partials {
            result.absorb(partial);
        }

        self.finish(result, started, verbose).await
    }

    async fn fetch_open_orders(&self, result: &mut SyncResult) -> Option<Vec<OrderSummary>> {
        match self.exchange.fetch_open_orders().await {
            Ok(orders) => {
                self.health.record_success(Dependency::Exchange);
                Some(orders)
            }
            Err(e) => {
                let streak = self.health.record_failure(Dependency::Exchange, &e.to_string());
                result.push(SyncIssue::new(
                    IssueType::ClobUnavailable,
                    IssueSeverity::Critical,
                    IssueAction::RequiresManual,
                    format!("Exchange open orders unavailable ({streak} consecutive): {e}; order sync skipped"),
                ));
                None
            }
        }
    }

    async fn fetch_ledger(&self, result: &mut SyncResult) -> Option<Vec<LedgerPosition>> {
        match self.ledger.get_positions(&self.ledger_query()).await {
            Ok(positions) => {
                self.health.record_success(Dependency::Ledger);
                Some(positions)
            }
            Err(e) => {
                let streak = self.health.record_failure(Dependency::Ledger, &e.to_string());
                result.push(SyncIssue::new(
                    IssueType::DataApiUnavailable,
                    IssueSeverity::Critical,
                    IssueAction::RequiresManual,
                    format!("Ledger positions unavailable ({streak} consecutive): {e}; position sync skipped"),
                ));
                None
            }
        }
    }

    fn ledger_query(&self) -> LedgerQuery {
        LedgerQuery {
            wallet: None,
            min_size: self.config.ledger_min_size,
            limit: self.config.ledger_limit,
        }
    }

    /// Apply the empty-response guard and report unmapped ledger positions.
    ///
    /// Returns `None` when the ledger response must not be acted on.
    fn screen_ledger(
        &self,
        positions: Vec<LedgerPosition>,
        market_makers: &[MarketMaker],
        scope: &HashSet<InstrumentId>,
        result: &mut SyncResult,
    ) -> Option<HashMap<InstrumentId, LedgerPosition>> {
        let local_total: Decimal = market_makers.iter().map(MarketMaker::total_inventory).sum();

        if positions.is_empty() && local_total > self.config.empty_ledger_guard {
            result.push(SyncIssue::new(
                IssueType::PositionDrift,
                IssueSeverity::Critical,
                IssueAction::RequiresManual,
                format!(
                    "Ledger returned no positions while local inventory totals {local_total}; position sync skipped"
                ),
            ));
            return None;
        }

        for position in &positions {
            if !scope.contains(&position.instrument_id)
                && position.size >= self.config.material_position_size
            {
                result.push(
                    SyncIssue::new(
                        IssueType::PositionMissing,
                        IssueSeverity::Warn,
                        IssueAction::Logged,
                        format!(
                            "Ledger holds {} shares with no configured market",
                            position.size
                        ),
                    )
                    .instrument(&position.instrument_id),
                );
            }
        }

        Some(
            positions
                .into_iter()
                .map(|p| (p.instrument_id.clone(), p))
                .collect(),
        )
    }

    /// Orders, positions and P&L for one market maker, under its lock.
    async fn sync_market_maker(&self, id: MarketMakerId, ctx: &PassContext) -> SyncResult {
        let _guard = self.locks.lock(&id).await;
        let mut out = SyncResult::new(ctx.auto_correct);

        let mut mm = match self.store.market_maker(&id).await {
            Ok(Some(mm)) => mm,
            Ok(None) => {
                debug!(market_maker = %id, "Market maker removed during sync");
                return out;
            }
            Err(e) => {
                out.push(store_issue(&e, Some(&id)));
                return out;
            }
        };

        if let Err(e) = self.run_pipeline(&mut mm, ctx, &mut out).await {
            out.push(store_issue(&e, Some(&id)));
        }
        out
    }

    async fn run_pipeline(
        &self,
        mm: &mut MarketMaker,
        ctx: &PassContext,
        out: &mut SyncResult,
    ) -> Result<(), StoreError> {
        if let Some(open) = &ctx.open_orders {
            self.sync_orders(mm, open, ctx.auto_correct, out).await?;
        }
        if let Some(ledger) = &ctx.ledger_positions {
            self.sync_positions(mm, ledger, ctx.auto_correct, out).await?;
        }
        self.verify_pnl(mm, out).await
    }

    /// Write a market maker's changes in one commit.
    async fn commit_market(
        &self,
        mm: &MarketMaker,
        mm_dirty: bool,
        mut changes: ChangeSet,
    ) -> Result<(), StoreError> {
        if mm_dirty {
            changes.market_makers.push(mm.clone());
        }
        if changes.is_empty() {
            return Ok(());
        }
        self.store.commit(changes).await
    }

    async fn finish(&self, mut result: SyncResult, started: Instant, verbose: bool) -> SyncResult {
        result.duration_ms = started.elapsed().as_millis() as u64;

        for issue in &result.issues {
            observability::record_issue(&issue.issue_type.to_string(), &issue.severity.to_string());
            if verbose || issue.severity >= IssueSeverity::Error {
                issue.log();
            }
        }
        observability::record_sync_run("full", started.elapsed().as_secs_f64());
        observability::record_corrections(
            result.fills_replayed,
            result.positions_corrected,
            result.orders_removed,
        );
        observability::update_pnl_discrepancy(result.pnl_discrepancy_total.to_f64().unwrap_or(0.0));

        let entry = AuditLogEntry::new(
            AuditCategory::Reconciliation,
            format!(
                "Full sync: {} issues, {} corrections",
                result.issues.len(),
                result.corrections()
            ),
            result.audit_details(),
        );
        let audit = ChangeSet {
            audit: vec![entry],
            ..ChangeSet::default()
        };
        if let Err(e) = self.store.commit(audit).await {
            error!(error = %e, "Failed to append reconciliation audit entry");
        }

        if result.has_critical() {
            warn!(
                duration_ms = result.duration_ms,
                issues = result.issues.len(),
                critical = result.count_severity(IssueSeverity::Critical),
                corrections = result.corrections(),
                "Full sync completed with critical issues"
            );
        } else {
            info!(
                duration_ms = result.duration_ms,
                issues = result.issues.len(),
                corrections = result.corrections(),
                fills_replayed = result.fills_replayed,
                positions_corrected = result.positions_corrected,
                "Full sync completed"
            );
        }
        result
    }

    // ========================================================================
    // Quick sync
    // ========================================================================

    /// Compare order counts and aggregate inventory. Writes nothing.
    pub async fn quick_sync(&self) -> QuickSyncResult {
        let started = Instant::now();

        let snapshot = async {
            let market_makers = self.store.market_makers().await?;
            let tracked = self.store.tracked_orders().await?;
            Ok::<_, StoreError>((market_makers, tracked))
        }
        .await;
        let (market_makers, tracked) = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Quick sync could not read local state");
                return QuickSyncResult {
                    orders_match: false,
                    positions_match: false,
                    issue_count: 1,
                    local_orders: 0,
                    exchange_orders: None,
                    local_inventory: Decimal::ZERO,
                    ledger_inventory: None,
                };
            }
        };

        let scope = instrument_scope(&market_makers);
        let local_orders = tracked
            .iter()
            .filter(|o| scope.contains(&o.instrument_id))
            .count();
        let local_inventory: Decimal = market_makers.iter().map(MarketMaker::total_inventory).sum();

        let exchange_orders = match self.exchange.fetch_open_orders().await {
            Ok(orders) => {
                self.health.record_success(Dependency::Exchange);
                Some(
                    orders
                        .iter()
                        .filter(|o| scope.contains(&o.instrument_id))
                        .count(),
                )
            }
            Err(e) => {
                self.health.record_failure(Dependency::Exchange, &e.to_string());
                warn!(error = %e, "Quick sync: exchange unavailable");
                None
            }
        };

        let ledger_inventory = match self.ledger.get_positions(&self.ledger_query()).await {
            Ok(positions) => {
                self.health.record_success(Dependency::Ledger);
                Some(
                    positions
                        .iter()
                        .filter(|p| scope.contains(&p.instrument_id))
                        .map(|p| p.size)
                        .sum::<Decimal>(),
                )
            }
            Err(e) => {
                self.health.record_failure(Dependency::Ledger, &e.to_string());
                warn!(error = %e, "Quick sync: ledger unavailable");
                None
            }
        };

        let orders_match = exchange_orders == Some(local_orders);
        let positions_match = ledger_inventory.is_some_and(|ledger| {
            (ledger - local_inventory).abs() <= self.config.quick_sync_inventory_tolerance
        });
        let issue_count = usize::from(!orders_match) + usize::from(!positions_match);

        observability::record_sync_run("quick", started.elapsed().as_secs_f64());
        if issue_count > 0 {
            warn!(
                local_orders,
                exchange_orders = ?exchange_orders,
                local_inventory = %local_inventory,
                ledger_inventory = ?ledger_inventory.map(|d| d.to_string()),
                "Quick sync found differences"
            );
        } else {
            debug!(local_orders, local_inventory = %local_inventory, "Quick sync clean");
        }

        QuickSyncResult {
            orders_match,
            positions_match,
            issue_count,
            local_orders,
            exchange_orders,
            local_inventory,
            ledger_inventory,
        }
    }
}

/// Every resolved outcome token of the given market makers.
fn instrument_scope(market_makers: &[MarketMaker]) -> HashSet<InstrumentId> {
    market_makers
        .iter()
        .flat_map(|mm| [mm.yes_instrument.clone(), mm.no_instrument.clone()])
        .flatten()
        .collect()
}

fn detect_orphans(
    open: &HashMap<OrderId, OrderSummary>,
    tracked: &HashSet<OrderId>,
    result: &mut SyncResult,
) {
    let mut orphans: Vec<&OrderSummary> = open.values().filter(|o| !tracked.contains(&o.id)).collect();
    orphans.sort_by(|a, b| a.id.cmp(&b.id));
    for order in orphans {
        result.orphan_orders += 1;
        result.push(
            SyncIssue::new(
                IssueType::OrderInClobNotDb,
                IssueSeverity::Warn,
                IssueAction::Logged,
                format!(
                    "Untracked {} {} @ {} open on exchange",
                    order.side, order.size, order.price
                ),
            )
            .instrument(&order.instrument_id)
            .order(&order.id),
        );
    }
}

fn store_issue(error: &StoreError, market_maker: Option<&MarketMakerId>) -> SyncIssue {
    let issue = SyncIssue::new(
        IssueType::StoreError,
        IssueSeverity::Critical,
        IssueAction::RequiresManual,
        format!("Local store failed: {error}"),
    );
    match market_maker {
        Some(id) => issue.market_maker(id),
        None => issue,
    }
}
