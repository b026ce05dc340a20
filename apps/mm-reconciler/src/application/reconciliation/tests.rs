use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use test_case::test_case;

use super::*;
use crate::application::ports::{GatewayError, LedgerQuery};
use crate::domain::{
    Fill, FillSource, MarketId, Outcome, PendingFillEvent, PendingFillStatus, QuoteSide,
    TrackedOrder, TradeSide,
};
use crate::infrastructure::exchange::PaperExchangeGateway;
use crate::infrastructure::persistence::InMemoryStateStore;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct MockLedger {
    positions: Mutex<Vec<LedgerPosition>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockLedger {
    fn set(&self, positions: Vec<LedgerPosition>) {
        *self.positions.lock() = positions;
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn get_positions(&self, _query: &LedgerQuery) -> Result<Vec<LedgerPosition>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout { timeout_ms: 10_000 });
        }
        Ok(self.positions.lock().clone())
    }
}

type TestEngine = ReconciliationEngine<PaperExchangeGateway, MockLedger, InMemoryStateStore>;

struct Harness {
    venue: Arc<PaperExchangeGateway>,
    ledger: Arc<MockLedger>,
    store: Arc<InMemoryStateStore>,
    engine: TestEngine,
}

fn harness_with(config: ReconciliationConfig) -> Harness {
    let venue = Arc::new(PaperExchangeGateway::default());
    let ledger = Arc::new(MockLedger::default());
    let store = Arc::new(InMemoryStateStore::new());
    let engine = ReconciliationEngine::new(
        Arc::clone(&venue),
        Arc::clone(&ledger),
        Arc::clone(&store),
        config,
    );
    Harness {
        venue,
        ledger,
        store,
        engine,
    }
}

fn harness() -> Harness {
    harness_with(ReconciliationConfig::default())
}

// ============================================================================
// Fixtures
// ============================================================================

const YES: &str = "yes-tok";
const NO: &str = "no-tok";

fn mm_id() -> MarketMakerId {
    MarketMakerId::new("mm-1")
}

fn make_mm(yes: Decimal, yes_avg: Decimal) -> MarketMaker {
    let mut mm = MarketMaker::new(mm_id(), MarketId::new("0xcond"))
        .with_instruments(InstrumentId::new(YES), InstrumentId::new(NO));
    mm.overwrite_position(Outcome::Yes, yes, yes_avg);
    mm
}

fn ledger_pos(token: &str, size: Decimal, avg: Decimal) -> LedgerPosition {
    LedgerPosition {
        instrument_id: InstrumentId::new(token),
        size,
        avg_price: Some(avg),
        current_value: size * avg,
    }
}

fn tracked(id: &str, side: QuoteSide, price: Decimal, size: Decimal) -> TrackedOrder {
    TrackedOrder::new(
        OrderId::new(id),
        mm_id(),
        InstrumentId::new(YES),
        Outcome::Yes,
        side,
        price,
        size,
    )
}

/// Track an order locally and rest the same order on the venue.
fn rest(h: &Harness, order: &TrackedOrder) {
    h.store.insert_order(order.clone());
    h.venue.insert(
        order.order_id.clone(),
        order.instrument_id.clone(),
        Some(order.outcome),
        order.side,
        order.price,
        order.size,
    );
}

async fn stored_mm(h: &Harness) -> MarketMaker {
    h.store.market_maker(&mm_id()).await.unwrap().unwrap()
}

fn issues_of(result: &SyncResult, issue_type: IssueType) -> Vec<&SyncIssue> {
    result
        .issues
        .iter()
        .filter(|i| i.issue_type == issue_type)
        .collect()
}

// ============================================================================
// Clean state and idempotence
// ============================================================================

#[tokio::test]
async fn test_clean_state_raises_nothing() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set(vec![ledger_pos(YES, dec!(10), dec!(0.50))]);

    let result = h.engine.full_sync(true, false).await;

    assert!(result.issues.is_empty(), "unexpected issues: {:?}", result.issues);
    assert_eq!(result.positions_checked, 2);
    assert_eq!(result.pnl_checked, 1);
    assert_eq!(h.store.audit_log().len(), 1);
}

#[tokio::test]
async fn test_second_pass_after_correction_is_clean() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set(vec![ledger_pos(YES, dec!(12), dec!(0.55))]);

    let first = h.engine.full_sync(true, false).await;
    assert_eq!(first.positions_corrected, 1);
    assert_eq!(first.markets_corrected, 1);

    let second = h.engine.full_sync(true, false).await;
    assert!(second.issues.is_empty(), "unexpected issues: {:?}", second.issues);
    assert_eq!(second.corrections(), 0);

    let mm = stored_mm(&h).await;
    assert_eq!(mm.yes.inventory, dec!(12));
    assert_eq!(mm.yes.avg_cost, dec!(0.55));
}

#[tokio::test]
async fn test_report_only_pass_writes_only_audit() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    let order = tracked("0xo1", QuoteSide::Bid, dec!(0.50), dec!(10));
    rest(&h, &order);
    h.venue.fill(&order.order_id, dec!(4));
    h.ledger.set(vec![ledger_pos(YES, dec!(20), dec!(0.50))]);

    let result = h.engine.full_sync(false, true).await;

    assert!(!result.auto_correct);
    assert_eq!(issues_of(&result, IssueType::FillReplayed).len(), 1);
    assert_eq!(issues_of(&result, IssueType::PositionDrift).len(), 1);
    assert!(result.issues.iter().all(|i| i.action != IssueAction::Corrected));
    assert_eq!(result.corrections(), 0);

    let mm = stored_mm(&h).await;
    assert_eq!(mm.yes.inventory, dec!(10));
    assert!(h.store.all_fills().is_empty());
    let stored_order = &h.store.tracked_orders().await.unwrap()[0];
    assert_eq!(stored_order.last_matched_size, Decimal::ZERO);
    assert_eq!(h.store.audit_log().len(), 1);
}

// ============================================================================
// Gateway failures
// ============================================================================

#[tokio::test]
async fn test_exchange_down_skips_order_sync() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    let order = tracked("0xo1", QuoteSide::Bid, dec!(0.50), dec!(10));
    rest(&h, &order);
    h.venue.fill(&order.order_id, dec!(4));
    h.ledger.set(vec![ledger_pos(YES, dec!(10), dec!(0.50))]);
    h.venue.set_available(false);

    let result = h.engine.full_sync(true, false).await;

    let down = issues_of(&result, IssueType::ClobUnavailable);
    assert_eq!(down.len(), 1);
    assert_eq!(down[0].severity, IssueSeverity::Critical);
    assert_eq!(result.orders_checked, 0);
    assert_eq!(result.fills_replayed, 0);
    assert!(h.store.all_fills().is_empty());
    let orders = h.store.tracked_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].last_matched_size, Decimal::ZERO);
    assert_eq!(stored_mm(&h).await.yes.inventory, dec!(10));
    assert_eq!(result.positions_checked, 2);
    assert_eq!(h.engine.health().exchange_failures, 1);
}

#[tokio::test]
async fn test_ledger_down_skips_position_sync() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set_failing(true);

    let result = h.engine.full_sync(true, false).await;

    assert_eq!(issues_of(&result, IssueType::DataApiUnavailable).len(), 1);
    assert!(result.position_sync_skipped);
    assert_eq!(result.positions_checked, 0);
    assert_eq!(stored_mm(&h).await.yes.inventory, dec!(10));
}

#[tokio::test]
async fn test_failure_streak_reaches_threshold_and_resets() {
    let h = harness();
    h.store.insert_market_maker(make_mm(Decimal::ZERO, Decimal::ZERO));
    h.ledger.set_failing(true);

    for _ in 0..3 {
        h.engine.full_sync(true, false).await;
    }
    let health = h.engine.health();
    assert_eq!(health.ledger_failures, 3);
    assert!(health.ledger_degraded);
    assert!(!health.exchange_degraded);

    h.ledger.set_failing(false);
    h.engine.full_sync(true, false).await;
    assert_eq!(h.engine.health().ledger_failures, 0);
}

#[tokio::test]
async fn test_empty_ledger_with_inventory_is_distrusted() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(40), dec!(0.50)));
    h.ledger.set(vec![]);

    let result = h.engine.full_sync(true, false).await;

    assert_eq!(result.count_severity(IssueSeverity::Critical), 1);
    let drift = issues_of(&result, IssueType::PositionDrift);
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].action, IssueAction::RequiresManual);
    assert!(result.position_sync_skipped);
    assert_eq!(result.positions_corrected, 0);
    assert_eq!(stored_mm(&h).await.yes.inventory, dec!(40));
    assert_eq!(h.store.audit_log().len(), 1);
}

#[tokio::test]
async fn test_empty_ledger_below_guard_flattens() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(0.5), dec!(0.50)));
    h.ledger.set(vec![]);

    let result = h.engine.full_sync(true, false).await;

    assert!(!result.position_sync_skipped);
    assert_eq!(result.positions_corrected, 1);
    assert!(stored_mm(&h).await.yes.is_flat());
}

#[tokio::test]
async fn test_store_failure_is_critical() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set(vec![ledger_pos(YES, dec!(15), dec!(0.50))]);
    h.store.set_fail_commits(true);

    let result = h.engine.full_sync(true, false).await;

    let store = issues_of(&result, IssueType::StoreError);
    assert_eq!(store.len(), 1);
    assert_eq!(store[0].severity, IssueSeverity::Critical);
    assert_eq!(store[0].market_maker_id, Some(mm_id()));
    assert_eq!(stored_mm(&h).await.yes.inventory, dec!(10));
}

// ============================================================================
// Order sync
// ============================================================================

#[tokio::test]
async fn test_terminal_order_replays_buy_into_weighted_average() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.40)));
    let order = tracked("0xo1", QuoteSide::Bid, dec!(0.60), dec!(10));
    rest(&h, &order);
    h.venue.fill(&order.order_id, dec!(10));
    h.ledger.set(vec![ledger_pos(YES, dec!(20), dec!(0.50))]);

    let result = h.engine.full_sync(true, false).await;

    assert_eq!(result.fills_replayed, 1);
    assert_eq!(result.orders_removed, 1);
    assert_eq!(result.positions_corrected, 0);
    let mm = stored_mm(&h).await;
    assert_eq!(mm.yes.inventory, dec!(20));
    assert_eq!(mm.yes.avg_cost, dec!(0.50));
    assert!(h.store.tracked_orders().await.unwrap().is_empty());

    let fills = h.store.all_fills();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].side, TradeSide::Buy);
    assert_eq!(fills[0].source, FillSource::OrderSync);
    assert_eq!(fills[0].realized_pnl, None);
}

#[tokio::test]
async fn test_terminal_sell_realizes_pnl() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(20), dec!(0.50)));
    let order = tracked("0xo2", QuoteSide::Ask, dec!(0.70), dec!(5));
    rest(&h, &order);
    h.venue.fill(&order.order_id, dec!(5));
    h.ledger.set(vec![ledger_pos(YES, dec!(15), dec!(0.50))]);

    let result = h.engine.full_sync(true, false).await;

    assert!(result.issues.iter().all(|i| i.issue_type != IssueType::PnlMismatch));
    let mm = stored_mm(&h).await;
    assert_eq!(mm.realized_pnl, dec!(1.00));
    assert_eq!(mm.yes.inventory, dec!(15));
    assert_eq!(h.store.all_fills()[0].realized_pnl, Some(dec!(1.00)));
}

#[tokio::test]
async fn test_partial_fill_on_open_order_advances_watermark() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.40)));
    let order = tracked("0xo1", QuoteSide::Bid, dec!(0.60), dec!(10));
    rest(&h, &order);
    h.venue.fill(&order.order_id, dec!(4));
    h.ledger.set(vec![ledger_pos(YES, dec!(14), dec!(0.4571))]);

    let first = h.engine.full_sync(true, false).await;
    assert_eq!(first.fills_replayed, 1);
    let stored = &h.store.tracked_orders().await.unwrap()[0];
    assert_eq!(stored.last_matched_size, dec!(4));
    assert_eq!(stored_mm(&h).await.yes.inventory, dec!(14));

    let second = h.engine.full_sync(true, false).await;
    assert_eq!(second.fills_replayed, 0);
    assert_eq!(h.store.all_fills().len(), 1);
}

#[tokio::test]
async fn test_price_mismatch_is_corrected() {
    let h = harness();
    h.store.insert_market_maker(make_mm(Decimal::ZERO, Decimal::ZERO));
    let order = tracked("0xo1", QuoteSide::Bid, dec!(0.50), dec!(10));
    rest(&h, &order);
    h.venue.reprice(&order.order_id, dec!(0.52));

    let result = h.engine.full_sync(true, false).await;

    let mismatch = issues_of(&result, IssueType::OrderMismatch);
    assert_eq!(mismatch.len(), 1);
    assert_eq!(mismatch[0].action, IssueAction::Corrected);
    assert_eq!(result.orders_corrected, 1);
    assert_eq!(h.store.tracked_orders().await.unwrap()[0].price, dec!(0.52));
}

#[tokio::test]
async fn test_price_within_tolerance_is_ignored() {
    let h = harness();
    h.store.insert_market_maker(make_mm(Decimal::ZERO, Decimal::ZERO));
    let order = tracked("0xo1", QuoteSide::Bid, dec!(0.500), dec!(10));
    rest(&h, &order);
    h.venue.reprice(&order.order_id, dec!(0.5005));

    let result = h.engine.full_sync(true, false).await;

    assert!(issues_of(&result, IssueType::OrderMismatch).is_empty());
    assert_eq!(result.orders_checked, 1);
}

#[tokio::test]
async fn test_order_unknown_to_exchange_is_removed() {
    let h = harness();
    h.store.insert_market_maker(make_mm(Decimal::ZERO, Decimal::ZERO));
    h.store
        .insert_order(tracked("0xgone", QuoteSide::Bid, dec!(0.50), dec!(10)));

    let result = h.engine.full_sync(true, false).await;

    let missing = issues_of(&result, IssueType::OrderInDbNotClob);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].severity, IssueSeverity::Warn);
    assert_eq!(result.orders_removed, 1);
    assert!(h.store.tracked_orders().await.unwrap().is_empty());
    assert!(h.store.all_fills().is_empty());
}

#[tokio::test]
async fn test_lookup_error_keeps_order() {
    let h = harness();
    h.store.insert_market_maker(make_mm(Decimal::ZERO, Decimal::ZERO));
    h.store
        .insert_order(tracked("0xreal", QuoteSide::Bid, dec!(0.50), dec!(10)));
    h.venue.set_lookups_fail(true);

    let result = h.engine.full_sync(true, false).await;

    let unknown = issues_of(&result, IssueType::OrderStatusUnknown);
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].severity, IssueSeverity::Error);
    assert_eq!(unknown[0].action, IssueAction::RequiresManual);
    assert_eq!(h.store.tracked_orders().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_simulated_order_skips_lookup() {
    let h = harness();
    h.store.insert_market_maker(make_mm(Decimal::ZERO, Decimal::ZERO));
    h.store
        .insert_order(tracked("dry-run-7", QuoteSide::Ask, dec!(0.55), dec!(5)));
    h.venue.set_lookups_fail(true);

    let result = h.engine.full_sync(true, false).await;

    assert!(issues_of(&result, IssueType::OrderStatusUnknown).is_empty());
    assert_eq!(issues_of(&result, IssueType::OrderInDbNotClob).len(), 1);
    assert!(h.store.tracked_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_untracked_exchange_order_is_reported() {
    let h = harness();
    h.store.insert_market_maker(make_mm(Decimal::ZERO, Decimal::ZERO));
    h.venue.insert(
        OrderId::new("0xorphan"),
        InstrumentId::new(NO),
        Some(Outcome::No),
        QuoteSide::Ask,
        dec!(0.45),
        dec!(3),
    );
    h.venue.insert(
        OrderId::new("0xforeign"),
        InstrumentId::new("other-tok"),
        None,
        QuoteSide::Bid,
        dec!(0.10),
        dec!(3),
    );

    let result = h.engine.full_sync(true, false).await;

    assert_eq!(result.orphan_orders, 1);
    let orphans = issues_of(&result, IssueType::OrderInClobNotDb);
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].order_id, Some(OrderId::new("0xorphan")));
}

// ============================================================================
// Position sync
// ============================================================================

#[test_case(dec!(10.05), false ; "drift below threshold")]
#[test_case(dec!(10.15), true ; "drift above threshold")]
#[tokio::test]
async fn test_size_drift_threshold(ledger_size: Decimal, corrected: bool) {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set(vec![ledger_pos(YES, ledger_size, dec!(0.50))]);

    let result = h.engine.full_sync(true, false).await;

    let drift = issues_of(&result, IssueType::PositionDrift);
    let expected_inventory = if corrected { ledger_size } else { dec!(10) };
    assert_eq!(stored_mm(&h).await.yes.inventory, expected_inventory);
    if corrected {
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].severity, IssueSeverity::Error);
        assert_eq!(drift[0].action, IssueAction::Corrected);
    } else {
        assert!(drift.is_empty());
    }
}

#[tokio::test]
async fn test_avg_cost_drift_alone_is_warning() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set(vec![ledger_pos(YES, dec!(10), dec!(0.52))]);

    let result = h.engine.full_sync(true, false).await;

    let drift = issues_of(&result, IssueType::PositionDrift);
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].severity, IssueSeverity::Warn);
    assert_eq!(stored_mm(&h).await.yes.avg_cost, dec!(0.52));
}

fn ledger_pos_without_avg(token: &str, size: Decimal) -> LedgerPosition {
    LedgerPosition {
        avg_price: None,
        ..ledger_pos(token, size, Decimal::ZERO)
    }
}

#[tokio::test]
async fn test_unknown_ledger_avg_is_not_drift() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set(vec![ledger_pos_without_avg(YES, dec!(10))]);

    let result = h.engine.full_sync(true, false).await;

    assert!(result.issues.is_empty(), "unexpected issues: {:?}", result.issues);
    assert_eq!(stored_mm(&h).await.yes.avg_cost, dec!(0.50));
}

#[tokio::test]
async fn test_size_overwrite_with_unknown_avg_keeps_cost_basis() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set(vec![ledger_pos_without_avg(YES, dec!(12))]);

    let result = h.engine.full_sync(true, false).await;

    assert_eq!(result.positions_corrected, 1);
    let mm = stored_mm(&h).await;
    assert_eq!(mm.yes.inventory, dec!(12));
    assert_eq!(mm.yes.avg_cost, dec!(0.50));
}

#[tokio::test]
async fn test_reset_with_unknown_avg_keeps_cost_basis() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set(vec![ledger_pos_without_avg(YES, dec!(8))]);

    h.engine.reset_to_ledger().await.unwrap();

    let mm = stored_mm(&h).await;
    assert_eq!(mm.yes.inventory, dec!(8));
    assert_eq!(mm.yes.avg_cost, dec!(0.50));
}

#[tokio::test]
async fn test_overwrite_writes_audit_and_keeps_realized_pnl() {
    let h = harness();
    let mut mm = make_mm(dec!(10), dec!(0.50));
    mm.realized_pnl = dec!(2.50);
    h.store.insert_market_maker(mm);
    h.store.insert_fill(Fill::new(
        mm_id(),
        OrderId::new("0xold"),
        Outcome::Yes,
        TradeSide::Sell,
        dec!(0.75),
        dec!(10),
        Some(dec!(2.50)),
        FillSource::OrderSync,
    ));
    h.ledger.set(vec![ledger_pos(YES, dec!(6), dec!(0.48))]);

    h.engine.full_sync(true, false).await;

    let mm = stored_mm(&h).await;
    assert_eq!(mm.realized_pnl, dec!(2.50));
    assert_eq!(mm.yes.inventory, dec!(6));
    let overwrites: Vec<_> = h
        .store
        .audit_log()
        .into_iter()
        .filter(|e| e.category == AuditCategory::PositionOverwrite)
        .collect();
    assert_eq!(overwrites.len(), 1);
    assert_eq!(overwrites[0].details["previous_inventory"], "10");
}

#[tokio::test]
async fn test_alert_only_policy_never_overwrites() {
    let h = harness_with(ReconciliationConfig {
        position_policy: PositionSyncPolicy::AlertOnly,
        ..ReconciliationConfig::default()
    });
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set(vec![ledger_pos(YES, dec!(12), dec!(0.50))]);

    let result = h.engine.full_sync(true, false).await;

    let drift = issues_of(&result, IssueType::PositionDrift);
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].action, IssueAction::RequiresManual);
    assert_eq!(result.positions_corrected, 0);
    assert_eq!(stored_mm(&h).await.yes.inventory, dec!(10));
}

#[tokio::test]
async fn test_unmapped_ledger_position_is_reported() {
    let h = harness();
    h.store.insert_market_maker(make_mm(Decimal::ZERO, Decimal::ZERO));
    h.ledger.set(vec![
        ledger_pos("stray-tok", dec!(25), dec!(0.30)),
        ledger_pos("dust-tok", dec!(0.5), dec!(0.30)),
    ]);

    let result = h.engine.full_sync(true, false).await;

    let missing = issues_of(&result, IssueType::PositionMissing);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].instrument_id, Some(InstrumentId::new("stray-tok")));
}

// ============================================================================
// Staged fills
// ============================================================================

fn staged_config() -> ReconciliationConfig {
    ReconciliationConfig {
        stage_fills: true,
        ..ReconciliationConfig::default()
    }
}

#[tokio::test]
async fn test_staged_fill_confirmed_when_ledger_catches_up() {
    let h = harness_with(staged_config());
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.40)));
    let order = tracked("0xo3", QuoteSide::Bid, dec!(0.60), dec!(10));
    rest(&h, &order);
    h.venue.fill(&order.order_id, dec!(5));
    h.ledger.set(vec![ledger_pos(YES, dec!(10), dec!(0.40))]);

    let first = h.engine.full_sync(true, false).await;
    assert_eq!(first.fills_staged, 1);
    assert_eq!(first.fills_replayed, 0);
    assert!(issues_of(&first, IssueType::PositionDrift).is_empty());
    assert_eq!(stored_mm(&h).await.yes.inventory, dec!(10));
    assert_eq!(h.store.all_pending_fills().len(), 1);

    h.ledger.set(vec![ledger_pos(YES, dec!(15), dec!(0.4667))]);
    let second = h.engine.full_sync(true, false).await;

    assert_eq!(second.pending_confirmed, 1);
    assert_eq!(issues_of(&second, IssueType::PendingFillConfirmed).len(), 1);
    assert!(issues_of(&second, IssueType::PositionDrift).is_empty());
    assert_eq!(stored_mm(&h).await.yes.inventory, dec!(15));
    assert_eq!(
        h.store.all_pending_fills()[0].status,
        PendingFillStatus::Confirmed
    );
    let fills = h.store.all_fills();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].source, FillSource::PendingConfirmed);
}

#[tokio::test]
async fn test_stale_staged_fill_expires() {
    let h = harness_with(staged_config());
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.40)));
    let mut event = PendingFillEvent::new(
        mm_id(),
        OrderId::new("0xo4"),
        Outcome::Yes,
        TradeSide::Buy,
        dec!(0.60),
        dec!(5),
    );
    event.created_at = Utc::now() - Duration::hours(1);
    h.store
        .commit(ChangeSet {
            pending_fills: vec![event],
            ..ChangeSet::default()
        })
        .await
        .unwrap();
    h.ledger.set(vec![ledger_pos(YES, dec!(15), dec!(0.4667))]);

    let result = h.engine.full_sync(true, false).await;

    assert_eq!(result.pending_expired, 1);
    assert_eq!(result.pending_confirmed, 0);
    assert_eq!(
        h.store.all_pending_fills()[0].status,
        PendingFillStatus::Expired
    );
    // Unexplained drift falls through to the overwrite.
    assert_eq!(result.positions_corrected, 1);
    assert!(h.store.all_fills().is_empty());
}

#[tokio::test]
async fn test_staged_fill_in_wrong_direction_is_not_confirmed() {
    let h = harness_with(staged_config());
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.40)));
    let event = PendingFillEvent::new(
        mm_id(),
        OrderId::new("0xo5"),
        Outcome::Yes,
        TradeSide::Sell,
        dec!(0.60),
        dec!(5),
    );
    h.store
        .commit(ChangeSet {
            pending_fills: vec![event],
            ..ChangeSet::default()
        })
        .await
        .unwrap();
    h.ledger.set(vec![ledger_pos(YES, dec!(15), dec!(0.40))]);

    let result = h.engine.full_sync(true, false).await;

    assert_eq!(result.pending_confirmed, 0);
    assert!(h.store.all_pending_fills()[0].is_pending());
}

// ============================================================================
// P&L verification
// ============================================================================

#[test_case(dec!(0.50), IssueSeverity::Warn ; "small mismatch warns")]
#[test_case(dec!(2.00), IssueSeverity::Error ; "large mismatch errors")]
#[tokio::test]
async fn test_pnl_mismatch_severity(stored: Decimal, severity: IssueSeverity) {
    let h = harness();
    let mut mm = make_mm(Decimal::ZERO, Decimal::ZERO);
    mm.realized_pnl = stored;
    h.store.insert_market_maker(mm);

    let result = h.engine.full_sync(true, false).await;

    let mismatch = issues_of(&result, IssueType::PnlMismatch);
    assert_eq!(mismatch.len(), 1);
    assert_eq!(mismatch[0].severity, severity);
    assert_eq!(mismatch[0].action, IssueAction::Logged);
    assert_eq!(result.pnl_discrepancy_total, stored);
    assert_eq!(stored_mm(&h).await.realized_pnl, stored);
}

#[tokio::test]
async fn test_pnl_within_tolerance_is_clean() {
    let h = harness();
    let mut mm = make_mm(Decimal::ZERO, Decimal::ZERO);
    mm.realized_pnl = dec!(1.005);
    h.store.insert_market_maker(mm);
    h.store.insert_fill(Fill::new(
        mm_id(),
        OrderId::new("0xold"),
        Outcome::No,
        TradeSide::Sell,
        dec!(0.60),
        dec!(10),
        Some(dec!(1.00)),
        FillSource::OrderSync,
    ));

    let result = h.engine.full_sync(true, false).await;

    assert!(issues_of(&result, IssueType::PnlMismatch).is_empty());
}

// ============================================================================
// Quick sync
// ============================================================================

#[tokio::test]
async fn test_quick_sync_matches_within_tolerance() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    rest(&h, &tracked("0xo1", QuoteSide::Bid, dec!(0.45), dec!(5)));
    h.ledger.set(vec![ledger_pos(YES, dec!(10.5), dec!(0.50))]);

    let result = h.engine.quick_sync().await;

    assert!(result.orders_match);
    assert!(result.positions_match);
    assert_eq!(result.issue_count, 0);
    assert_eq!(h.store.audit_log().len(), 0);
}

#[tokio::test]
async fn test_quick_sync_reports_outage_as_mismatch() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.venue.set_available(false);
    h.ledger.set(vec![ledger_pos(YES, dec!(13), dec!(0.50))]);

    let result = h.engine.quick_sync().await;

    assert_eq!(result.exchange_orders, None);
    assert!(!result.orders_match);
    assert!(!result.positions_match);
    assert_eq!(result.issue_count, 2);
    assert_eq!(h.engine.health().exchange_failures, 1);
}

// ============================================================================
// Escape hatches
// ============================================================================

#[tokio::test]
async fn test_cancel_orphans_only_touches_untracked_in_scope_orders() {
    let h = harness();
    h.store.insert_market_maker(make_mm(Decimal::ZERO, Decimal::ZERO));
    rest(&h, &tracked("0xmine", QuoteSide::Bid, dec!(0.45), dec!(5)));
    h.venue.insert(
        OrderId::new("0xorphan"),
        InstrumentId::new(YES),
        Some(Outcome::Yes),
        QuoteSide::Ask,
        dec!(0.55),
        dec!(5),
    );
    h.venue.insert(
        OrderId::new("0xforeign"),
        InstrumentId::new("other-tok"),
        None,
        QuoteSide::Bid,
        dec!(0.10),
        dec!(3),
    );

    let result = h.engine.cancel_orphan_orders().await.unwrap();

    assert_eq!(result.cancelled, 1);
    assert_eq!(result.failed, 0);
    let open: Vec<_> = h
        .venue
        .fetch_open_orders()
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(open, vec![OrderId::new("0xforeign"), OrderId::new("0xmine")]);
    assert_eq!(h.store.audit_log()[0].category, AuditCategory::Operator);
}

#[tokio::test]
async fn test_cancel_orphans_fails_when_exchange_down() {
    let h = harness();
    h.venue.set_available(false);

    let err = h.engine.cancel_orphan_orders().await.unwrap_err();

    assert!(matches!(err, ReconciliationError::ExchangeUnavailable(_)));
    assert!(h.store.audit_log().is_empty());
}

#[tokio::test]
async fn test_cancel_orphans_waits_for_quoting_lock() {
    let h = harness();
    h.store.insert_market_maker(make_mm(Decimal::ZERO, Decimal::ZERO));

    // Quoting loop holds the lock and has rested an order it has not tracked yet.
    let locks = h.engine.locks();
    let guard = locks.lock(&mm_id()).await;
    let placing = tracked("0xjustplaced", QuoteSide::Bid, dec!(0.44), dec!(5));
    h.venue.insert(
        placing.order_id.clone(),
        placing.instrument_id.clone(),
        Some(placing.outcome),
        placing.side,
        placing.price,
        placing.size,
    );

    let engine = Arc::new(h.engine);
    let task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.cancel_orphan_orders().await })
    };

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!task.is_finished());
    assert_eq!(h.venue.fetch_open_orders().await.unwrap().len(), 1);

    h.store.insert_order(placing);
    drop(guard);

    let result = task.await.unwrap().unwrap();
    assert_eq!(result.cancelled, 0);
    assert_eq!(result.failed, 0);
    let open = h.venue.fetch_open_orders().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, OrderId::new("0xjustplaced"));
}

#[tokio::test]
async fn test_remove_market_maker_drops_state_and_lock_entry() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.store
        .insert_order(tracked("0xo1", QuoteSide::Bid, dec!(0.45), dec!(5)));
    h.ledger.set(vec![ledger_pos(YES, dec!(10), dec!(0.50))]);
    h.engine.full_sync(true, false).await;
    assert_eq!(h.engine.locks().len(), 1);

    assert!(h.engine.remove_market_maker(&mm_id()).await.unwrap());

    assert!(h.engine.locks().is_empty());
    assert!(h.store.market_maker(&mm_id()).await.unwrap().is_none());
    assert!(h.store.tracked_orders().await.unwrap().is_empty());
    let last = h.store.audit_log().pop().unwrap();
    assert_eq!(last.category, AuditCategory::Operator);

    assert!(!h.engine.remove_market_maker(&mm_id()).await.unwrap());
    assert!(h.engine.locks().is_empty());
}

#[tokio::test]
async fn test_reset_to_ledger_keeps_realized_pnl() {
    let h = harness();
    let mut mm = make_mm(dec!(10), dec!(0.50));
    mm.overwrite_position(Outcome::No, dec!(4), dec!(0.30));
    mm.realized_pnl = dec!(7.5);
    h.store.insert_market_maker(mm);
    h.store
        .insert_order(tracked("0xo1", QuoteSide::Bid, dec!(0.45), dec!(5)));
    h.store
        .commit(ChangeSet {
            pending_fills: vec![PendingFillEvent::new(
                mm_id(),
                OrderId::new("0xo1"),
                Outcome::Yes,
                TradeSide::Buy,
                dec!(0.45),
                dec!(2),
            )],
            ..ChangeSet::default()
        })
        .await
        .unwrap();
    h.ledger.set(vec![ledger_pos(YES, dec!(3), dec!(0.40))]);

    let result = h.engine.reset_to_ledger().await.unwrap();

    assert_eq!(result.markets_reset, 1);
    assert_eq!(result.orders_cleared, 1);
    assert_eq!(result.pending_discarded, 1);

    let mm = stored_mm(&h).await;
    assert_eq!(mm.yes.inventory, dec!(3));
    assert_eq!(mm.yes.avg_cost, dec!(0.40));
    assert!(mm.no.is_flat());
    assert_eq!(mm.realized_pnl, dec!(7.5));
    assert!(h.store.tracked_orders().await.unwrap().is_empty());
    assert_eq!(
        h.store.all_pending_fills()[0].status,
        PendingFillStatus::Discarded
    );
}

#[tokio::test]
async fn test_reset_fails_when_ledger_down() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set_failing(true);

    let err = h.engine.reset_to_ledger().await.unwrap_err();

    assert!(matches!(err, ReconciliationError::LedgerUnavailable(_)));
    assert_eq!(stored_mm(&h).await.yes.inventory, dec!(10));
    assert_eq!(h.ledger.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_full_sync_waits_for_market_maker_lock() {
    let h = harness();
    h.store.insert_market_maker(make_mm(dec!(10), dec!(0.50)));
    h.ledger.set(vec![ledger_pos(YES, dec!(12), dec!(0.50))]);

    let locks = h.engine.locks();
    let guard = locks.lock(&mm_id()).await;
    let engine = Arc::new(h.engine);
    let task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.full_sync(true, false).await })
    };

    tokio::task::yield_now().await;
    assert_eq!(stored_mm_of(&h.store).await.yes.inventory, dec!(10));

    drop(guard);
    let result = task.await.unwrap();
    assert_eq!(result.positions_corrected, 1);
    assert_eq!(stored_mm_of(&h.store).await.yes.inventory, dec!(12));
}

async fn stored_mm_of(store: &InMemoryStateStore) -> MarketMaker {
    store.market_maker(&mm_id()).await.unwrap().unwrap()
}
