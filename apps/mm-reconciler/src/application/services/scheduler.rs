//! Reconciliation Scheduler Service
//!
//! Runs full sync on a coarse interval and quick sync on a fine interval
//! until shut down. Escape hatches are never scheduled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ExchangeGateway, LedgerGateway, StateStore};
use crate::application::reconciliation::{ReconciliationConfig, ReconciliationEngine};

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between full syncs.
    pub full_interval: Duration,
    /// Interval between quick syncs.
    pub quick_interval: Duration,
    /// Apply corrections during full syncs.
    pub auto_correct: bool,
    /// Log every issue.
    pub verbose: bool,
    /// Run a full sync immediately on start.
    pub run_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            full_interval: Duration::from_secs(300),
            quick_interval: Duration::from_secs(60),
            auto_correct: true,
            verbose: false,
            run_on_startup: true,
        }
    }
}

impl From<&ReconciliationConfig> for SchedulerConfig {
    fn from(config: &ReconciliationConfig) -> Self {
        Self {
            full_interval: Duration::from_secs(config.full_sync_interval_secs.max(1)),
            quick_interval: Duration::from_secs(config.quick_sync_interval_secs.max(1)),
            auto_correct: config.auto_correct,
            verbose: config.verbose,
            run_on_startup: true,
        }
    }
}

/// Drives the reconciliation engine on a timer.
pub struct ReconciliationScheduler<E, L, S>
where
    E: ExchangeGateway,
    L: LedgerGateway,
    S: StateStore,
{
    engine: Arc<ReconciliationEngine<E, L, S>>,
    config: SchedulerConfig,
    shutdown: CancellationToken,
}

impl<E, L, S> ReconciliationScheduler<E, L, S>
where
    E: ExchangeGateway + 'static,
    L: LedgerGateway + 'static,
    S: StateStore + 'static,
{
    /// Create a scheduler.
    #[must_use]
    pub const fn new(
        engine: Arc<ReconciliationEngine<E, L, S>>,
        config: SchedulerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            config,
            shutdown,
        }
    }

    /// Spawn the full and quick sync loops.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        tracing::info!(
            full_interval_secs = self.config.full_interval.as_secs(),
            quick_interval_secs = self.config.quick_interval.as_secs(),
            auto_correct = self.config.auto_correct,
            "Starting reconciliation scheduler"
        );
        vec![self.start_full_sync(), self.start_quick_sync()]
    }

    fn start_full_sync(&self) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let shutdown = self.shutdown.clone();
        let period = self.config.full_interval;
        let first = if self.config.run_on_startup {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let auto_correct = self.config.auto_correct;
        let verbose = self.config.verbose;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let result = engine.full_sync(auto_correct, verbose).await;
                        if result.has_critical() {
                            tracing::warn!(
                                issues = result.issues.len(),
                                "Scheduled full sync raised critical issues"
                            );
                        }
                    }
                    () = shutdown.cancelled() => {
                        tracing::info!("Full sync loop shutting down");
                        break;
                    }
                }
            }
        })
    }

    fn start_quick_sync(&self) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let shutdown = self.shutdown.clone();
        let period = self.config.quick_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let result = engine.quick_sync().await;
                        tracing::debug!(
                            orders_match = result.orders_match,
                            positions_match = result.positions_match,
                            "Quick sync tick"
                        );
                    }
                    () = shutdown.cancelled() => {
                        tracing::info!("Quick sync loop shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{GatewayError, LedgerPosition, LedgerQuery};
    use crate::infrastructure::exchange::PaperExchangeGateway;
    use crate::infrastructure::persistence::InMemoryStateStore;
    use async_trait::async_trait;

    struct EmptyLedger;

    #[async_trait]
    impl LedgerGateway for EmptyLedger {
        async fn get_positions(
            &self,
            _query: &LedgerQuery,
        ) -> Result<Vec<LedgerPosition>, GatewayError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_config_from_reconciliation_config() {
        let config = SchedulerConfig::from(&ReconciliationConfig::default());
        assert_eq!(config.full_interval, Duration::from_secs(300));
        assert_eq!(config.quick_interval, Duration::from_secs(60));
        assert!(config.auto_correct);
    }

    #[tokio::test]
    async fn test_runs_full_sync_until_cancelled() {
        let store = Arc::new(InMemoryStateStore::new());
        let engine = Arc::new(ReconciliationEngine::new(
            Arc::new(PaperExchangeGateway::default()),
            Arc::new(EmptyLedger),
            Arc::clone(&store),
            ReconciliationConfig::default(),
        ));
        let shutdown = CancellationToken::new();
        let scheduler = ReconciliationScheduler::new(
            engine,
            SchedulerConfig {
                full_interval: Duration::from_millis(20),
                quick_interval: Duration::from_millis(10),
                ..SchedulerConfig::default()
            },
            shutdown.clone(),
        );

        let handles = scheduler.start();
        tokio::time::sleep(Duration::from_millis(110)).await;
        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        let runs = store.audit_log().len();
        assert!(runs >= 2, "expected repeated full syncs, got {runs}");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.audit_log().len(), runs);
    }
}
