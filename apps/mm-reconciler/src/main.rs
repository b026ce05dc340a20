//! Market Maker Reconciler Binary
//!
//! Loads configuration, seeds the configured market makers and runs the
//! reconciliation scheduler until shut down.
//!
//! # Usage
//!
//! ```bash
//! mm-reconciler [--config <path>] [--reset-to-ledger | --cancel-orphans]
//! ```
//!
//! `--reset-to-ledger` and `--cancel-orphans` run one operator action and exit.
//!
//! # Environment Variables
//!
//! - `MM_RECONCILER_CONFIG`: config path (default: `config/config.yaml`)
//! - `POLYMARKET_WALLET`: ledger wallet, interpolated by the example config
//! - `RUST_LOG`: overrides the configured log level

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use mm_reconciler::application::reconciliation::ReconciliationEngine;
use mm_reconciler::application::services::{ReconciliationScheduler, SchedulerConfig};
use mm_reconciler::config::{Config, load_config};
use mm_reconciler::infrastructure::exchange::{PAPER_ORDER_PREFIX, PaperExchangeGateway};
use mm_reconciler::infrastructure::ledger::DataApiLedgerGateway;
use mm_reconciler::infrastructure::persistence::InMemoryStateStore;
use mm_reconciler::observability::init_metrics;
use mm_reconciler::telemetry::init_telemetry;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Time allowed for in-flight passes to finish after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default configuration path.
const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

type Engine = ReconciliationEngine<PaperExchangeGateway, DataApiLedgerGateway, InMemoryStateStore>;

/// What this invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Serve,
    ResetToLedger,
    CancelOrphans,
}

#[derive(Debug)]
struct CliArgs {
    config_path: String,
    mode: Mode,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut config_path = std::env::var("MM_RECONCILER_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut mode = Mode::Serve;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let next_mode = match arg.as_str() {
                "--config" => {
                    config_path = args.next().context("--config requires a path")?;
                    continue;
                }
                "--reset-to-ledger" => Mode::ResetToLedger,
                "--cancel-orphans" => Mode::CancelOrphans,
                other => bail!("unknown argument: {other}"),
            };
            if mode != Mode::Serve {
                bail!("--reset-to-ledger and --cancel-orphans are mutually exclusive");
            }
            mode = next_mode;
        }

        Ok(Self { config_path, mode })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let args = CliArgs::parse(std::env::args().skip(1))?;
    let config = load_config(Some(&args.config_path))
        .with_context(|| format!("loading {}", args.config_path))?;

    let _telemetry = init_telemetry(&config.observability.logging);

    if let Some(metrics) = config.observability.metrics.to_metrics_config() {
        init_metrics(&metrics).context("starting metrics exporter")?;
        tracing::info!(addr = %metrics.listen_addr, "Metrics exporter listening");
    }

    let engine = Arc::new(build_engine(&config)?);

    tracing::info!(
        mode = %config.environment.mode,
        markets = config.markets.len(),
        policy = ?engine.config().position_policy,
        stage_fills = engine.config().stage_fills,
        "Starting market maker reconciler"
    );

    match args.mode {
        Mode::Serve => serve(engine).await,
        Mode::ResetToLedger => {
            let result = engine.reset_to_ledger().await?;
            tracing::info!(
                markets_reset = result.markets_reset,
                orders_cleared = result.orders_cleared,
                pending_discarded = result.pending_discarded,
                "Reset to ledger complete"
            );
        }
        Mode::CancelOrphans => {
            let result = engine.cancel_orphan_orders().await?;
            tracing::info!(
                cancelled = result.cancelled,
                failed = result.failed,
                "Orphan cancel complete"
            );
        }
    }

    Ok(())
}

/// Wire adapters and seed the store from the configured markets.
fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let engine_config = config.engine_config();

    let simulated = &engine_config.simulated_order_prefix;
    if !simulated.is_empty() && PAPER_ORDER_PREFIX.starts_with(simulated.as_str()) {
        bail!(
            "simulated_order_prefix {simulated:?} would hide paper venue orders ({PAPER_ORDER_PREFIX}*) from detail lookups"
        );
    }

    if !config.environment.is_dry_run() {
        tracing::warn!("No live exchange adapter is linked; orders are read from the paper venue");
    }
    let exchange = Arc::new(PaperExchangeGateway::new(PAPER_ORDER_PREFIX));

    let ledger = DataApiLedgerGateway::new(&config.ledger.to_data_api_config())
        .context("building ledger client")?;

    let store = InMemoryStateStore::new();
    for market in &config.markets {
        store.insert_market_maker(market.to_market_maker());
    }

    Ok(ReconciliationEngine::new(
        exchange,
        Arc::new(ledger),
        Arc::new(store),
        engine_config,
    ))
}

/// Run the scheduler until SIGINT or SIGTERM.
async fn serve(engine: Arc<Engine>) {
    let shutdown = CancellationToken::new();
    let scheduler = ReconciliationScheduler::new(
        engine.clone(),
        SchedulerConfig::from(engine.config()),
        shutdown.clone(),
    );
    let handles = scheduler.start();

    tracing::info!("Reconciler ready");
    shutdown_signal().await;
    shutdown.cancel();

    await_loops(handles).await;
    tracing::info!("Reconciler stopped");
}

async fn await_loops(handles: Vec<JoinHandle<()>>) {
    let joined = futures::future::join_all(handles);
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, joined).await.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Sync loops did not stop in time"
        );
    }
}

/// Load .env from the current directory or the nearest ancestor that has one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for SIGTERM or SIGINT.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
