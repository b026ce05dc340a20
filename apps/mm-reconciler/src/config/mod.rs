//! Configuration for the reconciler.
//!
//! YAML loading with `${VAR}` and `${VAR:-default}` environment interpolation,
//! followed by validation. Each section converts into the configuration type
//! of the component it drives.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mm_reconciler::config::load_config;
//!
//! let config = load_config(Some("config/config.yaml"))?;
//! let engine_config = config.engine_config();
//! ```

mod environment;
mod ledger;
mod markets;
mod observability;
mod reconciliation;

use std::collections::HashSet;
use std::net::SocketAddr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use environment::EnvironmentConfig;
pub use ledger::LedgerConfig;
pub use markets::MarketConfig;
pub use observability::{LoggingConfig, MetricsSettings, ObservabilityConfig};
pub use reconciliation::{ReconciliationConfig, ThresholdsConfig};

use crate::application::reconciliation as engine;

/// Environment variable consulted for the ledger wallet in LIVE mode.
pub const WALLET_ENV_VAR: &str = "POLYMARKET_WALLET";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),

    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Execution mode.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Reconciliation schedule, policy and tolerances.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Settlement ledger access.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Markets under management.
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Engine configuration assembled from the reconciliation and ledger sections.
    #[must_use]
    pub fn engine_config(&self) -> engine::ReconciliationConfig {
        self.reconciliation
            .to_reconciliation_config(self.ledger.min_size, self.ledger.limit)
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string.
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax. Unset variables
/// without a default become empty.
#[allow(clippy::expect_used)] // Regex is a compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match cap.get(1).map(|m| std::env::var(m.as_str())) {
            Some(Ok(v)) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let valid_modes = ["DRY_RUN", "LIVE"];
    if !valid_modes.contains(&config.environment.mode.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "environment.mode must be one of: {valid_modes:?}"
        )));
    }

    let rec = &config.reconciliation;
    if rec.full_sync_interval_secs == 0 || rec.quick_sync_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation sync intervals must be positive".to_string(),
        ));
    }
    if rec.max_concurrent_markets == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.max_concurrent_markets must be at least 1".to_string(),
        ));
    }
    if rec.failure_alert_threshold == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.failure_alert_threshold must be at least 1".to_string(),
        ));
    }

    let t = &rec.thresholds;
    let thresholds = [
        ("price", t.price),
        ("size_drift", t.size_drift),
        ("avg_cost_drift", t.avg_cost_drift),
        ("empty_ledger_guard", t.empty_ledger_guard),
        ("pnl", t.pnl),
        ("pnl_error", t.pnl_error),
        ("quick_sync_inventory", t.quick_sync_inventory),
        ("material_position", t.material_position),
    ];
    if let Some((name, _)) = thresholds.iter().find(|(_, v)| v.is_sign_negative()) {
        return Err(ConfigError::ValidationError(format!(
            "reconciliation.thresholds.{name} must not be negative"
        )));
    }
    if t.pnl_error < t.pnl {
        return Err(ConfigError::ValidationError(
            "reconciliation.thresholds.pnl_error must be at least thresholds.pnl".to_string(),
        ));
    }

    if config.ledger.limit == 0 || config.ledger.max_pages == 0 {
        return Err(ConfigError::ValidationError(
            "ledger.limit and ledger.max_pages must be positive".to_string(),
        ));
    }
    if config.ledger.min_size < Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "ledger.min_size must not be negative".to_string(),
        ));
    }
    if !config.environment.is_dry_run() && config.ledger.wallet.trim().is_empty() {
        return Err(ConfigError::MissingEnvVar(WALLET_ENV_VAR.to_string()));
    }

    let mut ids = HashSet::new();
    for market in &config.markets {
        if !ids.insert(market.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate market id '{}'",
                market.id
            )));
        }
        if market.yes_token.is_some() && market.yes_token == market.no_token {
            return Err(ConfigError::ValidationError(format!(
                "market '{}' uses the same token for YES and NO",
                market.id
            )));
        }
    }

    let valid_formats = ["json", "pretty"];
    if !valid_formats.contains(&config.observability.logging.format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: {valid_formats:?}"
        )));
    }
    let metrics = &config.observability.metrics;
    if metrics.enabled && metrics.listen_addr.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::ValidationError(format!(
            "observability.metrics.listen_addr '{}' is not a socket address",
            metrics.listen_addr
        )));
    }

    Ok(())
}
