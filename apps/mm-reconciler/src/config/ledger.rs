//! Settlement ledger configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::infrastructure::ledger::{DEFAULT_DATA_API_URL, DataApiConfig, RetryConfig};

/// Settlement ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Positions API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Wallet address whose positions are reconciled.
    #[serde(default)]
    pub wallet: String,
    /// Dust filter passed to the API.
    #[serde(default = "default_min_size")]
    pub min_size: Decimal,
    /// Page size.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Maximum pages per query.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial retry backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            wallet: String::new(),
            min_size: default_min_size(),
            limit: default_limit(),
            max_pages: default_max_pages(),
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl LedgerConfig {
    /// Convert to the HTTP adapter configuration.
    #[must_use]
    pub fn to_data_api_config(&self) -> DataApiConfig {
        let retry = RetryConfig {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            ..RetryConfig::default()
        };
        let mut config = DataApiConfig::new(self.wallet.clone())
            .with_base_url(self.base_url.clone())
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_retry(retry);
        config.max_pages = self.max_pages;
        config
    }
}

fn default_base_url() -> String {
    DEFAULT_DATA_API_URL.to_string()
}

const fn default_min_size() -> Decimal {
    Decimal::from_parts(1, 0, 0, false, 2)
}

const fn default_limit() -> u32 {
    500
}

const fn default_max_pages() -> u32 {
    20
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_data_api_config() {
        let config = LedgerConfig {
            wallet: "0xabc".to_string(),
            base_url: "http://localhost:9000/".to_string(),
            timeout_ms: 2500,
            ..LedgerConfig::default()
        };
        let api = config.to_data_api_config();

        assert_eq!(api.base_url, "http://localhost:9000");
        assert_eq!(api.wallet, "0xabc");
        assert_eq!(api.timeout, Duration::from_millis(2500));
        assert_eq!(api.retry.max_attempts, 3);
        assert_eq!(api.max_pages, 20);
    }
}
