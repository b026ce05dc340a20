//! Settlement ledger adapter configuration.

use std::time::Duration;

/// Default public positions API.
pub const DEFAULT_DATA_API_URL: &str = "https://data-api.polymarket.com";

/// Configuration for the HTTP ledger adapter.
#[derive(Debug, Clone)]
pub struct DataApiConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,
    /// Wallet whose positions are queried when the query names none.
    pub wallet: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Pages fetched at most per query.
    pub max_pages: u32,
    /// Retry policy configuration.
    pub retry: RetryConfig,
}

impl DataApiConfig {
    /// Create a configuration for a wallet against the default API.
    #[must_use]
    pub fn new(wallet: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_DATA_API_URL.to_string(),
            wallet: wallet.into(),
            timeout: Duration::from_secs(10),
            max_pages: 20,
            retry: RetryConfig::default(),
        }
    }

    /// Point at another base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry configuration.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Upper bound of random jitter added to each delay.
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: Duration::from_millis(50),
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}
