//! HTTP ledger gateway with retry logic.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::api_types::DataApiPosition;
use super::config::{DataApiConfig, RetryConfig};
use super::error::LedgerHttpError;
use crate::application::ports::{GatewayError, LedgerGateway, LedgerPosition, LedgerQuery};

/// Settlement ledger backed by the public positions API.
#[derive(Debug, Clone)]
pub struct DataApiLedgerGateway {
    client: Client,
    base_url: String,
    wallet: String,
    timeout: Duration,
    max_pages: u32,
    retry_config: RetryConfig,
}

impl DataApiLedgerGateway {
    /// Create a new gateway from config.
    pub fn new(config: &DataApiConfig) -> Result<Self, LedgerHttpError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LedgerHttpError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            wallet: config.wallet.clone(),
            timeout: config.timeout,
            max_pages: config.max_pages.max(1),
            retry_config: config.retry.clone(),
        })
    }

    /// Fetch every page of positions for a query.
    pub async fn fetch_positions(
        &self,
        query: &LedgerQuery,
    ) -> Result<Vec<LedgerPosition>, LedgerHttpError> {
        let wallet = query.wallet.as_deref().unwrap_or(&self.wallet);
        if wallet.is_empty() {
            return Err(LedgerHttpError::MissingWallet);
        }
        let limit = query.limit.max(1);

        let mut positions = Vec::new();
        for page in 0..self.max_pages {
            let offset = page * limit;
            let batch = self.fetch_page(wallet, query, limit, offset).await?;
            let received = batch.len();
            positions.extend(batch.into_iter().map(LedgerPosition::from));
            if received < limit as usize {
                break;
            }
            if page + 1 == self.max_pages {
                warn!(
                    pages = self.max_pages,
                    positions = positions.len(),
                    "Ledger page limit reached; result may be truncated"
                );
            }
        }

        debug!(wallet, positions = positions.len(), "Fetched ledger positions");
        Ok(positions)
    }

    /// One `GET /positions` page with retry.
    async fn fetch_page(
        &self,
        wallet: &str,
        query: &LedgerQuery,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<DataApiPosition>, LedgerHttpError> {
        let url = format!("{}/positions", self.base_url);
        let params = [
            ("user", wallet.to_string()),
            ("sizeThreshold", query.min_size.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        let mut backoff = ExponentialBackoff::new(&self.retry_config);

        loop {
            let response = match self.client.get(&url).query(&params).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    let err = if e.is_timeout() {
                        LedgerHttpError::Timeout {
                            timeout_ms: self.timeout.as_millis() as u64,
                        }
                    } else {
                        LedgerHttpError::Network(e.to_string())
                    };
                    if let Some(delay) = backoff.next_backoff() {
                        warn!(
                            error = %err,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt,
                            "Ledger request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(exhausted(backoff.attempt, err));
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| LedgerHttpError::Network(e.to_string()))?;
                return serde_json::from_str(&text)
                    .map_err(|e| LedgerHttpError::JsonParse(e.to_string()));
            }

            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            let err = LedgerHttpError::Api {
                status: status.as_u16(),
                message: body,
            };

            match categorize_status(status) {
                ErrorCategory::RateLimited => {
                    let delay = backoff.next_backoff().map(|d| {
                        retry_after
                            .map(Duration::from_secs)
                            .map_or(d, |hint| hint.min(self.retry_config.max_backoff))
                    });
                    if let Some(delay) = delay {
                        warn!(delay_ms = delay.as_millis(), "Ledger rate limited, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(exhausted(backoff.attempt, err));
                }
                ErrorCategory::Retryable => {
                    if let Some(delay) = backoff.next_backoff() {
                        warn!(
                            status = status.as_u16(),
                            delay_ms = delay.as_millis(),
                            "Ledger retryable error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(exhausted(backoff.attempt, err));
                }
                ErrorCategory::NonRetryable => return Err(err),
            }
        }
    }
}

/// Surface a timeout as a timeout even after retries.
fn exhausted(attempts: u32, last: LedgerHttpError) -> LedgerHttpError {
    match last {
        LedgerHttpError::Timeout { .. } => last,
        other if attempts <= 1 => other,
        other => LedgerHttpError::MaxRetriesExceeded {
            attempts,
            last_error: other.to_string(),
        },
    }
}

#[async_trait]
impl LedgerGateway for DataApiLedgerGateway {
    async fn get_positions(&self, query: &LedgerQuery) -> Result<Vec<LedgerPosition>, GatewayError> {
        self.fetch_positions(query).await.map_err(GatewayError::from)
    }
}

/// Error category for determining retry behavior.
enum ErrorCategory {
    RateLimited,
    Retryable,
    NonRetryable,
}

/// Categorize HTTP status code for retry handling.
const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500 | 502 | 503 | 504 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

/// Exponential backoff calculator with jitter.
struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    current_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    jitter: Duration,
}

impl ExponentialBackoff {
    const fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts,
            current_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let backoff = self.current_backoff;
        self.current_backoff = Duration::from_secs_f64(
            (self.current_backoff.as_secs_f64() * self.multiplier)
                .min(self.max_backoff.as_secs_f64()),
        );

        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return Some(backoff);
        }
        Some(backoff + Duration::from_millis(rand::rng().random_range(0..=jitter_ms)))
    }
}
