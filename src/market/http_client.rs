use crate::config::MarketDataConfig;
use anyhow::{Context, Result};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("request error: {0}")]
    Transport(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("no data in response")]
    Empty,
}

impl FetchError {
    /// Rate limits, server errors and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status(code) => *code == 429 || *code >= 500,
            FetchError::Transport(_) => true,
            FetchError::Decode(_) | FetchError::Empty => false,
        }
    }
}

pub struct HttpClient {
    inner: reqwest::Client,
    config: MarketDataConfig,
}

impl HttpClient {
    pub fn new(config: &MarketDataConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Yahoo hands out a session cookie on first contact
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text with rate-limiting and retry.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let factor = (self.config.retry_backoff_ms / 2).max(1);
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(factor)
            .map(jitter)
            .take(self.config.max_retries as usize);

        RetryIf::start(
            strategy,
            || self.attempt(url),
            |e: &FetchError| {
                let retry = e.is_retryable();
                if retry {
                    warn!("GET {} failed ({}), retrying", url, e);
                }
                retry
            },
        )
        .await
    }

    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        self.polite_delay().await;
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        resp.text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = rand::random_range(0..=self.config.jitter_ms);
        let total = Duration::from_millis(self.config.request_delay_ms + jitter);
        if !total.is_zero() {
            sleep(total).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(FetchError::Status(429).is_retryable());
        assert!(FetchError::Status(503).is_retryable());
        assert!(FetchError::Transport("reset".into()).is_retryable());
        assert!(!FetchError::Status(404).is_retryable());
        assert!(!FetchError::Decode("eof".into()).is_retryable());
        assert!(!FetchError::Empty.is_retryable());
    }
}
