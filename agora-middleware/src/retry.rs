//! Transient-failure retry with exponential backoff and jitter.

use std::sync::Arc;
use std::time::Duration;

use agora_core::{AgoraError, CallStats, Credentials, Fetcher, FetcherMetadata, ParamMap, Results};
use agora_types::RetryConfig;
use async_trait::async_trait;
use rand::Rng;
use serde_json::{Value, json};

use crate::FetchMiddleware;

/// Middleware layer that retries transient vendor failures (HTTP 429 and
/// 5xx) with exponential backoff.
///
/// A vendor-advised `Retry-After` overrides the computed backoff for that
/// attempt. Each retry is recorded on the call-local [`CallStats`] so the
/// executor can surface the count in the envelope.
pub struct RetryMiddleware {
    config: RetryConfig,
}

impl RetryMiddleware {
    /// New layer with the given retry policy.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl FetchMiddleware for RetryMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn Fetcher>) -> Arc<dyn Fetcher> {
        Arc::new(RetryFetcher {
            inner,
            config: self.config,
        })
    }

    fn name(&self) -> &'static str {
        "RetryFetcher"
    }

    fn config_json(&self) -> Value {
        json!({
            "max_attempts": self.config.max_attempts,
            "min_backoff_ms": self.config.backoff.min_backoff_ms,
            "max_backoff_ms": self.config.backoff.max_backoff_ms,
            "factor": self.config.backoff.factor,
            "jitter_percent": self.config.backoff.jitter_percent,
        })
    }
}

struct RetryFetcher {
    inner: Arc<dyn Fetcher>,
    config: RetryConfig,
}

impl RetryFetcher {
    /// Backoff for the zero-based retry index, with up to `jitter_percent`
    /// of random extra delay.
    fn jittered_delay(&self, retry: u32) -> Duration {
        let base = self.config.backoff.delay_for(retry);
        let jitter_percent = u64::from(self.config.backoff.jitter_percent.min(100));
        if jitter_percent == 0 {
            return base;
        }
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let span = base_ms.saturating_mul(jitter_percent) / 100;
        let extra = if span == 0 {
            0
        } else {
            rand::rng().random_range(0..=span)
        };
        Duration::from_millis(base_ms.saturating_add(extra))
    }
}

#[async_trait]
impl Fetcher for RetryFetcher {
    fn metadata(&self) -> &FetcherMetadata {
        self.inner.metadata()
    }

    fn transform_query(&self, params: &ParamMap) -> Result<ParamMap, AgoraError> {
        self.inner.transform_query(params)
    }

    async fn extract_data(
        &self,
        query: &ParamMap,
        credentials: &Credentials,
    ) -> Result<Value, AgoraError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut retry = 0u32;
        loop {
            match self.inner.extract_data(query, credentials).await {
                Ok(payload) => return Ok(payload),
                Err(err) if err.is_transient() && retry + 1 < max_attempts => {
                    let advised = match &err {
                        AgoraError::Provider {
                            retry_after_ms: Some(ms),
                            ..
                        } => Some(Duration::from_millis(*ms)),
                        _ => None,
                    };
                    let delay = advised.unwrap_or_else(|| self.jittered_delay(retry));
                    CallStats::record_retry();
                    let meta = self.inner.metadata();
                    tracing::debug!(
                        provider = %meta.provider,
                        model = %meta.model,
                        retry = retry + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying transient provider failure"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn transform_data(&self, query: &ParamMap, payload: Value) -> Result<Results, AgoraError> {
        self.inner.transform_data(query, payload)
    }
}
