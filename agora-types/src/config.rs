//! Configuration types shared across the executor, middleware, and settings.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for transient provider failures (HTTP 429 and 5xx).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the initial one.
    pub max_attempts: u32,
    /// Backoff schedule applied between attempts.
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Exponential backoff configuration with jitter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 100,
            max_backoff_ms: 10_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

impl BackoffConfig {
    /// Deterministic (pre-jitter) delay for the given zero-based retry index.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = u64::from(self.factor.max(1));
        let mult = factor.saturating_pow(retry);
        let ms = self
            .min_backoff_ms
            .saturating_mul(mult)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Per-provider fetch concurrency bound applied around `extract_data`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Maximum in-flight extractions per provider.
    pub per_provider: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { per_provider: 4 }
    }
}

/// Response-cache configuration for the fetch pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Per-entry time to live.
    pub ttl: Duration,
    /// Maximum number of cached payloads.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // One day, matching typical vendor end-of-day refresh cycles.
            ttl: Duration::from_secs(24 * 60 * 60),
            max_entries: 10_000,
        }
    }
}

/// User-tunable preferences carried in `user_settings.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Process-wide default provider when neither the call nor the route
    /// defaults select one.
    pub default_provider: Option<String>,
    /// Optional per-call timeout in milliseconds for fetch execution.
    pub request_timeout_ms: Option<u64>,
    /// Whether the fetch-payload cache is enabled.
    pub cache_enabled: bool,
    /// Directory the package builder writes its output into.
    pub build_directory: Option<String>,
}

/// Per-route default selections, keyed by command path (e.g. `"/equity/foo/"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteDefaults {
    /// Map of command path to its defaults.
    pub routes: BTreeMap<String, RouteDefault>,
}

/// Defaults applied to a single command path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteDefault {
    /// Default provider for the route, overriding `Preferences::default_provider`.
    pub provider: Option<String>,
}
