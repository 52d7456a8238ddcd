//! Agora-specific data transfer objects and configuration primitives.
#![warn(missing_docs)]

mod config;
mod keys;
mod snapshot;
mod warning;

pub use config::{BackoffConfig, CacheConfig, ConcurrencyConfig, Preferences, RetryConfig, RouteDefault, RouteDefaults};
pub use keys::{ModelName, ProviderKey};
pub use snapshot::ProvidersSnapshot;
pub use warning::{Warning, WarningCategory};
