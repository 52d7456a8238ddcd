//! The fetcher contract: the three-step adapter binding a vendor API to a
//! standard model.
//!
//! The lifecycle is pinned to a single async shape:
//!
//! 1. `transform_query`: fill defaults, normalize symbols, validate
//!    cardinality. Synchronous; must not suspend.
//! 2. `extract_data`: perform wire I/O. The only suspension (and
//!    cancellation) point of a call.
//! 3. `transform_data`: parse, coerce, apply aliases, and sort rows by the
//!    model's natural key. Synchronous; must not suspend.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use agora_types::{ModelName, ProviderKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgoraError;
use crate::schema::FieldDescriptor;
use crate::secret::Credentials;

/// Parameter object passed across the dispatch boundary.
pub type ParamMap = serde_json::Map<String, Value>;

/// A single result row.
pub type Row = serde_json::Map<String, Value>;

/// Result payload of a command: a single record or a sequence of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Results {
    /// A sequence of records (time series, statement rows, listings).
    Records(Vec<Row>),
    /// A single record.
    Record(Row),
}

impl Results {
    /// Number of rows carried.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Record(_) => 1,
            Self::Records(rows) => rows.len(),
        }
    }

    /// Whether no rows are carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Record(_) => false,
            Self::Records(rows) => rows.is_empty(),
        }
    }

    /// View the payload as a slice of rows (a single record is a 1-slice).
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        match self {
            Self::Record(row) => std::slice::from_ref(row),
            Self::Records(rows) => rows.as_slice(),
        }
    }
}

/// Static metadata describing one fetcher: its model binding, credential
/// requirements, and the provider-specific schema extensions consumed by the
/// merge engine.
#[derive(Debug, Clone)]
pub struct FetcherMetadata {
    /// Standard model this fetcher implements.
    pub model: ModelName,
    /// Owning provider.
    pub provider: ProviderKey,
    /// Whether credentials are enforced before dispatch.
    pub requires_credentials: bool,
    /// Credential key names this fetcher reads.
    pub credential_keys: Vec<String>,
    /// Whether `extract_data` performs blocking work and should run on a
    /// blocking worker rather than suspend.
    pub blocking_extract: bool,
    /// Provider-only query fields beyond the standard schema.
    pub extra_query: Vec<FieldDescriptor>,
    /// Provider-only data fields beyond the standard schema.
    pub extra_data: Vec<FieldDescriptor>,
    /// Canonical field name to provider wire name.
    pub alias_map: BTreeMap<String, String>,
}

impl FetcherMetadata {
    /// Minimal metadata for a credential-free fetcher with no extras.
    pub fn new(model: impl Into<ModelName>, provider: impl Into<ProviderKey>) -> Self {
        Self {
            model: model.into(),
            provider: provider.into(),
            requires_credentials: false,
            credential_keys: Vec::new(),
            blocking_extract: false,
            extra_query: Vec::new(),
            extra_data: Vec::new(),
            alias_map: BTreeMap::new(),
        }
    }
}

/// The three-step adapter (`transform_query`, `extract_data`,
/// `transform_data`) that binds a vendor API to a standard model.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Static metadata for this fetcher.
    fn metadata(&self) -> &FetcherMetadata;

    /// Normalize raw parameters into the provider query: fill defaults,
    /// upper-case symbols where declared, validate cardinality.
    ///
    /// # Errors
    /// Returns `Validation` on malformed input.
    fn transform_query(&self, params: &ParamMap) -> Result<ParamMap, AgoraError>;

    /// Perform wire I/O for the transformed query.
    ///
    /// # Errors
    /// `MissingCredential` when a required secret is absent, `Provider` for
    /// non-2xx vendor responses, `EmptyData` when the vendor returned zero
    /// rows.
    async fn extract_data(
        &self,
        query: &ParamMap,
        credentials: &Credentials,
    ) -> Result<Value, AgoraError>;

    /// Parse and type-coerce the raw payload into ordered result rows.
    ///
    /// # Errors
    /// `EmptyData` when the payload holds no rows, `Validation` on
    /// unparseable payloads.
    fn transform_data(&self, query: &ParamMap, payload: Value) -> Result<Results, AgoraError>;
}

/// Canonical string form of a query, used for cache keys: object keys are
/// emitted in sorted order so logically equal queries hash identically.
#[must_use]
pub fn canonical_query(provider: &ProviderKey, model: &ModelName, params: &ParamMap) -> String {
    let sorted: BTreeMap<&String, &Value> = params.iter().collect();
    let body = serde_json::to_string(&sorted).unwrap_or_default();
    format!("{provider}:{model}:{body}")
}

tokio::task_local! {
    static CALL_STATS: CallStats;
}

/// Per-call counters recorded by middleware layers and read by the executor
/// when assembling the envelope's `extra` map.
///
/// Stats travel through a tokio task-local so wrappers deep in the fetch
/// pipeline can record without threading a context argument.
#[derive(Debug, Clone, Default)]
pub struct CallStats {
    retries: Arc<AtomicU64>,
    cache_hit: Arc<AtomicBool>,
}

impl CallStats {
    /// Fresh zeroed stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a future with these stats installed as the task-local scope.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CALL_STATS.scope(self.clone(), fut).await
    }

    /// Record one retry in the current call scope. No-op outside a scope.
    pub fn record_retry() {
        let _ = CALL_STATS.try_with(|s| {
            s.retries.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Record a cache hit in the current call scope. No-op outside a scope.
    pub fn record_cache_hit() {
        let _ = CALL_STATS.try_with(|s| {
            s.cache_hit.store(true, Ordering::Relaxed);
        });
    }

    /// Retries recorded so far.
    #[must_use]
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Whether the payload was served from cache.
    #[must_use]
    pub fn cache_hit(&self) -> bool {
        self.cache_hit.load(Ordering::Relaxed)
    }
}
