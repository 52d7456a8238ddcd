//! Response caching over the raw wire payload.

use std::sync::Arc;

use agora_core::{
    AgoraError, CallStats, Credentials, Fetcher, FetcherMetadata, ParamMap, Results,
    canonical_query,
};
use agora_types::CacheConfig;
use async_trait::async_trait;
use moka::future::Cache;
use serde_json::{Value, json};

use crate::FetchMiddleware;

/// Middleware layer caching successful `extract_data` payloads.
///
/// Keys are canonical query strings, so logically equal queries share an
/// entry regardless of parameter order. Raw payloads are cached (not
/// transformed rows): `transform_data` still runs on every call, keeping
/// sorting and aliasing behavior identical on hits and misses. A truthy
/// `no_cache` parameter bypasses both lookup and insertion.
pub struct CachingMiddleware {
    config: CacheConfig,
}

impl CachingMiddleware {
    /// New layer with the given cache policy.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }
}

impl FetchMiddleware for CachingMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn Fetcher>) -> Arc<dyn Fetcher> {
        let cache = Cache::builder()
            .max_capacity(self.config.max_entries)
            .time_to_live(self.config.ttl)
            .build();
        Arc::new(CachedFetcher { inner, cache })
    }

    fn name(&self) -> &'static str {
        "CachedFetcher"
    }

    fn config_json(&self) -> Value {
        json!({
            "ttl_ms": u64::try_from(self.config.ttl.as_millis()).unwrap_or(u64::MAX),
            "max_entries": self.config.max_entries,
        })
    }
}

struct CachedFetcher {
    inner: Arc<dyn Fetcher>,
    cache: Cache<String, Value>,
}

impl CachedFetcher {
    /// Cache key for the query, with the `no_cache` control parameter
    /// stripped so it never discriminates entries.
    fn key_for(&self, query: &ParamMap) -> String {
        let meta = self.inner.metadata();
        if query.contains_key("no_cache") {
            let mut keyed = query.clone();
            keyed.remove("no_cache");
            canonical_query(&meta.provider, &meta.model, &keyed)
        } else {
            canonical_query(&meta.provider, &meta.model, query)
        }
    }
}

#[async_trait]
impl Fetcher for CachedFetcher {
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
        let bypass = query
            .get("no_cache")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if bypass {
            return self.inner.extract_data(query, credentials).await;
        }

        let key = self.key_for(query);
        if let Some(hit) = self.cache.get(&key).await {
            CallStats::record_cache_hit();
            let meta = self.inner.metadata();
            tracing::trace!(provider = %meta.provider, model = %meta.model, "cache hit");
            return Ok(hit);
        }

        let payload = self.inner.extract_data(query, credentials).await?;
        self.cache.insert(key, payload.clone()).await;
        Ok(payload)
    }

    fn transform_data(&self, query: &ParamMap, payload: Value) -> Result<Results, AgoraError> {
        self.inner.transform_data(query, payload)
    }
}
