//! Per-provider concurrency limiting around the wire step.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use agora_core::{
    AgoraError, Credentials, Fetcher, FetcherMetadata, ParamMap, ProviderKey, Results,
};
use agora_types::ConcurrencyConfig;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use crate::FetchMiddleware;

/// Shared per-provider semaphore pool.
///
/// One gate is shared by every wrapped fetcher of a process so the bound
/// holds across models of the same provider, not just per fetcher.
pub struct ConcurrencyGate {
    per_provider: usize,
    semaphores: Mutex<HashMap<ProviderKey, Arc<Semaphore>>>,
}

impl ConcurrencyGate {
    /// New gate with the configured per-provider bound.
    #[must_use]
    pub fn new(config: ConcurrencyConfig) -> Self {
        Self {
            per_provider: config.per_provider.max(1),
            semaphores: Mutex::new(HashMap::new()),
        }
    }

    /// Configured per-provider bound.
    #[must_use]
    pub fn per_provider(&self) -> usize {
        self.per_provider
    }

    fn semaphore(&self, provider: &ProviderKey) -> Arc<Semaphore> {
        let mut guard = match self.semaphores.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .entry(provider.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_provider)))
            .clone()
    }
}

/// Middleware layer bounding in-flight `extract_data` calls per provider.
pub struct ConcurrencyMiddleware {
    gate: Arc<ConcurrencyGate>,
}

impl ConcurrencyMiddleware {
    /// New layer drawing permits from the shared `gate`.
    #[must_use]
    pub fn new(gate: Arc<ConcurrencyGate>) -> Self {
        Self { gate }
    }
}

impl FetchMiddleware for ConcurrencyMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn Fetcher>) -> Arc<dyn Fetcher> {
        Arc::new(GatedFetcher {
            inner,
            gate: self.gate,
        })
    }

    fn name(&self) -> &'static str {
        "GatedFetcher"
    }

    fn config_json(&self) -> Value {
        json!({ "per_provider": self.gate.per_provider() })
    }
}

struct GatedFetcher {
    inner: Arc<dyn Fetcher>,
    gate: Arc<ConcurrencyGate>,
}

#[async_trait]
impl Fetcher for GatedFetcher {
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
        let meta = self.inner.metadata();
        let semaphore = self.gate.semaphore(&meta.provider);
        let _permit = semaphore.acquire_owned().await.map_err(|_| {
            AgoraError::execution(
                meta.provider.clone(),
                meta.model.clone(),
                "concurrency gate closed",
            )
        })?;
        self.inner.extract_data(query, credentials).await
    }

    fn transform_data(&self, query: &ParamMap, payload: Value) -> Result<Results, AgoraError> {
        self.inner.transform_data(query, payload)
    }
}
