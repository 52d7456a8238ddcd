//! The process-wide provider registry: built once at startup, read-only
//! thereafter.

use std::collections::BTreeMap;
use std::sync::Arc;

use agora_types::{ModelName, ProviderKey, ProvidersSnapshot};

use crate::error::AgoraError;
use crate::fetcher::Fetcher;
use crate::provider::{ProviderExtension, RegistryEntry};

/// Builder collecting provider extensions before the registry is sealed.
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    extensions: Vec<Arc<dyn ProviderExtension>>,
}

impl ProviderRegistryBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension.
    #[must_use]
    pub fn with_extension(mut self, ext: Arc<dyn ProviderExtension>) -> Self {
        self.extensions.push(ext);
        self
    }

    /// Register the result of a fallible extension constructor. A failed
    /// load is logged with the provider name and skipped; it is never fatal.
    #[must_use]
    pub fn try_with_extension(
        mut self,
        name: &str,
        result: Result<Arc<dyn ProviderExtension>, AgoraError>,
    ) -> Self {
        match result {
            Ok(ext) => self.extensions.push(ext),
            Err(err) => {
                tracing::warn!(provider = name, error = %err, "skipping provider extension");
            }
        }
        self
    }

    /// Seal the registry.
    ///
    /// # Errors
    /// Returns `Registration` on a duplicate provider name, a fetcher whose
    /// metadata names a foreign provider, or two fetchers for the same model
    /// within one provider.
    pub fn build(self) -> Result<ProviderRegistry, AgoraError> {
        let mut entries: BTreeMap<ProviderKey, RegistryEntry> = BTreeMap::new();

        for ext in self.extensions {
            let key = ext.key();
            if entries.contains_key(&key) {
                return Err(AgoraError::registration(format!(
                    "provider {key} registered twice"
                )));
            }

            let mut fetchers: BTreeMap<ModelName, Arc<dyn Fetcher>> = BTreeMap::new();
            for fetcher in ext.fetchers() {
                let meta = fetcher.metadata();
                if meta.provider != key {
                    return Err(AgoraError::registration(format!(
                        "fetcher for model {} claims provider {} but was registered by {}",
                        meta.model, meta.provider, key
                    )));
                }
                if fetchers.insert(meta.model.clone(), fetcher.clone()).is_some() {
                    return Err(AgoraError::registration(format!(
                        "provider {} registers model {} twice",
                        key, meta.model
                    )));
                }
            }

            entries.insert(
                key.clone(),
                RegistryEntry {
                    key,
                    description: ext.description().to_string(),
                    website: ext.website().to_string(),
                    version: ext.version().to_string(),
                    credentials: ext.credentials(),
                    fetchers,
                },
            );
        }

        Ok(ProviderRegistry { entries })
    }
}

/// Immutable map of installed providers and their fetchers.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    entries: BTreeMap<ProviderKey, RegistryEntry>,
}

impl ProviderRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    /// Installed provider keys, sorted.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderKey> {
        self.entries.keys().cloned().collect()
    }

    /// Look up an entry by provider name.
    #[must_use]
    pub fn get(&self, provider: &ProviderKey) -> Option<&RegistryEntry> {
        self.entries.get(provider)
    }

    /// Iterate entries in provider order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    /// The fetcher a provider registered for a model, if any.
    #[must_use]
    pub fn fetcher(&self, provider: &ProviderKey, model: &ModelName) -> Option<Arc<dyn Fetcher>> {
        self.entries
            .get(provider)
            .and_then(|e| e.fetchers.get(model))
            .cloned()
    }

    /// All fetchers implementing a model, in provider order.
    #[must_use]
    pub fn fetchers_for(&self, model: &ModelName) -> Vec<Arc<dyn Fetcher>> {
        self.entries
            .values()
            .filter_map(|e| e.fetchers.get(model))
            .cloned()
            .collect()
    }

    /// Credential key names a provider declares.
    #[must_use]
    pub fn credentials_for(&self, provider: &ProviderKey) -> Vec<String> {
        self.entries
            .get(provider)
            .map(|e| e.credentials.clone())
            .unwrap_or_default()
    }

    /// Union of credential keys across all providers, with the providers
    /// declaring each key.
    #[must_use]
    pub fn credential_union(&self) -> BTreeMap<String, Vec<ProviderKey>> {
        let mut union: BTreeMap<String, Vec<ProviderKey>> = BTreeMap::new();
        for entry in self.entries.values() {
            for key in &entry.credentials {
                union.entry(key.clone()).or_default().push(entry.key.clone());
            }
        }
        union
    }

    /// Snapshot of the installed extension set for drift detection.
    #[must_use]
    pub fn snapshot(&self) -> ProvidersSnapshot {
        let mut snap = ProvidersSnapshot::default();
        for entry in self.entries.values() {
            snap.add_provider(entry.key.as_str(), &entry.version);
        }
        snap
    }
}
