//! Provider extension surface: what a provider plugin declares at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use agora_types::{ModelName, ProviderKey};

use crate::fetcher::Fetcher;

/// A provider extension: the plugin contract a data vendor integration
/// implements to join the registry.
///
/// Extensions are registered explicitly on the registry builder at process
/// start; there is no runtime plugin scanning. A failed extension
/// constructor is skipped with a log line rather than aborting startup.
pub trait ProviderExtension: Send + Sync {
    /// Stable provider name (e.g. `"alpha"`). Used as the routing key.
    fn name(&self) -> &'static str;

    /// Canonical provider key constructed from the static name.
    fn key(&self) -> ProviderKey {
        ProviderKey::new(self.name())
    }

    /// Human-readable description of the vendor.
    fn description(&self) -> &'static str {
        ""
    }

    /// Vendor website.
    fn website(&self) -> &'static str {
        ""
    }

    /// Extension version, recorded in the build snapshot as `name@version`.
    fn version(&self) -> &'static str {
        "0.1.0"
    }

    /// Credential key names this provider declares (union of its fetchers').
    fn credentials(&self) -> Vec<String>;

    /// The fetchers this provider contributes, one per implemented model.
    fn fetchers(&self) -> Vec<Arc<dyn Fetcher>>;
}

/// One immutable registry entry per installed provider.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Provider key.
    pub key: ProviderKey,
    /// Vendor description.
    pub description: String,
    /// Vendor website.
    pub website: String,
    /// Extension version.
    pub version: String,
    /// Declared credential key names.
    pub credentials: Vec<String>,
    /// Fetchers keyed by model name.
    pub fetchers: BTreeMap<ModelName, Arc<dyn Fetcher>>,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("key", &self.key)
            .field("version", &self.version)
            .field("credentials", &self.credentials)
            .field("models", &self.fetchers.keys().collect::<Vec<_>>())
            .finish()
    }
}
