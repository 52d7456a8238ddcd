//! Build-time provider snapshot (`providers.json`) used for drift detection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Snapshot of the installed extensions at the time of the last façade build.
///
/// Keys are `"<name>@<version>"`; values are always `null` in the JSON form.
/// The package builder writes one of these next to its output, and startup
/// drift detection diffs it against the live registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersSnapshot {
    /// Installed core (router) extensions.
    #[serde(default)]
    pub agora_core_extension: BTreeMap<String, Option<u8>>,
    /// Installed provider extensions.
    #[serde(default)]
    pub agora_provider_extension: BTreeMap<String, Option<u8>>,
}

impl ProvidersSnapshot {
    /// Record a provider extension as `"<name>@<version>"`.
    pub fn add_provider(&mut self, name: &str, version: &str) {
        self.agora_provider_extension
            .insert(format!("{name}@{version}"), None);
    }

    /// Record a core (router) extension as `"<name>@<version>"`.
    pub fn add_core(&mut self, name: &str, version: &str) {
        self.agora_core_extension
            .insert(format!("{name}@{version}"), None);
    }
}
