//! User and system settings.
//!
//! `user_settings.json` is pretty-printed UTF-8, written atomically (temp
//! file then rename), and skipped entirely when the serialized form is
//! unchanged. System settings come from `AGORA_*` environment variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use agora_types::{Preferences, ProviderKey, RouteDefaults};
use serde::{Deserialize, Serialize};

use crate::error::AgoraError;
use crate::secret::{Credentials, Secret};

/// On-disk mirror of [`UserSettings`] with credentials revealed.
///
/// `Secret` serializes masked by design, so persistence goes through this
/// private type instead. Unknown top-level fields are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct PersistedSettings {
    credentials: BTreeMap<String, Option<String>>,
    preferences: Preferences,
    defaults: RouteDefaults,
}

/// Per-user settings: credentials, preferences, and per-route defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSettings {
    /// Credential values keyed by credential name; `None` marks a key the
    /// user has seen but not filled in.
    pub credentials: BTreeMap<String, Option<Secret>>,
    /// User preferences.
    pub preferences: Preferences,
    /// Per-route defaults.
    pub defaults: RouteDefaults,
}

impl UserSettings {
    /// Default on-disk location: `~/.agora/user_settings.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agora")
            .join("user_settings.json")
    }

    /// Load settings from disk. A missing file yields defaults.
    ///
    /// # Errors
    /// Returns `Validation` when the file exists but is not valid settings
    /// JSON (including unknown top-level fields).
    pub fn load(path: &Path) -> Result<Self, AgoraError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AgoraError::validation(format!("cannot read {}: {e}", path.display()))
        })?;
        let persisted: PersistedSettings = serde_json::from_str(&raw).map_err(|e| {
            AgoraError::validation(format!("invalid settings file {}: {e}", path.display()))
        })?;
        Ok(Self::from(persisted))
    }

    /// Write settings to disk atomically. Returns `false` (and leaves the
    /// file untouched) when the serialized form is unchanged.
    ///
    /// # Errors
    /// Returns `Validation` on I/O failure.
    pub fn save(&self, path: &Path) -> Result<bool, AgoraError> {
        let persisted = self.to_persisted();
        let mut body = serde_json::to_string_pretty(&persisted)
            .map_err(|e| AgoraError::validation(format!("cannot serialize settings: {e}")))?;
        body.push('\n');

        if let Ok(existing) = std::fs::read_to_string(path)
            && existing == body
        {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AgoraError::validation(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body.as_bytes()).map_err(|e| {
            AgoraError::validation(format!("cannot write {}: {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, path).map_err(|e| {
            AgoraError::validation(format!("cannot replace {}: {e}", path.display()))
        })?;
        Ok(true)
    }

    /// Resolve the default provider for a command path: per-route default
    /// first, then the process-wide preference.
    #[must_use]
    pub fn default_provider_for(&self, path: &str) -> Option<ProviderKey> {
        self.defaults
            .routes
            .get(path)
            .and_then(|r| r.provider.as_deref())
            .or(self.preferences.default_provider.as_deref())
            .map(ProviderKey::new)
    }

    /// Materialize the non-empty credentials into a [`Credentials`] record.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        self.credentials
            .iter()
            .filter_map(|(k, v)| v.clone().map(|s| (k.clone(), s)))
            .collect()
    }

    fn to_persisted(&self) -> PersistedSettings {
        PersistedSettings {
            credentials: self
                .credentials
                .iter()
                .map(|(k, v)| (k.clone(), v.as_ref().map(|s| s.reveal().to_string())))
                .collect(),
            preferences: self.preferences.clone(),
            defaults: self.defaults.clone(),
        }
    }
}

impl From<PersistedSettings> for UserSettings {
    fn from(p: PersistedSettings) -> Self {
        Self {
            credentials: p
                .credentials
                .into_iter()
                .map(|(k, v)| (k, v.map(Secret::new)))
                .collect(),
            preferences: p.preferences,
            defaults: p.defaults,
        }
    }
}

fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Process-level settings mapped 1:1 from `AGORA_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSettings {
    /// `AGORA_AUTO_BUILD`: rebuild the static façade when drift is detected.
    pub auto_build: bool,
    /// `AGORA_DEBUG_MODE`: verbose diagnostics.
    pub debug_mode: bool,
    /// `AGORA_DEV_MODE`: development-mode behavior toggles.
    pub dev_mode: bool,
}

impl SystemSettings {
    /// Read system settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            auto_build: env_bool("AGORA_AUTO_BUILD"),
            debug_mode: env_bool("AGORA_DEBUG_MODE"),
            dev_mode: env_bool("AGORA_DEV_MODE"),
        }
    }
}
