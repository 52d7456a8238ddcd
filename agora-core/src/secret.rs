//! Redacting secret strings and the aggregated credentials record.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

const MASK: &str = "**********";

/// A secret string with a redacting representation.
///
/// `Debug`, `Display`, and `Serialize` all emit a fixed mask. The raw value
/// is only reachable through [`Secret::reveal`], which the HTTP layer never
/// calls; settings persistence and fetcher dispatch are the two legitimate
/// reveal sites.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Explicitly reveal the raw value.
    #[must_use]
    pub fn reveal(&self) -> &str {
        &self.0
    }

    /// Whether the underlying value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(MASK)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(String::deserialize(deserializer)?))
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Typed record of secret credentials, keyed by the union of all provider
/// credential key names.
///
/// Missing credentials are simply absent; presence is only enforced at call
/// time for fetchers that declare `requires_credentials`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    entries: BTreeMap<String, Secret>,
}

impl Credentials {
    /// Empty credentials record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a credential.
    pub fn insert(&mut self, key: impl Into<String>, value: Secret) {
        self.entries.insert(key.into(), value);
    }

    /// Look up a credential by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Secret> {
        self.entries.get(key)
    }

    /// Whether the key is present with a non-empty value.
    #[must_use]
    pub fn has_non_empty(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|s| !s.is_empty())
    }

    /// Iterate over `(key, secret)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Secret)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of stored credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no credentials are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Secret)> for Credentials {
    fn from_iter<T: IntoIterator<Item = (String, Secret)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
