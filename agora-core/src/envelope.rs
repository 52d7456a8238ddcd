//! The uniform result envelope, the call-local warning sink, and the typed
//! accessor-extension map.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use agora_types::{ProviderKey, Warning};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fetcher::Results;

/// Call-scoped warning queue.
///
/// Each command call owns one sink; concurrent calls cannot contaminate each
/// other's envelopes. Cloning shares the underlying queue so fan-out
/// sub-tasks report into the same call.
#[derive(Debug, Clone, Default)]
pub struct WarningSink {
    queue: Arc<Mutex<Vec<Warning>>>,
}

impl WarningSink {
    /// Fresh empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a warning.
    pub fn push(&self, warning: Warning) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push(warning);
        }
    }

    /// Drain all accumulated warnings in insertion order.
    #[must_use]
    pub fn drain(&self) -> Vec<Warning> {
        self.queue
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }

    /// Number of queued warnings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Whether the sink is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Constructor for an envelope accessor extension.
pub type AccessorCtor = Arc<dyn Fn(&CommandResult) -> Box<dyn Any + Send> + Send + Sync>;

/// Registry of accessor extensions exposed on the envelope.
///
/// Plugins hand over `(name, constructor)` pairs; the envelope resolves them
/// by name and downcasts to the requested type. This replaces dynamic
/// attribute injection with an explicit, typed registration API.
#[derive(Clone, Default)]
pub struct AccessorRegistry {
    ctors: BTreeMap<&'static str, AccessorCtor>,
}

impl AccessorRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accessor constructor under a name.
    pub fn register(&mut self, name: &'static str, ctor: AccessorCtor) {
        self.ctors.insert(name, ctor);
    }

    /// Registered accessor names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.ctors.keys().copied().collect()
    }

    /// Build the named accessor for an envelope and downcast it.
    #[must_use]
    pub fn build<T: 'static>(&self, name: &str, envelope: &CommandResult) -> Option<T> {
        let ctor = self.ctors.get(name)?;
        ctor(envelope).downcast::<T>().ok().map(|b| *b)
    }
}

impl fmt::Debug for AccessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// The uniform wrapper returned by every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Result payload: a single record or a sequence of records.
    pub results: Results,
    /// Provider that served the call.
    pub provider: ProviderKey,
    /// Warnings accumulated during the call.
    pub warnings: Vec<Warning>,
    /// Call metadata: model name, fetcher runtime, retry count.
    pub extra: serde_json::Map<String, Value>,
    /// Opaque chart payload, when charting is requested downstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<Value>,
}

impl CommandResult {
    /// Build an envelope with empty warnings and extras.
    pub fn new(results: Results, provider: impl Into<ProviderKey>) -> Self {
        Self {
            results,
            provider: provider.into(),
            warnings: Vec::new(),
            extra: serde_json::Map::new(),
            chart: None,
        }
    }

    /// Resolve a registered accessor extension against this envelope.
    #[must_use]
    pub fn accessor<T: 'static>(&self, registry: &AccessorRegistry, name: &str) -> Option<T> {
        registry.build::<T>(name, self)
    }
}
