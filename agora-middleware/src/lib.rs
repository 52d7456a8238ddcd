//! Fetch-pipeline middleware: wrappers composed around a raw fetcher.
//!
//! # Ordering convention
//!
//! Layers form an onion around the raw fetcher. The `layers` slice passed to
//! [`compose`] is outermost-first, and layers are applied in reverse so
//! `layers[0]` ends up wrapping everything else:
//!
//! ```text
//! Executor
//!     ↓
//! CachedFetcher        (outermost: a hit skips everything below)
//!     ↓
//! RetryFetcher         (re-drives the wire call on 429/5xx)
//!     ↓
//! GatedFetcher         (bounds in-flight extractions per provider)
//!     ↓
//! Raw fetcher          (vendor adapter)
//! ```
//!
//! Every wrapper delegates `metadata`, `transform_query`, and
//! `transform_data` untouched; only the wire step is augmented.
#![warn(missing_docs)]

mod cache;
mod limit;
mod retry;

use std::sync::Arc;

use agora_core::Fetcher;

pub use crate::cache::CachingMiddleware;
pub use crate::limit::{ConcurrencyGate, ConcurrencyMiddleware};
pub use crate::retry::RetryMiddleware;

/// Trait implemented by fetch middleware layers.
///
/// A middleware consumes an inner fetcher and returns a wrapped fetcher that
/// augments the wire step (caching, retries, concurrency limiting).
pub trait FetchMiddleware: Send + Sync {
    /// Wrap an inner fetcher and return the wrapped fetcher.
    fn apply(self: Box<Self>, inner: Arc<dyn Fetcher>) -> Arc<dyn Fetcher>;

    /// Human-readable layer name for introspection and logging.
    fn name(&self) -> &'static str;

    /// Opaque configuration snapshot for serialization and inspection.
    fn config_json(&self) -> serde_json::Value;
}

/// Apply `layers` (outermost-first) around `raw`, innermost to outermost.
#[must_use]
pub fn compose(raw: Arc<dyn Fetcher>, layers: Vec<Box<dyn FetchMiddleware>>) -> Arc<dyn Fetcher> {
    let mut wrapped = raw;
    for layer in layers.into_iter().rev() {
        tracing::debug!(layer = layer.name(), "applying fetch middleware");
        wrapped = layer.apply(wrapped);
    }
    wrapped
}
