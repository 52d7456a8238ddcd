//! agora-core
//!
//! Core contracts and engines shared across the agora ecosystem.
//!
//! - `schema`: standard-model schemas, field descriptors, and the schema registry.
//! - `fetcher`: the three-step fetcher contract and its metadata.
//! - `provider`: the provider-extension plugin surface and registry entries.
//! - `registry`: the build-once, read-only provider registry.
//! - `interface`: the merge engine unifying provider schemas per model.
//! - `envelope`: the uniform result envelope and the call-local warning sink.
//! - `secret`: redacting secret strings and the credentials record.
//! - `series`: deterministic row ordering and canonical query strings.
//! - `settings`: user/system settings with atomic JSON persistence.
//!
//! Async runtime (Tokio)
//! ---------------------
//! This crate assumes the Tokio ecosystem as the async runtime. The fetcher
//! contract is async at the `extract_data` boundary, and per-call statistics
//! use `tokio::task_local!` to cross middleware layers without threading a
//! context argument through every wrapper.
#![warn(missing_docs)]

/// Unified error type and HTTP/error-kind mappings.
pub mod error;
/// Result envelope, warning sink, and accessor extensions.
pub mod envelope;
/// The fetcher contract, parameter maps, and call statistics.
pub mod fetcher;
/// Merge engine producing per-model unified schemas.
pub mod interface;
/// Provider extension trait and registry entries.
pub mod provider;
/// The process-wide provider registry.
pub mod registry;
/// Standard-model schemas and the schema registry.
pub mod schema;
/// Redacting secrets and the credentials record.
pub mod secret;
/// Deterministic row ordering and canonical query strings.
pub mod series;
/// User and system settings.
pub mod settings;

pub use agora_types::{ModelName, ProviderKey, Warning, WarningCategory};
pub use envelope::{AccessorRegistry, CommandResult, WarningSink};
pub use error::AgoraError;
pub use fetcher::{CallStats, Fetcher, FetcherMetadata, ParamMap, Results, Row, canonical_query};
pub use interface::{ModelInterface, ProviderInterface};
pub use provider::{ProviderExtension, RegistryEntry};
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};
pub use schema::{FieldDescriptor, Schema, SchemaRegistry, SemanticType, StandardModel};
pub use secret::{Credentials, Secret};
pub use settings::{SystemSettings, UserSettings};
