//! agora
//!
//! A high-level, pluggable financial-data access core. Providers plug in as
//! extensions; standard models give every logical dataset one canonical
//! query/result schema; the executor routes each call to a provider through
//! a composable fetch pipeline (cache, retry, concurrency limiting) and
//! wraps the outcome in a uniform envelope.
//!
//! ```no_run
//! use agora::{Application, Command, Router};
//!
//! # fn schemas() -> agora_core::SchemaRegistry { agora_core::SchemaRegistry::new() }
//! # fn main() -> Result<(), agora_core::AgoraError> {
//! let router = Router::new().mount(
//!     "/equity",
//!     Router::new().command(Command::new("/historical/", "EquityHistorical")?),
//! );
//! let app = Application::builder()
//!     .schemas(schemas())
//!     .router(router)
//!     .build()?;
//! # let _ = app;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]

/// The package builder and drift detection.
pub mod build;
/// Command records, the router tree, and the flattened command map.
pub mod command;
/// The application context and its builder.
pub mod context;
mod executor;

pub use agora_core::{
    AgoraError, CommandResult, Credentials, ModelName, ParamMap, ProviderKey, Results, Secret,
    Warning, WarningCategory,
};
pub use build::PackageBuilder;
pub use command::{Command, CommandMap, Router};
pub use context::{Application, ApplicationBuilder, CommandContext};
