//! Unified error type for the agora workspace.

use agora_types::{ModelName, ProviderKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the agora workspace.
///
/// Startup failures (schema/registration) are fatal; call-time failures map
/// onto HTTP status codes via [`AgoraError::status_code`]. Error details must
/// never carry secret material; credential errors name the missing key only.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AgoraError {
    /// A standard-model schema is invalid or registered twice.
    #[error("schema error: {message}")]
    Schema {
        /// Human-readable description of the schema defect.
        message: String,
    },

    /// Two providers define the same extra field with incompatible types.
    #[error("schema conflict on {model}.{field}: {first} vs {second}")]
    SchemaConflict {
        /// Model the conflicting field belongs to.
        model: ModelName,
        /// Conflicting field name.
        field: String,
        /// Provider whose definition was seen first.
        first: ProviderKey,
        /// Provider whose definition conflicts with it.
        second: ProviderKey,
    },

    /// Router or provider registration is invalid (duplicate path, bad path,
    /// duplicate provider, mismatched fetcher metadata).
    #[error("registration error: {message}")]
    Registration {
        /// Human-readable description of the registration defect.
        message: String,
    },

    /// User input failed shape or type validation.
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable description of the invalid input.
        message: String,
    },

    /// No provider could be resolved for the requested model.
    #[error("no provider selected for model {model}")]
    NoProviderSelected {
        /// Model that had no resolvable provider.
        model: ModelName,
    },

    /// The chosen provider does not implement the requested model.
    #[error("model {model} is not supported by provider {provider}")]
    ModelNotSupported {
        /// Provider that was selected.
        provider: ProviderKey,
        /// Model the provider lacks.
        model: ModelName,
    },

    /// A required credential key is absent or empty.
    #[error("missing credential {key} for provider {provider}")]
    MissingCredential {
        /// Provider requiring the credential.
        provider: ProviderKey,
        /// Name of the missing credential key. Never its value.
        key: String,
    },

    /// The vendor returned a non-2xx response.
    #[error("provider {provider} failed: {detail}")]
    Provider {
        /// Provider that failed.
        provider: ProviderKey,
        /// Vendor HTTP status, when one exists.
        status: Option<u16>,
        /// Sanitized vendor detail.
        detail: String,
        /// Vendor-advised retry delay (from `Retry-After`), if any.
        retry_after_ms: Option<u64>,
    },

    /// The request was valid but the vendor returned zero rows.
    #[error("no results found for {model} via {provider}; try adjusting the query")]
    EmptyData {
        /// Provider that returned no rows.
        provider: ProviderKey,
        /// Model that was queried.
        model: ModelName,
    },

    /// The per-call time budget elapsed before the fetch completed.
    #[error("request for {model} via {provider} timed out")]
    Timeout {
        /// Provider whose fetch was cancelled.
        provider: ProviderKey,
        /// Model that was queried.
        model: ModelName,
    },

    /// The caller cancelled the in-flight request.
    ///
    /// Cancellation inside the executor is drop-based (a timed-out or
    /// disconnected call simply drops the fetch future), so the dispatch
    /// path never constructs this variant itself. It is reserved for
    /// embedders that race calls against their own cancellation signal
    /// and need a typed outcome with the 499 mapping.
    #[error("request for {model} was cancelled")]
    Cancelled {
        /// Model that was queried.
        model: ModelName,
    },

    /// Unclassified fetcher failure, tagged with its provider and model.
    #[error("execution of {model} via {provider} failed: {detail}")]
    Execution {
        /// Provider whose fetcher failed.
        provider: ProviderKey,
        /// Model that was queried.
        model: ModelName,
        /// Sanitized failure description.
        detail: String,
    },
}

impl AgoraError {
    /// Helper: build a `Schema` error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Helper: build a `Registration` error.
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration {
            message: message.into(),
        }
    }

    /// Helper: build a `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Helper: build a `Provider` error without retry advice.
    pub fn provider_error(
        provider: impl Into<ProviderKey>,
        status: Option<u16>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            status,
            detail: detail.into(),
            retry_after_ms: None,
        }
    }

    /// Helper: build an `Execution` error.
    pub fn execution(
        provider: impl Into<ProviderKey>,
        model: impl Into<ModelName>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Execution {
            provider: provider.into(),
            model: model.into(),
            detail: detail.into(),
        }
    }

    /// Stable machine-readable kind string, surfaced as `error_kind` in HTTP
    /// error bodies.
    #[must_use]
    pub const fn error_kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "SchemaError",
            Self::SchemaConflict { .. } => "SchemaConflictError",
            Self::Registration { .. } => "RegistrationError",
            Self::Validation { .. } => "ValidationError",
            Self::NoProviderSelected { .. } => "NoProviderSelected",
            Self::ModelNotSupported { .. } => "ModelNotSupported",
            Self::MissingCredential { .. } => "MissingCredential",
            Self::Provider { .. } => "ProviderError",
            Self::EmptyData { .. } => "EmptyDataError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Cancelled { .. } => "Cancelled",
            Self::Execution { .. } => "ExecutionError",
        }
    }

    /// HTTP status code this error surfaces as.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NoProviderSelected { .. }
            | Self::ModelNotSupported { .. }
            | Self::EmptyData { .. } => 400,
            Self::MissingCredential { .. } => 401,
            Self::Timeout { .. } => 408,
            Self::Validation { .. } => 422,
            Self::Cancelled { .. } => 499,
            Self::Provider { .. } => 502,
            Self::Schema { .. }
            | Self::SchemaConflict { .. }
            | Self::Registration { .. }
            | Self::Execution { .. } => 500,
        }
    }

    /// Whether a retry may succeed: vendor rate limits and server errors.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Provider { status, .. } => match status {
                Some(s) => *s == 429 || (*s >= 500 && *s < 600),
                None => false,
            },
            _ => false,
        }
    }
}
