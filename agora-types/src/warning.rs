//! Warnings accumulated during a command call and attached to the envelope.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Category of a warning carried in the result envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum WarningCategory {
    /// General platform-level advisory (e.g. an unsupported extra parameter
    /// that was dropped before dispatch).
    Agora,
    /// The invoked command is deprecated.
    Deprecation,
    /// Advisory raised by (or about) the selected provider.
    Provider,
}

impl fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Agora => "AgoraWarning",
            Self::Deprecation => "DeprecationWarning",
            Self::Provider => "ProviderWarning",
        };
        f.write_str(s)
    }
}

/// A single warning: category plus a human-readable message.
///
/// Warnings never raise; they are collected by a call-local sink and
/// returned in the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Warning category.
    pub category: WarningCategory,
    /// Human-readable message.
    pub message: String,
}

impl Warning {
    /// Build a platform advisory warning.
    pub fn agora(message: impl Into<String>) -> Self {
        Self {
            category: WarningCategory::Agora,
            message: message.into(),
        }
    }

    /// Build a deprecation warning.
    pub fn deprecation(message: impl Into<String>) -> Self {
        Self {
            category: WarningCategory::Deprecation,
            message: message.into(),
        }
    }

    /// Build a provider advisory warning.
    pub fn provider(message: impl Into<String>) -> Self {
        Self {
            category: WarningCategory::Provider,
            message: message.into(),
        }
    }
}
