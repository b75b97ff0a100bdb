//! Domain-specific errors for the aggregation core
//!
//! Variants document themselves through their `#[error]` messages.
#![allow(missing_docs)]

use depot_schema::{BackendId, CategoryError, ResourceKey, TransactionId};
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a backend or its factory.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend '{0}' is not valid")]
    Invalid(BackendId),

    #[error("Backend '{backend}' does not own resource {key}")]
    ForeignResource { backend: BackendId, key: ResourceKey },

    #[error("Unknown resource {0}")]
    UnknownResource(ResourceKey),

    #[error("Cannot {action} {key}: {reason}")]
    Unsupported {
        key: ResourceKey,
        action: &'static str,
        reason: String,
    },

    #[error("No backend factory named '{0}'")]
    UnknownFactory(String),

    #[error("Invalid options for backend '{backend}': {message}")]
    Options { backend: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Shorthand for an operation the resource does not support in its current state.
    pub fn unsupported(key: &ResourceKey, action: &'static str, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            key: key.clone(),
            action,
            reason: reason.into(),
        }
    }
}

/// Failures of the aggregation root.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Backend '{0}' is already registered")]
    DuplicateBackend(BackendId),

    #[error("Backend '{0}' failed to initialize and was discarded")]
    InvalidBackend(BackendId),

    #[error("Backend '{0}' was discarded earlier in this session")]
    Blacklisted(BackendId),

    #[error("Unknown backend '{0}'")]
    UnknownBackend(BackendId),

    #[error("Unknown resource {0}")]
    UnknownResource(ResourceKey),
}

/// Failures of transaction bookkeeping.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction {0} cannot be cancelled")]
    NotCancellable(TransactionId),

    #[error("Unknown transaction {0}")]
    Unknown(TransactionId),
}

/// Failures while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Backend name '{0}' is configured twice")]
    DuplicateBackend(String),

    #[error(transparent)]
    Category(#[from] CategoryError),
}

/// Failures of resource-level actions.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("{0} has nothing to execute")]
    NotExecutable(String),

    #[error("Failed to launch {name}: {source}")]
    Launch {
        name: String,
        source: std::io::Error,
    },
}
