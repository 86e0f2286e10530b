//! Error types for artifact storage

use std::path::PathBuf;

/// Errors raised while reading captured files or talking to a store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error on a local file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key rejected by the store
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Named store does not exist
    #[error("key-value store not found: {0}")]
    StoreNotFound(String),

    /// Metadata could not be encoded or decoded
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Backend-specific failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create invalid key error
    pub fn invalid_key(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }

    /// Check if the error is a missing local file
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
