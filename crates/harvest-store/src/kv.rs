//! Key-value store contracts
//!
//! The capture pipeline only needs `set`, `get` and `list_keys`. Stores are
//! reached through a [`StoreProvider`] so that opening one can be deferred
//! until there is something to write.

use crate::content_type::is_textual;
use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Key of the record holding a run's input
pub const INPUT_KEY: &str = "INPUT";

/// Longest key in bytes, the common file-name limit
pub const MAX_KEY_BYTES: usize = 255;

/// Raw value with its content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    /// Stored bytes
    pub bytes: Vec<u8>,
    /// Content type recorded at write time
    pub content_type: String,
}

impl StoredValue {
    /// Create value
    #[inline]
    #[must_use]
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Check whether the content type is JSON
    #[must_use]
    pub fn is_json(&self) -> bool {
        let essence = self.content_type.split(';').next().unwrap_or_default().trim();
        essence.eq_ignore_ascii_case("application/json") || essence.ends_with("+json")
    }

    /// Text rendering of the value, `None` for binary content
    ///
    /// JSON is pretty printed; other textual types must be valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        if !is_textual(&self.content_type) {
            return None;
        }
        if self.is_json() {
            if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&self.bytes) {
                return serde_json::to_string_pretty(&value).ok();
            }
        }
        String::from_utf8(self.bytes.clone()).ok()
    }

    /// Decode the value as JSON
    ///
    /// # Errors
    /// Returns error if the bytes are not valid JSON
    pub fn as_json(&self) -> Result<serde_json::Value, StoreError> {
        Ok(serde_json::from_slice(&self.bytes)?)
    }
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    /// Record key
    pub key: String,
    /// Value size in bytes
    pub size: u64,
}

/// Remote key-value store
///
/// No transactional guarantee spans multiple `set` calls.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store id
    fn id(&self) -> &str;

    /// Write `bytes` under `key`, replacing any previous value
    async fn set(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError>;

    /// Read the value under `key`
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError>;

    /// List keys in ascending key order
    async fn list_keys(&self) -> Result<Vec<KeyMetadata>, StoreError>;
}

/// Opens key-value stores
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Open the store owned by the current run
    async fn open_default(&self) -> Result<Arc<dyn KeyValueStore>, StoreError>;

    /// Open an existing store by id
    async fn open(&self, id: &str) -> Result<Arc<dyn KeyValueStore>, StoreError>;
}

/// Reject keys a flat store cannot hold
///
/// # Errors
/// Returns `StoreError::InvalidKey` for empty keys, keys longer than
/// [`MAX_KEY_BYTES`] or keys with path separators
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::invalid_key(key, "key is empty"));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(StoreError::invalid_key(key, "key exceeds 255 bytes"));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(StoreError::invalid_key(key, "key contains a path separator"));
    }
    if key == "." || key == ".." {
        return Err(StoreError::invalid_key(key, "key is a relative path component"));
    }
    Ok(())
}
