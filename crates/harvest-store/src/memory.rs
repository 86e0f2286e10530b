//! In-memory stores

use crate::error::StoreError;
use crate::kv::{validate_key, KeyMetadata, KeyValueStore, StoreProvider, StoredValue};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Id of the store returned by `open_default`
pub const DEFAULT_STORE_ID: &str = "default";

/// Concurrent in-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    id: String,
    records: DashMap<String, StoredValue>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            records: DashMap::new(),
        }
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Synchronous read, for assertions
    #[must_use]
    pub fn snapshot(&self, key: &str) -> Option<StoredValue> {
        self.records.get(key).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn id(&self) -> &str {
        &self.id
    }

    async fn set(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.records
            .insert(key.to_string(), StoredValue::new(bytes, content_type));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        Ok(self.snapshot(key))
    }

    async fn list_keys(&self) -> Result<Vec<KeyMetadata>, StoreError> {
        let mut keys: Vec<KeyMetadata> = self
            .records
            .iter()
            .map(|entry| KeyMetadata {
                key: entry.key().clone(),
                size: entry.value().bytes.len() as u64,
            })
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(keys)
    }
}

/// Provider handing out shared in-memory stores
///
/// `open` only finds stores that were created with [`MemoryStoreProvider::insert`]
/// or by a previous `open_default`.
#[derive(Debug, Default)]
pub struct MemoryStoreProvider {
    stores: DashMap<String, Arc<MemoryStore>>,
}

impl MemoryStoreProvider {
    /// Create provider with no stores
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store under its id
    pub fn insert(&self, store: MemoryStore) -> Arc<MemoryStore> {
        let store = Arc::new(store);
        self.stores.insert(store.id.clone(), Arc::clone(&store));
        store
    }

    /// Concrete handle to the default store, creating it if needed
    #[must_use]
    pub fn default_store(&self) -> Arc<MemoryStore> {
        Arc::clone(
            self.stores
                .entry(DEFAULT_STORE_ID.to_string())
                .or_insert_with(|| Arc::new(MemoryStore::new(DEFAULT_STORE_ID)))
                .value(),
        )
    }
}

#[async_trait]
impl StoreProvider for MemoryStoreProvider {
    async fn open_default(&self) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        Ok(self.default_store())
    }

    async fn open(&self, id: &str) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        self.stores
            .get(id)
            .map(|entry| Arc::clone(entry.value()) as Arc<dyn KeyValueStore>)
            .ok_or_else(|| StoreError::StoreNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_overwrite() {
        let store = MemoryStore::new("s");
        store.set("k", b"one".to_vec(), "text/plain").await.unwrap();
        store.set("k", b"two".to_vec(), "text/plain").await.unwrap();

        let value = store.get("k").await.unwrap().unwrap();
        assert_eq!(value.bytes, b"two");
        assert_eq!(store.len(), 1);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_sorted() {
        let store = MemoryStore::new("s");
        for key in ["b", "c", "a"] {
            store.set(key, vec![1, 2], "application/octet-stream").await.unwrap();
        }
        let keys: Vec<_> = store.list_keys().await.unwrap().into_iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn rejects_invalid_keys() {
        let store = MemoryStore::new("s");
        let err = store.set("a/b", vec![], "text/plain").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn provider_shares_default_store() {
        let provider = MemoryStoreProvider::new();
        let opened = provider.open_default().await.unwrap();
        opened.set("x", b"1".to_vec(), "text/plain").await.unwrap();

        assert!(provider.default_store().snapshot("x").is_some());
        assert!(provider.open(DEFAULT_STORE_ID).await.is_ok());
    }

    #[tokio::test]
    async fn provider_open_unknown_fails() {
        let provider = MemoryStoreProvider::new();
        provider.insert(MemoryStore::new("known"));
        assert!(provider.open("known").await.is_ok());
        assert!(matches!(
            provider.open("other").await,
            Err(StoreError::StoreNotFound(id)) if id == "other"
        ));
    }
}
