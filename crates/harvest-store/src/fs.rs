//! Local filesystem stores
//!
//! Layout: `<storage>/key_value_stores/<store id>/<key>` holds the value and
//! `<key>.__metadata__.json` next to it records the content type.

use crate::content_type::guess_content_type;
use crate::error::StoreError;
use crate::kv::{validate_key, KeyMetadata, KeyValueStore, StoreProvider, StoredValue};
use crate::memory::DEFAULT_STORE_ID;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const METADATA_SUFFIX: &str = ".__metadata__.json";
const STORES_DIR: &str = "key_value_stores";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordMetadata {
    key: String,
    content_type: String,
    size: u64,
}

/// Store backed by one directory
#[derive(Debug, Clone)]
pub struct FsStore {
    id: String,
    dir: PathBuf,
}

impl FsStore {
    /// Open store rooted at `dir`, creating the directory
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub async fn create(id: impl Into<String>, dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { id: id.into(), dir })
    }

    /// Directory holding the records
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}{METADATA_SUFFIX}"))
    }

    async fn read_metadata(&self, key: &str) -> Result<Option<RecordMetadata>, StoreError> {
        let path = self.metadata_path(key);
        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

#[async_trait]
impl KeyValueStore for FsStore {
    fn id(&self) -> &str {
        &self.id
    }

    async fn set(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        if key.ends_with(METADATA_SUFFIX) {
            return Err(StoreError::invalid_key(key, "key uses the reserved metadata suffix"));
        }

        let metadata = RecordMetadata {
            key: key.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
        };
        let value_path = self.value_path(key);
        tokio::fs::write(&value_path, bytes)
            .await
            .map_err(|e| StoreError::io(&value_path, e))?;

        let metadata_path = self.metadata_path(key);
        tokio::fs::write(&metadata_path, serde_json::to_vec_pretty(&metadata)?)
            .await
            .map_err(|e| StoreError::io(&metadata_path, e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        validate_key(key)?;
        let path = self.value_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let content_type = match self.read_metadata(key).await? {
            Some(metadata) => metadata.content_type,
            None => guess_content_type(&path),
        };
        Ok(Some(StoredValue::new(bytes, content_type)))
    }

    async fn list_keys(&self) -> Result<Vec<KeyMetadata>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(METADATA_SUFFIX) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if meta.is_file() {
                keys.push(KeyMetadata {
                    key: name,
                    size: meta.len(),
                });
            }
        }
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(keys)
    }
}

/// Provider for stores under a local storage directory
#[derive(Debug, Clone)]
pub struct FsStoreProvider {
    storage_dir: PathBuf,
    default_id: String,
}

impl FsStoreProvider {
    /// Create provider rooted at `storage_dir`
    #[inline]
    #[must_use]
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            default_id: DEFAULT_STORE_ID.to_string(),
        }
    }

    /// Use a different id for the default store
    #[inline]
    #[must_use]
    pub fn with_default_id(mut self, id: impl Into<String>) -> Self {
        self.default_id = id.into();
        self
    }

    /// Directory of the store `id`
    #[must_use]
    pub fn store_dir(&self, id: &str) -> PathBuf {
        self.storage_dir.join(STORES_DIR).join(id)
    }
}

#[async_trait]
impl StoreProvider for FsStoreProvider {
    async fn open_default(&self) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        let store = FsStore::create(&self.default_id, self.store_dir(&self.default_id)).await?;
        Ok(Arc::new(store))
    }

    async fn open(&self, id: &str) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        validate_key(id)?;
        if id == self.default_id {
            return self.open_default().await;
        }
        let dir = self.store_dir(id);
        if !tokio::fs::try_exists(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?
        {
            return Err(StoreError::StoreNotFound(id.to_string()));
        }
        Ok(Arc::new(FsStore {
            id: id.to_string(),
            dir,
        }))
    }
}
