//! Persisting changed files under derived keys

use crate::content_type::guess_content_type;
use crate::error::StoreError;
use crate::key::{Category, KeyDeriver, RunContext};
use crate::kv::StoreProvider;
use harvest_snapshot::ChangeSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Result of persisting one changed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Key the file was written under
    pub key: String,
    /// Absolute path of the captured file
    pub path: String,
    /// Monitored area the file came from
    pub category: Category,
}

/// Failure part way through a batch
///
/// Files written before the failure stay in the store and are listed in
/// `stored`.
#[derive(Debug, thiserror::Error)]
#[error("{source} ({} files stored before the failure)", stored.len())]
pub struct BatchError {
    /// Records written before the failure
    pub stored: Vec<ArtifactRecord>,
    /// Underlying store or IO error
    #[source]
    pub source: StoreError,
}

impl From<StoreError> for BatchError {
    fn from(source: StoreError) -> Self {
        Self {
            stored: Vec::new(),
            source,
        }
    }
}

/// Writes change sets into the run's default store
///
/// The store is opened lazily: an empty change set never touches the
/// provider.
#[derive(Clone)]
pub struct ArtifactStore {
    provider: Arc<dyn StoreProvider>,
    run: RunContext,
}

impl fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("run", &self.run)
            .finish_non_exhaustive()
    }
}

impl ArtifactStore {
    /// Create store writer for one run
    #[inline]
    #[must_use]
    pub fn new(provider: Arc<dyn StoreProvider>, run: RunContext) -> Self {
        Self { provider, run }
    }

    /// Run context used for keys
    #[inline]
    #[must_use]
    pub fn run(&self) -> &RunContext {
        &self.run
    }

    /// Persist every path in `changed` under `category`
    ///
    /// Paths are written in sorted order. A file that vanished since the
    /// snapshot is skipped; any other read or write failure aborts the
    /// batch, leaving earlier writes in place.
    ///
    /// # Errors
    /// Returns `BatchError` wrapping `StoreError::Io` if a changed file cannot
    /// be read, or any error raised by the underlying store. The records
    /// written before the failure travel with it.
    pub async fn store(
        &self,
        base: &Path,
        changed: &ChangeSet,
        category: Category,
    ) -> Result<Vec<ArtifactRecord>, BatchError> {
        if changed.is_empty() {
            return Ok(Vec::new());
        }

        let store = self.provider.open_default().await?;
        let mut records = Vec::with_capacity(changed.len());
        let mut seen = HashSet::with_capacity(changed.len());

        for path in changed.iter() {
            let key = KeyDeriver::derive_for(&self.run, category, base, path);
            if !seen.insert(key.clone()) {
                tracing::warn!(key = %key, path = %path.display(), "key collision within batch, later file wins");
            }
            let content_type = guess_content_type(path);

            let data = match tokio::fs::read(path).await.map_err(|e| StoreError::io(path, e)) {
                Ok(data) => data,
                Err(e) if e.is_not_found() => {
                    tracing::debug!(path = %path.display(), "changed file vanished before storing");
                    continue;
                }
                Err(source) => {
                    return Err(BatchError {
                        stored: records,
                        source,
                    })
                }
            };

            if let Err(source) = store.set(&key, data, &content_type).await {
                return Err(BatchError {
                    stored: records,
                    source,
                });
            }
            tracing::info!(
                path = %path.display(),
                key = %key,
                store = store.id(),
                "stored file"
            );

            records.push(ArtifactRecord {
                key,
                path: path.display().to_string(),
                category,
            });
        }

        Ok(records)
    }
}
