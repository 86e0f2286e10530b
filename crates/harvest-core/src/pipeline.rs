//! Capture pipeline
//!
//! Wraps one opaque task: snapshot every monitored directory, run the task,
//! snapshot again, diff, and persist what changed.
//!
//! ```text
//! Idle -> SnapshotBefore -> Executing -> SnapshotAfter -> Diffing -> Storing -> Done
//!                              |
//!                              +-> Failed (optionally after a best-effort capture)
//! ```

use crate::error::{CaptureError, CaptureStage};
use crate::runner::{run_to_completion, TaskOutput, TaskRequest, TaskRunner};
use harvest_snapshot::{ChangeSet, DirectorySpec, Snapshot, SnapshotDiffer, SnapshotTaker};
use harvest_store::{ArtifactRecord, ArtifactStore, BatchError, Category};
use serde::{Deserialize, Serialize};

/// Directory watched during a task, with the label its files are stored under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredDir {
    /// Root and eligibility rules
    pub spec: DirectorySpec,
    /// Key category for files found here
    pub category: Category,
}

impl MonitoredDir {
    /// Create monitored directory
    #[inline]
    #[must_use]
    pub fn new(spec: DirectorySpec, category: Category) -> Self {
        Self { spec, category }
    }
}

/// Pipeline behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Diff and store even when the task fails
    pub capture_on_failure: bool,
    /// Truncate logged response chunks to this many characters
    pub response_log_limit: Option<usize>,
}

impl CaptureOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With best-effort capture after task failure
    #[inline]
    #[must_use]
    pub fn with_capture_on_failure(mut self, enabled: bool) -> Self {
        self.capture_on_failure = enabled;
        self
    }

    /// With response log truncation
    #[inline]
    #[must_use]
    pub fn with_response_log_limit(mut self, limit: usize) -> Self {
        self.response_log_limit = Some(limit);
        self
    }
}

/// Successful capture
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureOutcome {
    /// Task responses
    pub output: TaskOutput,
    /// Stored files, grouped by monitored directory in monitoring order
    pub records: Vec<ArtifactRecord>,
}

impl CaptureOutcome {
    /// Records of one category
    #[must_use]
    pub fn records_for(&self, category: Category) -> Vec<ArtifactRecord> {
        self.records
            .iter()
            .filter(|record| record.category == category)
            .cloned()
            .collect()
    }

    /// Check whether a file with the given absolute path was stored
    #[must_use]
    pub fn stored_path(&self, path: &std::path::Path) -> bool {
        let path = path.display().to_string();
        self.records.iter().any(|record| record.path == path)
    }
}

/// Runs tasks and captures the files they produce
#[derive(Debug, Clone)]
pub struct CapturePipeline {
    store: ArtifactStore,
    taker: SnapshotTaker,
    options: CaptureOptions,
}

impl CapturePipeline {
    /// Create pipeline writing through `store`
    #[inline]
    #[must_use]
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            taker: SnapshotTaker::new(),
            options: CaptureOptions::default(),
        }
    }

    /// With options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    /// Active options
    #[inline]
    #[must_use]
    pub fn options(&self) -> CaptureOptions {
        self.options
    }

    /// Run `request` and capture changes under `dirs`
    ///
    /// Directories are stored in the given order. A task failure skips
    /// capture unless [`CaptureOptions::capture_on_failure`] is set.
    ///
    /// # Errors
    /// - `CaptureError::Runner` if the task fails
    /// - `CaptureError::Store` if persisting a batch fails
    /// - `CaptureError::Snapshot` if a snapshot worker dies
    pub async fn run(
        &self,
        runner: &dyn TaskRunner,
        request: &TaskRequest,
        dirs: &[MonitoredDir],
    ) -> Result<CaptureOutcome, CaptureError> {
        self.enter(CaptureStage::Idle);
        self.enter(CaptureStage::SnapshotBefore);
        let before = self.snapshot_all(dirs, CaptureStage::SnapshotBefore).await?;

        self.enter(CaptureStage::Executing);
        tracing::info!("Starting task: {}", request.prompt);
        let output = match run_to_completion(runner, request, self.options.response_log_limit).await {
            Ok(output) => output,
            Err(source) => {
                self.enter(CaptureStage::Failed);
                tracing::error!(error = %source, "Task failed");
                let salvaged = if self.options.capture_on_failure {
                    self.salvage(dirs, &before).await
                } else {
                    Vec::new()
                };
                return Err(CaptureError::Runner { source, salvaged });
            }
        };

        let records = self.capture_changes(dirs, &before).await?;
        self.enter(CaptureStage::Done);
        Ok(CaptureOutcome { output, records })
    }

    fn enter(&self, stage: CaptureStage) {
        tracing::debug!(stage = %stage, run = %self.store.run(), "capture stage");
    }

    async fn snapshot_all(
        &self,
        dirs: &[MonitoredDir],
        stage: CaptureStage,
    ) -> Result<Vec<Snapshot>, CaptureError> {
        let taker = self.taker;
        let specs: Vec<DirectorySpec> = dirs.iter().map(|dir| dir.spec.clone()).collect();
        tokio::task::spawn_blocking(move || specs.iter().map(|spec| taker.take(spec)).collect())
            .await
            .map_err(|source| CaptureError::Snapshot { stage, source })
    }

    async fn capture_changes(
        &self,
        dirs: &[MonitoredDir],
        before: &[Snapshot],
    ) -> Result<Vec<ArtifactRecord>, CaptureError> {
        self.enter(CaptureStage::SnapshotAfter);
        let after = self.snapshot_all(dirs, CaptureStage::SnapshotAfter).await?;

        self.enter(CaptureStage::Diffing);
        let changes: Vec<ChangeSet> = before
            .iter()
            .zip(&after)
            .map(|(before, after)| SnapshotDiffer::diff(before, after))
            .collect();

        self.enter(CaptureStage::Storing);
        let mut records = Vec::new();
        for (dir, changed) in dirs.iter().zip(&changes) {
            tracing::debug!(
                category = %dir.category,
                root = %dir.spec.root.display(),
                changed = changed.len(),
                "storing changes"
            );
            match self.store.store(&dir.spec.root, changed, dir.category).await {
                Ok(stored) => records.extend(stored),
                Err(BatchError { stored, source }) => {
                    self.enter(CaptureStage::Failed);
                    records.extend(stored);
                    return Err(CaptureError::Store {
                        category: dir.category,
                        source,
                        stored: records,
                    });
                }
            }
        }
        Ok(records)
    }

    async fn salvage(&self, dirs: &[MonitoredDir], before: &[Snapshot]) -> Vec<ArtifactRecord> {
        match self.capture_changes(dirs, before).await {
            Ok(records) => {
                tracing::info!(stored = records.len(), "Captured files after task failure");
                records
            }
            Err(e) => {
                tracing::warn!(error = %e, "Best-effort capture failed");
                e.persisted().to_vec()
            }
        }
    }
}
