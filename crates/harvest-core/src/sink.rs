//! Result sinks
//!
//! Every run ends with one JSON record pushed to a dataset.

use crate::error::SinkError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Dataset used when no destination is given
pub const DEFAULT_DATASET: &str = "default";

const DATASETS_DIR: &str = "datasets";
const ITEMS_FILE: &str = "items.jsonl";

/// Receives run result records
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Append `record` to `destination`, or to the default dataset
    async fn push(&self, record: &Value, destination: Option<&str>) -> Result<(), SinkError>;
}

/// Appends JSON lines under a local storage directory
#[derive(Debug, Clone)]
pub struct DatasetSink {
    storage_dir: PathBuf,
}

impl DatasetSink {
    /// Create sink rooted at `storage_dir`
    #[inline]
    #[must_use]
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    /// File holding the items of `dataset`
    #[must_use]
    pub fn items_path(&self, dataset: &str) -> PathBuf {
        self.storage_dir.join(DATASETS_DIR).join(dataset).join(ITEMS_FILE)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError {
    let path = path.to_path_buf();
    move |source| SinkError::Io { path, source }
}

fn check_destination(name: &str) -> Result<(), SinkError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(SinkError::InvalidDestination(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ResultSink for DatasetSink {
    async fn push(&self, record: &Value, destination: Option<&str>) -> Result<(), SinkError> {
        let dataset = destination.unwrap_or(DEFAULT_DATASET);
        check_destination(dataset)?;

        let path = self.items_path(dataset);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err(&path))?;
        file.write_all(&line).await.map_err(io_err(&path))?;
        file.flush().await.map_err(io_err(&path))?;

        tracing::info!(dataset, "Results pushed to dataset");
        Ok(())
    }
}

/// Keeps pushed records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Option<String>, Value)>>,
}

impl MemorySink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushed records with their destinations
    pub async fn records(&self) -> Vec<(Option<String>, Value)> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn push(&self, record: &Value, destination: Option<&str>) -> Result<(), SinkError> {
        if let Some(name) = destination {
            check_destination(name)?;
        }
        self.records
            .lock()
            .await
            .push((destination.map(str::to_string), record.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DatasetSink::new(dir.path());
        sink.push(&json!({"n": 1}), None).await.unwrap();
        sink.push(&json!({"n": 2}), None).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("datasets/default/items.jsonl")).unwrap();
        let lines: Vec<Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn named_destination() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DatasetSink::new(dir.path());
        sink.push(&json!({"ok": true}), Some("results")).await.unwrap();
        assert!(sink.items_path("results").is_file());
    }

    #[tokio::test]
    async fn rejects_path_like_destination() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DatasetSink::new(dir.path());
        let err = sink.push(&json!({}), Some("../escape")).await.unwrap_err();
        assert!(matches!(err, SinkError::InvalidDestination(_)));
    }

    #[tokio::test]
    async fn memory_sink_records() {
        let sink = MemorySink::new();
        sink.push(&json!({"a": 1}), Some("out")).await.unwrap();
        let records = sink.records().await;
        assert_eq!(records, vec![(Some("out".to_string()), json!({"a": 1}))]);
    }
}
