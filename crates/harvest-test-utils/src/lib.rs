//! Testing utilities for Harvest workspace
//!
//! Scripted runners, instrumented stores and filesystem helpers.

#![allow(missing_docs)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use harvest_core::{
    PublishError, PublishOutcome, PublishRequest, Publisher, ResponseStream, RunnerError,
    TaskRequest, TaskRunner,
};
use harvest_store::{KeyValueStore, MemoryStoreProvider, StoreError, StoreProvider};
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

/// What a scripted task does to the filesystem
#[derive(Debug, Clone)]
pub enum FileAction {
    Write(PathBuf, Vec<u8>),
    SetModified(PathBuf, SystemTime),
    Remove(PathBuf),
}

/// Runner that performs file actions, then streams fixed responses
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    actions: Vec<FileAction>,
    responses: Vec<String>,
    failure: Option<String>,
    requests: Mutex<Vec<TaskRequest>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(mut self, path: impl Into<PathBuf>, contents: impl AsRef<[u8]>) -> Self {
        self.actions
            .push(FileAction::Write(path.into(), contents.as_ref().to_vec()));
        self
    }

    pub fn touches(mut self, path: impl Into<PathBuf>, time: SystemTime) -> Self {
        self.actions.push(FileAction::SetModified(path.into(), time));
        self
    }

    pub fn removes(mut self, path: impl Into<PathBuf>) -> Self {
        self.actions.push(FileAction::Remove(path.into()));
        self
    }

    pub fn responds(mut self, chunk: impl Into<String>) -> Self {
        self.responses.push(chunk.into());
        self
    }

    /// Fail after the file actions, as a crashed task would
    pub fn fails_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<TaskRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

fn apply(action: &FileAction) -> std::io::Result<()> {
    match action {
        FileAction::Write(path, contents) => write_file(path, contents),
        FileAction::SetModified(path, time) => set_modified(path, *time),
        FileAction::Remove(path) => std::fs::remove_file(path),
    }
}

#[async_trait]
impl TaskRunner for ScriptedRunner {
    async fn execute(&self, request: &TaskRequest) -> Result<ResponseStream, RunnerError> {
        self.requests.lock().await.push(request.clone());
        for action in &self.actions {
            apply(action).map_err(|e| RunnerError::Stream(e.to_string()))?;
        }
        if let Some(message) = &self.failure {
            return Err(RunnerError::Failed {
                status: Some(1),
                message: message.clone(),
            });
        }
        let chunks: Vec<Result<String, RunnerError>> =
            self.responses.iter().cloned().map(Ok).collect();
        Ok(stream::iter(chunks).boxed())
    }
}

/// Store provider counting how often stores are opened
#[derive(Debug, Default)]
pub struct CountingStoreProvider {
    inner: Arc<MemoryStoreProvider>,
    opened_default: AtomicUsize,
    opened_by_id: AtomicUsize,
}

impl CountingStoreProvider {
    pub fn new(inner: Arc<MemoryStoreProvider>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &Arc<MemoryStoreProvider> {
        &self.inner
    }

    pub fn default_opens(&self) -> usize {
        self.opened_default.load(Ordering::SeqCst)
    }

    pub fn id_opens(&self) -> usize {
        self.opened_by_id.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreProvider for CountingStoreProvider {
    async fn open_default(&self) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        self.opened_default.fetch_add(1, Ordering::SeqCst);
        self.inner.open_default().await
    }

    async fn open(&self, id: &str) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        self.opened_by_id.fetch_add(1, Ordering::SeqCst);
        self.inner.open(id).await
    }
}

/// Publisher answering with a fixed status and body
#[derive(Debug)]
pub struct RecordingPublisher {
    status: u16,
    body: Value,
    requests: Mutex<Vec<PublishRequest>>,
}

impl RecordingPublisher {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<PublishRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PublishError> {
        self.requests.lock().await.push(request.clone());
        Ok(PublishOutcome::from_response(self.status, self.body.clone()))
    }
}

/// Write `contents`, creating parent directories
pub fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
}

/// Set a file's modification time
pub fn set_modified(path: &Path, time: SystemTime) -> std::io::Result<()> {
    File::options().write(true).open(path)?.set_modified(time)
}

/// A modification time clearly in the past
pub fn an_hour_ago() -> SystemTime {
    SystemTime::now() - Duration::from_secs(3600)
}
