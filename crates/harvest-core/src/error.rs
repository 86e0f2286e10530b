//! Error types for Harvest Core
//!
//! Mirrors the failure taxonomy of a capture run:
//! - configuration problems, fatal before anything executes
//! - runner failures, fatal to the current run
//! - store failures, fatal to the batch being written
//! - sink and publish failures at the edges

use harvest_store::{ArtifactRecord, Category, StoreError};
use std::fmt::{self, Display, Formatter};

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Missing or invalid configuration (credentials, paths)
    #[error("configuration error: {0}")]
    Config(String),

    /// Run input does not select a valid mode
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Capture pipeline failed
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// Store access outside the capture pipeline failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Result could not be delivered
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Document submission failed
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

impl HarvestError {
    /// Check if the error was raised before any task execution
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::InvalidInput(_))
    }

    /// Create missing credential error
    #[inline]
    pub fn missing_credential(name: &str) -> Self {
        Self::Config(format!("{name} must be set in environment or input"))
    }
}

/// Errors raised by an external task runner
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Runner is misconfigured
    #[error("runner misconfigured: {0}")]
    Misconfigured(String),

    /// Runner process could not be started
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Task ran and failed
    #[error("task failed (exit status {status:?}): {message}")]
    Failed {
        status: Option<i32>,
        message: String,
    },

    /// Response stream broke
    #[error("response stream error: {0}")]
    Stream(String),

    /// Task cancelled or timed out
    #[error("task cancelled: {0}")]
    Cancelled(String),
}

/// Step of the capture state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureStage {
    /// Nothing started
    Idle,
    /// Taking "before" snapshots
    SnapshotBefore,
    /// External task running
    Executing,
    /// Taking "after" snapshots
    SnapshotAfter,
    /// Computing change sets
    Diffing,
    /// Writing artifacts
    Storing,
    /// Finished successfully
    Done,
    /// Terminated by an error
    Failed,
}

impl Display for CaptureStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::SnapshotBefore => "snapshot-before",
            Self::Executing => "executing",
            Self::SnapshotAfter => "snapshot-after",
            Self::Diffing => "diffing",
            Self::Storing => "storing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Capture pipeline failures
///
/// Nothing is rolled back: records written before the failure are carried
/// in the error.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// External task failed
    #[error("task runner failed: {source}")]
    Runner {
        #[source]
        source: RunnerError,
        /// Records captured by a best-effort pass after the failure
        salvaged: Vec<ArtifactRecord>,
    },

    /// Writing one category's artifacts failed
    #[error("storing {category} artifacts failed: {source}")]
    Store {
        category: Category,
        #[source]
        source: StoreError,
        /// Every record written before the failure, including the failed batch
        stored: Vec<ArtifactRecord>,
    },

    /// Snapshot worker panicked or was cancelled
    #[error("snapshot worker failed during {stage}: {source}")]
    Snapshot {
        stage: CaptureStage,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl CaptureError {
    /// Stage the pipeline was in when it failed
    #[must_use]
    pub fn stage(&self) -> CaptureStage {
        match self {
            Self::Runner { .. } => CaptureStage::Executing,
            Self::Store { .. } => CaptureStage::Storing,
            Self::Snapshot { stage, .. } => *stage,
        }
    }

    /// Records that were persisted despite the failure
    #[must_use]
    pub fn persisted(&self) -> &[ArtifactRecord] {
        match self {
            Self::Runner { salvaged, .. } => salvaged,
            Self::Store { stored, .. } => stored,
            Self::Snapshot { .. } => &[],
        }
    }
}

/// Result sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// IO error writing a record
    #[error("io error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be encoded
    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Destination name rejected
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
}

/// Document submission errors
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Publisher is misconfigured
    #[error("publisher misconfigured: {0}")]
    Misconfigured(String),

    /// Request could not be sent or answered
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_class() {
        assert!(HarvestError::missing_credential("ANTHROPIC_API_KEY").is_configuration());
        assert!(HarvestError::InvalidInput("x".into()).is_configuration());
        let runner = CaptureError::Runner {
            source: RunnerError::Cancelled("timeout".into()),
            salvaged: vec![],
        };
        assert!(!HarvestError::from(runner).is_configuration());
    }

    #[test]
    fn missing_credential_message() {
        let err = HarvestError::missing_credential("ANTHROPIC_API_KEY");
        assert_eq!(
            err.to_string(),
            "configuration error: ANTHROPIC_API_KEY must be set in environment or input"
        );
    }

    #[test]
    fn capture_error_stage() {
        let err = CaptureError::Store {
            category: Category::WorkspaceOutputs,
            source: StoreError::Backend("down".into()),
            stored: vec![],
        };
        assert_eq!(err.stage(), CaptureStage::Storing);
        assert!(err.persisted().is_empty());
        assert_eq!(CaptureStage::SnapshotAfter.to_string(), "snapshot-after");
    }
}
