//! Harvest Core - capture runs around opaque agent tasks
//!
//! The orchestrator that:
//! - Resolves run input into a capture or generation mode
//! - Snapshots monitored directories around an external task
//! - Stores every added or modified file under a deterministic key
//! - Generates documents from a previous run's store
//! - Pushes one result record per run
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_core::{DatasetSink, HarvestConfig, Orchestrator, RunInput};
//! use harvest_store::FsStoreProvider;
//! use std::sync::Arc;
//!
//! # async fn example(runner: Arc<dyn harvest_core::TaskRunner>) -> Result<(), harvest_core::HarvestError> {
//! let config = HarvestConfig::from_env().with_run_id("run123");
//! let stores = Arc::new(FsStoreProvider::new(&config.storage_dir));
//! let sink = Arc::new(DatasetSink::new(&config.storage_dir));
//! let orchestrator = Orchestrator::new(config, runner, stores, sink);
//!
//! let input = RunInput {
//!     task: Some("Save a screenshot as out/report.png".into()),
//!     ..RunInput::default()
//! };
//! let report = orchestrator.run(input).await?;
//! println!("{}", report.to_value()?);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod generate;
pub mod input;
pub mod orchestrator;
pub mod pipeline;
pub mod publish;
pub mod runner;
pub mod sanitize;
pub mod sink;

pub use config::{CaptureSettings, GenerationSettings, HarvestConfig};
pub use error::{CaptureError, CaptureStage, HarvestError, PublishError, RunnerError, SinkError};
pub use generate::{DocumentSource, GeneratedDocument, SourceFiles};
pub use input::{RunInput, RunMode};
pub use orchestrator::{CaptureReport, GenerationReport, Orchestrator, RunReport, GENERATION_MODE};
pub use pipeline::{CaptureOptions, CaptureOutcome, CapturePipeline, MonitoredDir};
pub use publish::{PublishOutcome, PublishRequest, Publisher, SUBMIT_PATH};
pub use runner::{run_to_completion, ResponseStream, TaskOutput, TaskRequest, TaskRunner, ToolServer};
pub use sanitize::{FencedBlockSanitizer, Passthrough, PostProcessor};
pub use sink::{DatasetSink, MemorySink, ResultSink, DEFAULT_DATASET};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for wiring a run
    pub use crate::{
        CapturePipeline, HarvestConfig, HarvestError, MonitoredDir, Orchestrator, ResultSink,
        RunInput, RunReport, TaskRequest, TaskRunner,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
