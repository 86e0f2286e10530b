//! Run orchestrator
//!
//! Resolves the input into a mode, runs it through the capture pipeline and
//! pushes exactly one result record per run.

use crate::config::{HarvestConfig, ENV_API_KEY};
use crate::error::{CaptureError, HarvestError, SinkError};
use crate::generate::{
    agent_error_document, build_prompt, collect_source_files, finish_document,
    missing_output_body, no_inputs_document, DocumentSource, GeneratedDocument, SourceFiles,
};
use crate::input::{RunInput, RunMode};
use crate::pipeline::{CaptureOptions, CaptureOutcome, CapturePipeline};
use crate::publish::{PublishOutcome, PublishRequest, Publisher};
use crate::runner::{TaskRequest, TaskRunner};
use crate::sanitize::{FencedBlockSanitizer, PostProcessor};
use crate::sink::ResultSink;
use harvest_store::{ArtifactRecord, ArtifactStore, Category, StoreProvider, INPUT_KEY};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Mode label of generation records
pub const GENERATION_MODE: &str = "llms_txt_generation";

const GENERATION_LOG_LIMIT: usize = 200;

/// Result record of a capture run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureReport {
    pub success: bool,
    pub task: String,
    pub url: Option<String>,
    pub responses: Vec<String>,
    pub final_response: Option<String>,
    /// Files from the tool scratch directory
    pub artifacts: Vec<ArtifactRecord>,
    /// Files from the workspace root
    pub output_files: Vec<ArtifactRecord>,
    /// Both of the above, in storing order
    pub stored_files: Vec<ArtifactRecord>,
}

impl CaptureReport {
    fn new(task: String, url: Option<String>, outcome: CaptureOutcome) -> Self {
        Self {
            success: true,
            task,
            url,
            final_response: outcome.output.final_response().map(str::to_string),
            artifacts: outcome.records_for(Category::ToolArtifacts),
            output_files: outcome.records_for(Category::WorkspaceOutputs),
            stored_files: outcome.records,
            responses: outcome.output.responses,
        }
    }
}

/// Result record of a generation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub success: bool,
    pub mode: &'static str,
    pub domain: String,
    pub kv_store_id: String,
    #[serde(rename = "llms_txt")]
    pub document: String,
    #[serde(rename = "flask_submission")]
    pub submission: Option<PublishOutcome>,
    #[serde(skip)]
    pub source: Option<DocumentSource>,
}

/// Result of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunReport {
    Capture(CaptureReport),
    Generation(GenerationReport),
}

impl RunReport {
    /// JSON record pushed to the sink
    ///
    /// # Errors
    /// Returns error if the report cannot be encoded
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Record pushed when a run fails
#[derive(Debug, Clone, Serialize)]
struct FailureReport<'a> {
    success: bool,
    error: String,
    stored_files: &'a [ArtifactRecord],
}

/// Entry point for a single run
pub struct Orchestrator {
    config: HarvestConfig,
    runner: Arc<dyn TaskRunner>,
    stores: Arc<dyn StoreProvider>,
    sink: Arc<dyn ResultSink>,
    publisher: Option<Arc<dyn Publisher>>,
    post_processor: Arc<dyn PostProcessor>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("has_publisher", &self.publisher.is_some())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create orchestrator
    #[must_use]
    pub fn new(
        config: HarvestConfig,
        runner: Arc<dyn TaskRunner>,
        stores: Arc<dyn StoreProvider>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            config,
            runner,
            stores,
            sink,
            publisher: None,
            post_processor: Arc::new(FencedBlockSanitizer::default()),
        }
    }

    /// With document publisher
    #[inline]
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// With document post-processor
    #[inline]
    #[must_use]
    pub fn with_post_processor(mut self, post_processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = post_processor;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Fetch the input record of the run's default store
    ///
    /// # Errors
    /// Returns error if the store cannot be read or the record is not JSON
    pub async fn default_input(&self) -> Result<RunInput, HarvestError> {
        let store = self.stores.open_default().await?;
        match store.get(INPUT_KEY).await? {
            Some(value) => RunInput::from_value(value.as_json()?),
            None => {
                tracing::warn!(store = store.id(), "No INPUT record, starting with empty input");
                Ok(RunInput::default())
            }
        }
    }

    /// Execute one run and push its result record
    ///
    /// On failure a failure record is pushed (best effort) and the error is
    /// returned.
    ///
    /// # Errors
    /// - configuration errors before any task runs
    /// - capture, store or publish failures
    /// - sink failure when pushing the success record
    pub async fn run(&self, mut input: RunInput) -> Result<RunReport, HarvestError> {
        tracing::info!(?input, run = %self.config.run_context(), "Input received");
        let destination = input.output_dataset_id.clone();

        match self.dispatch(&mut input).await {
            Ok(report) => {
                let record = report.to_value().map_err(SinkError::from)?;
                self.sink.push(&record, destination.as_deref()).await?;
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "Run failed");
                self.report_failure(&e, destination.as_deref()).await;
                Err(e)
            }
        }
    }

    async fn dispatch(&self, input: &mut RunInput) -> Result<RunReport, HarvestError> {
        if input.needs_stored_input() {
            self.load_stored_input(input).await?;
        }

        let mode = input.mode()?;
        tracing::info!(mode = mode.name(), "Mode selected");
        match mode {
            RunMode::Generate { store_id, domain } => self
                .generate(&store_id, &domain, input)
                .await
                .map(RunReport::Generation),
            RunMode::Capture { task, url } => {
                self.capture(task, url, input).await.map(RunReport::Capture)
            }
        }
    }

    async fn load_stored_input(&self, input: &mut RunInput) -> Result<(), HarvestError> {
        let Some(store_id) = input.store_id().map(str::to_string) else {
            return Ok(());
        };
        tracing::info!("Fetching INPUT from store {store_id} to get domain and credentials");

        let store = self.stores.open(&store_id).await?;
        let record = store.get(INPUT_KEY).await?.ok_or_else(|| {
            HarvestError::InvalidInput(format!("INPUT record not found in store {store_id}"))
        })?;
        input.merge_stored(&record.as_json()?);
        Ok(())
    }

    fn credential(&self, input: &RunInput) -> Result<String, HarvestError> {
        input
            .anthropic_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.config.api_key.clone())
            .ok_or_else(|| HarvestError::missing_credential(ENV_API_KEY))
    }

    fn pipeline(&self, options: CaptureOptions) -> CapturePipeline {
        let store = ArtifactStore::new(Arc::clone(&self.stores), self.config.run_context());
        CapturePipeline::new(store).with_options(options)
    }

    async fn capture(
        &self,
        task: String,
        url: Option<String>,
        input: &RunInput,
    ) -> Result<CaptureReport, HarvestError> {
        let api_key = self.credential(input)?;
        let settings = &self.config.capture;

        let request = TaskRequest::new(TaskRequest::task_prompt(&task, url.as_deref()))
            .with_model(settings.model.clone())
            .with_tool_servers(settings.tool_servers.clone())
            .with_api_key(Some(api_key));
        let options = CaptureOptions::new().with_capture_on_failure(settings.capture_on_failure);

        let outcome = self
            .pipeline(options)
            .run(self.runner.as_ref(), &request, &self.config.monitored_dirs())
            .await?;
        tracing::info!(stored = outcome.records.len(), "Capture completed");
        Ok(CaptureReport::new(task, url, outcome))
    }

    async fn generate(
        &self,
        store_id: &str,
        domain: &str,
        input: &RunInput,
    ) -> Result<GenerationReport, HarvestError> {
        let api_key = self.credential(input)?;
        let settings = &self.config.generation;

        tracing::info!("Opening store: {store_id}");
        let store = self.stores.open(store_id).await?;
        let files = collect_source_files(store.as_ref()).await?;

        let document = if files.is_empty() {
            tracing::warn!("No files found in store, generating basic template");
            no_inputs_document(domain, settings)
        } else {
            tracing::info!("Generating document for {domain} with {} files", files.len());
            self.run_generation(domain, &files, api_key).await
        };

        let submission = self.publish(domain, &document.text, input).await?;
        tracing::info!(source = ?document.source, "Document generation completed");

        Ok(GenerationReport {
            success: true,
            mode: GENERATION_MODE,
            domain: domain.to_string(),
            kv_store_id: store_id.to_string(),
            document: document.text,
            submission,
            source: Some(document.source),
        })
    }

    async fn run_generation(
        &self,
        domain: &str,
        files: &SourceFiles,
        api_key: String,
    ) -> GeneratedDocument {
        let settings = &self.config.generation;
        let request = TaskRequest::new(build_prompt(domain, files, settings))
            .with_model(settings.model.clone())
            .with_system_prompt_suffix(settings.system_prompt_suffix.clone())
            .with_api_key(Some(api_key));
        let options = CaptureOptions::new().with_response_log_limit(GENERATION_LOG_LIMIT);

        let outcome = match self
            .pipeline(options)
            .run(self.runner.as_ref(), &request, &self.config.monitored_dirs())
            .await
        {
            Ok(outcome) => outcome,
            Err(CaptureError::Runner { source, .. }) => {
                tracing::error!(error = %source, "Document generation failed");
                return agent_error_document(domain, files, &source.to_string(), settings);
            }
            Err(e) => {
                tracing::error!(error = %e, "Document generation failed");
                return agent_error_document(domain, files, &e.to_string(), settings);
            }
        };

        let path = &settings.output_path;
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                tracing::info!(path = %path.display(), "Found generated document");
                if path.starts_with(&self.config.workspace_root) && !outcome.stored_path(path) {
                    tracing::warn!(path = %path.display(), "Document was not modified during this run");
                }
                let body = self.post_processor.process(&raw);
                finish_document(body, domain, files, DocumentSource::Agent, settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Document not found, using fallback template");
                finish_document(
                    missing_output_body(domain, files),
                    domain,
                    files,
                    DocumentSource::MissingOutput,
                    settings,
                )
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read generated document");
                agent_error_document(domain, files, &e.to_string(), settings)
            }
        }
    }

    async fn publish(
        &self,
        domain: &str,
        document: &str,
        input: &RunInput,
    ) -> Result<Option<PublishOutcome>, HarvestError> {
        let Some(secret) = input.publish_secret.clone().filter(|s| !s.trim().is_empty()) else {
            tracing::warn!("No publish secret provided, skipping submission");
            return Ok(None);
        };
        let Some(publisher) = &self.publisher else {
            tracing::warn!("No publisher configured, skipping submission");
            return Ok(None);
        };

        let request = PublishRequest {
            domain: domain.to_string(),
            document: document.to_string(),
            base_url: input
                .publish_url
                .clone()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| self.config.generation.publish_base_url.clone()),
            secret,
        };
        tracing::info!("Submitting document to {}", request.endpoint());

        let outcome = publisher.publish(&request).await?;
        if outcome.success {
            tracing::info!("Submitted document for {domain}");
        } else {
            tracing::error!(status = ?outcome.status, "Submission rejected");
        }
        Ok(Some(outcome))
    }

    async fn report_failure(&self, error: &HarvestError, destination: Option<&str>) {
        let stored_files = match error {
            HarvestError::Capture(e) => e.persisted(),
            _ => &[],
        };
        let record = FailureReport {
            success: false,
            error: error.to_string(),
            stored_files,
        };
        let pushed = match serde_json::to_value(&record) {
            Ok(value) => self.sink.push(&value, destination).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = pushed {
            tracing::warn!(error = %e, "Failed to push failure record");
        }
    }
}
