//! External task runner contract
//!
//! The runner is opaque: it takes a prompt, streams response chunks and may
//! write any files it likes. Nothing it produces is trusted beyond the
//! files the capture pipeline observes afterwards.

use crate::error::RunnerError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stream of response chunks from a running task
pub type ResponseStream = BoxStream<'static, Result<String, RunnerError>>;

/// Tool server the agent may start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolServer {
    /// Executable
    pub command: String,
    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolServer {
    /// Create tool server entry
    #[must_use]
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Headless browser automation server
    #[must_use]
    pub fn headless_browser() -> Self {
        Self::new(
            "npx",
            [
                "@playwright/mcp@latest",
                "--browser",
                "chromium",
                "--headless",
                "--no-sandbox",
            ],
        )
    }
}

/// One task invocation
#[derive(Clone, Default)]
pub struct TaskRequest {
    /// Prompt text
    pub prompt: String,
    /// Model name, runner default when unset
    pub model: Option<String>,
    /// Text appended to the agent's system prompt
    pub system_prompt_suffix: Option<String>,
    /// Tool servers keyed by name
    pub tool_servers: BTreeMap<String, ToolServer>,
    /// Agent credential
    pub api_key: Option<String>,
    /// Skip interactive permission checks
    pub bypass_permissions: bool,
}

impl fmt::Debug for TaskRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRequest")
            .field("prompt", &self.prompt)
            .field("model", &self.model)
            .field("system_prompt_suffix", &self.system_prompt_suffix)
            .field("tool_servers", &self.tool_servers)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("bypass_permissions", &self.bypass_permissions)
            .finish()
    }
}

impl TaskRequest {
    /// Create request for an automated run
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            bypass_permissions: true,
            ..Self::default()
        }
    }

    /// Prompt for a task with an optional starting URL
    #[must_use]
    pub fn task_prompt(task: &str, url: Option<&str>) -> String {
        match url.filter(|url| !url.trim().is_empty()) {
            Some(url) => format!("Navigate to {url} and then: {task}"),
            None => task.to_string(),
        }
    }

    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// With system prompt suffix
    #[inline]
    #[must_use]
    pub fn with_system_prompt_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.system_prompt_suffix = Some(suffix.into());
        self
    }

    /// With tool servers
    #[inline]
    #[must_use]
    pub fn with_tool_servers(mut self, servers: BTreeMap<String, ToolServer>) -> Self {
        self.tool_servers = servers;
        self
    }

    /// With credential
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }
}

/// Executes agent tasks
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Start the task and return its response stream
    ///
    /// The task counts as finished once the stream is exhausted.
    async fn execute(&self, request: &TaskRequest) -> Result<ResponseStream, RunnerError>;
}

/// Collected responses of a finished task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Response chunks in arrival order
    pub responses: Vec<String>,
}

impl TaskOutput {
    /// Last response chunk
    #[inline]
    #[must_use]
    pub fn final_response(&self) -> Option<&str> {
        self.responses.last().map(String::as_str)
    }
}

/// Run a task to completion, logging every chunk
///
/// `log_limit` truncates logged chunks; the collected output is never
/// truncated.
///
/// # Errors
/// Returns the first error raised by the runner or its stream
pub async fn run_to_completion(
    runner: &dyn TaskRunner,
    request: &TaskRequest,
    log_limit: Option<usize>,
) -> Result<TaskOutput, RunnerError> {
    let mut stream = runner.execute(request).await?;
    let mut output = TaskOutput::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        match log_limit {
            Some(limit) if chunk.chars().count() > limit => {
                let head: String = chunk.chars().take(limit).collect();
                tracing::info!("Response: {head}...");
            }
            _ => tracing::info!("Response: {chunk}"),
        }
        output.responses.push(chunk);
    }

    tracing::info!(chunks = output.responses.len(), "Task completed");
    Ok(output)
}
