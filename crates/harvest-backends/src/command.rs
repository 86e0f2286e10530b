//! Agent CLI runner
//!
//! Spawns the agent as a child process. Every non-empty stdout line is one
//! response chunk; a non-zero exit becomes a runner error carrying the tail
//! of stderr.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use harvest_core::config::ENV_API_KEY;
use harvest_core::{ResponseStream, RunnerError, TaskRequest, TaskRunner};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default agent executable
pub const DEFAULT_PROGRAM: &str = "claude";

const STDERR_TAIL_LINES: usize = 20;

/// Command runner configuration
#[derive(Debug, Clone)]
pub struct CommandRunnerConfig {
    /// Executable to start
    pub program: String,
    /// Arguments placed before the generated ones
    pub leading_args: Vec<String>,
    /// Arguments placed after the generated ones
    pub extra_args: Vec<String>,
    /// Working directory of the child
    pub working_dir: Option<PathBuf>,
    /// Kill the child after this long
    pub timeout: Option<Duration>,
}

impl Default for CommandRunnerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            leading_args: Vec::new(),
            extra_args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }
}

impl CommandRunnerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With executable
    #[inline]
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// With leading arguments
    #[must_use]
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// With trailing arguments
    #[must_use]
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// With working directory
    #[inline]
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// With timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Runs tasks through the agent CLI
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    config: CommandRunnerConfig,
}

impl CommandRunner {
    /// Create runner
    #[inline]
    #[must_use]
    pub fn new(config: CommandRunnerConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CommandRunnerConfig {
        &self.config
    }

    /// Command line arguments for `request`
    ///
    /// # Errors
    /// Returns `RunnerError::Misconfigured` if the tool server table cannot
    /// be encoded
    pub fn args(&self, request: &TaskRequest) -> Result<Vec<String>, RunnerError> {
        let mut args = self.config.leading_args.clone();
        args.push("-p".to_string());
        args.push(request.prompt.clone());

        if let Some(model) = &request.model {
            args.extend(["--model".to_string(), model.clone()]);
        }
        if request.bypass_permissions {
            args.extend(["--permission-mode".to_string(), "bypassPermissions".to_string()]);
        }
        if let Some(suffix) = &request.system_prompt_suffix {
            args.extend(["--append-system-prompt".to_string(), suffix.clone()]);
        }
        if !request.tool_servers.is_empty() {
            let servers = BTreeMap::from([("mcpServers", &request.tool_servers)]);
            let encoded = serde_json::to_string(&servers)
                .map_err(|e| RunnerError::Misconfigured(format!("tool servers: {e}")))?;
            args.extend(["--mcp-config".to_string(), encoded]);
        }

        args.extend(self.config.extra_args.iter().cloned());
        Ok(args)
    }

    fn command(&self, request: &TaskRequest) -> Result<Command, RunnerError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.args(request)?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(key) = &request.api_key {
            cmd.env(ENV_API_KEY, key);
        }
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}

fn collect_tail<R>(reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        while let Ok(Some(line)) = lines.next_line().await {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        Vec::from(tail).join("\n")
    })
}

/// Live child process feeding a response stream
struct Session {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stderr: JoinHandle<String>,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
}

impl Session {
    async fn next_line(&mut self) -> Result<Option<String>, RunnerError> {
        let line = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.lines.next_line())
                .await
                .ok(),
            None => Some(self.lines.next_line().await),
        };
        match line {
            Some(line) => line.map_err(|e| RunnerError::Stream(e.to_string())),
            None => Err(self.cancel().await),
        }
    }

    async fn cancel(&mut self) -> RunnerError {
        let _ = self.child.kill().await;
        RunnerError::Cancelled(format!(
            "timed out after {:?}",
            self.timeout.unwrap_or_default()
        ))
    }

    /// Wait for exit once stdout has closed
    ///
    /// The deadline still applies: a child may close stdout and keep running.
    async fn finish(mut self) -> Result<(), RunnerError> {
        let status = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.child.wait())
                .await
                .ok(),
            None => Some(self.child.wait().await),
        };
        let status = match status {
            Some(status) => status.map_err(|e| RunnerError::Stream(e.to_string()))?,
            None => return Err(self.cancel().await),
        };
        let stderr = self.stderr.await.unwrap_or_default();
        if status.success() {
            if !stderr.is_empty() {
                tracing::debug!(stderr = %stderr, "agent stderr");
            }
            Ok(())
        } else {
            Err(RunnerError::Failed {
                status: status.code(),
                message: stderr,
            })
        }
    }
}

#[async_trait]
impl TaskRunner for CommandRunner {
    async fn execute(&self, request: &TaskRequest) -> Result<ResponseStream, RunnerError> {
        let mut child = self
            .command(request)?
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        tracing::debug!(program = %self.config.program, pid = ?child.id(), "agent started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::Misconfigured("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::Misconfigured("stderr not captured".into()))?;

        let session = Session {
            child,
            lines: BufReader::new(stdout).lines(),
            stderr: collect_tail(stderr),
            deadline: self.config.timeout.map(|t| Instant::now() + t),
            timeout: self.config.timeout,
        };

        let stream = stream::unfold(Some(session), |state| async move {
            let mut session = state?;
            loop {
                match session.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => return Some((Ok(line), Some(session))),
                    Ok(None) => {
                        return match session.finish().await {
                            Ok(()) => None,
                            Err(e) => Some((Err(e), None)),
                        }
                    }
                    Err(e) => return Some((Err(e), None)),
                }
            }
        });
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::ToolServer;

    #[test]
    fn arguments_for_full_request() {
        let mut servers = BTreeMap::new();
        servers.insert("playwright".to_string(), ToolServer::headless_browser());
        let request = TaskRequest::new("do it")
            .with_model("haiku")
            .with_system_prompt_suffix("be autonomous")
            .with_tool_servers(servers);
        let runner = CommandRunner::new(CommandRunnerConfig::new().with_extra_args(["--verbose"]));

        let args = runner.args(&request).unwrap();
        assert_eq!(&args[..4], ["-p", "do it", "--model", "haiku"]);
        assert!(args.windows(2).any(|w| w == ["--permission-mode", "bypassPermissions"]));
        assert!(args.windows(2).any(|w| w == ["--append-system-prompt", "be autonomous"]));
        let mcp = args.iter().position(|a| a == "--mcp-config").unwrap();
        let config: serde_json::Value = serde_json::from_str(&args[mcp + 1]).unwrap();
        assert_eq!(config["mcpServers"]["playwright"]["command"], "npx");
        assert_eq!(args.last().map(String::as_str), Some("--verbose"));
    }

    #[test]
    fn minimal_request_has_no_optional_flags() {
        let mut request = TaskRequest::new("x");
        request.bypass_permissions = false;
        let args = CommandRunner::default().args(&request).unwrap();
        assert_eq!(args, vec!["-p", "x"]);
    }

    #[test]
    fn credential_not_in_arguments() {
        let request = TaskRequest::new("x").with_api_key(Some("sk-secret".into()));
        let args = CommandRunner::default().args(&request).unwrap();
        assert!(!args.iter().any(|a| a.contains("sk-secret")));
    }
}
