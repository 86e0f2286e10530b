//! Run configuration
//!
//! Defaults match the container layout the agent runs in. Every field can be
//! overridden with a `with_*` builder or from the environment.

use crate::pipeline::MonitoredDir;
use crate::runner::ToolServer;
use harvest_snapshot::{DirectorySpec, FilterPolicy};
use harvest_store::{Category, RunContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Tool scratch directory variable
pub const ENV_ARTIFACT_DIR: &str = "PLAYWRIGHT_ARTIFACT_DIR";
/// Workspace root variable
pub const ENV_OUTPUT_ROOT: &str = "ACTOR_OUTPUT_ROOT";
/// Run id variables, first match wins
pub const ENV_RUN_ID: [&str; 2] = ["ACTOR_RUN_ID", "APIFY_ACTOR_RUN_ID"];
/// Local storage root variable
pub const ENV_STORAGE_DIR: &str = "HARVEST_STORAGE_DIR";
/// Agent credential variable
pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";

const DEFAULT_ARTIFACT_DIR: &str = "/usr/src/app/.playwright-mcp";
const DEFAULT_OUTPUT_ROOT: &str = "/usr/src/app";
const DEFAULT_STORAGE_DIR: &str = "./storage";
const DEFAULT_PUBLISH_URL: &str = "https://styleguide.fyi";
const GENERATED_DOCUMENT: &str = "llms.txt";

const GENERATION_SUFFIX: &str = "

CRITICAL INSTRUCTIONS FOR THIS SESSION:
- You are running in an automated environment with no human interaction
- DO NOT ask clarifying questions or present options
- Work autonomously with the information provided
- When writing llms.txt, include ONLY the brand guideline markdown content
- DO NOT include system messages, tool outputs, or meta-commentary in the file
- Extract actual values from the files provided - no placeholders
- Complete the task fully before ending the session";

/// Top-level configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Scratch directory of the agent's tools, captured without filtering
    pub tool_artifact_dir: PathBuf,
    /// Shared workspace root, captured through `filter`
    pub workspace_root: PathBuf,
    /// Eligibility rules for the workspace root
    pub filter: FilterPolicy,
    /// Run id scoping stored keys
    pub run_id: Option<String>,
    /// Local storage root for stores and datasets
    pub storage_dir: PathBuf,
    /// Agent credential, never serialized
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Capture mode settings
    pub capture: CaptureSettings,
    /// Generation mode settings
    pub generation: GenerationSettings,
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("tool_artifact_dir", &self.tool_artifact_dir)
            .field("workspace_root", &self.workspace_root)
            .field("run_id", &self.run_id)
            .field("storage_dir", &self.storage_dir)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("capture", &self.capture)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl HarvestConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build configuration from process environment
    ///
    /// Unset variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = var(ENV_ARTIFACT_DIR) {
            config.tool_artifact_dir = PathBuf::from(dir);
        }
        if let Some(root) = var(ENV_OUTPUT_ROOT) {
            config = config.with_workspace_root(root);
        }
        config.run_id = ENV_RUN_ID.iter().find_map(|name| var(name));
        if let Some(dir) = var(ENV_STORAGE_DIR) {
            config.storage_dir = PathBuf::from(dir);
        }
        config.api_key = var(ENV_API_KEY);
        config
    }

    /// With tool scratch directory
    #[inline]
    #[must_use]
    pub fn with_tool_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool_artifact_dir = dir.into();
        self
    }

    /// With workspace root
    ///
    /// The generated document path follows the root.
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self.generation.output_path = self.workspace_root.join(GENERATED_DOCUMENT);
        self
    }

    /// With workspace filter
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filter: FilterPolicy) -> Self {
        self.filter = filter;
        self
    }

    /// With run id
    #[inline]
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// With storage root
    #[inline]
    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// With agent credential
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// With capture settings
    #[inline]
    #[must_use]
    pub fn with_capture(mut self, capture: CaptureSettings) -> Self {
        self.capture = capture;
        self
    }

    /// With generation settings
    #[inline]
    #[must_use]
    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    /// Run context for key derivation
    #[inline]
    #[must_use]
    pub fn run_context(&self) -> RunContext {
        RunContext::from_optional(self.run_id.clone())
    }

    /// Directories watched around every task, in storing order
    #[must_use]
    pub fn monitored_dirs(&self) -> Vec<MonitoredDir> {
        vec![
            MonitoredDir::new(
                DirectorySpec::unrestricted(self.tool_artifact_dir.clone()),
                Category::ToolArtifacts,
            ),
            MonitoredDir::new(
                DirectorySpec::filtered(self.workspace_root.clone(), self.filter.clone()),
                Category::WorkspaceOutputs,
            ),
        ]
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let workspace_root = PathBuf::from(DEFAULT_OUTPUT_ROOT);
        Self {
            tool_artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            generation: GenerationSettings {
                output_path: workspace_root.join(GENERATED_DOCUMENT),
                ..GenerationSettings::default()
            },
            workspace_root,
            filter: FilterPolicy::default(),
            run_id: None,
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            api_key: None,
            capture: CaptureSettings::default(),
        }
    }
}

/// Settings for task capture runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Model requested from the runner
    pub model: String,
    /// Tool servers made available to the agent
    pub tool_servers: BTreeMap<String, ToolServer>,
    /// Still diff and store when the task fails
    pub capture_on_failure: bool,
}

impl CaptureSettings {
    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With an extra tool server
    #[must_use]
    pub fn with_tool_server(mut self, name: impl Into<String>, server: ToolServer) -> Self {
        self.tool_servers.insert(name.into(), server);
        self
    }

    /// With best-effort capture after task failure
    #[inline]
    #[must_use]
    pub fn with_capture_on_failure(mut self, enabled: bool) -> Self {
        self.capture_on_failure = enabled;
        self
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let mut tool_servers = BTreeMap::new();
        tool_servers.insert("playwright".to_string(), ToolServer::headless_browser());
        Self {
            model: "haiku".to_string(),
            tool_servers,
            capture_on_failure: false,
        }
    }
}

/// Settings for document generation runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Model requested from the runner
    pub model: String,
    /// Text appended to the agent's system prompt
    pub system_prompt_suffix: String,
    /// Where the agent is told to write the document
    pub output_path: PathBuf,
    /// Maximum number of files quoted in the prompt
    pub max_prompt_files: usize,
    /// Maximum characters quoted per file
    pub excerpt_chars: usize,
    /// Default publish endpoint base
    pub publish_base_url: String,
    /// Name written into the document footer
    pub generator_name: String,
}

impl GenerationSettings {
    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With output path
    #[inline]
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// With prompt limits
    #[inline]
    #[must_use]
    pub fn with_prompt_limits(mut self, max_files: usize, excerpt_chars: usize) -> Self {
        self.max_prompt_files = max_files;
        self.excerpt_chars = excerpt_chars;
        self
    }

    /// With publish endpoint base
    #[inline]
    #[must_use]
    pub fn with_publish_base_url(mut self, url: impl Into<String>) -> Self {
        self.publish_base_url = url.into();
        self
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "sonnet".to_string(),
            system_prompt_suffix: GENERATION_SUFFIX.to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_ROOT).join(GENERATED_DOCUMENT),
            max_prompt_files: 10,
            excerpt_chars: 800,
            publish_base_url: DEFAULT_PUBLISH_URL.to_string(),
            generator_name: "Brand Guideline Creator".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_snapshot::MonitorMode;
    use std::collections::HashMap;
    use std::path::Path;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_container_layout() {
        let config = HarvestConfig::new();
        assert_eq!(config.tool_artifact_dir, Path::new("/usr/src/app/.playwright-mcp"));
        assert_eq!(config.workspace_root, Path::new("/usr/src/app"));
        assert_eq!(config.generation.output_path, Path::new("/usr/src/app/llms.txt"));
        assert_eq!(config.capture.model, "haiku");
        assert_eq!(config.generation.model, "sonnet");
        assert!(config.capture.tool_servers.contains_key("playwright"));
        assert!(config.run_context().is_fallback());
    }

    #[test]
    fn environment_overrides() {
        let config = HarvestConfig::from_lookup(lookup(&[
            ("PLAYWRIGHT_ARTIFACT_DIR", "/tmp/tool"),
            ("ACTOR_OUTPUT_ROOT", "/tmp/work"),
            ("APIFY_ACTOR_RUN_ID", "abc"),
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("HARVEST_STORAGE_DIR", "/tmp/storage"),
        ]));
        assert_eq!(config.tool_artifact_dir, Path::new("/tmp/tool"));
        assert_eq!(config.workspace_root, Path::new("/tmp/work"));
        assert_eq!(config.generation.output_path, Path::new("/tmp/work/llms.txt"));
        assert_eq!(config.run_context().run_id(), "abc");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.storage_dir, Path::new("/tmp/storage"));
    }

    #[test]
    fn blank_variables_are_ignored() {
        let config = HarvestConfig::from_lookup(lookup(&[("ACTOR_RUN_ID", "  "), ("ANTHROPIC_API_KEY", "")]));
        assert!(config.run_id.is_none());
        assert!(config.api_key.is_none());
    }

    #[test]
    fn monitored_dirs_order_and_modes() {
        let config = HarvestConfig::new()
            .with_tool_artifact_dir("/t")
            .with_workspace_root("/w");
        let dirs = config.monitored_dirs();
        assert_eq!(dirs[0].category, Category::ToolArtifacts);
        assert_eq!(dirs[0].spec.mode, MonitorMode::Unrestricted);
        assert_eq!(dirs[1].category, Category::WorkspaceOutputs);
        assert!(matches!(dirs[1].spec.mode, MonitorMode::Filtered(_)));
    }

    #[test]
    fn debug_redacts_credential() {
        let config = HarvestConfig::new().with_api_key("sk-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
