//! Deterministic storage keys
//!
//! Key grammar: `<runId>_<category>_<relativePath>` where path separators in
//! the relative path are replaced by `_`. Empty segments are omitted.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, MAIN_SEPARATOR};
use std::str::FromStr;

/// Run identifier used when none is available
pub const FALLBACK_RUN_ID: &str = "run";

/// Segment joiner and separator replacement
pub const KEY_SEPARATOR: char = '_';

/// Identifier scoping every key produced by one invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunContext {
    run_id: String,
}

impl RunContext {
    /// Create context from an explicit id
    ///
    /// A blank id falls back to [`FALLBACK_RUN_ID`].
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self::from_optional(Some(run_id.into()))
    }

    /// Create context from an id that may be unavailable
    #[must_use]
    pub fn from_optional(run_id: Option<String>) -> Self {
        let run_id = run_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| FALLBACK_RUN_ID.to_string());
        Self { run_id }
    }

    /// The run id
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Check whether the sentinel id is in use
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.run_id == FALLBACK_RUN_ID
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::from_optional(None)
    }
}

impl Display for RunContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.run_id)
    }
}

/// Origin label of a captured artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Scratch directory owned by the agent's tools
    #[serde(rename = "tool-artifacts")]
    ToolArtifacts,
    /// Shared workspace root
    #[serde(rename = "workspace-outputs")]
    WorkspaceOutputs,
}

impl Category {
    /// Label used in keys and records
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToolArtifacts => "tool-artifacts",
            Self::WorkspaceOutputs => "workspace-outputs",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tool-artifacts" => Ok(Self::ToolArtifacts),
            "workspace-outputs" => Ok(Self::WorkspaceOutputs),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

/// Unrecognized category label
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: '{0}'")]
pub struct UnknownCategory(pub String);

/// Turns captured file paths into flat storage keys
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDeriver;

impl KeyDeriver {
    /// Derive the key for `file` captured under `base`
    ///
    /// Pure: the same inputs always yield the same key. A file outside
    /// `base` is keyed by its file name alone.
    #[must_use]
    pub fn derive(run_id: &str, category: &str, base: &Path, file: &Path) -> String {
        let clean = Self::flatten(base, file);
        [run_id, category, clean.as_str()]
            .iter()
            .filter(|segment| !segment.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(&KEY_SEPARATOR.to_string())
    }

    /// Derive with typed context and category
    #[inline]
    #[must_use]
    pub fn derive_for(run: &RunContext, category: Category, base: &Path, file: &Path) -> String {
        Self::derive(run.run_id(), category.as_str(), base, file)
    }

    /// Relative path as a single token
    #[must_use]
    pub fn flatten(base: &Path, file: &Path) -> String {
        match file.strip_prefix(base) {
            Ok(relative) => relative
                .to_string_lossy()
                .replace(MAIN_SEPARATOR, &KEY_SEPARATOR.to_string()),
            Err(_) => file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn run_context_fallback() {
        assert_eq!(RunContext::from_optional(None).run_id(), "run");
        assert_eq!(RunContext::new("  ").run_id(), "run");
        assert!(RunContext::default().is_fallback());
        assert_eq!(RunContext::new("abc123").run_id(), "abc123");
        assert!(!RunContext::new("abc123").is_fallback());
    }

    #[test]
    fn category_labels() {
        assert_eq!(Category::ToolArtifacts.as_str(), "tool-artifacts");
        assert_eq!(Category::WorkspaceOutputs.to_string(), "workspace-outputs");
        assert_eq!("tool-artifacts".parse::<Category>().unwrap(), Category::ToolArtifacts);
        assert!("workspace".parse::<Category>().is_err());
        assert_eq!(
            serde_json::to_string(&Category::WorkspaceOutputs).unwrap(),
            "\"workspace-outputs\""
        );
    }

    #[test]
    fn derive_nested_path() {
        let base = PathBuf::from("/work");
        let file = base.join("out").join("report.md");
        assert_eq!(
            KeyDeriver::derive("run123", "workspace-outputs", &base, &file),
            "run123_workspace-outputs_out_report.md"
        );
    }

    #[test]
    fn derive_outside_base_uses_file_name() {
        let key = KeyDeriver::derive(
            "r",
            "tool-artifacts",
            Path::new("/tool"),
            Path::new("/elsewhere/deep/shot.png"),
        );
        assert_eq!(key, "r_tool-artifacts_shot.png");
    }

    #[test]
    fn derive_omits_empty_segments() {
        let key = KeyDeriver::derive("", "workspace-outputs", Path::new("/w"), Path::new("/w/a.txt"));
        assert_eq!(key, "workspace-outputs_a.txt");

        let key = KeyDeriver::derive("r", "", Path::new("/w"), Path::new("/w/a.txt"));
        assert_eq!(key, "r_a.txt");
    }

    #[test]
    fn derive_for_matches_derive() {
        let run = RunContext::new("xyz");
        let base = Path::new("/tool");
        let file = Path::new("/tool/t/trace.zip");
        assert_eq!(
            KeyDeriver::derive_for(&run, Category::ToolArtifacts, base, file),
            KeyDeriver::derive("xyz", "tool-artifacts", base, file)
        );
    }
}
