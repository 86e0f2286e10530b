//! Eligibility rules for monitored directories
//!
//! Provides [`DirectorySpec`] (a root plus its [`MonitorMode`]) and
//! [`PathFilter`], which decides whether a filesystem entry may appear in a
//! snapshot and whether a directory may be descended into at all.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Extensions admitted in filtered mode (lowercase, no leading dot)
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    "html", "htm", "md", "markdown", "txt", "json", "csv", "yaml", "yml", "pdf", "png", "jpg",
    "jpeg", "gif", "webp", "bmp", "svg", "zip",
];

/// Directory names pruned in filtered mode
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".apify_storage",
    ".cache",
    ".config",
    ".git",
    ".local",
    ".npm",
    ".playwright-mcp",
    ".venv",
    "__pycache__",
    "node_modules",
    "src",
    "venv",
];

/// Allow-list and exclude-list applied in filtered mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPolicy {
    /// Lowercase extensions without the leading dot
    pub allowed_extensions: BTreeSet<String>,
    /// Directory names whose subtrees are never visited
    pub excluded_dirs: BTreeSet<String>,
}

impl FilterPolicy {
    /// Create policy from explicit sets
    ///
    /// Extensions are normalized: lowercased, leading dot stripped.
    #[must_use]
    pub fn new<E, D>(allowed_extensions: E, excluded_dirs: D) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| !ext.is_empty())
                .collect(),
            excluded_dirs: excluded_dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Add an allowed extension
    #[inline]
    #[must_use]
    pub fn with_extension(mut self, ext: &str) -> Self {
        let ext = normalize_extension(ext);
        if !ext.is_empty() {
            self.allowed_extensions.insert(ext);
        }
        self
    }

    /// Add an excluded directory name
    #[inline]
    #[must_use]
    pub fn with_excluded_dir(mut self, name: impl Into<String>) -> Self {
        self.excluded_dirs.insert(name.into());
        self
    }

    /// Check whether the file name carries an allowed extension
    #[must_use]
    pub fn allows_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.allowed_extensions.contains(&ext.to_lowercase()))
    }

    /// Check whether a directory name is excluded
    #[inline]
    #[must_use]
    pub fn excludes_dir(&self, name: &str) -> bool {
        self.excluded_dirs.contains(name)
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_ALLOWED_EXTENSIONS.iter().copied(),
            DEFAULT_EXCLUDED_DIRS.iter().map(|s| (*s).to_string()),
        )
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// How a monitored root decides which files are eligible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MonitorMode {
    /// Every regular file under the root
    Unrestricted,
    /// Only allowed extensions outside excluded directories
    Filtered(FilterPolicy),
}

impl MonitorMode {
    /// Filtered mode with the default policy
    #[inline]
    #[must_use]
    pub fn filtered() -> Self {
        Self::Filtered(FilterPolicy::default())
    }

    /// Short name of the mode
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::Filtered(_) => "filtered",
        }
    }
}

impl Display for MonitorMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MonitorMode {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unrestricted" => Ok(Self::Unrestricted),
            "filtered" => Ok(Self::filtered()),
            other => Err(SnapshotError::UnknownMode(other.to_string())),
        }
    }
}

/// A monitored root together with its eligibility policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySpec {
    /// Root of the monitored tree
    pub root: PathBuf,
    /// Eligibility policy
    pub mode: MonitorMode,
}

impl DirectorySpec {
    /// Create spec from root and mode
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, mode: MonitorMode) -> Self {
        Self {
            root: root.into(),
            mode,
        }
    }

    /// Every regular file under `root` is eligible
    #[inline]
    #[must_use]
    pub fn unrestricted(root: impl Into<PathBuf>) -> Self {
        Self::new(root, MonitorMode::Unrestricted)
    }

    /// Filtered by the given policy
    #[inline]
    #[must_use]
    pub fn filtered(root: impl Into<PathBuf>, policy: FilterPolicy) -> Self {
        Self::new(root, MonitorMode::Filtered(policy))
    }
}

/// Decides which entries a snapshot may contain
///
/// Stateless: every decision depends only on the path and the
/// [`DirectorySpec`] it is evaluated against.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathFilter;

impl PathFilter {
    /// Check whether `path` is eligible for capture under `spec`
    ///
    /// The entry is re-checked on disk: it must currently be a regular file
    /// (symbolic links and vanished files are not eligible).
    #[must_use]
    pub fn eligible(path: &Path, spec: &DirectorySpec) -> bool {
        let is_regular = fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_file());
        is_regular && Self::admits_file_name(path, spec)
    }

    /// Name-based part of the eligibility test (no filesystem access)
    #[must_use]
    pub fn admits_file_name(path: &Path, spec: &DirectorySpec) -> bool {
        match &spec.mode {
            MonitorMode::Unrestricted => true,
            MonitorMode::Filtered(policy) => {
                policy.allows_extension(path) && !Self::passes_excluded_dir(path, spec, policy)
            }
        }
    }

    /// Check whether traversal may descend into `dir`
    ///
    /// The root itself is always entered. In filtered mode a directory whose
    /// own name is excluded is pruned together with its whole subtree.
    #[must_use]
    pub fn may_descend(dir: &Path, spec: &DirectorySpec) -> bool {
        match &spec.mode {
            MonitorMode::Unrestricted => true,
            MonitorMode::Filtered(policy) => {
                if dir == spec.root {
                    return true;
                }
                dir.file_name()
                    .and_then(|name| name.to_str())
                    .map_or(true, |name| !policy.excludes_dir(name))
            }
        }
    }

    // Components strictly between the root and the file name.
    fn passes_excluded_dir(path: &Path, spec: &DirectorySpec, policy: &FilterPolicy) -> bool {
        let Ok(relative) = path.strip_prefix(&spec.root) else {
            return false;
        };
        let mut components: Vec<Component<'_>> = relative.components().collect();
        components.pop();
        components.iter().any(|component| match component {
            Component::Normal(name) => name.to_str().is_some_and(|n| policy.excludes_dir(n)),
            _ => false,
        })
    }
}

/// Errors in snapshot configuration
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Unknown monitoring mode name
    #[error("unknown monitor mode: '{0}' (expected 'unrestricted' or 'filtered')")]
    UnknownMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> DirectorySpec {
        DirectorySpec::filtered("/work", FilterPolicy::default())
    }

    #[test]
    fn default_policy_matches_known_sets() {
        let policy = FilterPolicy::default();
        assert_eq!(policy.allowed_extensions.len(), DEFAULT_ALLOWED_EXTENSIONS.len());
        assert!(policy.excludes_dir("node_modules"));
        assert!(policy.excludes_dir(".git"));
        assert!(!policy.excludes_dir("out"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let policy = FilterPolicy::default();
        assert!(policy.allows_extension(Path::new("/work/REPORT.MD")));
        assert!(policy.allows_extension(Path::new("/work/shot.PnG")));
        assert!(!policy.allows_extension(Path::new("/work/main.py")));
        assert!(!policy.allows_extension(Path::new("/work/Makefile")));
    }

    #[test]
    fn policy_normalizes_extensions() {
        let policy = FilterPolicy::new([".TXT", "md", ""], Vec::<String>::new());
        assert!(policy.allowed_extensions.contains("txt"));
        assert!(policy.allowed_extensions.contains("md"));
        assert_eq!(policy.allowed_extensions.len(), 2);

        let policy = policy.with_extension(".Rs").with_excluded_dir("target");
        assert!(policy.allowed_extensions.contains("rs"));
        assert!(policy.excludes_dir("target"));
    }

    #[test]
    fn filtered_rejects_files_below_excluded_dirs() {
        let spec = workspace();
        assert!(PathFilter::admits_file_name(Path::new("/work/out/report.md"), &spec));
        assert!(!PathFilter::admits_file_name(
            Path::new("/work/node_modules/pkg/readme.md"),
            &spec
        ));
        assert!(!PathFilter::admits_file_name(Path::new("/work/a/.cache/b/c.json"), &spec));
    }

    #[test]
    fn excluded_name_only_matters_for_directories() {
        // A file literally called "src.md" at the root is fine.
        let spec = workspace();
        assert!(PathFilter::admits_file_name(Path::new("/work/src.md"), &spec));
    }

    #[test]
    fn root_is_always_descended() {
        let spec = DirectorySpec::filtered("/work/src", FilterPolicy::default());
        assert!(PathFilter::may_descend(Path::new("/work/src"), &spec));
        assert!(!PathFilter::may_descend(Path::new("/work/src/src"), &spec));
    }

    #[test]
    fn unrestricted_admits_any_name() {
        let spec = DirectorySpec::unrestricted("/tool");
        assert!(PathFilter::admits_file_name(Path::new("/tool/.git/trace.bin"), &spec));
        assert!(PathFilter::may_descend(Path::new("/tool/node_modules"), &spec));
    }

    #[test]
    fn eligible_requires_existing_regular_file() {
        let spec = DirectorySpec::unrestricted("/definitely/not/here");
        assert!(!PathFilter::eligible(Path::new("/definitely/not/here/a.txt"), &spec));
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("unrestricted".parse::<MonitorMode>().unwrap(), MonitorMode::Unrestricted);
        assert_eq!(" Filtered ".parse::<MonitorMode>().unwrap(), MonitorMode::filtered());
        assert!(matches!(
            "sometimes".parse::<MonitorMode>(),
            Err(SnapshotError::UnknownMode(_))
        ));
    }

    #[test]
    fn mode_display() {
        assert_eq!(MonitorMode::Unrestricted.to_string(), "unrestricted");
        assert_eq!(MonitorMode::filtered().to_string(), "filtered");
    }
}
