//! Point-in-time listings of monitored trees
//!
//! A [`Snapshot`] maps each eligible file to its modification time in
//! nanoseconds. Snapshots are immutable values: taking a new one never
//! touches an older one.

use crate::filter::{DirectorySpec, PathFilter};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Modification time in nanoseconds relative to the Unix epoch
///
/// Signed so that pre-epoch timestamps stay distinguishable.
pub type Timestamp = i128;

/// Mapping from absolute file path to modification timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: HashMap<PathBuf, Timestamp>,
}

impl Snapshot {
    /// Empty snapshot
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Timestamp recorded for `path`
    #[inline]
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Timestamp> {
        self.entries.get(path).copied()
    }

    /// Check whether `path` is present
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of files
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no files were recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(path, timestamp)` pairs in arbitrary order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&Path, Timestamp)> {
        self.entries.iter().map(|(p, t)| (p.as_path(), *t))
    }

    /// Entries sorted by path
    #[must_use]
    pub fn sorted(&self) -> Vec<(&Path, Timestamp)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl FromIterator<(PathBuf, Timestamp)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (PathBuf, Timestamp)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Walks a monitored tree and records eligible files
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotTaker;

impl SnapshotTaker {
    /// Create a taker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Take a snapshot of `spec.root`
    ///
    /// A missing root yields an empty snapshot. Excluded directories are
    /// pruned before descent; symbolic links are never followed; entries that
    /// vanish or cannot be read during the walk are skipped.
    #[must_use]
    pub fn take(&self, spec: &DirectorySpec) -> Snapshot {
        if !spec.root.exists() {
            tracing::debug!(root = %spec.root.display(), "monitored root missing, empty snapshot");
            return Snapshot::empty();
        }

        let mut entries = HashMap::new();
        let walker = WalkDir::new(&spec.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                !entry.file_type().is_dir() || PathFilter::may_descend(entry.path(), spec)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::trace!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !PathFilter::admits_file_name(path, spec) {
                continue;
            }
            // The file may disappear between listing and stat.
            match fs::symlink_metadata(path).and_then(|meta| meta.modified()) {
                Ok(modified) => {
                    entries.insert(path.to_path_buf(), timestamp_nanos(modified));
                }
                Err(err) => {
                    tracing::trace!(path = %path.display(), error = %err, "file vanished during walk");
                }
            }
        }

        tracing::debug!(
            root = %spec.root.display(),
            mode = %spec.mode,
            files = entries.len(),
            "snapshot taken"
        );
        Snapshot { entries }
    }
}

/// Convert a modification time to signed nanoseconds since the epoch
#[must_use]
pub fn timestamp_nanos(time: SystemTime) -> Timestamp {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i128::try_from(after.as_nanos()).unwrap_or(i128::MAX),
        Err(err) => -i128::try_from(err.duration().as_nanos()).unwrap_or(i128::MAX),
    }
}
