//! Harvest Snapshot
//!
//! Change detection for monitored directories.
//!
//! # Core Concepts
//!
//! - [`DirectorySpec`]: a monitored root plus its [`MonitorMode`]
//! - [`PathFilter`]: eligibility and pruning rules
//! - [`Snapshot`]: eligible file → modification time (ns)
//! - [`SnapshotTaker`]: walks a tree into a snapshot
//! - [`ChangeSet`] / [`SnapshotDiffer`]: additions and modifications between two snapshots
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_snapshot::{DirectorySpec, FilterPolicy, SnapshotDiffer, SnapshotTaker};
//!
//! let spec = DirectorySpec::filtered("/usr/src/app", FilterPolicy::default());
//! let taker = SnapshotTaker::new();
//!
//! let before = taker.take(&spec);
//! run_something();
//! let after = taker.take(&spec);
//!
//! for path in SnapshotDiffer::diff(&before, &after).iter() {
//!     println!("changed: {}", path.display());
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod diff;
mod filter;
mod snapshot;

pub use diff::{ChangeSet, SnapshotDiffer};
pub use filter::{
    DirectorySpec, FilterPolicy, MonitorMode, PathFilter, SnapshotError,
    DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_EXCLUDED_DIRS,
};
pub use snapshot::{timestamp_nanos, Snapshot, SnapshotTaker, Timestamp};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
