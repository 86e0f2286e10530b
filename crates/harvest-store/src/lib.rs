//! Harvest Store
//!
//! Deterministic naming and persistence of captured files.
//!
//! # Core Concepts
//!
//! - [`RunContext`] / [`Category`]: the scope and origin segments of a key
//! - [`KeyDeriver`]: `<runId>_<category>_<relative_path_flattened>`
//! - [`KeyValueStore`] / [`StoreProvider`]: the remote store contract
//! - [`ArtifactStore`]: writes a [`harvest_snapshot::ChangeSet`] and returns [`ArtifactRecord`]s
//!
//! Backends: [`MemoryStore`] for embedding and tests, [`FsStore`] for a local
//! storage directory.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod content_type;
mod error;
mod fs;
mod key;
mod kv;
mod memory;

pub use artifact::{ArtifactRecord, ArtifactStore, BatchError};
pub use content_type::{guess_content_type, is_textual, DEFAULT_CONTENT_TYPE};
pub use error::StoreError;
pub use fs::{FsStore, FsStoreProvider};
pub use key::{Category, KeyDeriver, RunContext, UnknownCategory, FALLBACK_RUN_ID, KEY_SEPARATOR};
pub use kv::{
    validate_key, KeyMetadata, KeyValueStore, StoreProvider, StoredValue, INPUT_KEY, MAX_KEY_BYTES,
};
pub use memory::{MemoryStore, MemoryStoreProvider, DEFAULT_STORE_ID};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
