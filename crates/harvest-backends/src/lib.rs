//! Harvest Backends
//!
//! Concrete implementations of the core seams:
//! - [`CommandRunner`]: runs tasks through the agent CLI as a child process
//! - [`HttpPublisher`]: submits generated documents over HTTP
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_backends::{CommandRunner, CommandRunnerConfig};
//! use std::time::Duration;
//!
//! let runner = CommandRunner::new(
//!     CommandRunnerConfig::new()
//!         .with_program("claude")
//!         .with_timeout(Duration::from_secs(1800)),
//! );
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod command;
mod http;

pub use command::{CommandRunner, CommandRunnerConfig, DEFAULT_PROGRAM};
pub use http::{HttpPublisher, SECRET_HEADER};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
