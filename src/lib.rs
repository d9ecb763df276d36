//! pkgcaster - package registry announcement bridge
//!
//! This library polls a package registry's change feed for recently updated
//! packages, filters them, and announces new releases on a social feed
//! exactly once per `name@version`.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `registry`: Registry port and its HTTP implementation
//! - `watcher`: Checkpointed polling, package normalization and filtering
//! - `publisher`: Dedup store, message templates and the feed-posting port
//! - `commands`: Handlers for the CLI subcommands
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pkgcaster::registry::HttpRegistry;
//! use pkgcaster::watcher::{MemoryCheckpointStore, Watcher, WatcherOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = WatcherOptions::default();
//!     let registry = Arc::new(HttpRegistry::new(std::time::Duration::from_secs(30))?);
//!     let checkpoints = Arc::new(MemoryCheckpointStore::new());
//!     let mut watcher = Watcher::new(options, registry, checkpoints).await;
//!     let _events = watcher.subscribe();
//!     let handle = watcher.spawn();
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod publisher;
pub mod registry;
pub mod watcher;

// Re-export commonly used types
pub use config::Config;
pub use error::{PkgcasterError, Result};
pub use publisher::{PublishOutcome, Publisher};
pub use watcher::{NormalizedPackage, WatchEvent, Watcher};
