//! Watcher module for monitoring the registry change feed
//!
//! This module polls the registry for packages updated since a persisted
//! checkpoint, normalizes and filters them, and emits them to subscribers.
//!
//! # Overview
//!
//! The watcher is an autonomous component that:
//! 1. Resolves where to resume from (checkpoint file or lookback window)
//! 2. Polls the registry change feed on a fixed interval
//! 3. Normalizes raw package documents
//! 4. Filters packages by name, keyword and blocklist
//! 5. Emits matches and advances the checkpoint
//!
//! # Modules
//!
//! - [`blocklist`]: Names that are never announced
//! - [`checkpoint`]: Checkpoint resolution and persistence
//! - [`filter`]: Package filtering by name pattern and keywords
//! - [`logging`]: Structured logging configuration
//! - [`package`]: Package normalization and URL selection
//! - [`watcher`]: The polling service itself

pub mod blocklist;
pub mod checkpoint;
pub mod filter;
pub mod logging;
pub mod package;
#[allow(clippy::module_inception)]
pub mod watcher;

pub use blocklist::{Blocklist, BlocklistError};
pub use checkpoint::{
    resolve_initial_checkpoint, Checkpoint, CheckpointStore, FileCheckpointStore,
    MemoryCheckpointStore,
};
pub use filter::{accept_all, PackageFilter, PackagePredicate};
pub use package::{keyword_filter, normalize, KeywordSet, NormalizedPackage};
pub use watcher::{SkipReason, TickOutcome, WatchEvent, Watcher, WatcherHandle, WatcherOptions};
