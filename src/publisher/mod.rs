//! Publisher module for announcing new package versions
//!
//! This module turns watcher events into social feed posts, announcing each
//! `name@version` at most once.
//!
//! # Modules
//!
//! - [`template`]: Message templates and truncation
//! - [`store`]: Dedup records and the sled-backed store
//! - [`feed`]: Feed port and HTTP client
//! - [`publisher`]: The deduplicated publish pipeline
//! - [`fake`]: In-memory store and feed doubles

pub mod fake;
pub mod feed;
#[allow(clippy::module_inception)]
pub mod publisher;
pub mod store;
pub mod template;

pub use fake::{MemoryDedupStore, RecordingFeed};
pub use feed::{FeedAck, FeedError, FeedPoster, HttpFeedPoster};
pub use publisher::{
    MessageFormatter, PublishError, PublishOutcome, PublishStats, Publisher, PublisherOptions,
    DEFAULT_MAX_LENGTH, DEFAULT_TEMPLATE, DEFAULT_TRUNCATION_MARKER,
};
pub use store::{DedupPayload, DedupRecord, DedupStore, SledDedupStore, StoreError};
pub use template::{truncate_message, FormatError, MessageTemplate};
