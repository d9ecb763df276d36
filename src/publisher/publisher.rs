//! Deduplicated publish pipeline
//!
//! [`Publisher::tweet`] announces a package version at most once:
//! look the identity key up, render, record, then post. Only the record
//! step has to be exactly-once, and the store's insert-if-absent makes it
//! so even when two calls race on the same key.

use super::feed::FeedPoster;
use super::store::{DedupRecord, DedupStore, StoreError};
use super::template::{truncate_message, FormatError, MessageTemplate};
use crate::config::PublisherConfig;
use crate::watcher::{NormalizedPackage, WatchEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Default outbound message template.
pub const DEFAULT_TEMPLATE: &str = "${name} (${version}): ${url} ${description}";

/// Default suffix for cut messages.
pub const DEFAULT_TRUNCATION_MARKER: &str = "...";

/// Default hard message length.
pub const DEFAULT_MAX_LENGTH: usize = 140;

/// Result of a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The version was new; carries the message that was recorded and posted
    Posted(String),
    /// The version had been announced before
    AlreadyPublished,
}

/// Errors that stop a publish attempt before anything is posted.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Dedup store lookup or insert failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Message could not be rendered
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Message settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherOptions {
    /// Template source
    pub template: String,
    /// Default truncation marker
    pub truncation_marker: String,
    /// Hard length limit in characters
    pub max_length: usize,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            truncation_marker: DEFAULT_TRUNCATION_MARKER.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl PublisherOptions {
    /// Options from the publisher section of the configuration.
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            template: config.template.clone(),
            truncation_marker: config.truncation_marker.clone(),
            max_length: config.max_length,
        }
    }
}

/// Store-free renderer for announcement text.
///
/// Compiles the template once and applies the length limit and truncation
/// marker. [`Publisher`] and the `render` command both format through it.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    template: MessageTemplate,
    truncation_marker: String,
    max_length: usize,
}

impl MessageFormatter {
    /// Compile the template in `options`.
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if the template does not compile
    pub fn new(options: &PublisherOptions) -> Result<Self, FormatError> {
        Ok(Self {
            template: MessageTemplate::compile(&options.template)?,
            truncation_marker: options.truncation_marker.clone(),
            max_length: options.max_length,
        })
    }

    /// Render the announcement for `pkg`.
    ///
    /// The rendered text is trimmed and, when longer than the limit, cut and
    /// suffixed with `marker` (or the configured marker when `None`). The
    /// result never exceeds the limit, whatever the marker length.
    ///
    /// # Errors
    ///
    /// Returns `FormatError::Empty` if the message would be blank
    ///
    /// # Examples
    ///
    /// ```
    /// use pkgcaster::publisher::{MessageFormatter, PublisherOptions};
    /// use pkgcaster::watcher::NormalizedPackage;
    ///
    /// let formatter = MessageFormatter::new(&PublisherOptions::default()).unwrap();
    /// let pkg = NormalizedPackage {
    ///     name: "foo".to_string(),
    ///     version: "1.0.0".to_string(),
    ///     keywords: vec![],
    ///     url: "http://x.com".to_string(),
    ///     description: String::new(),
    /// };
    /// assert_eq!(formatter.format(&pkg, None).unwrap(), "foo (1.0.0): http://x.com");
    /// ```
    pub fn format(
        &self,
        pkg: &NormalizedPackage,
        marker: Option<&str>,
    ) -> Result<String, FormatError> {
        let marker = marker.unwrap_or(&self.truncation_marker);
        let message = truncate_message(&self.template.render(pkg), self.max_length, marker);
        if message.is_empty() {
            return Err(FormatError::Empty);
        }
        Ok(message)
    }

    /// Hard length limit in characters.
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

/// Tally of a [`Publisher::run`] session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// New versions announced
    pub posted: usize,
    /// Versions skipped as already announced
    pub skipped: usize,
    /// Attempts that failed before posting
    pub failed: usize,
}

impl PublishStats {
    fn record(&mut self, joined: Result<Result<PublishOutcome, PublishError>, JoinError>) {
        match joined {
            Ok(Ok(PublishOutcome::Posted(_))) => self.posted += 1,
            Ok(Ok(PublishOutcome::AlreadyPublished)) => self.skipped += 1,
            Ok(Err(_)) => self.failed += 1,
            Err(e) => {
                error!(error = %e, "Publish task panicked");
                self.failed += 1;
            }
        }
    }
}

/// Renders, deduplicates and posts package announcements.
pub struct Publisher {
    formatter: MessageFormatter,
    store: Arc<dyn DedupStore>,
    feed: Arc<dyn FeedPoster>,
}

impl Publisher {
    /// Create a publisher.
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if the template does not compile
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use pkgcaster::publisher::{MemoryDedupStore, Publisher, PublisherOptions, RecordingFeed};
    ///
    /// let publisher = Publisher::new(
    ///     PublisherOptions::default(),
    ///     Arc::new(MemoryDedupStore::new()),
    ///     Arc::new(RecordingFeed::new()),
    /// );
    /// assert!(publisher.is_ok());
    /// ```
    pub fn new(
        options: PublisherOptions,
        store: Arc<dyn DedupStore>,
        feed: Arc<dyn FeedPoster>,
    ) -> Result<Self, FormatError> {
        Ok(Self {
            formatter: MessageFormatter::new(&options)?,
            store,
            feed,
        })
    }

    /// Render the announcement for `pkg`. See [`MessageFormatter::format`].
    ///
    /// # Errors
    ///
    /// Returns `FormatError::Empty` if the message would be blank
    pub fn create(
        &self,
        pkg: &NormalizedPackage,
        marker: Option<&str>,
    ) -> Result<String, FormatError> {
        self.formatter.format(pkg, marker)
    }

    /// Announce `pkg` unless its version was announced before.
    ///
    /// A failed post is logged and still reported as
    /// [`PublishOutcome::Posted`]: the record is already written, so the
    /// version will not be retried.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Store` if the lookup or insert fails and
    /// `PublishError::Format` if the message cannot be rendered. Nothing is
    /// posted in either case.
    pub async fn tweet(&self, pkg: &NormalizedPackage) -> Result<PublishOutcome, PublishError> {
        let key = pkg.identity_key();

        if self.store.find_by_key(&key).await?.is_some() {
            debug!(key = %key, "Already announced");
            return Ok(PublishOutcome::AlreadyPublished);
        }

        let message = self.create(pkg, None)?;

        match self.store.insert(DedupRecord::for_package(pkg, &message)).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                debug!(key = %key, "Announced concurrently by another task");
                return Ok(PublishOutcome::AlreadyPublished);
            }
            Err(e) => return Err(e.into()),
        }

        match self.feed.post(&message).await {
            Ok(ack) => info!(key = %key, id = ?ack.id, "Announcement posted"),
            Err(e) => error!(key = %key, error = %e, "Failed to post announcement"),
        }

        Ok(PublishOutcome::Posted(message))
    }

    /// Publish every item event until the channel closes.
    ///
    /// Each item is published in its own task, so a slow post never holds
    /// up the next event. Outstanding tasks are awaited before returning.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<WatchEvent>) -> PublishStats {
        let mut tasks = JoinSet::new();
        let mut stats = PublishStats::default();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(WatchEvent::Item(pkg)) => {
                        let publisher = Arc::clone(&self);
                        tasks.spawn(async move {
                            let result = publisher.tweet(&pkg).await;
                            if let Err(e) = &result {
                                warn!(key = %pkg.identity_key(), error = %e, "Publish failed");
                            }
                            result
                        });
                    }
                    Some(WatchEvent::Batch(pkgs)) => {
                        debug!(count = pkgs.len(), "Received batch");
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => stats.record(joined),
            }
        }

        while let Some(joined) = tasks.join_next().await {
            stats.record(joined);
        }

        info!(
            posted = stats.posted,
            skipped = stats.skipped,
            failed = stats.failed,
            "Publisher stopped"
        );
        stats
    }
}
