//! Checkpointed registry watcher
//!
//! This module provides the polling service that:
//! 1. Resolves its starting checkpoint (persisted value, else lookback)
//! 2. Polls the registry change feed on a fixed interval
//! 3. Normalizes and filters the returned packages
//! 4. Emits a batch event and one item event per match
//! 5. Advances and persists the checkpoint

use super::checkpoint::{resolve_initial_checkpoint, Checkpoint, CheckpointStore};
use super::filter::{accept_all, PackagePredicate};
use super::package::{is_metadata_key, normalize, NormalizedPackage, DEFAULT_WEBSITE_BASE};
use crate::config::RegistryConfig;
use crate::registry::{RegistryError, RegistryPort, RegistryQuery};
use anyhow::Result;
use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, info_span, warn, Instrument};

/// Response key carrying the change feed cursor.
pub const UPDATED_KEY: &str = "_updated";

/// Events emitted by the watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// All packages that passed the filter in one tick, in registry order.
    /// Fired once per successful tick, possibly empty.
    Batch(Vec<NormalizedPackage>),
    /// One matching package. Fired after the tick's batch, in order.
    Item(NormalizedPackage),
}

/// Why a tick was skipped without touching the checkpoint.
#[derive(Debug)]
pub enum SkipReason {
    /// The registry could not be reached or timed out
    Transport(RegistryError),
    /// The registry answered with a non-success status
    BadStatus(u16),
    /// The payload was absent or not shaped like a change feed
    Malformed(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Transport(e) => write!(f, "transport failure: {}", e),
            SkipReason::BadStatus(status) => write!(f, "bad status code: {}", status),
            SkipReason::Malformed(what) => write!(f, "malformed payload: {}", what),
        }
    }
}

/// Result of one poll-filter-emit cycle.
#[derive(Debug)]
pub enum TickOutcome {
    /// The tick completed and the checkpoint moved from `from` to `to`.
    Advanced {
        /// Checkpoint the tick polled with
        from: Checkpoint,
        /// Checkpoint after the tick
        to: Checkpoint,
        /// Number of packages that passed the filter
        emitted: usize,
    },
    /// Nothing was emitted and the checkpoint is unchanged.
    Skipped(SkipReason),
}

impl TickOutcome {
    /// Whether the tick advanced the checkpoint.
    pub fn is_advanced(&self) -> bool {
        matches!(self, TickOutcome::Advanced { .. })
    }
}

/// Watcher settings.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Registry base URL
    pub base_url: String,
    /// Change feed query path
    pub path: String,
    /// How far back to start when no checkpoint exists
    pub lookback: Duration,
    /// Time between polls
    pub interval: Duration,
    /// Prefix of the fallback package page link
    pub website_base: String,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            base_url: "http://registry.npmjs.org".to_string(),
            path: "/-/all/since/".to_string(),
            lookback: Duration::from_secs(30 * 60),
            interval: Duration::from_secs(15 * 60),
            website_base: DEFAULT_WEBSITE_BASE.to_string(),
        }
    }
}

impl WatcherOptions {
    /// Build options from the registry section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the lookback or interval cannot be parsed
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            path: config.path.clone(),
            lookback: config.lookback_duration()?,
            interval: config.interval_duration()?,
            website_base: config.website_base.clone(),
        })
    }
}

/// Registry watcher with a persisted checkpoint.
///
/// The watcher is the only writer of the checkpoint. Subscribers receive
/// events over unbounded channels, so emitting never waits on downstream
/// work and the next tick is not held back by slow publishing.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use pkgcaster::registry::HttpRegistry;
/// use pkgcaster::watcher::{FileCheckpointStore, WatchEvent, Watcher, WatcherOptions};
///
/// # async fn example() -> anyhow::Result<()> {
/// let registry = Arc::new(HttpRegistry::new(std::time::Duration::from_secs(30))?);
/// let checkpoints = Arc::new(FileCheckpointStore::new(".lastnpmsync"));
/// let mut watcher = Watcher::new(WatcherOptions::default(), registry, checkpoints).await;
/// let mut events = watcher.subscribe();
/// let _handle = watcher.spawn();
///
/// while let Some(event) = events.recv().await {
///     if let WatchEvent::Item(pkg) = event {
///         println!("{}@{}", pkg.name, pkg.version);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Watcher {
    options: WatcherOptions,
    registry: Arc<dyn RegistryPort>,
    checkpoints: Arc<dyn CheckpointStore>,
    predicate: PackagePredicate,
    checkpoint: Checkpoint,
    subscribers: Vec<mpsc::UnboundedSender<WatchEvent>>,
}

impl Watcher {
    /// Create a watcher, resolving its starting checkpoint.
    ///
    /// A persisted checkpoint always wins over the lookback window. An
    /// unreadable checkpoint is logged and treated as absent.
    ///
    /// # Arguments
    ///
    /// * `options` - Registry location, lookback and interval
    /// * `registry` - Port used to fetch the change feed
    /// * `checkpoints` - Durable checkpoint storage
    pub async fn new(
        options: WatcherOptions,
        registry: Arc<dyn RegistryPort>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        let persisted = match checkpoints.read().await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted checkpoint, using lookback window");
                None
            }
        };

        let checkpoint = resolve_initial_checkpoint(persisted, options.lookback, Utc::now());

        info!(
            checkpoint = checkpoint,
            resumed = persisted.is_some(),
            registry = %options.base_url,
            "Watcher initialized"
        );

        Self {
            options,
            registry,
            checkpoints,
            predicate: accept_all(),
            checkpoint,
            subscribers: Vec::new(),
        }
    }

    /// Replace the package predicate (default: accept everything).
    pub fn with_filter(mut self, predicate: PackagePredicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Current checkpoint.
    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    /// Watcher settings.
    pub fn options(&self) -> &WatcherOptions {
        &self.options
    }

    /// Attach a new event subscriber.
    ///
    /// Events emitted after this call are delivered in order. Dropping the
    /// receiver detaches the subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<WatchEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.push(sender);
        receiver
    }

    /// Run one poll-filter-emit cycle.
    ///
    /// Failures never escape: a transport error, bad status or malformed
    /// payload leaves the checkpoint untouched and is reported as
    /// [`TickOutcome::Skipped`].
    pub async fn poll_once(&mut self) -> TickOutcome {
        let span = info_span!("tick", since = self.checkpoint);
        self.tick().instrument(span).await
    }

    async fn tick(&mut self) -> TickOutcome {
        let query = RegistryQuery::new(&self.options.base_url, &self.options.path, self.checkpoint);

        let response = match self.registry.get(&query).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Registry request failed, skipping tick");
                return TickOutcome::Skipped(SkipReason::Transport(e));
            }
        };

        if !response.is_success() {
            warn!(status = response.status, "Bad status code from registry, skipping tick");
            return TickOutcome::Skipped(SkipReason::BadStatus(response.status));
        }

        let body = match response.body {
            Some(JsonValue::Object(body)) => body,
            Some(_) => {
                debug!("Registry payload is not an object, skipping tick");
                return TickOutcome::Skipped(SkipReason::Malformed("payload is not an object"));
            }
            None => {
                debug!("Registry returned no payload, skipping tick");
                return TickOutcome::Skipped(SkipReason::Malformed("payload is absent"));
            }
        };

        let Some(updated) = body.get(UPDATED_KEY).and_then(cursor_value) else {
            warn!("Registry payload has no usable {} cursor, skipping tick", UPDATED_KEY);
            return TickOutcome::Skipped(SkipReason::Malformed("missing update cursor"));
        };

        let packages = self.collect_packages(&body);
        let emitted = packages.len();

        self.emit(WatchEvent::Batch(packages.clone()));
        for pkg in packages {
            self.emit(WatchEvent::Item(pkg));
        }

        let from = self.checkpoint;
        if updated < from {
            warn!(
                cursor = updated,
                checkpoint = from,
                "Registry cursor is behind the checkpoint, keeping checkpoint"
            );
        }
        let to = from.max(updated);
        self.checkpoint = to;

        if let Err(e) = self.checkpoints.write(to).await {
            warn!(error = %e, checkpoint = to, "Failed to persist checkpoint");
        }

        info!(
            candidates = body.len(),
            matched = emitted,
            checkpoint = to,
            "Tick complete"
        );

        TickOutcome::Advanced { from, to, emitted }
    }

    fn collect_packages(&self, body: &Map<String, JsonValue>) -> Vec<NormalizedPackage> {
        body.iter()
            .filter(|(key, _)| !is_metadata_key(key))
            .filter_map(|(key, doc)| {
                let pkg = normalize(key, doc, &self.options.website_base);
                if pkg.is_none() {
                    debug!(package = %key, "Skipping entry without a latest version");
                }
                pkg
            })
            .filter(|pkg| (self.predicate)(pkg))
            .collect()
    }

    fn emit(&mut self, event: WatchEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Start polling in a background task.
    ///
    /// The first poll happens immediately; later polls follow the configured
    /// interval. A poll that overruns the interval delays the next one rather
    /// than triggering a burst.
    ///
    /// Only [`WatcherHandle::shutdown`] stops the loop. Dropping the handle
    /// detaches the task, which keeps polling for the life of the runtime.
    pub fn spawn(mut self) -> WatcherHandle {
        let (sender, mut receiver) = mpsc::channel::<()>(1);
        let interval = self.options.interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut attached = true;

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        self.poll_once().await;
                    }
                    stop = receiver.recv(), if attached => match stop {
                        Some(()) => {
                            info!(checkpoint = self.checkpoint, "Watcher stopped");
                            break;
                        }
                        None => {
                            debug!("Watcher handle dropped, polling continues");
                            attached = false;
                        }
                    },
                }
            }
        });

        WatcherHandle { sender, task }
    }
}

// The registry has reported the cursor both as an integer and as a float.
fn cursor_value(value: &JsonValue) -> Option<Checkpoint> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as Checkpoint))
}

/// Handle to a spawned watcher.
#[must_use = "dropping the handle detaches the watcher; call shutdown to stop it"]
pub struct WatcherHandle {
    sender: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Stop the polling loop and wait for the current tick to finish.
    pub async fn shutdown(self) {
        let _ = self.sender.send(()).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "Watcher task ended abnormally");
        }
    }
}
