//! Checkpoint resolution and persistence
//!
//! The checkpoint is the epoch-millisecond cursor up to which the registry
//! change feed has been processed. It is persisted after every successful
//! tick so a restart resumes exactly where the previous run stopped.

use crate::error::{PkgcasterError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Epoch milliseconds.
pub type Checkpoint = i64;

/// Pick the checkpoint a freshly started watcher polls from.
///
/// A persisted value always wins; the lookback window only applies on a
/// first run.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use pkgcaster::watcher::resolve_initial_checkpoint;
/// use std::time::Duration;
///
/// let now = Utc.timestamp_millis_opt(10_000_000).unwrap();
/// let lookback = Duration::from_secs(60);
/// assert_eq!(resolve_initial_checkpoint(None, lookback, now), 9_940_000);
/// assert_eq!(resolve_initial_checkpoint(Some(42), lookback, now), 42);
/// ```
pub fn resolve_initial_checkpoint(
    persisted: Option<Checkpoint>,
    lookback: Duration,
    now: DateTime<Utc>,
) -> Checkpoint {
    persisted.unwrap_or_else(|| {
        let lookback_ms = i64::try_from(lookback.as_millis()).unwrap_or(i64::MAX);
        now.timestamp_millis().saturating_sub(lookback_ms)
    })
}

/// Durable home of the checkpoint.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the persisted checkpoint, `None` on first run.
    async fn read(&self) -> Result<Option<Checkpoint>>;

    /// Persist a new checkpoint.
    async fn write(&self, checkpoint: Checkpoint) -> Result<()>;
}

/// Checkpoint kept in a small text file holding the decimal value.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash mid-write never leaves a truncated checkpoint behind.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn read(&self) -> Result<Option<Checkpoint>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value = contents.trim().parse::<Checkpoint>().map_err(|e| {
            PkgcasterError::Config(format!(
                "Corrupt checkpoint file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(value))
    }

    async fn write(&self, checkpoint: Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, checkpoint.to_string()).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

/// In-memory checkpoint store.
///
/// Useful for one-shot runs and tests; remembers every value written.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    value: Mutex<Option<Checkpoint>>,
    history: Mutex<Vec<Checkpoint>>,
}

impl MemoryCheckpointStore {
    /// Empty store (first run).
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds `checkpoint`.
    pub fn with_value(checkpoint: Checkpoint) -> Self {
        Self {
            value: Mutex::new(Some(checkpoint)),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Current value.
    pub fn value(&self) -> Option<Checkpoint> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every value written, oldest first.
    pub fn history(&self) -> Vec<Checkpoint> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn read(&self) -> Result<Option<Checkpoint>> {
        Ok(self.value())
    }

    async fn write(&self, checkpoint: Checkpoint) -> Result<()> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(checkpoint);
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(checkpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_uses_lookback_without_persisted_value() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let lookback = Duration::from_secs(30 * 60);
        assert_eq!(
            resolve_initial_checkpoint(None, lookback, now),
            1_700_000_000_000 - 1_800_000
        );
    }

    #[test]
    fn test_resolve_persisted_value_overrides_lookback() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        // Even a value older than the lookback window is kept as is.
        assert_eq!(
            resolve_initial_checkpoint(Some(5), Duration::from_secs(60), now),
            5
        );
        assert_eq!(
            resolve_initial_checkpoint(Some(1_800_000_000_000), Duration::ZERO, now),
            1_800_000_000_000
        );
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path().join(".lastnpmsync"));
        assert_eq!(store.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join(".lastnpmsync");
        let store = FileCheckpointStore::new(&path);

        store.write(1_234).await.unwrap();
        assert_eq!(store.read().await.unwrap(), Some(1_234));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1234");

        store.write(5_678).await.unwrap();
        assert_eq!(store.read().await.unwrap(), Some(5_678));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_store_tolerates_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cp");
        std::fs::write(&path, "99\n").unwrap();
        let store = FileCheckpointStore::new(&path);
        assert_eq!(store.read().await.unwrap(), Some(99));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_contents_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cp");
        std::fs::write(&path, "yesterday").unwrap();
        let store = FileCheckpointStore::new(&path);
        assert!(store.read().await.is_err());
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let store = FileCheckpointStore::new("/var/lib/pkgcaster/.lastnpmsync");
        assert_eq!(
            store.temp_path(),
            PathBuf::from("/var/lib/pkgcaster/.lastnpmsync.tmp")
        );
    }

    #[tokio::test]
    async fn test_memory_store_tracks_history() {
        let store = MemoryCheckpointStore::with_value(10);
        assert_eq!(store.read().await.unwrap(), Some(10));
        store.write(20).await.unwrap();
        store.write(30).await.unwrap();
        assert_eq!(store.value(), Some(30));
        assert_eq!(store.history(), vec![20, 30]);
    }
}
