//! Dedup records and their store
//!
//! A [`DedupRecord`] is durable proof that a package version was announced.
//! Keys (`name@version`) are unique: once a record exists the version is
//! never announced again.

use crate::watcher::NormalizedPackage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use thiserror::Error;

/// Errors raised by a [`DedupStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record with this key already exists
    #[error("Record already exists: {0}")]
    Duplicate(String),

    /// Reading from the store failed
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// Writing to the store failed
    #[error("Insert failed: {0}")]
    Insert(String),

    /// A record could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store could not be opened
    #[error("Failed to open store: {0}")]
    Open(String),
}

/// Package fields kept alongside the announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupPayload {
    /// Package name
    pub name: String,
    /// Announced version
    pub version: String,
    /// Package description (empty when absent)
    pub description: String,
    /// Link included in the announcement
    pub url: String,
}

/// Stored announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    /// Identity key, `name@version`
    pub key: String,
    /// Message as rendered for the feed
    pub message: String,
    /// Package snapshot
    pub payload: DedupPayload,
    /// When the record was written
    pub created_at: DateTime<Utc>,
}

impl DedupRecord {
    /// Build the record announcing `pkg` with `message`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pkgcaster::publisher::DedupRecord;
    /// use pkgcaster::watcher::NormalizedPackage;
    ///
    /// let pkg = NormalizedPackage {
    ///     name: "foo".to_string(),
    ///     version: "1.0.0".to_string(),
    ///     keywords: vec![],
    ///     url: "http://x.com".to_string(),
    ///     description: String::new(),
    /// };
    /// let record = DedupRecord::for_package(&pkg, "foo (1.0.0): http://x.com");
    /// assert_eq!(record.key, "foo@1.0.0");
    /// ```
    pub fn for_package(pkg: &NormalizedPackage, message: &str) -> Self {
        Self {
            key: pkg.identity_key(),
            message: message.to_string(),
            payload: DedupPayload {
                name: pkg.name.clone(),
                version: pkg.version.clone(),
                description: pkg.description.clone(),
                url: pkg.url.clone(),
            },
            created_at: Utc::now(),
        }
    }
}

/// Durable set of announced identity keys.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Look a record up by identity key.
    async fn find_by_key(&self, key: &str) -> Result<Option<DedupRecord>, StoreError>;

    /// Insert a record whose key must not exist yet.
    ///
    /// Returns `StoreError::Duplicate` when another writer got there first.
    async fn insert(&self, record: DedupRecord) -> Result<(), StoreError>;
}

/// Dedup store backed by an embedded `sled` database.
///
/// Records are JSON-encoded and keyed by identity key. Inserts use
/// compare-and-swap against an absent value, so concurrent inserts of the
/// same key resolve to exactly one winner.
#[derive(Clone)]
pub struct SledDedupStore {
    db: Db,
}

impl SledDedupStore {
    /// Open or create a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Open` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pkgcaster::publisher::SledDedupStore;
    ///
    /// let store = SledDedupStore::new("pkgcaster.db").unwrap();
    /// ```
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { db })
    }

    /// Open a throwaway store that is removed when dropped.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Open` if the database cannot be created
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { db })
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Whether no record has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

impl std::fmt::Debug for SledDedupStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledDedupStore")
            .field("records", &self.db.len())
            .finish()
    }
}

#[async_trait]
impl DedupStore for SledDedupStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<DedupRecord>, StoreError> {
        let db = self.db.clone();
        let key = key.to_string();

        let raw = tokio::task::spawn_blocking(move || db.get(key.as_bytes()))
            .await
            .map_err(|e| StoreError::Lookup(e.to_string()))?
            .map_err(|e| StoreError::Lookup(e.to_string()))?;

        match raw {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, record: DedupRecord) -> Result<(), StoreError> {
        let db = self.db.clone();
        let key = record.key.clone();
        let value = serde_json::to_vec(&record)?;

        let swapped = tokio::task::spawn_blocking(move || {
            let swapped = db.compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(value))?;
            db.flush()?;
            Ok::<_, sled::Error>(swapped)
        })
        .await
        .map_err(|e| StoreError::Insert(e.to_string()))?
        .map_err(|e| StoreError::Insert(e.to_string()))?;

        swapped.map_err(|_| StoreError::Duplicate(record.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pkg(name: &str, version: &str) -> NormalizedPackage {
        NormalizedPackage {
            name: name.to_string(),
            version: version.to_string(),
            keywords: vec![],
            url: format!("https://npmjs.org/package/{}", name),
            description: "a package".to_string(),
        }
    }

    #[test]
    fn test_record_for_package() {
        let record = DedupRecord::for_package(&pkg("foo", "1.0.0"), "hello");
        assert_eq!(record.key, "foo@1.0.0");
        assert_eq!(record.message, "hello");
        assert_eq!(record.payload.description, "a package");
        assert_eq!(record.payload.url, "https://npmjs.org/package/foo");
    }

    #[tokio::test]
    async fn test_sled_insert_then_find() {
        let store = SledDedupStore::temporary().unwrap();
        assert!(store.is_empty());
        assert!(store.find_by_key("foo@1.0.0").await.unwrap().is_none());

        let record = DedupRecord::for_package(&pkg("foo", "1.0.0"), "hello");
        store.insert(record.clone()).await.unwrap();

        let found = store.find_by_key("foo@1.0.0").await.unwrap();
        assert_eq!(found, Some(record));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sled_duplicate_insert_rejected() {
        let store = SledDedupStore::temporary().unwrap();
        store
            .insert(DedupRecord::for_package(&pkg("foo", "1.0.0"), "first"))
            .await
            .unwrap();

        let result = store
            .insert(DedupRecord::for_package(&pkg("foo", "1.0.0"), "second"))
            .await;
        assert!(matches!(result, Err(StoreError::Duplicate(ref key)) if key == "foo@1.0.0"));

        let kept = store.find_by_key("foo@1.0.0").await.unwrap().unwrap();
        assert_eq!(kept.message, "first");
    }

    #[tokio::test]
    async fn test_sled_versions_are_distinct_keys() {
        let store = SledDedupStore::temporary().unwrap();
        store
            .insert(DedupRecord::for_package(&pkg("foo", "1.0.0"), "a"))
            .await
            .unwrap();
        store
            .insert(DedupRecord::for_package(&pkg("foo", "1.0.1"), "b"))
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_sled_concurrent_inserts_have_one_winner() {
        let store = Arc::new(SledDedupStore::temporary().unwrap());
        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .insert(DedupRecord::for_package(&pkg("race", "1.0.0"), &i.to_string()))
                    .await
            }));
        }

        let mut winners = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => winners += 1,
                Err(StoreError::Duplicate(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(winners, 1);
    }
}
