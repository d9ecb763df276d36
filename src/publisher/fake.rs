//! In-process store and feed doubles
//!
//! Both keep everything in memory and can be told to fail, so the publish
//! pipeline's error paths can be driven without a database or network.

use super::feed::{FeedAck, FeedError, FeedPoster};
use super::store::{DedupRecord, DedupStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Dedup store held in a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    records: Mutex<HashMap<String, DedupRecord>>,
    fail_lookup: AtomicBool,
    fail_insert: AtomicBool,
    stale_lookups: AtomicBool,
}

impl MemoryDedupStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every lookup fail.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }

    /// Make every insert fail.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    /// Make lookups miss even when the key exists, as if another writer
    /// inserted it between lookup and insert.
    pub fn stale_lookups(&self, stale: bool) {
        self.stale_lookups.store(stale, Ordering::SeqCst);
    }

    /// Stored record for `key`, bypassing the failure switches.
    pub fn get(&self, key: &str) -> Option<DedupRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<DedupRecord>, StoreError> {
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Lookup("lookup disabled".to_string()));
        }
        if self.stale_lookups.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.get(key))
    }

    async fn insert(&self, record: DedupRecord) -> Result<(), StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Insert("insert disabled".to_string()));
        }
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&record.key) {
            return Err(StoreError::Duplicate(record.key));
        }
        records.insert(record.key.clone(), record);
        Ok(())
    }
}

/// Feed that records every posted message.
#[derive(Debug, Default)]
pub struct RecordingFeed {
    posts: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingFeed {
    /// Feed accepting every post.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every post fail with an API error.
    pub fn fail_posts(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Messages posted so far, oldest first.
    pub fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl FeedPoster for RecordingFeed {
    async fn post(&self, message: &str) -> Result<FeedAck, FeedError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FeedError::Api {
                status: 503,
                message: "feed unavailable".to_string(),
            });
        }
        let mut posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
        posts.push(message.to_string());
        Ok(FeedAck {
            id: Some(posts.len().to_string()),
        })
    }
}
