//! Package blocklist
//!
//! A set of package names that must never be announced. It is fetched once
//! when the watcher starts and then passed by value into the
//! [`PackageFilter`](super::PackageFilter); it is refreshed on every restart
//! and never during a run.

use reqwest::Client;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while fetching a blocklist.
#[derive(Error, Debug)]
pub enum BlocklistError {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("Blocklist endpoint returned status {0}")]
    Status(u16),

    /// The document is not a JSON object.
    #[error("Blocklist document must be a JSON object keyed by package name")]
    Shape,
}

/// Names of packages that are never announced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blocklist {
    names: BTreeSet<String>,
}

impl Blocklist {
    /// Blocklist that blocks nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Blocklist from an explicit list of names.
    ///
    /// # Examples
    ///
    /// ```
    /// use pkgcaster::watcher::Blocklist;
    ///
    /// let blocklist = Blocklist::from_names(["gulp-blink", "gulp-spam"]);
    /// assert!(blocklist.contains("gulp-blink"));
    /// assert!(!blocklist.contains("gulp-sass"));
    /// ```
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a JSON object whose keys are the blocked names.
    ///
    /// # Errors
    ///
    /// Returns `BlocklistError::Shape` if `doc` is not an object.
    pub fn from_json(doc: &JsonValue) -> Result<Self, BlocklistError> {
        let obj = doc.as_object().ok_or(BlocklistError::Shape)?;
        Ok(Self::from_names(obj.keys().cloned()))
    }

    /// Fetch the blocklist document from `url`.
    ///
    /// # Errors
    ///
    /// Returns `BlocklistError` on transport failure, a non-success status,
    /// or a document that is not an object.
    pub async fn fetch(client: &Client, url: &str) -> Result<Self, BlocklistError> {
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BlocklistError::Status(status.as_u16()));
        }
        let doc: JsonValue = response.json().await?;
        Self::from_json(&doc)
    }

    /// Fetch the blocklist, falling back to an empty one on any failure.
    ///
    /// A missing blocklist should not keep the watcher from starting; the
    /// failure is logged instead.
    pub async fn fetch_or_empty(client: &Client, url: &str) -> Self {
        match Self::fetch(client, url).await {
            Ok(blocklist) => {
                info!(url = %url, entries = blocklist.len(), "Loaded package blocklist");
                blocklist
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to load package blocklist, continuing without it");
                Self::empty()
            }
        }
    }

    /// Whether `name` is blocked.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of blocked names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is blocked.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
