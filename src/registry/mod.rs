//! Registry port
//!
//! The watcher talks to the package registry through [`RegistryPort`], a
//! single "GET the change feed since a cursor" operation. The HTTP
//! implementation lives in [`http`]; [`fake`] provides a scripted in-process
//! registry for tests.
//!
//! The port does not interpret the response: status codes and
//! payload shape are judged by the watcher, which decides whether a tick may
//! advance its checkpoint.

pub mod fake;
pub mod http;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

pub use fake::FakeRegistry;
pub use http::HttpRegistry;

/// Query parameter telling the registry to answer from its index without
/// waiting for a rebuild.
pub const STALE_UPDATE_AFTER: &str = "update_after";

/// Errors raised while reaching the registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not complete in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// One "changes since" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryQuery {
    /// Registry base URL, e.g. `http://registry.npmjs.org`
    pub base_url: String,
    /// Query path, e.g. `/-/all/since/`
    pub path: String,
    /// Index staleness hint sent as `stale`
    pub stale: String,
    /// Lower bound of the change window (epoch milliseconds)
    pub startkey: i64,
}

impl RegistryQuery {
    /// Build a query for the given checkpoint.
    ///
    /// # Examples
    ///
    /// ```
    /// use pkgcaster::registry::RegistryQuery;
    ///
    /// let query = RegistryQuery::new("http://registry.npmjs.org/", "/-/all/since/", 1000);
    /// assert_eq!(query.url(), "http://registry.npmjs.org/-/all/since/");
    /// assert_eq!(query.startkey, 1000);
    /// ```
    pub fn new(base_url: &str, path: &str, startkey: i64) -> Self {
        Self {
            base_url: base_url.to_string(),
            path: path.to_string(),
            stale: STALE_UPDATE_AFTER.to_string(),
            startkey,
        }
    }

    /// Full request URL without the query string.
    pub fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.path.starts_with('/') {
            format!("{}{}", base, self.path)
        } else {
            format!("{}/{}", base, self.path)
        }
    }
}

/// Raw registry answer.
///
/// `body` is `None` when the response carried no parseable JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryResponse {
    /// HTTP status code
    pub status: u16,
    /// Decoded JSON payload, if any
    pub body: Option<JsonValue>,
}

impl RegistryResponse {
    /// A 200 response carrying `body`.
    pub fn ok(body: JsonValue) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Port used by the watcher to fetch the registry change feed.
#[async_trait]
pub trait RegistryPort: Send + Sync {
    /// Issue one change-feed request.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the registry cannot be reached or the
    /// request times out. A reachable registry answering with an error status
    /// is *not* an error here; it is reported through
    /// [`RegistryResponse::status`].
    async fn get(&self, query: &RegistryQuery) -> Result<RegistryResponse, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_url_joins_slashes() {
        let q = RegistryQuery::new("http://localhost:5984", "/-/all/since/", 0);
        assert_eq!(q.url(), "http://localhost:5984/-/all/since/");

        let q = RegistryQuery::new("http://localhost:5984/", "-/all/since/", 0);
        assert_eq!(q.url(), "http://localhost:5984/-/all/since/");
    }

    #[test]
    fn test_query_uses_update_after() {
        let q = RegistryQuery::new("http://localhost", "/x", 42);
        assert_eq!(q.stale, "update_after");
    }

    #[test]
    fn test_response_success_range() {
        assert!(RegistryResponse::ok(json!({})).is_success());
        assert!(!RegistryResponse {
            status: 304,
            body: None
        }
        .is_success());
        assert!(!RegistryResponse {
            status: 500,
            body: None
        }
        .is_success());
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Request timed out after 5s");

        let err = RegistryError::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "Transport error: connection reset");
    }
}
