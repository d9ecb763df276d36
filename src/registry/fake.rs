//! Scripted in-process registry for tests
//!
//! [`FakeRegistry`] answers each request with the next queued result and
//! records every query it receives, so tests can assert which checkpoint a
//! tick polled with.
//!
//! # Example
//!
//! ```
//! use pkgcaster::registry::{FakeRegistry, RegistryPort, RegistryQuery, RegistryResponse};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = FakeRegistry::new();
//! registry.push_response(RegistryResponse::ok(json!({"_updated": 5})));
//!
//! let query = RegistryQuery::new("http://registry", "/-/all/since/", 1);
//! let response = registry.get(&query).await.unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(registry.queries()[0].startkey, 1);
//! # }
//! ```

use super::{RegistryError, RegistryPort, RegistryQuery, RegistryResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Registry double returning queued results in order.
///
/// Once the queue is drained every request fails with
/// [`RegistryError::Transport`].
#[derive(Debug, Default)]
pub struct FakeRegistry {
    script: Mutex<VecDeque<Result<RegistryResponse, RegistryError>>>,
    queries: Mutex<Vec<RegistryQuery>>,
}

impl FakeRegistry {
    /// Create an empty fake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn push_response(&self, response: RegistryResponse) {
        self.push(Ok(response));
    }

    /// Queue a transport failure.
    pub fn push_error(&self, error: RegistryError) {
        self.push(Err(error));
    }

    /// Queue an arbitrary result.
    pub fn push(&self, result: Result<RegistryResponse, RegistryError>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(result);
    }

    /// Every query received so far, oldest first.
    pub fn queries(&self) -> Vec<RegistryQuery> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RegistryPort for FakeRegistry {
    async fn get(&self, query: &RegistryQuery) -> Result<RegistryResponse, RegistryError> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.clone());

        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(RegistryError::Transport("no scripted response".to_string())))
    }
}
