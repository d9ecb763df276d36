//! HTTP registry client.
//!
//! Issues `GET <base><path>?stale=update_after&startkey=<checkpoint>` with a
//! per-request timeout so a hung registry cannot stall the polling loop.

use super::{RegistryError, RegistryPort, RegistryQuery, RegistryResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// [`RegistryPort`] backed by `reqwest`.
pub struct HttpRegistry {
    client: Client,
    timeout: Duration,
}

impl HttpRegistry {
    /// Creates a new registry client.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Timeout applied to every request
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Http` if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pkgcaster/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> RegistryError {
        if err.is_timeout() {
            RegistryError::Timeout(self.timeout)
        } else {
            RegistryError::Http(err)
        }
    }
}

#[async_trait]
impl RegistryPort for HttpRegistry {
    async fn get(&self, query: &RegistryQuery) -> Result<RegistryResponse, RegistryError> {
        let url = query.url();
        debug!(url = %url, startkey = query.startkey, "Requesting registry changes");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("stale", query.stale.clone()),
                ("startkey", query.startkey.to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(RegistryResponse {
                status: status.as_u16(),
                body: None,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(error = %e, "Registry response is not valid JSON");
                    None
                }
            }
        };

        Ok(RegistryResponse {
            status: status.as_u16(),
            body,
        })
    }
}

impl std::fmt::Debug for HttpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRegistry")
            .field("timeout", &self.timeout)
            .finish()
    }
}
