//! Social feed port and its HTTP implementation

use crate::config::FeedConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use thiserror::Error;

/// Path of the status creation endpoint, relative to the API base.
pub const POST_PATH: &str = "/2/tweets";

/// Errors raised while posting to the feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed API rejected the post
    #[error("Feed API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        message: String,
    },

    /// No bearer token configured
    #[error("Feed bearer token is not configured")]
    MissingCredentials,
}

/// Acknowledgement of an accepted post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedAck {
    /// Identifier the feed assigned, when it returned one
    pub id: Option<String>,
}

/// Destination for announcement messages.
#[async_trait]
pub trait FeedPoster: Send + Sync {
    /// Publish `message` as a new status.
    async fn post(&self, message: &str) -> Result<FeedAck, FeedError>;
}

/// Feed client posting `{"text": message}` with a bearer token.
pub struct HttpFeedPoster {
    client: Client,
    endpoint: String,
    bearer_token: String,
}

impl HttpFeedPoster {
    /// Create a client from the feed configuration.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::MissingCredentials` without a bearer token and
    /// `FeedError::Http` if the HTTP client cannot be built
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let bearer_token = config
            .bearer_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or(FeedError::MissingCredentials)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("pkgcaster/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", config.api_base.trim_end_matches('/'), POST_PATH),
            bearer_token,
        })
    }

    /// URL posts are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for HttpFeedPoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFeedPoster")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FeedPoster for HttpFeedPoster {
    async fn post(&self, message: &str) -> Result<FeedAck, FeedError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "text": message }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: JsonValue = resp.json().await.unwrap_or(JsonValue::Null);
        let id = body
            .pointer("/data/id")
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        Ok(FeedAck { id })
    }
}
