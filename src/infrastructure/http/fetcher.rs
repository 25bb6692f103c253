//! Network fetcher backed by reqwest.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::domain::errors::FetchError;
use crate::domain::ports::FetchPort;

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
        }
    }
}

/// Fetches resource bytes over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the given configuration.
    ///
    /// # Errors
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &HttpFetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Creates a fetcher with default configuration.
    ///
    /// # Errors
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be built.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(&HttpFetcherConfig::default())
    }
}

#[async_trait]
impl FetchPort for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Bytes, FetchError> {
        debug!(locator = %locator, "Downloading image from network");

        let response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| FetchError::Transport(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(format!("Failed to read body: {e}")))
    }
}
