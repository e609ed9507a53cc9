//! HTTP transport (Cold Path)
//!
//! The poller, importer and search client only need "fetch this URL as
//! text". `HttpTransport` is the reqwest implementation; tests script their
//! own.

use std::future::Future;
use std::time::Duration;

/// Async text fetch
pub trait QuoteTransport: Send + Sync + 'static {
    /// Fetch `url`, returning the body of a 2xx response
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("stock-display/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        crate::log_feed!(tracing::Level::DEBUG, "GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}

/// Transient fetch failure. Never fatal to the poller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("Failed to read body: {0}")]
    Body(String),
}
