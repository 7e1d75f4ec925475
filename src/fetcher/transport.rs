//! HTTP transport seam for the fetch loop.
//!
//! [`HttpTransport`] performs exactly one GET and reports what happened at
//! the wire level. Classification of the body (sentinel rejection, malformed
//! JSON) happens in [`super::client`].

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

use super::{FetchError, FetchResult};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw response of a single GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Unparsed body
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// 200 OK with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Wire-level failure of a single GET.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    /// Request or body read exceeded the timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// Any other failure (DNS, connect, TLS, reset)
    #[error("{0}")]
    Other(String),
}

/// One GET against an absolute URL.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue the request and return the status and body.
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportFailure>;
}

/// [`HttpTransport`] backed by a `reqwest` client with a fixed timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("transit-data-loader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Map a `reqwest` error to a [`TransportFailure`].
///
/// The request URL is stripped from the message: it carries the API key.
fn classify(err: reqwest::Error) -> TransportFailure {
    let timed_out = err.is_timeout();
    let detail = err.without_url().to_string();
    if timed_out {
        TransportFailure::Timeout(detail)
    } else {
        TransportFailure::Other(detail)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportFailure> {
        let response = self.client.get(url.clone()).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;

        debug!(status, bytes = body.len(), "Received response");

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}
