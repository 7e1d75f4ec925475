//! Single-request fetching with retry and API-level error detection

pub mod client;
pub mod retry;
pub mod transport;

pub use client::{is_rejection, ApiFetcher, Fetched, REJECTION_SENTINEL};
pub use retry::{RetryPolicy, RetryReason};
pub use transport::{HttpTransport, ReqwestTransport, TransportFailure, TransportResponse};

/// Fetcher errors
///
/// Timeouts and sentinel rejections are retried and therefore only show up
/// here as the `last` reason of [`FetchError::ExhaustedRetries`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP succeeded but the body is not valid JSON (not retried)
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Non-2xx HTTP status (not retried)
    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus {
        /// Status code returned by the server
        status: u16,
    },

    /// Non-timeout network failure (not retried)
    #[error("transport error: {0}")]
    Transport(String),

    /// Attempt budget consumed without a clean response
    #[error("retries exhausted after {attempts} attempts (last error: {last})")]
    ExhaustedRetries {
        /// Attempts made
        attempts: u32,
        /// Reason the final attempt failed
        last: RetryReason,
    },

    /// Endpoint URL could not be built
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Classification used for logs and metrics.
    pub fn reason(&self) -> Option<RetryReason> {
        match self {
            Self::MalformedResponse(_) => Some(RetryReason::MalformedResponse),
            Self::UnexpectedStatus { status } => Some(RetryReason::UnexpectedStatus(*status)),
            Self::Transport(_) => Some(RetryReason::Transport),
            Self::ExhaustedRetries { last, .. } => Some(*last),
            Self::InvalidUrl(_) => None,
        }
    }

    /// Whether the retry budget ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::ExhaustedRetries { .. })
    }
}

/// Result type for fetcher operations
pub type FetchResult<T> = Result<T, FetchError>;
