//! Retrying JSON fetcher
//!
//! One logical request is a loop of single GETs:
//! - timeout: retry after the fixed backoff
//! - 200 OK with the rejection sentinel in `result`: retry after the same backoff
//! - non-2xx status, non-JSON body, other network failure: fail immediately
//! - anything else: success
//!
//! Running out of attempts is an error, never a degraded value.

use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::retry::{RetryContext, RetryPolicy, RetryReason};
use super::transport::{HttpTransport, ReqwestTransport, TransportFailure};
use super::{FetchError, FetchResult};
use crate::metrics;

/// `result` value the API returns with 200 OK for a malformed request.
pub const REJECTION_SENTINEL: &str = "Błędna metoda lub parametry wywołania";

/// Whether `value` is the API's malformed-request payload.
pub fn is_rejection(value: &Value) -> bool {
    value.get("result").and_then(Value::as_str) == Some(REJECTION_SENTINEL)
}

/// Successful payload together with the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    /// Parsed body
    pub value: Value,
    /// Attempts used, initial request included
    pub attempts: u32,
}

/// Why a single attempt failed.
struct AttemptFailure {
    reason: RetryReason,
    detail: String,
}

impl AttemptFailure {
    fn new(reason: RetryReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    /// Error reported to the caller once this failure ends the loop.
    fn into_error(self, attempts: u32) -> FetchError {
        match self.reason {
            RetryReason::MalformedResponse => FetchError::MalformedResponse(self.detail),
            RetryReason::UnexpectedStatus(status) => FetchError::UnexpectedStatus { status },
            RetryReason::Transport => FetchError::Transport(self.detail),
            RetryReason::TransportTimeout | RetryReason::ApplicationRejected => {
                FetchError::ExhaustedRetries {
                    attempts,
                    last: self.reason,
                }
            }
        }
    }
}

/// JSON fetcher with bounded fixed-interval retry.
#[derive(Clone)]
pub struct ApiFetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl ApiFetcher {
    /// Create a fetcher over any transport.
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Create a fetcher over a `reqwest` client with the given request timeout.
    pub fn with_timeout(timeout: Duration, policy: RetryPolicy) -> FetchResult<Self> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(timeout)?), policy))
    }

    /// Default retry policy of this fetcher.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch with the configured attempt budget.
    pub async fn get(&self, url: &Url) -> FetchResult<Value> {
        self.fetch(url, self.policy.max_attempts()).await
    }

    /// Fetch `url`, allowing at most `max_attempts` attempts.
    pub async fn fetch(&self, url: &Url, max_attempts: u32) -> FetchResult<Value> {
        self.fetch_detailed(url, max_attempts)
            .await
            .map(|fetched| fetched.value)
    }

    /// Like [`ApiFetcher::fetch`], also reporting how many attempts were used.
    pub async fn fetch_detailed(&self, url: &Url, max_attempts: u32) -> FetchResult<Fetched> {
        let policy = self.policy.with_max_attempts(max_attempts);
        let endpoint = endpoint_label(url);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                endpoint = %endpoint,
                attempt,
                max_attempts = policy.max_attempts(),
                "Sending request"
            );

            let failure = match self.attempt_once(url).await {
                Ok(value) => {
                    metrics::record_attempt(&endpoint, "success");
                    if attempt > 1 {
                        info!(
                            endpoint = %endpoint,
                            attempts = attempt,
                            "Request succeeded after retries"
                        );
                    }
                    return Ok(Fetched {
                        value,
                        attempts: attempt,
                    });
                }
                Err(failure) => failure,
            };

            let reason = failure.reason;
            metrics::record_attempt(&endpoint, reason.label());

            if !reason.is_retryable() {
                let err = failure.into_error(attempt);
                error!(endpoint = %endpoint, attempt, error = %err, "Request failed");
                return Err(err);
            }

            let ctx = RetryContext {
                attempt,
                max_attempts: policy.max_attempts(),
                reason,
                backoff: policy.backoff(),
                endpoint: &endpoint,
            };

            if !policy.has_next(attempt) {
                error!(endpoint = %endpoint, detail = %failure.detail, "{}", ctx.format_failure());
                metrics::record_exhausted(&endpoint);
                return Err(failure.into_error(attempt));
            }

            warn!(
                endpoint = %endpoint,
                reason = reason.label(),
                detail = %failure.detail,
                "{}",
                ctx.format_retry()
            );
            metrics::record_retry(&endpoint, reason);
            tokio::time::sleep(policy.backoff()).await;
        }
    }

    async fn attempt_once(&self, url: &Url) -> Result<Value, AttemptFailure> {
        let response = self.transport.get(url).await.map_err(|failure| match failure {
            TransportFailure::Timeout(detail) => {
                AttemptFailure::new(RetryReason::TransportTimeout, detail)
            }
            TransportFailure::Other(detail) => AttemptFailure::new(RetryReason::Transport, detail),
        })?;

        if !response.is_success() {
            return Err(AttemptFailure::new(
                RetryReason::UnexpectedStatus(response.status),
                format!("HTTP {}", response.status),
            ));
        }

        let value: Value = serde_json::from_slice(&response.body).map_err(|e| {
            AttemptFailure::new(
                RetryReason::MalformedResponse,
                format!("{e} ({} bytes)", response.body.len()),
            )
        })?;

        if is_rejection(&value) {
            return Err(AttemptFailure::new(
                RetryReason::ApplicationRejected,
                REJECTION_SENTINEL,
            ));
        }

        Ok(value)
    }
}

/// Last non-empty path segment, used in place of the full URL so the API
/// key in the query string stays out of logs and metric labels.
pub(crate) fn endpoint_label(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .unwrap_or("/")
        .to_string()
}
