//! Retry policy and retry message formatting for the fetch loop.
//!
//! Transport timeouts and API-level rejections share one fixed backoff, but
//! they are kept apart as distinct [`RetryReason`] values so that logs and
//! metrics can tell them apart.

use std::fmt;
use std::time::Duration;

/// Default attempt budget for a single logical request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Default wait between two attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Why a single attempt did not produce a usable payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The GET exceeded the request timeout
    TransportTimeout,
    /// The API answered 200 OK with its malformed-request sentinel
    ApplicationRejected,
    /// The body was not valid JSON
    MalformedResponse,
    /// The server answered with a non-success HTTP status
    UnexpectedStatus(u16),
    /// Any other network failure (connection refused, DNS, TLS, ...)
    Transport,
}

impl RetryReason {
    /// Short description used inside log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::TransportTimeout => "request timeout",
            Self::ApplicationRejected => "API rejected the request parameters",
            Self::MalformedResponse => "malformed JSON body",
            Self::UnexpectedStatus(429) => "rate limited",
            Self::UnexpectedStatus(code) if *code >= 500 => "server error",
            Self::UnexpectedStatus(_) => "unexpected HTTP status",
            Self::Transport => "network error",
        }
    }

    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TransportTimeout => "timeout",
            Self::ApplicationRejected => "rejected",
            Self::MalformedResponse => "malformed",
            Self::UnexpectedStatus(_) => "status",
            Self::Transport => "transport",
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Only timeouts and sentinel rejections are retried. Throttling and
    /// server errors are surfaced to the caller instead of being absorbed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportTimeout | Self::ApplicationRejected)
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedStatus(code) => write!(f, "{} ({code})", self.description()),
            _ => f.write_str(self.description()),
        }
    }
}

/// Bounded, fixed-interval retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Create a policy. An attempt budget of zero is raised to one.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Same backoff, different attempt budget.
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self::new(max_attempts, self.backoff)
    }

    /// Total number of attempts allowed (initial request included).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Fixed wait between attempts.
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Whether a further attempt is allowed after `attempt` (1-based).
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF)
    }
}

/// Context for one retry log line.
#[derive(Debug, Clone)]
pub struct RetryContext<'a> {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Attempt budget
    pub max_attempts: u32,
    /// Why the attempt failed
    pub reason: RetryReason,
    /// Wait before the next attempt
    pub backoff: Duration,
    /// Logical endpoint name
    pub endpoint: &'a str,
}

impl RetryContext<'_> {
    /// "Retrying (attempt 2/100) after request timeout - waiting 1.0 seconds... (routes)"
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({})",
            self.attempt + 1,
            self.max_attempts,
            self.reason,
            self.backoff.as_secs_f64(),
            self.endpoint
        )
    }

    /// Final summary once the budget is spent.
    pub fn format_failure(&self) -> String {
        format!(
            "[FAILED] {} gave up after {} attempts, last error: {}",
            self.endpoint, self.max_attempts, self.reason
        )
    }
}
