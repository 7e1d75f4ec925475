//! Collector configuration and defaults

use std::path::PathBuf;
use std::time::Duration;

use super::poll::SampleFailurePolicy;
use crate::endpoints::{ApiKey, EndpointTable, VehicleKind};
use crate::fetcher::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
use crate::fetcher::transport::DEFAULT_REQUEST_TIMEOUT;
use crate::fetcher::RetryPolicy;

/// Wait between two polls of the live positions endpoint.
pub const DEFAULT_POLL_WAIT: Duration = Duration::from_secs(60);

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// How a multi-endpoint batch reacts to a failed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BatchPolicy {
    /// Attempt every endpoint, report all failures at the end
    #[default]
    BestEffort,
    /// Stop at the first failure
    AbortOnFirst,
}

/// Behavior of the collector itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Wait between polls
    pub poll_wait: Duration,
    /// Vehicle family to poll
    pub vehicle_kind: VehicleKind,
    /// What a failed polling sample does to the run
    pub on_sample_failure: SampleFailurePolicy,
    /// What a failed reference download does to the batch
    pub batch_policy: BatchPolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_wait: DEFAULT_POLL_WAIT,
            vehicle_kind: VehicleKind::default(),
            on_sample_failure: SampleFailurePolicy::default(),
            batch_policy: BatchPolicy::default(),
        }
    }
}

/// Everything needed to build a [`super::Collector`] against the real API.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// API key appended to every request
    pub api_key: ApiKey,
    /// Destination directory, created if missing
    pub data_dir: PathBuf,
    /// Endpoint table (base URL and resource ids)
    pub endpoints: EndpointTable,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Attempt budget and backoff
    pub retry: RetryPolicy,
    /// Collector behavior
    pub collector: CollectorConfig,
}

impl LoaderConfig {
    /// Defaults for everything but the key.
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            endpoints: EndpointTable::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF),
            collector: CollectorConfig::default(),
        }
    }
}
