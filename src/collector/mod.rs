//! Download orchestration and persistence policy
//!
//! The [`Collector`] drives the three kinds of downloads the API supports:
//!
//! 1. **Reference data** ([`Collector::download_basic_data`]): dictionary,
//!    stop metadata and routes, each fetched once and written over its
//!    destination file.
//! 2. **Live polling** ([`Collector::download_online_data`]): vehicle
//!    positions sampled at a fixed interval, accumulated in memory and
//!    written once as a single JSON array.
//! 3. **Lookups** ([`Collector::download_stop_info`] and friends): one fetch,
//!    parsed JSON handed back to the caller, nothing persisted.
//!
//! # Error Handling
//!
//! Failed one-shot downloads never touch their destination. Batch failures
//! are collected into a [`BatchReport`] carried by
//! [`CollectorError::PartialPersistFailure`]. Per-sample polling failures
//! follow [`poll::SampleFailurePolicy`].

pub mod config;
pub mod downloads;
pub mod poll;

pub use config::{BatchPolicy, CollectorConfig, LoaderConfig};
pub use downloads::{Collector, EndpointDescriptor, WriteMode};
pub use poll::{PollPhase, PollReport, PollState, SampleFailurePolicy};

use crate::endpoints::Endpoint;
use crate::fetcher::FetchError;
use crate::output::OutputError;
use std::fmt;
use std::path::PathBuf;

/// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// Fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Writing a document failed
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// One or more downloads of a batch failed
    #[error("{0}")]
    PartialPersistFailure(BatchReport),

    /// Payload lacks the structure the operation relies on
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Polling stopped on a failed sample under the abort policy
    #[error("polling aborted at iteration {iteration}: {source}")]
    PollAborted {
        /// Zero-based iteration that failed
        iteration: u32,
        /// What failed
        #[source]
        source: Box<CollectorError>,
    },
}

/// Result type for collector operations
pub type CollectorResult<T> = Result<T, CollectorError>;

/// One failed download of a batch.
#[derive(Debug)]
pub struct BatchFailure {
    /// Endpoint that failed
    pub endpoint: Endpoint,
    /// Destination left untouched
    pub destination: PathBuf,
    /// Cause
    pub error: CollectorError,
}

/// Outcome of a multi-endpoint batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files written successfully
    pub written: Vec<PathBuf>,
    /// Downloads that failed
    pub failed: Vec<BatchFailure>,
    /// Endpoints not attempted (abort policy or shutdown)
    pub skipped: Vec<Endpoint>,
}

impl BatchReport {
    /// Whether every endpoint was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} downloads failed",
            self.failed.len() + self.skipped.len(),
            self.written.len() + self.failed.len() + self.skipped.len()
        )?;
        for failure in &self.failed {
            write!(f, "; {}: {}", failure.endpoint, failure.error)?;
        }
        if !self.skipped.is_empty() {
            let names: Vec<_> = self.skipped.iter().map(Endpoint::name).collect();
            write!(f, "; not attempted: {}", names.join(", "))?;
        }
        Ok(())
    }
}
