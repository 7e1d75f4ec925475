//! # Transit Data Loader
//!
//! Client for the Warsaw public transport open-data API
//! (`api.um.warszawa.pl`). Downloads reference data once, polls live vehicle
//! positions for as long as requested, and persists responses as JSON.
//!
//! ## Quick Start
//!
//! ```no_run
//! use transit_data_loader::collector::{Collector, LoaderConfig};
//! use transit_data_loader::endpoints::ApiKey;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = LoaderConfig::new(ApiKey::new("your-api-key"));
//! config.data_dir = "./data".into();
//!
//! let mut collector = Collector::from_config(config)?;
//! collector.download_basic_data().await?;
//!
//! // Ten samples, one minute apart, written once as a single array
//! let report = collector.download_online_data(10, "buses.json").await?;
//! println!("{} records", report.records);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - single logical request: retry loop, sentinel detection, error taxonomy
//! - [`endpoints`] - endpoint table and URL construction
//! - [`collector`] - download orchestration and persistence policy
//! - [`output`] - data directory layout and atomic JSON writes
//! - [`shutdown`] - cancellation of long-running polls
//! - [`metrics`] - counters for attempts, retries and samples
//!
//! ## Error Handling
//!
//! The API signals malformed requests with a 200 OK whose `result` field is
//! a fixed Polish sentence. Those responses, like timeouts, are retried with
//! a fixed backoff; running out of attempts is an error
//! ([`fetcher::FetchError::ExhaustedRetries`]), never a silently returned
//! error payload.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementations
pub mod cli;

/// Download orchestration
pub mod collector;

/// Endpoint table and URL construction
pub mod endpoints;

/// Retrying JSON fetcher
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// JSON persistence
pub mod output;

/// Graceful shutdown coordination
pub mod shutdown;

pub use collector::{Collector, CollectorError, LoaderConfig, PollReport};
pub use endpoints::{ApiKey, EndpointTable, VehicleKind};
pub use fetcher::{ApiFetcher, FetchError, RetryPolicy};
