//! Collector: reference downloads, live polling and lookups

use indicatif::ProgressBar;
use reqwest::Url;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use super::config::{BatchPolicy, CollectorConfig, LoaderConfig};
use super::poll::{PollReport, PollState, SampleFailurePolicy};
use super::{BatchFailure, BatchReport, CollectorError, CollectorResult};
use crate::endpoints::{redact, ApiKey, BoundEndpoints, Endpoint, EndpointTable};
use crate::fetcher::ApiFetcher;
use crate::metrics;
use crate::output::{ensure_writable, write_json_atomic, DataDir};
use crate::shutdown::{ShutdownCoordinator, SharedShutdown};

/// How the result of a descriptor reaches disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the destination with the fetched document
    Overwrite,
    /// Accumulate samples in memory, write them once as one array
    Append,
}

/// Request URL, destination and write mode of one download.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    /// Logical endpoint
    pub endpoint: Endpoint,
    /// Fully-formed request URL (carries the API key)
    pub url: Url,
    /// Destination file
    pub destination: PathBuf,
    /// Write mode
    pub mode: WriteMode,
}

/// Orchestrates downloads against the API and owns their persistence.
pub struct Collector {
    fetcher: ApiFetcher,
    endpoints: EndpointTable,
    api_key: ApiKey,
    data_dir: DataDir,
    config: CollectorConfig,
    shutdown: SharedShutdown,
    progress: Option<ProgressBar>,
    basic_data_ready: bool,
}

impl Collector {
    /// Create a collector from its parts.
    pub fn new(
        fetcher: ApiFetcher,
        endpoints: EndpointTable,
        api_key: ApiKey,
        data_dir: DataDir,
    ) -> Self {
        Self {
            fetcher,
            endpoints,
            api_key,
            data_dir,
            config: CollectorConfig::default(),
            shutdown: ShutdownCoordinator::shared(),
            progress: None,
            basic_data_ready: false,
        }
    }

    /// Build a collector over a `reqwest` transport from `config`.
    ///
    /// Creates the data directory if it is missing.
    pub fn from_config(config: LoaderConfig) -> CollectorResult<Self> {
        let fetcher = ApiFetcher::with_timeout(config.request_timeout, config.retry)?;
        let data_dir = DataDir::prepare(&config.data_dir)?;

        info!(
            data_dir = %data_dir.root().display(),
            base_url = %config.endpoints.base_url,
            max_attempts = config.retry.max_attempts(),
            "Collector initialized"
        );

        Ok(Self::new(fetcher, config.endpoints, config.api_key, data_dir)
            .with_config(config.collector))
    }

    /// Override collector behavior.
    pub fn with_config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Tick `progress` once per polling iteration.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Whether the last [`Collector::download_basic_data`] wrote all files.
    pub fn basic_data_ready(&self) -> bool {
        self.basic_data_ready
    }

    /// Destination directory.
    pub fn data_dir(&self) -> &DataDir {
        &self.data_dir
    }

    fn urls(&self) -> BoundEndpoints<'_> {
        self.endpoints.bind(&self.api_key)
    }

    /// Descriptors of the reference downloads, in download order.
    pub fn basic_descriptors(&self) -> CollectorResult<Vec<EndpointDescriptor>> {
        let urls = self.urls();
        Ok(vec![
            EndpointDescriptor {
                endpoint: Endpoint::Dictionary,
                url: urls.dictionary()?,
                destination: self.data_dir.dictionary(),
                mode: WriteMode::Overwrite,
            },
            EndpointDescriptor {
                endpoint: Endpoint::StopsMetadata,
                url: urls.stops_metadata()?,
                destination: self.data_dir.stops_info(),
                mode: WriteMode::Overwrite,
            },
            EndpointDescriptor {
                endpoint: Endpoint::Routes,
                url: urls.routes()?,
                destination: self.data_dir.routes(),
                mode: WriteMode::Overwrite,
            },
        ])
    }

    /// Descriptor of the live positions poll writing to `destination_name`.
    pub fn online_descriptor(&self, destination_name: &str) -> CollectorResult<EndpointDescriptor> {
        Ok(EndpointDescriptor {
            endpoint: Endpoint::VehiclePositions,
            url: self.urls().vehicle_positions(self.config.vehicle_kind)?,
            destination: self.data_dir.file(destination_name),
            mode: WriteMode::Append,
        })
    }

    /// Fetch one document and replace its destination.
    ///
    /// On any failure the destination is left as it was.
    pub async fn download_one_shot(&self, descriptor: &EndpointDescriptor) -> CollectorResult<()> {
        debug_assert_eq!(descriptor.mode, WriteMode::Overwrite);
        debug!(
            endpoint = %descriptor.endpoint,
            url = %redact(&descriptor.url),
            destination = %descriptor.destination.display(),
            "Starting one-shot download"
        );

        let value = self.fetcher.get(&descriptor.url).await?;
        write_json_atomic(&descriptor.destination, &value)?;
        Ok(())
    }

    /// Download dictionary, stop metadata and routes.
    ///
    /// Every endpoint is attempted under [`BatchPolicy::BestEffort`]; the first
    /// failure stops the batch under [`BatchPolicy::AbortOnFirst`]. Any failure
    /// is returned as [`CollectorError::PartialPersistFailure`]. The ready flag
    /// is set only when all three files were written.
    pub async fn download_basic_data(&mut self) -> CollectorResult<BatchReport> {
        info!("Downloading reference data");
        self.basic_data_ready = false;

        let descriptors = self.basic_descriptors()?;
        let mut report = BatchReport::default();
        let mut pending = descriptors.into_iter();

        while let Some(descriptor) = pending.next() {
            if self.shutdown.is_shutdown_requested() {
                warn!(
                    endpoint = %descriptor.endpoint,
                    "Shutdown requested, skipping remaining downloads"
                );
                report.skipped.push(descriptor.endpoint);
                report.skipped.extend(pending.by_ref().map(|d| d.endpoint));
                break;
            }

            match self.download_one_shot(&descriptor).await {
                Ok(()) => report.written.push(descriptor.destination),
                Err(err) => {
                    error!(
                        endpoint = %descriptor.endpoint,
                        error = %err,
                        "Reference download failed"
                    );
                    report.failed.push(BatchFailure {
                        endpoint: descriptor.endpoint,
                        destination: descriptor.destination,
                        error: err,
                    });
                    if self.config.batch_policy == BatchPolicy::AbortOnFirst {
                        report.skipped.extend(pending.by_ref().map(|d| d.endpoint));
                        break;
                    }
                }
            }
        }

        if !report.is_complete() {
            return Err(CollectorError::PartialPersistFailure(report));
        }

        self.basic_data_ready = true;
        info!(files = report.written.len(), "Reference data ready");
        Ok(report)
    }

    /// Poll live vehicle positions `interval_count` times and write every
    /// sample's `result` records, in call order, as one JSON array to
    /// `destination_name` inside the data directory.
    ///
    /// The array is written once, after the last iteration or as soon as
    /// shutdown is requested. Under [`SampleFailurePolicy::Abort`] a failed
    /// sample returns [`CollectorError::PollAborted`] and nothing is written.
    pub async fn download_online_data(
        &self,
        interval_count: u32,
        destination_name: &str,
    ) -> CollectorResult<PollReport> {
        let descriptor = self.online_descriptor(destination_name)?;
        // The buffer is only written after the last sample, so check the destination now
        ensure_writable(&descriptor.destination)?;
        let mut state = PollState::new(interval_count);
        let mut report = PollReport::start(interval_count, descriptor.destination.clone());
        let mut buffer: Vec<Value> = Vec::new();

        info!(
            iterations = interval_count,
            wait_secs = self.config.poll_wait.as_secs_f64(),
            vehicle = ?self.config.vehicle_kind,
            destination = %descriptor.destination.display(),
            "Starting live polling"
        );
        if let Some(progress) = &self.progress {
            progress.set_length(u64::from(interval_count));
        }

        while let Some(iteration) = state.advance() {
            if iteration > 0 && !self.shutdown.sleep(self.config.poll_wait).await {
                report.cancelled = true;
                break;
            }

            let Some(fetched) = self
                .shutdown
                .run_until_shutdown(self.fetcher.get(&descriptor.url))
                .await
            else {
                report.cancelled = true;
                break;
            };

            match fetched.map_err(CollectorError::from).and_then(result_records) {
                Ok(records) => {
                    debug!(iteration, records = records.len(), "Sample collected");
                    metrics::record_poll_sample("collected");
                    report.succeeded += 1;
                    report.records += records.len();
                    buffer.extend(records);
                }
                Err(err) => match self.config.on_sample_failure {
                    SampleFailurePolicy::SkipAndContinue => {
                        warn!(iteration, error = %err, "Sample failed, skipping");
                        metrics::record_poll_sample("skipped");
                        report.skipped += 1;
                    }
                    SampleFailurePolicy::Abort => {
                        error!(iteration, error = %err, "Sample failed, aborting poll");
                        metrics::record_poll_sample("failed");
                        if let Some(progress) = &self.progress {
                            progress.abandon();
                        }
                        return Err(CollectorError::PollAborted {
                            iteration,
                            source: Box::new(err),
                        });
                    }
                },
            }

            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }

        if report.cancelled {
            warn!(
                completed = report.attempted(),
                requested = interval_count,
                "Shutdown requested, flushing collected samples"
            );
        }

        state.flush();
        write_json_atomic(&descriptor.destination, &buffer)?;
        state.finish();

        report.finished_at = chrono::Utc::now();
        if let Some(progress) = &self.progress {
            progress.finish();
        }
        info!(
            succeeded = report.succeeded,
            skipped = report.skipped,
            records = report.records,
            cancelled = report.cancelled,
            "Live polling finished"
        );
        Ok(report)
    }

    /// Stop groups matching `name`.
    pub async fn download_stop_info(&self, name: &str) -> CollectorResult<Value> {
        let url = self.urls().stop_lookup(name)?;
        Ok(self.fetcher.get(&url).await?)
    }

    /// Lines serving stop `stop_id`/`stop_nr`.
    pub async fn download_lines_info(
        &self,
        stop_id: &str,
        stop_nr: &str,
    ) -> CollectorResult<Value> {
        let url = self.urls().lines_lookup(stop_id, stop_nr)?;
        Ok(self.fetcher.get(&url).await?)
    }

    /// Timetable of `line` at stop `stop_id`/`stop_nr`.
    pub async fn download_schedule_info(
        &self,
        stop_id: &str,
        stop_nr: &str,
        line: &str,
    ) -> CollectorResult<Value> {
        let url = self.urls().schedule_lookup(stop_id, stop_nr, line)?;
        Ok(self.fetcher.get(&url).await?)
    }
}

/// Take the `result` array out of a live positions payload.
fn result_records(value: Value) -> CollectorResult<Vec<Value>> {
    let Value::Object(mut body) = value else {
        return Err(CollectorError::UnexpectedShape(
            "response is not a JSON object".to_string(),
        ));
    };

    match body.remove("result") {
        Some(Value::Array(records)) => Ok(records),
        Some(other) => Err(CollectorError::UnexpectedShape(format!(
            "`result` is not an array: {other}"
        ))),
        None => Err(CollectorError::UnexpectedShape(
            "missing `result` field".to_string(),
        )),
    }
}
