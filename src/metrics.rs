//! Observability metrics for the loader
//!
//! Counters are recorded through the `metrics` facade and are no-ops until a
//! recorder is installed. [`init_metrics`] installs a Prometheus exporter
//! with a scrape endpoint; the CLI does so only when `--metrics-addr` is set.

use metrics::{counter, describe_counter, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tracing::{debug, info};

use crate::fetcher::RetryReason;

static METRICS_ADDR: OnceCell<SocketAddr> = OnceCell::new();

/// Install the Prometheus exporter on `addr`.
///
/// Idempotent: later calls return without reinstalling.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(existing) = METRICS_ADDR.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "fetch_attempts_total",
        Unit::Count,
        "Single HTTP attempts, labelled by endpoint and outcome"
    );
    describe_counter!(
        "fetch_retries_total",
        Unit::Count,
        "Retries scheduled, labelled by endpoint and reason"
    );
    describe_counter!(
        "fetch_exhausted_total",
        Unit::Count,
        "Logical requests that ran out of attempts"
    );
    describe_counter!(
        "poll_samples_total",
        Unit::Count,
        "Polling iterations, labelled by status"
    );
    describe_counter!(
        "files_written_total",
        Unit::Count,
        "JSON documents persisted to disk"
    );

    let _ = METRICS_ADDR.set(addr);
    info!(addr = %addr, "Metrics exporter listening");
    Ok(())
}

/// Count one attempt; `outcome` is `success` or a [`RetryReason::label`].
pub fn record_attempt(endpoint: &str, outcome: &'static str) {
    counter!(
        "fetch_attempts_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// Count a scheduled retry.
pub fn record_retry(endpoint: &str, reason: RetryReason) {
    counter!(
        "fetch_retries_total",
        "endpoint" => endpoint.to_string(),
        "reason" => reason.label(),
    )
    .increment(1);
}

/// Count a request that ran out of attempts.
pub fn record_exhausted(endpoint: &str) {
    counter!("fetch_exhausted_total", "endpoint" => endpoint.to_string()).increment(1);
}

/// Count a polling iteration: `collected`, `skipped` or `failed`.
pub fn record_poll_sample(status: &'static str) {
    counter!("poll_samples_total", "status" => status).increment(1);
}

/// Count a persisted document.
pub fn record_file_written() {
    counter!("files_written_total").increment(1);
}
