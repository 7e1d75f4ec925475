//! Command-line interface
//!
//! ```text
//! transit-data-loader --api-key KEY basic
//! transit-data-loader --api-key KEY poll --intervals 60 --output buses.json
//! transit-data-loader --api-key KEY stop-info --name "Marszałkowska"
//! transit-data-loader --api-key KEY lines --stop-id 7009 --stop-nr 01
//! transit-data-loader --api-key KEY schedule --stop-id 7009 --stop-nr 01 --line 520
//! ```

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use super::CliError;
use crate::collector::config::{DEFAULT_DATA_DIR, DEFAULT_POLL_WAIT};
use crate::collector::{BatchPolicy, Collector, LoaderConfig, SampleFailurePolicy};
use crate::endpoints::{ApiKey, EndpointTable, VehicleKind, DEFAULT_BASE_URL};
use crate::fetcher::retry::DEFAULT_MAX_ATTEMPTS;
use crate::fetcher::RetryPolicy;
use crate::output::to_pretty_json;
use crate::shutdown::SharedShutdown;

/// Warsaw public transport open-data downloader
#[derive(Parser, Debug)]
#[command(name = "transit-data-loader", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// API key issued by api.um.warszawa.pl
    #[arg(long, global = true, env = "ZTM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory downloads are written to (created if missing)
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Base URL of the API
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Attempts per request before giving up
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    /// Per-request timeout in seconds
    #[arg(
        long,
        global = true,
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout_secs: u64,

    /// Wait between attempts in milliseconds
    #[arg(long, global = true, default_value_t = 1000)]
    pub retry_backoff_ms: u64,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download dictionary, stop metadata and routes
    Basic(BasicArgs),

    /// Poll live vehicle positions and write them as one JSON array
    Poll(PollArgs),

    /// Look up stop groups by name
    StopInfo {
        /// Stop name, e.g. "Marszałkowska"
        #[arg(long)]
        name: String,
    },

    /// Look up lines serving a stop
    Lines {
        /// Stop group id (busstopId)
        #[arg(long)]
        stop_id: String,
        /// Stop number within the group (busstopNr)
        #[arg(long)]
        stop_nr: String,
    },

    /// Look up the timetable of a line at a stop
    Schedule {
        /// Stop group id (busstopId)
        #[arg(long)]
        stop_id: String,
        /// Stop number within the group (busstopNr)
        #[arg(long)]
        stop_nr: String,
        /// Line number, e.g. 520
        #[arg(long)]
        line: String,
    },
}

/// Arguments of the `basic` command
#[derive(Args, Debug)]
pub struct BasicArgs {
    /// Keep going after a failed download or stop at the first one
    #[arg(long, value_enum, default_value_t = BatchPolicy::BestEffort)]
    pub batch_policy: BatchPolicy,
}

/// Arguments of the `poll` command
#[derive(Args, Debug)]
pub struct PollArgs {
    /// Number of samples to take
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub intervals: u32,

    /// Output file name inside the data directory
    #[arg(long)]
    pub output: String,

    /// Seconds between samples
    #[arg(long, default_value_t = DEFAULT_POLL_WAIT.as_secs())]
    pub wait_secs: u64,

    /// Vehicle family to poll
    #[arg(long, value_enum, default_value_t = VehicleKind::Bus)]
    pub vehicle: VehicleKind,

    /// What a failed sample does to the run
    #[arg(long, value_enum, default_value_t = SampleFailurePolicy::SkipAndContinue)]
    pub on_failure: SampleFailurePolicy,

    /// Disable the progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl Cli {
    /// Resolve flags into a [`LoaderConfig`].
    pub fn loader_config(&self) -> Result<LoaderConfig, CliError> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                CliError::ConfigurationError(
                    "an API key is required (--api-key or ZTM_API_KEY)".to_string(),
                )
            })?;

        if self.base_url.trim().is_empty() {
            return Err(CliError::InvalidArgument("--base-url must not be empty".to_string()));
        }

        let mut config = LoaderConfig::new(ApiKey::new(api_key));
        config.data_dir = self.data_dir.clone();
        config.endpoints = EndpointTable::with_base_url(self.base_url.trim());
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        config.retry = RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        );

        match &self.command {
            Commands::Basic(args) => config.collector.batch_policy = args.batch_policy,
            Commands::Poll(args) => {
                if args.output.trim().is_empty() {
                    return Err(CliError::InvalidArgument("--output must not be empty".to_string()));
                }
                config.collector.poll_wait = Duration::from_secs(args.wait_secs);
                config.collector.vehicle_kind = args.vehicle;
                config.collector.on_sample_failure = args.on_failure;
            }
            _ => {}
        }

        Ok(config)
    }

    /// Run the selected command.
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<(), CliError> {
        let config = self.loader_config()?;
        let mut collector = Collector::from_config(config)?.with_shutdown(shutdown);

        match &self.command {
            Commands::Basic(_) => {
                let report = collector.download_basic_data().await?;
                for path in &report.written {
                    println!("{}", path.display());
                }
            }
            Commands::Poll(args) => {
                if !args.no_progress {
                    collector = collector.with_progress(create_progress_bar(args));
                }
                let report = collector
                    .download_online_data(args.intervals, &args.output)
                    .await?;
                info!(
                    path = %report.path.display(),
                    records = report.records,
                    skipped = report.skipped,
                    "Poll complete"
                );
                print_json(&report)?;
            }
            Commands::StopInfo { name } => {
                print_json(&collector.download_stop_info(name).await?)?;
            }
            Commands::Lines { stop_id, stop_nr } => {
                print_json(&collector.download_lines_info(stop_id, stop_nr).await?)?;
            }
            Commands::Schedule {
                stop_id,
                stop_nr,
                line,
            } => {
                print_json(
                    &collector
                        .download_schedule_info(stop_id, stop_nr, line)
                        .await?,
                )?;
            }
        }

        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let bytes = to_pretty_json(value)?;
    println!("{}", String::from_utf8_lossy(&bytes));
    Ok(())
}

/// Progress bar for a polling run
fn create_progress_bar(args: &PollArgs) -> ProgressBar {
    let pb = ProgressBar::new(u64::from(args.intervals));
    pb.set_style(
        ProgressStyle::default_bar()
            .template(concat!(
                "{spinner:.green} [{elapsed_precise}] ",
                "[{bar:40.cyan/blue}] {pos}/{len} samples {msg}",
            ))
            .expect("hardcoded template is valid")
            .progress_chars("#>-"),
    );
    pb.set_message(format!("-> {}", args.output));
    pb
}
