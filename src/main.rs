//! Main entry point for the transit-data-loader CLI

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use transit_data_loader::cli::Cli;
use transit_data_loader::shutdown::{SharedShutdown, ShutdownCoordinator};

/// Initialize tracing subscriber with optional JSON formatting.
///
/// Logs go to stderr so lookup output on stdout stays valid JSON.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("transit_data_loader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Start optional services, then run the selected command.
async fn run(cli: Cli, shutdown: SharedShutdown) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        transit_data_loader::metrics::init_metrics(addr)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("failed to start metrics exporter")?;
    }

    cli.execute(shutdown).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C ends polling early; collected samples are still written
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - flushing collected data...");
                shutdown.request_shutdown();
            }
        }
    });

    if let Err(e) = run(cli, shutdown).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
