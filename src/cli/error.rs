//! CLI error types and conversions

use crate::collector::CollectorError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Collector error
    #[error("{0}")]
    CollectorError(#[from] CollectorError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
