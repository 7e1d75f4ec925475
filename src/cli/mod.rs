//! CLI command implementations

pub mod commands;
pub mod error;

pub use commands::{BasicArgs, Cli, Commands, PollArgs};
pub use error::CliError;
