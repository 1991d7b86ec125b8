//! Commands module
//!
//! Defines all CLI commands and their handlers. Handlers return the process
//! exit code; an `Err` is a startup failure.

mod check;
mod plan;
mod run;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Trigger every configured job in order and wait for each build
    Run,
    /// Check connectivity and credentials, then exit
    Test,
    /// Print the job plan without contacting the server
    DryRun,
}

/// Handle a CLI command
///
/// # Returns
/// The exit code for the process
pub async fn handle_command(command: Commands, config: &Config) -> Result<i32> {
    match command {
        Commands::Run => run::handle_run(config).await,
        Commands::Test => check::handle_test(config).await,
        Commands::DryRun => plan::handle_dry_run(config),
    }
}
