//! Buildchain CLI
//!
//! Triggers a configured chain of Jenkins jobs one after another and waits
//! for each build to finish.

mod commands;
mod config;
mod logging;
mod prompt;
mod shutdown;

use anyhow::Result;
use buildchain_runner::report::EXIT_CONFIG;
use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use config::Config;
use prompt::InterruptAction;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "buildchain")]
#[command(about = "Run a chain of Jenkins jobs sequentially", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(
        long,
        env = "BUILDCHAIN_CONFIG",
        default_value = "jenkins_config.json"
    )]
    config: PathBuf,

    /// File every log line is appended to
    #[arg(long, env = "BUILDCHAIN_LOG_FILE", default_value = "run.log")]
    log_file: PathBuf,

    /// What to do with a running build when interrupted
    #[arg(long, value_enum, default_value_t = InterruptAction::Ask)]
    on_interrupt: InterruptAction,

    #[command(subcommand)]
    command: Commands,
}

fn main() {
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            EXIT_CONFIG
        }
    };

    std::process::exit(code);
}

/// Runs the selected command; the log writer is flushed before returning
#[tokio::main]
async fn run(cli: Cli) -> Result<i32> {
    let config = Config {
        config_path: cli.config,
        log_file: cli.log_file,
        on_interrupt: cli.on_interrupt,
    };

    let _log_guard = logging::init(&config.log_file)?;

    handle_command(cli.command, &config).await
}
