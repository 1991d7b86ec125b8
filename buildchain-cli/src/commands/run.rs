//! Run command
//!
//! Executes the configured chain and prints a summary of every job.

use anyhow::{Context, Result};
use buildchain_client::{CiClient, HttpStatusProbe, JenkinsClient};
use buildchain_core::domain::job::{JobOutcome, OutcomeStatus};
use buildchain_runner::report::EXIT_TRIGGER;
use buildchain_runner::{ChainOrchestrator, ChainReport};
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::shutdown;

pub async fn handle_run(config: &Config) -> Result<i32> {
    let configuration = config.load_configuration()?;
    info!(
        config = %config.config_path.display(),
        server = %configuration.base_url,
        user = %configuration.credential.username,
        jobs = configuration.jobs.len(),
        "Loaded configuration"
    );

    let client = JenkinsClient::from_config(&configuration).context("Failed to create CI client")?;

    match client.fetch_crumb().await {
        Ok(_) => {}
        Err(e) if e.is_auth() => {
            error!(error = %e, "Credentials rejected");
            println!("{} {}", "✗".red(), e);
            return Ok(EXIT_TRIGGER);
        }
        Err(e) => return Err(e).context("Failed to reach the CI server"),
    }

    let cancel = CancellationToken::new();
    shutdown::install(cancel.clone());

    let mut orchestrator = ChainOrchestrator::new(
        configuration.clone(),
        Arc::new(client) as Arc<dyn CiClient>,
        config.on_interrupt.prompt(),
    );
    if configuration.verification.is_some() {
        let probe = HttpStatusProbe::new(configuration.request_timeout)
            .context("Failed to create status probe")?;
        orchestrator = orchestrator.with_probe(Arc::new(probe));
    }

    let report = orchestrator.run(cancel).await;

    let job_names: Vec<&str> = configuration.jobs.iter().map(|j| j.name.as_str()).collect();
    print_summary(&report, &job_names);

    Ok(report.exit_code())
}

/// Print the per-job results followed by the overall verdict
fn print_summary(report: &ChainReport, job_names: &[&str]) {
    println!();
    println!("{}", "Summary".bold());

    for outcome in &report.outcomes {
        print_outcome(outcome);
    }
    for name in job_names.iter().skip(report.outcomes.len()) {
        println!("  {} {:<28} {}", "▸".cyan(), name.bold(), "not run".dimmed());
    }

    match report.verification {
        Some(true) => println!("  {} Status endpoint verified", "▸".cyan()),
        Some(false) => println!("  {} {}", "▸".cyan(), "Status endpoint verification failed".red()),
        None => {}
    }

    println!();
    let verdict = format!(
        "{}/{} jobs succeeded (exit code {})",
        report.succeeded_jobs(),
        job_names.len(),
        report.exit_code()
    );
    if report.succeeded() {
        println!("{}", verdict.green().bold());
    } else if report.cancelled {
        println!("{}", format!("Cancelled: {}", verdict).yellow().bold());
    } else {
        println!("{}", verdict.red().bold());
    }
}

fn print_outcome(outcome: &JobOutcome) {
    let build = outcome
        .build_number
        .map(|n| format!("#{}", n))
        .unwrap_or_else(|| "-".to_string());

    println!(
        "  {} {:<28} {:>6}  {}  {}",
        "▸".cyan(),
        outcome.job_name.bold(),
        build,
        colorize_status(outcome.status),
        format_duration(outcome.duration).dimmed()
    );
    if let Some(detail) = &outcome.detail {
        println!("      {}", detail.dimmed());
    }
}

/// Colorize an outcome for display
fn colorize_status(status: OutcomeStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        OutcomeStatus::Succeeded => text.green(),
        OutcomeStatus::Failed(_) => text.red(),
        OutcomeStatus::TimedOut => text.red(),
        OutcomeStatus::Stopped | OutcomeStatus::Abandoned => text.yellow(),
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
