//! Chain orchestrator
//!
//! Runs the configured jobs strictly in order, one at a time, waiting
//! `wait_between_builds` between consecutive jobs. Owns the [`RunState`]
//! and the cancellation token for the whole invocation.

use buildchain_client::{CiClient, StatusProbe};
use buildchain_core::Configuration;
use buildchain_core::config::{ChainPolicy, MAX_DURATION};
use buildchain_core::domain::job::OutcomeStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::prompt::StopPrompt;
use crate::report::ChainReport;
use crate::runner::JobRunner;
use crate::state::RunState;
use crate::verify::verify_status_endpoint;

/// Countdown log cadence during the inter-job wait
const COUNTDOWN_STEP: Duration = Duration::from_secs(10);

pub struct ChainOrchestrator {
    config: Configuration,
    client: Arc<dyn CiClient>,
    prompt: Arc<dyn StopPrompt>,
    probe: Option<Arc<dyn StatusProbe>>,
}

impl ChainOrchestrator {
    pub fn new(config: Configuration, client: Arc<dyn CiClient>, prompt: Arc<dyn StopPrompt>) -> Self {
        Self {
            config,
            client,
            prompt,
            probe: None,
        }
    }

    /// Sets the probe used for post-run verification
    pub fn with_probe(mut self, probe: Arc<dyn StatusProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Runs the whole chain
    ///
    /// Cancelling `cancel` prevents any further trigger; a build that is
    /// already running is handed to the stop prompt by the job runner.
    pub async fn run(&self, cancel: CancellationToken) -> ChainReport {
        let jobs = &self.config.jobs;
        let mut state = RunState::new(cancel.clone());
        let runner = JobRunner::new(self.client.as_ref(), self.prompt.as_ref(), &self.config);

        info!(
            jobs = jobs.len(),
            branch = %self.config.branch,
            policy = ?self.config.chain_policy,
            "Starting chain: {}",
            jobs.iter().map(|j| j.name.as_str()).collect::<Vec<_>>().join(" -> ")
        );

        for (index, job) in jobs.iter().enumerate() {
            if state.is_cancelled() {
                warn!(job = %job.name, "Cancelled, not triggering remaining jobs");
                break;
            }

            info!("[{}/{}] {}", index + 1, jobs.len(), job.display_description());
            state.begin_job(index);

            let outcome = runner.run(job, &mut state).await;
            let status = outcome.status;

            info!(
                event = "job_outcome",
                job = %outcome.job_name,
                build = ?outcome.build_number,
                status = %status,
                duration = ?outcome.duration,
                detail = outcome.detail.as_deref().unwrap_or(""),
                "{} finished: {}",
                outcome.job_name,
                status
            );
            state.record(outcome);

            if status.is_cancellation() {
                break;
            }
            if status.is_failure() && self.config.chain_policy == ChainPolicy::HaltOnFailure {
                warn!(job = %job.name, "Halting chain after {}", status);
                break;
            }

            if index + 1 < jobs.len() && !self.wait_between_builds(state.cancel_token()).await {
                warn!("Cancelled during wait between builds");
                break;
            }
        }

        let cancelled = state.is_cancelled();
        let outcomes = state.into_outcomes();

        let all_succeeded = outcomes.len() == jobs.len()
            && outcomes
                .iter()
                .all(|o| o.status == OutcomeStatus::Succeeded);

        let verification = match (&self.config.verification, &self.probe) {
            (Some(policy), Some(probe)) if all_succeeded && !cancelled => {
                Some(verify_status_endpoint(probe.as_ref(), policy, &cancel).await)
            }
            (Some(_), None) => {
                warn!("Verification configured but no probe available, skipping");
                None
            }
            _ => None,
        };

        let report = ChainReport {
            outcomes,
            cancelled,
            verification,
        };

        info!(
            event = "chain_finished",
            succeeded = report.succeeded_jobs(),
            total = jobs.len(),
            cancelled,
            verification = ?verification,
            exit_code = report.exit_code(),
            "Chain finished: {}/{} jobs succeeded",
            report.succeeded_jobs(),
            jobs.len()
        );

        report
    }

    /// Waits between two jobs; returns `false` when cancelled
    async fn wait_between_builds(&self, cancel: &CancellationToken) -> bool {
        let total = self.config.wait_between_builds.min(MAX_DURATION);
        if total.is_zero() {
            return !cancel.is_cancelled();
        }

        info!("Waiting {}s before the next job", total.as_secs());
        let deadline = Instant::now() + total;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let remaining = deadline - now;
            if remaining < total {
                info!("{}s until the next job", remaining.as_secs());
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = sleep(remaining.min(COUNTDOWN_STEP)) => {}
            }
        }
    }
}
