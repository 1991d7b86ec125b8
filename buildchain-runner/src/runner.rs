//! Job runner
//!
//! Moves a single job through its lifecycle:
//! `Pending → Triggering → Identifying → Running → terminal`.
//!
//! The runner never returns an error. Every failure is converted into a
//! terminal [`JobOutcome`] so the orchestrator only ever deals with outcomes.

use buildchain_client::{CiClient, ClientError};
use buildchain_core::Configuration;
use buildchain_core::domain::build::{BuildIdentity, BuildStatus};
use buildchain_core::domain::job::{FailureKind, JobOutcome, JobSpec, JobState, OutcomeStatus};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{IdentityError, RunnerError};
use crate::prompt::StopPrompt;
use crate::resolver::BuildIdentityResolver;
use crate::retry::with_retry;
use crate::state::RunState;

/// Executes one job of the chain to a terminal outcome
pub struct JobRunner<'a> {
    client: &'a dyn CiClient,
    prompt: &'a dyn StopPrompt,
    config: &'a Configuration,
}

/// Tracks the state machine of one job and logs every transition
struct Lifecycle<'j> {
    job: &'j str,
    state: JobState,
    started: Instant,
}

impl<'j> Lifecycle<'j> {
    fn new(job: &'j str) -> Self {
        Self {
            job,
            state: JobState::Pending,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: JobState, build: Option<u64>) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        info!(
            event = "state_transition",
            job = %self.job,
            from = %self.state,
            to = %next,
            build = ?build,
            "{}: {} -> {}",
            self.job,
            self.state,
            next
        );
        self.state = next;
    }

    fn finish(mut self, status: OutcomeStatus, build: Option<u64>, detail: Option<String>) -> JobOutcome {
        self.advance(status.state(), build);
        JobOutcome {
            job_name: self.job.to_string(),
            build_number: build,
            status,
            duration: self.started.elapsed(),
            detail,
        }
    }
}

/// How the watch loop ended
enum Watch {
    Finished(OutcomeStatus, Option<String>),
    Interrupted,
}

impl<'a> JobRunner<'a> {
    pub fn new(client: &'a dyn CiClient, prompt: &'a dyn StopPrompt, config: &'a Configuration) -> Self {
        Self {
            client,
            prompt,
            config,
        }
    }

    /// Runs `job` to completion
    ///
    /// The build in flight is published through `state` while it runs.
    pub async fn run(&self, job: &JobSpec, state: &mut RunState) -> JobOutcome {
        let cancel = state.cancel_token().clone();
        let mut lifecycle = Lifecycle::new(&job.name);

        lifecycle.advance(JobState::Triggering, None);

        let baseline = match with_retry(&self.config.retry, &cancel, "Latest build query", || {
            self.client.latest_build_number(&job.name)
        })
        .await
        {
            Ok(baseline) => baseline,
            Err(e) => return trigger_failure(lifecycle, e),
        };

        info!(job = %job.name, baseline = ?baseline, "Recorded baseline build number");

        let trigger = match with_retry(&self.config.retry, &cancel, "Trigger", || {
            self.client.trigger_job(job, &self.config.branch)
        })
        .await
        {
            Ok(trigger) => trigger,
            Err(e) => return trigger_failure(lifecycle, e),
        };

        info!(
            event = "job_triggered",
            job = %job.name,
            branch = %self.config.branch,
            response = ?trigger,
            "Triggered {}",
            job.display_description()
        );

        lifecycle.advance(JobState::Identifying, None);

        let resolver = BuildIdentityResolver::new(self.client, self.config.identity);
        let build = match resolver.resolve(&job.name, baseline, &trigger, &cancel).await {
            Ok(build) => build,
            Err(IdentityError::Cancelled { .. }) => {
                return lifecycle.finish(
                    OutcomeStatus::Abandoned,
                    None,
                    Some("cancelled before the build number was known".to_string()),
                );
            }
            Err(e) => {
                error!(job = %job.name, baseline = ?baseline, error = %e, "Build identity resolution failed");
                return lifecycle.finish(
                    OutcomeStatus::Failed(FailureKind::Identity),
                    None,
                    Some(e.to_string()),
                );
            }
        };

        let number = build.number;
        state.set_current_build(build.clone());
        lifecycle.advance(JobState::Running, Some(number));

        let (status, detail) = match self.watch(&build, &cancel).await {
            Watch::Finished(status, detail) => (status, detail),
            Watch::Interrupted => self.interrupt(&build).await,
        };

        state.clear_current_build();
        lifecycle.finish(status, Some(number), detail)
    }

    /// Polls the build until it finishes, times out, or the chain is cancelled
    async fn watch(&self, build: &BuildIdentity, cancel: &CancellationToken) -> Watch {
        let policy = &self.config.build;
        let started = Instant::now();

        loop {
            if cancel.is_cancelled() {
                return Watch::Interrupted;
            }

            match self.client.build_status(&build.job_name, build.number).await {
                Ok(snapshot) => {
                    if snapshot.number != build.number {
                        warn!(
                            job = %build.job_name,
                            requested = build.number,
                            reported = snapshot.number,
                            "Status response belongs to a different build"
                        );
                    }

                    info!(
                        event = "build_status",
                        job = %build.job_name,
                        build = build.number,
                        status = %snapshot.status,
                        duration = ?snapshot.duration,
                        "{} is {}",
                        build,
                        snapshot.status
                    );

                    match snapshot.status {
                        BuildStatus::Running => {}
                        BuildStatus::Success => {
                            return Watch::Finished(OutcomeStatus::Succeeded, snapshot.url);
                        }
                        BuildStatus::Failure | BuildStatus::Aborted => {
                            let mut detail = format!("build {} finished with {}", build, snapshot.status);
                            if let Some(url) = snapshot.url {
                                detail.push_str(&format!(" ({})", url));
                            }
                            return Watch::Finished(OutcomeStatus::Failed(FailureKind::Build), Some(detail));
                        }
                    }
                }
                Err(e) if e.is_auth() => {
                    error!(job = %build.job_name, build = build.number, error = %e, "Status query rejected");
                    return Watch::Finished(OutcomeStatus::Failed(FailureKind::Auth), Some(e.to_string()));
                }
                Err(e) if e.is_transient() => {
                    warn!(job = %build.job_name, build = build.number, error = %e, "Status query failed");
                }
                Err(e) => {
                    // Missing build or unreadable status, another poll will not change it
                    error!(job = %build.job_name, build = build.number, error = %e, "Build status unavailable");
                    return Watch::Finished(
                        OutcomeStatus::Failed(FailureKind::Identity),
                        Some(format!("cannot read status of {}: {}", build, e)),
                    );
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= policy.timeout {
                // The remote build is deliberately left untouched
                warn!(
                    job = %build.job_name,
                    build = build.number,
                    timeout = ?policy.timeout,
                    "Build did not finish in time, leaving it running"
                );
                return Watch::Finished(
                    OutcomeStatus::TimedOut,
                    Some(format!("{} still running after {:?}", build, policy.timeout)),
                );
            }

            tokio::select! {
                _ = cancel.cancelled() => return Watch::Interrupted,
                _ = sleep(policy.check_interval.min(policy.timeout - elapsed)) => {}
            }
        }
    }

    /// Asks whether to stop the running build and acts on the answer
    async fn interrupt(&self, build: &BuildIdentity) -> (OutcomeStatus, Option<String>) {
        warn!(
            event = "cancel_requested",
            job = %build.job_name,
            build = build.number,
            "Interrupted while {} is running",
            build
        );

        if !self.prompt.confirm_stop(build).await {
            info!(
                event = "cancel_resolved",
                job = %build.job_name,
                build = build.number,
                action = "left_running",
                "Leaving {} running",
                build
            );
            return (OutcomeStatus::Abandoned, Some(format!("{} left running", build)));
        }

        // The user's decision stands even if the stop request fails
        let detail = match self.client.stop_build(&build.job_name, build.number).await {
            Ok(()) => format!("stop requested for {}", build),
            Err(e) => {
                error!(job = %build.job_name, build = build.number, error = %e, "Failed to stop build");
                format!("stop request for {} failed: {}", build, e)
            }
        };

        info!(
            event = "cancel_resolved",
            job = %build.job_name,
            build = build.number,
            action = "stopped",
            "{}",
            detail
        );

        (OutcomeStatus::Stopped, Some(detail))
    }
}

/// Converts a failed baseline or trigger call into a terminal outcome
fn trigger_failure(lifecycle: Lifecycle<'_>, err: RunnerError) -> JobOutcome {
    match err {
        RunnerError::Cancelled => lifecycle.finish(
            OutcomeStatus::Abandoned,
            None,
            Some("cancelled before the job was triggered".to_string()),
        ),
        RunnerError::Client(e) => {
            error!(job = %lifecycle.job, status = ?e.status(), error = %e, "Failed to trigger job");
            lifecycle.finish(OutcomeStatus::Failed(classify(&e)), None, Some(e.to_string()))
        }
    }
}

fn classify(err: &ClientError) -> FailureKind {
    if err.is_auth() {
        FailureKind::Auth
    } else if err.is_transient() {
        FailureKind::Network
    } else {
        FailureKind::Trigger
    }
}
