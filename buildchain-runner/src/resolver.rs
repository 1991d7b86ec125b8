//! Build identity resolver
//!
//! Turns a trigger response plus the pre-trigger baseline into the build
//! number that belongs to *this* trigger call.
//!
//! A number is only ever accepted when it is strictly greater than the
//! baseline (or when the job had no builds before). This keeps a build that
//! was already running, or that another actor started, from being attributed
//! to the current trigger.

use buildchain_client::CiClient;
use buildchain_core::config::{IdentityPolicy, MAX_DURATION};
use buildchain_core::domain::build::{BuildIdentity, TriggerResult};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::IdentityError;

/// Resolves trigger responses into [`BuildIdentity`] values
pub struct BuildIdentityResolver<'a> {
    client: &'a dyn CiClient,
    policy: IdentityPolicy,
}

impl<'a> BuildIdentityResolver<'a> {
    pub fn new(client: &'a dyn CiClient, policy: IdentityPolicy) -> Self {
        Self { client, policy }
    }

    /// Determines the build number assigned to a trigger call
    ///
    /// # Arguments
    /// * `job_name` - The triggered job
    /// * `baseline` - Latest build number observed right before triggering
    /// * `trigger` - Response of the trigger call
    /// * `cancel` - Checked between polling attempts
    ///
    /// A synchronous build number not newer than the baseline is treated as
    /// a conflict and resolution falls back to polling; if polling then times
    /// out, the conflict is reported instead of the timeout.
    pub async fn resolve(
        &self,
        job_name: &str,
        baseline: Option<u64>,
        trigger: &TriggerResult,
        cancel: &CancellationToken,
    ) -> Result<BuildIdentity, IdentityError> {
        let mut conflict = None;

        if let Some(number) = trigger.build_number() {
            if is_newer(number, baseline) {
                return Ok(self.identity(job_name, number, "trigger response"));
            }
            warn!(
                event = "identity_conflict",
                job = %job_name,
                reported = number,
                baseline = ?baseline,
                "Trigger reported a build that is not newer than the baseline, polling instead"
            );
            conflict = Some(number);
        }

        let queue = trigger.queue_ref();
        let deadline = Instant::now() + self.policy.timeout.min(MAX_DURATION);
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(IdentityError::Cancelled {
                    job: job_name.to_string(),
                });
            }
            attempt += 1;

            if let Some(queue) = queue {
                match self.client.queue_item(queue).await {
                    Ok(item) => match item.executable {
                        Some(number) if is_newer(number, baseline) => {
                            return Ok(self.identity(job_name, number, "queue item"));
                        }
                        Some(number) => {
                            warn!(
                                event = "identity_conflict",
                                job = %job_name,
                                reported = number,
                                baseline = ?baseline,
                                "Queue item points at a build that is not newer than the baseline"
                            );
                            conflict = Some(number);
                        }
                        None if item.cancelled => {
                            return Err(IdentityError::QueueCancelled {
                                job: job_name.to_string(),
                            });
                        }
                        None => debug!(
                            job = %job_name,
                            attempt,
                            why = item.why.as_deref().unwrap_or("unknown"),
                            "Waiting for queue to assign a build number"
                        ),
                    },
                    // Finished queue items expire; the latest build number still applies
                    Err(e) if e.is_transient() || e.is_not_found() => {
                        debug!(job = %job_name, error = %e, "Queue item unavailable");
                    }
                    Err(source) => {
                        return Err(IdentityError::Client {
                            job: job_name.to_string(),
                            source,
                        });
                    }
                }
            }

            match self.client.latest_build_number(job_name).await {
                Ok(Some(number)) if is_newer(number, baseline) => {
                    if queue.is_some() {
                        warn!(
                            event = "identity_fallback",
                            job = %job_name,
                            build = number,
                            baseline = ?baseline,
                            "Queue item did not report a build, using the latest build number"
                        );
                    }
                    return Ok(self.identity(job_name, number, "latest build"));
                }
                Ok(latest) => debug!(
                    job = %job_name,
                    attempt,
                    latest = ?latest,
                    baseline = ?baseline,
                    "No new build yet"
                ),
                Err(e) if e.is_transient() => {
                    warn!(job = %job_name, error = %e, "Latest build query failed, retrying");
                }
                Err(source) => {
                    return Err(IdentityError::Client {
                        job: job_name.to_string(),
                        source,
                    });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(IdentityError::Cancelled { job: job_name.to_string() });
                }
                _ = sleep(self.policy.poll_interval.min(deadline - now)) => {}
            }
        }

        Err(match conflict {
            Some(reported) => IdentityError::Conflict {
                job: job_name.to_string(),
                reported,
                baseline,
            },
            None => IdentityError::Timeout {
                job: job_name.to_string(),
                baseline,
                waited: self.policy.timeout,
            },
        })
    }

    fn identity(&self, job_name: &str, number: u64, source: &str) -> BuildIdentity {
        info!(
            event = "build_resolved",
            job = %job_name,
            build = number,
            source,
            "Resolved build number #{}",
            number
        );
        BuildIdentity {
            job_name: job_name.to_string(),
            number,
            started_at: chrono::Utc::now(),
        }
    }
}

/// The disambiguation rule: only builds newer than the baseline belong to us
fn is_newer(number: u64, baseline: Option<u64>) -> bool {
    baseline.is_none_or(|baseline| number > baseline)
}
