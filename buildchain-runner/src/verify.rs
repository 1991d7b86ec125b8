//! Post-run verification of an external status endpoint

use buildchain_client::StatusProbe;
use buildchain_core::config::VerificationPolicy;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Polls `policy.url` until it answers with the expected status
///
/// Returns `false` when every attempt is used up or the run is cancelled.
pub async fn verify_status_endpoint(
    probe: &dyn StatusProbe,
    policy: &VerificationPolicy,
    cancel: &CancellationToken,
) -> bool {
    info!(
        url = %policy.url,
        expected = policy.expected_status,
        max_attempts = policy.max_attempts,
        "Verifying status endpoint"
    );

    for attempt in 1..=policy.max_attempts {
        match probe.probe(&policy.url).await {
            Ok(status) if status == policy.expected_status => {
                info!(url = %policy.url, attempt, "Status endpoint returned {}", status);
                return true;
            }
            Ok(status) => info!(
                url = %policy.url,
                "Attempt {}/{}: got {}, expected {}",
                attempt,
                policy.max_attempts,
                status,
                policy.expected_status
            ),
            Err(e) => warn!(
                url = %policy.url,
                error = %e,
                "Attempt {}/{} failed",
                attempt,
                policy.max_attempts
            ),
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("Verification cancelled");
                    return false;
                }
                _ = sleep(policy.interval) => {}
            }
        }
    }

    warn!(
        url = %policy.url,
        "Status endpoint did not return {} after {} attempts",
        policy.expected_status,
        policy.max_attempts
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProbe;
    use std::time::Duration;
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> VerificationPolicy {
        VerificationPolicy {
            url: "http://status.internal/health".to_string(),
            max_attempts,
            interval: Duration::from_secs(30),
            expected_status: 200,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_once_expected_status_appears() {
        let probe = ScriptedProbe::new([503, 502, 200]);
        let started = Instant::now();

        assert!(verify_status_endpoint(&probe, &policy(5), &CancellationToken::new()).await);
        assert_eq!(probe.calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let probe = ScriptedProbe::new([404]);

        assert!(!verify_status_endpoint(&probe, &policy(4), &CancellationToken::new()).await);
        assert_eq!(probe.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_verification() {
        let probe = ScriptedProbe::new([503]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(!verify_status_endpoint(&probe, &policy(10), &cancel).await);
        assert_eq!(probe.calls(), 1);
    }
}
