//! Linear-backoff retry for transient client failures

use buildchain_client::Result as ClientResult;
use buildchain_core::config::RetryPolicy;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::RunnerError;

/// Runs `call` until it succeeds, fails permanently, or the attempt ceiling is hit
///
/// Only errors for which [`ClientError::is_transient`] holds are retried;
/// attempt `n` is followed by a wait of `backoff * n`. Cancellation is
/// observed during the wait, never during a call.
///
/// [`ClientError::is_transient`]: buildchain_client::ClientError::is_transient
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    mut call: F,
) -> Result<T, RunnerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation, attempt, policy.max_attempts, e, delay
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(RunnerError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Err(RunnerError::Client(e)),
        }
    }
}
