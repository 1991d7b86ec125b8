//! Error types for the runner

use buildchain_client::ClientError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a retried client call
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Cancellation observed while waiting to retry
    #[error("cancelled")]
    Cancelled,
}

/// The build number of a trigger call could not be determined
///
/// Ambiguous attribution is never guessed: every variant is fatal for the job.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The server reported a build number that is not newer than the baseline
    #[error(
        "build number for {job} conflicts with baseline: server reported #{reported}, baseline {}",
        describe_baseline(.baseline)
    )]
    Conflict {
        job: String,
        reported: u64,
        baseline: Option<u64>,
    },

    /// No build newer than the baseline appeared in time
    #[error(
        "no new build of {job} appeared within {waited:?} (baseline {})",
        describe_baseline(.baseline)
    )]
    Timeout {
        job: String,
        baseline: Option<u64>,
        waited: Duration,
    },

    /// The queue item was cancelled on the server before it started
    #[error("queue item for {job} was cancelled before a build started")]
    QueueCancelled { job: String },

    /// A non-transient client error during resolution
    #[error("failed to query {job} while resolving its build number: {source}")]
    Client {
        job: String,
        #[source]
        source: ClientError,
    },

    /// Cancellation observed between resolution attempts
    #[error("build number resolution for {job} was cancelled")]
    Cancelled { job: String },
}

fn describe_baseline(baseline: &Option<u64>) -> String {
    match baseline {
        Some(number) => format!("#{}", number),
        None => "none".to_string(),
    }
}
