//! Chain report and process exit codes

use buildchain_core::domain::job::{FailureKind, JobOutcome, OutcomeStatus};

pub const EXIT_SUCCESS: i32 = 0;
/// Configuration could not be loaded or the client could not start
pub const EXIT_CONFIG: i32 = 1;
pub const EXIT_TRIGGER: i32 = 2;
pub const EXIT_IDENTITY: i32 = 3;
pub const EXIT_TIMEOUT: i32 = 4;
pub const EXIT_BUILD_FAILED: i32 = 5;
pub const EXIT_VERIFICATION: i32 = 6;
/// Conventional 128 + SIGINT
pub const EXIT_CANCELLED: i32 = 130;

/// Result of a whole chain invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ChainReport {
    /// One outcome per executed job, in configured order
    pub outcomes: Vec<JobOutcome>,
    /// Cancellation was requested at some point during the run
    pub cancelled: bool,
    /// Post-run verification result, `None` when it did not run
    pub verification: Option<bool>,
}

impl ChainReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code() == EXIT_SUCCESS
    }

    /// Number of jobs that finished successfully
    pub fn succeeded_jobs(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Succeeded)
            .count()
    }

    /// Maps the report to a process exit code
    ///
    /// The first unsuccessful outcome in chain order decides. Without one,
    /// cancellation yields 130 and a failed verification yields 6.
    pub fn exit_code(&self) -> i32 {
        let first_problem = self
            .outcomes
            .iter()
            .map(|o| o.status)
            .find(|status| *status != OutcomeStatus::Succeeded);

        match first_problem {
            Some(status) => exit_code_for(status),
            None if self.cancelled => EXIT_CANCELLED,
            None if self.verification == Some(false) => EXIT_VERIFICATION,
            None => EXIT_SUCCESS,
        }
    }
}

fn exit_code_for(status: OutcomeStatus) -> i32 {
    match status {
        OutcomeStatus::Succeeded => EXIT_SUCCESS,
        OutcomeStatus::Failed(FailureKind::Auth | FailureKind::Trigger | FailureKind::Network) => {
            EXIT_TRIGGER
        }
        OutcomeStatus::Failed(FailureKind::Identity) => EXIT_IDENTITY,
        OutcomeStatus::Failed(FailureKind::Build) => EXIT_BUILD_FAILED,
        OutcomeStatus::TimedOut => EXIT_TIMEOUT,
        OutcomeStatus::Stopped | OutcomeStatus::Abandoned => EXIT_CANCELLED,
    }
}
