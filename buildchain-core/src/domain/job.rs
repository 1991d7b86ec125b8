//! Job domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// A job in the configured chain
///
/// Immutable once loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl JobSpec {
    /// Creates an unparameterized job
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Human-readable description, falling back to the job name
    pub fn display_description(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }
}

/// Lifecycle state of a single job inside the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Triggering,
    Identifying,
    Running,
    Succeeded,
    Failed,
    Stopped,
    TimedOut,
    /// Interrupted without stopping the remote build
    Abandoned,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded
                | JobState::Failed
                | JobState::Stopped
                | JobState::TimedOut
                | JobState::Abandoned
        )
    }

    /// Checks whether the state machine allows moving from `self` to `next`
    ///
    /// Terminal states never transition again.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Pending, Triggering) => true,
            (Pending, Abandoned) => true,
            (Triggering, Identifying) => true,
            (Triggering, Failed) => true,
            (Triggering, Abandoned) => true,
            (Identifying, Running) => true,
            (Identifying, Failed) => true,
            (Identifying, Abandoned) => true,
            (Running, Running) => true,
            (Running, Succeeded | Failed | Stopped | TimedOut | Abandoned) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Triggering => "triggering",
            JobState::Identifying => "identifying",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Stopped => "stopped",
            JobState::TimedOut => "timed-out",
            JobState::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// Why a job ended in the failed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Credentials or crumb rejected
    Auth,
    /// Server refused the trigger (unknown job, bad parameters, forbidden)
    Trigger,
    /// Server unreachable after all retries
    Network,
    /// Build number could not be attributed to this trigger, or the
    /// attributed build could no longer be read
    Identity,
    /// The remote build itself failed or was aborted
    Build,
}

/// Terminal status recorded in a [`JobOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Succeeded,
    Failed(FailureKind),
    Stopped,
    TimedOut,
    Abandoned,
}

impl OutcomeStatus {
    /// State-machine state this outcome terminates in
    pub fn state(self) -> JobState {
        match self {
            OutcomeStatus::Succeeded => JobState::Succeeded,
            OutcomeStatus::Failed(_) => JobState::Failed,
            OutcomeStatus::Stopped => JobState::Stopped,
            OutcomeStatus::TimedOut => JobState::TimedOut,
            OutcomeStatus::Abandoned => JobState::Abandoned,
        }
    }

    /// True for outcomes caused by user cancellation
    pub fn is_cancellation(self) -> bool {
        matches!(self, OutcomeStatus::Stopped | OutcomeStatus::Abandoned)
    }

    /// True for outcomes that halt a fail-fast chain
    pub fn is_failure(self) -> bool {
        matches!(self, OutcomeStatus::Failed(_) | OutcomeStatus::TimedOut)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Failed(kind) => write!(f, "failed ({:?})", kind),
            other => write!(f, "{}", other.state()),
        }
    }
}

/// Immutable terminal record of one job's execution within the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_name: String,
    pub build_number: Option<u64>,
    pub status: OutcomeStatus,
    pub duration: Duration,
    /// Diagnostic context (HTTP status/body, resolver error, build URL)
    pub detail: Option<String>,
}
