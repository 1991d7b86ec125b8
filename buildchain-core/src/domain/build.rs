//! Build domain types
//!
//! Values produced by the CI server for a single trigger call: the crumb used
//! to authorize it, the handle it returns, queue state and build snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Anti-forgery token required by the CI server on state-changing requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    /// Header name the token is sent under (e.g. "Jenkins-Crumb")
    pub field: String,
    pub value: String,
}

/// Handle to a queued trigger request that has no build number yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRef {
    /// Absolute URL of the queue item, with a trailing slash
    pub url: String,
}

/// Outcome of an accepted trigger call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerResult {
    /// Server assigned a build number synchronously
    Started(u64),
    /// Server enqueued the request
    Queued(QueueRef),
    /// Server accepted the request without returning any handle
    Accepted,
}

impl TriggerResult {
    pub fn build_number(&self) -> Option<u64> {
        match self {
            TriggerResult::Started(number) => Some(*number),
            _ => None,
        }
    }

    pub fn queue_ref(&self) -> Option<&QueueRef> {
        match self {
            TriggerResult::Queued(queue) => Some(queue),
            _ => None,
        }
    }
}

/// State of a queue item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Build number once the item left the queue
    pub executable: Option<u64>,
    pub cancelled: bool,
    /// Server's explanation for why the item is still waiting
    pub why: Option<String>,
}

/// Status of a remote build as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStatus {
    Running,
    Success,
    Failure,
    Aborted,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BuildStatus::Running)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Running => "running",
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
            BuildStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Result of a single status query for one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSnapshot {
    pub number: u64,
    pub status: BuildStatus,
    /// Elapsed time while running, total duration once finished
    pub duration: Duration,
    pub url: Option<String>,
}

/// The build attributed to one trigger call
///
/// `number` is always strictly greater than the baseline observed before the
/// trigger was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIdentity {
    pub job_name: String,
    pub number: u64,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl fmt::Display for BuildIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.job_name, self.number)
    }
}
