//! Run state
//!
//! Mutable state of one chain invocation. Owned by the orchestrator and lent
//! to the job runner; the interrupt handler only ever touches the
//! cancellation token, through its own clone.

use buildchain_core::domain::build::BuildIdentity;
use buildchain_core::domain::job::JobOutcome;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct RunState {
    current_index: Option<usize>,
    current_build: Option<BuildIdentity>,
    outcomes: Vec<JobOutcome>,
    cancel: CancellationToken,
}

impl RunState {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            current_index: None,
            current_build: None,
            outcomes: Vec::new(),
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Index of the job currently being executed
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Build that is in flight, if any
    pub fn current_build(&self) -> Option<&BuildIdentity> {
        self.current_build.as_ref()
    }

    pub(crate) fn begin_job(&mut self, index: usize) {
        self.current_index = Some(index);
        self.current_build = None;
    }

    pub(crate) fn set_current_build(&mut self, build: BuildIdentity) {
        self.current_build = Some(build);
    }

    pub(crate) fn clear_current_build(&mut self) {
        self.current_build = None;
    }

    /// Appends a terminal outcome; outcomes are never modified afterwards
    pub(crate) fn record(&mut self, outcome: JobOutcome) {
        self.current_build = None;
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<JobOutcome> {
        self.outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildchain_core::domain::job::OutcomeStatus;
    use std::time::Duration;

    #[test]
    fn test_record_clears_current_build() {
        let mut state = RunState::new(CancellationToken::new());
        state.begin_job(0);
        state.set_current_build(BuildIdentity {
            job_name: "build-app".to_string(),
            number: 123,
            started_at: chrono::Utc::now(),
        });
        assert_eq!(state.current_build().map(|b| b.number), Some(123));

        state.record(JobOutcome {
            job_name: "build-app".to_string(),
            build_number: Some(123),
            status: OutcomeStatus::Succeeded,
            duration: Duration::from_secs(1),
            detail: None,
        });

        assert!(state.current_build().is_none());
        assert_eq!(state.current_index(), Some(0));
        assert_eq!(state.outcomes().len(), 1);
    }

    #[test]
    fn test_cancellation_is_shared_with_clones() {
        let token = CancellationToken::new();
        let state = RunState::new(token.clone());
        assert!(!state.is_cancelled());
        token.cancel();
        assert!(state.is_cancelled());
    }
}
