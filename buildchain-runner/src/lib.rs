//! Buildchain Runner
//!
//! Drives a configured chain of CI jobs, strictly one after another.
//!
//! Architecture:
//! - Resolver: attributes a build number to each trigger call
//! - Runner: moves one job through trigger → identify → poll → terminal state
//! - Orchestrator: iterates the chain, waits between jobs, owns cancellation
//! - Verification: optional post-run check of an external status endpoint
//!
//! Cancellation is cooperative. A [`CancellationToken`] is checked before each
//! trigger, between poll iterations and during every wait; an in-flight HTTP
//! request is never aborted.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod report;
pub mod resolver;
mod retry;
pub mod runner;
pub mod state;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{IdentityError, RunnerError};
pub use orchestrator::ChainOrchestrator;
pub use prompt::{FixedAnswer, StopPrompt};
pub use report::ChainReport;
pub use resolver::BuildIdentityResolver;
pub use runner::JobRunner;
pub use state::RunState;
