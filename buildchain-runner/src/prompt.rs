//! Stop confirmation
//!
//! When the chain is interrupted while a build is running, the user decides
//! whether the remote build should be stopped or left running.

use async_trait::async_trait;
use buildchain_core::domain::build::BuildIdentity;

/// Asks whether an in-flight build should be stopped
#[async_trait]
pub trait StopPrompt: Send + Sync {
    /// Returns `true` to stop the build, `false` to leave it running
    async fn confirm_stop(&self, build: &BuildIdentity) -> bool;
}

/// Non-interactive answer, configured up front
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl StopPrompt for FixedAnswer {
    async fn confirm_stop(&self, _build: &BuildIdentity) -> bool {
        self.0
    }
}
