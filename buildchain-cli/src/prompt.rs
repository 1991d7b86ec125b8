//! Interactive stop confirmation

use async_trait::async_trait;
use buildchain_core::domain::build::BuildIdentity;
use buildchain_runner::{FixedAnswer, StopPrompt};
use clap::ValueEnum;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::warn;

/// Behavior for a running build when the chain is interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InterruptAction {
    /// Ask on stdin
    Ask,
    /// Always stop the build
    Stop,
    /// Always leave the build running
    Keep,
}

impl InterruptAction {
    pub fn prompt(self) -> Arc<dyn StopPrompt> {
        match self {
            InterruptAction::Ask => Arc::new(StdinPrompt),
            InterruptAction::Stop => Arc::new(FixedAnswer(true)),
            InterruptAction::Keep => Arc::new(FixedAnswer(false)),
        }
    }
}

/// Reads the answer from stdin on a blocking thread
pub struct StdinPrompt;

#[async_trait]
impl StopPrompt for StdinPrompt {
    async fn confirm_stop(&self, build: &BuildIdentity) -> bool {
        let question = format!("Stop {} on the server? [y/N] ", build);

        match tokio::task::spawn_blocking(move || ask(&question)).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Stop prompt failed: {}", e);
                false
            }
        }
    }
}

/// EOF and read errors count as "no"
fn ask(question: &str) -> bool {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    print!("{}", question);
    loop {
        let _ = io::stdout().flush();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => match parse_answer(&line) {
                Some(answer) => return answer,
                None => print!("Please answer y or n: "),
            },
        }
    }
}

fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "" | "n" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y\n"), Some(true));
        assert_eq!(parse_answer("  YES \n"), Some(true));
        assert_eq!(parse_answer("n\n"), Some(false));
        assert_eq!(parse_answer("No"), Some(false));
        assert_eq!(parse_answer("\n"), Some(false));
        assert_eq!(parse_answer("maybe"), None);
    }

    #[tokio::test]
    async fn test_fixed_actions() {
        let build = BuildIdentity {
            job_name: "build-app".to_string(),
            number: 1,
            started_at: chrono::Utc::now(),
        };

        assert!(InterruptAction::Stop.prompt().confirm_stop(&build).await);
        assert!(!InterruptAction::Keep.prompt().confirm_stop(&build).await);
    }
}
