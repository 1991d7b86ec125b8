//! Dry run

use anyhow::Result;
use buildchain_core::Configuration;
use buildchain_core::config::ChainPolicy;
use buildchain_runner::report::EXIT_SUCCESS;
use colored::*;

use crate::config::Config;

pub fn handle_dry_run(config: &Config) -> Result<i32> {
    let configuration = config.load_configuration()?;

    println!("{}", "Dry run, nothing will be triggered".yellow().bold());
    println!();
    for line in render_plan(&configuration) {
        println!("{}", line);
    }

    Ok(EXIT_SUCCESS)
}

/// Plain-text description of what a run would do
fn render_plan(config: &Configuration) -> Vec<String> {
    let mut lines = vec![
        format!("Server:        {}", config.base_url),
        format!("User:          {}", config.credential.username),
        match &config.branch_parameter {
            Some(parameter) => format!("Branch:        {} (as {})", config.branch, parameter),
            None => format!("Branch:        {} (not sent)", config.branch),
        },
        String::new(),
        format!("Jobs ({}):", config.jobs.len()),
    ];

    for (index, job) in config.jobs.iter().enumerate() {
        let mut line = format!("  {}. {}", index + 1, job.name);
        if let Some(description) = &job.description {
            line.push_str(&format!(" - {}", description));
        }
        lines.push(line);
        for (key, value) in &job.parameters {
            lines.push(format!("       {}={}", key, value));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Wait between builds: {}s",
        config.wait_between_builds.as_secs()
    ));
    lines.push(format!(
        "Build timeout:       {}s (checked every {}s)",
        config.build.timeout.as_secs(),
        config.build.check_interval.as_secs()
    ));
    lines.push(format!(
        "Identity timeout:    {}s (polled every {}s)",
        config.identity.timeout.as_secs(),
        config.identity.poll_interval.as_secs()
    ));
    lines.push(format!(
        "Retries:             {} attempts, {}s linear backoff",
        config.retry.max_attempts,
        config.retry.backoff.as_secs()
    ));
    lines.push(format!(
        "On failure:          {}",
        match config.chain_policy {
            ChainPolicy::HaltOnFailure => "halt the chain",
            ChainPolicy::ContinueOnFailure => "continue with the next job",
        }
    ));
    if let Some(verification) = &config.verification {
        lines.push(format!(
            "Verification:        {} expecting {} ({} attempts, every {}s)",
            verification.url,
            verification.expected_status,
            verification.max_attempts,
            verification.interval.as_secs()
        ));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_lists_jobs_in_order() {
        let config = Configuration::from_json_str(
            r#"{
                "jenkins_url": "https://ci.example.com",
                "username": "deployer",
                "password_or_token": "secret",
                "jobs": [
                    {"name": "build-app", "description": "Build", "parameters": {"TARGET": "release"}},
                    "deploy-app"
                ]
            }"#,
        )
        .unwrap();

        let plan = render_plan(&config);

        let build = plan.iter().position(|l| l == "  1. build-app - Build").unwrap();
        let deploy = plan.iter().position(|l| l == "  2. deploy-app").unwrap();
        assert!(build < deploy);
        assert!(plan.contains(&"       TARGET=release".to_string()));
        assert!(plan.contains(&"Branch:        master (as BRANCH)".to_string()));
        assert!(plan.iter().all(|l| !l.contains("secret")));
    }
}
