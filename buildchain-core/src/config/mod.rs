//! Chain configuration
//!
//! Defines every tunable of a chain run (server connection, job list, build
//! and identity polling, retry, post-run verification) and loads it from the
//! JSON configuration file.

mod jobs;

pub use jobs::{RawJobEntry, normalize_jobs};

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::domain::job::JobSpec;
use crate::error::ConfigError;

/// Upper bound for every configured wait, interval and timeout (one week)
pub const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Basic credential submitted on every request
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    /// Password or API token
    pub secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// How long to wait for a build and how often to ask about it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildPolicy {
    pub timeout: Duration,
    pub check_interval: Duration,
}

impl Default for BuildPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1800),
            check_interval: Duration::from_secs(30),
        }
    }
}

/// Bounds for attributing a build number to a trigger call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Retry ceiling for transient failures before a build is identified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Linear backoff step: attempt `n` waits `backoff * n`
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry `attempt`, saturating instead of overflowing
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

/// What the chain does after a job fails or times out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChainPolicy {
    #[default]
    HaltOnFailure,
    ContinueOnFailure,
}

/// Post-run check of an external status endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub url: String,
    pub max_attempts: u32,
    pub interval: Duration,
    pub expected_status: u16,
}

/// Validated configuration for one chain run
#[derive(Debug, Clone)]
pub struct Configuration {
    /// CI server base URL without trailing slash
    pub base_url: String,
    pub credential: Credential,
    pub branch: String,
    /// Form field the branch is sent under; `None` disables it
    pub branch_parameter: Option<String>,
    pub jobs: Vec<JobSpec>,
    pub wait_between_builds: Duration,
    pub build: BuildPolicy,
    pub identity: IdentityPolicy,
    pub retry: RetryPolicy,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    pub chain_policy: ChainPolicy,
    pub verification: Option<VerificationPolicy>,
}

impl Configuration {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(base_url: impl Into<String>, credential: Credential, jobs: Vec<JobSpec>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
            branch: default_branch(),
            branch_parameter: default_branch_parameter(),
            jobs,
            wait_between_builds: Duration::from_secs(default_wait_between_builds()),
            build: BuildPolicy::default(),
            identity: IdentityPolicy::default(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(default_request_timeout()),
            chain_policy: ChainPolicy::default(),
            verification: None,
        }
    }

    /// Reads and validates a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parses and validates configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        raw.into_configuration()
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::invalid_value(
                "jenkins_url",
                "must start with http:// or https://",
            ));
        }

        if self.credential.username.is_empty() {
            return Err(ConfigError::MissingField("username"));
        }

        if self.jobs.is_empty() {
            return Err(ConfigError::InvalidJobs("job list cannot be empty".to_string()));
        }

        if self.jobs.iter().any(|job| job.name.trim().is_empty()) {
            return Err(ConfigError::InvalidJobs("job name cannot be empty".to_string()));
        }

        require_nonzero("build_config.timeout_seconds", self.build.timeout)?;
        require_nonzero("build_config.check_interval_seconds", self.build.check_interval)?;
        require_nonzero("identity_config.poll_interval_seconds", self.identity.poll_interval)?;
        require_nonzero("identity_config.timeout_seconds", self.identity.timeout)?;
        require_nonzero("request_timeout_seconds", self.request_timeout)?;

        require_bounded("wait_between_builds", self.wait_between_builds)?;
        require_bounded("build_config.timeout_seconds", self.build.timeout)?;
        require_bounded("build_config.check_interval_seconds", self.build.check_interval)?;
        require_bounded("identity_config.poll_interval_seconds", self.identity.poll_interval)?;
        require_bounded("identity_config.timeout_seconds", self.identity.timeout)?;
        require_bounded("retry_config.backoff_seconds", self.retry.backoff)?;
        require_bounded("request_timeout_seconds", self.request_timeout)?;

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid_value(
                "retry_config.max_attempts",
                "must be greater than 0",
            ));
        }

        if let Some(verification) = &self.verification {
            if verification.max_attempts == 0 {
                return Err(ConfigError::invalid_value(
                    "polling_config.max_attempts",
                    "must be greater than 0",
                ));
            }
            if !verification.url.starts_with("http://") && !verification.url.starts_with("https://")
            {
                return Err(ConfigError::invalid_value(
                    "polling_url",
                    "must start with http:// or https://",
                ));
            }
            require_bounded("polling_config.interval_seconds", verification.interval)?;
        }

        Ok(())
    }
}

fn require_nonzero(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::invalid_value(field, "must be greater than 0"));
    }
    Ok(())
}

fn require_bounded(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value > MAX_DURATION {
        return Err(ConfigError::invalid_value(
            field,
            format!("must not exceed {} seconds", MAX_DURATION.as_secs()),
        ));
    }
    Ok(())
}

// =============================================================================
// File Format
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawConfig {
    jenkins_url: Option<String>,
    username: Option<String>,
    password_or_token: Option<String>,
    #[serde(default = "default_branch")]
    branch: String,
    #[serde(default = "default_branch_parameter")]
    branch_parameter: Option<String>,
    #[serde(default)]
    jobs: Option<Vec<RawJobEntry>>,
    #[serde(default)]
    first_job: Option<String>,
    #[serde(default)]
    second_job: Option<String>,
    #[serde(default = "default_wait_between_builds")]
    wait_between_builds: u64,
    #[serde(default)]
    build_config: RawBuildConfig,
    #[serde(default)]
    identity_config: RawIdentityConfig,
    #[serde(default)]
    retry_config: RawRetryConfig,
    #[serde(default = "default_request_timeout")]
    request_timeout_seconds: u64,
    #[serde(default)]
    continue_on_failure: bool,
    #[serde(default)]
    enable_polling: bool,
    #[serde(default)]
    polling_url: Option<String>,
    #[serde(default)]
    polling_config: RawPollingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawBuildConfig {
    timeout_seconds: u64,
    check_interval_seconds: u64,
}

impl Default for RawBuildConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 1800,
            check_interval_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawIdentityConfig {
    poll_interval_seconds: u64,
    timeout_seconds: u64,
}

impl Default for RawIdentityConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 2,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawRetryConfig {
    max_attempts: u32,
    backoff_seconds: u64,
}

impl Default for RawRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_seconds: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawPollingConfig {
    max_attempts: u32,
    interval_seconds: u64,
    expected_status_code: u16,
}

impl Default for RawPollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval_seconds: 30,
            expected_status_code: 200,
        }
    }
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_branch_parameter() -> Option<String> {
    Some("BRANCH".to_string())
}

fn default_wait_between_builds() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30
}

impl RawConfig {
    fn into_configuration(self) -> Result<Configuration, ConfigError> {
        let base_url = required(self.jenkins_url, "jenkins_url")?;
        let username = required(self.username, "username")?;
        let secret = self
            .password_or_token
            .ok_or(ConfigError::MissingField("password_or_token"))?;

        let jobs = normalize_jobs(
            self.jobs.as_deref(),
            self.first_job.as_deref(),
            self.second_job.as_deref(),
        )?;

        let verification = if self.enable_polling {
            let url = required(self.polling_url, "polling_url")?;
            Some(VerificationPolicy {
                url,
                max_attempts: self.polling_config.max_attempts,
                interval: Duration::from_secs(self.polling_config.interval_seconds),
                expected_status: self.polling_config.expected_status_code,
            })
        } else {
            None
        };

        let mut config = Configuration::new(base_url, Credential { username, secret }, jobs);
        config.branch = self.branch;
        config.branch_parameter = self.branch_parameter.filter(|p| !p.is_empty());
        config.wait_between_builds = Duration::from_secs(self.wait_between_builds);
        config.build = BuildPolicy {
            timeout: Duration::from_secs(self.build_config.timeout_seconds),
            check_interval: Duration::from_secs(self.build_config.check_interval_seconds),
        };
        config.identity = IdentityPolicy {
            poll_interval: Duration::from_secs(self.identity_config.poll_interval_seconds),
            timeout: Duration::from_secs(self.identity_config.timeout_seconds),
        };
        config.retry = RetryPolicy {
            max_attempts: self.retry_config.max_attempts,
            backoff: Duration::from_secs(self.retry_config.backoff_seconds),
        };
        config.request_timeout = Duration::from_secs(self.request_timeout_seconds);
        config.chain_policy = if self.continue_on_failure {
            ChainPolicy::ContinueOnFailure
        } else {
            ChainPolicy::HaltOnFailure
        };
        config.verification = verification;

        config.validate()?;
        Ok(config)
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingField(field))
}
