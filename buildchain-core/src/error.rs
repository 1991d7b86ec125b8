//! Error types for configuration loading

use thiserror::Error;

/// Errors raised while loading or validating the configuration
///
/// All of these are fatal at startup, before any job is triggered.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON or has the wrong shape
    #[error("Malformed config: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Required field is absent or empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Job list is empty or contains an invalid entry
    #[error("Invalid job list: {0}")]
    InvalidJobs(String),

    /// Field present but with an unusable value
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
