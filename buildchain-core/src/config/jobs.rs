//! Job-list normalization
//!
//! The configuration file may describe the chain in three shapes:
//! - `"jobs": [{"name": ..., "description": ..., "parameters": {...}}]`
//! - `"jobs": ["name-a", "name-b"]`
//! - legacy `"first_job"` / `"second_job"` fields
//!
//! [`normalize_jobs`] is the single place that detects the shape and produces
//! the canonical ordered [`JobSpec`] sequence.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::domain::job::JobSpec;
use crate::error::ConfigError;

/// One entry of the `jobs` array as written in the file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawJobEntry {
    Name(String),
    Spec {
        name: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        parameters: BTreeMap<String, JsonValue>,
    },
    /// Anything else; rejected during normalization
    Other(JsonValue),
}

/// Converts any of the accepted job-list shapes into the canonical sequence
///
/// A non-empty `jobs` array wins over the legacy fields. The second legacy
/// job is skipped when it is empty or repeats the first one.
pub fn normalize_jobs(
    jobs: Option<&[RawJobEntry]>,
    first_job: Option<&str>,
    second_job: Option<&str>,
) -> Result<Vec<JobSpec>, ConfigError> {
    let specs = match jobs {
        Some(entries) if !entries.is_empty() => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| normalize_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?,
        _ => normalize_legacy(first_job, second_job),
    };

    if specs.is_empty() {
        return Err(ConfigError::InvalidJobs(
            "no jobs configured (expected `jobs` or `first_job`)".to_string(),
        ));
    }

    if let Some(job) = specs.iter().find(|job| job.name.trim().is_empty()) {
        return Err(ConfigError::InvalidJobs(format!(
            "job name cannot be empty (description: {:?})",
            job.description
        )));
    }

    Ok(specs)
}

fn normalize_entry(index: usize, entry: &RawJobEntry) -> Result<JobSpec, ConfigError> {
    match entry {
        RawJobEntry::Name(name) => Ok(JobSpec::new(name.clone())),
        RawJobEntry::Spec {
            name,
            description,
            parameters,
        } => Ok(JobSpec {
            name: name.clone(),
            description: description.clone(),
            parameters: parameters
                .iter()
                .map(|(key, value)| (key.clone(), parameter_value(value)))
                .collect(),
        }),
        RawJobEntry::Other(value) => Err(ConfigError::InvalidJobs(format!(
            "entry {} must be a job name or an object with a `name` field, got {}",
            index, value
        ))),
    }
}

fn normalize_legacy(first_job: Option<&str>, second_job: Option<&str>) -> Vec<JobSpec> {
    let mut specs = Vec::new();

    let Some(first) = first_job else {
        return specs;
    };
    specs.push(JobSpec::new(first));

    match second_job {
        Some(second) if !second.is_empty() && second != first => {
            specs.push(JobSpec::new(second));
        }
        _ => {}
    }

    specs
}

/// Parameters are sent as form fields, so every JSON value becomes a string
fn parameter_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}
