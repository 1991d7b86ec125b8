//! Job and build endpoints

use reqwest::Url;
use std::collections::BTreeMap;
use tracing::debug;

use crate::JenkinsClient;
use crate::error::{ClientError, Result};
use crate::wire::{BuildResponse, JobResponse, QueueItemResponse, parse_trigger_location};
use buildchain_core::domain::build::{BuildSnapshot, QueueItem, QueueRef, TriggerResult};
use buildchain_core::domain::job::JobSpec;

impl JenkinsClient {
    // =============================================================================
    // Triggering
    // =============================================================================

    /// Trigger a job on a branch
    ///
    /// Jobs with parameters (including the branch parameter) are triggered
    /// through `buildWithParameters`, all others through `build`.
    ///
    /// # Errors
    /// [`ClientError::Auth`] on 401, a transient [`ClientError::Api`] on 5xx,
    /// [`ClientError::Trigger`] on any other status outside 2xx/3xx
    /// (400 unknown job or bad parameters, 403 forbidden)
    pub async fn trigger_job(&self, job: &JobSpec, branch: &str) -> Result<TriggerResult> {
        let form = self.trigger_form(job, branch);
        let endpoint = if form.is_empty() {
            "build"
        } else {
            "buildWithParameters"
        };
        let url = self.job_url(&job.name, &[endpoint])?;

        debug!(job = %job.name, url = %url, parameters = ?form, "Sending trigger request");

        let response = self.post_with_crumb(url, &form).await?;

        if response.status.is_server_error() {
            return Err(ClientError::api_error(response.status.as_u16(), response.body));
        }
        if !response.accepted() {
            return Err(ClientError::Trigger {
                status: response.status.as_u16(),
                body: response.body,
            });
        }

        Ok(parse_trigger_location(
            response.location.as_deref(),
            |location| self.absolute_url(location),
        ))
    }

    /// Form fields for a trigger request; job parameters override the branch
    pub(crate) fn trigger_form(&self, job: &JobSpec, branch: &str) -> Vec<(String, String)> {
        let mut fields = BTreeMap::new();
        if let Some(parameter) = &self.branch_parameter {
            fields.insert(parameter.clone(), branch.to_string());
        }
        for (key, value) in &job.parameters {
            fields.insert(key.clone(), value.clone());
        }
        fields.into_iter().collect()
    }

    // =============================================================================
    // Build Queries
    // =============================================================================

    /// Get the number of the most recent build of a job
    ///
    /// # Returns
    /// `None` if the job has never been built
    pub async fn latest_build_number(&self, job_name: &str) -> Result<Option<u64>> {
        let url = self.job_url(job_name, &["api", "json"])?;
        let response = self
            .get(url)
            .query(&[("tree", "lastBuild[number]")])
            .send()
            .await?;

        let job: JobResponse = self.handle_response(response).await?;
        Ok(job.last_build.map(|build| build.number))
    }

    /// Get the current status of one build
    pub async fn build_status(&self, job_name: &str, number: u64) -> Result<BuildSnapshot> {
        let number = number.to_string();
        let url = self.job_url(job_name, &[number.as_str(), "api", "json"])?;
        let response = self.get(url).send().await?;

        let build: BuildResponse = self.handle_response(response).await?;
        Ok(build.into_snapshot(chrono::Utc::now()))
    }

    /// Get the state of a queued trigger request
    pub async fn queue_item(&self, queue: &QueueRef) -> Result<QueueItem> {
        let url = Url::parse(&format!("{}api/json", queue.url))
            .map_err(|e| ClientError::InvalidRequest(format!("invalid queue URL: {}", e)))?;
        let response = self.get(url).send().await?;

        let item: QueueItemResponse = self.handle_response(response).await?;
        Ok(item.into())
    }

    // =============================================================================
    // Stopping
    // =============================================================================

    /// Request that a build be stopped
    ///
    /// A rejected stop request is re-checked against the build status: if the
    /// build is no longer running the stop counts as done.
    ///
    /// # Errors
    /// [`ClientError::Stop`] when the server refused and the build is still running
    pub async fn stop_build(&self, job_name: &str, number: u64) -> Result<()> {
        let number_segment = number.to_string();
        let url = self.job_url(job_name, &[number_segment.as_str(), "stop"])?;
        let response = self.post_with_crumb(url, &[]).await?;

        if response.accepted() {
            return Ok(());
        }

        match self.build_status(job_name, number).await {
            Ok(snapshot) if snapshot.status.is_terminal() => {
                debug!(
                    job = %job_name,
                    build = number,
                    status = %snapshot.status,
                    "Stop rejected but build already finished"
                );
                Ok(())
            }
            _ => Err(ClientError::Stop {
                status: response.status.as_u16(),
                body: response.body,
            }),
        }
    }
}
