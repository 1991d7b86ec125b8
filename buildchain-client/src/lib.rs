//! Buildchain CI Client
//!
//! Authenticated HTTP transport to a Jenkins-compatible CI server.
//!
//! The client fetches the anti-forgery crumb, triggers jobs, queries queue
//! items and build status, and issues stop requests. It never retries on its
//! own: every failure is classified into a [`ClientError`] and the caller
//! decides what to do with it.
//!
//! # Example
//!
//! ```no_run
//! use buildchain_client::{CiClient, JenkinsClient};
//! use buildchain_core::config::Credential;
//! use std::time::Duration;
//!
//! # async fn example() -> buildchain_client::Result<()> {
//! let credential = Credential {
//!     username: "deployer".to_string(),
//!     secret: "api-token".to_string(),
//! };
//! let client = JenkinsClient::new("http://localhost:8080", credential, Duration::from_secs(30))?;
//!
//! client.fetch_crumb().await?;
//! let latest = client.latest_build_number("build-app").await?;
//! println!("Latest build: {:?}", latest);
//! # Ok(())
//! # }
//! ```

mod builds;
mod crumb;
pub mod error;
mod probe;
#[cfg(test)]
mod test_server;
mod wire;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use probe::{HttpStatusProbe, StatusProbe};

use async_trait::async_trait;
use buildchain_core::config::{Configuration, Credential};
use buildchain_core::domain::build::{BuildSnapshot, Crumb, QueueItem, QueueRef, TriggerResult};
use buildchain_core::domain::job::JobSpec;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Operations the job runner needs from the CI server
///
/// Each method is a single request (or a single request plus one crumb
/// refresh); polling cadence and retries belong to the caller.
#[async_trait]
pub trait CiClient: Send + Sync {
    /// Fetches and caches the anti-forgery crumb
    ///
    /// Returns `None` when the server does not issue crumbs.
    async fn fetch_crumb(&self) -> Result<Option<Crumb>>;

    /// Triggers a job on the given branch
    async fn trigger_job(&self, job: &JobSpec, branch: &str) -> Result<TriggerResult>;

    /// Highest build number of a job, `None` if it has never built
    async fn latest_build_number(&self, job_name: &str) -> Result<Option<u64>>;

    /// Single status query for one build
    async fn build_status(&self, job_name: &str, number: u64) -> Result<BuildSnapshot>;

    /// Current state of a queued trigger request
    async fn queue_item(&self, queue: &QueueRef) -> Result<QueueItem>;

    /// Requests that a build be stopped
    ///
    /// Succeeds without error when the build has already finished.
    async fn stop_build(&self, job_name: &str, number: u64) -> Result<()>;
}

/// HTTP client for the Jenkins remote-access API
///
/// Every request carries the basic credential; state-changing requests also
/// carry the cached crumb header.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    /// Base URL of the server (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
    credential: Credential,
    /// Form field the branch is sent under
    branch_parameter: Option<String>,
    /// Crumb shared by all clones for the lifetime of the run
    crumb: Arc<Mutex<Option<Crumb>>>,
}

impl JenkinsClient {
    /// Create a new client whose requests time out after `timeout`
    ///
    /// Redirects are not followed so that `Location` headers of trigger and
    /// stop responses stay visible. Cookies are kept because Jenkins binds
    /// the crumb to the session that requested it.
    pub fn new(
        base_url: impl Into<String>,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .build()?;
        Ok(Self::with_client(base_url, credential, client))
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, credential: Credential, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credential,
            branch_parameter: Some("BRANCH".to_string()),
            crumb: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a client from a validated configuration
    pub fn from_config(config: &Configuration) -> Result<Self> {
        let client = Self::new(
            config.base_url.clone(),
            config.credential.clone(),
            config.request_timeout,
        )?;
        Ok(client.with_branch_parameter(config.branch_parameter.clone()))
    }

    /// Set the form field the branch is sent under (`None` to never send it)
    pub fn with_branch_parameter(mut self, parameter: Option<String>) -> Self {
        self.branch_parameter = parameter;
        self
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Crumb currently attached to state-changing requests
    pub fn current_crumb(&self) -> Option<Crumb> {
        self.crumb.lock().ok().and_then(|guard| guard.clone())
    }

    fn store_crumb(&self, crumb: Option<Crumb>) {
        if let Ok(mut guard) = self.crumb.lock() {
            *guard = crumb;
        }
    }

    // =============================================================================
    // URL Helpers
    // =============================================================================

    /// URL under the server root, e.g. `root_url(&["api", "json"])`
    fn root_url(&self, tail: &[&str]) -> Result<Url> {
        self.build_url(&[], tail)
    }

    /// URL under a job; `folder/job` names map to `/job/folder/job/job`
    fn job_url(&self, job_name: &str, tail: &[&str]) -> Result<Url> {
        let parts: Vec<&str> = job_name.split('/').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Err(ClientError::InvalidRequest(format!(
                "invalid job name: {:?}",
                job_name
            )));
        }
        self.build_url(&parts, tail)
    }

    fn build_url(&self, job_parts: &[&str], tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidRequest(format!("invalid base URL: {}", e)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ClientError::InvalidRequest(format!("base URL cannot be a base: {}", self.base_url))
            })?;
            segments.pop_if_empty();
            for part in job_parts {
                segments.push("job").push(part);
            }
            segments.extend(tail);
        }
        Ok(url)
    }

    /// Resolves a possibly relative `Location` header against the base URL
    fn absolute_url(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else if location.starts_with('/') {
            // Location paths are absolute from the host, base URL may carry a context path
            match Url::parse(&self.base_url) {
                Ok(base) => {
                    let mut origin = base.origin().ascii_serialization();
                    origin.push_str(location);
                    origin
                }
                Err(_) => format!("{}{}", self.base_url, location),
            }
        } else {
            format!("{}/{}", self.base_url, location)
        }
    }

    // =============================================================================
    // Request Helpers
    // =============================================================================

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .basic_auth(&self.credential.username, Some(&self.credential.secret))
    }

    fn post(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self
            .client
            .post(url)
            .basic_auth(&self.credential.username, Some(&self.credential.secret));

        match self.current_crumb() {
            Some(crumb) => request.header(crumb.field.as_str(), crumb.value.as_str()),
            None => request,
        }
    }

    /// Sends a POST, refreshing the crumb once if the server rejects it
    async fn post_with_crumb(
        &self,
        url: Url,
        form: &[(String, String)],
    ) -> Result<PostResponse> {
        let response = self.send_post(url.clone(), form).await?;

        if response.status == StatusCode::FORBIDDEN && is_crumb_rejection(&response.body) {
            tracing::warn!(event = "crumb_invalid", "Server rejected the crumb, refreshing");
            self.fetch_crumb().await?;
            return self.send_post(url, form).await;
        }

        Ok(response)
    }

    async fn send_post(&self, url: Url, form: &[(String, String)]) -> Result<PostResponse> {
        let mut request = self.post(url);
        if !form.is_empty() {
            request = request.form(form);
        }
        let response = request.send().await?;

        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Auth {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(PostResponse {
            status,
            location,
            body,
        })
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = self.check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Failed to parse JSON response: {}", e)))
    }

    /// Maps 401 to [`ClientError::Auth`] and any other failure to [`ClientError::Api`]
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Auth {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Err(ClientError::api_error(status.as_u16(), error_text))
    }
}

/// Status, `Location` header and body of a POST response
#[derive(Debug)]
struct PostResponse {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

impl PostResponse {
    fn accepted(&self) -> bool {
        self.status.is_success() || self.status.is_redirection()
    }
}

/// Jenkins answers a missing or stale crumb with 403 and this wording
fn is_crumb_rejection(body: &str) -> bool {
    body.to_ascii_lowercase().contains("crumb")
}

#[async_trait]
impl CiClient for JenkinsClient {
    async fn fetch_crumb(&self) -> Result<Option<Crumb>> {
        JenkinsClient::fetch_crumb(self).await
    }

    async fn trigger_job(&self, job: &JobSpec, branch: &str) -> Result<TriggerResult> {
        JenkinsClient::trigger_job(self, job, branch).await
    }

    async fn latest_build_number(&self, job_name: &str) -> Result<Option<u64>> {
        JenkinsClient::latest_build_number(self, job_name).await
    }

    async fn build_status(&self, job_name: &str, number: u64) -> Result<BuildSnapshot> {
        JenkinsClient::build_status(self, job_name, number).await
    }

    async fn queue_item(&self, queue: &QueueRef) -> Result<QueueItem> {
        JenkinsClient::queue_item(self, queue).await
    }

    async fn stop_build(&self, job_name: &str, number: u64) -> Result<()> {
        JenkinsClient::stop_build(self, job_name, number).await
    }
}
