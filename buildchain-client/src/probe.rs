//! External status endpoint probe
//!
//! Used for the optional post-run verification step. Unlike
//! [`JenkinsClient`](crate::JenkinsClient) requests, probes are
//! unauthenticated: the endpoint belongs to the deployed service, not to the
//! CI server.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Single GET against a status URL
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Returns the HTTP status code of the response
    async fn probe(&self, url: &str) -> Result<u16>;
}

/// reqwest-backed [`StatusProbe`]
#[derive(Debug, Clone)]
pub struct HttpStatusProbe {
    client: Client,
}

impl HttpStatusProbe {
    /// Creates a probe whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StatusProbe for HttpStatusProbe {
    async fn probe(&self, url: &str) -> Result<u16> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();

        let body = response.text().await.unwrap_or_default();
        if !body.is_empty() {
            let preview: String = body.chars().take(200).collect();
            debug!(url = %url, status, body = %preview, "Probe response");
        }

        Ok(status)
    }
}
