//! Crumb and server endpoints

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::JenkinsClient;
use crate::error::{ClientError, Result};
use crate::wire::CrumbResponse;
use buildchain_core::domain::build::Crumb;

impl JenkinsClient {
    /// Fetch the anti-forgery crumb and cache it for subsequent POSTs
    ///
    /// # Returns
    /// The crumb, or `None` when the server has CSRF protection disabled
    ///
    /// # Errors
    /// [`ClientError::Auth`] for rejected credentials, [`ClientError::Network`]
    /// when the server cannot be reached
    pub async fn fetch_crumb(&self) -> Result<Option<Crumb>> {
        let url = self.root_url(&["crumbIssuer", "api", "json"])?;
        let response = self.get(url).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                let message = response.text().await.unwrap_or_default();
                Err(ClientError::Auth {
                    status: StatusCode::UNAUTHORIZED.as_u16(),
                    message,
                })
            }
            StatusCode::NOT_FOUND => {
                warn!("Crumb issuer not available, continuing without crumb");
                self.store_crumb(None);
                Ok(None)
            }
            _ => {
                let crumb: Crumb = self
                    .handle_response::<CrumbResponse>(response)
                    .await?
                    .into();
                info!(event = "crumb_acquired", field = %crumb.field, "Acquired crumb");
                self.store_crumb(Some(crumb.clone()));
                Ok(Some(crumb))
            }
        }
    }

    /// Check connectivity and credentials
    ///
    /// # Returns
    /// The server version from the `X-Jenkins` header, when present
    pub async fn server_version(&self) -> Result<Option<String>> {
        let url = self.root_url(&["api", "json"])?;
        let response = self.get(url).send().await?;
        let response = self.check_status(response).await?;

        Ok(response
            .headers()
            .get("X-Jenkins")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use crate::test_server::{FakeJenkins, client_for};

    #[tokio::test]
    async fn test_fetch_crumb_caches_issued_crumb() {
        let server = FakeJenkins::new();
        let client = client_for(&server.start().await);

        let crumb = client.fetch_crumb().await.unwrap().unwrap();

        assert_eq!(crumb.field, "Jenkins-Crumb");
        assert_eq!(crumb.value, "crumb-1");
        assert_eq!(client.current_crumb(), Some(crumb));
    }

    #[tokio::test]
    async fn test_fetch_crumb_missing_issuer_returns_none() {
        let server = FakeJenkins::new().without_crumb_issuer();
        let client = client_for(&server.start().await);

        assert_eq!(client.fetch_crumb().await.unwrap(), None);
        assert_eq!(client.current_crumb(), None);
        assert_eq!(server.crumb_requests(), 1);
    }
}
