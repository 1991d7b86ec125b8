//! Error types for the CI client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the CI server
///
/// Every failure of a single HTTP call is classified into one of these
/// variants; retry decisions are made by the caller based on
/// [`ClientError::is_transient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Credentials or crumb rejected
    #[error("Authentication failed (status {status}): {message}")]
    Auth {
        /// HTTP status code
        status: u16,
        /// Response body or explanation
        message: String,
    },

    /// Server unreachable, connection reset or request timed out
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server refused to trigger the job
    #[error("Trigger rejected (status {status}): {body}")]
    Trigger {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Stop request failed while the build was still running
    #[error("Stop request failed (status {status}): {body}")]
    Stop {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// API returned an unexpected error status code
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Request could not be built (bad base URL, bad job name)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Check if this error is worth retrying
    ///
    /// Only transport failures and server-side (5xx) errors are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if this error means the credentials were rejected
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// HTTP status code carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. }
            | Self::Trigger { status, .. }
            | Self::Stop { status, .. }
            | Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::Parse(_) | Self::InvalidRequest(_) => None,
        }
    }
}
