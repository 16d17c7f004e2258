//! Collaborator client errors.

use crate::config::ConfigError;

/// Errors from ledger and content-store calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure after all retries.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The collaborator is reachable but failing (5xx, or a stub told to fail).
    #[error("{endpoint} unavailable: {reason}")]
    Unavailable { endpoint: String, reason: String },

    /// The write conflicts with existing state (already issued, not revocable).
    #[error("{endpoint} rejected the write as conflicting: {body}")]
    Conflict { endpoint: String, body: String },

    /// The requested blob does not exist.
    #[error("content not found: {uri}")]
    NotFound { uri: String },

    /// The URI is not one this client can resolve.
    #[error("unsupported content URI: {0}")]
    InvalidUri(String),

    /// Any other non-2xx response.
    #[error("{endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether the failure is transient and the operation may be retried.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Unavailable { .. })
    }

    /// Whether the collaborator refused the write because of existing state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Map a non-success response to an error.
    pub(crate) async fn from_response(endpoint: String, resp: reqwest::Response) -> Self {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::CONFLICT {
            Self::Conflict { endpoint, body }
        } else if status.is_server_error() {
            Self::Unavailable {
                endpoint,
                reason: format!("{}: {body}", status.as_u16()),
            }
        } else {
            Self::ApiError {
                endpoint,
                status: status.as_u16(),
                body,
            }
        }
    }
}
