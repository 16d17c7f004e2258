//! Collaborator client configuration.
//!
//! Base URLs for the ledger relayer, the content-store upload service, and
//! the content gateway. Override via environment variables, a YAML file, or
//! explicit construction for tests.

use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_LEDGER_URL: &str = "http://127.0.0.1:4000";
const DEFAULT_UPLOAD_URL: &str = "http://127.0.0.1:5001";
const DEFAULT_GATEWAY_URL: &str = "https://ipfs.io";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the ledger and content-store clients.
///
/// Custom `Debug` implementation redacts the `api_token` field.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ledger relayer base URL.
    pub ledger_url: Url,
    /// Content-store upload service base URL.
    pub upload_url: Url,
    /// Content gateway base URL, used for `ipfs://` retrieval.
    pub gateway_url: Url,
    /// Bearer token sent to the ledger relayer and upload service.
    pub api_token: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("ledger_url", &self.ledger_url)
            .field("upload_url", &self.upload_url)
            .field("gateway_url", &self.gateway_url)
            .field("api_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CERTX_LEDGER_URL` (default: `http://127.0.0.1:4000`)
    /// - `CERTX_UPLOAD_URL` (default: `http://127.0.0.1:5001`)
    /// - `CERTX_GATEWAY_URL` (default: `https://ipfs.io`)
    /// - `CERTX_API_TOKEN` (required)
    /// - `CERTX_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = std::env::var("CERTX_API_TOKEN").map_err(|_| ConfigError::MissingToken)?;
        Ok(Self {
            ledger_url: env_url("CERTX_LEDGER_URL", DEFAULT_LEDGER_URL)?,
            upload_url: env_url("CERTX_UPLOAD_URL", DEFAULT_UPLOAD_URL)?,
            gateway_url: env_url("CERTX_GATEWAY_URL", DEFAULT_GATEWAY_URL)?,
            api_token,
            timeout_secs: std::env::var("CERTX_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Point every client at one local base URL (for mock servers).
    pub fn local(base: &str, token: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base).map_err(|e| ConfigError::InvalidUrl(base.to_string(), e.to_string()))?;
        Ok(Self {
            ledger_url: url.clone(),
            upload_url: url.clone(),
            gateway_url: url,
            api_token: token.to_string(),
            timeout_secs: 5,
        })
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Join `path` onto `base`, keeping any path prefix `base` already has.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CERTX_API_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
