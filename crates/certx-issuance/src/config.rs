//! Issuance engine configuration.
//!
//! Combines the watermark defaults, the collaborator clients and an
//! optional database URL. Absent client configuration or database URL
//! selects the in-memory collaborators.
//!
//! ```yaml
//! watermark:
//!   text: Issued by CertX
//!   opacity: 0.2
//! clients:
//!   ledger_url: https://ledger.example.org
//!   upload_url: https://upload.example.org
//!   gateway_url: https://ipfs.io
//!   api_token: "…"
//! database_url: postgres://certx@localhost/certx
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use certx_clients::{ClientConfig, ConfigError};
use certx_watermark::WatermarkConfig;

/// Errors loading [`IssuanceConfig`].
#[derive(Error, Debug)]
pub enum IssuanceConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Client(#[from] ConfigError),
}

/// Top-level configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuanceConfig {
    pub watermark: WatermarkConfig,
    /// Ledger and content-store endpoints; `None` runs in-memory.
    pub clients: Option<ClientConfig>,
    /// PostgreSQL URL; `None` keeps submissions in memory.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for IssuanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceConfig")
            .field("watermark", &self.watermark)
            .field("clients", &self.clients)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl IssuanceConfig {
    /// Load configuration from environment variables.
    ///
    /// Watermark settings come from `CERTX_WATERMARK_*`, clients from
    /// `CERTX_*` (skipped when `CERTX_API_TOKEN` is unset), and the
    /// database from `DATABASE_URL`.
    pub fn from_env() -> Result<Self, IssuanceConfigError> {
        let clients = match ClientConfig::from_env() {
            Ok(clients) => Some(clients),
            Err(ConfigError::MissingToken) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            watermark: WatermarkConfig::from_env(),
            clients,
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        })
    }

    /// Parse YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, IssuanceConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    pub fn load(path: &Path) -> Result<Self, IssuanceConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| IssuanceConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&text)
    }
}
