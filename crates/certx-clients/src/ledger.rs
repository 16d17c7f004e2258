//! # Ledger Client
//!
//! The ledger is the append-only system of record. It maps a published
//! hash to a status code and the content URI recorded at issuance.
//!
//! ## Relayer API
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST | `/api/v1/certificates` | Issue `{hash, uri}` |
//! | POST | `/api/v1/certificates/{hash}/revoke` | Revoke |
//! | GET  | `/api/v1/certificates/{hash}` | Read `{status, uri}` |
//!
//! Issuing an already-recorded hash, or revoking one that is not valid,
//! reverts on the ledger and surfaces as `409 Conflict`. Writes are resent
//! when the connection drops, so a `409` on a resend is checked against a
//! read of the record before it is reported.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use certx_core::ContentHash;

use crate::config::{endpoint_url, ClientConfig};
use crate::error::ClientError;
use crate::retry::{send_with_retry, Sent};

const API_PREFIX: &str = "api/v1/certificates";

// ─── Status ──────────────────────────────────────────────────────────

/// Status code recorded on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LedgerStatus {
    /// `0`: no record for this hash.
    NotFound,
    /// `1`: issued and not revoked.
    Valid,
    /// `2`: issued, then revoked.
    Revoked,
}

impl LedgerStatus {
    /// The on-ledger code.
    pub fn code(&self) -> u8 {
        match self {
            Self::NotFound => 0,
            Self::Valid => 1,
            Self::Revoked => 2,
        }
    }
}

impl TryFrom<u8> for LedgerStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::NotFound),
            1 => Ok(Self::Valid),
            2 => Ok(Self::Revoked),
            other => Err(format!("unknown ledger status code {other}")),
        }
    }
}

impl From<LedgerStatus> for u8 {
    fn from(status: LedgerStatus) -> Self {
        status.code()
    }
}

/// What the ledger reports for one hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub status: LedgerStatus,
    /// Content URI recorded at issuance.
    #[serde(default)]
    pub uri: Option<String>,
}

impl LedgerRecord {
    /// The record returned for an unknown hash.
    pub fn not_found() -> Self {
        Self {
            status: LedgerStatus::NotFound,
            uri: None,
        }
    }
}

// ─── Port ────────────────────────────────────────────────────────────

/// Access to the append-only ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Record `hash` as valid with its content URI.
    ///
    /// Fails [`ClientError::Conflict`] if the hash is already recorded.
    async fn issue(&self, hash: &ContentHash, uri: &str) -> Result<(), ClientError>;

    /// Mark `hash` revoked.
    async fn revoke(&self, hash: &ContentHash) -> Result<(), ClientError>;

    /// Read the record for `hash`; unknown hashes report status `0`.
    async fn get(&self, hash: &ContentHash) -> Result<LedgerRecord, ClientError>;
}

// ─── HTTP Client ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct IssueRequest<'a> {
    hash: &'a str,
    uri: &'a str,
}

/// Ledger client for a JSON-over-HTTP relayer.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    http: reqwest::Client,
    base_url: url::Url,
    token: String,
}

impl HttpLedgerClient {
    /// Build a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: config.http_client()?,
            base_url: config.ledger_url.clone(),
            token: config.api_token.clone(),
        })
    }

    /// Settle a write that came back `409` after a resend.
    ///
    /// The first send may have been applied before its response was lost,
    /// in which case the resend conflicts with our own write. Reads the
    /// record back and reports whether it already holds the intended state.
    async fn landed_earlier(
        &self,
        hash: &ContentHash,
        attempts: u32,
        intended: impl Fn(&LedgerRecord) -> bool,
    ) -> Result<bool, ClientError> {
        let record = self.get(hash).await?;
        let landed = intended(&record);
        if landed {
            tracing::warn!(
                hash = %hash,
                attempts,
                "ledger write committed by an earlier timed-out send"
            );
        }
        Ok(landed)
    }
}

fn conflicted_on_resend(sent: &Sent) -> bool {
    sent.retried() && sent.response.status() == reqwest::StatusCode::CONFLICT
}

#[async_trait]
impl Ledger for HttpLedgerClient {
    async fn issue(&self, hash: &ContentHash, uri: &str) -> Result<(), ClientError> {
        let endpoint = "POST /certificates".to_string();
        let url = endpoint_url(&self.base_url, API_PREFIX);
        let body = IssueRequest {
            hash: hash.as_str(),
            uri,
        };

        let sent = send_with_retry(&endpoint, || {
            self.http.post(&url).bearer_auth(&self.token).json(&body).send()
        })
        .await?;

        let ours = |r: &LedgerRecord| r.status == LedgerStatus::Valid && r.uri.as_deref() == Some(uri);
        if conflicted_on_resend(&sent) && self.landed_earlier(hash, sent.attempts, ours).await? {
            return Ok(());
        }
        if !sent.response.status().is_success() {
            return Err(ClientError::from_response(endpoint, sent.response).await);
        }
        tracing::debug!(hash = %hash, "ledger issue accepted");
        Ok(())
    }

    async fn revoke(&self, hash: &ContentHash) -> Result<(), ClientError> {
        let endpoint = format!("POST /certificates/{hash}/revoke");
        let url = endpoint_url(&self.base_url, &format!("{API_PREFIX}/{hash}/revoke"));

        let sent = send_with_retry(&endpoint, || {
            self.http.post(&url).bearer_auth(&self.token).send()
        })
        .await?;

        let revoked = |r: &LedgerRecord| r.status == LedgerStatus::Revoked;
        if conflicted_on_resend(&sent) && self.landed_earlier(hash, sent.attempts, revoked).await? {
            return Ok(());
        }
        if !sent.response.status().is_success() {
            return Err(ClientError::from_response(endpoint, sent.response).await);
        }
        tracing::debug!(hash = %hash, "ledger revoke accepted");
        Ok(())
    }

    async fn get(&self, hash: &ContentHash) -> Result<LedgerRecord, ClientError> {
        let endpoint = format!("GET /certificates/{hash}");
        let url = endpoint_url(&self.base_url, &format!("{API_PREFIX}/{hash}"));

        let resp = send_with_retry(&endpoint, || {
            self.http.get(&url).bearer_auth(&self.token).send()
        })
        .await?
        .response;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(LedgerRecord::not_found());
        }
        if !resp.status().is_success() {
            return Err(ClientError::from_response(endpoint, resp).await);
        }
        resp.json()
            .await
            .map_err(|e| ClientError::Deserialization { endpoint, source: e })
    }
}
