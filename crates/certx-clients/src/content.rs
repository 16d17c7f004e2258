//! # Content Store Client
//!
//! Content-addressed blob storage for the watermarked file and its
//! metadata document. Uploads return an `ipfs://{cid}` URI; retrieval goes
//! through an HTTP gateway at `{gateway}/ipfs/{cid}`.
//!
//! ## Upload API
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | POST | `/upload?name={name}` | raw bytes with their `Content-Type` | `{"cid": "…"}` |

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{endpoint_url, ClientConfig};
use crate::error::ClientError;
use crate::retry::send_with_retry;

/// URI scheme of content-store references.
pub const URI_SCHEME: &str = "ipfs://";

/// Access to the content store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a file; returns its URI.
    async fn put_bytes(&self, bytes: Vec<u8>, name: &str, mime: &str) -> Result<String, ClientError>;

    /// Store a JSON document; returns its URI.
    async fn put_json(&self, value: &serde_json::Value, name: &str) -> Result<String, ClientError>;

    /// Fetch the bytes behind `uri`.
    async fn get(&self, uri: &str) -> Result<Vec<u8>, ClientError>;
}

/// Extract the content identifier from an `ipfs://` URI.
pub fn cid_of(uri: &str) -> Result<&str, ClientError> {
    uri.strip_prefix(URI_SCHEME)
        .filter(|cid| !cid.is_empty() && !cid.contains(['/', '?', '#']))
        .ok_or_else(|| ClientError::InvalidUri(uri.to_string()))
}

#[derive(Deserialize)]
struct UploadResponse {
    cid: String,
}

/// Content store backed by an HTTP upload service and gateway.
#[derive(Debug, Clone)]
pub struct HttpContentStore {
    http: reqwest::Client,
    upload_url: url::Url,
    gateway_url: url::Url,
    token: String,
}

impl HttpContentStore {
    /// Build a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: config.http_client()?,
            upload_url: config.upload_url.clone(),
            gateway_url: config.gateway_url.clone(),
            token: config.api_token.clone(),
        })
    }

    async fn upload(&self, body: Vec<u8>, name: &str, mime: &str) -> Result<String, ClientError> {
        let endpoint = "POST /upload".to_string();
        let url = endpoint_url(&self.upload_url, "upload");

        // Content addressing makes a resent upload land on the same CID.
        let resp = send_with_retry(&endpoint, || {
            self.http
                .post(&url)
                .bearer_auth(&self.token)
                .query(&[("name", name)])
                .header(reqwest::header::CONTENT_TYPE, mime)
                .body(body.clone())
                .send()
        })
        .await?
        .response;

        if !resp.status().is_success() {
            return Err(ClientError::from_response(endpoint, resp).await);
        }
        let uploaded: UploadResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Deserialization { endpoint, source: e })?;
        tracing::debug!(cid = %uploaded.cid, name, "content stored");
        Ok(format!("{URI_SCHEME}{}", uploaded.cid))
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn put_bytes(&self, bytes: Vec<u8>, name: &str, mime: &str) -> Result<String, ClientError> {
        self.upload(bytes, name, mime).await
    }

    async fn put_json(&self, value: &serde_json::Value, name: &str) -> Result<String, ClientError> {
        let body = serde_json::to_vec(value).map_err(|e| ClientError::ApiError {
            endpoint: "POST /upload".to_string(),
            status: 0,
            body: format!("metadata not serializable: {e}"),
        })?;
        self.upload(body, name, "application/json").await
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>, ClientError> {
        let cid = cid_of(uri)?;
        let endpoint = format!("GET /ipfs/{cid}");
        let url = endpoint_url(&self.gateway_url, &format!("ipfs/{cid}"));

        let resp = send_with_retry(&endpoint, || self.http.get(&url).send())
            .await?
            .response;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound { uri: uri.to_string() });
        }
        if !resp.status().is_success() {
            return Err(ClientError::from_response(endpoint, resp).await);
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ClientError::Deserialization { endpoint, source: e })
    }
}
