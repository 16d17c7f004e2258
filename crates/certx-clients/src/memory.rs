//! # In-Memory Collaborators
//!
//! Ledger and content-store stand-ins for tests and local runs. Both honour
//! the same contract as the HTTP clients, including the ledger reverting
//! on a repeated issue, and both can be switched into an unavailable mode
//! to exercise failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use certx_core::{content_hash, ContentHash};

use crate::content::{cid_of, ContentStore, URI_SCHEME};
use crate::error::ClientError;
use crate::ledger::{Ledger, LedgerRecord, LedgerStatus};

// ─── Ledger ──────────────────────────────────────────────────────────

/// Ledger held in a map.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: RwLock<HashMap<ContentHash, LedgerRecord>>,
    unavailable: AtomicBool,
    issue_calls: AtomicU32,
    revoke_calls: AtomicU32,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as unavailable (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a record directly, bypassing the contract checks.
    pub fn seed(&self, hash: ContentHash, status: LedgerStatus, uri: Option<String>) {
        self.records.write().insert(hash, LedgerRecord { status, uri });
    }

    /// The record for `hash`, if any.
    pub fn record(&self, hash: &ContentHash) -> Option<LedgerRecord> {
        self.records.read().get(hash).cloned()
    }

    /// Number of successful `issue` calls.
    pub fn issue_calls(&self) -> u32 {
        self.issue_calls.load(Ordering::SeqCst)
    }

    /// Number of successful `revoke` calls.
    pub fn revoke_calls(&self) -> u32 {
        self.revoke_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self, endpoint: &str) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable {
                endpoint: endpoint.to_string(),
                reason: "in-memory ledger switched off".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn issue(&self, hash: &ContentHash, uri: &str) -> Result<(), ClientError> {
        self.check_available("issue")?;
        let mut records = self.records.write();
        if records
            .get(hash)
            .is_some_and(|r| r.status != LedgerStatus::NotFound)
        {
            return Err(ClientError::Conflict {
                endpoint: "issue".to_string(),
                body: format!("{hash} already recorded"),
            });
        }
        records.insert(
            hash.clone(),
            LedgerRecord {
                status: LedgerStatus::Valid,
                uri: Some(uri.to_string()),
            },
        );
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn revoke(&self, hash: &ContentHash) -> Result<(), ClientError> {
        self.check_available("revoke")?;
        let mut records = self.records.write();
        match records.get_mut(hash) {
            Some(record) if record.status == LedgerStatus::Valid => {
                record.status = LedgerStatus::Revoked;
                self.revoke_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(ClientError::Conflict {
                endpoint: "revoke".to_string(),
                body: format!("{hash} is not valid"),
            }),
        }
    }

    async fn get(&self, hash: &ContentHash) -> Result<LedgerRecord, ClientError> {
        self.check_available("get")?;
        Ok(self.record(hash).unwrap_or_else(LedgerRecord::not_found))
    }
}

// ─── Content Store ───────────────────────────────────────────────────

/// Content store held in a map, addressed by the SHA-256 of each blob.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as unavailable (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, bytes: Vec<u8>, endpoint: &str) -> Result<String, ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable {
                endpoint: endpoint.to_string(),
                reason: "in-memory content store switched off".to_string(),
            });
        }
        let cid = content_hash(&bytes).hex().to_string();
        self.blobs.write().insert(cid.clone(), bytes);
        Ok(format!("{URI_SCHEME}{cid}"))
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put_bytes(&self, bytes: Vec<u8>, _name: &str, _mime: &str) -> Result<String, ClientError> {
        self.store(bytes, "put_bytes")
    }

    async fn put_json(&self, value: &serde_json::Value, _name: &str) -> Result<String, ClientError> {
        self.store(value.to_string().into_bytes(), "put_json")
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>, ClientError> {
        let cid = cid_of(uri)?;
        self.blobs
            .read()
            .get(cid)
            .cloned()
            .ok_or_else(|| ClientError::NotFound { uri: uri.to_string() })
    }
}
