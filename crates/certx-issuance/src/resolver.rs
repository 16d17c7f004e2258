//! # Verification Resolver
//!
//! Answers "is this published hash a valid certificate?" from two sources.
//!
//! 1. The submission store, newest record first. Its stored state is
//!    authoritative; the ledger is consulted only to fill a missing content
//!    URI, and a failure there is logged and ignored.
//! 2. The ledger, when no stored submission carries the hash.
//!
//! A VALID record whose expiration date has passed reports `EXPIRED`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use certx_clients::{Ledger, LedgerStatus};
use certx_core::{ContentHash, SubmissionId};
use certx_state::DerivedStatus;

use crate::error::{upstream_failure, IssuanceError};
use crate::store::{SubmissionFilter, SubmissionStore};

/// Verdict for a published hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Valid,
    Revoked,
    Expired,
    NotFound,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Revoked => "REVOKED",
            Self::Expired => "EXPIRED",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which source produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationSource {
    Store,
    Ledger,
}

impl VerificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Ledger => "ledger",
        }
    }
}

/// Result of [`VerificationResolver::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub status: VerificationStatus,
    #[serde(rename = "contentURI")]
    pub content_uri: Option<String>,
    /// Absent for `NOT_FOUND`.
    pub source: Option<VerificationSource>,
    /// The stored submission, when the store answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<SubmissionId>,
}

impl Verification {
    pub fn not_found() -> Self {
        Self {
            status: VerificationStatus::NotFound,
            content_uri: None,
            source: None,
            submission_id: None,
        }
    }
}

/// Store-first, ledger-fallback verification.
#[derive(Clone)]
pub struct VerificationResolver {
    store: Option<Arc<dyn SubmissionStore>>,
    ledger: Arc<dyn Ledger>,
}

impl VerificationResolver {
    pub fn new(store: Arc<dyn SubmissionStore>, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            store: Some(store),
            ledger,
        }
    }

    /// A resolver that asks only the ledger.
    pub fn ledger_only(ledger: Arc<dyn Ledger>) -> Self {
        Self { store: None, ledger }
    }

    /// Resolve `hash` as of `now`.
    pub async fn verify(
        &self,
        hash: &ContentHash,
        now: DateTime<Utc>,
    ) -> Result<Verification, IssuanceError> {
        if let Some(store) = &self.store {
            let filter = SubmissionFilter::by_published(hash).with_limit(1);
            if let Some(submission) = store.find(&filter).await?.into_iter().next() {
                let status = match submission.status_at(now) {
                    DerivedStatus::Valid => VerificationStatus::Valid,
                    DerivedStatus::Expired => VerificationStatus::Expired,
                    DerivedStatus::Revoked => VerificationStatus::Revoked,
                    // Only published records carry a published hash.
                    DerivedStatus::Pending | DerivedStatus::Rejected => {
                        tracing::warn!(
                            submission_id = %submission.id,
                            "unpublished record matched a published hash"
                        );
                        return Ok(Verification::not_found());
                    }
                };
                let content_uri = match submission.content_uri().filter(|u| !u.is_empty()) {
                    Some(uri) => Some(uri.to_string()),
                    None => self.ledger_uri(hash).await,
                };
                return Ok(Verification {
                    status,
                    content_uri,
                    source: Some(VerificationSource::Store),
                    submission_id: Some(submission.id),
                });
            }
        }

        let record = self
            .ledger
            .get(hash)
            .await
            .map_err(|e| upstream_failure("ledger", e))?;
        let status = match record.status {
            LedgerStatus::NotFound => return Ok(Verification::not_found()),
            LedgerStatus::Valid => VerificationStatus::Valid,
            LedgerStatus::Revoked => VerificationStatus::Revoked,
        };
        Ok(Verification {
            status,
            content_uri: record.uri,
            source: Some(VerificationSource::Ledger),
            submission_id: None,
        })
    }

    async fn ledger_uri(&self, hash: &ContentHash) -> Option<String> {
        match self.ledger.get(hash).await {
            Ok(record) => record.uri,
            Err(e) => {
                tracing::warn!(published_hash = %hash, error = %e, "ledger lookup for content URI failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certx_clients::InMemoryLedger;
    use certx_core::{content_hash, CertificateAttributes, UserId};
    use certx_state::{
        Approval, Publication, RawContent, Submission, SubmissionState, WatermarkParams,
        WatermarkReport,
    };
    use chrono::{Duration, NaiveDate};

    use crate::store::MemorySubmissionStore;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn publication(content_uri: &str) -> Publication {
        Publication {
            published_hash: content_hash(b"stamped"),
            content_uri: content_uri.into(),
            document_uri: "ipfs://doc".into(),
            mime: "application/pdf".into(),
            watermark: WatermarkReport {
                label_used: "Issued by CertX".into(),
                opacity: 0.2,
                format: "pdf".into(),
                watermarked: true,
                used_fallback_glyphs: false,
            },
            approval: Approval {
                approver: Some(user("admin")),
                at: Utc::now(),
            },
        }
    }

    async fn store_with_valid(
        expiration: Option<NaiveDate>,
        content_uri: &str,
    ) -> Arc<MemorySubmissionStore> {
        let store = Arc::new(MemorySubmissionStore::new());
        let mut attrs = CertificateAttributes::for_holder("Nguyen Van A");
        attrs.expiration_date = expiration;
        let mut sub = Submission::create(
            user("u1"),
            content_hash(b"cert"),
            attrs,
            RawContent::new(b"cert".to_vec(), "application/pdf", WatermarkParams::default()),
            None,
        );
        store.insert(&sub).await.unwrap();
        sub.approve(publication(content_uri), &user("admin")).unwrap();
        store.replace_if_state(&sub, SubmissionState::Pending).await.unwrap();
        store
    }

    #[tokio::test]
    async fn store_state_wins_over_ledger() {
        let store = store_with_valid(None, "ipfs://meta").await;
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.seed(content_hash(b"stamped"), LedgerStatus::Revoked, Some("ipfs://other".into()));

        let resolver = VerificationResolver::new(store, ledger);
        let v = resolver.verify(&content_hash(b"stamped"), Utc::now()).await.unwrap();
        assert_eq!(v.status, VerificationStatus::Valid);
        assert_eq!(v.source, Some(VerificationSource::Store));
        assert_eq!(v.content_uri.as_deref(), Some("ipfs://meta"));
    }

    #[tokio::test]
    async fn missing_uri_is_filled_from_ledger_and_failures_ignored() {
        let store = store_with_valid(None, "").await;
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.seed(content_hash(b"stamped"), LedgerStatus::Valid, Some("ipfs://from-ledger".into()));

        let resolver = VerificationResolver::new(store, ledger.clone());
        let v = resolver.verify(&content_hash(b"stamped"), Utc::now()).await.unwrap();
        assert_eq!(v.content_uri.as_deref(), Some("ipfs://from-ledger"));

        ledger.set_unavailable(true);
        let v = resolver.verify(&content_hash(b"stamped"), Utc::now()).await.unwrap();
        assert_eq!(v.status, VerificationStatus::Valid);
        assert!(v.content_uri.is_none());
    }

    #[tokio::test]
    async fn expiry_is_read_time_only() {
        let today = Utc::now().date_naive();
        let ledger = Arc::new(InMemoryLedger::new());

        let store = store_with_valid(Some(today - Duration::days(1)), "ipfs://meta").await;
        let resolver = VerificationResolver::new(store.clone(), ledger.clone());
        let v = resolver.verify(&content_hash(b"stamped"), Utc::now()).await.unwrap();
        assert_eq!(v.status, VerificationStatus::Expired);
        let stored = store
            .find(&SubmissionFilter::by_published(&content_hash(b"stamped")))
            .await
            .unwrap();
        assert_eq!(stored[0].state(), SubmissionState::Valid);

        let store = store_with_valid(Some(today), "ipfs://meta").await;
        let resolver = VerificationResolver::new(store, ledger);
        let v = resolver.verify(&content_hash(b"stamped"), Utc::now()).await.unwrap();
        assert_eq!(v.status, VerificationStatus::Valid);
    }

    #[tokio::test]
    async fn ledger_fallback_maps_status_codes() {
        let ledger = Arc::new(InMemoryLedger::new());
        let resolver = VerificationResolver::new(Arc::new(MemorySubmissionStore::new()), ledger.clone());

        let unknown = resolver.verify(&content_hash(b"nothing"), Utc::now()).await.unwrap();
        assert_eq!(unknown, Verification::not_found());

        ledger.seed(content_hash(b"a"), LedgerStatus::Valid, Some("ipfs://a".into()));
        ledger.seed(content_hash(b"b"), LedgerStatus::Revoked, None);
        let a = resolver.verify(&content_hash(b"a"), Utc::now()).await.unwrap();
        assert_eq!(a.status, VerificationStatus::Valid);
        assert_eq!(a.source, Some(VerificationSource::Ledger));
        let b = resolver.verify(&content_hash(b"b"), Utc::now()).await.unwrap();
        assert_eq!(b.status, VerificationStatus::Revoked);
    }

    #[tokio::test]
    async fn ledger_only_resolver_propagates_outage() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_unavailable(true);
        let resolver = VerificationResolver::ledger_only(ledger);
        let err = resolver.verify(&content_hash(b"x"), Utc::now()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
