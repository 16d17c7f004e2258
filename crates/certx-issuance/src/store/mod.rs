//! # Persistence Gateway
//!
//! The submission store is reached only through [`SubmissionStore`]. Every
//! lifecycle commit goes through [`SubmissionStore::replace_if_state`], a
//! single conditional write that succeeds only while the stored record is
//! still in the expected state. Two racing approvals of one submission can
//! therefore never both commit.
//!
//! ## Implementations
//!
//! | Store | Use |
//! |-------|-----|
//! | [`MemorySubmissionStore`] | tests, CLI, local runs without `DATABASE_URL` |
//! | [`PgSubmissionStore`] | PostgreSQL via `sqlx`; raw bytes in one `BYTEA` column |
//!
//! Both refuse a write that would leave two VALID submissions sharing an
//! original or published hash, reporting [`StoreError::Conflict`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use certx_core::{ContentHash, SubmissionId, UserId};
use certx_state::{Submission, SubmissionState};

pub use memory::MemorySubmissionStore;
pub use postgres::PgSubmissionStore;

/// Errors from a submission store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database rejected or failed the query.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored record could not be encoded or decoded.
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A submission with this id already exists.
    #[error("submission {0} already exists")]
    DuplicateId(SubmissionId),

    /// The write would break the one-VALID-per-hash rule.
    #[error("conflicting VALID submission: {0}")]
    Conflict(String),
}

/// Query over stored submissions. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionFilter {
    pub original_hash: Option<ContentHash>,
    pub published_hash: Option<ContentHash>,
    pub owner: Option<UserId>,
    pub state: Option<SubmissionState>,
    pub limit: Option<usize>,
}

impl SubmissionFilter {
    /// Submissions sharing an original hash.
    pub fn by_original(hash: &ContentHash) -> Self {
        Self {
            original_hash: Some(hash.clone()),
            ..Self::default()
        }
    }

    /// Submissions published under a hash.
    pub fn by_published(hash: &ContentHash) -> Self {
        Self {
            published_hash: Some(hash.clone()),
            ..Self::default()
        }
    }

    pub fn with_owner(mut self, owner: &UserId) -> Self {
        self.owner = Some(owner.clone());
        self
    }

    pub fn with_state(mut self, state: SubmissionState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `submission` satisfies every set field (ignores `limit`).
    pub fn matches(&self, submission: &Submission) -> bool {
        self.original_hash
            .as_ref()
            .map_or(true, |h| *h == submission.original_hash)
            && self
                .published_hash
                .as_ref()
                .map_or(true, |h| Some(h) == submission.published_hash())
            && self.owner.as_ref().map_or(true, |o| *o == submission.owner)
            && self.state.map_or(true, |s| s == submission.state())
    }
}

/// Access to stored submissions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Store a new submission.
    async fn insert(&self, submission: &Submission) -> Result<(), StoreError>;

    /// Load one submission, raw bytes included.
    async fn get(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError>;

    /// Submissions matching `filter`, newest first.
    async fn find(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, StoreError>;

    /// Replace the stored record with `submission` only if the stored state
    /// is still `expected`. Returns whether the write happened.
    async fn replace_if_state(
        &self,
        submission: &Submission,
        expected: SubmissionState,
    ) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use certx_core::{content_hash, CertificateAttributes};
    use certx_state::{RawContent, WatermarkParams};

    fn pending(owner: &str, content: &[u8]) -> Submission {
        Submission::create(
            UserId::new(owner).unwrap(),
            content_hash(content),
            CertificateAttributes::for_holder("Nguyen Van A"),
            RawContent::new(content.to_vec(), "application/pdf", WatermarkParams::default()),
            None,
        )
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(SubmissionFilter::default().matches(&pending("u1", b"a")));
    }

    #[test]
    fn filter_fields_combine() {
        let sub = pending("u1", b"a");
        let by_hash = SubmissionFilter::by_original(&content_hash(b"a"));
        assert!(by_hash.matches(&sub));
        assert!(by_hash.clone().with_state(SubmissionState::Pending).matches(&sub));
        assert!(!by_hash.clone().with_state(SubmissionState::Valid).matches(&sub));
        assert!(!by_hash.with_owner(&UserId::new("u2").unwrap()).matches(&sub));
        assert!(!SubmissionFilter::by_published(&content_hash(b"a")).matches(&sub));
    }
}
