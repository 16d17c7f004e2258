//! # Duplicate & Ownership Guard
//!
//! Two checks, run at different points of the lifecycle:
//!
//! - [`DuplicateGuard::check_original`] before a submission is created
//!   (submit, reupload, direct issue). Refuses content already VALID under
//!   any owner, and content someone else once published and revoked.
//! - [`DuplicateGuard::check_published`] after the watermark transform,
//!   before anything is written upstream. Refuses a published hash the
//!   ledger already reports VALID or the store already holds as VALID.
//!
//! The ledger pre-check only saves a doomed write; the ledger reverting a
//! repeated issue remains the authoritative duplicate signal.

use std::sync::Arc;

use certx_clients::{Ledger, LedgerStatus};
use certx_core::{ContentHash, SubmissionId, UserId};
use certx_state::SubmissionState;

use crate::error::{upstream_failure, IssuanceError};
use crate::store::{SubmissionFilter, SubmissionStore};

/// Duplicate and ownership checks over the store and the ledger.
#[derive(Clone)]
pub struct DuplicateGuard {
    store: Arc<dyn SubmissionStore>,
    ledger: Arc<dyn Ledger>,
}

impl DuplicateGuard {
    pub fn new(store: Arc<dyn SubmissionStore>, ledger: Arc<dyn Ledger>) -> Self {
        Self { store, ledger }
    }

    /// May `owner` start a workflow for content fingerprinted `hash`?
    ///
    /// `exclude` skips one submission (the one being approved).
    pub async fn check_original(
        &self,
        hash: &ContentHash,
        owner: &UserId,
        exclude: Option<SubmissionId>,
    ) -> Result<(), IssuanceError> {
        let existing = self.store.find(&SubmissionFilter::by_original(hash)).await?;
        let mut others = existing.iter().filter(|s| Some(s.id) != exclude);

        if let Some(valid) = others
            .clone()
            .find(|s| s.state() == SubmissionState::Valid)
        {
            tracing::info!(original_hash = %hash, existing = %valid.id, "content already VALID");
            return Err(IssuanceError::Duplicate(format!(
                "content {hash} is already issued"
            )));
        }

        if let Some(revoked) =
            others.find(|s| s.state() == SubmissionState::Revoked && s.owner != *owner)
        {
            tracing::info!(
                original_hash = %hash,
                existing = %revoked.id,
                "revoked content belongs to another owner"
            );
            return Err(IssuanceError::Ownership(format!(
                "content {hash} was issued to another owner"
            )));
        }

        Ok(())
    }

    /// Is `hash` free to be published?
    pub async fn check_published(&self, hash: &ContentHash) -> Result<(), IssuanceError> {
        let record = self
            .ledger
            .get(hash)
            .await
            .map_err(|e| upstream_failure("ledger", e))?;
        if record.status == LedgerStatus::Valid {
            return Err(IssuanceError::Duplicate(format!(
                "published hash {hash} is already VALID on the ledger"
            )));
        }

        let filter = SubmissionFilter::by_published(hash)
            .with_state(SubmissionState::Valid)
            .with_limit(1);
        if !self.store.find(&filter).await?.is_empty() {
            return Err(IssuanceError::Duplicate(format!(
                "published hash {hash} is already VALID in the store"
            )));
        }
        Ok(())
    }
}
