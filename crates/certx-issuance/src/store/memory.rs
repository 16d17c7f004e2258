//! In-memory submission store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use certx_core::SubmissionId;
use certx_state::{Submission, SubmissionState};

use super::{StoreError, SubmissionFilter, SubmissionStore};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<SubmissionId, (u64, Submission)>,
    next_seq: u64,
}

impl Inner {
    /// Another VALID record that `candidate` would collide with.
    fn valid_collision(&self, candidate: &Submission) -> Option<SubmissionId> {
        if candidate.state() != SubmissionState::Valid {
            return None;
        }
        self.records
            .values()
            .map(|(_, other)| other)
            .find(|other| {
                other.id != candidate.id
                    && other.state() == SubmissionState::Valid
                    && (other.original_hash == candidate.original_hash
                        || other.published_hash() == candidate.published_hash())
            })
            .map(|other| other.id)
    }
}

/// Submission store held in a map behind one lock.
///
/// The conditional write and the collision check run under the same write
/// lock, so they are atomic with respect to each other.
#[derive(Debug, Default)]
pub struct MemorySubmissionStore {
    inner: RwLock<Inner>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored submissions.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn insert(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.records.contains_key(&submission.id) {
            return Err(StoreError::DuplicateId(submission.id));
        }
        if let Some(other) = inner.valid_collision(submission) {
            return Err(StoreError::Conflict(format!(
                "submission {other} is already VALID for this content"
            )));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.records.insert(submission.id, (seq, submission.clone()));
        Ok(())
    }

    async fn get(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError> {
        Ok(self.inner.read().records.get(&id).map(|(_, s)| s.clone()))
    }

    async fn find(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, StoreError> {
        let inner = self.inner.read();
        let mut hits: Vec<&(u64, Submission)> = inner
            .records
            .values()
            .filter(|(_, s)| filter.matches(s))
            .collect();
        hits.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(hits.into_iter().take(limit).map(|(_, s)| s.clone()).collect())
    }

    async fn replace_if_state(
        &self,
        submission: &Submission,
        expected: SubmissionState,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let current = match inner.records.get(&submission.id) {
            Some((_, current)) => current.state(),
            None => return Ok(false),
        };
        if current != expected {
            return Ok(false);
        }
        if let Some(other) = inner.valid_collision(submission) {
            return Err(StoreError::Conflict(format!(
                "submission {other} is already VALID for this content"
            )));
        }
        if let Some(entry) = inner.records.get_mut(&submission.id) {
            entry.1 = submission.clone();
        }
        Ok(true)
    }
}
