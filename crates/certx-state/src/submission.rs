//! # Submission Record and Transitions
//!
//! ## States
//!
//! | State | Entered by | Leaves to |
//! |-------|------------|-----------|
//! | `PENDING` | owner submission, reupload | `VALID`, `REJECTED` |
//! | `REJECTED` | approver rejection | (terminal) |
//! | `VALID` | approval, direct issue | `REVOKED` |
//! | `REVOKED` | owner or admin revocation | (terminal) |
//!
//! Every transition validates the current state first and appends a
//! [`TransitionRecord`]. Transitions never perform I/O; persisting the
//! mutated record is the caller's job.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use certx_core::{CertificateAttributes, ContentHash, SubmissionId, UserId};

// ─── Submission State ────────────────────────────────────────────────

/// The stored lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    /// Awaiting an approver.
    Pending,
    /// Declined by an approver (terminal).
    Rejected,
    /// Published to the content store and the ledger.
    Valid,
    /// Withdrawn after publication (terminal).
    Revoked,
}

impl SubmissionState {
    /// Whether no further transition may leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Revoked)
    }

    /// Canonical upper-case name, as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Rejected => "REJECTED",
            Self::Valid => "VALID",
            Self::Revoked => "REVOKED",
        }
    }

    /// Parse the canonical name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "REJECTED" => Some(Self::Rejected),
            "VALID" => Some(Self::Valid),
            "REVOKED" => Some(Self::Revoked),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The operation requires a pending submission.
    #[error("submission {id} is {state}, not PENDING")]
    NotPending {
        /// The submission.
        id: SubmissionId,
        /// Its current state.
        state: SubmissionState,
    },

    /// A pending submission has no raw content to publish.
    #[error("submission {id} has no raw content")]
    MissingContent {
        /// The submission.
        id: SubmissionId,
    },

    /// The transition is not allowed from the current state.
    #[error("invalid submission transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: SubmissionState,
        /// Attempted target state.
        to: SubmissionState,
    },

    /// The rejected submission does not allow (or has used up) its reupload.
    #[error("submission {id} does not allow reupload")]
    ReuploadNotAllowed {
        /// The rejected submission.
        id: SubmissionId,
    },

    /// A rejection was attempted without a reason.
    #[error("a rejection reason is required")]
    MissingReason,
}

// ─── Stage Payloads ──────────────────────────────────────────────────

/// Watermark parameters captured when the raw content was submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatermarkParams {
    /// Requested label, if the submitter supplied one.
    #[serde(default)]
    pub label: Option<String>,
    /// Requested opacity, if the submitter supplied one.
    #[serde(default)]
    pub opacity: Option<f32>,
}

/// The unmodified uploaded file awaiting approval.
///
/// `bytes` is not serialized with the record; stores keep it in a
/// dedicated binary column.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawContent {
    /// The file as uploaded.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// MIME type detected from the bytes.
    pub mime: String,
    /// Watermark parameters snapshot.
    #[serde(default)]
    pub watermark: WatermarkParams,
}

impl RawContent {
    /// Wrap uploaded bytes.
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>, watermark: WatermarkParams) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            watermark,
        }
    }

    /// Whether there is anything to publish.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for RawContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawContent")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("mime", &self.mime)
            .field("watermark", &self.watermark)
            .finish()
    }
}

/// Summary of the watermark applied before publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkReport {
    /// Label actually drawn.
    pub label_used: String,
    /// Effective opacity.
    pub opacity: f32,
    /// Detected format name (`pdf`, `png`, …).
    pub format: String,
    /// Whether a label was drawn at all.
    pub watermarked: bool,
    /// Whether diacritics were stripped to fit the glyph set.
    pub used_fallback_glyphs: bool,
}

/// Who approved publication, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    /// The approver. Absent only for records imported without one.
    pub approver: Option<UserId>,
    /// When the submission became VALID.
    pub at: DateTime<Utc>,
}

/// The published artefact of a VALID or REVOKED submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Fingerprint of the watermarked bytes, as recorded on the ledger.
    pub published_hash: ContentHash,
    /// URI of the metadata document recorded on the ledger.
    pub content_uri: String,
    /// URI of the watermarked file itself.
    pub document_uri: String,
    /// MIME type of the watermarked file.
    pub mime: String,
    /// What the watermark transform did.
    pub watermark: WatermarkReport,
    /// Approval details.
    pub approval: Approval,
}

/// Why and by whom a submission was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// The approver who rejected it.
    pub approver: UserId,
    /// When.
    pub at: DateTime<Utc>,
    /// Reason shown to the owner.
    pub reason: String,
    /// Whether the owner may reupload once.
    pub allow_reupload: bool,
}

/// Who revoked a publication, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    /// The owner or admin who revoked it.
    pub actor: UserId,
    /// When.
    pub at: DateTime<Utc>,
}

/// Link from a reuploaded submission to the rejected one it replaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReuploadLink {
    /// The rejected predecessor.
    pub predecessor: SubmissionId,
    /// Owner's note explaining the change.
    #[serde(default)]
    pub note: Option<String>,
}

/// Lifecycle data of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStage {
    /// Awaiting approval; holds the uploaded file.
    Pending {
        /// The uploaded file.
        raw: RawContent,
    },
    /// Rejected; keeps the file only while a reupload is still allowed.
    Rejected {
        /// Rejection details.
        rejection: Rejection,
        /// The uploaded file, for a reupload that brings no new bytes.
        #[serde(default)]
        retained_raw: Option<RawContent>,
    },
    /// Published.
    Valid {
        /// The publication.
        publication: Publication,
    },
    /// Published, then withdrawn.
    Revoked {
        /// The original publication.
        publication: Publication,
        /// Revocation details.
        revocation: Revocation,
    },
}

impl SubmissionStage {
    /// The state tag of this stage.
    pub fn state(&self) -> SubmissionState {
        match self {
            Self::Pending { .. } => SubmissionState::Pending,
            Self::Rejected { .. } => SubmissionState::Rejected,
            Self::Valid { .. } => SubmissionState::Valid,
            Self::Revoked { .. } => SubmissionState::Revoked,
        }
    }
}

// ─── Transition History ──────────────────────────────────────────────

/// Record of one lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before the transition; `None` on creation.
    pub from: Option<SubmissionState>,
    /// State after the transition.
    pub to: SubmissionState,
    /// When the transition occurred.
    pub at: DateTime<Utc>,
    /// Who caused it.
    pub actor: UserId,
    /// Optional free-text reason.
    #[serde(default)]
    pub reason: Option<String>,
}

// ─── Submission ──────────────────────────────────────────────────────

/// One certificate workflow record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Unique identifier.
    pub id: SubmissionId,
    /// The submitting user.
    pub owner: UserId,
    /// Fingerprint of the unmodified upload.
    pub original_hash: ContentHash,
    /// Holder and credential details.
    pub attributes: CertificateAttributes,
    /// Lifecycle data.
    pub stage: SubmissionStage,
    /// Set when this submission replaces a rejected one.
    #[serde(default)]
    pub reupload_of: Option<ReuploadLink>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last transition.
    pub updated_at: DateTime<Utc>,
    /// Ordered log of all transitions.
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
}

impl Submission {
    /// Create a pending submission.
    pub fn create(
        owner: UserId,
        original_hash: ContentHash,
        attributes: CertificateAttributes,
        raw: RawContent,
        reupload_of: Option<ReuploadLink>,
    ) -> Self {
        let now = Utc::now();
        let reason = reupload_of.as_ref().and_then(|link| link.note.clone());
        Self {
            id: SubmissionId::new(),
            transitions: vec![TransitionRecord {
                from: None,
                to: SubmissionState::Pending,
                at: now,
                actor: owner.clone(),
                reason,
            }],
            owner,
            original_hash,
            attributes,
            stage: SubmissionStage::Pending { raw },
            reupload_of,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a submission that is published in the same step.
    pub fn issue_directly(
        owner: UserId,
        original_hash: ContentHash,
        attributes: CertificateAttributes,
        publication: Publication,
        issuer: &UserId,
    ) -> Self {
        let now = publication.approval.at;
        Self {
            id: SubmissionId::new(),
            transitions: vec![TransitionRecord {
                from: None,
                to: SubmissionState::Valid,
                at: now,
                actor: issuer.clone(),
                reason: Some("direct issue".to_string()),
            }],
            owner,
            original_hash,
            attributes,
            stage: SubmissionStage::Valid { publication },
            reupload_of: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The stored state.
    pub fn state(&self) -> SubmissionState {
        self.stage.state()
    }

    /// The uploaded file, while one is held.
    pub fn raw(&self) -> Option<&RawContent> {
        match &self.stage {
            SubmissionStage::Pending { raw } => Some(raw),
            SubmissionStage::Rejected { retained_raw, .. } => retained_raw.as_ref(),
            _ => None,
        }
    }

    /// Mutable access to the held file, for stores rehydrating bytes.
    pub fn raw_mut(&mut self) -> Option<&mut RawContent> {
        match &mut self.stage {
            SubmissionStage::Pending { raw } => Some(raw),
            SubmissionStage::Rejected { retained_raw, .. } => retained_raw.as_mut(),
            _ => None,
        }
    }

    /// The publication of a VALID or REVOKED submission.
    pub fn publication(&self) -> Option<&Publication> {
        match &self.stage {
            SubmissionStage::Valid { publication }
            | SubmissionStage::Revoked { publication, .. } => Some(publication),
            _ => None,
        }
    }

    /// The published fingerprint, once published.
    pub fn published_hash(&self) -> Option<&ContentHash> {
        self.publication().map(|p| &p.published_hash)
    }

    /// The content URI recorded on the ledger, once published.
    pub fn content_uri(&self) -> Option<&str> {
        self.publication().map(|p| p.content_uri.as_str())
    }

    /// Rejection details, if rejected.
    pub fn rejection(&self) -> Option<&Rejection> {
        match &self.stage {
            SubmissionStage::Rejected { rejection, .. } => Some(rejection),
            _ => None,
        }
    }

    /// Whether this rejected submission may still spawn a reupload.
    pub fn allows_reupload(&self) -> bool {
        self.rejection().is_some_and(|r| r.allow_reupload)
    }

    /// Last day of validity, inclusive.
    pub fn expiration_date(&self) -> Option<NaiveDate> {
        self.attributes.expiration_date
    }

    /// The raw content of a pending submission.
    ///
    /// Fails `NotPending` for any other state and `MissingContent` when the
    /// pending record holds no bytes.
    pub fn pending_content(&self) -> Result<&RawContent, TransitionError> {
        match &self.stage {
            SubmissionStage::Pending { raw } if raw.is_empty() => {
                Err(TransitionError::MissingContent { id: self.id })
            }
            SubmissionStage::Pending { raw } => Ok(raw),
            other => Err(TransitionError::NotPending {
                id: self.id,
                state: other.state(),
            }),
        }
    }

    /// Publish (PENDING → VALID). The raw content is dropped.
    pub fn approve(&mut self, publication: Publication, approver: &UserId) -> Result<(), TransitionError> {
        self.pending_content()?;
        let at = publication.approval.at;
        self.stage = SubmissionStage::Valid { publication };
        self.record(SubmissionState::Pending, SubmissionState::Valid, at, approver, None);
        Ok(())
    }

    /// Decline (PENDING → REJECTED).
    ///
    /// The raw content is retained only when `allow_reupload` is set.
    pub fn reject(
        &mut self,
        approver: &UserId,
        reason: &str,
        allow_reupload: bool,
    ) -> Result<(), TransitionError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TransitionError::MissingReason);
        }
        let (id, state) = (self.id, self.state());
        let SubmissionStage::Pending { raw } = &mut self.stage else {
            return Err(TransitionError::NotPending { id, state });
        };
        let raw = std::mem::take(raw);
        let at = Utc::now();
        self.stage = SubmissionStage::Rejected {
            rejection: Rejection {
                approver: approver.clone(),
                at,
                reason: reason.to_string(),
                allow_reupload,
            },
            retained_raw: allow_reupload.then_some(raw),
        };
        self.record(
            SubmissionState::Pending,
            SubmissionState::Rejected,
            at,
            approver,
            Some(reason.to_string()),
        );
        Ok(())
    }

    /// Withdraw a publication (VALID → REVOKED).
    pub fn revoke(&mut self, actor: &UserId) -> Result<(), TransitionError> {
        let SubmissionStage::Valid { publication } = &self.stage else {
            return Err(TransitionError::InvalidTransition {
                from: self.state(),
                to: SubmissionState::Revoked,
            });
        };
        let publication = publication.clone();
        let at = Utc::now();
        self.stage = SubmissionStage::Revoked {
            publication,
            revocation: Revocation {
                actor: actor.clone(),
                at,
            },
        };
        self.record(SubmissionState::Valid, SubmissionState::Revoked, at, actor, None);
        Ok(())
    }

    /// Use up the reupload allowance of a rejected submission.
    ///
    /// Clears the allowance and hands back the retained file, if any.
    pub fn consume_reupload(&mut self) -> Result<Option<RawContent>, TransitionError> {
        let id = self.id;
        match &mut self.stage {
            SubmissionStage::Rejected {
                rejection,
                retained_raw,
            } if rejection.allow_reupload => {
                rejection.allow_reupload = false;
                self.updated_at = Utc::now();
                Ok(retained_raw.take())
            }
            _ => Err(TransitionError::ReuploadNotAllowed { id }),
        }
    }

    fn record(
        &mut self,
        from: SubmissionState,
        to: SubmissionState,
        at: DateTime<Utc>,
        actor: &UserId,
        reason: Option<String>,
    ) {
        self.transitions.push(TransitionRecord {
            from: Some(from),
            to,
            at,
            actor: actor.clone(),
            reason,
        });
        self.updated_at = at;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
