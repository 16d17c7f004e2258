//! # Issuance Errors
//!
//! Folds the errors of every lower crate into one [`IssuanceError`] and
//! classifies it into a stable [`ErrorKind`]. Callers branch on the kind;
//! the message shown to an end user is fixed per kind so upstream detail
//! never leaks.

use thiserror::Error;

use certx_clients::ClientError;
use certx_core::{SubmissionId, ValidationError};
use certx_state::TransitionError;
use certx_watermark::WatermarkError;

use crate::store::StoreError;

/// Counter of collaborator failures, labelled by `service`.
pub(crate) const UPSTREAM_FAILURES_TOTAL: &str = "certx_upstream_failures_total";

/// Stable classification of an [`IssuanceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input is malformed or violates a domain rule.
    Validation,
    /// A certificate with the same content is already published.
    Duplicate,
    /// The actor may not act on this certificate or its content.
    Ownership,
    /// The submission is not in a state that allows the operation.
    State,
    /// A collaborator (ledger, content store, database) is failing.
    UpstreamUnavailable,
    /// A collaborator refused a write because of existing state.
    UpstreamConflict,
    /// A collaborator answered, but refused or garbled the request.
    UpstreamRejected,
    /// No such submission.
    NotFound,
    /// A failure inside the engine itself.
    Internal,
}

impl ErrorKind {
    /// Machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Duplicate => "DUPLICATE",
            Self::Ownership => "OWNERSHIP",
            Self::State => "INVALID_STATE",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamConflict => "UPSTREAM_CONFLICT",
            Self::UpstreamRejected => "UPSTREAM_REJECTED",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Errors from the issuance service.
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// Input validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The content could not be watermarked.
    #[error("content rejected by the watermark transform: {0}")]
    Content(#[from] WatermarkError),

    /// The content is already published.
    #[error("duplicate certificate: {0}")]
    Duplicate(String),

    /// The actor is not entitled to the operation.
    #[error("not permitted: {0}")]
    Ownership(String),

    /// Lifecycle transition refused.
    #[error(transparent)]
    State(#[from] TransitionError),

    /// No submission with this id.
    #[error("submission {0} not found")]
    NotFound(SubmissionId),

    /// Ledger or content store failing.
    #[error("{service} unavailable: {source}")]
    UpstreamUnavailable {
        service: &'static str,
        #[source]
        source: ClientError,
    },

    /// Ledger or content store refused the write.
    #[error("{service} conflict: {source}")]
    UpstreamConflict {
        service: &'static str,
        #[source]
        source: ClientError,
    },

    /// Ledger or content store answered with a non-transient failure
    /// (authorization, bad request, unparseable body).
    #[error("{service} rejected the request: {source}")]
    UpstreamRejected {
        service: &'static str,
        #[source]
        source: ClientError,
    },

    /// The submission store failed.
    #[error("submission store failed: {0}")]
    Store(#[from] StoreError),

    /// Blocking worker failure or similar.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IssuanceError {
    /// Wrap a collaborator error. Only transport failures and 5xx
    /// responses count as outages; other refusals will not heal on retry.
    pub fn upstream(service: &'static str, source: ClientError) -> Self {
        if source.is_conflict() {
            Self::UpstreamConflict { service, source }
        } else if source.is_unavailable() {
            Self::UpstreamUnavailable { service, source }
        } else {
            Self::UpstreamRejected { service, source }
        }
    }

    /// The stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Content(_) => ErrorKind::Validation,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::Ownership(_) => ErrorKind::Ownership,
            Self::State(TransitionError::MissingReason) => ErrorKind::Validation,
            Self::State(_) => ErrorKind::State,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::UpstreamUnavailable { .. } | Self::Store(_) => ErrorKind::UpstreamUnavailable,
            Self::UpstreamConflict { .. } => ErrorKind::UpstreamConflict,
            Self::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the same call may succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::UpstreamUnavailable
    }

    /// Fixed message for end users.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "The certificate data is invalid.",
            ErrorKind::Duplicate => "This certificate has already been issued.",
            ErrorKind::Ownership => "You are not permitted to perform this action on this certificate.",
            ErrorKind::State => "The certificate is not in a state that allows this action.",
            ErrorKind::NotFound => "Certificate not found.",
            ErrorKind::UpstreamUnavailable | ErrorKind::UpstreamConflict => {
                "The issuance service is temporarily unavailable. Please try again later."
            }
            ErrorKind::UpstreamRejected => "The issuance service could not complete the request.",
            ErrorKind::Internal => "An internal error occurred.",
        }
    }

    /// Fold an upstream conflict into a duplicate, leaving other errors as they are.
    pub(crate) fn conflict_as_duplicate(self) -> Self {
        match self {
            Self::UpstreamConflict { service, source } => {
                Self::Duplicate(format!("{service} already holds this content ({source})"))
            }
            other => other,
        }
    }
}

/// Log a collaborator failure, count it unless it is a conflict, and wrap it.
pub(crate) fn upstream_failure(service: &'static str, err: ClientError) -> IssuanceError {
    if err.is_conflict() {
        tracing::info!(service, error = %err, "upstream refused write");
    } else {
        tracing::error!(service, error = %err, "upstream call failed");
        metrics::counter!(UPSTREAM_FAILURES_TOTAL, "service" => service).increment(1);
    }
    IssuanceError::upstream(service, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_metrics::CountingRecorder;
    use certx_state::SubmissionState;

    fn conflict() -> ClientError {
        ClientError::Conflict {
            endpoint: "issue".into(),
            body: "already recorded".into(),
        }
    }

    fn outage() -> ClientError {
        ClientError::Unavailable {
            endpoint: "issue".into(),
            reason: "503".into(),
        }
    }

    #[test]
    fn upstream_splits_conflict_from_outage() {
        assert_eq!(IssuanceError::upstream("ledger", conflict()).kind(), ErrorKind::UpstreamConflict);
        let err = IssuanceError::upstream("ledger", outage());
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn refusals_and_garbled_answers_are_not_retryable() {
        let unauthorized = ClientError::ApiError {
            endpoint: "POST /certificates".into(),
            status: 401,
            body: "bad token".into(),
        };
        let err = IssuanceError::upstream("ledger", unauthorized);
        assert_eq!(err.kind(), ErrorKind::UpstreamRejected);
        assert_eq!(err.kind().code(), "UPSTREAM_REJECTED");
        assert!(!err.is_retryable());
        assert!(!err.user_message().contains("bad token"));

        let missing = ClientError::NotFound {
            uri: "ipfs://gone".into(),
        };
        assert!(!IssuanceError::upstream("content store", missing).is_retryable());

        let bad_uri = ClientError::InvalidUri("ftp://x".into());
        let err = IssuanceError::upstream("content store", bad_uri).conflict_as_duplicate();
        assert_eq!(err.kind(), ErrorKind::UpstreamRejected);
    }

    #[test]
    fn upstream_failure_counts_outages_but_not_conflicts() {
        let recorder = CountingRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            let _ = upstream_failure("ledger", conflict());
            let _ = upstream_failure("ledger", outage());
        });
        assert_eq!(recorder.count(UPSTREAM_FAILURES_TOTAL), 1);
    }

    #[test]
    fn conflict_normalizes_to_duplicate() {
        let err = IssuanceError::upstream("ledger", conflict()).conflict_as_duplicate();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert!(!err.is_retryable());

        let err = IssuanceError::upstream("ledger", outage()).conflict_as_duplicate();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn upstream_detail_never_reaches_users() {
        let err = IssuanceError::upstream("ledger", outage());
        assert!(err.to_string().contains("503"));
        assert!(!err.user_message().contains("503"));
        assert!(err.user_message().contains("temporarily unavailable"));
    }

    #[test]
    fn lower_errors_classify() {
        let err: IssuanceError = ValidationError::MissingField("holder_name").into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: IssuanceError = WatermarkError::CorruptImage("truncated".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: IssuanceError = TransitionError::NotPending {
            id: SubmissionId::new(),
            state: SubmissionState::Valid,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(err.kind().code(), "INVALID_STATE");

        let err: IssuanceError = TransitionError::MissingReason.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
