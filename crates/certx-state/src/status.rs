//! # Derived Status
//!
//! The status reported to readers. It equals the stored state except that a
//! `VALID` record past its expiration date reads as `EXPIRED`. Expiry is
//! evaluated at read time and never written back.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use certx_core::{is_expired_at, CertificateAttributes, ContentHash, SubmissionId, UserId};

use crate::submission::{
    ReuploadLink, Submission, SubmissionState, TransitionRecord, WatermarkReport,
};

/// Status as seen by a reader at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DerivedStatus {
    Pending,
    Rejected,
    Valid,
    Revoked,
    /// Stored as VALID, but the expiration date has passed.
    Expired,
}

impl DerivedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Rejected => "REJECTED",
            Self::Valid => "VALID",
            Self::Revoked => "REVOKED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Submission {
    /// The status a reader sees at `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> DerivedStatus {
        match self.state() {
            SubmissionState::Pending => DerivedStatus::Pending,
            SubmissionState::Rejected => DerivedStatus::Rejected,
            SubmissionState::Revoked => DerivedStatus::Revoked,
            SubmissionState::Valid => match self.expiration_date() {
                Some(expiration) if is_expired_at(expiration, now) => DerivedStatus::Expired,
                _ => DerivedStatus::Valid,
            },
        }
    }

    /// A read-only projection of the record at `now`, without raw bytes.
    pub fn view(&self, now: DateTime<Utc>) -> SubmissionView {
        let publication = self.publication();
        let rejection = self.rejection();
        SubmissionView {
            id: self.id,
            owner: self.owner.clone(),
            original_hash: self.original_hash.clone(),
            published_hash: publication.map(|p| p.published_hash.clone()),
            content_uri: publication.map(|p| p.content_uri.clone()),
            document_uri: publication.map(|p| p.document_uri.clone()),
            attributes: self.attributes.clone(),
            state: self.state(),
            status: self.status_at(now),
            approved_by: publication.and_then(|p| p.approval.approver.clone()),
            approved_at: publication.map(|p| p.approval.at),
            watermark: publication.map(|p| p.watermark.clone()),
            rejection_reason: rejection.map(|r| r.reason.clone()),
            allow_reupload: rejection.is_some_and(|r| r.allow_reupload),
            reupload_of: self.reupload_of.clone(),
            raw_mime: self.raw().map(|r| r.mime.clone()),
            created_at: self.created_at,
            updated_at: self.updated_at,
            transitions: self.transitions.clone(),
        }
    }
}

/// Flat, serializable projection of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    pub id: SubmissionId,
    pub owner: UserId,
    pub original_hash: ContentHash,
    pub published_hash: Option<ContentHash>,
    pub content_uri: Option<String>,
    pub document_uri: Option<String>,
    pub attributes: CertificateAttributes,
    pub state: SubmissionState,
    pub status: DerivedStatus,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub watermark: Option<WatermarkReport>,
    pub rejection_reason: Option<String>,
    pub allow_reupload: bool,
    pub reupload_of: Option<ReuploadLink>,
    /// MIME type of the held upload, while one is held.
    pub raw_mime: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub transitions: Vec<TransitionRecord>,
}

impl SubmissionView {
    /// Last day of validity, inclusive.
    pub fn expiration_date(&self) -> Option<NaiveDate> {
        self.attributes.expiration_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::tests::{make_pending, publication, user};
    use chrono::{Duration, TimeZone};

    fn valid_expiring(expiration: Option<NaiveDate>) -> Submission {
        let mut sub = make_pending();
        sub.attributes.expiration_date = expiration;
        sub.approve(publication(), &user("admin-1")).unwrap();
        sub
    }

    #[test]
    fn expired_yesterday_reads_expired() {
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap();
        let yesterday = now.date_naive() - Duration::days(1);
        let sub = valid_expiring(Some(yesterday));
        assert_eq!(sub.status_at(now), DerivedStatus::Expired);
        // Never written back.
        assert_eq!(sub.state(), SubmissionState::Valid);
    }

    #[test]
    fn expiring_today_reads_valid() {
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 23, 59, 59).unwrap();
        let sub = valid_expiring(Some(now.date_naive()));
        assert_eq!(sub.status_at(now), DerivedStatus::Valid);
    }

    #[test]
    fn permanent_certificate_never_expires() {
        let sub = valid_expiring(None);
        let far = Utc.with_ymd_and_hms(2200, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(sub.status_at(far), DerivedStatus::Valid);
    }

    #[test]
    fn expiry_only_applies_to_valid() {
        let mut sub = make_pending();
        sub.attributes.expiration_date = NaiveDate::from_ymd_opt(2000, 1, 1);
        assert_eq!(sub.status_at(Utc::now()), DerivedStatus::Pending);

        sub.approve(publication(), &user("admin-1")).unwrap();
        sub.revoke(&user("owner-1")).unwrap();
        assert_eq!(sub.status_at(Utc::now()), DerivedStatus::Revoked);
    }

    #[test]
    fn view_hides_bytes_and_reports_publication() {
        let pending = make_pending().view(Utc::now());
        assert_eq!(pending.raw_mime.as_deref(), Some("application/pdf"));
        assert!(pending.published_hash.is_none());

        let valid = valid_expiring(None).view(Utc::now());
        assert_eq!(valid.status, DerivedStatus::Valid);
        assert_eq!(valid.content_uri.as_deref(), Some("ipfs://meta"));
        assert_eq!(valid.approved_by, Some(user("admin-1")));
        assert!(valid.raw_mime.is_none());

        let json = serde_json::to_value(&valid).unwrap();
        assert_eq!(json["status"], "VALID");
        assert!(json.get("publishedHash").is_some());
    }
}
