//! # Issuance Service
//!
//! Orchestrates the certificate lifecycle over its collaborators: the
//! submission store, the ledger, the content store, the audit sink and the
//! watermark engine.
//!
//! ## Operations
//!
//! | Operation | Actor | Transition |
//! |-----------|-------|------------|
//! | [`submit`](IssuanceService::submit) | owner | → PENDING |
//! | [`approve`](IssuanceService::approve) | approver | PENDING → VALID |
//! | [`reject`](IssuanceService::reject) | approver | PENDING → REJECTED |
//! | [`revoke`](IssuanceService::revoke) | owner or approver | VALID → REVOKED |
//! | [`reupload`](IssuanceService::reupload) | owner | REJECTED ⇒ new PENDING |
//! | [`direct_issue`](IssuanceService::direct_issue) | approver | → VALID |
//! | [`verify`](IssuanceService::verify) | anyone | read only |
//! | [`get`](IssuanceService::get) | anyone | read only |
//!
//! ## Publication Order
//!
//! Watermark (blocking worker) → published hash → duplicate check →
//! content store (file, then metadata) → ledger issue → conditional store
//! commit. Any failure before the commit leaves the submission PENDING and
//! the call may be retried.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use certx_clients::{
    ClientError, ContentStore, HttpContentStore, HttpLedgerClient, InMemoryContentStore,
    InMemoryLedger, Ledger, LedgerStatus,
};
use certx_core::{
    content_hash, Actor, CertificateAttributes, ContentHash, SubmissionId, UserId,
    ValidationError,
};
use certx_state::{
    Approval, Publication, RawContent, ReuploadLink, Submission, SubmissionState, SubmissionView,
    TransitionError, WatermarkParams, WatermarkReport,
};
use certx_watermark::{detect_mime, WatermarkConfig, WatermarkEngine};

use crate::audit::{emit, AuditAction, AuditEvent, AuditSink, PgAuditSink, TracingAuditSink};
use crate::config::IssuanceConfig;
use crate::error::{upstream_failure, IssuanceError, UPSTREAM_FAILURES_TOTAL};
use crate::guard::DuplicateGuard;
use crate::params::{check_opacity, resolve, ApprovalParams, ResolvedApproval};
use crate::resolver::{Verification, VerificationResolver};
use crate::store::{
    postgres, MemorySubmissionStore, PgSubmissionStore, StoreError, SubmissionFilter,
    SubmissionStore,
};

const SUBMISSIONS_TOTAL: &str = "certx_submissions_total";
const APPROVALS_TOTAL: &str = "certx_approvals_total";
const REJECTIONS_TOTAL: &str = "certx_rejections_total";
const REVOCATIONS_TOTAL: &str = "certx_revocations_total";
const VERIFICATIONS_TOTAL: &str = "certx_verifications_total";

/// What a publication produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationReceipt {
    pub submission_id: SubmissionId,
    /// Fingerprint recorded on the ledger.
    pub published_hash: ContentHash,
    /// Metadata document URI recorded on the ledger.
    #[serde(rename = "contentURI")]
    pub content_uri: String,
    /// URI of the watermarked file.
    pub document_uri: String,
    pub watermark: WatermarkReport,
}

impl PublicationReceipt {
    fn of(submission_id: SubmissionId, publication: &Publication) -> Self {
        Self {
            submission_id,
            published_hash: publication.published_hash.clone(),
            content_uri: publication.content_uri.clone(),
            document_uri: publication.document_uri.clone(),
            watermark: publication.watermark.clone(),
        }
    }
}

/// The certificate lifecycle over injected collaborators.
pub struct IssuanceService {
    store: Arc<dyn SubmissionStore>,
    ledger: Arc<dyn Ledger>,
    content: Arc<dyn ContentStore>,
    audit: Arc<dyn AuditSink>,
    engine: Arc<WatermarkEngine>,
    guard: DuplicateGuard,
    resolver: VerificationResolver,
}

impl IssuanceService {
    /// Assemble a service. Audit events go to the log until
    /// [`with_audit`](Self::with_audit) installs another sink.
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        ledger: Arc<dyn Ledger>,
        content: Arc<dyn ContentStore>,
        engine: WatermarkEngine,
    ) -> Self {
        Self {
            guard: DuplicateGuard::new(store.clone(), ledger.clone()),
            resolver: VerificationResolver::new(store.clone(), ledger.clone()),
            store,
            ledger,
            content,
            audit: Arc::new(TracingAuditSink),
            engine: Arc::new(engine),
        }
    }

    /// Replace the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// A service whose collaborators all live in memory.
    pub fn in_memory(watermark: WatermarkConfig) -> Self {
        Self::new(
            Arc::new(MemorySubmissionStore::new()),
            Arc::new(InMemoryLedger::new()),
            Arc::new(InMemoryContentStore::new()),
            WatermarkEngine::new(watermark),
        )
    }

    /// Build from configuration, connecting to PostgreSQL and the HTTP
    /// collaborators when they are configured.
    pub async fn from_config(config: &IssuanceConfig) -> Result<Self, IssuanceError> {
        let (ledger, content): (Arc<dyn Ledger>, Arc<dyn ContentStore>) = match &config.clients {
            Some(clients) => (
                Arc::new(HttpLedgerClient::new(clients).map_err(client_setup)?),
                Arc::new(HttpContentStore::new(clients).map_err(client_setup)?),
            ),
            None => {
                tracing::warn!(
                    "CERTX_API_TOKEN not set — using in-memory ledger and content store. \
                     Nothing will be published."
                );
                (Arc::new(InMemoryLedger::new()), Arc::new(InMemoryContentStore::new()))
            }
        };

        let (store, audit): (Arc<dyn SubmissionStore>, Arc<dyn AuditSink>) =
            match &config.database_url {
                Some(url) => {
                    let pool = postgres::connect(url).await?;
                    (
                        Arc::new(PgSubmissionStore::new(pool.clone())),
                        Arc::new(PgAuditSink::new(pool)),
                    )
                }
                None => {
                    tracing::warn!(
                        "DATABASE_URL not set — running in-memory only mode. \
                         Submissions will not survive restarts."
                    );
                    (Arc::new(MemorySubmissionStore::new()), Arc::new(TracingAuditSink))
                }
            };

        Ok(Self::new(store, ledger, content, WatermarkEngine::new(config.watermark.clone()))
            .with_audit(audit))
    }

    /// The watermark engine in use.
    pub fn engine(&self) -> &WatermarkEngine {
        &self.engine
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Create a PENDING submission owned by `actor`.
    pub async fn submit(
        &self,
        bytes: Vec<u8>,
        attributes: CertificateAttributes,
        actor: &Actor,
    ) -> Result<SubmissionId, IssuanceError> {
        self.submit_with_watermark(bytes, attributes, actor, WatermarkParams::default())
            .await
    }

    /// [`submit`](Self::submit) with the submitter's watermark preferences.
    pub async fn submit_with_watermark(
        &self,
        bytes: Vec<u8>,
        attributes: CertificateAttributes,
        actor: &Actor,
        watermark: WatermarkParams,
    ) -> Result<SubmissionId, IssuanceError> {
        if bytes.is_empty() {
            return Err(ValidationError::MissingField("content").into());
        }
        attributes.validate()?;
        check_opacity(watermark.opacity)?;

        let original_hash = content_hash(&bytes);
        self.guard
            .check_original(&original_hash, &actor.id, None)
            .await?;

        let mime = detect_mime(&bytes);
        let submission = Submission::create(
            actor.id.clone(),
            original_hash,
            attributes,
            RawContent::new(bytes, mime, watermark),
            None,
        );
        self.store
            .insert(&submission)
            .await
            .map_err(store_write_error)?;

        tracing::info!(
            submission_id = %submission.id,
            original_hash = %submission.original_hash,
            owner = %submission.owner,
            mime,
            "certificate submitted"
        );
        metrics::counter!(SUBMISSIONS_TOTAL, "path" => "upload").increment(1);
        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditAction::CertUpload,
                &actor.id,
                submission.id,
                serde_json::json!({
                    "originalHash": submission.original_hash,
                    "mime": mime,
                }),
            ),
        )
        .await;

        Ok(submission.id)
    }

    // ── Review ───────────────────────────────────────────────────────

    /// Publish a PENDING submission.
    pub async fn approve(
        &self,
        id: SubmissionId,
        approver: &Actor,
        params: ApprovalParams,
    ) -> Result<PublicationReceipt, IssuanceError> {
        require_approver(approver, "approve")?;
        let mut submission = self.load(id).await?;
        let raw = submission.pending_content()?.clone();

        self.guard
            .check_original(&submission.original_hash, &submission.owner, Some(id))
            .await?;
        let resolved = resolve(
            &params,
            &submission.attributes,
            &raw.watermark,
            self.engine.config(),
            Utc::now().date_naive(),
        )?;

        let publication = self
            .publish(raw.bytes, &submission.original_hash, &resolved, &approver.id)
            .await?;
        submission.attributes = resolved.attributes;
        submission.approve(publication.clone(), &approver.id)?;
        self.commit(&submission, SubmissionState::Pending).await?;

        tracing::info!(
            submission_id = %id,
            original_hash = %submission.original_hash,
            published_hash = %publication.published_hash,
            state = %submission.state(),
            "certificate approved"
        );
        metrics::counter!(APPROVALS_TOTAL, "path" => "review").increment(1);
        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditAction::Approve,
                &approver.id,
                id,
                serde_json::json!({
                    "publishedHash": publication.published_hash,
                    "contentURI": publication.content_uri,
                    "expirationDate": submission.expiration_date(),
                }),
            ),
        )
        .await;

        Ok(PublicationReceipt::of(id, &publication))
    }

    /// Decline a PENDING submission.
    pub async fn reject(
        &self,
        id: SubmissionId,
        approver: &Actor,
        reason: &str,
        allow_reupload: bool,
    ) -> Result<(), IssuanceError> {
        require_approver(approver, "reject")?;
        let mut submission = self.load(id).await?;
        submission.reject(&approver.id, reason, allow_reupload)?;
        self.commit(&submission, SubmissionState::Pending).await?;

        tracing::info!(submission_id = %id, allow_reupload, state = %submission.state(), "certificate rejected");
        metrics::counter!(REJECTIONS_TOTAL).increment(1);
        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditAction::Reject,
                &approver.id,
                id,
                serde_json::json!({
                    "reason": reason.trim(),
                    "allowReupload": allow_reupload,
                }),
            ),
        )
        .await;
        Ok(())
    }

    /// Withdraw a VALID certificate and every other VALID submission of the
    /// same content by the same owner.
    ///
    /// Returns the ids of the submissions revoked.
    pub async fn revoke(
        &self,
        id: SubmissionId,
        actor: &Actor,
    ) -> Result<Vec<SubmissionId>, IssuanceError> {
        let target = self.load(id).await?;
        if !actor.owns_or_administers(&target.owner) {
            return Err(IssuanceError::Ownership(format!(
                "{} may not revoke submission {id}",
                actor.id
            )));
        }
        if target.state() != SubmissionState::Valid {
            return Err(TransitionError::InvalidTransition {
                from: target.state(),
                to: SubmissionState::Revoked,
            }
            .into());
        }

        let filter = SubmissionFilter::by_original(&target.original_hash)
            .with_owner(&target.owner)
            .with_state(SubmissionState::Valid);
        let mut lineage = self.store.find(&filter).await?;
        if !lineage.iter().any(|s| s.id == id) {
            lineage.push(target);
        }

        for submission in &lineage {
            if let Some(hash) = submission.published_hash() {
                self.revoke_on_ledger(hash).await?;
            }
        }

        let mut revoked = Vec::with_capacity(lineage.len());
        for mut submission in lineage {
            submission.revoke(&actor.id)?;
            if !self
                .store
                .replace_if_state(&submission, SubmissionState::Valid)
                .await
                .map_err(store_write_error)?
            {
                if submission.id == id {
                    return Err(self.lost_race(id, SubmissionState::Revoked).await);
                }
                tracing::debug!(submission_id = %submission.id, "sibling already left VALID");
                continue;
            }
            tracing::info!(
                submission_id = %submission.id,
                original_hash = %submission.original_hash,
                published_hash = ?submission.published_hash().map(ToString::to_string),
                "certificate revoked"
            );
            emit(
                self.audit.as_ref(),
                AuditEvent::new(
                    AuditAction::Revoke,
                    &actor.id,
                    submission.id,
                    serde_json::json!({ "publishedHash": submission.published_hash() }),
                ),
            )
            .await;
            revoked.push(submission.id);
        }
        metrics::counter!(REVOCATIONS_TOTAL).increment(revoked.len() as u64);
        Ok(revoked)
    }

    /// Replace a REJECTED submission that allows reupload with a new
    /// PENDING one. Without `bytes` the rejected file is resubmitted.
    pub async fn reupload(
        &self,
        id: SubmissionId,
        actor: &Actor,
        note: Option<String>,
        bytes: Option<Vec<u8>>,
    ) -> Result<SubmissionId, IssuanceError> {
        let predecessor = self.load(id).await?;
        if actor.id != predecessor.owner {
            return Err(IssuanceError::Ownership(format!(
                "only the owner may reupload submission {id}"
            )));
        }

        let mut consumed = predecessor.clone();
        let retained = consumed.consume_reupload()?;
        let raw = match bytes {
            Some(bytes) if bytes.is_empty() => {
                return Err(ValidationError::MissingField("content").into());
            }
            Some(bytes) => {
                let watermark = retained.map(|r| r.watermark).unwrap_or_default();
                let mime = detect_mime(&bytes);
                RawContent::new(bytes, mime, watermark)
            }
            None => retained
                .filter(|r| !r.is_empty())
                .ok_or(ValidationError::MissingField("content"))?,
        };

        let original_hash = content_hash(&raw.bytes);
        self.guard
            .check_original(&original_hash, &predecessor.owner, None)
            .await?;

        if !self
            .store
            .replace_if_state(&consumed, SubmissionState::Rejected)
            .await
            .map_err(store_write_error)?
        {
            return Err(TransitionError::ReuploadNotAllowed { id }.into());
        }

        let note = note.filter(|n| !n.trim().is_empty());
        let successor = Submission::create(
            predecessor.owner.clone(),
            original_hash,
            predecessor.attributes.clone(),
            raw,
            Some(ReuploadLink {
                predecessor: id,
                note: note.clone(),
            }),
        );
        if let Err(e) = self.store.insert(&successor).await {
            tracing::error!(
                predecessor = %id,
                error = %e,
                "reupload allowance consumed but the new submission was not stored"
            );
            return Err(store_write_error(e));
        }

        tracing::info!(
            submission_id = %successor.id,
            predecessor = %id,
            original_hash = %successor.original_hash,
            "certificate reuploaded"
        );
        metrics::counter!(SUBMISSIONS_TOTAL, "path" => "reupload").increment(1);
        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditAction::Reupload,
                &actor.id,
                successor.id,
                serde_json::json!({
                    "predecessor": id,
                    "note": note,
                    "originalHash": successor.original_hash,
                }),
            ),
        )
        .await;
        Ok(successor.id)
    }

    /// Create and publish in one step. The issuing approver owns the result.
    pub async fn direct_issue(
        &self,
        bytes: Vec<u8>,
        attributes: CertificateAttributes,
        actor: &Actor,
        params: ApprovalParams,
    ) -> Result<PublicationReceipt, IssuanceError> {
        require_approver(actor, "issue")?;
        if bytes.is_empty() {
            return Err(ValidationError::MissingField("content").into());
        }
        attributes.validate()?;

        let original_hash = content_hash(&bytes);
        self.guard
            .check_original(&original_hash, &actor.id, None)
            .await?;
        let resolved = resolve(
            &params,
            &attributes,
            &WatermarkParams::default(),
            self.engine.config(),
            Utc::now().date_naive(),
        )?;

        let publication = self
            .publish(bytes, &original_hash, &resolved, &actor.id)
            .await?;
        let submission = Submission::issue_directly(
            actor.id.clone(),
            original_hash,
            resolved.attributes,
            publication.clone(),
            &actor.id,
        );
        if let Err(e) = self.store.insert(&submission).await {
            tracing::error!(
                published_hash = %publication.published_hash,
                error = %e,
                "ledger holds a direct issue the store did not record"
            );
            return Err(store_write_error(e));
        }

        tracing::info!(
            submission_id = %submission.id,
            original_hash = %submission.original_hash,
            published_hash = %publication.published_hash,
            state = %submission.state(),
            "certificate issued directly"
        );
        metrics::counter!(APPROVALS_TOTAL, "path" => "direct").increment(1);
        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditAction::Issue,
                &actor.id,
                submission.id,
                serde_json::json!({
                    "originalHash": submission.original_hash,
                    "publishedHash": publication.published_hash,
                    "contentURI": publication.content_uri,
                }),
            ),
        )
        .await;

        Ok(PublicationReceipt::of(submission.id, &publication))
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Resolve a published hash given as text (`0x`-prefixed or bare hex).
    pub async fn verify(&self, hash: &str) -> Result<Verification, IssuanceError> {
        let hash = ContentHash::parse(hash).map_err(ValidationError::from)?;
        let verification = self.resolver.verify(&hash, Utc::now()).await?;
        metrics::counter!(
            VERIFICATIONS_TOTAL,
            "source" => verification.source.map_or("none", |s| s.as_str()),
            "status" => verification.status.as_str()
        )
        .increment(1);
        tracing::debug!(
            published_hash = %hash,
            status = %verification.status,
            "verification resolved"
        );
        Ok(verification)
    }

    /// The record with its derived status. Raw bytes are never exposed.
    pub async fn get(&self, id: SubmissionId) -> Result<SubmissionView, IssuanceError> {
        Ok(self.load(id).await?.view(Utc::now()))
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn load(&self, id: SubmissionId) -> Result<Submission, IssuanceError> {
        self.store
            .get(id)
            .await?
            .ok_or(IssuanceError::NotFound(id))
    }

    /// Watermark, upload and record on the ledger.
    async fn publish(
        &self,
        bytes: Vec<u8>,
        original_hash: &ContentHash,
        resolved: &ResolvedApproval,
        approver: &UserId,
    ) -> Result<Publication, IssuanceError> {
        let engine = Arc::clone(&self.engine);
        let label = resolved.label.clone();
        let opacity = resolved.opacity;
        let output = tokio::task::spawn_blocking(move || engine.transform(&bytes, &label, opacity))
            .await
            .map_err(|e| IssuanceError::Internal(format!("watermark worker failed: {e}")))??;

        let published_hash = content_hash(&output.bytes);
        self.guard.check_published(&published_hash).await?;

        let mime = output.mime();
        let report = WatermarkReport {
            label_used: output.label_used.clone(),
            opacity,
            format: output.format.as_str().to_string(),
            watermarked: output.watermarked,
            used_fallback_glyphs: output.used_fallback_glyphs,
        };
        let file_name = format!("{}.{}", published_hash.hex(), extension(output.format.as_str()));
        let document_uri = self
            .content
            .put_bytes(output.bytes, &file_name, mime)
            .await
            .map_err(|e| upstream_failure("content store", e))?;

        let approved_at = Utc::now();
        let metadata = serde_json::json!({
            "name": resolved.attributes.holder_name,
            "description": resolved
                .attributes
                .credential_name
                .as_deref()
                .unwrap_or("Certificate"),
            "image": document_uri,
            "mime": mime,
            "originalHash": original_hash,
            "publishedHash": published_hash,
            "issuedAt": approved_at,
            "attributes": [
                {"trait_type": "Holder", "value": resolved.attributes.holder_name},
                {"trait_type": "Credential Type", "value": resolved.attributes.credential_type_id},
                {"trait_type": "Issued Date", "value": resolved.attributes.issued_date},
                {"trait_type": "Expiration Date", "value": resolved.attributes.expiration_date},
            ],
        });
        let content_uri = self
            .content
            .put_json(&metadata, "metadata.json")
            .await
            .map_err(|e| upstream_failure("content store", e))?;

        self.ledger
            .issue(&published_hash, &content_uri)
            .await
            .map_err(|e| upstream_failure("ledger", e).conflict_as_duplicate())?;

        Ok(Publication {
            published_hash,
            content_uri,
            document_uri,
            mime: mime.to_string(),
            watermark: report,
            approval: Approval {
                approver: Some(approver.clone()),
                at: approved_at,
            },
        })
    }

    /// Revoke on the ledger unless it no longer reports VALID.
    async fn revoke_on_ledger(&self, hash: &ContentHash) -> Result<(), IssuanceError> {
        let record = self
            .ledger
            .get(hash)
            .await
            .map_err(|e| upstream_failure("ledger", e))?;
        if record.status != LedgerStatus::Valid {
            tracing::debug!(published_hash = %hash, status = ?record.status, "ledger already not VALID");
            return Ok(());
        }
        match self.ledger.revoke(hash).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_conflict() => {
                tracing::warn!(published_hash = %hash, error = %e, "ledger revoke raced, treating as revoked");
                Ok(())
            }
            Err(e) => Err(upstream_failure("ledger", e)),
        }
    }

    /// Commit a transition with a conditional write.
    async fn commit(
        &self,
        submission: &Submission,
        expected: SubmissionState,
    ) -> Result<(), IssuanceError> {
        let written = self
            .store
            .replace_if_state(submission, expected)
            .await
            .map_err(store_write_error)?;
        if written {
            return Ok(());
        }
        if submission.state() == SubmissionState::Valid {
            tracing::error!(
                submission_id = %submission.id,
                published_hash = ?submission.published_hash().map(ToString::to_string),
                "published upstream but the store commit lost a race"
            );
        }
        Err(self.lost_race(submission.id, submission.state()).await)
    }

    /// The state error for a conditional write that found another state.
    async fn lost_race(&self, id: SubmissionId, target: SubmissionState) -> IssuanceError {
        match self.store.get(id).await {
            Ok(Some(current)) if target == SubmissionState::Revoked => {
                TransitionError::InvalidTransition {
                    from: current.state(),
                    to: target,
                }
                .into()
            }
            Ok(Some(current)) => TransitionError::NotPending {
                id,
                state: current.state(),
            }
            .into(),
            Ok(None) => IssuanceError::NotFound(id),
            Err(e) => e.into(),
        }
    }
}

impl std::fmt::Debug for IssuanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceService")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

fn require_approver(actor: &Actor, operation: &str) -> Result<(), IssuanceError> {
    if actor.role.is_admin() {
        Ok(())
    } else {
        Err(IssuanceError::Ownership(format!(
            "{} may not {operation} certificates",
            actor.id
        )))
    }
}

fn store_write_error(err: StoreError) -> IssuanceError {
    match err {
        StoreError::Conflict(detail) => IssuanceError::Duplicate(detail),
        other => {
            metrics::counter!(UPSTREAM_FAILURES_TOTAL, "service" => "store").increment(1);
            IssuanceError::Store(other)
        }
    }
}

fn client_setup(err: ClientError) -> IssuanceError {
    IssuanceError::Internal(format!("collaborator client setup failed: {err}"))
}

fn extension(format: &str) -> &str {
    match format {
        "jpeg" => "jpg",
        "unsupported" => "bin",
        other => other,
    }
}
