//! # Audit Trail
//!
//! Every lifecycle operation emits one [`AuditEvent`]. Delivery is
//! fire-and-forget: [`emit`] logs a sink failure at `warn` and returns, so
//! an unavailable audit log never aborts an issuance.
//!
//! ## Sinks
//!
//! | Sink | Destination |
//! |------|-------------|
//! | [`TracingAuditSink`] | structured `tracing` event on target `certx::audit` |
//! | [`MemoryAuditSink`] | in-process list, for tests |
//! | [`PgAuditSink`] | `audit_events` table, SHA-256 hash-chained |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use certx_core::{SubmissionId, UserId};

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";
const RESOURCE_TYPE: &str = "certificate_submission";

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CertUpload,
    Approve,
    Reject,
    Revoke,
    Issue,
    Reupload,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CertUpload => "CERT_UPLOAD",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::Revoke => "REVOKE",
            Self::Issue => "ISSUE",
            Self::Reupload => "REUPLOAD",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audited operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub actor: UserId,
    pub submission_id: SubmissionId,
    /// Operation-specific detail (hashes, reason, predecessor id, …).
    pub details: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        actor: &UserId,
        submission_id: SubmissionId,
        details: serde_json::Value,
    ) -> Self {
        Self {
            action,
            actor: actor.clone(),
            submission_id,
            details,
            at: Utc::now(),
        }
    }
}

/// Audit sink failure.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Deliver `event`, logging instead of propagating a failure.
pub async fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    if let Err(e) = sink.record(&event).await {
        tracing::warn!(
            action = %event.action,
            submission_id = %event.submission_id,
            error = %e,
            "audit event dropped"
        );
    }
}

// ─── Tracing ─────────────────────────────────────────────────────────

/// Writes each event as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "certx::audit",
            action = %event.action,
            actor = %event.actor,
            submission_id = %event.submission_id,
            details = %event.details,
            "audit"
        );
        Ok(())
    }
}

// ─── Memory ──────────────────────────────────────────────────────────

/// Keeps events in order; can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: Mutex<bool>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `record` fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Recorded actions, in order.
    pub fn actions(&self) -> Vec<AuditAction> {
        self.events.lock().iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        if *self.failing.lock() {
            return Err(AuditError::Unavailable("memory sink switched off".into()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

// ─── PostgreSQL ──────────────────────────────────────────────────────

/// Appends to the `audit_events` hash chain.
#[derive(Debug, Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let previous_hash: Option<String> =
            sqlx::query_scalar("SELECT event_hash FROM audit_events ORDER BY created_at DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        let prev = previous_hash.as_deref().unwrap_or(GENESIS_HASH);
        let event_hash = chain_hash(prev, event);

        sqlx::query(
            "INSERT INTO audit_events (id, event_type, actor_id, resource_type, resource_id,
             action, metadata, previous_hash, event_hash, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(Uuid::new_v4())
        .bind("certificate.lifecycle")
        .bind(event.actor.as_str())
        .bind(RESOURCE_TYPE)
        .bind(event.submission_id.0)
        .bind(event.action.as_str())
        .bind(&event.details)
        .bind(prev)
        .bind(&event_hash)
        .bind(event.at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// SHA-256 over the previous hash and the event's identifying fields.
fn chain_hash(prev: &str, event: &AuditEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev.as_bytes());
    hasher.update(event.action.as_str().as_bytes());
    hasher.update(event.actor.as_str().as_bytes());
    hasher.update(RESOURCE_TYPE.as_bytes());
    hasher.update(event.submission_id.to_string().as_bytes());
    hasher.update(event.at.to_rfc3339().as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(action: AuditAction) -> AuditEvent {
        AuditEvent::new(
            action,
            &UserId::new("admin-1").unwrap(),
            SubmissionId::new(),
            serde_json::json!({"reason": "blurry scan"}),
        )
    }

    #[tokio::test]
    async fn memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        emit(&sink, event(AuditAction::CertUpload)).await;
        emit(&sink, event(AuditAction::Reject)).await;
        assert_eq!(sink.actions(), vec![AuditAction::CertUpload, AuditAction::Reject]);
    }

    #[tokio::test]
    async fn failing_sink_is_swallowed() {
        let sink = MemoryAuditSink::new();
        sink.set_failing(true);
        emit(&sink, event(AuditAction::Approve)).await;
        assert!(sink.events().is_empty());
        assert!(sink.record(&event(AuditAction::Approve)).await.is_err());
    }

    #[test]
    fn chain_hash_depends_on_previous() {
        let e = event(AuditAction::Revoke);
        let first = chain_hash(GENESIS_HASH, &e);
        assert_eq!(first.len(), 64);
        assert_ne!(first, chain_hash(&first, &e));
        assert_eq!(first, chain_hash(GENESIS_HASH, &e));
    }

    #[test]
    fn action_names_are_stable() {
        assert_eq!(
            serde_json::to_value(AuditAction::CertUpload).unwrap(),
            serde_json::json!("CERT_UPLOAD")
        );
        assert_eq!(AuditAction::Reupload.to_string(), "REUPLOAD");
    }
}
