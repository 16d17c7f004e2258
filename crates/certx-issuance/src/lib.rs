//! # certx-issuance — Issuance Orchestration
//!
//! Wires the pure lifecycle of `certx-state` to the outside world:
//!
//! - **Store** ([`store`]): the persistence gateway. Every transition is
//!   committed with one conditional write.
//! - **Guard** ([`guard`]): duplicate and ownership rules on the original
//!   and published fingerprints.
//! - **Resolver** ([`resolver`]): store-first verification of a published
//!   hash, falling back to the ledger.
//! - **Audit** ([`audit`]): fire-and-forget event trail.
//! - **Service** ([`service`]): [`IssuanceService`], the only entry point
//!   callers need.
//!
//! ## Error Model
//!
//! All operations return [`IssuanceError`]. Branch on
//! [`IssuanceError::kind`]; show [`IssuanceError::user_message`] to end
//! users. Only `UpstreamUnavailable` is retryable. A ledger conflict on
//! issue is reported as `Duplicate`.
//!
//! ## Metrics
//!
//! Counters are emitted through the `metrics` facade; installing a
//! recorder is up to the embedding application.

pub mod audit;
pub mod config;
pub mod error;
pub mod guard;
pub mod params;
pub mod resolver;
pub mod service;
pub mod store;

#[cfg(test)]
mod test_metrics;

pub use audit::{AuditAction, AuditEvent, AuditSink, MemoryAuditSink, PgAuditSink, TracingAuditSink};
pub use config::{IssuanceConfig, IssuanceConfigError};
pub use error::{ErrorKind, IssuanceError};
pub use guard::DuplicateGuard;
pub use params::ApprovalParams;
pub use resolver::{Verification, VerificationResolver, VerificationSource, VerificationStatus};
pub use service::{IssuanceService, PublicationReceipt};
pub use store::{
    MemorySubmissionStore, PgSubmissionStore, StoreError, SubmissionFilter, SubmissionStore,
};
