//! # certx-core — Foundational Types for the CertX Issuance Engine
//!
//! This crate is the leaf of the workspace dependency graph. It defines the
//! primitives every other crate agrees on:
//!
//! 1. **`ContentHash`**: the fingerprint of a document. A certificate is
//!    hashed exactly twice in its lifetime: once on raw upload (the
//!    *original* hash) and once after watermarking (the *published* hash).
//!    Both flow through [`content_hash()`].
//!
//! 2. **Identifier newtypes.** `SubmissionId` and `UserId` cannot be
//!    confused with each other or with bare strings.
//!
//! 3. **Credential catalogue.** `CredentialType` and `ValidityOption` decide
//!    whether and when an issued certificate expires.
//!
//! 4. **Date rules.** Expiration is compared against the last millisecond of
//!    the expiration date, in UTC.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `certx-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod credential;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use credential::{CertificateAttributes, CredentialType, ValidityOption};
pub use digest::{content_hash, ContentHash};
pub use error::{ContentHashError, ValidationError};
pub use identity::{Actor, ActorRole, SubmissionId, UserId};
pub use temporal::{end_of_day, is_expired_at};
