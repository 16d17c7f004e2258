//! # certx-clients — External Collaborator Clients
//!
//! The issuance engine depends on two external systems:
//!
//! - **Ledger**: append-only system of record mapping a published hash to
//!   `{status, uri}`. Status codes: `0` not found, `1` valid, `2` revoked.
//! - **Content store**: content-addressed blob store; uploads return an
//!   `ipfs://{cid}` URI.
//!
//! Each is a trait ([`Ledger`], [`ContentStore`]) with an HTTP
//! implementation ([`HttpLedgerClient`], [`HttpContentStore`]) and an
//! in-memory stub ([`InMemoryLedger`], [`InMemoryContentStore`]) for tests
//! and local runs.
//!
//! ## Failure Mapping
//!
//! | Condition | Error |
//! |-----------|-------|
//! | connect / timeout (after retries) | [`ClientError::Http`] (unavailable) |
//! | 5xx | [`ClientError::Unavailable`] |
//! | 409 | [`ClientError::Conflict`] |
//! | 404 on ledger `get` | `Ok` with status `0` |
//! | other non-2xx | [`ClientError::ApiError`] |
//!
//! Transport errors are retried with exponential backoff
//! (200ms, 400ms, 800ms) before surfacing.

pub mod config;
pub mod content;
pub mod error;
pub mod ledger;
pub mod memory;
pub(crate) mod retry;

pub use config::{ClientConfig, ConfigError};
pub use content::{ContentStore, HttpContentStore};
pub use error::ClientError;
pub use ledger::{HttpLedgerClient, Ledger, LedgerRecord, LedgerStatus};
pub use memory::{InMemoryContentStore, InMemoryLedger};
