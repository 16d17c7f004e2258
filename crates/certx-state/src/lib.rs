//! # certx-state — Submission Lifecycle State Machine
//!
//! Pure state transitions for one certificate submission. Nothing in this
//! crate performs I/O: the orchestrator in `certx-issuance` runs the
//! watermark, ledger and content-store side effects, then hands the results
//! to these transitions and commits the record through a conditional write.
//!
//! ## States
//!
//! ```text
//!            ┌──▶ Valid ──▶ Revoked (terminal)
//! Pending ───┤
//!            └──▶ Rejected (terminal; may spawn one new Pending via reupload)
//!
//! direct issue ──▶ Valid
//! ```
//!
//! The lifecycle data is a tagged variant ([`SubmissionStage`]): raw upload
//! bytes live only inside `Pending` (and inside a `Rejected` stage that still
//! allows reupload), so a published record cannot carry them.
//!
//! Expiry is never stored. A `Valid` record whose expiration date has passed
//! is reported `Expired` by [`Submission::status_at`].

pub mod status;
pub mod submission;

pub use status::{DerivedStatus, SubmissionView};
pub use submission::{
    Approval, Publication, RawContent, Rejection, ReuploadLink, Revocation, Submission,
    SubmissionStage, SubmissionState, TransitionError, TransitionRecord, WatermarkParams,
    WatermarkReport,
};
