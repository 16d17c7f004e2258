//! # Error Types
//!
//! Leaf-level errors shared by every crate. Higher layers fold these into
//! their own error enums with `#[from]`.

use thiserror::Error;

/// A content fingerprint could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentHashError {
    /// The input is not 64 hex characters (with or without `0x`).
    #[error("content hash must be 64 hex characters, optionally prefixed with 0x; got {0:?}")]
    Malformed(String),
}

/// Input failed a domain validation rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent or blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field was present but its value is not acceptable.
    #[error("invalid value for {field}: {reason}")]
    InvalidField {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A fingerprint could not be parsed.
    #[error(transparent)]
    Hash(#[from] ContentHashError),
}
