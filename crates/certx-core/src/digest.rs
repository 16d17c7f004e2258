//! # Content Fingerprints
//!
//! `ContentHash` is the identity of a document. It is computed twice per
//! certificate: on the raw upload and on the watermarked output. The two
//! values differ only because the watermark transform changes bytes; no
//! code may assume they differ for any other reason.
//!
//! ## Format
//!
//! SHA-256 rendered as `0x` followed by 64 lowercase hex characters. This is
//! the `bytes32` convention the ledger records, so the same string is used
//! in the store, on the ledger, and in verification links.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ContentHashError;

const HEX_LEN: usize = 64;

/// A SHA-256 content fingerprint in `0x`-prefixed lowercase hex.
///
/// Construct with [`content_hash()`] from bytes, or [`ContentHash::parse()`]
/// from user input. The inner string is always normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Parse a fingerprint from text.
    ///
    /// Accepts `0x`/`0X`-prefixed or bare 64-character hex in either case
    /// and normalizes to the lowercase `0x` form.
    pub fn parse(input: &str) -> Result<Self, ContentHashError> {
        let trimmed = input.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if hex.len() != HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ContentHashError::Malformed(input.to_string()));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// The normalized `0x…` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 64 hex characters without the `0x` prefix.
    pub fn hex(&self) -> &str {
        &self.0[2..]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ContentHashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

impl std::str::FromStr for ContentHash {
    type Err = ContentHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Fingerprint raw bytes.
///
/// Deterministic and total: every byte slice, including the empty one, has
/// a fingerprint.
pub fn content_hash(bytes: &[u8]) -> ContentHash {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    ContentHash(format!("0x{hex}"))
}
