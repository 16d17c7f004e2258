//! # certx-cli — Operator CLI for the CertX Engine
//!
//! Provides the `certx` command-line interface for operators who need to
//! inspect certificates without running the full issuance service.
//!
//! ## Subcommands
//!
//! - `certx hash <file>`: content fingerprint of a file.
//! - `certx watermark <in> <out>`: run the transform engine offline.
//! - `certx positions <count> <margin>`: the vertical tiling rule.
//! - `certx verify <hash>`: resolve a published hash against the ledger.
//!
//! ```bash
//! certx hash diploma.pdf
//! certx watermark diploma.pdf stamped.pdf --label "Nguyen Van A" --opacity 0.3
//! certx --config certx.yaml verify 0x3a7bd3e2360a3d29eea436fcfb7e44c735d117c42d1c1835420b6b9942dd4f1b
//! ```
//!
//! Every handler returns a process exit code; errors propagate as
//! [`anyhow::Error`] and are reported by the binary.

pub mod hash;
pub mod positions;
pub mod verify;
pub mod watermark;

use std::path::Path;

use anyhow::{Context, Result};

use certx_issuance::IssuanceConfig;

/// Load the YAML configuration at `path`, or fall back to the environment.
pub fn load_config(path: Option<&Path>) -> Result<IssuanceConfig> {
    match path {
        Some(path) => IssuanceConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => IssuanceConfig::from_env().context("reading configuration from environment"),
    }
}
