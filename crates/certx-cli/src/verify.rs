//! # Verify Subcommand
//!
//! Resolves a published hash against the configured ledger. The CLI has no
//! submission store, so resolution is ledger-only and expiry information is
//! not available.
//!
//! Exit codes: `0` when the certificate is VALID, `2` for any other status,
//! `1` on error.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;

use certx_clients::{ClientConfig, HttpLedgerClient, Ledger};
use certx_core::ContentHash;
use certx_issuance::{Verification, VerificationResolver, VerificationStatus};

/// Arguments for `certx verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Published hash, `0x`-prefixed or bare hex.
    pub hash: String,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Resolve `hash` through `ledger` alone.
pub async fn resolve_hash(ledger: Arc<dyn Ledger>, hash: &str) -> Result<Verification> {
    let hash = ContentHash::parse(hash)?;
    let verification = VerificationResolver::ledger_only(ledger)
        .verify(&hash, Utc::now())
        .await
        .context("querying the ledger")?;
    tracing::debug!(published_hash = %hash, status = %verification.status, "verification resolved");
    Ok(verification)
}

/// Execute `certx verify`.
pub fn run_verify(args: &VerifyArgs, clients: Option<&ClientConfig>) -> Result<u8> {
    let Some(clients) = clients else {
        bail!("no ledger configured: set CERTX_API_TOKEN and the CERTX_* URLs, or add a clients section to --config");
    };
    let ledger: Arc<dyn Ledger> =
        Arc::new(HttpLedgerClient::new(clients).context("building ledger client")?);

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let verification = runtime.block_on(resolve_hash(ledger, &args.hash))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&verification)?);
    } else {
        println!("status:      {}", verification.status);
        if let Some(uri) = &verification.content_uri {
            println!("content URI: {uri}");
        }
    }
    Ok(exit_code(verification.status))
}

/// Process exit code for a resolved status.
pub fn exit_code(status: VerificationStatus) -> u8 {
    match status {
        VerificationStatus::Valid => 0,
        _ => 2,
    }
}
