//! # Positions Subcommand
//!
//! Prints the vertical tiling positions for a repeat count and margin, one
//! fraction of the page height per line.

use anyhow::{bail, Result};
use clap::Args;

/// Arguments for `certx positions`.
#[derive(Args, Debug)]
pub struct PositionsArgs {
    /// Number of label repeats.
    pub count: u32,

    /// Top and bottom margin ratio; clamped to [0, 0.45].
    pub margin: f64,
}

/// Format the positions for `count` and `margin`.
pub fn render_positions(count: u32, margin: f64) -> Result<Vec<String>> {
    if !margin.is_finite() {
        bail!("margin must be a finite number, got {margin}");
    }
    Ok(certx_watermark::positions(count, margin)
        .into_iter()
        .map(|p| format!("{p:.6}"))
        .collect())
}

/// Execute `certx positions`.
pub fn run_positions(args: &PositionsArgs) -> Result<u8> {
    for line in render_positions(args.count, args.margin)? {
        println!("{line}");
    }
    Ok(0)
}
