//! # Watermark Subcommand
//!
//! Runs the transform engine on a local file and writes the result, without
//! touching the ledger or the content store. Useful for previewing what an
//! approval would publish.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use certx_core::{content_hash, ContentHash};
use certx_watermark::{WatermarkConfig, WatermarkEngine};

/// Arguments for `certx watermark`.
#[derive(Args, Debug)]
pub struct WatermarkArgs {
    /// Input PDF or image.
    pub input: PathBuf,

    /// Where to write the watermarked file.
    pub output: PathBuf,

    /// Label to draw. Defaults to the configured text.
    #[arg(long)]
    pub label: Option<String>,

    /// Label opacity in [0, 1]. Defaults to the configured opacity.
    #[arg(long)]
    pub opacity: Option<f32>,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// What one offline transform produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkSummary {
    pub format: String,
    pub label_used: String,
    pub opacity: f32,
    pub used_fallback_glyphs: bool,
    pub watermarked: bool,
    pub positions: Vec<f64>,
    pub original_hash: ContentHash,
    pub published_hash: ContentHash,
}

/// Transform `input` into `output` with the given watermark settings.
pub fn watermark_file(
    input: &Path,
    output: &Path,
    label: Option<&str>,
    opacity: Option<f32>,
    config: WatermarkConfig,
) -> Result<WatermarkSummary> {
    let opacity = opacity.unwrap_or(config.opacity);
    if !(0.0..=1.0).contains(&opacity) {
        bail!("opacity must be within [0, 1], got {opacity}");
    }
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;

    let engine = WatermarkEngine::new(config);
    let result = engine
        .transform(&bytes, label.unwrap_or_default(), opacity)
        .with_context(|| format!("watermarking {}", input.display()))?;

    std::fs::write(output, &result.bytes)
        .with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        format = result.format.as_str(),
        watermarked = result.watermarked,
        "watermark written"
    );

    Ok(WatermarkSummary {
        format: result.format.as_str().to_string(),
        published_hash: content_hash(&result.bytes),
        original_hash: content_hash(&bytes),
        label_used: result.label_used,
        opacity,
        used_fallback_glyphs: result.used_fallback_glyphs,
        watermarked: result.watermarked,
        positions: result.positions,
    })
}

/// Execute `certx watermark`.
pub fn run_watermark(args: &WatermarkArgs, config: WatermarkConfig) -> Result<u8> {
    let summary = watermark_file(
        &args.input,
        &args.output,
        args.label.as_deref(),
        args.opacity,
        config,
    )?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(0);
    }
    println!("format:          {}", summary.format);
    println!("label:           {}", summary.label_used);
    println!("opacity:         {}", summary.opacity);
    println!("fallback glyphs: {}", summary.used_fallback_glyphs);
    println!("watermarked:     {}", summary.watermarked);
    println!("original hash:   {}", summary.original_hash);
    println!("published hash:  {}", summary.published_hash);
    Ok(0)
}
