//! # certx CLI entry point
//!
//! Parses command-line arguments, initializes logging, and dispatches to
//! the subcommand handlers. Logs go to stderr so command output on stdout
//! stays machine-readable.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use certx_cli::hash::{run_hash, HashArgs};
use certx_cli::load_config;
use certx_cli::positions::{run_positions, PositionsArgs};
use certx_cli::verify::{run_verify, VerifyArgs};
use certx_cli::watermark::{run_watermark, WatermarkArgs};

/// CertX operator CLI.
///
/// Fingerprints files, previews watermarks, and checks published
/// certificates against the ledger.
#[derive(Parser, Debug)]
#[command(name = "certx", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file. Defaults to CERTX_* variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the content fingerprint of a file.
    Hash(HashArgs),

    /// Watermark a PDF or image locally.
    Watermark(WatermarkArgs),

    /// Print the vertical tiling positions.
    Positions(PositionsArgs),

    /// Resolve a published hash against the ledger.
    Verify(VerifyArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Hash(args) => run_hash(args),
        Commands::Positions(args) => run_positions(args),
        Commands::Watermark(args) => load_config(cli.config.as_deref())
            .and_then(|config| run_watermark(args, config.watermark)),
        Commands::Verify(args) => load_config(cli.config.as_deref())
            .and_then(|config| run_verify(args, config.clients.as_ref())),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// `RUST_LOG` wins; otherwise verbosity selects the level. Set
/// `CERTX_LOG_FORMAT=json` for JSON lines.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = std::env::var("CERTX_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_hash() {
        let cli = Cli::try_parse_from(["certx", "hash", "doc.pdf"]).unwrap();
        if let Commands::Hash(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("doc.pdf"));
        } else {
            panic!("expected hash");
        }
    }

    #[test]
    fn cli_parse_watermark_with_options() {
        let cli = Cli::try_parse_from([
            "certx",
            "watermark",
            "in.pdf",
            "out.pdf",
            "--label",
            "Nguyen Van A",
            "--opacity",
            "0.3",
            "--config",
            "certx.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("certx.yaml")));
        if let Commands::Watermark(args) = cli.command {
            assert_eq!(args.input, PathBuf::from("in.pdf"));
            assert_eq!(args.output, PathBuf::from("out.pdf"));
            assert_eq!(args.label.as_deref(), Some("Nguyen Van A"));
            assert_eq!(args.opacity, Some(0.3));
            assert!(!args.json);
        } else {
            panic!("expected watermark");
        }
    }

    #[test]
    fn cli_parse_positions() {
        let cli = Cli::try_parse_from(["certx", "positions", "3", "0.1"]).unwrap();
        if let Commands::Positions(args) = cli.command {
            assert_eq!(args.count, 3);
            assert_eq!(args.margin, 0.1);
        } else {
            panic!("expected positions");
        }
    }

    #[test]
    fn cli_parse_verify_json() {
        let hex = "a".repeat(64);
        let cli = Cli::try_parse_from(["certx", "-v", "verify", &hex, "--json"]).unwrap();
        assert_eq!(cli.verbose, 1);
        if let Commands::Verify(args) = cli.command {
            assert_eq!(args.hash, hex);
            assert!(args.json);
        } else {
            panic!("expected verify");
        }
    }

    #[test]
    fn cli_parse_no_subcommand_errors() {
        assert!(Cli::try_parse_from(["certx"]).is_err());
    }

    #[test]
    fn cli_parse_negative_count_errors() {
        assert!(Cli::try_parse_from(["certx", "positions", "-1", "0.1"]).is_err());
    }
}
