//! # Hash Subcommand
//!
//! Prints the content fingerprint of a file, the same value the engine
//! records as an original or published hash.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use certx_core::{content_hash, ContentHash};

/// Arguments for `certx hash`.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// File to fingerprint.
    pub file: PathBuf,
}

/// Fingerprint the file at `path`.
pub fn hash_file(path: &Path) -> Result<ContentHash> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(content_hash(&bytes))
}

/// Execute `certx hash`.
pub fn run_hash(args: &HashArgs) -> Result<u8> {
    let hash = hash_file(&args.file)?;
    tracing::debug!(file = %args.file.display(), %hash, "hashed file");
    println!("{hash}");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_library_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.bin");
        std::fs::write(&path, b"certificate").unwrap();
        assert_eq!(hash_file(&path).unwrap(), content_hash(b"certificate"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = hash_file(Path::new("/nonexistent/certx/doc.pdf")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/certx/doc.pdf"));
    }
}
