//! Source file discovery.
//!
//! Walks a root directory collecting every file some adapter supports,
//! honoring gitignore rules and skipping build/output/dependency
//! directories. The result is sorted so runs are deterministic.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use thiserror::Error;
use tracing::debug;

use crate::adapter::SourceLanguage;

/// Errors during file discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("root path does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("walk error: {0}")]
    Walk(#[from] ignore::Error),
}

/// Collect extraction-relevant files under `root`.
///
/// `exclude_dirs` are directory names (not globs) pruned from the walk in
/// addition to gitignore rules.
pub fn collect_files(root: &Path, exclude_dirs: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::RootNotFound(root.to_path_buf()));
    }

    let excluded: Vec<String> = exclude_dirs.to_vec();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .filter_entry(move |entry| {
            let name = entry.file_name().to_string_lossy();
            // Prune excluded directories; plain files pass through to the
            // extension filter below.
            !(entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && excluded.iter().any(|ex| ex.as_str() == name))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.into_path();
        if SourceLanguage::is_supported(&path) {
            files.push(path);
        }
    }

    files.sort();
    debug!("discovered {} extraction-relevant files", files.len());
    Ok(files)
}
