//! Structured run outcomes.
//!
//! Batch runs over thousands of files must finish and report rather than
//! abort on first error, so every per-file failure is captured as data:
//! which file, which phase, what happened.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Extraction phase a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Pass 1: definition scanning
    Definitions,
    /// Pass 2: reference scanning
    References,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Definitions => write!(f, "definitions"),
            Phase::References => write!(f, "references"),
        }
    }
}

/// One file's failure in one phase.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    /// File being processed
    pub file: PathBuf,
    /// Phase that failed
    pub phase: Phase,
    /// Human-readable cause
    pub message: String,
}

impl FileFailure {
    pub fn new(file: &Path, phase: Phase, message: impl Into<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            phase,
            message: message.into(),
        }
    }
}

/// Summary of a full or single-file extraction run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    /// Files offered to the builder
    pub files_seen: usize,
    /// Files a language adapter actually processed
    pub files_processed: usize,
    /// Distinct global names found in Pass 1
    pub globals_found: usize,
    /// Node records emitted (pre-merge)
    pub nodes_emitted: usize,
    /// Edge records emitted (pre-merge)
    pub edges_emitted: usize,
    /// Per-file failures; empty on a clean run
    pub failures: Vec<FileFailure>,
}

impl ExtractionReport {
    /// Whether every offered file was either processed or skipped cleanly.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_serialize_with_phase_names() {
        let failure = FileFailure::new(Path::new("src/a.cpp"), Phase::References, "store down");
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"References\""));
        assert!(json.contains("store down"));
    }
}
