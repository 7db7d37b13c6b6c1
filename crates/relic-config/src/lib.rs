//! Relic Config - layered configuration for the extraction pipeline
//!
//! Configuration is merged from three sources, later ones winning:
//!
//! 1. Global config: `~/.relic/config.toml`
//! 2. Local config: `<workspace>/.relic/config.toml`
//! 3. CLI overrides
//!
//! All keys are optional in the files; defaults are compiled in.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default hard cap before truncation (1 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 1024 * 1024;

/// Default chunking threshold for the C-family adapter.
pub const DEFAULT_CHUNK_THRESHOLD_BYTES: usize = 30_000;

/// Default upper bound on changed files for a surgical sync.
pub const DEFAULT_SURGICAL_UPDATE_LIMIT: usize = 5;

/// Resolved configuration for an extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelicConfig {
    /// Directory the JSONL store writes into, relative to the workspace.
    pub output_dir: PathBuf,

    /// Hard size cap; larger sources are truncated before parsing.
    pub max_file_bytes: usize,

    /// C-family sources above this size are split into chunks.
    pub chunk_threshold_bytes: usize,

    /// Maximum changed-file count handled by surgical sync without --force.
    pub surgical_update_limit: usize,

    /// Regex patterns marking call targets as platform API entry points.
    pub platform_api_patterns: Vec<String>,

    /// Directory names excluded from file discovery.
    pub exclude_dirs: Vec<String>,
}

impl Default for RelicConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(".relic/graph"),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            chunk_threshold_bytes: DEFAULT_CHUNK_THRESHOLD_BYTES,
            surgical_update_limit: DEFAULT_SURGICAL_UPDATE_LIMIT,
            platform_api_patterns: vec!["^Afx".to_string(), "^MessageBox$".to_string()],
            exclude_dirs: vec![
                "node_modules".to_string(),
                "target".to_string(),
                "bin".to_string(),
                "obj".to_string(),
                "build".to_string(),
                "dist".to_string(),
                "packages".to_string(),
                "vendor".to_string(),
                ".git".to_string(),
            ],
        }
    }
}

impl RelicConfig {
    /// Apply CLI overrides on top of the resolved configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref dir) = overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(limit) = overrides.surgical_update_limit {
            self.surgical_update_limit = limit;
        }
    }
}

/// Partial configuration as read from a TOML file.
///
/// Every key optional, so a local file only has to state what it changes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialConfig {
    pub output_dir: Option<PathBuf>,
    pub max_file_bytes: Option<usize>,
    pub chunk_threshold_bytes: Option<usize>,
    pub surgical_update_limit: Option<usize>,
    pub platform_api_patterns: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
}

impl PartialConfig {
    /// Merge this partial layer into a resolved configuration.
    pub fn merge_into(&self, config: &mut RelicConfig) {
        if let Some(ref v) = self.output_dir {
            config.output_dir = v.clone();
        }
        if let Some(v) = self.max_file_bytes {
            config.max_file_bytes = v;
        }
        if let Some(v) = self.chunk_threshold_bytes {
            config.chunk_threshold_bytes = v;
        }
        if let Some(v) = self.surgical_update_limit {
            config.surgical_update_limit = v;
        }
        if let Some(ref v) = self.platform_api_patterns {
            config.platform_api_patterns = v.clone();
        }
        if let Some(ref v) = self.exclude_dirs {
            config.exclude_dirs = v.clone();
        }
    }
}

/// Overrides supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_dir: Option<PathBuf>,
    pub surgical_update_limit: Option<usize>,
}
