//! CLI subcommands.

pub mod extract;
pub mod status;
pub mod sync;
pub mod update;

use std::path::Path;

use relic_core::adapter::{AdapterSet, SizeLimits};
use relic_core::builder::{BuilderConfig, GraphBuilder};
use relic_config::RelicConfig;

/// Builder wired up from the resolved configuration.
pub(crate) fn make_builder(config: &RelicConfig) -> anyhow::Result<GraphBuilder> {
    let limits = SizeLimits {
        max_file_bytes: config.max_file_bytes,
        chunk_threshold_bytes: config.chunk_threshold_bytes,
    };
    let builder_config = BuilderConfig {
        platform_api_patterns: config.platform_api_patterns.clone(),
    };
    Ok(GraphBuilder::new(AdapterSet::new(limits), &builder_config)?)
}

/// The store location for a workspace root.
pub(crate) fn store_dir(root: &Path, config: &RelicConfig) -> std::path::PathBuf {
    if config.output_dir.is_absolute() {
        config.output_dir.clone()
    } else {
        root.join(&config.output_dir)
    }
}
