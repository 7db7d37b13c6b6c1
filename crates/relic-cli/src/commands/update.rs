//! `relic update` - surgical re-extraction of a single file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use relic_config::RelicConfig;
use relic_core::sync::{SyncController, SyncOptions};
use relic_core::vcs::GitCli;
use relic_store::{JsonlStore, RetryingStore};

/// Arguments for the update command
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// File to re-extract, absolute or relative to the root
    pub file: PathBuf,
}

pub fn run(args: &UpdateArgs, root: &Path, config: &RelicConfig) -> Result<()> {
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot resolve root {}", root.display()))?;

    let store_dir = super::store_dir(&root, config);
    let store = RetryingStore::new(JsonlStore::open_append(&store_dir)?);
    let vcs = GitCli::new(&root);
    let builder = super::make_builder(config)?;

    let mut controller = SyncController::new(
        &root,
        &store,
        &vcs,
        builder,
        SyncOptions {
            surgical_limit: config.surgical_update_limit,
            force: false,
        },
    );

    controller.update_file(&args.file)?;
    store.inner().flush()?;

    println!("Re-extracted {}", args.file.display());
    Ok(())
}
