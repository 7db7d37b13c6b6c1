//! `relic sync` - incremental synchronization with the current revision.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use relic_config::RelicConfig;
use relic_core::sync::{SyncController, SyncOptions, SyncOutcome};
use relic_core::vcs::GitCli;
use relic_store::{JsonlStore, RetryingStore};

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Update file-by-file regardless of how many files changed
    #[arg(long, short = 'f')]
    pub force: bool,
}

pub fn run(args: &SyncArgs, root: &Path, config: &RelicConfig) -> Result<()> {
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot resolve root {}", root.display()))?;

    let store_dir = super::store_dir(&root, config);
    let store = RetryingStore::new(JsonlStore::open_append(&store_dir)?);
    let vcs = GitCli::new(&root);
    let builder = super::make_builder(config)?;

    let options = SyncOptions {
        surgical_limit: config.surgical_update_limit,
        force: args.force,
    };

    let mut controller = SyncController::new(&root, &store, &vcs, builder, options);
    let outcome = controller.sync()?;
    store.inner().flush()?;

    match outcome {
        SyncOutcome::InSync => println!("Graph is up to date."),
        SyncOutcome::StateAdvanced { revision } => {
            println!("No relevant source changes; revision advanced to {revision}.")
        }
        SyncOutcome::BaselineReset { revision } => {
            println!("Previous revision unknown; tracking reset to {revision}.");
            println!("Run 'relic extract' if the graph may be stale.");
        }
        SyncOutcome::Updated { revision, files } => {
            println!("Updated {} files; graph now at {revision}.", files.len())
        }
        SyncOutcome::LargeDelta { changed, limit } => {
            println!("Large delta: {changed} changed files exceed the limit of {limit}.");
            println!("Run 'relic extract' for a full rebuild, or retry with --force.");
        }
    }

    Ok(())
}
