//! `relic status` - show indexing state.

use std::path::Path;

use anyhow::{Context, Result};

use relic_config::RelicConfig;
use relic_core::vcs::{GitCli, Vcs};
use relic_store::{GraphStore, JsonlStore};

pub fn run(root: &Path, config: &RelicConfig) -> Result<()> {
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot resolve root {}", root.display()))?;

    let store_dir = super::store_dir(&root, config);
    if !store_dir.exists() {
        println!("No graph found at {}. Run 'relic extract' first.", store_dir.display());
        return Ok(());
    }

    let store = JsonlStore::open_append(&store_dir)?;
    let indexed = store.last_indexed_revision()?;

    match &indexed {
        Some(revision) => println!("Indexed revision:  {revision}"),
        None => println!("Indexed revision:  (none recorded)"),
    }

    match GitCli::new(&root).current_revision() {
        Ok(current) => {
            println!("Current revision:  {current}");
            match indexed {
                Some(indexed) if indexed == current => println!("Status:            in sync"),
                Some(_) => println!("Status:            behind - run 'relic sync'"),
                None => println!("Status:            unknown baseline - run 'relic extract'"),
            }
        }
        Err(e) => println!("Current revision:  unavailable ({e})"),
    }

    Ok(())
}
