//! `relic extract` - full extraction over the source tree.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use relic_config::RelicConfig;
use relic_core::discovery;
use relic_core::vcs::{GitCli, Vcs};
use relic_store::{GraphStore, JsonlStore, RetryingStore};

use crate::progress;

/// Arguments for the extract command
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Limit extraction to the first N discovered files
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Skip recording the current VCS revision after extraction
    #[arg(long)]
    pub no_revision: bool,
}

pub fn run(args: &ExtractArgs, root: &Path, config: &RelicConfig) -> Result<()> {
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot resolve root {}", root.display()))?;

    let mut files = discovery::collect_files(&root, &config.exclude_dirs)?;
    if let Some(max) = args.max_files {
        files.truncate(max);
    }
    info!("found {} extraction-relevant files", files.len());

    let store_dir = super::store_dir(&root, config);
    let store = RetryingStore::new(JsonlStore::create(&store_dir)?);

    let bar = progress::extraction_bar(files.len() as u64 * 2);
    let bar_handle = bar.clone();
    let mut builder = super::make_builder(config)?.with_progress(Box::new(move |done, _total| {
        bar_handle.set_position(done as u64);
    }));

    let report = builder.run(&root, &files, &store)?;
    bar.finish_and_clear();
    store.inner().flush()?;

    // Record the revision so incremental sync has a baseline.
    if !args.no_revision {
        match GitCli::new(&root).current_revision() {
            Ok(revision) => {
                store.set_last_indexed_revision(&revision)?;
                info!("recorded indexed revision {}", &revision[..revision.len().min(7)]);
            }
            Err(e) => warn!("not recording a revision ({e}); sync will need a baseline"),
        }
    }

    println!(
        "Extracted {} of {} files: {} nodes, {} edges ({} globals)",
        report.files_processed,
        report.files_seen,
        report.nodes_emitted,
        report.edges_emitted,
        report.globals_found
    );

    if !report.failures.is_empty() {
        println!("{} files failed:", report.failures.len());
        for failure in &report.failures {
            println!(
                "  {} [{}]: {}",
                failure.file.display(),
                failure.phase,
                failure.message
            );
        }
    }

    println!("Graph written to {}", store_dir.display());
    Ok(())
}
