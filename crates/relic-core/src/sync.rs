//! Incremental sync controller.
//!
//! Keeps the persisted graph consistent with a moving source tree without
//! full re-extraction. The controller compares the store's last-indexed
//! revision against the current source-tree revision and picks one of:
//! no-op, state-only pointer advance, per-file surgical re-extraction, or
//! an explicit refusal when the delta is too large to churn through
//! file-by-file.
//!
//! This is the highest-stakes component: it must never corrupt persisted
//! state on partial failure. Surgical updates are delete-then-recreate per
//! file (idempotent under retry), and the revision pointer only advances
//! after every changed file has been re-extracted successfully.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use relic_store::{GraphStore, StoreError};

use crate::adapter::SourceLanguage;
use crate::builder::{BuilderError, GraphBuilder};
use crate::vcs::{Vcs, VcsError};

// ============================================================================
// Errors
// ============================================================================

/// Errors that can abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Store read/write failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Current revision could not be determined
    #[error("version control error: {0}")]
    Vcs(#[from] VcsError),

    /// Builder setup failed
    #[error("builder error: {0}")]
    Builder(#[from] BuilderError),

    /// A surgical file update failed; the revision pointer was not advanced
    #[error("surgical update failed for '{file}': {message}")]
    FileUpdate { file: PathBuf, message: String },
}

// ============================================================================
// Outcomes
// ============================================================================

/// What a sync run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Store already at the current revision; nothing done.
    InSync,
    /// Revision pointer advanced; no relevant source changes existed.
    StateAdvanced { revision: String },
    /// Prior revision unknown or unreachable: tracking was reset to the
    /// current revision without diffing. True incremental changes in
    /// between are dropped; callers wanting certainty should force a full
    /// extraction after seeing this.
    BaselineReset { revision: String },
    /// Surgical per-file update completed and the pointer advanced.
    Updated {
        revision: String,
        files: Vec<PathBuf>,
    },
    /// Too many changed files for surgical mode; nothing was touched.
    /// Run a full extraction, or retry with `force`.
    LargeDelta { changed: usize, limit: usize },
}

/// Options for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum changed-file count handled surgically without force.
    pub surgical_limit: usize,
    /// Process the delta file-by-file regardless of its size.
    pub force: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            surgical_limit: relic_config::DEFAULT_SURGICAL_UPDATE_LIMIT,
            force: false,
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Drives incremental synchronization between VCS state and the graph store.
pub struct SyncController<'a, S: GraphStore> {
    store: &'a S,
    vcs: &'a dyn Vcs,
    builder: GraphBuilder,
    root: PathBuf,
    options: SyncOptions,
}

impl<'a, S: GraphStore> SyncController<'a, S> {
    pub fn new(
        root: impl Into<PathBuf>,
        store: &'a S,
        vcs: &'a dyn Vcs,
        builder: GraphBuilder,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            vcs,
            builder,
            root: root.into(),
            options,
        }
    }

    /// Compare revisions and apply the appropriate update strategy.
    pub fn sync(&mut self) -> Result<SyncOutcome, SyncError> {
        let current = self.vcs.current_revision()?;
        let last = self.store.last_indexed_revision()?;

        if last.as_deref() == Some(current.as_str()) {
            info!("graph is up to date at {}", short(&current));
            return Ok(SyncOutcome::InSync);
        }

        let changed = match &last {
            None => None,
            Some(last_rev) => match self.vcs.changed_files(last_rev, &current) {
                Ok(files) => Some(files),
                Err(e) => {
                    warn!(
                        "indexed revision {} is unreachable ({}); resetting baseline",
                        short(last_rev),
                        e
                    );
                    None
                }
            },
        };

        let Some(changed) = changed else {
            // Unknown baseline: advance the pointer without diffing rather
            // than blocking. The outcome flags the reset so callers can
            // elect a full rebuild.
            self.store.set_last_indexed_revision(&current)?;
            return Ok(SyncOutcome::BaselineReset { revision: current });
        };

        let relevant: Vec<PathBuf> = changed
            .into_iter()
            .filter(|f| SourceLanguage::is_supported(f))
            .collect();

        info!(
            "graph behind: indexed {}, current {}, {} relevant changed files",
            last.as_deref().map(short).unwrap_or("unknown"),
            short(&current),
            relevant.len()
        );

        if relevant.is_empty() {
            self.store.set_last_indexed_revision(&current)?;
            return Ok(SyncOutcome::StateAdvanced { revision: current });
        }

        if relevant.len() > self.options.surgical_limit && !self.options.force {
            warn!(
                "large delta ({} files > limit {}); refusing surgical sync - run full extraction",
                relevant.len(),
                self.options.surgical_limit
            );
            return Ok(SyncOutcome::LargeDelta {
                changed: relevant.len(),
                limit: self.options.surgical_limit,
            });
        }

        for file in &relevant {
            self.update_file(file)?;
        }

        // Only now is the new revision safe to claim.
        self.store.set_last_indexed_revision(&current)?;
        info!("graph synced to {}", short(&current));

        Ok(SyncOutcome::Updated {
            revision: current,
            files: relevant,
        })
    }

    /// Surgical update for one file: delete everything previously attributed
    /// to it, then re-extract it through the full builder pipeline.
    ///
    /// Idempotent: running it twice for the same unchanged file produces
    /// the same node/edge set as running it once. A file deleted from disk
    /// is simply removed from the graph.
    pub fn update_file(&mut self, file: &Path) -> Result<(), SyncError> {
        let rel = file
            .strip_prefix(&self.root)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");
        let abs = self.root.join(&rel);

        info!("surgical update for {}", rel);
        self.store.delete_subgraph_for_file(&rel)?;

        if !abs.exists() {
            info!("{} deleted from disk; removed from graph", rel);
            return Ok(());
        }

        let report = self.builder.run(&self.root, &[abs], self.store)?;
        if let Some(failure) = report.failures.first() {
            return Err(SyncError::FileUpdate {
                file: failure.file.clone(),
                message: failure.message.clone(),
            });
        }
        Ok(())
    }
}

fn short(revision: &str) -> &str {
    &revision[..revision.len().min(7)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterSet, SizeLimits};
    use crate::builder::BuilderConfig;
    use relic_store::{EdgeKind, GraphSink, MemoryStore, NodeKind};
    use std::fs;
    use tempfile::TempDir;

    struct FakeVcs {
        current: String,
        changed: Vec<PathBuf>,
        diff_fails: bool,
    }

    impl FakeVcs {
        fn new(current: &str, changed: &[&str]) -> Self {
            Self {
                current: current.to_string(),
                changed: changed.iter().map(PathBuf::from).collect(),
                diff_fails: false,
            }
        }
    }

    impl Vcs for FakeVcs {
        fn current_revision(&self) -> Result<String, VcsError> {
            Ok(self.current.clone())
        }

        fn changed_files(&self, _from: &str, _to: &str) -> Result<Vec<PathBuf>, VcsError> {
            if self.diff_fails {
                return Err(VcsError::Command {
                    command: "diff".to_string(),
                    stderr: "bad revision".to_string(),
                });
            }
            Ok(self.changed.clone())
        }
    }

    fn builder() -> GraphBuilder {
        GraphBuilder::new(AdapterSet::new(SizeLimits::default()), &BuilderConfig::default())
            .unwrap()
    }

    fn controller<'a>(
        root: &Path,
        store: &'a MemoryStore,
        vcs: &'a FakeVcs,
    ) -> SyncController<'a, MemoryStore> {
        SyncController::new(root, store, vcs, builder(), SyncOptions::default())
    }

    #[test]
    fn equal_revisions_are_a_noop() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.set_last_indexed_revision("r1").unwrap();
        let vcs = FakeVcs::new("r1", &["a.cpp"]);

        let outcome = controller(dir.path(), &store, &vcs).sync().unwrap();
        assert_eq!(outcome, SyncOutcome::InSync);
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn irrelevant_changes_advance_pointer_without_mutations() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.set_last_indexed_revision("r1").unwrap();
        let vcs = FakeVcs::new("r2", &["docs/readme.md", "assets/logo.png"]);

        let outcome = controller(dir.path(), &store, &vcs).sync().unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::StateAdvanced {
                revision: "r2".to_string()
            }
        );
        assert_eq!(store.last_indexed_revision().unwrap().as_deref(), Some("r2"));
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn large_delta_refuses_and_leaves_revision_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.set_last_indexed_revision("r1").unwrap();
        let changed: Vec<String> = (0..6).map(|i| format!("src/f{i}.cpp")).collect();
        let changed_refs: Vec<&str> = changed.iter().map(|s| s.as_str()).collect();
        let vcs = FakeVcs::new("r2", &changed_refs);

        let outcome = controller(dir.path(), &store, &vcs).sync().unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::LargeDelta {
                changed: 6,
                limit: 5
            }
        );
        assert_eq!(store.last_indexed_revision().unwrap().as_deref(), Some("r1"));
    }

    #[test]
    fn force_overrides_the_limit() {
        let dir = TempDir::new().unwrap();
        for i in 0..6 {
            fs::write(dir.path().join(format!("f{i}.cpp")), "void f() {}\n").unwrap();
        }
        let store = MemoryStore::new();
        store.set_last_indexed_revision("r1").unwrap();
        let changed: Vec<String> = (0..6).map(|i| format!("f{i}.cpp")).collect();
        let changed_refs: Vec<&str> = changed.iter().map(|s| s.as_str()).collect();
        let vcs = FakeVcs::new("r2", &changed_refs);

        let mut controller = SyncController::new(
            dir.path(),
            &store,
            &vcs,
            builder(),
            SyncOptions {
                surgical_limit: 5,
                force: true,
            },
        );

        let outcome = controller.sync().unwrap();
        assert!(matches!(outcome, SyncOutcome::Updated { .. }));
        assert_eq!(store.last_indexed_revision().unwrap().as_deref(), Some("r2"));
    }

    #[test]
    fn unknown_baseline_resets_tracking() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.set_last_indexed_revision("rewritten").unwrap();
        let mut vcs = FakeVcs::new("r2", &["a.cpp"]);
        vcs.diff_fails = true;

        let outcome = controller(dir.path(), &store, &vcs).sync().unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::BaselineReset {
                revision: "r2".to_string()
            }
        );
        assert_eq!(store.last_indexed_revision().unwrap().as_deref(), Some("r2"));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn surgical_update_replaces_stale_file_content() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("logic.cpp");
        fs::write(&file, "void old_name() {\n}\n").unwrap();

        let store = MemoryStore::new();
        let vcs = FakeVcs::new("r1", &[]);
        let mut ctl = controller(dir.path(), &store, &vcs);
        ctl.update_file(Path::new("logic.cpp")).unwrap();
        assert!(store.find_node("old_name", NodeKind::Function).is_some());

        fs::write(&file, "void new_name() {\n}\n").unwrap();
        ctl.update_file(Path::new("logic.cpp")).unwrap();

        assert!(store.find_node("old_name", NodeKind::Function).is_none());
        assert!(store.find_node("new_name", NodeKind::Function).is_some());
    }

    #[test]
    fn surgical_update_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("logic.cpp");
        fs::write(
            &file,
            "int g_total;\nvoid bump() {\n    g_total = g_total + 1;\n}\n",
        )
        .unwrap();

        let store = MemoryStore::new();
        let vcs = FakeVcs::new("r1", &[]);
        let mut ctl = controller(dir.path(), &store, &vcs);

        ctl.update_file(Path::new("logic.cpp")).unwrap();
        let nodes_once = store.node_count();
        let edges_once = store.edge_count();

        ctl.update_file(Path::new("logic.cpp")).unwrap();
        assert_eq!(store.node_count(), nodes_once);
        assert_eq!(store.edge_count(), edges_once);
    }

    #[test]
    fn deleted_file_is_removed_from_graph() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("gone.cpp");
        fs::write(&file, "void casualty() {\n}\n").unwrap();

        let store = MemoryStore::new();
        let vcs = FakeVcs::new("r1", &[]);
        let mut ctl = controller(dir.path(), &store, &vcs);
        ctl.update_file(Path::new("gone.cpp")).unwrap();
        assert!(store.find_node("casualty", NodeKind::Function).is_some());

        fs::remove_file(&file).unwrap();
        ctl.update_file(Path::new("gone.cpp")).unwrap();
        assert!(store.find_node("casualty", NodeKind::Function).is_none());
    }

    #[test]
    fn surgical_sync_updates_changed_files_and_pointer() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.cpp"), "void alpha() {\n}\n").unwrap();

        let store = MemoryStore::new();
        store.set_last_indexed_revision("r1").unwrap();
        // Stale node from the previous indexing of a.cpp.
        store
            .upsert_node(
                &relic_store::NodeRecord::new(
                    crate::model::node_id(NodeKind::Function, "stale"),
                    "stale",
                    NodeKind::Function,
                )
                .with_file("a.cpp"),
            )
            .unwrap();

        let vcs = FakeVcs::new("r2", &["a.cpp"]);
        let outcome = controller(dir.path(), &store, &vcs).sync().unwrap();

        assert!(matches!(outcome, SyncOutcome::Updated { ref files, .. } if files.len() == 1));
        assert!(store.find_node("stale", NodeKind::Function).is_none());
        assert!(store.find_node("alpha", NodeKind::Function).is_some());
        assert_eq!(store.last_indexed_revision().unwrap().as_deref(), Some("r2"));
        let defined = store.edges_of_kind(EdgeKind::DefinedIn);
        assert_eq!(defined.len(), 1);
    }
}
