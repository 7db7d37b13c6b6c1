//! Two-pass graph builder.
//!
//! Pass 1 scans every file for definitions, emitting File and symbol nodes
//! with DEFINED_IN and INHERITS_FROM edges and accumulating the
//! known-globals (and known-triggers) name sets. Pass 2 re-parses and scans
//! references against the completed sets, emitting CALLS, USES_GLOBAL,
//! WRITES_GLOBAL, and WATCHES edges.
//!
//! Within each pass, per-file work runs on the rayon pool; the store sink
//! is the only synchronization point. Node ids are derived eagerly from
//! `(kind, name)`, so workers never coordinate through a shared table and
//! emission stays memory-bounded on arbitrarily large file sets.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use relic_store::{EdgeKind, EdgeRecord, GraphSink, NodeKind, NodeRecord};

use crate::adapter::{AdapterError, AdapterSet};
use crate::model::{node_id, DefKind, RefKind};
use crate::report::{ExtractionReport, FileFailure, Phase};

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while setting a build up.
///
/// Per-file failures never surface here; they are collected in the
/// [`ExtractionReport`] so one bad file cannot abort a batch.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Adapter initialization failed
    #[error("adapter setup failed: {0}")]
    Adapter(#[from] AdapterError),

    /// A configured platform-API pattern is not a valid regex
    #[error("invalid platform API pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

// ============================================================================
// Builder Configuration
// ============================================================================

/// Configuration for the graph builder.
#[derive(Debug, Clone, Default)]
pub struct BuilderConfig {
    /// Regex patterns marking call targets as platform API entry points.
    pub platform_api_patterns: Vec<String>,
}

/// Progress callback: (completed work units, total work units).
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

// ============================================================================
// Graph Builder
// ============================================================================

/// Builds the code relationship graph from a file set.
pub struct GraphBuilder {
    adapters: AdapterSet,
    platform_patterns: Vec<Regex>,
    progress: Option<ProgressFn>,
}

impl GraphBuilder {
    /// Create a builder over an adapter family.
    pub fn new(adapters: AdapterSet, config: &BuilderConfig) -> Result<Self, BuilderError> {
        let platform_patterns = config
            .platform_api_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| BuilderError::Pattern {
                    pattern: p.clone(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            adapters,
            platform_patterns,
            progress: None,
        })
    }

    /// Install a progress callback invoked after every per-file unit of
    /// work (a file is one unit per pass).
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run both extraction passes over `files`, emitting to `sink`.
    ///
    /// `root` anchors the relative paths stored on File nodes. Unsupported
    /// files are skipped silently; any other per-file failure is recorded
    /// in the report and processing continues.
    pub fn run(
        &mut self,
        root: &Path,
        files: &[PathBuf],
        sink: &dyn GraphSink,
    ) -> Result<ExtractionReport, BuilderError> {
        self.adapters.init_all()?;

        info!("starting graph build for {} files", files.len());

        let total_units = files.len() * 2;
        let completed = AtomicUsize::new(0);
        let nodes_emitted = AtomicUsize::new(0);
        let edges_emitted = AtomicUsize::new(0);

        // --- Pass 1: definitions ---
        let pass1: Vec<_> = files
            .par_iter()
            .map(|file| {
                let result = self.scan_file_definitions(
                    root,
                    file,
                    sink,
                    &nodes_emitted,
                    &edges_emitted,
                );
                self.tick(&completed, total_units);
                (file.clone(), result)
            })
            .collect();

        let mut known_globals: HashSet<String> = HashSet::new();
        let mut known_triggers: HashSet<String> = HashSet::new();
        let mut failures: Vec<FileFailure> = Vec::new();
        let mut files_processed = 0usize;

        for (file, result) in pass1 {
            match result {
                Ok(Some(outcome)) => {
                    files_processed += 1;
                    known_globals.extend(outcome.globals);
                    known_triggers.extend(outcome.triggers);
                }
                Ok(None) => {} // unsupported extension, skipped
                Err(failure) => {
                    warn!("pass 1 failed for {}: {}", file.display(), failure.message);
                    failures.push(failure);
                }
            }
        }

        info!(
            "pass 1 complete: {} files, {} globals",
            files_processed,
            known_globals.len()
        );

        // --- Pass 2: references ---
        // The globals set is complete and read-only from here on.
        let pass2: Vec<_> = files
            .par_iter()
            .map(|file| {
                let result = self.scan_file_references(
                    root,
                    file,
                    sink,
                    &known_globals,
                    &known_triggers,
                    &nodes_emitted,
                    &edges_emitted,
                );
                self.tick(&completed, total_units);
                (file.clone(), result)
            })
            .collect();

        for (file, result) in pass2 {
            if let Err(failure) = result {
                warn!("pass 2 failed for {}: {}", file.display(), failure.message);
                failures.push(failure);
            }
        }

        let report = ExtractionReport {
            files_seen: files.len(),
            files_processed,
            globals_found: known_globals.len(),
            nodes_emitted: nodes_emitted.load(Ordering::Relaxed),
            edges_emitted: edges_emitted.load(Ordering::Relaxed),
            failures,
        };

        info!(
            "graph build complete: {} nodes, {} edges, {} failures",
            report.nodes_emitted,
            report.edges_emitted,
            report.failures.len()
        );

        Ok(report)
    }

    fn tick(&self, completed: &AtomicUsize, total: usize) {
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(progress) = &self.progress {
            progress(done, total);
        }
    }

    fn relative_path(root: &Path, file: &Path) -> String {
        file.strip_prefix(root)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Pass 1 for one file. `Ok(None)` means no adapter claims the file.
    fn scan_file_definitions(
        &self,
        root: &Path,
        file: &Path,
        sink: &dyn GraphSink,
        nodes: &AtomicUsize,
        edges: &AtomicUsize,
    ) -> Result<Option<DefinitionsOutcome>, FileFailure> {
        let Some(adapter) = self.adapters.adapter_for_path(file) else {
            return Ok(None);
        };

        let source = read_file(file, Phase::Definitions)?;
        let parsed = adapter.parse(&source, Some(file));
        let definitions = adapter.scan_definitions(&parsed);

        let rel_path = Self::relative_path(root, file);
        let emit = Emitter {
            sink,
            file: file.to_path_buf(),
            phase: Phase::Definitions,
            nodes,
            edges,
        };

        let file_id = node_id(NodeKind::File, &rel_path);
        emit.node(
            NodeRecord::new(&file_id, &rel_path, NodeKind::File).with_file(&rel_path),
        )?;

        let mut outcome = DefinitionsOutcome::default();

        for def in &definitions {
            let kind = def.kind.node_kind();
            let id = node_id(kind, &def.name);

            let mut record = NodeRecord::new(&id, &def.name, kind)
                .with_file(&rel_path)
                .with_lines(def.line, def.end_line);
            record.complexity = def.complexity;
            if !def.bases.is_empty() {
                record.base_types = Some(def.bases.clone());
            }
            emit.node(record)?;
            emit.edge(EdgeRecord::new(&id, &file_id, EdgeKind::DefinedIn))?;

            match def.kind {
                DefKind::Global => {
                    outcome.globals.insert(def.name.clone());
                }
                DefKind::Trigger => {
                    outcome.triggers.insert(def.name.clone());
                }
                _ => {}
            }

            // Inheritance edges are emitted immediately; the base may be a
            // forward reference that no file ever defines.
            for base in &def.bases {
                let base_id = node_id(NodeKind::Class, base);
                emit.node(NodeRecord::new(&base_id, base, NodeKind::Class))?;
                emit.edge(EdgeRecord::new(&id, &base_id, EdgeKind::InheritsFrom))?;
            }
        }

        debug!(
            "pass 1: {} definitions in {}",
            definitions.len(),
            rel_path
        );
        Ok(Some(outcome))
    }

    /// Pass 2 for one file.
    fn scan_file_references(
        &self,
        root: &Path,
        file: &Path,
        sink: &dyn GraphSink,
        known_globals: &HashSet<String>,
        known_triggers: &HashSet<String>,
        nodes: &AtomicUsize,
        edges: &AtomicUsize,
    ) -> Result<(), FileFailure> {
        let Some(adapter) = self.adapters.adapter_for_path(file) else {
            return Ok(());
        };

        let source = read_file(file, Phase::References)?;
        let parsed = adapter.parse(&source, Some(file));
        let references = adapter.scan_references(&parsed, known_globals);

        let rel_path = Self::relative_path(root, file);
        let emit = Emitter {
            sink,
            file: file.to_path_buf(),
            phase: Phase::References,
            nodes,
            edges,
        };

        for reference in &references {
            // Trigger-sourced references resolve to the Trigger node from
            // Pass 1; everything else originates from a Function.
            let source_kind = if known_triggers.contains(&reference.source) {
                NodeKind::Trigger
            } else {
                NodeKind::Function
            };
            let source_id = node_id(source_kind, &reference.source);

            match reference.kind {
                RefKind::Call => {
                    let target_id = node_id(NodeKind::Function, &reference.target);
                    emit.node(NodeRecord::new(
                        &target_id,
                        &reference.target,
                        NodeKind::Function,
                    ))?;
                    emit.edge(EdgeRecord::new(&source_id, &target_id, EdgeKind::Calls))?;

                    if self.is_platform_api(&reference.target) {
                        // Pure annotation for downstream contamination
                        // analysis; connectivity is carried by CALLS above.
                        let api_id = node_id(NodeKind::PlatformApi, &reference.target);
                        emit.node(NodeRecord::new(
                            &api_id,
                            &reference.target,
                            NodeKind::PlatformApi,
                        ))?;
                        emit.edge(EdgeRecord::new(
                            &source_id,
                            &api_id,
                            EdgeKind::CallsPlatformApi,
                        ))?;
                    }
                }
                RefKind::Usage => {
                    let target_id = node_id(NodeKind::Global, &reference.target);
                    emit.node(NodeRecord::new(
                        &target_id,
                        &reference.target,
                        NodeKind::Global,
                    ))?;
                    emit.edge(EdgeRecord::new(
                        &source_id,
                        &target_id,
                        EdgeKind::UsesGlobal,
                    ))?;
                }
                RefKind::ImplicitWrite => {
                    let target_id = node_id(NodeKind::Global, &reference.target);
                    let mut record =
                        NodeRecord::new(&target_id, &reference.target, NodeKind::Global);
                    // Implicitly created unless some file declared it.
                    if !known_globals.contains(&reference.target) {
                        record.inferred = Some(true);
                    }
                    emit.node(record)?;
                    emit.edge(EdgeRecord::new(
                        &source_id,
                        &target_id,
                        EdgeKind::WritesGlobal,
                    ))?;
                }
                RefKind::Watches => {
                    let target_id = node_id(NodeKind::Global, &reference.target);
                    emit.node(NodeRecord::new(
                        &target_id,
                        &reference.target,
                        NodeKind::Global,
                    ))?;
                    emit.edge(EdgeRecord::new(&source_id, &target_id, EdgeKind::Watches))?;
                }
            }
        }

        debug!("pass 2: {} references in {}", references.len(), rel_path);
        Ok(())
    }

    fn is_platform_api(&self, target: &str) -> bool {
        self.platform_patterns.iter().any(|p| p.is_match(target))
    }
}

#[derive(Default)]
struct DefinitionsOutcome {
    globals: HashSet<String>,
    triggers: HashSet<String>,
}

/// Sink wrapper converting store failures into per-file failures and
/// keeping the emission counters.
struct Emitter<'a> {
    sink: &'a dyn GraphSink,
    file: PathBuf,
    phase: Phase,
    nodes: &'a AtomicUsize,
    edges: &'a AtomicUsize,
}

impl Emitter<'_> {
    fn node(&self, record: NodeRecord) -> Result<(), FileFailure> {
        self.sink
            .upsert_node(&record)
            .map_err(|e| FileFailure::new(&self.file, self.phase, e.to_string()))?;
        self.nodes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn edge(&self, record: EdgeRecord) -> Result<(), FileFailure> {
        self.sink
            .upsert_edge(&record)
            .map_err(|e| FileFailure::new(&self.file, self.phase, e.to_string()))?;
        self.edges.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn read_file(file: &Path, phase: Phase) -> Result<String, FileFailure> {
    std::fs::read_to_string(file)
        .or_else(|_| {
            // Legacy sources are often not valid UTF-8; decode lossily
            // before giving up on the file.
            std::fs::read(file).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        })
        .map_err(|e| FileFailure::new(file, phase, format!("failed to read file: {e}")))
}
