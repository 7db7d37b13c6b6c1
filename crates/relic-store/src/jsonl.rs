//! JSONL emitting store.
//!
//! Streams node and edge records to `nodes.jsonl` / `edges.jsonl` under an
//! output directory, one JSON object per line, and keeps the last-indexed
//! revision in `state.json`. This is the full-extraction output format the
//! graph importer consumes; emission is append-only and duplicate records
//! for the same id are collapsed by the importer's merge, not here.
//!
//! Surgical updates rewrite the record files: deletion filters out every
//! node attributed to the target file plus all edges incident to the
//! dropped node ids, then reopens the streams for appending.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{GraphSink, GraphStore};
use crate::types::{EdgeRecord, NodeRecord};

const NODES_FILE: &str = "nodes.jsonl";
const EDGES_FILE: &str = "edges.jsonl";
const STATE_FILE: &str = "state.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    last_indexed_revision: Option<String>,
}

/// Append-only JSONL store for full extraction runs.
pub struct JsonlStore {
    output_dir: PathBuf,
    nodes: Mutex<BufWriter<File>>,
    edges: Mutex<BufWriter<File>>,
}

impl JsonlStore {
    /// Open (creating if needed) a JSONL store under `output_dir`.
    ///
    /// Existing record files are truncated: a run's output replaces the
    /// previous run's. The state record is preserved.
    pub fn create(output_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(output_dir).map_err(|e| StoreError::OutputDir {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        let nodes = File::create(output_dir.join(NODES_FILE))?;
        let edges = File::create(output_dir.join(EDGES_FILE))?;

        debug!("JSONL store opened at {}", output_dir.display());

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            nodes: Mutex::new(BufWriter::new(nodes)),
            edges: Mutex::new(BufWriter::new(edges)),
        })
    }

    /// Open an existing store without truncating record files.
    ///
    /// Appends to previous output; useful when a run is resumed.
    pub fn open_append(output_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(output_dir).map_err(|e| StoreError::OutputDir {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        let open = |name: &str| -> Result<File, StoreError> {
            Ok(OpenOptions::new()
                .create(true)
                .append(true)
                .open(output_dir.join(name))?)
        };

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            nodes: Mutex::new(BufWriter::new(open(NODES_FILE)?)),
            edges: Mutex::new(BufWriter::new(open(EDGES_FILE)?)),
        })
    }

    /// Flush buffered records to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.nodes.lock().unwrap().flush()?;
        self.edges.lock().unwrap().flush()?;
        Ok(())
    }

    /// Directory the store writes into.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn state_path(&self) -> PathBuf {
        self.output_dir.join(STATE_FILE)
    }

    fn read_state(&self) -> Result<StateRecord, StoreError> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(StateRecord::default());
        }
        let text = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write_state(&self, state: &StateRecord) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(state)?;
        fs::write(self.state_path(), text)?;
        Ok(())
    }
}

impl Drop for JsonlStore {
    fn drop(&mut self) {
        if let Ok(mut w) = self.nodes.lock() {
            let _ = w.flush();
        }
        if let Ok(mut w) = self.edges.lock() {
            let _ = w.flush();
        }
    }
}

impl GraphSink for JsonlStore {
    fn upsert_node(&self, node: &NodeRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(node)?;
        let mut writer = self.nodes.lock().unwrap();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn upsert_edge(&self, edge: &EdgeRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(edge)?;
        let mut writer = self.edges.lock().unwrap();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl GraphStore for JsonlStore {
    fn delete_subgraph_for_file(&self, file_path: &str) -> Result<(), StoreError> {
        // Both streams stay locked for the whole rewrite so appends from
        // other workers cannot interleave with the filtered copy.
        let mut nodes_writer = self.nodes.lock().unwrap();
        let mut edges_writer = self.edges.lock().unwrap();
        nodes_writer.flush()?;
        edges_writer.flush()?;

        let nodes_path = self.output_dir.join(NODES_FILE);
        let edges_path = self.output_dir.join(EDGES_FILE);

        let mut dropped_ids: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut kept_nodes = String::new();
        for line in fs::read_to_string(&nodes_path)?.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let record: NodeRecord = serde_json::from_str(line)?;
            if record.file.as_deref() == Some(file_path) {
                dropped_ids.insert(record.id);
            } else {
                kept_nodes.push_str(line);
                kept_nodes.push('\n');
            }
        }

        let mut kept_edges = String::new();
        for line in fs::read_to_string(&edges_path)?.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let record: EdgeRecord = serde_json::from_str(line)?;
            if !dropped_ids.contains(&record.source) && !dropped_ids.contains(&record.target) {
                kept_edges.push_str(line);
                kept_edges.push('\n');
            }
        }

        fs::write(&nodes_path, kept_nodes)?;
        fs::write(&edges_path, kept_edges)?;

        let reopen = |path: &Path| -> Result<BufWriter<File>, StoreError> {
            Ok(BufWriter::new(
                OpenOptions::new().append(true).open(path)?,
            ))
        };
        *nodes_writer = reopen(&nodes_path)?;
        *edges_writer = reopen(&edges_path)?;

        debug!(
            "removed {} nodes attributed to {}",
            dropped_ids.len(),
            file_path
        );
        Ok(())
    }

    fn last_indexed_revision(&self) -> Result<Option<String>, StoreError> {
        Ok(self.read_state()?.last_indexed_revision)
    }

    fn set_last_indexed_revision(&self, revision: &str) -> Result<(), StoreError> {
        let mut state = self.read_state()?;
        state.last_indexed_revision = Some(revision.to_string());
        self.write_state(&state)
    }
}
