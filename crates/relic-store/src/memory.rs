//! In-memory graph store.
//!
//! Reference implementation of the store contract with full merge and
//! deletion semantics. Used by the test suites and by dry runs; also the
//! model for what a database-backed implementation must do.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::traits::{GraphSink, GraphStore};
use crate::types::{EdgeKind, EdgeRecord, NodeRecord};

#[derive(Default)]
struct MemoryState {
    nodes: HashMap<String, NodeRecord>,
    edges: HashSet<EdgeRecord>,
    revision: Option<String>,
}

/// Thread-safe in-memory store with create-or-merge node semantics.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes.
    pub fn node_count(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }

    /// Number of stored edges.
    pub fn edge_count(&self) -> usize {
        self.state.lock().unwrap().edges.len()
    }

    /// Snapshot of all nodes, for assertions.
    pub fn nodes(&self) -> Vec<NodeRecord> {
        self.state.lock().unwrap().nodes.values().cloned().collect()
    }

    /// Snapshot of all edges, for assertions.
    pub fn edges(&self) -> Vec<EdgeRecord> {
        self.state.lock().unwrap().edges.iter().cloned().collect()
    }

    /// Find a node by label and kind.
    pub fn find_node(&self, label: &str, kind: crate::types::NodeKind) -> Option<NodeRecord> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .values()
            .find(|n| n.label == label && n.kind == kind)
            .cloned()
    }

    /// Edges of a given kind, for assertions.
    pub fn edges_of_kind(&self, kind: EdgeKind) -> Vec<EdgeRecord> {
        self.state
            .lock()
            .unwrap()
            .edges
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

impl GraphSink for MemoryStore {
    fn upsert_node(&self, node: &NodeRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        match state.nodes.get_mut(&node.id) {
            Some(existing) => existing.merge_absent(node),
            None => {
                state.nodes.insert(node.id.clone(), node.clone());
            }
        }
        Ok(())
    }

    fn upsert_edge(&self, edge: &EdgeRecord) -> Result<(), StoreError> {
        self.state.lock().unwrap().edges.insert(edge.clone());
        Ok(())
    }
}

impl GraphStore for MemoryStore {
    fn delete_subgraph_for_file(&self, file_path: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();

        // Nodes attributed to the file, plus the file node itself.
        let doomed: HashSet<String> = state
            .nodes
            .values()
            .filter(|n| n.file.as_deref() == Some(file_path))
            .map(|n| n.id.clone())
            .collect();

        state.nodes.retain(|id, _| !doomed.contains(id));
        state
            .edges
            .retain(|e| !doomed.contains(&e.source) && !doomed.contains(&e.target));
        Ok(())
    }

    fn last_indexed_revision(&self) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().unwrap().revision.clone())
    }

    fn set_last_indexed_revision(&self, revision: &str) -> Result<(), StoreError> {
        self.state.lock().unwrap().revision = Some(revision.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    #[test]
    fn upsert_merges_by_id() {
        let store = MemoryStore::new();
        let bare = NodeRecord::new("n1", "Process", NodeKind::Function);
        let full = NodeRecord::new("n1", "Process", NodeKind::Function)
            .with_file("src/a.cpp")
            .with_lines(3, Some(9));

        store.upsert_node(&bare).unwrap();
        store.upsert_node(&full).unwrap();

        assert_eq!(store.node_count(), 1);
        let merged = store.find_node("Process", NodeKind::Function).unwrap();
        assert_eq!(merged.file.as_deref(), Some("src/a.cpp"));
        assert_eq!(merged.start_line, Some(3));
    }

    #[test]
    fn duplicate_edges_collapse() {
        let store = MemoryStore::new();
        let edge = EdgeRecord::new("a", "b", EdgeKind::Calls);
        store.upsert_edge(&edge).unwrap();
        store.upsert_edge(&edge).unwrap();
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn delete_subgraph_removes_file_nodes_and_incident_edges() {
        let store = MemoryStore::new();
        store
            .upsert_node(&NodeRecord::new("f", "src/a.cpp", NodeKind::File).with_file("src/a.cpp"))
            .unwrap();
        store
            .upsert_node(&NodeRecord::new("n1", "Process", NodeKind::Function).with_file("src/a.cpp"))
            .unwrap();
        store
            .upsert_node(&NodeRecord::new("n2", "Helper", NodeKind::Function).with_file("src/b.cpp"))
            .unwrap();
        store
            .upsert_edge(&EdgeRecord::new("n1", "f", EdgeKind::DefinedIn))
            .unwrap();
        store
            .upsert_edge(&EdgeRecord::new("n2", "n1", EdgeKind::Calls))
            .unwrap();

        store.delete_subgraph_for_file("src/a.cpp").unwrap();

        assert_eq!(store.node_count(), 1);
        assert!(store.find_node("Helper", NodeKind::Function).is_some());
        // Edge into the deleted node went with it.
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn revision_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.last_indexed_revision().unwrap(), None);
        store.set_last_indexed_revision("abc123").unwrap();
        assert_eq!(
            store.last_indexed_revision().unwrap().as_deref(),
            Some("abc123")
        );
    }
}
