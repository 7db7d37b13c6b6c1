//! Store trait definitions.
//!
//! Defines the interface between the extraction core and the persistent
//! graph. All methods take `&self`: implementations are expected to be
//! internally synchronized so that parallel extraction workers can share a
//! single sink. Upserts are create-or-merge keyed by node id with
//! last-write-wins property merge; the core never assumes transactional
//! isolation across files.

use crate::error::StoreError;
use crate::types::{EdgeRecord, NodeRecord};

/// Output sink for node and edge records.
///
/// The only synchronization point of a parallel extraction pass.
pub trait GraphSink: Send + Sync {
    /// Create or merge a node by id.
    fn upsert_node(&self, node: &NodeRecord) -> Result<(), StoreError>;

    /// Create or merge an edge.
    fn upsert_edge(&self, edge: &EdgeRecord) -> Result<(), StoreError>;
}

/// Full store interface: emission plus the state the sync controller needs.
pub trait GraphStore: GraphSink {
    /// Delete the file node for `file_path`, every node attributed to that
    /// file, and all edges incident to the deleted nodes.
    ///
    /// Used by surgical updates (delete-then-recreate). Concurrent calls for
    /// different files are safe; for the same file they must be serialized
    /// by the caller.
    fn delete_subgraph_for_file(&self, file_path: &str) -> Result<(), StoreError>;

    /// Revision the graph was last synchronized to, if any.
    fn last_indexed_revision(&self) -> Result<Option<String>, StoreError>;

    /// Advance the last-indexed revision pointer.
    fn set_last_indexed_revision(&self, revision: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // The traits must stay object-safe: the builder holds `&dyn GraphSink`.
    fn _assert_object_safe(_: &dyn GraphSink, _: &dyn GraphStore) {}
}
