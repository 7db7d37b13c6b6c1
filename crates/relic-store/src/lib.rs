//! Relic Store - Graph store abstraction for the code relationship graph
//!
//! The extraction core never talks to a concrete graph database. It emits
//! node and edge records through the narrow interfaces defined here:
//!
//! - [`GraphSink`]: create-or-merge emission of nodes and edges
//! - [`GraphStore`]: sink plus per-file subgraph deletion and the
//!   last-indexed-revision state record used by incremental sync
//!
//! ## Provided Implementations
//!
//! - [`MemoryStore`]: in-process store with merge-by-id semantics, used by
//!   tests and dry runs
//! - [`JsonlStore`]: append-only `nodes.jsonl` / `edges.jsonl` emitter for
//!   full extraction runs, plus a `state.json` revision record
//! - [`RetryingStore`]: wrapper adding bounded exponential backoff around
//!   transient write failures
//!
//! ## Example
//!
//! ```
//! use relic_store::{GraphSink, GraphStore, MemoryStore, NodeKind, NodeRecord};
//!
//! let store = MemoryStore::new();
//! let node = NodeRecord::new("n1", "Connect", NodeKind::Function);
//! store.upsert_node(&node).unwrap();
//! assert_eq!(store.node_count(), 1);
//! ```

mod error;
mod jsonl;
mod memory;
mod retry;
mod traits;
mod types;

pub use error::StoreError;
pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryingStore};
pub use traits::{GraphSink, GraphStore};
pub use types::{EdgeKind, EdgeRecord, NodeKind, NodeRecord};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
