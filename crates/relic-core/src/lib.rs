//! Relic Core - cross-language code relationship graph extraction
//!
//! This crate is the extraction and incremental-synchronization engine:
//!
//! - A family of per-language source adapters behind one contract
//!   ([`adapter::SourceAdapter`]): C family, C#, TypeScript, VB, embedded
//!   pages, and SQL.
//! - A two-pass [`builder::GraphBuilder`] resolving definitions, then
//!   references against the run's known-globals set, streaming node/edge
//!   records to a [`relic_store::GraphSink`].
//! - A git-diff-driven [`sync::SyncController`] that keeps the persisted
//!   graph consistent with a moving source tree via idempotent per-file
//!   surgical updates.
//!
//! Extraction is deliberately heuristic: regex fallbacks, size caps, and
//! chunked parsing trade precision for speed and failure tolerance across
//! large, heterogeneous, possibly non-compiling legacy codebases.

pub mod adapter;
pub mod builder;
pub mod discovery;
pub mod model;
pub mod report;
pub mod sync;
pub mod vcs;

// Re-exports for convenience
pub use adapter::{
    AdapterError, AdapterSet, PageDelegate, ParseOutput, SizeLimits, SourceAdapter, SourceLanguage,
};
pub use builder::{BuilderConfig, BuilderError, GraphBuilder, ProgressFn};
pub use discovery::{collect_files, DiscoveryError};
pub use model::{node_id, DefKind, Definition, RefKind, Reference};
pub use report::{ExtractionReport, FileFailure, Phase};
pub use sync::{SyncController, SyncError, SyncOptions, SyncOutcome};
pub use vcs::{GitCli, Vcs, VcsError};
