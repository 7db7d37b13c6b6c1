//! Store error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error while writing to or reading from the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store backend does not support the requested operation
    #[error("operation not supported by this store: {operation}")]
    Unsupported { operation: &'static str },

    /// Output location could not be prepared
    #[error("failed to prepare output directory '{path}': {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Transient backend failure that may succeed on retry
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Retries exhausted for a transient failure
    #[error("store write failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl StoreError {
    /// Create an Unsupported error for a named operation.
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Whether the failure is worth retrying.
    ///
    /// I/O and explicitly transient failures are retried; schema,
    /// serialization, and capability errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Transient(_))
    }
}
