//! Retry wrapper for transient store failures.
//!
//! Wraps any [`GraphStore`] and retries transient write failures with
//! bounded exponential backoff. Permanent failures (schema, serialization,
//! unsupported operations) pass through immediately.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::StoreError;
use crate::traits::{GraphSink, GraphStore};
use crate::types::{EdgeRecord, NodeRecord};

/// Default max retry attempts after the initial try.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Backoff policy: `max_retries` additional attempts, delay doubling from
/// `base_delay` between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between attempts, for tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }
}

/// A [`GraphStore`] wrapper retrying transient failures.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: GraphStore> RetryingStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Access the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwrap the inner store.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn run<T>(
        &self,
        operation: &'static str,
        mut call: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut delay = self.policy.base_delay;
        let mut last: Option<StoreError> = None;

        for attempt in 0..=self.policy.max_retries {
            match call() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    warn!(
                        "transient failure in {} (attempt {}/{}): {}",
                        operation,
                        attempt + 1,
                        self.policy.max_retries + 1,
                        e
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                        delay *= 2;
                    }
                    last = Some(e);
                }
                Err(e) if e.is_transient() => {
                    return Err(StoreError::RetriesExhausted {
                        attempts: self.policy.max_retries + 1,
                        last: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        // Unreachable: the loop always returns; kept for totality.
        Err(StoreError::RetriesExhausted {
            attempts: self.policy.max_retries + 1,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

impl<S: GraphStore> GraphSink for RetryingStore<S> {
    fn upsert_node(&self, node: &NodeRecord) -> Result<(), StoreError> {
        self.run("upsert_node", || self.inner.upsert_node(node))
    }

    fn upsert_edge(&self, edge: &EdgeRecord) -> Result<(), StoreError> {
        self.run("upsert_edge", || self.inner.upsert_edge(edge))
    }
}

impl<S: GraphStore> GraphStore for RetryingStore<S> {
    fn delete_subgraph_for_file(&self, file_path: &str) -> Result<(), StoreError> {
        self.run("delete_subgraph_for_file", || {
            self.inner.delete_subgraph_for_file(file_path)
        })
    }

    fn last_indexed_revision(&self) -> Result<Option<String>, StoreError> {
        self.run("last_indexed_revision", || self.inner.last_indexed_revision())
    }

    fn set_last_indexed_revision(&self, revision: &str) -> Result<(), StoreError> {
        self.run("set_last_indexed_revision", || {
            self.inner.set_last_indexed_revision(revision)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::NodeKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store that fails transiently a fixed number of times per call site.
    struct FlakyStore {
        inner: MemoryStore,
        failures_left: AtomicU32,
        permanent: bool,
    }

    impl FlakyStore {
        fn transient(failures: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures_left: AtomicU32::new(failures),
                permanent: false,
            }
        }

        fn permanent() -> Self {
            Self {
                inner: MemoryStore::new(),
                failures_left: AtomicU32::new(u32::MAX),
                permanent: true,
            }
        }

        fn maybe_fail(&self) -> Result<(), StoreError> {
            if self.permanent {
                return Err(StoreError::unsupported("write"));
            }
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Transient("connection reset".into()));
            }
            Ok(())
        }
    }

    impl GraphSink for FlakyStore {
        fn upsert_node(&self, node: &NodeRecord) -> Result<(), StoreError> {
            self.maybe_fail()?;
            self.inner.upsert_node(node)
        }

        fn upsert_edge(&self, edge: &EdgeRecord) -> Result<(), StoreError> {
            self.maybe_fail()?;
            self.inner.upsert_edge(edge)
        }
    }

    impl GraphStore for FlakyStore {
        fn delete_subgraph_for_file(&self, file_path: &str) -> Result<(), StoreError> {
            self.maybe_fail()?;
            self.inner.delete_subgraph_for_file(file_path)
        }

        fn last_indexed_revision(&self) -> Result<Option<String>, StoreError> {
            self.inner.last_indexed_revision()
        }

        fn set_last_indexed_revision(&self, revision: &str) -> Result<(), StoreError> {
            self.inner.set_last_indexed_revision(revision)
        }
    }

    #[test]
    fn transient_failures_are_retried() {
        let store = RetryingStore::with_policy(FlakyStore::transient(2), RetryPolicy::immediate(3));
        let node = NodeRecord::new("n1", "main", NodeKind::Function);
        store.upsert_node(&node).unwrap();
        assert_eq!(store.inner().inner.node_count(), 1);
    }

    #[test]
    fn exhaustion_reports_attempts() {
        let store = RetryingStore::with_policy(FlakyStore::transient(10), RetryPolicy::immediate(2));
        let node = NodeRecord::new("n1", "main", NodeKind::Function);
        let err = store.upsert_node(&node).unwrap_err();
        assert!(matches!(
            err,
            StoreError::RetriesExhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn permanent_failures_skip_retry() {
        let store = RetryingStore::with_policy(FlakyStore::permanent(), RetryPolicy::immediate(3));
        let node = NodeRecord::new("n1", "main", NodeKind::Function);
        let err = store.upsert_node(&node).unwrap_err();
        assert!(matches!(err, StoreError::Unsupported { .. }));
    }
}
