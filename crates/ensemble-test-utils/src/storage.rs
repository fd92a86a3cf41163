//! Test storage implementations with operation tracing.
//!
//! Provides in-memory storage that records all operations for test
//! assertions and can simulate the failure modes of a coordination store:
//! hard errors, concurrent writers, and readers racing each other.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use ensemble_core::error::{Error, Result};
use ensemble_core::storage::{
    ObjectMeta, StorageBackend, VersionedObject, WritePrecondition, WriteResult,
};
use tokio::sync::Barrier;

/// Record of a storage operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// Get operation.
    Get {
        /// Path that was read.
        path: String,
    },
    /// Head operation (metadata only).
    Head {
        /// Path that was checked.
        path: String,
    },
    /// Put operation.
    Put {
        /// Path that was written.
        path: String,
        /// Size of data written.
        size: usize,
        /// Precondition used.
        precondition: WritePrecondition,
    },
}

impl StorageOp {
    /// Returns true for put operations.
    pub fn is_put(&self) -> bool {
        matches!(self, Self::Put { .. })
    }
}

/// In-memory storage backend with operation tracing.
///
/// Records all operations for later assertion in tests.
#[derive(Debug, Clone, Default)]
pub struct TracingMemoryBackend {
    data: Arc<Mutex<HashMap<String, StoredObject>>>,
    operations: Arc<Mutex<Vec<StorageOp>>>,
    fail_paths: Arc<Mutex<Vec<String>>>,
    conflicts: Arc<Mutex<VecDeque<Bytes>>>,
    rendezvous: Option<Rendezvous>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version: u64,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Rendezvous {
    barrier: Arc<Barrier>,
    remaining: Arc<AtomicUsize>,
}

impl TracingMemoryBackend {
    /// Creates a new empty tracing storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage whose first `readers` gets all complete before any
    /// of them returns.
    ///
    /// Every reader observes the same stored state, so concurrent writers
    /// are guaranteed to race on the same version token.
    #[must_use]
    pub fn with_read_rendezvous(readers: usize) -> Self {
        Self {
            rendezvous: Some(Rendezvous {
                barrier: Arc::new(Barrier::new(readers)),
                remaining: Arc::new(AtomicUsize::new(readers)),
            }),
            ..Self::default()
        }
    }

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Returns the number of recorded puts.
    #[must_use]
    pub fn put_count(&self) -> usize {
        self.operations().iter().filter(|op| op.is_put()).count()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Injects a failure for the given path prefix.
    pub fn inject_failure(&self, path: impl Into<String>) {
        self.fail_paths.lock().expect("lock").push(path.into());
    }

    /// Simulates a concurrent writer.
    ///
    /// The next conditional put stores `data` unconditionally first, as if
    /// another writer had committed between this writer's read and write.
    /// Injections queue up, one per conditional put.
    pub fn inject_conflict(&self, data: impl Into<Bytes>) {
        self.conflicts.lock().expect("lock").push_back(data.into());
    }

    /// Returns the number of injected conflicts not yet consumed.
    #[must_use]
    pub fn pending_conflicts(&self) -> usize {
        self.conflicts.lock().expect("lock").len()
    }

    /// Stores `data` unconditionally without recording an operation.
    pub fn seed(&self, path: &str, data: impl Into<Bytes>) {
        let mut store = self.data.lock().expect("lock");
        Self::store(&mut store, path, data.into());
    }

    /// Returns the stored bytes for a path.
    #[must_use]
    pub fn data(&self, path: &str) -> Option<Bytes> {
        self.data
            .lock()
            .expect("lock")
            .get(path)
            .map(|o| o.data.clone())
    }

    /// Returns the current version for a path (for CAS testing).
    #[must_use]
    pub fn version(&self, path: &str) -> Option<String> {
        self.data
            .lock()
            .expect("lock")
            .get(path)
            .map(|o| o.version.to_string())
    }

    fn store(store: &mut HashMap<String, StoredObject>, path: &str, data: Bytes) -> u64 {
        let version = store.get(path).map_or(1, |o| o.version + 1);
        store.insert(
            path.to_string(),
            StoredObject {
                data,
                version,
                last_modified: Utc::now(),
            },
        );
        version
    }

    fn record(&self, op: StorageOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn check_failure(&self, path: &str) -> Result<()> {
        let fail_paths = self.fail_paths.lock().expect("lock");
        if fail_paths.iter().any(|p| path.starts_with(p)) {
            return Err(Error::storage(format!("injected failure for path: {path}")));
        }
        Ok(())
    }

    async fn maybe_rendezvous(&self) {
        let Some(rendezvous) = &self.rendezvous else {
            return;
        };
        let claimed = rendezvous
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if claimed {
            rendezvous.barrier.wait().await;
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for TracingMemoryBackend {
    async fn get(&self, path: &str) -> Result<Option<VersionedObject>> {
        self.check_failure(path)?;
        self.record(StorageOp::Get {
            path: path.to_string(),
        });

        let object = self
            .data
            .lock()
            .expect("lock")
            .get(path)
            .map(|o| VersionedObject {
                data: o.data.clone(),
                version: o.version.to_string(),
            });

        self.maybe_rendezvous().await;
        Ok(object)
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        self.check_failure(path)?;
        self.record(StorageOp::Put {
            path: path.to_string(),
            size: data.len(),
            precondition: precondition.clone(),
        });

        let mut store = self.data.lock().expect("lock");

        if precondition != WritePrecondition::None {
            if let Some(intruder) = self.conflicts.lock().expect("lock").pop_front() {
                Self::store(&mut store, path, intruder);
            }
        }

        let existing = store.get(path);
        match &precondition {
            WritePrecondition::None => {}
            WritePrecondition::DoesNotExist => {
                if let Some(obj) = existing {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: obj.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => match existing {
                Some(obj) if obj.version.to_string() != *expected => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: obj.version.to_string(),
                    });
                }
                None => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: "0".to_string(),
                    });
                }
                Some(_) => {}
            },
        }

        let version = Self::store(&mut store, path, data);
        Ok(WriteResult::Success {
            version: version.to_string(),
        })
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        self.check_failure(path)?;
        self.record(StorageOp::Head {
            path: path.to_string(),
        });

        let data = self.data.lock().expect("lock");
        Ok(data.get(path).map(|o| ObjectMeta {
            path: path.to_string(),
            size: o.data.len() as u64,
            version: o.version.to_string(),
            last_modified: Some(o.last_modified),
        }))
    }
}
