//! Coordination-store abstraction with compare-and-swap writes.
//!
//! The topology document lives at a single path in a strongly consistent
//! store. All the topology layer needs from that store is:
//! - A read that returns the bytes together with an opaque version token,
//!   reporting absence as `None` rather than as an error
//! - A conditional write tagged with the version token last observed
//!
//! ## Version tokens
//!
//! The version token is an opaque `String`. ZooKeeper-style stores expose a
//! numeric node version, object stores expose a generation or `ETag`; callers
//! never interpret it, they only hand it back on the next write.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Precondition for conditional writes (CAS operations).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePrecondition {
    /// Write only if nothing is stored at the path yet.
    DoesNotExist,
    /// Write only if the stored version matches the given token.
    MatchesVersion(String),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Write succeeded, returns new version token.
    Success {
        /// The new version token after the write.
        version: String,
    },
    /// Precondition failed: another writer got there first.
    PreconditionFailed {
        /// The current version that caused the precondition to fail.
        current_version: String,
    },
}

/// Stored bytes together with the version token they were read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedObject {
    /// Object content.
    pub data: Bytes,
    /// Version token to pass back in [`WritePrecondition::MatchesVersion`].
    pub version: String,
}

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Object version token for CAS operations.
    pub version: String,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for the coordination store.
///
/// Implementations must be linearizable per path: a `put` with
/// [`WritePrecondition::MatchesVersion`] succeeds only if no other write
/// landed since the token was observed.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an object and its version token.
    ///
    /// Returns `Ok(None)` if nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Option<VersionedObject>>;

    /// Writes with a precondition.
    ///
    /// Returns `WriteResult::PreconditionFailed` if the precondition is not
    /// met. Never returns an error for a precondition failure; that is a
    /// normal result.
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if the object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;
}

/// In-memory storage backend.
///
/// Thread-safe via `RwLock`. Versions are numeric internally (starting at 1)
/// and exposed as strings.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version: i64,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Option<VersionedObject>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        Ok(objects.get(path).map(|o| VersionedObject {
            data: o.data.clone(),
            version: o.version.to_string(),
        }))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;

        let current = objects.get(path);

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(obj) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: obj.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => {
                let expected_num: i64 = expected.parse().unwrap_or(-1);
                match current {
                    Some(obj) if obj.version != expected_num => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: obj.version.to_string(),
                        });
                    }
                    None => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: "0".to_string(),
                        });
                    }
                    _ => {}
                }
            }
            WritePrecondition::None => {}
        }

        let new_version = current.map_or(1, |o| o.version + 1);
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                version: new_version,
                last_modified: Utc::now(),
            },
        );
        drop(objects);

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        Ok(objects.get(path).map(|obj| ObjectMeta {
            path: path.to_string(),
            size: obj.data.len() as u64,
            version: obj.version.to_string(),
            last_modified: Some(obj.last_modified),
        }))
    }
}
