//! Optimistic read-modify-write over the stored topology document.
//!
//! [`TopologyStore::update`] is the only way to mutate the shared
//! topology. Each attempt:
//!
//! 1. Fetches the document bytes and their version token
//! 2. Decodes a fresh [`Topology`] (an absent document is an empty one)
//! 3. Runs the caller's closure against it
//! 4. Encodes the result and skips the write if nothing changed
//! 5. Writes conditionally on the fetched version token
//!
//! A lost race discards the mutated graph and starts over from step 1, so
//! the closure may run more than once and must not have side effects
//! outside the graph it is given. Decode, closure, and backend errors are
//! fatal and never retried.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{Instrument, debug, info, warn};

use ensemble_core::observability::topology_span;
use ensemble_core::storage::{StorageBackend, WritePrecondition, WriteResult};

use crate::codec;
use crate::config::{RetryPolicy, StoreConfig};
use crate::error::{Result, TopologyError};
use crate::graph::Topology;
use crate::metrics::{self, UpdateOutcome};

/// Handle on the topology document in a coordination store.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct TopologyStore {
    backend: Arc<dyn StorageBackend>,
    path: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for TopologyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyStore")
            .field("path", &self.path)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl TopologyStore {
    /// Creates a store for the document at `path` with the default retry
    /// policy.
    pub fn new(backend: Arc<dyn StorageBackend>, path: impl Into<String>) -> Self {
        Self {
            backend,
            path: path.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Creates a store from configuration.
    pub fn from_config(backend: Arc<dyn StorageBackend>, config: &StoreConfig) -> Self {
        Self::new(backend, config.document_path.clone()).with_retry_policy(config.retry.clone())
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Path of the topology document.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Active retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Reads a snapshot of the topology without modifying it.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the fetch fails and a codec error if the stored
    /// document cannot be decoded.
    pub async fn read(&self) -> Result<Topology> {
        let object = self
            .backend
            .get(&self.path)
            .instrument(topology_span("read", &self.path))
            .await?;
        match object {
            Some(object) => codec::decode(&object.data),
            None => Ok(Topology::new()),
        }
    }

    /// Returns the current version token of the document, or `None` if it
    /// has never been written.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backend fails.
    pub async fn revision(&self) -> Result<Option<String>> {
        let meta = self.backend.head(&self.path).await?;
        Ok(meta.map(|meta| meta.version))
    }

    /// Applies `change` to the topology and commits it atomically.
    ///
    /// `change` runs against a freshly decoded graph on every attempt. Its
    /// return value from the attempt that committed (or found nothing to
    /// commit) is returned.
    ///
    /// # Errors
    ///
    /// - Any error returned by `change`; nothing is written
    /// - `VersionMismatch` or `Malformed` if the stored document is unusable
    /// - `Storage` if a fetch or write fails for a reason other than a lost
    ///   race
    /// - `RetriesExhausted` if the retry policy ran out; the document is
    ///   unchanged by this call
    pub async fn update<T, F>(&self, mut change: F) -> Result<T>
    where
        F: FnMut(&mut Topology) -> Result<T>,
    {
        let mut attempts = 0;
        let result = self
            .update_inner(&mut change, &mut attempts)
            .instrument(topology_span("update", &self.path))
            .await;

        let outcome = match &result {
            Ok((_, outcome)) => *outcome,
            Err(TopologyError::RetriesExhausted { .. }) => UpdateOutcome::Exhausted,
            Err(
                TopologyError::Storage(_)
                | TopologyError::VersionMismatch { .. }
                | TopologyError::Malformed { .. },
            ) => UpdateOutcome::Failed,
            Err(_) => UpdateOutcome::Rejected,
        };
        metrics::record_update(outcome, attempts);

        result.map(|(value, _)| value)
    }

    async fn update_inner<T, F>(
        &self,
        change: &mut F,
        attempts: &mut u32,
    ) -> Result<(T, UpdateOutcome)>
    where
        F: FnMut(&mut Topology) -> Result<T>,
    {
        loop {
            *attempts += 1;
            let attempt = *attempts;
            debug!(attempt, "fetching topology");

            let fetched = self.backend.get(&self.path).await?;
            let (mut topology, precondition, previous) = match fetched {
                Some(object) => (
                    codec::decode(&object.data)?,
                    WritePrecondition::MatchesVersion(object.version),
                    object.data,
                ),
                None => (Topology::new(), WritePrecondition::DoesNotExist, Bytes::new()),
            };

            let value = change(&mut topology)?;

            let encoded = codec::encode(&topology)?;
            if encoded == previous {
                debug!(attempt, "topology unchanged; skipping write");
                return Ok((value, UpdateOutcome::Unchanged));
            }

            match self.backend.put(&self.path, encoded, precondition).await? {
                WriteResult::Success { version } => {
                    info!(attempt, %version, "topology committed");
                    return Ok((value, UpdateOutcome::Committed));
                }
                WriteResult::PreconditionFailed { current_version } => {
                    metrics::record_cas_retry(&self.path);
                    if !self.retry.allows_retry(attempt) {
                        warn!(
                            attempts = attempt,
                            %current_version,
                            "topology update lost CAS race after max attempts"
                        );
                        return Err(TopologyError::RetriesExhausted { attempts: attempt });
                    }

                    // Another writer committed between our read and write.
                    // Retry from fresh state.
                    let delay = self.retry.backoff(attempt);
                    debug!(attempt, %current_version, ?delay, "topology CAS conflict; retrying");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
