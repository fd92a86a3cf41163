//! Topology store metrics.
//!
//! Counters and histograms for the optimistic update loop. These complement
//! the structured logging emitted by [`TopologyStore`](crate::TopologyStore).

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// CAS retry counter.
pub const CAS_RETRY: &str = "ensemble_topology_cas_retry_total";

/// Completed updates, labelled by outcome.
pub const UPDATES: &str = "ensemble_topology_updates_total";

/// Attempts taken per update.
pub const UPDATE_ATTEMPTS: &str = "ensemble_topology_update_attempts";

/// How an update call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The new document was written.
    Committed,
    /// The closure left the document unchanged; nothing was written.
    Unchanged,
    /// The closure returned an error.
    Rejected,
    /// Every permitted attempt lost the race.
    Exhausted,
    /// Storage or codec failure.
    Failed,
}

impl UpdateOutcome {
    /// Label value for this outcome.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Unchanged => "unchanged",
            Self::Rejected => "rejected",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
        }
    }
}

/// Registers all topology metric descriptions.
///
/// Call this once at application startup after installing a recorder.
pub fn register_metrics() {
    describe_counter!(CAS_RETRY, "Total topology CAS retries");
    describe_counter!(UPDATES, "Total topology update calls by outcome");
    describe_histogram!(UPDATE_ATTEMPTS, "Attempts taken per topology update");
}

/// Records a lost compare-and-swap race.
pub fn record_cas_retry(path: &str) {
    counter!(CAS_RETRY, "path" => path.to_string()).increment(1);
}

/// Records the end of an update call.
pub fn record_update(outcome: UpdateOutcome, attempts: u32) {
    counter!(UPDATES, "outcome" => outcome.as_str()).increment(1);
    histogram!(UPDATE_ATTEMPTS).record(f64::from(attempts));
}
