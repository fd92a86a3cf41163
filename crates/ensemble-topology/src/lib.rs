//! # ensemble-topology
//!
//! The shared deployment topology of an Ensemble cluster: which machines
//! exist, which services run, which units of each service are placed on
//! which machine, and which relations connect services.
//!
//! The topology is one versioned document in a coordination store. Any
//! number of processes may read and modify it concurrently; modifications
//! are serialized by optimistic compare-and-swap rather than locks.
//!
//! - **Model**: The persisted document and its entities
//! - **Entity Graph**: [`Topology`], enforcing cross-entity invariants
//! - **Relation Matcher**: Structural relation validation and endpoint
//!   lookup
//! - **Codec**: JSON encoding with schema version checks
//! - **Store**: [`TopologyStore`], the retrying read-modify-write protocol
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ensemble_core::MemoryBackend;
//! use ensemble_topology::prelude::*;
//!
//! # tokio_test_block(async {
//! let store = TopologyStore::new(Arc::new(MemoryBackend::new()), "/topology");
//!
//! store
//!     .update(|topology| {
//!         topology.add_machine("machine-0")?;
//!         topology.add_service("service-0", "wordpress")?;
//!         let unit = UnitKey::new("service-0", "unit-0");
//!         topology.add_unit(&unit)?;
//!         topology.assign_unit_to_machine(&unit, "machine-0")
//!     })
//!     .await?;
//!
//! let snapshot = store.read().await?;
//! assert_eq!(snapshot.machine_keys(), vec!["machine-0"]);
//! # Ok::<(), TopologyError>(())
//! # }).unwrap();
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod config;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod metrics;
pub mod model;
pub mod store;

// Re-export main types at crate root
pub use config::{RetryPolicy, StoreConfig};
pub use error::{EntityKind, NoRelationFound, RelationViolation, Result, TopologyError};
pub use graph::Topology;
pub use model::{
    Document, Machine, Relation, RelationEndpoint, RelationRole, RelationScope, RelationSide,
    Service, TOPOLOGY_VERSION, Unit, UnitKey,
};
pub use store::TopologyStore;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, TopologyError};
    pub use crate::graph::Topology;
    pub use crate::model::{
        Relation, RelationEndpoint, RelationRole, RelationScope, RelationSide, UnitKey,
    };
    pub use crate::store::TopologyStore;
}
