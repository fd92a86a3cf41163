//! # ensemble-core
//!
//! Shared primitives for the Ensemble topology store.
//!
//! This crate provides the pieces every Ensemble component leans on:
//!
//! - **Error Types**: Shared error definitions and result types
//! - **Storage**: A coordination-store contract with compare-and-swap writes
//!   and an in-memory implementation for tests and single-process use
//! - **Observability**: Logging initialization and span helpers
//!
//! ## Example
//!
//! ```rust
//! use ensemble_core::prelude::*;
//!
//! let backend = MemoryBackend::new();
//! let precondition = WritePrecondition::DoesNotExist;
//! # let _ = (backend, precondition);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod observability;
pub mod storage;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::storage::{
        MemoryBackend, ObjectMeta, StorageBackend, VersionedObject, WritePrecondition,
        WriteResult,
    };
}

pub use error::{Error, Result};
pub use observability::{LogFormat, init_logging};
pub use storage::{
    MemoryBackend, ObjectMeta, StorageBackend, VersionedObject, WritePrecondition, WriteResult,
};
