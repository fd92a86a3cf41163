//! Shared test utilities for Ensemble integration tests.
//!
//! This crate provides:
//! - [`TracingMemoryBackend`]: In-memory storage with operation recording,
//!   failure injection, conflict injection and read rendezvous
//! - [`DocumentBuilder`]: Raw stored documents for seeding a backend
//!
//! # Example
//!
//! ```rust,ignore
//! use ensemble_test_utils::{DocumentBuilder, TracingMemoryBackend};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let backend = TracingMemoryBackend::new();
//!     backend.seed("/topology", DocumentBuilder::new().machine("m-0").build());
//!     // ... run test ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;
pub mod storage;

pub use fixtures::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ensemble_topology=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
