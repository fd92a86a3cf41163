//! Document codec.
//!
//! Topology documents are stored as JSON. Decoding reads the schema
//! version before parsing the body so an incompatible layout surfaces as
//! [`TopologyError::VersionMismatch`] rather than a field error.

use bytes::Bytes;
use serde::Deserialize;

use crate::error::{Result, TopologyError};
use crate::graph::Topology;
use crate::model::{Document, TOPOLOGY_VERSION};

#[derive(Deserialize)]
struct Header {
    version: Option<i64>,
}

/// Encodes a topology into its stored form.
///
/// Output is deterministic: map keys are written in sorted order.
///
/// # Errors
///
/// Returns `Malformed` if serialization fails.
pub fn encode(topology: &Topology) -> Result<Bytes> {
    serde_json::to_vec(topology.document())
        .map(Bytes::from)
        .map_err(|e| TopologyError::Malformed {
            message: format!("encode: {e}"),
        })
}

/// Decodes stored bytes into a topology.
///
/// Empty (or whitespace-only) input yields an empty topology at the current
/// version, which is how a never-written document reads. A document with no
/// `version` field is read as the current version.
///
/// # Errors
///
/// - `VersionMismatch` if the document version is any integer other than
///   [`TOPOLOGY_VERSION`]
/// - `Malformed` if the bytes do not parse, the version is not an integer,
///   or two services share a name
pub fn decode(bytes: &[u8]) -> Result<Topology> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Topology::new());
    }

    let header: Header = serde_json::from_slice(bytes).map_err(malformed)?;
    let found = header.version.unwrap_or(i64::from(TOPOLOGY_VERSION));
    if found != i64::from(TOPOLOGY_VERSION) {
        return Err(TopologyError::VersionMismatch {
            found,
            expected: TOPOLOGY_VERSION,
        });
    }

    let document: Document = serde_json::from_slice(bytes).map_err(malformed)?;
    Topology::try_from(document)
}

#[allow(clippy::needless_pass_by_value)]
fn malformed(e: serde_json::Error) -> TopologyError {
    TopologyError::Malformed {
        message: format!("decode: {e}"),
    }
}
