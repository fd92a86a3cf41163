//! Topology document data model.
//!
//! The whole topology is one [`Document`] persisted at a single path in the
//! coordination store. Every collection is a `BTreeMap`, so enumeration is
//! lexicographically sorted by key regardless of insertion order.
//!
//! # Wire Layout (version 1)
//!
//! ```text
//! version:   1
//! machines:  { <machineKey>: {} , ... }
//! services:  { <serviceKey>: { name, units: { <unitKey>: { machine } } } }
//! relations: { <relationKey>: { interface, scope, services: { <role>: { service, relation-name } } } }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RelationViolation;

/// The document schema version this crate reads and writes.
///
/// Only bump this when the layout is genuinely incompatible; there is no
/// in-place migration.
pub const TOPOLOGY_VERSION: u32 = 1;

/// Root aggregate of the topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Schema version; must equal [`TOPOLOGY_VERSION`]. A document written
    /// without one reads as the current version.
    #[serde(default = "current_version")]
    pub version: u32,
    /// Machines by key.
    #[serde(default)]
    pub machines: BTreeMap<String, Machine>,
    /// Services by key.
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
    /// Relations by key.
    #[serde(default)]
    pub relations: BTreeMap<String, Relation>,
}

fn current_version() -> u32 {
    TOPOLOGY_VERSION
}

impl Document {
    /// Creates an empty document at the current schema version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: TOPOLOGY_VERSION,
            machines: BTreeMap::new(),
            services: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// A placement target. Carries no attributes of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {}

/// A deployed service and its units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Human-readable name, unique across services.
    pub name: String,
    /// Units by key (unique within this service only).
    #[serde(default)]
    pub units: BTreeMap<String, Unit>,
}

impl Service {
    /// Creates a service with no units.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: BTreeMap::new(),
        }
    }
}

/// A unit of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Assigned machine key, if any. Stored as `""` when unassigned.
    #[serde(default, with = "empty_as_none")]
    pub machine: Option<String>,
}

mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.filter(|s| !s.is_empty()))
    }
}

/// Composite identity of a unit: owning service key plus unit key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitKey {
    /// Owning service key.
    pub service: String,
    /// Unit key within the service.
    pub unit: String,
}

impl UnitKey {
    /// Creates a unit key.
    #[must_use]
    pub fn new(service: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            unit: unit.into(),
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.unit)
    }
}

/// Position a service occupies within a relation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RelationRole {
    /// Offers the interface; paired with a requirer.
    Provider,
    /// Consumes the interface; paired with a provider.
    Requirer,
    /// Self-paired; a peer relation has no provider or requirer.
    Peer,
}

impl RelationRole {
    /// Returns the role that must be present alongside this one.
    #[must_use]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Provider => Self::Requirer,
            Self::Requirer => Self::Provider,
            Self::Peer => Self::Peer,
        }
    }

    /// Returns the wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Requirer => "requirer",
            Self::Peer => "peer",
        }
    }
}

impl fmt::Display for RelationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationRole {
    type Err = RelationViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider" => Ok(Self::Provider),
            "requirer" => Ok(Self::Requirer),
            "peer" => Ok(Self::Peer),
            other => Err(RelationViolation::UnknownRole(other.to_string())),
        }
    }
}

/// Locality of a relation's effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationScope {
    /// Visible across the whole environment.
    #[default]
    Global,
    /// Confined to units sharing a container.
    Container,
}

/// One side of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSide {
    /// Key of the participating service.
    pub service: String,
    /// Service-local endpoint name.
    #[serde(rename = "relation-name")]
    pub relation_name: String,
}

impl RelationSide {
    /// Creates a relation side.
    #[must_use]
    pub fn new(service: impl Into<String>, relation_name: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            relation_name: relation_name.into(),
        }
    }
}

/// An interconnection between one or two services over an interface.
///
/// Validated once by `Topology::add_relation` and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Interface name shared by both sides.
    pub interface: String,
    /// Relation scope.
    #[serde(default)]
    pub scope: RelationScope,
    /// Sides keyed by role.
    #[serde(default)]
    pub services: BTreeMap<RelationRole, RelationSide>,
}

impl Relation {
    /// Creates a relation with no sides.
    #[must_use]
    pub fn new(interface: impl Into<String>, scope: RelationScope) -> Self {
        Self {
            interface: interface.into(),
            scope,
            services: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) the side for `role`.
    #[must_use]
    pub fn with_side(mut self, role: RelationRole, side: RelationSide) -> Self {
        self.services.insert(role, side);
        self
    }

    /// Builds a provider/requirer relation.
    #[must_use]
    pub fn provider_requirer(
        interface: impl Into<String>,
        provider: RelationSide,
        requirer: RelationSide,
    ) -> Self {
        Self::new(interface, RelationScope::Global)
            .with_side(RelationRole::Provider, provider)
            .with_side(RelationRole::Requirer, requirer)
    }

    /// Builds a peer relation.
    #[must_use]
    pub fn peer(interface: impl Into<String>, side: RelationSide) -> Self {
        Self::new(interface, RelationScope::Global).with_side(RelationRole::Peer, side)
    }

    /// Returns true if any side references `service`.
    #[must_use]
    pub fn involves(&self, service: &str) -> bool {
        self.services.values().any(|side| side.service == service)
    }
}

/// An endpoint descriptor used to look a relation up by structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationEndpoint {
    /// Interface name.
    pub interface: String,
    /// Service-local endpoint name.
    pub relation_name: String,
    /// Role the endpoint plays.
    pub role: RelationRole,
}

impl RelationEndpoint {
    /// Creates an endpoint descriptor.
    #[must_use]
    pub fn new(
        role: RelationRole,
        interface: impl Into<String>,
        relation_name: impl Into<String>,
    ) -> Self {
        Self {
            interface: interface.into(),
            relation_name: relation_name.into(),
            role,
        }
    }
}

impl fmt::Display for RelationEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.interface, self.relation_name, self.role)
    }
}
