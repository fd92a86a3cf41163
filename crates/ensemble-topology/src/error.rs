//! Error types for topology operations.
//!
//! Errors are domain-typed so callers can branch on the failure kind:
//! structural violations, lookup misses, codec failures, and coordination
//! store failures are distinct variants.

use std::fmt;

use thiserror::Error;

use crate::model::{RelationEndpoint, RelationRole, UnitKey};

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Kind of entity named in a structural error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A machine.
    Machine,
    /// A service.
    Service,
    /// A unit.
    Unit,
    /// A relation.
    Relation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Machine => "machine",
            Self::Service => "service",
            Self::Unit => "unit",
            Self::Relation => "relation",
        })
    }
}

/// A specific structural defect in a relation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationViolation {
    /// The interface name is empty.
    #[error("relation interface is empty")]
    EmptyInterface,

    /// The relation has no sides at all.
    #[error("relation has no services")]
    NoServices,

    /// A side has an empty service key.
    #[error("relation has {role} service with empty service key")]
    EmptyServiceKey {
        /// Role of the offending side.
        role: RelationRole,
    },

    /// A side has an empty relation name.
    #[error("relation has {role} service with empty relation name")]
    EmptyRelationName {
        /// Role of the offending side.
        role: RelationRole,
    },

    /// A role string that is not provider, requirer, or peer.
    #[error("relation has unknown service role: {0:?}")]
    UnknownRole(String),

    /// A provider without a requirer, or the reverse.
    #[error("relation has {role} but no {counterpart}")]
    MissingCounterpart {
        /// Role that is present.
        role: RelationRole,
        /// Role that is missing.
        counterpart: RelationRole,
    },

    /// Peer mixed with provider/requirer, or more than two sides.
    #[error("relation with mixed peer, provider, and requirer roles")]
    MixedRoles,

    /// Provider and requirer reference the same service.
    #[error("provider and requirer keys must not be the same (both {service:?})")]
    SameService {
        /// The service referenced by both sides.
        service: String,
    },

    /// Another relation already exposes exactly the same endpoints.
    #[error("relation endpoints collide with existing relation {existing:?}")]
    DuplicateEndpoints {
        /// Key of the relation with the same endpoint signature.
        existing: String,
    },
}

/// A relation lookup by endpoints found nothing.
///
/// Carries the endpoints so callers can render a message that depends on
/// how many were supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoRelationFound {
    /// The endpoints that were searched for.
    pub endpoints: Vec<RelationEndpoint>,
}

impl fmt::Display for NoRelationFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.endpoints.as_slice() {
            [only] => write!(f, "no peer relation for {only}"),
            [first, second] => write!(f, "no relation between {first} and {second}"),
            other => write!(f, "no relation for {} endpoints", other.len()),
        }
    }
}

impl std::error::Error for NoRelationFound {}

/// Errors that can occur during topology operations.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// An entity with this key already exists.
    #[error("{kind} {key:?} already exists")]
    DuplicateKey {
        /// Kind of entity.
        kind: EntityKind,
        /// Conflicting key.
        key: String,
    },

    /// A referenced entity does not exist.
    #[error("{kind} {key:?} not found")]
    NotFound {
        /// Kind of entity.
        kind: EntityKind,
        /// Missing key (or name, for lookups by name).
        key: String,
    },

    /// The service name is already used by another service.
    #[error("service name {name:?} already in use by service {service:?}")]
    NameInUse {
        /// Requested name.
        name: String,
        /// Key of the service holding the name.
        service: String,
    },

    /// The relation failed structural validation.
    #[error("invalid relation: {0}")]
    InvalidRelation(#[from] RelationViolation),

    /// The unit already has a machine.
    #[error("unit {unit} already assigned to machine {machine:?}")]
    AlreadyAssigned {
        /// The unit.
        unit: UnitKey,
        /// Its current machine.
        machine: String,
    },

    /// The unit has no machine.
    #[error("unit {unit} not assigned to a machine")]
    NotAssigned {
        /// The unit.
        unit: UnitKey,
    },

    /// The entity is still referenced and cannot be removed.
    #[error("cannot remove {kind} {key:?}: {reason}")]
    InUse {
        /// Kind of entity.
        kind: EntityKind,
        /// Key of the entity.
        key: String,
        /// What still references it.
        reason: String,
    },

    /// A key does not have the expected shape.
    #[error("malformed {kind} key {key:?}")]
    MalformedKey {
        /// Kind of entity.
        kind: EntityKind,
        /// The key.
        key: String,
    },

    /// No relation matches the supplied endpoints.
    #[error(transparent)]
    NoRelationFound(#[from] NoRelationFound),

    /// The caller broke an API contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The stored document has an unsupported schema version.
    #[error("incompatible topology versions: got {found}, want {expected}")]
    VersionMismatch {
        /// Version found in the document.
        found: i64,
        /// Version this build supports.
        expected: u32,
    },

    /// The stored document could not be decoded or encoded.
    #[error("malformed topology document: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },

    /// The coordination store failed.
    #[error(transparent)]
    Storage(#[from] ensemble_core::Error),

    /// Every permitted attempt lost the compare-and-swap race.
    #[error("topology update lost CAS race after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },
}

impl TopologyError {
    pub(crate) fn duplicate(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            kind,
            key: key.into(),
        }
    }

    pub(crate) fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Returns true for errors raised by an Entity Graph invariant check.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateKey { .. }
                | Self::NotFound { .. }
                | Self::NameInUse { .. }
                | Self::InvalidRelation(_)
                | Self::AlreadyAssigned { .. }
                | Self::NotAssigned { .. }
                | Self::InUse { .. }
                | Self::MalformedKey { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_relation_found_renders_by_endpoint_count() {
        let peer = RelationEndpoint::new(RelationRole::Peer, "cluster", "ring");
        let err = NoRelationFound {
            endpoints: vec![peer],
        };
        assert_eq!(err.to_string(), "no peer relation for cluster:ring (peer)");

        let err = NoRelationFound {
            endpoints: vec![
                RelationEndpoint::new(RelationRole::Requirer, "mysql", "db"),
                RelationEndpoint::new(RelationRole::Provider, "mysql", "server"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "no relation between mysql:db (requirer) and mysql:server (provider)"
        );
    }

    #[test]
    fn structural_classification() {
        assert!(TopologyError::duplicate(EntityKind::Machine, "m-0").is_structural());
        assert!(TopologyError::from(RelationViolation::EmptyInterface).is_structural());
        assert!(
            !TopologyError::VersionMismatch {
                found: 2,
                expected: 1
            }
            .is_structural()
        );
        assert!(!TopologyError::RetriesExhausted { attempts: 3 }.is_structural());
    }

    #[test]
    fn messages_name_the_entity() {
        let err = TopologyError::not_found(EntityKind::Service, "svc-9");
        assert_eq!(err.to_string(), "service \"svc-9\" not found");

        let err = TopologyError::InvalidRelation(RelationViolation::MissingCounterpart {
            role: RelationRole::Provider,
            counterpart: RelationRole::Requirer,
        });
        assert_eq!(
            err.to_string(),
            "invalid relation: relation has provider but no requirer"
        );
    }
}
