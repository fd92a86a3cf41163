//! Relation structure checks and endpoint-based relation lookup.
//!
//! Everything here is a pure function over relation values; the Entity Graph
//! calls in for validation and lookup but this module never mutates.

use std::collections::BTreeMap;

use crate::error::{NoRelationFound, RelationViolation, Result, TopologyError};
use crate::model::{Relation, RelationEndpoint, RelationRole};

/// Checks the structural rules every relation must satisfy on its own.
///
/// Cross-entity rules (referenced services exist, endpoint signature is
/// unique) are checked by `Topology::add_relation`.
///
/// # Errors
///
/// Returns the first [`RelationViolation`] found.
pub fn validate(relation: &Relation) -> std::result::Result<(), RelationViolation> {
    if relation.interface.is_empty() {
        return Err(RelationViolation::EmptyInterface);
    }
    if relation.services.is_empty() {
        return Err(RelationViolation::NoServices);
    }
    if relation.services.len() > 2
        || (relation.services.contains_key(&RelationRole::Peer) && relation.services.len() > 1)
    {
        return Err(RelationViolation::MixedRoles);
    }
    for (&role, side) in &relation.services {
        if side.service.is_empty() {
            return Err(RelationViolation::EmptyServiceKey { role });
        }
        if side.relation_name.is_empty() {
            return Err(RelationViolation::EmptyRelationName { role });
        }
        let counterpart = role.counterpart();
        if !relation.services.contains_key(&counterpart) {
            return Err(RelationViolation::MissingCounterpart { role, counterpart });
        }
    }
    if let (Some(provider), Some(requirer)) = (
        relation.services.get(&RelationRole::Provider),
        relation.services.get(&RelationRole::Requirer),
    ) {
        if provider.service == requirer.service {
            return Err(RelationViolation::SameService {
                service: provider.service.clone(),
            });
        }
    }
    Ok(())
}

/// Identity of a relation as seen by endpoint lookup.
///
/// Two relations with equal signatures would be indistinguishable to
/// [`resolve_relation_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSignature<'a> {
    interface: &'a str,
    sides: Vec<(RelationRole, &'a str)>,
}

/// Computes the endpoint signature of a relation.
#[must_use]
pub fn signature(relation: &Relation) -> EndpointSignature<'_> {
    // BTreeMap iteration keeps `sides` in role order.
    EndpointSignature {
        interface: &relation.interface,
        sides: relation
            .services
            .iter()
            .map(|(&role, side)| (role, side.relation_name.as_str()))
            .collect(),
    }
}

/// Finds the key of the relation whose structure matches every endpoint.
///
/// One endpoint matches any relation exposing a side with that role and
/// relation name under that interface (peer lookups). Two endpoints must
/// share an interface and both must match sides of the same relation.
/// Relations are scanned in key order, so the first match is stable.
///
/// # Errors
///
/// - [`TopologyError::InvalidArgument`] unless exactly one or two endpoints
///   are supplied
/// - [`TopologyError::NoRelationFound`] if nothing matches, including when
///   two endpoints name different interfaces
pub fn resolve_relation_key(
    relations: &BTreeMap<String, Relation>,
    endpoints: &[RelationEndpoint],
) -> Result<String> {
    let interface = match endpoints {
        [only] => &only.interface,
        [first, second] => {
            if first.interface != second.interface {
                return Err(no_relation(endpoints));
            }
            &first.interface
        }
        _ => {
            return Err(TopologyError::InvalidArgument(format!(
                "illegal number of relation endpoints provided: {}",
                endpoints.len()
            )));
        }
    };

    relations
        .iter()
        .find(|(_, relation)| {
            relation.interface == *interface
                && endpoints.iter().all(|endpoint| {
                    relation
                        .services
                        .get(&endpoint.role)
                        .is_some_and(|side| side.relation_name == endpoint.relation_name)
                })
        })
        .map(|(key, _)| key.clone())
        .ok_or_else(|| no_relation(endpoints))
}

fn no_relation(endpoints: &[RelationEndpoint]) -> TopologyError {
    TopologyError::NoRelationFound(NoRelationFound {
        endpoints: endpoints.to_vec(),
    })
}
