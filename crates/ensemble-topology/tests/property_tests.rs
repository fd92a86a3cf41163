//! Property-based tests for topology invariants.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated operation sequences.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;

use proptest::prelude::*;

use ensemble_topology::codec::{decode, encode};
use ensemble_topology::{
    EntityKind, Relation, RelationRole, RelationScope, RelationSide, Topology, TopologyError,
    UnitKey,
};

#[derive(Debug, Clone)]
enum MachineOp {
    Add(u8),
    Remove(u8),
    Assign(u8),
    Unassign,
}

fn arb_machine_op() -> impl Strategy<Value = MachineOp> {
    prop_oneof![
        4 => (0u8..6).prop_map(MachineOp::Add),
        3 => (0u8..6).prop_map(MachineOp::Remove),
        1 => (0u8..6).prop_map(MachineOp::Assign),
        1 => Just(MachineOp::Unassign),
    ]
}

#[derive(Debug, Clone)]
enum GraphOp {
    Machine(u8),
    Service(u8),
    Unit(u8, u8),
    Assign(u8, u8, u8),
    Relate(u8, u8, RelationScope),
    Peer(u8),
}

fn arb_graph_op() -> impl Strategy<Value = GraphOp> {
    prop_oneof![
        (0u8..4).prop_map(GraphOp::Machine),
        (0u8..4).prop_map(GraphOp::Service),
        (0u8..4, 0u8..3).prop_map(|(s, u)| GraphOp::Unit(s, u)),
        (0u8..4, 0u8..3, 0u8..4).prop_map(|(s, u, m)| GraphOp::Assign(s, u, m)),
        (0u8..4, 0u8..4, arb_scope()).prop_map(|(a, b, scope)| GraphOp::Relate(a, b, scope)),
        (0u8..4).prop_map(GraphOp::Peer),
    ]
}

fn arb_scope() -> impl Strategy<Value = RelationScope> {
    prop_oneof![Just(RelationScope::Global), Just(RelationScope::Container)]
}

fn machine(i: u8) -> String {
    format!("machine-{i}")
}

fn service(i: u8) -> String {
    format!("service-{i}")
}

/// Applies an operation, ignoring structural rejections.
fn apply(topology: &mut Topology, op: &GraphOp, relations: &mut u32) {
    let result = match op {
        GraphOp::Machine(m) => topology.add_machine(&machine(*m)),
        GraphOp::Service(s) => topology.add_service(&service(*s), &format!("name-{s}")),
        GraphOp::Unit(s, u) => topology.add_unit(&UnitKey::new(service(*s), format!("unit-{u}"))),
        GraphOp::Assign(s, u, m) => topology
            .assign_unit_to_machine(&UnitKey::new(service(*s), format!("unit-{u}")), &machine(*m)),
        GraphOp::Relate(a, b, scope) => topology.add_relation(
            &format!("relation-{relations}"),
            Relation::new("http", *scope)
                .with_side(
                    RelationRole::Provider,
                    RelationSide::new(service(*a), format!("site-{a}")),
                )
                .with_side(
                    RelationRole::Requirer,
                    RelationSide::new(service(*b), format!("proxy-{b}")),
                ),
        ),
        GraphOp::Peer(s) => topology.add_relation(
            &format!("relation-{relations}"),
            Relation::peer("cluster", RelationSide::new(service(*s), "ring")),
        ),
    };
    if result.is_ok() && matches!(op, GraphOp::Relate(..) | GraphOp::Peer(_)) {
        *relations += 1;
    }
}

proptest! {
    /// A machine is present iff it was added and not yet removed, and a
    /// machine hosting a unit can never be removed.
    #[test]
    fn machine_presence_tracks_add_and_remove(
        ops in prop::collection::vec(arb_machine_op(), 0..40)
    ) {
        let mut topology = Topology::new();
        topology.add_service("service-0", "web").unwrap();
        let unit = UnitKey::new("service-0", "unit-0");
        topology.add_unit(&unit).unwrap();

        let mut model: BTreeSet<String> = BTreeSet::new();
        let mut assigned: Option<String> = None;

        for op in ops {
            match op {
                MachineOp::Add(i) => {
                    let key = machine(i);
                    let result = topology.add_machine(&key);
                    if model.insert(key) {
                        prop_assert!(result.is_ok());
                    } else {
                        let is_duplicate = matches!(result, Err(TopologyError::DuplicateKey { .. }));
                        prop_assert!(is_duplicate);
                    }
                }
                MachineOp::Remove(i) => {
                    let key = machine(i);
                    let result = topology.remove_machine(&key);
                    if !model.contains(&key) {
                        let is_not_found = matches!(result, Err(TopologyError::NotFound { .. }));
                        prop_assert!(is_not_found);
                    } else if assigned.as_deref() == Some(key.as_str()) {
                        let in_use = matches!(
                            result,
                            Err(TopologyError::InUse { kind: EntityKind::Machine, .. })
                        );
                        prop_assert!(in_use);
                    } else {
                        prop_assert!(result.is_ok());
                        model.remove(&key);
                    }
                }
                MachineOp::Assign(i) => {
                    let key = machine(i);
                    let result = topology.assign_unit_to_machine(&unit, &key);
                    if assigned.is_none() && model.contains(&key) {
                        prop_assert!(result.is_ok());
                        assigned = Some(key);
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
                MachineOp::Unassign => {
                    let result = topology.unassign_unit_from_machine(&unit);
                    prop_assert_eq!(result.is_ok(), assigned.take().is_some());
                }
            }

            prop_assert_eq!(
                topology.machine_keys(),
                model.iter().cloned().collect::<Vec<_>>()
            );
        }
    }

    /// Decoding an encoded graph yields an observationally equal graph.
    #[test]
    fn codec_round_trip(ops in prop::collection::vec(arb_graph_op(), 0..40)) {
        let mut topology = Topology::new();
        let mut relations = 0;
        for op in &ops {
            apply(&mut topology, op, &mut relations);
        }

        let bytes = encode(&topology).unwrap();
        let decoded = decode(&bytes).unwrap();

        prop_assert_eq!(&decoded, &topology);
        prop_assert_eq!(decoded.machine_keys(), topology.machine_keys());
        prop_assert_eq!(decoded.relation_keys(), topology.relation_keys());
        for key in topology.relation_keys() {
            prop_assert_eq!(
                decoded.relation(&key).unwrap().scope,
                topology.relation(&key).unwrap().scope
            );
        }
        for key in topology.service_keys() {
            prop_assert_eq!(decoded.service_name(&key).unwrap(), topology.service_name(&key).unwrap());
            prop_assert_eq!(decoded.unit_keys(&key).unwrap(), topology.unit_keys(&key).unwrap());
        }
    }

    /// Removing a relation drops only that relation, and removing it again
    /// leaves the graph exactly as the first removal did.
    #[test]
    fn remove_relation_is_idempotent(ops in prop::collection::vec(arb_graph_op(), 0..20)) {
        let mut topology = Topology::new();
        let mut relations = 0;
        for op in &ops {
            apply(&mut topology, op, &mut relations);
        }

        for key in topology.relation_keys() {
            let mut expected = topology.relation_keys();
            expected.retain(|k| k != &key);

            topology.remove_relation(&key);
            let keys = topology.relation_keys();
            let bytes = encode(&topology).unwrap();
            prop_assert_eq!(&keys, &expected);
            prop_assert!(topology.relation(&key).is_err());

            topology.remove_relation(&key);
            prop_assert_eq!(topology.relation_keys(), keys);
            prop_assert_eq!(encode(&topology).unwrap(), bytes);
        }
        prop_assert!(topology.relation_keys().is_empty());
    }
}
