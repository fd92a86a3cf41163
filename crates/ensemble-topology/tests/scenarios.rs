//! End-to-end scenarios run through the store, each step its own update.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use ensemble_core::storage::MemoryBackend;
use ensemble_test_utils::{
    DocumentBuilder, TEST_DOCUMENT_PATH, TracingMemoryBackend, wordpress_deployment,
};
use ensemble_topology::{
    EntityKind, Relation, RelationEndpoint, RelationRole, RelationScope, RelationSide,
    RelationViolation, TopologyError, TopologyStore, UnitKey,
};

fn memory_store() -> TopologyStore {
    TopologyStore::new(Arc::new(MemoryBackend::new()), TEST_DOCUMENT_PATH)
}

#[tokio::test]
async fn unit_lifecycle() {
    let store = memory_store();
    let u0 = UnitKey::new("svc-a", "u0");

    store
        .update(|t| {
            t.add_machine("m1")?;
            t.add_service("svc-a", "wordpress")
        })
        .await
        .unwrap();
    store.update(|t| t.add_unit(&u0)).await.unwrap();
    store
        .update(|t| t.assign_unit_to_machine(&u0, "m1"))
        .await
        .unwrap();

    let err = store
        .update(|t| t.assign_unit_to_machine(&u0, "m1"))
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::AlreadyAssigned { .. }));

    let err = store.update(|t| t.remove_machine("m1")).await.unwrap_err();
    assert!(matches!(
        err,
        TopologyError::InUse {
            kind: EntityKind::Machine,
            ..
        }
    ));

    store
        .update(|t| t.unassign_unit_from_machine(&u0))
        .await
        .unwrap();
    store.update(|t| t.remove_machine("m1")).await.unwrap();

    let topology = store.read().await.unwrap();
    assert!(topology.machine_keys().is_empty());
    assert!(topology.has_unit(&u0));
}

#[tokio::test]
async fn endpoint_resolution() {
    let store = memory_store();
    store
        .update(|t| {
            t.add_service("svc-a", "apache")?;
            t.add_service("svc-b", "haproxy")?;
            t.add_relation(
                "relation-0",
                Relation::provider_requirer(
                    "http",
                    RelationSide::new("svc-a", "website"),
                    RelationSide::new("svc-b", "website"),
                ),
            )
        })
        .await
        .unwrap();

    let topology = store.read().await.unwrap();
    let key = topology
        .relation_key(&[
            RelationEndpoint::new(RelationRole::Requirer, "http", "website"),
            RelationEndpoint::new(RelationRole::Provider, "http", "website"),
        ])
        .unwrap();
    assert_eq!(key, "relation-0");

    let err = topology
        .relation_key(&[
            RelationEndpoint::new(RelationRole::Requirer, "mysql", "website"),
            RelationEndpoint::new(RelationRole::Provider, "mysql", "website"),
        ])
        .unwrap_err();
    assert!(matches!(err, TopologyError::NoRelationFound(_)));
}

#[tokio::test]
async fn seeded_peer_cluster() {
    let backend = TracingMemoryBackend::new();
    backend.seed(
        TEST_DOCUMENT_PATH,
        DocumentBuilder::new()
            .service("service-0", "cassandra")
            .service("service-1", "cassandra-backup")
            .peer_relation("relation-0", "cassandra", ("service-0", "ring"))
            .build(),
    );
    let store = TopologyStore::new(Arc::new(backend.clone()), TEST_DOCUMENT_PATH);

    let topology = store.read().await.unwrap();
    let ring = [RelationEndpoint::new(RelationRole::Peer, "cassandra", "ring")];
    assert_eq!(topology.relation_key(&ring).unwrap(), "relation-0");
    let relation = topology.relation("relation-0").unwrap();
    assert_eq!(relation.scope, RelationScope::Global);
    assert_eq!(
        relation.services.get(&RelationRole::Peer),
        Some(&RelationSide::new("service-0", "ring"))
    );

    let err = store
        .update(|t| {
            t.add_relation(
                "relation-1",
                Relation::peer("cassandra", RelationSide::new("service-1", "ring")),
            )
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TopologyError::InvalidRelation(RelationViolation::DuplicateEndpoints { ref existing })
            if existing == "relation-0"
    ));

    let err = store
        .update(|t| t.remove_service("service-0"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TopologyError::InUse {
            kind: EntityKind::Service,
            ..
        }
    ));

    store
        .update(|t| {
            t.remove_relation("relation-0");
            t.remove_service("service-0")
        })
        .await
        .unwrap();
    let topology = store.read().await.unwrap();
    assert!(topology.relation_key(&ring).is_err());
    assert_eq!(topology.service_keys(), vec!["service-1"]);
}

#[tokio::test]
async fn duplicate_service_name_rejected_across_updates() {
    let store = memory_store();
    store
        .update(|t| t.add_service("svc-a", "web"))
        .await
        .unwrap();

    let err = store
        .update(|t| t.add_service("svc-b", "web"))
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::NameInUse { .. }));
}

#[tokio::test]
async fn invalid_relations_rejected() {
    let store = memory_store();
    store
        .update(|t| {
            t.add_service("svc-a", "wordpress")?;
            t.add_service("svc-b", "mysql")
        })
        .await
        .unwrap();

    let err = store
        .update(|t| {
            t.add_relation(
                "relation-0",
                Relation::new("mysql", RelationScope::Global).with_side(
                    RelationRole::Provider,
                    RelationSide::new("svc-b", "server"),
                ),
            )
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TopologyError::InvalidRelation(RelationViolation::MissingCounterpart { .. })
    ));

    let err = store
        .update(|t| {
            t.add_relation(
                "relation-0",
                Relation::provider_requirer(
                    "mysql",
                    RelationSide::new("svc-b", "server"),
                    RelationSide::new("svc-b", "db"),
                ),
            )
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TopologyError::InvalidRelation(RelationViolation::SameService { .. })
    ));

    assert!(store.read().await.unwrap().relation_keys().is_empty());
}

#[tokio::test]
async fn teardown_of_seeded_deployment() {
    let backend = TracingMemoryBackend::new();
    backend.seed(TEST_DOCUMENT_PATH, wordpress_deployment().build());
    let store = TopologyStore::new(Arc::new(backend.clone()), TEST_DOCUMENT_PATH);

    let topology = store.read().await.unwrap();
    assert_eq!(topology.service_key("mysql").unwrap(), "service-1");
    assert_eq!(
        topology
            .relations_for_service("service-0")
            .unwrap()
            .keys()
            .collect::<Vec<_>>(),
        vec!["relation-0"]
    );

    let err = store
        .update(|t| t.remove_service("service-1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TopologyError::InUse {
            kind: EntityKind::Service,
            ..
        }
    ));

    store
        .update(|t| {
            t.remove_relation("relation-0");
            t.remove_relation("relation-0");
            for service in t.service_keys() {
                for unit in t.unit_keys(&service)? {
                    t.unassign_unit_from_machine(&unit)?;
                    t.remove_unit(&unit)?;
                }
                t.remove_service(&service)?;
            }
            for machine in t.machine_keys() {
                t.remove_machine(&machine)?;
            }
            Ok(())
        })
        .await
        .unwrap();

    let topology = store.read().await.unwrap();
    assert!(topology.service_keys().is_empty());
    assert!(topology.machine_keys().is_empty());
    assert!(topology.relation_keys().is_empty());
    assert!(topology.service_key("wordpress").is_err());
}
