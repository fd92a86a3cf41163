//! Deploys a two-service application into an in-memory topology store.
//!
//! Run with `cargo run -p ensemble-topology --example basic_usage`.

use std::sync::Arc;

use ensemble_core::{MemoryBackend, init_logging};
use ensemble_topology::prelude::*;
use ensemble_topology::{StoreConfig, metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = StoreConfig::from_env()?;
    init_logging(config.log_format);
    metrics::register_metrics();

    let store = TopologyStore::from_config(Arc::new(MemoryBackend::new()), &config);

    store
        .update(|topology| {
            topology.add_machine("machine-0")?;
            topology.add_machine("machine-1")?;
            topology.add_service("service-0", "wordpress")?;
            topology.add_service("service-1", "mysql")?;

            for (service, machine) in [("service-0", "machine-0"), ("service-1", "machine-1")] {
                let unit = UnitKey::new(service, "unit-0000000000");
                topology.add_unit(&unit)?;
                topology.assign_unit_to_machine(&unit, machine)?;
            }

            topology.add_relation(
                "relation-0",
                Relation::provider_requirer(
                    "mysql",
                    RelationSide::new("service-1", "server"),
                    RelationSide::new("service-0", "db"),
                ),
            )
        })
        .await?;

    let topology = store.read().await?;
    for service in topology.service_keys() {
        for unit in topology.unit_keys(&service)? {
            println!(
                "{} -> {}",
                topology.unit_name(&unit)?,
                topology.unit_machine_key(&unit)?
            );
        }
    }

    let relation = topology.relation_key(&[
        RelationEndpoint::new(RelationRole::Provider, "mysql", "server"),
        RelationEndpoint::new(RelationRole::Requirer, "mysql", "db"),
    ])?;
    println!("mysql relation: {relation}");
    println!("revision: {:?}", store.revision().await?);

    Ok(())
}
