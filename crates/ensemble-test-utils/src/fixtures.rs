//! Pre-built stored documents for common test scenarios.
//!
//! Builders produce the raw bytes a coordination store would hold, so tests
//! can seed a backend with states (including invalid ones) that the typed
//! API refuses to construct.

use bytes::Bytes;
use serde_json::{Map, Value, json};

/// Default document path used by tests.
pub const TEST_DOCUMENT_PATH: &str = "/topology";

/// Builder for raw topology documents.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    version: u32,
    machines: Map<String, Value>,
    services: Map<String, Value>,
    relations: Map<String, Value>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// Creates an empty version 1 document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: 1,
            machines: Map::new(),
            services: Map::new(),
            relations: Map::new(),
        }
    }

    /// Overrides the schema version.
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Adds a machine.
    #[must_use]
    pub fn machine(mut self, key: &str) -> Self {
        self.machines.insert(key.to_string(), json!({}));
        self
    }

    /// Adds a service with no units.
    #[must_use]
    pub fn service(mut self, key: &str, name: &str) -> Self {
        self.services
            .insert(key.to_string(), json!({ "name": name, "units": {} }));
        self
    }

    /// Adds a unit to an existing service; an empty `machine` leaves it
    /// unassigned.
    #[must_use]
    pub fn unit(mut self, service: &str, unit: &str, machine: &str) -> Self {
        let entry = self
            .services
            .get_mut(service)
            .expect("service added before its units");
        entry["units"][unit] = json!({ "machine": machine });
        self
    }

    /// Adds a provider/requirer relation.
    #[must_use]
    pub fn relation(
        mut self,
        key: &str,
        interface: &str,
        provider: (&str, &str),
        requirer: (&str, &str),
    ) -> Self {
        self.relations.insert(
            key.to_string(),
            json!({
                "interface": interface,
                "scope": "global",
                "services": {
                    "provider": { "service": provider.0, "relation-name": provider.1 },
                    "requirer": { "service": requirer.0, "relation-name": requirer.1 },
                }
            }),
        );
        self
    }

    /// Adds a peer relation.
    #[must_use]
    pub fn peer_relation(mut self, key: &str, interface: &str, peer: (&str, &str)) -> Self {
        self.relations.insert(
            key.to_string(),
            json!({
                "interface": interface,
                "scope": "global",
                "services": {
                    "peer": { "service": peer.0, "relation-name": peer.1 },
                }
            }),
        );
        self
    }

    /// Serializes the document.
    #[must_use]
    pub fn build(self) -> Bytes {
        let document = json!({
            "version": self.version,
            "machines": self.machines,
            "services": self.services,
            "relations": self.relations,
        });
        Bytes::from(serde_json::to_vec(&document).expect("serialize document"))
    }
}

/// Bytes that are not a topology document.
#[must_use]
pub fn corrupt_document() -> Bytes {
    Bytes::from_static(b"{\"version\": 1, \"machines\": [")
}

/// The wordpress/mysql deployment used across scenario tests.
///
/// Two services, one unit each on its own machine, related over `mysql`.
#[must_use]
pub fn wordpress_deployment() -> DocumentBuilder {
    DocumentBuilder::new()
        .machine("machine-0")
        .machine("machine-1")
        .service("service-0", "wordpress")
        .service("service-1", "mysql")
        .unit("service-0", "unit-0", "machine-0")
        .unit("service-1", "unit-0", "machine-1")
        .relation(
            "relation-0",
            "mysql",
            ("service-1", "server"),
            ("service-0", "db"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_emits_wire_layout() {
        let bytes = DocumentBuilder::new()
            .machine("m-0")
            .service("s-0", "web")
            .unit("s-0", "u-0", "")
            .build();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["machines"]["m-0"], json!({}));
        assert_eq!(value["services"]["s-0"]["name"], "web");
        assert_eq!(value["services"]["s-0"]["units"]["u-0"]["machine"], "");
    }

    #[test]
    fn corrupt_document_does_not_parse() {
        assert!(serde_json::from_slice::<Value>(&corrupt_document()).is_err());
    }
}
