//! In-memory entity graph over a topology [`Document`].
//!
//! [`Topology`] owns exactly one decoded document and enforces every
//! cross-entity invariant on mutation:
//!
//! - Machine keys, service keys, and relation keys are unique in their
//!   collection; unit keys are unique within their owning service
//! - Service names are unique across services (secondary index)
//! - A machine cannot be removed while a unit is assigned to it
//! - A service cannot be removed while a relation references it
//! - Relations are validated once, on insertion, and are immutable after
//!
//! Operations never block and never touch storage. Each optimistic update
//! cycle decodes a fresh `Topology`; one is never reused across cycles.

use std::collections::{BTreeMap, HashMap};

use crate::error::{EntityKind, RelationViolation, Result, TopologyError};
use crate::matcher;
use crate::model::{
    Document, Machine, Relation, RelationEndpoint, Service, Unit, UnitKey,
};

/// The topology entity graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Topology {
    document: Document,
    /// Service name -> service key.
    names: HashMap<String, String>,
}

impl Topology {
    /// Creates an empty topology at the current schema version.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the underlying document.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Consumes the topology, returning the underlying document.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Returns the schema version of the document.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.document.version
    }

    // ------------------------------------------------------------------
    // Machines
    // ------------------------------------------------------------------

    /// Adds a machine.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if the machine already exists.
    pub fn add_machine(&mut self, key: &str) -> Result<()> {
        if self.has_machine(key) {
            return Err(TopologyError::duplicate(EntityKind::Machine, key));
        }
        self.document.machines.insert(key.to_string(), Machine {});
        Ok(())
    }

    /// Removes a machine that has no units assigned.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the machine is absent and `InUse` if any unit
    /// is assigned to it.
    pub fn remove_machine(&mut self, key: &str) -> Result<()> {
        self.assert_machine(key)?;
        if let Some(unit) = self.first_unit_on(key) {
            return Err(TopologyError::InUse {
                kind: EntityKind::Machine,
                key: key.to_string(),
                reason: format!("unit {unit} is assigned to it"),
            });
        }
        self.document.machines.remove(key);
        Ok(())
    }

    /// Returns all machine keys, sorted.
    #[must_use]
    pub fn machine_keys(&self) -> Vec<String> {
        self.document.machines.keys().cloned().collect()
    }

    /// Returns whether a machine with `key` exists.
    #[must_use]
    pub fn has_machine(&self, key: &str) -> bool {
        self.document.machines.contains_key(key)
    }

    /// Returns whether any unit is assigned to the machine.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the machine is absent.
    pub fn machine_has_units(&self, key: &str) -> Result<bool> {
        self.assert_machine(key)?;
        Ok(self.first_unit_on(key).is_some())
    }

    // Scans every unit of every service; topology size is bounded by
    // cluster scale.
    fn first_unit_on(&self, machine: &str) -> Option<UnitKey> {
        self.document
            .services
            .iter()
            .flat_map(|(service_key, service)| {
                service
                    .units
                    .iter()
                    .map(move |(unit_key, unit)| (service_key, unit_key, unit))
            })
            .find(|(_, _, unit)| unit.machine.as_deref() == Some(machine))
            .map(|(service_key, unit_key, _)| UnitKey::new(service_key, unit_key))
    }

    // ------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------

    /// Adds a service with a unique name.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if the key exists and `NameInUse` if another
    /// service already has `name`.
    pub fn add_service(&mut self, key: &str, name: &str) -> Result<()> {
        if self.has_service(key) {
            return Err(TopologyError::duplicate(EntityKind::Service, key));
        }
        if let Some(holder) = self.names.get(name) {
            return Err(TopologyError::NameInUse {
                name: name.to_string(),
                service: holder.clone(),
            });
        }
        self.document
            .services
            .insert(key.to_string(), Service::new(name));
        self.names.insert(name.to_string(), key.to_string());
        Ok(())
    }

    /// Removes a service that participates in no relation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the service is absent and `InUse` if a
    /// relation references it.
    pub fn remove_service(&mut self, key: &str) -> Result<()> {
        self.assert_service(key)?;
        if let Some((relation_key, _)) = self
            .document
            .relations
            .iter()
            .find(|(_, relation)| relation.involves(key))
        {
            return Err(TopologyError::InUse {
                kind: EntityKind::Service,
                key: key.to_string(),
                reason: format!("relation {relation_key:?} references it"),
            });
        }
        if let Some(service) = self.document.services.remove(key) {
            self.names.remove(&service.name);
        }
        Ok(())
    }

    /// Returns whether a service with `key` exists.
    #[must_use]
    pub fn has_service(&self, key: &str) -> bool {
        self.document.services.contains_key(key)
    }

    /// Returns all service keys, sorted.
    #[must_use]
    pub fn service_keys(&self) -> Vec<String> {
        self.document.services.keys().cloned().collect()
    }

    /// Returns the key of the service called `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no service has that name.
    pub fn service_key(&self, name: &str) -> Result<String> {
        self.names
            .get(name)
            .cloned()
            .ok_or_else(|| TopologyError::not_found(EntityKind::Service, name))
    }

    /// Returns the name of the service with `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the service is absent.
    pub fn service_name(&self, key: &str) -> Result<&str> {
        self.service(key).map(|service| service.name.as_str())
    }

    fn service(&self, key: &str) -> Result<&Service> {
        self.document
            .services
            .get(key)
            .ok_or_else(|| TopologyError::not_found(EntityKind::Service, key))
    }

    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    /// Adds an unassigned unit to a service.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the service is absent and `DuplicateKey` if
    /// the service already has this unit.
    pub fn add_unit(&mut self, key: &UnitKey) -> Result<()> {
        let service = self
            .document
            .services
            .get_mut(&key.service)
            .ok_or_else(|| TopologyError::not_found(EntityKind::Service, &key.service))?;
        if service.units.contains_key(&key.unit) {
            return Err(TopologyError::duplicate(EntityKind::Unit, key.to_string()));
        }
        service.units.insert(key.unit.clone(), Unit::default());
        Ok(())
    }

    /// Removes a unit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the service or unit is absent.
    pub fn remove_unit(&mut self, key: &UnitKey) -> Result<()> {
        self.unit_mut(key)?;
        if let Some(service) = self.document.services.get_mut(&key.service) {
            service.units.remove(&key.unit);
        }
        Ok(())
    }

    /// Returns whether the unit exists.
    #[must_use]
    pub fn has_unit(&self, key: &UnitKey) -> bool {
        self.unit(key).is_ok()
    }

    /// Returns the keys of all units of a service, sorted by unit key.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the service is absent.
    pub fn unit_keys(&self, service: &str) -> Result<Vec<UnitKey>> {
        Ok(self
            .service(service)?
            .units
            .keys()
            .map(|unit| UnitKey::new(service, unit))
            .collect())
    }

    /// Returns the display name of a unit: `<service name>/<sequence>`.
    ///
    /// The sequence is the integer following the last `-` of the unit key
    /// (`unit-0000000007` becomes `7`).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the unit is absent and `MalformedKey` if the
    /// unit key carries no sequence number.
    pub fn unit_name(&self, key: &UnitKey) -> Result<String> {
        self.unit(key)?;
        let name = self.service_name(&key.service)?;
        let suffix = key.unit.rsplit('-').next().unwrap_or_default();
        let sequence: u64 = suffix.parse().map_err(|_| TopologyError::MalformedKey {
            kind: EntityKind::Unit,
            key: key.unit.clone(),
        })?;
        Ok(format!("{name}/{sequence}"))
    }

    /// Returns the machine a unit is assigned to.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the unit is absent and `NotAssigned` if it has
    /// no machine.
    pub fn unit_machine_key(&self, key: &UnitKey) -> Result<&str> {
        self.unit(key)?
            .machine
            .as_deref()
            .ok_or_else(|| TopologyError::NotAssigned { unit: key.clone() })
    }

    /// Assigns an unassigned unit to a machine.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the unit or machine is absent and
    /// `AlreadyAssigned` if the unit already has a machine.
    pub fn assign_unit_to_machine(&mut self, key: &UnitKey, machine: &str) -> Result<()> {
        self.unit(key)?;
        self.assert_machine(machine)?;
        let unit = self.unit_mut(key)?;
        if let Some(current) = &unit.machine {
            return Err(TopologyError::AlreadyAssigned {
                unit: key.clone(),
                machine: current.clone(),
            });
        }
        unit.machine = Some(machine.to_string());
        Ok(())
    }

    /// Clears the machine assignment of a unit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the unit is absent and `NotAssigned` if it has
    /// no machine.
    pub fn unassign_unit_from_machine(&mut self, key: &UnitKey) -> Result<()> {
        let unit = self.unit_mut(key)?;
        if unit.machine.take().is_none() {
            return Err(TopologyError::NotAssigned { unit: key.clone() });
        }
        Ok(())
    }

    fn unit(&self, key: &UnitKey) -> Result<&Unit> {
        self.service(&key.service)?
            .units
            .get(&key.unit)
            .ok_or_else(|| TopologyError::not_found(EntityKind::Unit, key.to_string()))
    }

    fn unit_mut(&mut self, key: &UnitKey) -> Result<&mut Unit> {
        self.document
            .services
            .get_mut(&key.service)
            .ok_or_else(|| TopologyError::not_found(EntityKind::Service, &key.service))?
            .units
            .get_mut(&key.unit)
            .ok_or_else(|| TopologyError::not_found(EntityKind::Unit, key.to_string()))
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    /// Adds a relation after validating it.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey` if the relation key is taken
    /// - `InvalidRelation` if the relation is structurally invalid, or if
    ///   another relation already has the same endpoint signature
    /// - `NotFound` if a side references a missing service
    pub fn add_relation(&mut self, key: &str, relation: Relation) -> Result<()> {
        if self.document.relations.contains_key(key) {
            return Err(TopologyError::duplicate(EntityKind::Relation, key));
        }
        matcher::validate(&relation)?;
        for side in relation.services.values() {
            self.assert_service(&side.service)?;
        }
        let signature = matcher::signature(&relation);
        if let Some((existing, _)) = self
            .document
            .relations
            .iter()
            .find(|(_, other)| matcher::signature(other) == signature)
        {
            return Err(RelationViolation::DuplicateEndpoints {
                existing: existing.clone(),
            }
            .into());
        }
        self.document.relations.insert(key.to_string(), relation);
        Ok(())
    }

    /// Removes a relation if present. Absent keys are not an error.
    pub fn remove_relation(&mut self, key: &str) {
        self.document.relations.remove(key);
    }

    /// Returns the relation with `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the relation is absent.
    pub fn relation(&self, key: &str) -> Result<&Relation> {
        self.document
            .relations
            .get(key)
            .ok_or_else(|| TopologyError::not_found(EntityKind::Relation, key))
    }

    /// Returns all relation keys, sorted.
    #[must_use]
    pub fn relation_keys(&self) -> Vec<String> {
        self.document.relations.keys().cloned().collect()
    }

    /// Returns every relation the service participates in.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the service is absent.
    pub fn relations_for_service(&self, service: &str) -> Result<BTreeMap<String, Relation>> {
        self.assert_service(service)?;
        Ok(self
            .document
            .relations
            .iter()
            .filter(|(_, relation)| relation.involves(service))
            .map(|(key, relation)| (key.clone(), relation.clone()))
            .collect())
    }

    /// Returns the key of the relation established between `endpoints`.
    ///
    /// # Errors
    ///
    /// Returns `NoRelationFound` if nothing matches and `InvalidArgument`
    /// unless one or two endpoints are given.
    pub fn relation_key(&self, endpoints: &[RelationEndpoint]) -> Result<String> {
        matcher::resolve_relation_key(&self.document.relations, endpoints)
    }

    // ------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------

    fn assert_machine(&self, key: &str) -> Result<()> {
        if self.has_machine(key) {
            Ok(())
        } else {
            Err(TopologyError::not_found(EntityKind::Machine, key))
        }
    }

    fn assert_service(&self, key: &str) -> Result<()> {
        self.service(key).map(|_| ())
    }
}

impl TryFrom<Document> for Topology {
    type Error = TopologyError;

    /// Wraps a document, rebuilding the service name index.
    ///
    /// Fails with `Malformed` if two services share a name.
    fn try_from(document: Document) -> Result<Self> {
        let mut names = HashMap::with_capacity(document.services.len());
        for (key, service) in &document.services {
            if let Some(previous) = names.insert(service.name.clone(), key.clone()) {
                return Err(TopologyError::Malformed {
                    message: format!(
                        "services {previous:?} and {key:?} share the name {:?}",
                        service.name
                    ),
                });
            }
        }
        Ok(Self { document, names })
    }
}
