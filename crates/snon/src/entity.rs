//! Entity records and the fixed-capacity entity table.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DuplicatePolicy;
use crate::eid::Eid;
use crate::error::{Error, Result};

/// Entity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityClass {
    Device,
    Sensor,
    Series,
    Measurand,
    Value,
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityClass::Device => write!(f, "device"),
            EntityClass::Sensor => write!(f, "sensor"),
            EntityClass::Series => write!(f, "series"),
            EntityClass::Measurand => write!(f, "measurand"),
            EntityClass::Value => write!(f, "value"),
        }
    }
}

/// A registered entity.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub eid: Eid,
    pub name: String,
    pub class: EntityClass,
    /// Measurand attributes (units, type, aggregation); immutable
    pub metadata: Option<Value>,
    /// Current value tokens; empty for non-value classes
    pub values: Vec<String>,
    /// Store sequence number of the last change
    pub changed_at: u64,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    fn new(name: &str, class: EntityClass, metadata: Option<Value>, sequence: u64) -> Self {
        Self {
            eid: Eid::from_name(name),
            name: name.to_string(),
            class,
            metadata,
            values: Vec::new(),
            changed_at: sequence,
            updated_at: Utc::now(),
        }
    }

    /// Replace the value tokens and stamp the change.
    pub(crate) fn replace_values(&mut self, values: Vec<String>, sequence: u64) {
        self.values = values;
        self.changed_at = sequence;
        self.updated_at = Utc::now();
    }
}

/// Outcome of a successful `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created(Eid),
    /// The name was already registered with the same class
    Existing(Eid),
}

impl Registration {
    pub fn eid(&self) -> Eid {
        match self {
            Self::Created(eid) | Self::Existing(eid) => *eid,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Dense entity array with name and eID indexes.
///
/// Slots are never freed individually; the table only shrinks on `clear`.
#[derive(Debug, Clone)]
pub struct EntityTable {
    slots: Vec<Entity>,
    by_name: HashMap<String, usize>,
    by_eid: HashMap<Eid, usize>,
    capacity: usize,
}

impl EntityTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            by_name: HashMap::with_capacity(capacity),
            by_eid: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Check whether `name` could be registered without touching the table.
    ///
    /// Returns `Some(eid)` when the name already exists and the policy allows
    /// reuse, `None` when a new slot would be taken.
    pub fn check_register(
        &self,
        name: &str,
        class: EntityClass,
        policy: DuplicatePolicy,
    ) -> Result<Option<Eid>> {
        if let Some(&slot) = self.by_name.get(name) {
            let existing = &self.slots[slot];
            if policy == DuplicatePolicy::Reject || existing.class != class {
                return Err(Error::DuplicateEntity(name.to_string()));
            }
            return Ok(Some(existing.eid));
        }

        let eid = Eid::from_name(name);
        if let Some(&slot) = self.by_eid.get(&eid) {
            return Err(Error::EidCollision {
                name: name.to_string(),
                existing: self.slots[slot].name.clone(),
            });
        }

        Ok(None)
    }

    /// Register an entity, or resolve it under the duplicate policy.
    pub fn register(
        &mut self,
        name: &str,
        class: EntityClass,
        metadata: Option<Value>,
        policy: DuplicatePolicy,
        sequence: u64,
    ) -> Result<Registration> {
        if let Some(eid) = self.check_register(name, class, policy)? {
            return Ok(Registration::Existing(eid));
        }

        if self.slots.len() >= self.capacity {
            return Err(Error::TableFull {
                table: "entity",
                capacity: self.capacity,
                name: name.to_string(),
            });
        }

        let entity = Entity::new(name, class, metadata, sequence);
        let eid = entity.eid;
        let slot = self.slots.len();
        self.by_name.insert(entity.name.clone(), slot);
        self.by_eid.insert(eid, slot);
        self.slots.push(entity);

        Ok(Registration::Created(eid))
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<Eid> {
        self.by_name
            .get(name)
            .map(|&slot| self.slots[slot].eid)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    pub fn lookup_by_id(&self, eid: Eid) -> Result<&Entity> {
        self.by_eid
            .get(&eid)
            .map(|&slot| &self.slots[slot])
            .ok_or_else(|| Error::UnknownEntity(eid.to_string()))
    }

    pub(crate) fn lookup_by_id_mut(&mut self, eid: Eid) -> Result<&mut Entity> {
        match self.by_eid.get(&eid) {
            Some(&slot) => Ok(&mut self.slots[slot]),
            None => Err(Error::UnknownEntity(eid.to_string())),
        }
    }

    /// Resolve a lookup key that is either an encoded eID or a name.
    pub fn resolve(&self, key: &str) -> Result<&Entity> {
        if Eid::looks_like_eid(key) {
            if let Some(eid) = Eid::parse(key) {
                return self.lookup_by_id(eid);
            }
        }
        self.lookup_by_name(key)
            .and_then(|eid| self.lookup_by_id(eid))
    }

    pub fn class_of(&self, eid: Eid) -> Result<EntityClass> {
        self.lookup_by_id(eid).map(|entity| entity.class)
    }

    /// Entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_name.clear();
        self.by_eid.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(table: &mut EntityTable, name: &str, class: EntityClass) -> Result<Registration> {
        table.register(name, class, None, DuplicatePolicy::Reuse, 0)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut table = EntityTable::with_capacity(8);
        let eid = register(&mut table, "L1 Current", EntityClass::Value)
            .unwrap()
            .eid();

        assert_eq!(table.lookup_by_name("L1 Current").unwrap(), eid);
        let entity = table.lookup_by_id(eid).unwrap();
        assert_eq!(entity.name, "L1 Current");
        assert_eq!(entity.class, EntityClass::Value);
        assert!(entity.values.is_empty());
        assert_eq!(table.class_of(eid).unwrap(), EntityClass::Value);
    }

    #[test]
    fn test_distinct_names_distinct_ids() {
        let mut table = EntityTable::with_capacity(64);
        let mut seen = std::collections::HashSet::new();
        for phase in 1..=3 {
            for suffix in ["", " LoLo", " Lo", " SP", " Hi", " HiHi"] {
                let name = format!("L{} Current{}", phase, suffix);
                let eid = register(&mut table, &name, EntityClass::Value).unwrap().eid();
                assert!(seen.insert(eid), "collision for {}", name);
            }
        }
        assert_eq!(table.len(), 18);
    }

    #[test]
    fn test_resolve_by_name_or_eid() {
        let mut table = EntityTable::with_capacity(4);
        let eid = register(&mut table, "Debug LED RGB", EntityClass::Value)
            .unwrap()
            .eid();

        assert_eq!(table.resolve("Debug LED RGB").unwrap().eid, eid);
        assert_eq!(table.resolve(&eid.to_string()).unwrap().eid, eid);
        assert!(table.resolve("Debug LED").unwrap_err().is_not_found());
        assert!(table
            .resolve(&Eid::from_name("never").to_string())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_duplicate_reuse_returns_existing() {
        let mut table = EntityTable::with_capacity(4);
        let first = register(&mut table, "Device Time", EntityClass::Value).unwrap();
        let second = register(&mut table, "Device Time", EntityClass::Value).unwrap();

        assert!(first.is_new());
        assert_eq!(second, Registration::Existing(first.eid()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_reject_policy() {
        let mut table = EntityTable::with_capacity(4);
        table
            .register("Device Time", EntityClass::Value, None, DuplicatePolicy::Reject, 0)
            .unwrap();
        let err = table
            .register("Device Time", EntityClass::Value, None, DuplicatePolicy::Reject, 1)
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateEntity(name) if name == "Device Time"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_with_other_class_is_rejected() {
        let mut table = EntityTable::with_capacity(4);
        register(&mut table, "=W01", EntityClass::Device).unwrap();
        let err = register(&mut table, "=W01", EntityClass::Value).unwrap_err();
        assert!(matches!(err, Error::DuplicateEntity(_)));
    }

    #[test]
    fn test_table_full_leaves_table_unchanged() {
        let mut table = EntityTable::with_capacity(4);
        let names = ["A", "B", "C", "D"];
        let eids: Vec<Eid> = names
            .iter()
            .map(|n| register(&mut table, n, EntityClass::Value).unwrap().eid())
            .collect();

        let err = register(&mut table, "E", EntityClass::Value).unwrap_err();
        assert!(matches!(
            err,
            Error::TableFull { table: "entity", capacity: 4, ref name } if name == "E"
        ));
        assert_eq!(table.len(), 4);
        assert!(table.lookup_by_name("E").is_err());
        for (name, eid) in names.iter().zip(eids) {
            assert_eq!(table.lookup_by_name(name).unwrap(), eid);
        }

        // A duplicate of an existing name still resolves when full
        assert!(register(&mut table, "A", EntityClass::Value).is_ok());
    }

    #[test]
    fn test_iteration_is_registration_order() {
        let mut table = EntityTable::with_capacity(4);
        for name in ["Device", "Entities", "Time Measurand"] {
            register(&mut table, name, EntityClass::Value).unwrap();
        }
        let names: Vec<&str> = table.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Device", "Entities", "Time Measurand"]);
    }
}
