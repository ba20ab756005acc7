//! The shared entity store.
//!
//! One `Store` per process holds the entity table and the relationship index
//! behind a single `RwLock`. Boot wiring, the serial console and the refresh
//! loop all hold a [`SharedStore`] clone; reads run concurrently, every
//! mutation takes the write lock for its whole duration so readers never see
//! a partially replaced value list.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Value, json};
use tracing::{debug, info, trace};

use crate::batch::Batch;
use crate::config::StoreConfig;
use crate::eid::Eid;
use crate::entity::{Entity, EntityClass, EntityTable, Registration};
use crate::error::{Error, Result};
use crate::json;
use crate::relationship::{RelationKind, RelationshipIndex};

/// Name of the root device entity.
pub const DEVICE: &str = "Device";

/// Name of the computed listing of every entity reachable from [`DEVICE`].
pub const ENTITIES: &str = "Entities";

pub type SharedStore = Arc<Store>;

/// Table state guarded by the store lock.
#[derive(Debug, Clone)]
pub struct Tables {
    pub(crate) config: StoreConfig,
    pub(crate) entities: EntityTable,
    pub(crate) relationships: RelationshipIndex,
    sequence: u64,
}

impl Tables {
    fn new(config: StoreConfig) -> Self {
        Self {
            entities: EntityTable::with_capacity(config.max_entities),
            relationships: RelationshipIndex::with_capacity(config.max_relationships),
            config,
            sequence: 0,
        }
    }

    pub(crate) fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub fn relationships(&self) -> &RelationshipIndex {
        &self.relationships
    }

    pub fn resolve(&self, key: &str) -> Result<&Entity> {
        self.entities.resolve(key)
    }

    /// eIDs reachable from `Device` via reversed CHILD_OF edges, `Device`
    /// first. Empty when no device root is registered.
    pub fn entities_listing(&self) -> Vec<Eid> {
        match self.entities.lookup_by_name(DEVICE) {
            Ok(root) => self.relationships.descendants(root),
            Err(_) => Vec::new(),
        }
    }

    /// Values as seen by readers: the listing for `Entities`, the VALUES
    /// target's tokens for a series, the entity's own tokens otherwise.
    pub fn effective_values(&self, entity: &Entity) -> Vec<String> {
        if entity.name == ENTITIES {
            return self
                .entities_listing()
                .iter()
                .map(Eid::to_string)
                .collect();
        }

        if entity.class == EntityClass::Series {
            return match self.relationships.first_of(entity.eid, RelationKind::Values) {
                Some(target) if target != entity.eid => match self.entities.lookup_by_id(target) {
                    Ok(target) if target.class != EntityClass::Series => {
                        self.effective_values(target)
                    }
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            };
        }

        entity.values.clone()
    }

    /// Version as seen by readers: a series reports the newer of its own
    /// version and its VALUES target's.
    pub fn effective_changed_at(&self, entity: &Entity) -> u64 {
        if entity.class == EntityClass::Series {
            if let Some(target) = self.relationships.first_of(entity.eid, RelationKind::Values) {
                if let Ok(target) = self.entities.lookup_by_id(target) {
                    return entity.changed_at.max(target.changed_at);
                }
            }
        }
        entity.changed_at
    }

    /// Resolve the entity that a value write to `key` lands on.
    pub(crate) fn value_target(&self, key: &str) -> Result<Eid> {
        let entity = self.resolve(key)?;
        let target = match entity.class {
            EntityClass::Value => entity,
            EntityClass::Series => self
                .relationships
                .first_of(entity.eid, RelationKind::Values)
                .and_then(|eid| self.entities.lookup_by_id(eid).ok())
                .ok_or_else(|| Error::NotValueClass {
                    name: entity.name.clone(),
                    class: entity.class,
                })?,
            class => {
                return Err(Error::NotValueClass {
                    name: entity.name.clone(),
                    class,
                });
            }
        };

        if target.name == ENTITIES {
            return Err(Error::ReadOnly(target.name.clone()));
        }
        if target.class != EntityClass::Value {
            return Err(Error::NotValueClass {
                name: target.name.clone(),
                class: target.class,
            });
        }
        Ok(target.eid)
    }

    /// Check a token list against the configured bounds.
    pub(crate) fn check_values(&self, entity: &str, values: &[String]) -> Result<()> {
        if values.len() > self.config.max_values {
            return Err(Error::ValueTooLarge {
                entity: entity.to_string(),
                reason: format!(
                    "{} tokens exceeds the limit of {}",
                    values.len(),
                    self.config.max_values
                ),
            });
        }
        if let Some(token) = values
            .iter()
            .find(|token| token.len() > self.config.max_value_length)
        {
            return Err(Error::ValueTooLarge {
                entity: entity.to_string(),
                reason: format!(
                    "token of {} bytes exceeds the limit of {}",
                    token.len(),
                    self.config.max_value_length
                ),
            });
        }
        Ok(())
    }

    pub(crate) fn register(
        &mut self,
        name: &str,
        class: EntityClass,
        metadata: Option<Value>,
    ) -> Result<Registration> {
        let sequence = self.sequence + 1;
        let registration =
            self.entities
                .register(name, class, metadata, self.config.duplicates, sequence)?;
        if registration.is_new() {
            self.sequence = sequence;
        }
        Ok(registration)
    }

    pub(crate) fn add_relationship(
        &mut self,
        from: &str,
        kind: RelationKind,
        to: &str,
    ) -> Result<bool> {
        let from_eid = self.entities.lookup_by_name(from)?;
        let to_eid = self.entities.lookup_by_name(to)?;
        let added = self
            .relationships
            .add(from_eid, kind, to_eid)
            .map_err(|e| match e {
                // Name the edge by entity names rather than eIDs
                Error::TableFull { table, capacity, .. } => Error::TableFull {
                    table,
                    capacity,
                    name: format!("{} {} {}", from, kind, to),
                },
                other => other,
            })?;

        // A new CHILD_OF edge changes the Entities listing
        if added && kind == RelationKind::ChildOf {
            if let Ok(listing) = self.entities.lookup_by_name(ENTITIES) {
                let sequence = self.next_sequence();
                if let Ok(listing) = self.entities.lookup_by_id_mut(listing) {
                    listing.changed_at = sequence;
                    listing.updated_at = Utc::now();
                }
            }
        }
        Ok(added)
    }

    pub(crate) fn set_values(&mut self, key: &str, values: Vec<String>) -> Result<u64> {
        let target = self.value_target(key)?;
        let name = self.entities.lookup_by_id(target)?.name.clone();
        self.check_values(&name, &values)?;

        let sequence = self.next_sequence();
        self.entities
            .lookup_by_id_mut(target)?
            .replace_values(values, sequence);
        Ok(sequence)
    }

    fn clear(&mut self) {
        self.entities.clear();
        self.relationships.clear();
    }
}

/// Store handle. Create once at boot and share as [`SharedStore`].
#[derive(Debug)]
pub struct Store {
    inner: RwLock<Tables>,
}

impl Store {
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: RwLock::new(Tables::new(config)),
        })
    }

    /// Create a store holding the `Device` root and the `Entities` listing.
    pub fn initialize(config: StoreConfig, device_name: &str) -> Result<Self> {
        let store = Self::new(config)?;
        store.install_root(device_name)?;
        info!("Initialized SNON store for {}", device_name);
        Ok(store)
    }

    fn install_root(&self, device_name: &str) -> Result<()> {
        let mut tables = self.inner.write();
        tables.register(
            DEVICE,
            EntityClass::Device,
            Some(json!({ "description": device_name })),
        )?;
        tables.register(ENTITIES, EntityClass::Value, None)?;
        tables.add_relationship(ENTITIES, RelationKind::ChildOf, DEVICE)?;
        Ok(())
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }

    pub fn config(&self) -> StoreConfig {
        self.inner.read().config.clone()
    }

    /// Drop every entity and relationship. Not part of normal operation.
    pub fn reset(&self) {
        let mut tables = self.inner.write();
        tables.clear();
        info!("SNON store reset");
    }

    /// Run `f` against a consistent snapshot of the tables.
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&*self.inner.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        f(&mut *self.inner.write())
    }

    /// Start a wiring batch that is validated and applied as a unit.
    pub fn batch(&self) -> Batch<'_> {
        Batch::new(self)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entity table
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an entity. `metadata`, when given, must be a JSON document.
    ///
    /// Registering an existing name follows the configured duplicate policy.
    pub fn register(&self, name: &str, class: EntityClass, metadata: Option<&str>) -> Result<Eid> {
        let metadata = parse_metadata(name, metadata)?;
        let registration = self.write(|tables| tables.register(name, class, metadata))?;
        match registration {
            Registration::Created(eid) => debug!("Registered {} {} as {}", class, name, eid),
            Registration::Existing(eid) => debug!("{} already registered as {}", name, eid),
        }
        Ok(registration.eid())
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<Eid> {
        self.read(|tables| tables.entities.lookup_by_name(name))
    }

    /// Snapshot of the entity with this eID.
    pub fn lookup_by_id(&self, eid: Eid) -> Result<Entity> {
        self.read(|tables| tables.entities.lookup_by_id(eid).cloned())
    }

    /// Resolve a name or encoded eID to an eID.
    pub fn resolve(&self, key: &str) -> Result<Eid> {
        self.read(|tables| tables.resolve(key).map(|entity| entity.eid))
    }

    pub fn name_of(&self, eid: Eid) -> Result<String> {
        self.read(|tables| {
            tables
                .entities
                .lookup_by_id(eid)
                .map(|entity| entity.name.clone())
        })
    }

    pub fn class_of(&self, eid: Eid) -> Result<EntityClass> {
        self.read(|tables| tables.entities.class_of(eid))
    }

    pub fn len(&self) -> usize {
        self.read(|tables| tables.entities.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn relationship_count(&self) -> usize {
        self.read(|tables| tables.relationships.len())
    }

    /// All eIDs in registration order.
    pub fn entities(&self) -> Vec<Eid> {
        self.read(|tables| tables.entities.iter().map(|entity| entity.eid).collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Relationship index
    // ─────────────────────────────────────────────────────────────────────────

    /// Wire `from --kind--> to` by name. Both names must be registered; an
    /// identical edge is a no-op and returns `false`.
    pub fn add_relationship(&self, from: &str, kind: RelationKind, to: &str) -> Result<bool> {
        let added = self.write(|tables| tables.add_relationship(from, kind, to))?;
        if added {
            trace!("{} {} {}", from, kind, to);
        }
        Ok(added)
    }

    pub fn relationships_of(&self, from: Eid, kind: RelationKind) -> Vec<Eid> {
        self.read(|tables| tables.relationships.relationships_of(from, kind))
    }

    pub fn children_of(&self, parent: Eid) -> Vec<Eid> {
        self.read(|tables| tables.relationships.children_of(parent))
    }

    /// The `Entities` listing.
    pub fn entities_listing(&self) -> Vec<Eid> {
        self.read(Tables::entities_listing)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Values
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the value tokens of `key` and return the new version.
    ///
    /// A series forwards the write to its VALUES target.
    pub fn set_values(&self, key: &str, values: Vec<String>) -> Result<u64> {
        let version = self.write(|tables| tables.set_values(key, values))?;
        debug!("Updated {} (version {})", key, version);
        Ok(version)
    }

    /// Replace the values of `key` from JSON array text such as `["0"]`.
    pub fn set_values_json(&self, key: &str, text: &str) -> Result<u64> {
        let values = json::parse_value_array(text)?;
        self.set_values(key, values)
    }

    /// Replace the values of `key` with a single token.
    pub fn set_value(&self, key: &str, token: impl Into<String>) -> Result<u64> {
        self.set_values(key, vec![token.into()])
    }

    pub fn get_values(&self, key: &str) -> Result<Vec<String>> {
        self.read(|tables| {
            tables
                .resolve(key)
                .map(|entity| tables.effective_values(entity))
        })
    }

    /// First value token, if any.
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.get_values(key)
            .map(|values| values.into_iter().next())
    }

    /// First value token as a number.
    pub fn try_get_as_number(&self, key: &str) -> Result<f64> {
        let values = self.get_values(key)?;
        let token = values.first().map(String::as_str).unwrap_or_default();
        parse_number(token).ok_or_else(|| Error::ParseFailure {
            entity: key.to_string(),
            token: token.to_string(),
        })
    }

    /// First value token as a number, or `0.0` when the entity is unknown,
    /// has no values or holds a non-numeric token. Use
    /// [`Store::try_get_as_number`] to tell those cases apart.
    pub fn get_as_number(&self, key: &str) -> f64 {
        match self.try_get_as_number(key) {
            Ok(value) => value,
            Err(e) => {
                trace!("Numeric read fell back to 0: {}", e);
                0.0
            }
        }
    }

    pub fn get_changed_at(&self, key: &str) -> Result<u64> {
        self.read(|tables| {
            tables
                .resolve(key)
                .map(|entity| tables.effective_changed_at(entity))
        })
    }

    /// Wall-clock time of the last change to `key`'s own record.
    pub fn updated_at(&self, key: &str) -> Result<DateTime<Utc>> {
        self.read(|tables| tables.resolve(key).map(|entity| entity.updated_at))
    }
}

pub(crate) fn parse_metadata(name: &str, metadata: Option<&str>) -> Result<Option<Value>> {
    metadata
        .map(|text| {
            serde_json::from_str(text).map_err(|source| Error::InvalidMetadata {
                name: name.to_string(),
                source,
            })
        })
        .transpose()
}

fn parse_number(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
