//! Store capacity and policy configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_ENTITIES: usize = 512;
pub const DEFAULT_MAX_RELATIONSHIPS: usize = 1024;
pub const DEFAULT_MAX_VALUES: usize = 8;
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 64;

/// What `register` does when the name is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Return the existing eID (the class must match)
    #[default]
    Reuse,
    /// Fail with `DuplicateEntity`
    Reject,
}

/// Fixed bounds for a store instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Entity table slots
    pub max_entities: usize,
    /// Relationship index slots
    pub max_relationships: usize,
    /// Tokens per value entity
    pub max_values: usize,
    /// Bytes per value token
    pub max_value_length: usize,
    /// Duplicate registration policy
    pub duplicates: DuplicatePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
            max_relationships: DEFAULT_MAX_RELATIONSHIPS,
            max_values: DEFAULT_MAX_VALUES,
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
            duplicates: DuplicatePolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Reject bounds that would make the store unusable.
    pub fn validate(&self) -> Result<()> {
        if self.max_entities == 0 {
            return Err(Error::Config("max_entities must be at least 1".into()));
        }
        if self.max_values == 0 {
            return Err(Error::Config("max_values must be at least 1".into()));
        }
        if self.max_value_length == 0 {
            return Err(Error::Config("max_value_length must be at least 1".into()));
        }
        Ok(())
    }
}
