//! Error taxonomy for the entity store.

use crate::entity::EntityClass;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by store, codec and wiring operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A name or eID that was never registered.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A fixed-capacity table has no free slot for `name` (an entity name,
    /// or `from kind to` for an edge).
    #[error("{table} table full ({capacity} slots), cannot add {name}")]
    TableFull {
        table: &'static str,
        capacity: usize,
        name: String,
    },

    /// Re-registration of an existing name under the `reject` policy, or
    /// with a different class under either policy.
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    /// Two distinct names hashed to the same eID.
    #[error("eID collision: {name} maps to the eID already held by {existing}")]
    EidCollision { name: String, existing: String },

    /// No usable id field in an incoming fragment.
    #[error("Malformed fragment: {0}")]
    MalformedFragment(String),

    /// A value token could not be read as a number.
    #[error("{entity}: value {token:?} is not numeric")]
    ParseFailure { entity: String, token: String },

    /// Measurand metadata was not valid JSON.
    #[error("Invalid metadata for {name}: {source}")]
    InvalidMetadata {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value payload was not a JSON array of scalars.
    #[error("Malformed values: {0}")]
    MalformedValues(String),

    /// A value payload exceeded the configured token bounds.
    #[error("{entity}: {reason}")]
    ValueTooLarge { entity: String, reason: String },

    /// Values were written to an entity that cannot hold them.
    #[error("{name} is a {class} entity and holds no values")]
    NotValueClass { name: String, class: EntityClass },

    /// Values were written to a computed entity.
    #[error("{0} is read-only")]
    ReadOnly(String),

    /// An IEC 81346 designator could not be parsed.
    #[error("Invalid designation: {0}")]
    InvalidDesignation(String),

    #[error("JSON encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for errors caused by a name or eID that does not resolve.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownEntity(_))
    }
}
