//! SNON entity-relationship store.
//!
//! An in-memory graph of named entities (devices, sensors, series,
//! measurands and values) joined by typed relationships, addressed by
//! fixed-width eIDs and serialized as small JSON fragments.
//!
//! ```text
//! Device
//!  ├── Entities                      (computed listing)
//!  ├── Device Time Sensor
//!  │    └── Device Time Series ──values──▶ Device Time
//!  └── =W01
//!       └── =W01=PGC01
//!            └── L1 Current Series ──values──▶ L1 Current
//!                                   ──setpoint──▶ L1 Current Setpoint
//!                                   ──alarms──▶ L1 Current LoLo Alarm ...
//! ```
//!
//! Typical boot sequence:
//!
//! ```ignore
//! let store = Store::initialize(StoreConfig::default(), "1840A Edge Display")?.shared();
//! let mut batch = store.batch();
//! batch
//!     .register("L1 Current Series", EntityClass::Series, None)
//!     .relate("L1 Current Series", RelationKind::Values, "L1 Current")
//!     .register("L1 Current", EntityClass::Value, None)
//!     .set_value("L1 Current", "0");
//! batch.commit()?;
//! ```

pub mod batch;
pub mod config;
pub mod eid;
pub mod entity;
pub mod error;
pub mod json;
pub mod relationship;
pub mod store;

pub use batch::{Batch, BatchSummary};
pub use config::{DuplicatePolicy, StoreConfig};
pub use eid::{Designation, EID_LENGTH, Eid};
pub use entity::{Entity, EntityClass};
pub use error::{Error, Result};
pub use json::{Fragment, decode_bulk, decode_fragment, is_bulk_read};
pub use relationship::{RelationKind, Relationship};
pub use store::{DEVICE, ENTITIES, SharedStore, Store};
