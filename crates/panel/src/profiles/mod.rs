//! Device profiles
//!
//! Each front-panel model wires its own entity graph into the store at boot.
//! The device time/uptime sensors, the debug LED and the firmware version are
//! common to every model.

mod m1840a;
mod m1841a;
mod m1870a;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use snon::{Batch, DEVICE, Designation, ENTITIES, EntityClass, RelationKind, Result, Store};

pub const DEVICE_TIME: &str = "Device Time";
pub const DEVICE_UPTIME: &str = "Device Uptime";
pub const DEBUG_LED: &str = "Debug LED RGB";
pub const FIRMWARE_VERSION: &str = "Firmware Version";

const TIME_MEASURAND: &str = r#"{"meU":"s","meT":"iso8601","meAq":"count"}"#;
const SECONDS_MEASURAND: &str = r#"{"meU":"s","meT":"numeric","meAq":"count","meUS":{"*":"s"},"meUSx":{"*":"seconds"},"meR":"1","meAc":"1"}"#;

/// Front-panel model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Model {
    /// Substation panel end with bus designator and per-phase currents
    #[default]
    #[serde(rename = "1840A")]
    #[value(name = "1840A")]
    M1840A,
    /// Centre panel with current/voltage sensors and the annunciator tree
    #[serde(rename = "1841A")]
    #[value(name = "1841A")]
    M1841A,
    /// Fifteen-window annunciator
    #[serde(rename = "1870A")]
    #[value(name = "1870A")]
    M1870A,
}

impl Model {
    /// Device name reported by the `Device` entity.
    pub fn device_name(&self) -> &'static str {
        match self {
            Model::M1840A => "1840A Edge Display",
            Model::M1841A => "1841A Centre Panel",
            Model::M1870A => "1870A Annunciator",
        }
    }

    /// Queue this model's entity graph.
    pub fn wire(&self, batch: &mut Batch<'_>, firmware_version: &str) -> Result<()> {
        wire_common(batch, firmware_version);
        match self {
            Model::M1840A => m1840a::wire(batch),
            Model::M1841A => m1841a::wire(batch),
            Model::M1870A => m1870a::wire(batch),
        }
    }

    /// Wire the model into `store` as one batch.
    pub fn install(&self, store: &Store, firmware_version: &str) -> Result<()> {
        let mut batch = store.batch();
        self.wire(&mut batch, firmware_version)?;
        let summary = batch.commit()?;
        info!(
            "Wired {}: {} entities, {} relationships",
            self, summary.registered, summary.relationships
        );
        Ok(())
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::M1840A => write!(f, "1840A"),
            Model::M1841A => write!(f, "1841A"),
            Model::M1870A => write!(f, "1870A"),
        }
    }
}

/// Register an IEC 81346 designated entity under its parent designation
/// (or under `Device` for a top-level one) with an optional initial value.
pub fn designated(
    batch: &mut Batch<'_>,
    name: &str,
    class: EntityClass,
    initial: Option<&str>,
) -> Result<()> {
    let designation = Designation::parse(name)?;
    let parent = designation.parent().unwrap_or(DEVICE);

    batch
        .register(name, class, None)
        .relate(name, RelationKind::ChildOf, parent);
    if let Some(initial) = initial {
        batch.set_value(name, initial);
    }
    Ok(())
}

fn wire_common(batch: &mut Batch<'_>, firmware_version: &str) {
    batch
        .relate(ENTITIES, RelationKind::ChildOf, DEVICE)
        .register("Time Measurand", EntityClass::Measurand, Some(TIME_MEASURAND))
        .register("Seconds Measurand", EntityClass::Measurand, Some(SECONDS_MEASURAND));

    for (sensor, measurand, value) in [
        ("Device Time", "Time Measurand", DEVICE_TIME),
        ("Device Uptime", "Seconds Measurand", DEVICE_UPTIME),
    ] {
        let sensor_name = format!("{} Sensor", sensor);
        let series_name = format!("{} Series", sensor);
        batch
            .register(sensor_name.as_str(), EntityClass::Sensor, None)
            .relate(sensor_name.as_str(), RelationKind::ChildOf, DEVICE)
            .relate(sensor_name.as_str(), RelationKind::Measurand, measurand)
            .register(series_name.as_str(), EntityClass::Series, None)
            .relate(series_name.as_str(), RelationKind::Measurand, measurand)
            .relate(series_name.as_str(), RelationKind::ChildOf, sensor_name)
            .relate(series_name, RelationKind::Values, value)
            .register(value, EntityClass::Value, None);
    }
    batch.set_value(DEVICE_UPTIME, "0");

    batch
        .register(DEBUG_LED, EntityClass::Value, None)
        .relate(DEBUG_LED, RelationKind::ChildOf, DEVICE)
        .set_value(DEBUG_LED, "0A000A")
        .register(FIRMWARE_VERSION, EntityClass::Value, None)
        .relate(FIRMWARE_VERSION, RelationKind::ChildOf, DEVICE)
        .set_value(FIRMWARE_VERSION, firmware_version);
}

/// Plain threshold values around a reading: LoLo, Lo, the reading, SP, Hi
/// and HiHi.
pub(crate) const THRESHOLDS: [(&str, &str); 6] = [
    (" LoLo", "-2"),
    (" Lo", "-1"),
    ("", "0"),
    (" SP", "0"),
    (" Hi", "1"),
    (" HiHi", "2"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use snon::StoreConfig;

    fn installed(model: Model) -> Store {
        let store = Store::initialize(StoreConfig::default(), model.device_name()).unwrap();
        model.install(&store, "0.1.0").unwrap();
        store
    }

    #[test]
    fn test_common_entities() {
        for model in [Model::M1840A, Model::M1841A, Model::M1870A] {
            let store = installed(model);
            assert_eq!(store.get_value(DEBUG_LED).unwrap().as_deref(), Some("0A000A"));
            assert_eq!(store.get_value(FIRMWARE_VERSION).unwrap().as_deref(), Some("0.1.0"));
            assert_eq!(
                store.get_value("Device Uptime Series").unwrap().as_deref(),
                Some("0")
            );

            let series = store.lookup_by_name("Device Time Series").unwrap();
            let time = store.lookup_by_name(DEVICE_TIME).unwrap();
            assert_eq!(store.relationships_of(series, RelationKind::Values), vec![time]);
        }
    }

    #[test]
    fn test_designated_parent() {
        let store = Store::initialize(StoreConfig::default(), "test").unwrap();
        let mut batch = store.batch();
        designated(&mut batch, "=P01=PFA01", EntityClass::Value, Some("vita40_off")).unwrap();
        designated(&mut batch, "=P01", EntityClass::Device, None).unwrap();
        batch.commit().unwrap();

        let p01 = store.lookup_by_name("=P01").unwrap();
        let led = store.lookup_by_name("=P01=PFA01").unwrap();
        let device = store.lookup_by_name(DEVICE).unwrap();
        assert_eq!(store.children_of(p01), vec![led]);
        assert!(store.children_of(device).contains(&p01));
        assert_eq!(store.get_value("=P01=PFA01").unwrap().as_deref(), Some("vita40_off"));
    }

    #[test]
    fn test_designated_rejects_plain_names() {
        let store = Store::initialize(StoreConfig::default(), "test").unwrap();
        let mut batch = store.batch();
        assert!(designated(&mut batch, "Bus Designator", EntityClass::Value, None).is_err());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_install_overflow_names_entity() {
        let config = StoreConfig {
            max_entities: 40,
            ..StoreConfig::default()
        };
        let store = Store::initialize(config, "test").unwrap();
        let err = Model::M1841A.install(&store, "0.1.0").unwrap_err();

        let snon::Error::TableFull { table, name, .. } = &err else {
            panic!("unexpected error: {}", err);
        };
        assert_eq!(*table, "entity");
        assert!(err.to_string().ends_with(&format!("cannot add {}", name)));
        assert!(store.lookup_by_name(name).is_err());
        // Nothing from the profile landed
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_model_names() {
        let model: Model = serde_json::from_str("\"1841A\"").unwrap();
        assert_eq!(model, Model::M1841A);
        assert_eq!(model.to_string(), "1841A");
        assert_eq!(Model::default(), Model::M1840A);
    }
}
