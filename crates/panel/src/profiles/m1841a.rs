//! 1841A centre panel: current and voltage sensors for the incoming feeder
//! plus the switchgear mimic of VITA 40 indicators, one per IEC 81346
//! designated object.

use snon::{Batch, EntityClass, RelationKind, Result};

use super::{THRESHOLDS, designated};

/// Initial state of every mimic indicator.
pub const INDICATOR_INITIAL: &str = "vita40_green_standby";

const CURRENT_MEASURAND: &str = r#"{"meU":"A","meT":"numeric","meAq":"sample"}"#;
const VOLTAGE_MEASURAND: &str = r#"{"meU":"V","meT":"numeric","meAq":"sample"}"#;

/// One section of the switchgear mimic.
#[derive(Debug, Clone, Copy)]
enum Section {
    /// Outgoing feeder; `true` when fitted with per-breaker meters
    Feeder(&'static str, bool),
    /// Bus coupler or sectionaliser
    Coupler(&'static str),
    Transformer,
    Generator,
}

/// Sections between the incoming feeder and the spare, left to right.
const LAYOUT: [Section; 16] = [
    Section::Coupler("=Q21"),
    Section::Feeder("=W02", true),
    Section::Coupler("=Q20"),
    Section::Feeder("=W03", true),
    Section::Coupler("=Q22"),
    Section::Feeder("=W04", false),
    Section::Transformer,
    Section::Feeder("=W05", false),
    Section::Coupler("=Q12"),
    Section::Feeder("=W06", true),
    Section::Coupler("=Q10"),
    Section::Feeder("=W07", false),
    Section::Coupler("=Q11"),
    Section::Feeder("=W08", true),
    Section::Generator,
    Section::Feeder("=W09", true),
];

pub(super) fn wire(batch: &mut Batch<'_>) -> Result<()> {
    batch
        .register("Current Measurand", EntityClass::Measurand, Some(CURRENT_MEASURAND))
        .register("Voltage Measurand", EntityClass::Measurand, Some(VOLTAGE_MEASURAND));

    wire_meter(batch, "=W01=PGC01", "Current", "Current Measurand");
    wire_meter(batch, "=W01=PGA01", "Voltage", "Voltage Measurand");

    designated(batch, "=W01", EntityClass::Device, None)?;
    designated(batch, "=W01=PHA01", EntityClass::Value, Some("WAITING"))?;
    for breaker in 1..=3 {
        let breaker = format!("=W01=WBA{:02}", breaker);
        designated(batch, &breaker, EntityClass::Device, None)?;
        for led in 1..=3 {
            let led = format!("{}=PFA{:02}", breaker, led);
            designated(batch, &led, EntityClass::Value, Some(INDICATOR_INITIAL))?;
        }
    }

    for section in LAYOUT {
        match section {
            Section::Feeder(feeder, metered) => wire_feeder(batch, feeder, metered)?,
            Section::Coupler(coupler) => wire_coupler(batch, coupler)?,
            Section::Transformer => wire_transformer(batch)?,
            Section::Generator => wire_generator(batch)?,
        }
    }

    designated(batch, "=W10", EntityClass::Device, None)?;
    designated(batch, "=W10=WEA01", EntityClass::Device, None)?;
    designated(batch, "=W10=WEA01=PFA01", EntityClass::Value, Some(INDICATOR_INITIAL))?;
    Ok(())
}

/// A meter sensor with one series per phase. Each series carries a setpoint
/// series and LoLo/Lo/Hi/HiHi alarm series, all backed by plain values.
fn wire_meter(batch: &mut Batch<'_>, sensor: &str, quantity: &str, measurand: &str) {
    batch
        .register(sensor, EntityClass::Sensor, None)
        .relate(sensor, RelationKind::ChildOf, "=W01")
        .relate(sensor, RelationKind::Measurand, measurand);

    for phase in 1..=3 {
        let base = format!("L{} {}", phase, quantity);
        let series = format!("{} Series", base);
        let setpoint = format!("{} Setpoint", base);

        batch
            .register(series.as_str(), EntityClass::Series, None)
            .relate(series.as_str(), RelationKind::Measurand, measurand)
            .relate(series.as_str(), RelationKind::ChildOf, sensor)
            .relate(series.as_str(), RelationKind::Setpoint, setpoint.as_str());
        for alarm in ["LoLo", "Lo", "Hi", "HiHi"] {
            batch.relate(
                series.as_str(),
                RelationKind::Alarms,
                format!("{} {} Alarm", base, alarm),
            );
        }
        batch.relate(series.as_str(), RelationKind::Values, base.as_str());

        for (suffix, initial) in THRESHOLDS {
            let value = format!("{}{}", base, suffix);
            let backing = match suffix {
                "" => None,
                " SP" => Some(setpoint.clone()),
                alarm => Some(format!("{}{} Alarm", base, alarm)),
            };
            if let Some(backing) = backing {
                batch
                    .register(backing.as_str(), EntityClass::Series, None)
                    .relate(backing.as_str(), RelationKind::Measurand, measurand)
                    .relate(backing.as_str(), RelationKind::ChildOf, sensor)
                    .relate(backing, RelationKind::Values, value.as_str());
            }
            batch
                .register(value.as_str(), EntityClass::Value, None)
                .set_value(value, initial);
        }
    }
}

fn wire_feeder(batch: &mut Batch<'_>, feeder: &str, metered: bool) -> Result<()> {
    designated(batch, feeder, EntityClass::Device, None)?;
    for breaker in 1..=3 {
        let breaker = format!("{}=WBA{:02}", feeder, breaker);
        designated(batch, &breaker, EntityClass::Device, None)?;
        designated(batch, &format!("{}=PFA01", breaker), EntityClass::Value, Some(INDICATOR_INITIAL))?;
        if metered {
            for meter in ["PGA01", "PGC01"] {
                let meter = format!("{}={}", breaker, meter);
                designated(batch, &meter, EntityClass::Device, None)?;
                designated(batch, &format!("{}=PFA01", meter), EntityClass::Value, Some(INDICATOR_INITIAL))?;
            }
        }
    }
    Ok(())
}

fn wire_coupler(batch: &mut Batch<'_>, coupler: &str) -> Result<()> {
    designated(batch, coupler, EntityClass::Device, None)?;
    designated(batch, &format!("{}=PFA01", coupler), EntityClass::Value, Some(INDICATOR_INITIAL))?;
    for switch in 1..=3 {
        let switch = format!("{}=QBA{:02}", coupler, switch);
        designated(batch, &switch, EntityClass::Device, None)?;
        designated(batch, &format!("{}=PFA01", switch), EntityClass::Value, Some(INDICATOR_INITIAL))?;
    }
    Ok(())
}

fn wire_transformer(batch: &mut Batch<'_>) -> Result<()> {
    designated(batch, "=T01", EntityClass::Device, None)?;
    designated(batch, "=T01=TAA01", EntityClass::Device, None)?;
    for led in 1..=3 {
        let led = format!("=T01=TAA01=PFA{:02}", led);
        designated(batch, &led, EntityClass::Value, Some(INDICATOR_INITIAL))?;
    }
    Ok(())
}

fn wire_generator(batch: &mut Batch<'_>) -> Result<()> {
    for device in ["=G01", "=G01=GAA01"] {
        designated(batch, device, EntityClass::Device, None)?;
    }
    for led in 1..=3 {
        let led = format!("=G01=GAA01=PFA{:02}", led);
        designated(batch, &led, EntityClass::Value, Some(INDICATOR_INITIAL))?;
    }
    designated(batch, "=G01=GAA01=RBA01", EntityClass::Device, None)?;
    designated(batch, "=G01=GAA01=RBA01=PFA01", EntityClass::Value, Some(INDICATOR_INITIAL))?;

    // Generator step-up transformer
    for device in ["=G01=T02", "=G01=T02=TAA01"] {
        designated(batch, device, EntityClass::Device, None)?;
    }
    designated(batch, "=G01=T02=TAA01=PFA01", EntityClass::Value, Some(INDICATOR_INITIAL))?;
    for relay in ["PGC01", "RAC01"] {
        let relay = format!("=G01=T02=TAA01={}", relay);
        designated(batch, &relay, EntityClass::Device, None)?;
        designated(batch, &format!("{}=PFA01", relay), EntityClass::Value, Some(INDICATOR_INITIAL))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use snon::{DEVICE, Store, StoreConfig};

    use crate::profiles::Model;

    use super::*;

    fn store() -> Store {
        let store = Store::initialize(StoreConfig::default(), "1841A Centre Panel").unwrap();
        Model::M1841A.install(&store, "0.1.0").unwrap();
        store
    }

    #[test]
    fn test_meter_series_wiring() {
        let store = store();
        let series = store.lookup_by_name("L2 Voltage Series").unwrap();
        let alarms: Vec<String> = store
            .relationships_of(series, RelationKind::Alarms)
            .into_iter()
            .map(|eid| store.name_of(eid).unwrap())
            .collect();
        assert_eq!(
            alarms,
            vec![
                "L2 Voltage LoLo Alarm",
                "L2 Voltage Lo Alarm",
                "L2 Voltage Hi Alarm",
                "L2 Voltage HiHi Alarm"
            ]
        );

        let doc: Value =
            serde_json::from_str(&store.encode_entity("L2 Voltage Series").unwrap()).unwrap();
        assert_eq!(doc["values"], serde_json::json!(["0"]));
        assert_eq!(doc["setpoint"], serde_json::json!(["0"]));
        assert_eq!(doc["alarms"][0]["values"], serde_json::json!(["-2"]));
        assert_eq!(doc["alarms"][3]["values"], serde_json::json!(["2"]));
    }

    #[test]
    fn test_sensor_under_incoming_feeder() {
        let store = store();
        let w01 = store.lookup_by_name("=W01").unwrap();
        let children: Vec<String> = store
            .children_of(w01)
            .into_iter()
            .map(|eid| store.name_of(eid).unwrap())
            .collect();
        assert_eq!(&children[..3], ["=W01=PGC01", "=W01=PGA01", "=W01=PHA01"]);
        assert_eq!(store.get_value("=W01=PHA01").unwrap().as_deref(), Some("WAITING"));
    }

    #[test]
    fn test_indicator_tree() {
        let store = store();
        for led in [
            "=W01=WBA03=PFA03",
            "=Q21=QBA02=PFA01",
            "=W09=WBA03=PGC01=PFA01",
            "=G01=T02=TAA01=RAC01=PFA01",
            "=W10=WEA01=PFA01",
        ] {
            assert_eq!(store.get_value(led).unwrap().as_deref(), Some(INDICATOR_INITIAL), "{}", led);
        }
        assert!(store.lookup_by_name("=W04=WBA01=PGA01").is_err());

        // Every designated object is reachable from Device
        let listing = store.entities_listing();
        let led = store.lookup_by_name("=W08=WBA02=PGA01=PFA01").unwrap();
        assert!(listing.contains(&led));
        let device = store.lookup_by_name(DEVICE).unwrap();
        assert_eq!(listing[0], device);
    }

    #[test]
    fn test_fits_default_capacity() {
        let store = store();
        let config = StoreConfig::default();
        assert!(store.len() <= config.max_entities);
        assert!(store.relationship_count() <= config.max_relationships);
    }
}
