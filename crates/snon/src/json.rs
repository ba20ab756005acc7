//! JSON fragment encoding and decoding.
//!
//! Encodings are single JSON objects with a fixed field order. Values are
//! always an array of string tokens, even for scalars. Decoding accepts
//! well-formed JSON first and falls back to a key scanner for fragments cut
//! short on a serial line.

use serde::Serialize;
use serde_json::Value;

use crate::eid::Eid;
use crate::entity::{Entity, EntityClass};
use crate::error::{Error, Result};
use crate::relationship::RelationKind;
use crate::store::{Store, Tables};

const ID_KEYS: [&str; 3] = ["id", "eID", "eid"];
const VALUE_KEYS: [&str; 2] = ["values", "v"];

#[derive(Debug, Serialize)]
struct EntityDocument<'a> {
    id: Eid,
    name: &'a str,
    class: EntityClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Value>,
    values: Vec<String>,
    version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<Eid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    measurand: Option<Eid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    setpoint: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    alarms: Vec<AlarmDocument>,
}

#[derive(Debug, Serialize)]
struct AlarmDocument {
    id: Eid,
    values: Vec<String>,
}

impl<'a> EntityDocument<'a> {
    fn build(tables: &'a Tables, entity: &'a Entity) -> Self {
        let index = tables.relationships();
        let values_of = |eid: Eid| {
            tables
                .entities()
                .lookup_by_id(eid)
                .map(|target| tables.effective_values(target))
                .unwrap_or_default()
        };

        Self {
            id: entity.eid,
            name: &entity.name,
            class: entity.class,
            metadata: entity.metadata.as_ref(),
            values: tables.effective_values(entity),
            version: tables.effective_changed_at(entity),
            parent: index.first_of(entity.eid, RelationKind::ChildOf),
            measurand: index.first_of(entity.eid, RelationKind::Measurand),
            setpoint: index
                .first_of(entity.eid, RelationKind::Setpoint)
                .map(values_of),
            alarms: index
                .relationships_of(entity.eid, RelationKind::Alarms)
                .into_iter()
                .map(|id| AlarmDocument {
                    id,
                    values: values_of(id),
                })
                .collect(),
        }
    }
}

/// A decoded incoming fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Entity name or encoded eID, as sent
    pub id: String,
    /// `None` for a read, `Some` for a write
    pub values: Option<Vec<String>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Encode one entity.
pub fn encode_entity(tables: &Tables, key: &str) -> Result<String> {
    let entity = tables.resolve(key)?;
    Ok(serde_json::to_string(&EntityDocument::build(tables, entity))?)
}

/// Encode an entity's effective values as a bare JSON array. For `Entities`
/// this is the listing of fixed-width eIDs.
pub fn encode_values_list(tables: &Tables, key: &str) -> Result<String> {
    let entity = tables.resolve(key)?;
    Ok(serde_json::to_string(&tables.effective_values(entity))?)
}

/// Every entity in registration order.
pub fn encode_dump(tables: &Tables) -> Result<String> {
    let documents: Vec<EntityDocument<'_>> = tables
        .entities()
        .iter()
        .map(|entity| EntityDocument::build(tables, entity))
        .collect();
    Ok(serde_json::to_string(&documents)?)
}

/// Every entity in the `Entities` listing; `{}` for an id that does not
/// resolve.
pub fn encode_bulk_read(tables: &Tables) -> Result<String> {
    let mut documents = Vec::new();
    for eid in tables.entities_listing() {
        let document = match tables.entities().lookup_by_id(eid) {
            Ok(entity) => serde_json::to_value(EntityDocument::build(tables, entity))?,
            Err(_) => Value::Object(serde_json::Map::new()),
        };
        documents.push(document);
    }
    Ok(serde_json::to_string(&documents)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// True for the `{}` bulk-read shorthand (whitespace inside the braces is
/// allowed).
pub fn is_bulk_read(text: &str) -> bool {
    text.trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .is_some_and(|inner| inner.trim().is_empty())
}

/// Decode a single fragment such as `{"id":"L1 Current","values":["1"]}`.
pub fn decode_fragment(text: &str) -> Result<Fragment> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => fragment_from_object(&map, text),
        Ok(_) => Err(Error::MalformedFragment(text.to_string())),
        Err(_) => scan_fragment(text),
    }
}

/// Decode a JSON array of fragments.
pub fn decode_bulk(text: &str) -> Result<Vec<Fragment>> {
    let value: Value =
        serde_json::from_str(text).map_err(|_| Error::MalformedFragment(text.to_string()))?;
    let Value::Array(items) = value else {
        return Err(Error::MalformedFragment(text.to_string()));
    };

    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => fragment_from_object(map, text),
            other => Err(Error::MalformedFragment(other.to_string())),
        })
        .collect()
}

/// Parse a JSON array of scalars (`["0"]`, `[1, "x"]`) into tokens.
pub fn parse_value_array(text: &str) -> Result<Vec<String>> {
    let value: Value =
        serde_json::from_str(text).map_err(|_| Error::MalformedValues(text.to_string()))?;
    tokens_from_value(&value).ok_or_else(|| Error::MalformedValues(text.to_string()))
}

fn fragment_from_object(map: &serde_json::Map<String, Value>, text: &str) -> Result<Fragment> {
    let id = ID_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .ok_or_else(|| Error::MalformedFragment(text.to_string()))?;

    let values = match VALUE_KEYS.iter().find_map(|key| map.get(*key)) {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            tokens_from_value(value).ok_or_else(|| Error::MalformedValues(value.to_string()))?,
        ),
    };

    Ok(Fragment {
        id: id.to_string(),
        values,
    })
}

/// Tokens from an array of scalars, or a lone scalar as a single token.
fn tokens_from_value(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => items.iter().map(scalar_token).collect(),
        other => scalar_token(other).map(|token| vec![token]),
    }
}

fn scalar_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Fallback for text that is not valid JSON.
fn scan_fragment(text: &str) -> Result<Fragment> {
    let id = ID_KEYS
        .iter()
        .find_map(|key| after_key(text, key).and_then(string_token))
        .ok_or_else(|| Error::MalformedFragment(text.to_string()))?;

    let values = match VALUE_KEYS
        .iter()
        .find_map(|key| after_key(text, key).and_then(balanced_array))
    {
        Some(array) => Some(parse_value_array(array)?),
        // Cut off before the closing bracket: treat as a read
        None => None,
    };

    Ok(Fragment { id, values })
}

/// Text following `"key" :`, if the key appears.
fn after_key<'t>(text: &'t str, key: &str) -> Option<&'t str> {
    let pattern = format!("\"{}\"", key);
    let mut from = 0;
    while let Some(pos) = text[from..].find(&pattern) {
        let after = from + pos + pattern.len();
        if let Some(rest) = text[after..].trim_start().strip_prefix(':') {
            return Some(rest.trim_start());
        }
        from = after;
    }
    None
}

/// A leading JSON string literal, unescaped.
fn string_token(text: &str) -> Option<String> {
    let body = text.strip_prefix('"')?;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            // `i` indexes `body`, one byte past the opening quote
            '"' => return serde_json::from_str(&text[..i + 2]).ok(),
            _ => {}
        }
    }
    None
}

/// A leading `[...]`, brackets inside strings ignored.
fn balanced_array(text: &str) -> Option<&str> {
    if !text.starts_with('[') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Store conveniences
// ─────────────────────────────────────────────────────────────────────────────

impl Store {
    pub fn encode_entity(&self, key: &str) -> Result<String> {
        self.read(|tables| encode_entity(tables, key))
    }

    pub fn encode_values_list(&self, key: &str) -> Result<String> {
        self.read(|tables| encode_values_list(tables, key))
    }

    pub fn encode_dump(&self) -> Result<String> {
        self.read(encode_dump)
    }

    pub fn encode_bulk_read(&self) -> Result<String> {
        self.read(encode_bulk_read)
    }

    /// Apply a write fragment, or just resolve a read, and return the
    /// entity's encoding afterwards.
    pub fn apply_fragment(&self, fragment: &Fragment) -> Result<String> {
        if let Some(values) = &fragment.values {
            self.set_values(&fragment.id, values.clone())?;
        }
        self.encode_entity(&fragment.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::eid::EID_LENGTH;
    use crate::store::{DEVICE, ENTITIES};

    fn store() -> Store {
        let store = Store::initialize(StoreConfig::default(), "test").unwrap();
        let mut batch = store.batch();
        batch
            .register("Current Measurand", EntityClass::Measurand, Some(r#"{"meU":"A"}"#))
            .register("=W01=PGC01", EntityClass::Sensor, None)
            .relate("=W01=PGC01", RelationKind::ChildOf, DEVICE)
            .register("L1 Current Series", EntityClass::Series, None)
            .relate("L1 Current Series", RelationKind::ChildOf, "=W01=PGC01")
            .relate("L1 Current Series", RelationKind::Measurand, "Current Measurand")
            .relate("L1 Current Series", RelationKind::Values, "L1 Current")
            .relate("L1 Current Series", RelationKind::Setpoint, "L1 Current Setpoint")
            .register("L1 Current Setpoint", EntityClass::Series, None)
            .relate("L1 Current Setpoint", RelationKind::Values, "L1 Current SP")
            .register("L1 Current", EntityClass::Value, None)
            .register("L1 Current SP", EntityClass::Value, None)
            .set_value("L1 Current", "0")
            .set_value("L1 Current SP", "5");
        for alarm in ["Lo", "Hi"] {
            let series = format!("L1 Current {} Alarm", alarm);
            let value = format!("L1 Current {}", alarm);
            batch
                .register(series.clone(), EntityClass::Series, None)
                .register(value.clone(), EntityClass::Value, None)
                .relate(series.clone(), RelationKind::Values, value.clone())
                .relate("L1 Current Series", RelationKind::Alarms, series)
                .set_value(value, if alarm == "Lo" { "-1" } else { "1" });
        }
        batch.commit().unwrap();
        store
    }

    #[test]
    fn test_value_round_trip() {
        let store = store();
        let text = store.encode_entity("L1 Current").unwrap();
        assert!(text.contains(r#""values":["0"]"#), "{}", text);

        let fragment = decode_fragment(&text).unwrap();
        let eid = store.lookup_by_name("L1 Current").unwrap();
        assert_eq!(Eid::parse(&fragment.id), Some(eid));
        assert_eq!(fragment.values, Some(vec!["0".to_string()]));
    }

    #[test]
    fn test_field_order() {
        let store = store();
        let text = store.encode_entity("L1 Current Series").unwrap();
        let position = |key: &str| text.find(&format!("\"{}\":", key)).unwrap();

        let keys = [
            "id", "name", "class", "values", "version", "parent", "measurand", "setpoint",
            "alarms",
        ];
        for pair in keys.windows(2) {
            assert!(position(pair[0]) < position(pair[1]), "{} before {}", pair[0], pair[1]);
        }
        assert!(!text.contains("\"metadata\""));
    }

    #[test]
    fn test_series_surfaces_related_values() {
        let store = store();
        let text = store.encode_entity("L1 Current Series").unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(doc["class"], "series");
        assert_eq!(doc["values"], serde_json::json!(["0"]));
        assert_eq!(doc["setpoint"], serde_json::json!(["5"]));
        assert_eq!(
            doc["parent"],
            store.lookup_by_name("=W01=PGC01").unwrap().to_string()
        );
        let alarms = doc["alarms"].as_array().unwrap();
        assert_eq!(alarms.len(), 2);
        assert_eq!(alarms[0]["values"], serde_json::json!(["-1"]));
        assert_eq!(alarms[1]["values"], serde_json::json!(["1"]));
    }

    #[test]
    fn test_missing_relationships_are_omitted() {
        let store = store();
        let text = store.encode_entity("L1 Current SP").unwrap();
        for key in ["parent", "measurand", "setpoint", "alarms", "metadata"] {
            assert!(!text.contains(&format!("\"{}\"", key)), "{} in {}", key, text);
        }

        let measurand: Value =
            serde_json::from_str(&store.encode_entity("Current Measurand").unwrap()).unwrap();
        assert_eq!(measurand["metadata"]["meU"], "A");
    }

    #[test]
    fn test_values_list_is_fixed_width() {
        let store = store();
        let text = store.encode_values_list(ENTITIES).unwrap();
        let ids: Vec<String> = serde_json::from_str(&text).unwrap();

        assert_eq!(ids.len(), store.entities_listing().len());
        assert!(ids.iter().all(|id| id.len() == EID_LENGTH));
        // Quoted ids joined by commas stride at a constant offset
        assert_eq!(text.len(), 2 + ids.len() * (EID_LENGTH + 3) - 1);
    }

    #[test]
    fn test_dump_and_bulk_read() {
        let store = store();
        let dump: Vec<Value> = serde_json::from_str(&store.encode_dump().unwrap()).unwrap();
        assert_eq!(dump.len(), store.len());
        assert_eq!(dump[0]["name"], DEVICE);

        let bulk: Vec<Value> = serde_json::from_str(&store.encode_bulk_read().unwrap()).unwrap();
        let names: Vec<&str> = bulk.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec![DEVICE, ENTITIES, "=W01=PGC01", "L1 Current Series"]
        );
    }

    #[test]
    fn test_decode_key_aliases() {
        let eid = Eid::from_name("Debug LED RGB");
        let fragment = decode_fragment(&format!(r#"{{"eID":"{}","v":["0A000A"]}}"#, eid)).unwrap();
        assert_eq!(Eid::parse(&fragment.id), Some(eid));
        assert_eq!(fragment.values, Some(vec!["0A000A".to_string()]));

        let fragment = decode_fragment(r#"{"eid":"Firmware Version","extra":true}"#).unwrap();
        assert_eq!(fragment.id, "Firmware Version");
        assert_eq!(fragment.values, None);

        let fragment = decode_fragment(r#"{"id":"L1 Current","values":[1.5, "x"]}"#).unwrap();
        assert_eq!(fragment.values, Some(vec!["1.5".to_string(), "x".to_string()]));
    }

    #[test]
    fn test_decode_without_id() {
        for text in [r#"{"values":["1"]}"#, "{}", "[1,2]", "not json", r#"{"id":5}"#] {
            assert!(
                matches!(decode_fragment(text), Err(Error::MalformedFragment(_))),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_decode_truncated_fragment() {
        let fragment = decode_fragment(r#"{"id":"L1 Current","values":["7"], "extra":"#).unwrap();
        assert_eq!(fragment.id, "L1 Current");
        assert_eq!(fragment.values, Some(vec!["7".to_string()]));

        // Closing bracket never arrived
        let fragment = decode_fragment(r#"{"id":"L1 Current","values":["7""#).unwrap();
        assert_eq!(fragment.values, None);

        let fragment = decode_fragment(r#"{ "id" : "a]b", "v" : ["x]", "y"] "#).unwrap();
        assert_eq!(fragment.id, "a]b");
        assert_eq!(fragment.values, Some(vec!["x]".to_string(), "y".to_string()]));
    }

    #[test]
    fn test_truncated_id_is_unescaped() {
        let complete = decode_fragment(r#"{"id":"Say \"hi\"","v":["1"]}"#).unwrap();
        let truncated = decode_fragment(r#"{"id":"Say \"hi\"","v":["1"]"#).unwrap();
        assert_eq!(complete.id, "Say \"hi\"");
        assert_eq!(truncated, complete);

        let fragment = decode_fragment(r#"{"eID":"caf\u00e9 \\ A","v":"#).unwrap();
        assert_eq!(fragment.id, "café \\ A");
        assert_eq!(fragment.values, None);
    }

    #[test]
    fn test_decode_bad_values() {
        let err = decode_fragment(r#"{"id":"L1 Current","values":[["nested"]]}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedValues(_)));
    }

    #[test]
    fn test_decode_bulk() {
        let fragments =
            decode_bulk(r#"[{"id":"A","values":["1"]},{"eID":"B"}]"#).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].values, Some(vec!["1".to_string()]));
        assert_eq!(fragments[1].id, "B");

        assert!(decode_bulk(r#"{"id":"A"}"#).is_err());
        assert!(decode_bulk(r#"[{"values":["1"]}]"#).is_err());
    }

    #[test]
    fn test_bulk_read_shorthand() {
        assert!(is_bulk_read("{}"));
        assert!(is_bulk_read("  { \t }\r\n"));
        assert!(!is_bulk_read(r#"{"id":"x"}"#));
        assert!(!is_bulk_read("{"));
    }

    #[test]
    fn test_apply_fragment() {
        let store = store();
        let fragment = decode_fragment(r#"{"id":"L1 Current Series","values":["2.5"]}"#).unwrap();
        let echo = store.apply_fragment(&fragment).unwrap();
        let doc: Value = serde_json::from_str(&echo).unwrap();

        assert_eq!(doc["values"], serde_json::json!(["2.5"]));
        assert_eq!(store.get_as_number("L1 Current"), 2.5);
    }
}
