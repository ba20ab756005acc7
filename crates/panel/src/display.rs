//! Redraw helpers: change tracking and value formatting.

use std::collections::HashMap;
use std::fmt;

use snon::SharedStore;

/// Remembers the last seen version of each watched entity so a display only
/// redraws fields that changed.
#[derive(Debug)]
pub struct ChangeTracker {
    store: SharedStore,
    seen: HashMap<String, u64>,
}

impl ChangeTracker {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            seen: HashMap::new(),
        }
    }

    /// True when `key` changed since the previous poll, and on the first
    /// poll of a key. Unknown keys never report a change.
    pub fn poll(&mut self, key: &str) -> bool {
        let Ok(version) = self.store.get_changed_at(key) else {
            return false;
        };
        match self.seen.insert(key.to_string(), version) {
            Some(previous) => previous != version,
            None => true,
        }
    }

    /// Keys among `keys` that changed since their previous poll.
    pub fn poll_all<'k>(&mut self, keys: impl IntoIterator<Item = &'k str>) -> Vec<&'k str> {
        keys.into_iter().filter(|key| self.poll(key)).collect()
    }

    /// Forget every version so the next poll redraws everything.
    pub fn invalidate(&mut self) {
        self.seen.clear();
    }
}

/// A reading scaled into an SI magnitude band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scaled {
    pub digits: String,
    pub prefix: &'static str,
}

impl fmt::Display for Scaled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.digits, self.prefix)
    }
}

/// Scale a reading for a three-character display field.
pub fn format_si(value: f64) -> Scaled {
    let magnitude = value.abs();
    let (digits, prefix) = if magnitude >= 1_000_000.0 {
        (format!("{:.1}", value / 1_000_000.0), "M")
    } else if magnitude >= 10_000.0 {
        (format!("{:.0}", (value / 1000.0).round()), "k")
    } else if magnitude >= 1000.0 {
        (format!("{:.1}", value / 1000.0), "k")
    } else if magnitude >= 10.0 {
        (format!("{:.0}", value.round()), "")
    } else if magnitude >= 0.1 {
        (format!("{:.1}", value), "")
    } else if magnitude > 0.0001 {
        (format!("{:.1}", value * 1000.0), "m")
    } else if value == 0.0 {
        ("0".to_string(), "")
    } else {
        (format!("{:.1}", value * 1_000_000.0), "µ")
    };
    Scaled { digits, prefix }
}
