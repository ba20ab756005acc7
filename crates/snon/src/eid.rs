//! Entity identifiers and structured names.
//!
//! Every entity is addressed by an eID: the URN form of a name-based (SHA-1)
//! UUID derived from the entity name. The encoding is always exactly
//! [`EID_LENGTH`] ASCII bytes, so listings of eIDs can be strided by a fixed
//! offset.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Prefix of every encoded eID.
pub const URN_PREFIX: &str = "urn:uuid:";

/// Encoded length of an eID: the prefix plus a hyphenated UUID.
pub const EID_LENGTH: usize = 45;

/// Namespace for name-based eIDs.
pub const SNON_NAMESPACE: Uuid = Uuid::from_u128(0x5d1c_2a7e_3f40_4b8a_9c61_e0f3_84b2_17d9);

/// Fixed-width entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Eid(Uuid);

impl Eid {
    /// Derive the eID for an entity name. The same name always yields the
    /// same eID.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&SNON_NAMESPACE, name.as_bytes()))
    }

    /// Parse an encoded eID, either in URN form (prefix matched
    /// case-insensitively) or as a bare UUID.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let uuid = match text.get(..URN_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(URN_PREFIX) => &text[URN_PREFIX.len()..],
            _ => text,
        };
        Uuid::try_parse(uuid).ok().map(Self)
    }

    /// Quick check used to decide whether a lookup key is an eID or a name.
    pub fn looks_like_eid(text: &str) -> bool {
        text.get(..URN_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(URN_PREFIX))
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:X}", URN_PREFIX, self.0.hyphenated())
    }
}

impl FromStr for Eid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::UnknownEntity(s.to_string()))
    }
}

impl Serialize for Eid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Eid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid eID: {}", text)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IEC 81346 designations
// ─────────────────────────────────────────────────────────────────────────────

/// A structured location designator such as `=W01=WBA01=PFA01`.
///
/// Only the shape is checked: every segment starts with `=` and carries a
/// non-empty alphanumeric code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Designation {
    text: String,
    /// Byte offsets of each `=` that starts a segment
    starts: Vec<usize>,
}

impl Designation {
    pub fn parse(text: &str) -> Result<Self> {
        if !text.starts_with('=') {
            return Err(Error::InvalidDesignation(text.to_string()));
        }

        let starts: Vec<usize> = text.match_indices('=').map(|(i, _)| i).collect();
        for (n, &start) in starts.iter().enumerate() {
            let end = starts.get(n + 1).copied().unwrap_or(text.len());
            let code = &text[start + 1..end];
            if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(Error::InvalidDesignation(text.to_string()));
            }
        }

        Ok(Self {
            text: text.to_string(),
            starts,
        })
    }

    /// Number of segments (`=W01=WBA01` has depth 2).
    pub fn depth(&self) -> usize {
        self.starts.len()
    }

    /// The enclosing designation, or `None` for a top-level one.
    pub fn parent(&self) -> Option<&str> {
        if self.depth() < 2 {
            return None;
        }
        let last = self.starts[self.starts.len() - 1];
        Some(&self.text[..last])
    }
}

impl fmt::Display for Designation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
