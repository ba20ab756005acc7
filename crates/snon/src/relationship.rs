//! Typed directed edges between entities.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::eid::Eid;
use crate::error::{Error, Result};

/// Relationship kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Source is located under / belongs to the target
    ChildOf,
    /// Target describes the source's unit and type
    Measurand,
    /// Target holds the source series' current values
    Values,
    /// Target is the source series' setpoint series
    Setpoint,
    /// Target is one of the source series' alarm threshold series
    Alarms,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::ChildOf => write!(f, "child_of"),
            RelationKind::Measurand => write!(f, "measurand"),
            RelationKind::Values => write!(f, "values"),
            RelationKind::Setpoint => write!(f, "setpoint"),
            RelationKind::Alarms => write!(f, "alarms"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Relationship {
    pub from: Eid,
    pub kind: RelationKind,
    pub to: Eid,
}

/// Append-only edge list with forward and reverse adjacency.
///
/// Adjacency lists hold edge slots in insertion order, so every traversal is
/// deterministic.
#[derive(Debug, Clone)]
pub struct RelationshipIndex {
    edges: Vec<Relationship>,
    present: HashSet<Relationship>,
    outgoing: HashMap<Eid, Vec<usize>>,
    incoming: HashMap<Eid, Vec<usize>>,
    capacity: usize,
}

impl RelationshipIndex {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            edges: Vec::with_capacity(capacity),
            present: HashSet::with_capacity(capacity),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Append an edge. Endpoints must already be resolved by the caller.
    ///
    /// Returns `false` when the identical edge is already present.
    pub fn add(&mut self, from: Eid, kind: RelationKind, to: Eid) -> Result<bool> {
        let edge = Relationship { from, kind, to };
        if self.present.contains(&edge) {
            return Ok(false);
        }
        if self.edges.len() >= self.capacity {
            return Err(Error::TableFull {
                table: "relationship",
                capacity: self.capacity,
                name: format!("{} {} {}", from, kind, to),
            });
        }

        let slot = self.edges.len();
        self.edges.push(edge);
        self.present.insert(edge);
        self.outgoing.entry(from).or_default().push(slot);
        self.incoming.entry(to).or_default().push(slot);
        Ok(true)
    }

    /// Targets of `from`'s edges of `kind`, in insertion order.
    pub fn relationships_of(&self, from: Eid, kind: RelationKind) -> Vec<Eid> {
        self.outgoing
            .get(&from)
            .into_iter()
            .flatten()
            .map(|&slot| self.edges[slot])
            .filter(|edge| edge.kind == kind)
            .map(|edge| edge.to)
            .collect()
    }

    /// First target of a single-valued relationship.
    pub fn first_of(&self, from: Eid, kind: RelationKind) -> Option<Eid> {
        self.outgoing
            .get(&from)?
            .iter()
            .map(|&slot| self.edges[slot])
            .find(|edge| edge.kind == kind)
            .map(|edge| edge.to)
    }

    /// Sources whose `kind` edge points at `to`, in insertion order.
    pub fn sources_of(&self, to: Eid, kind: RelationKind) -> Vec<Eid> {
        self.incoming
            .get(&to)
            .into_iter()
            .flatten()
            .map(|&slot| self.edges[slot])
            .filter(|edge| edge.kind == kind)
            .map(|edge| edge.from)
            .collect()
    }

    /// Direct children: sources of CHILD_OF edges targeting `parent`.
    pub fn children_of(&self, parent: Eid) -> Vec<Eid> {
        self.sources_of(parent, RelationKind::ChildOf)
    }

    /// `root` followed by everything reachable through reversed CHILD_OF
    /// edges, depth-first pre-order. Each entity appears once even if it has
    /// several parents or the edges form a cycle.
    pub fn descendants(&self, root: Eid) -> Vec<Eid> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root];

        while let Some(eid) = stack.pop() {
            if !visited.insert(eid) {
                continue;
            }
            order.push(eid);

            // Reverse so the first-inserted child is visited first
            let children = self.children_of(eid);
            stack.extend(children.into_iter().rev());
        }

        order
    }

    pub fn clear(&mut self) {
        self.edges.clear();
        self.present.clear();
        self.outgoing.clear();
        self.incoming.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eid(name: &str) -> Eid {
        Eid::from_name(name)
    }

    #[test]
    fn test_alarm_order_preserved() {
        let mut index = RelationshipIndex::with_capacity(16);
        let series = eid("L1 Current Series");
        for alarm in ["LoLo", "Lo", "Hi", "HiHi"] {
            let target = eid(&format!("L1 Current {} Alarm", alarm));
            assert!(index.add(series, RelationKind::Alarms, target).unwrap());
        }

        assert_eq!(
            index.relationships_of(series, RelationKind::Alarms),
            vec![
                eid("L1 Current LoLo Alarm"),
                eid("L1 Current Lo Alarm"),
                eid("L1 Current Hi Alarm"),
                eid("L1 Current HiHi Alarm"),
            ]
        );
    }

    #[test]
    fn test_identical_edge_is_noop() {
        let mut index = RelationshipIndex::with_capacity(4);
        assert!(index.add(eid("a"), RelationKind::ChildOf, eid("b")).unwrap());
        assert!(!index.add(eid("a"), RelationKind::ChildOf, eid("b")).unwrap());
        assert_eq!(index.len(), 1);
        assert_eq!(index.children_of(eid("b")), vec![eid("a")]);
    }

    #[test]
    fn test_filter_by_kind() {
        let mut index = RelationshipIndex::with_capacity(8);
        let series = eid("Device Uptime Series");
        index.add(series, RelationKind::Measurand, eid("Seconds Measurand")).unwrap();
        index.add(series, RelationKind::ChildOf, eid("Device Uptime Sensor")).unwrap();
        index.add(series, RelationKind::Values, eid("Device Uptime")).unwrap();

        assert_eq!(
            index.relationships_of(series, RelationKind::Values),
            vec![eid("Device Uptime")]
        );
        assert_eq!(
            index.first_of(series, RelationKind::Measurand),
            Some(eid("Seconds Measurand"))
        );
        assert_eq!(index.first_of(series, RelationKind::Setpoint), None);
        assert!(index.relationships_of(eid("unknown"), RelationKind::Values).is_empty());
    }

    #[test]
    fn test_capacity() {
        let mut index = RelationshipIndex::with_capacity(1);
        index.add(eid("a"), RelationKind::ChildOf, eid("b")).unwrap();
        let err = index.add(eid("c"), RelationKind::ChildOf, eid("b")).unwrap_err();
        assert!(matches!(err, Error::TableFull { table: "relationship", .. }));
        // Duplicates are still accepted as no-ops when full
        assert!(!index.add(eid("a"), RelationKind::ChildOf, eid("b")).unwrap());
        assert_eq!(index.children_of(eid("b")), vec![eid("a")]);
    }

    #[test]
    fn test_descendants_depth_first_insertion_order() {
        let mut index = RelationshipIndex::with_capacity(16);
        let root = eid("Device");
        index.add(eid("Entities"), RelationKind::ChildOf, root).unwrap();
        index.add(eid("Sensor A"), RelationKind::ChildOf, root).unwrap();
        index.add(eid("Series A"), RelationKind::ChildOf, eid("Sensor A")).unwrap();
        index.add(eid("Sensor B"), RelationKind::ChildOf, root).unwrap();
        // Not CHILD_OF: must not be followed
        index.add(eid("Series A"), RelationKind::Values, eid("Value A")).unwrap();

        assert_eq!(
            index.descendants(root),
            vec![
                root,
                eid("Entities"),
                eid("Sensor A"),
                eid("Series A"),
                eid("Sensor B"),
            ]
        );
    }

    #[test]
    fn test_descendants_tolerates_cycles() {
        let mut index = RelationshipIndex::with_capacity(4);
        index.add(eid("a"), RelationKind::ChildOf, eid("b")).unwrap();
        index.add(eid("b"), RelationKind::ChildOf, eid("a")).unwrap();
        assert_eq!(index.descendants(eid("a")), vec![eid("a"), eid("b")]);
    }
}
