//! Atomic wiring batches.
//!
//! Boot wiring routinely names entities before they are registered (a child
//! wired to a parent registered two lines later, a series wired to its
//! value before the value exists). A [`Batch`] queues registrations, edges
//! and value writes and applies them in order against a staged copy of the
//! tables; the store only changes if every step succeeds.

use tracing::{debug, warn};

use crate::entity::EntityClass;
use crate::error::Result;
use crate::relationship::RelationKind;
use crate::store::{Store, parse_metadata};

#[derive(Debug, Clone)]
enum Op {
    Register {
        name: String,
        class: EntityClass,
        metadata: Option<String>,
    },
    Relate {
        from: String,
        kind: RelationKind,
        to: String,
    },
    SetValues {
        key: String,
        values: Vec<String>,
    },
}

/// Counts of what a committed batch changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub registered: usize,
    pub relationships: usize,
    pub updates: usize,
}

/// Queued store operations. Nothing is visible until [`Batch::commit`].
#[derive(Debug)]
pub struct Batch<'a> {
    store: &'a Store,
    ops: Vec<Op>,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            ops: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        class: EntityClass,
        metadata: Option<&str>,
    ) -> &mut Self {
        self.ops.push(Op::Register {
            name: name.into(),
            class,
            metadata: metadata.map(str::to_string),
        });
        self
    }

    /// Queue `from --kind--> to`. Either end may be registered later in the
    /// same batch.
    pub fn relate(
        &mut self,
        from: impl Into<String>,
        kind: RelationKind,
        to: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(Op::Relate {
            from: from.into(),
            kind,
            to: to.into(),
        });
        self
    }

    pub fn set_values(&mut self, key: impl Into<String>, values: Vec<String>) -> &mut Self {
        self.ops.push(Op::SetValues {
            key: key.into(),
            values,
        });
        self
    }

    pub fn set_value(&mut self, key: impl Into<String>, token: impl Into<String>) -> &mut Self {
        self.set_values(key, vec![token.into()])
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every queued operation as a unit.
    ///
    /// Registrations run first in queue order, then edges, then value
    /// writes, so forward references inside the batch resolve. On error the
    /// store is left exactly as it was.
    pub fn commit(self) -> Result<BatchSummary> {
        let Batch { store, ops } = self;
        let mut summary = BatchSummary::default();

        let result = store.write(|tables| -> Result<()> {
            let mut staged = tables.clone();

            for op in &ops {
                if let Op::Register {
                    name,
                    class,
                    metadata,
                } = op
                {
                    let metadata = parse_metadata(name, metadata.as_deref())?;
                    if staged.register(name, *class, metadata)?.is_new() {
                        summary.registered += 1;
                    }
                }
            }

            for op in &ops {
                if let Op::Relate { from, kind, to } = op {
                    if staged.add_relationship(from, *kind, to)? {
                        summary.relationships += 1;
                    }
                }
            }

            for op in &ops {
                if let Op::SetValues { key, values } = op {
                    staged.set_values(key, values.clone())?;
                    summary.updates += 1;
                }
            }

            *tables = staged;
            Ok(())
        });

        match result {
            Ok(()) => {
                debug!(
                    "Committed batch: {} registered, {} relationships, {} updates",
                    summary.registered, summary.relationships, summary.updates
                );
                Ok(summary)
            }
            Err(e) => {
                warn!("Batch rejected: {}", e);
                Err(e)
            }
        }
    }
}
