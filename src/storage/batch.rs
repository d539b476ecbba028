// ============================================================================
// Write Batches
// ============================================================================
//
// A batch is the unit of atomicity offered by the datastore: every change in
// it is applied, or none is. Merge resolutions and restores are expressed as
// batches so a failure can never leave half of a decision in the table.
//
// ============================================================================

use crate::core::{ApnRecord, RowId};

/// A single row mutation inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Insert a new row; the record must not carry an id
    Insert(ApnRecord),

    /// Overwrite an existing row; the record's id selects the row
    Replace(ApnRecord),

    /// Physically remove a row
    Delete(RowId),
}

impl Change {
    /// Row touched by this change, when it already exists
    pub fn target(&self) -> Option<RowId> {
        match self {
            Change::Insert(_) => None,
            Change::Replace(rec) => rec.id,
            Change::Delete(id) => Some(*id),
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Change::Delete(_))
    }
}

/// Ordered list of changes applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    changes: Vec<Change>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ApnRecord) -> &mut Self {
        self.changes.push(Change::Insert(record));
        self
    }

    pub fn replace(&mut self, record: ApnRecord) -> &mut Self {
        self.changes.push(Change::Replace(record));
        self
    }

    pub fn delete(&mut self, id: RowId) -> &mut Self {
        self.changes.push(Change::Delete(id));
        self
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// What a successfully applied batch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Ids assigned to inserted rows, in batch order
    pub inserted: Vec<RowId>,
    pub replaced: usize,
    pub deleted: usize,
}
