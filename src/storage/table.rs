use super::batch::{BatchOutcome, Change, WriteBatch};
use crate::core::{ApnRecord, DbError, Order, Predicate, Result, RowId};
use im::OrdMap;

/// Persistent-map backed APN table.
///
/// Clones share structure, so a snapshot costs O(1).
#[derive(Debug, Clone)]
pub struct ApnTable {
    rows: OrdMap<RowId, ApnRecord>,
    next_row_id: u64,
}

impl Default for ApnTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ApnTable {
    pub fn new() -> Self {
        Self {
            rows: OrdMap::new(),
            next_row_id: 1,
        }
    }

    pub fn get(&self, id: RowId) -> Option<&ApnRecord> {
        self.rows.get(&id)
    }

    pub fn insert(&mut self, mut record: ApnRecord) -> Result<RowId> {
        if let Some(id) = record.id {
            return Err(DbError::InvalidInput(format!(
                "insert of a record that already carries id {}",
                id
            )));
        }

        let id = RowId(self.next_row_id);
        self.next_row_id += 1;

        record.id = Some(id);
        self.rows.insert(id, record);
        Ok(id)
    }

    pub fn replace(&mut self, record: ApnRecord) -> Result<()> {
        let id = record
            .id
            .ok_or_else(|| DbError::InvalidInput("replace of a record without id".into()))?;

        if !self.rows.contains_key(&id) {
            return Err(DbError::NotFound(format!("row {}", id)));
        }
        self.rows.insert(id, record);
        Ok(())
    }

    pub fn remove(&mut self, id: RowId) -> Option<ApnRecord> {
        self.rows.remove(&id)
    }

    pub fn delete_matching(&mut self, predicate: &Predicate) -> usize {
        let doomed: Vec<RowId> = self
            .rows
            .iter()
            .filter(|(_, rec)| predicate.matches(rec))
            .map(|(id, _)| *id)
            .collect();

        for id in &doomed {
            self.rows.remove(id);
        }
        doomed.len()
    }

    /// Rows matching `predicate`, tombstones included.
    pub fn scan(&self, predicate: &Predicate, order: Order) -> Vec<ApnRecord> {
        let matching = self.rows.values().filter(|rec| predicate.matches(rec)).cloned();
        match order {
            Order::IdAscending => matching.collect(),
            Order::IdDescending => {
                let mut rows: Vec<ApnRecord> = matching.collect();
                rows.reverse();
                rows
            }
        }
    }

    /// Apply every change or none of them.
    ///
    /// Works on a structural copy and only swaps it in once all changes
    /// succeeded.
    pub fn apply(&mut self, batch: WriteBatch) -> Result<BatchOutcome> {
        let mut staged = self.clone();
        let mut outcome = BatchOutcome::default();

        for change in batch.into_changes() {
            match change {
                Change::Insert(record) => {
                    let id = staged.insert(record)?;
                    outcome.inserted.push(id);
                }
                Change::Replace(record) => {
                    staged.replace(record)?;
                    outcome.replaced += 1;
                }
                Change::Delete(id) => {
                    if staged.remove(id).is_none() {
                        return Err(DbError::NotFound(format!("row {}", id)));
                    }
                    outcome.deleted += 1;
                }
            }
        }

        *self = staged;
        Ok(outcome)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
