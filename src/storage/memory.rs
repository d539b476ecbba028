use super::batch::{BatchOutcome, WriteBatch};
use super::engine::ApnStore;
use super::table::ApnTable;
use crate::core::{ApnRecord, Order, Predicate, Result, RowId};
use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;

/// In-memory row store
///
/// Writers take the lock exclusively; readers clone the persistent map and
/// scan it after the lock is released.
#[derive(Debug, Default)]
pub struct InMemoryApnStore {
    table: RwLock<ApnTable>,
}

impl InMemoryApnStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(ApnTable::new()),
        }
    }

    /// Seed a store from rows; existing ids are discarded.
    pub fn with_rows(rows: impl IntoIterator<Item = ApnRecord>) -> Result<Self> {
        let mut table = ApnTable::new();
        for mut rec in rows {
            rec.id = None;
            table.insert(rec)?;
        }
        Ok(Self {
            table: RwLock::new(table),
        })
    }

    /// Consistent point-in-time copy of the whole table.
    pub async fn snapshot(&self) -> ApnTable {
        self.table.read().await.clone()
    }
}

#[async_trait]
impl ApnStore for InMemoryApnStore {
    async fn get(&self, id: RowId) -> Result<Option<ApnRecord>> {
        Ok(self.table.read().await.get(id).cloned())
    }

    async fn put(&self, record: ApnRecord) -> Result<RowId> {
        let mut table = self.table.write().await;
        match record.id {
            Some(id) => {
                table.replace(record)?;
                Ok(id)
            }
            None => table.insert(record),
        }
    }

    async fn delete(&self, predicate: &Predicate) -> Result<usize> {
        let removed = self.table.write().await.delete_matching(predicate);
        debug!("store delete removed {} rows", removed);
        Ok(removed)
    }

    async fn query(&self, predicate: &Predicate, order: Order) -> Result<Vec<ApnRecord>> {
        let snapshot = self.snapshot().await;
        Ok(snapshot.scan(predicate, order))
    }

    async fn apply(&self, batch: WriteBatch) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let size = batch.len();
        let outcome = self.table.write().await.apply(batch)?;
        debug!("store applied batch of {} changes: {:?}", size, outcome);
        Ok(outcome)
    }

    async fn row_count(&self) -> Result<usize> {
        Ok(self.table.read().await.row_count())
    }
}
