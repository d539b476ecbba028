use super::batch::{BatchOutcome, WriteBatch};
use crate::core::{ApnRecord, Order, Predicate, Result, RowId};
use async_trait::async_trait;

/// Storage engine trait - allows pluggable row stores behind the provider
///
/// Every method is individually atomic. Reads see tombstones; hiding them is
/// the provider's job.
#[async_trait]
pub trait ApnStore: Send + Sync {
    /// Fetch one row by id
    async fn get(&self, id: RowId) -> Result<Option<ApnRecord>>;

    /// Insert (no id) or overwrite (id present) a row
    async fn put(&self, record: ApnRecord) -> Result<RowId>;

    /// Remove every row matching the predicate
    async fn delete(&self, predicate: &Predicate) -> Result<usize>;

    /// Scan rows matching the predicate
    async fn query(&self, predicate: &Predicate, order: Order) -> Result<Vec<ApnRecord>>;

    /// Apply a batch all-or-nothing
    async fn apply(&self, batch: WriteBatch) -> Result<BatchOutcome>;

    /// Physical row count, tombstones included
    async fn row_count(&self) -> Result<usize>;
}
