//! The `Store` trait.
//!
//! This is the seam between the engine and whatever relational store
//! backs it. Implementations must support primary keys, unique
//! constraints, foreign keys, and job-scoped transactions; everything
//! else (isolation, collation) is theirs to define.

use async_trait::async_trait;

use trellis_common::{Record, Value};

use crate::error::StoreResult;
use crate::selection::Selection;

/// A relational store the engine can run against.
#[async_trait]
pub trait Store: Send + Sync {
    /// Runs a bounded read and returns matching records.
    async fn select(&self, selection: &Selection) -> StoreResult<Vec<Record>>;

    /// Counts the records a selection matches, ignoring its bounds.
    async fn count(&self, selection: &Selection) -> StoreResult<u64>;

    /// Inserts one record and returns it as stored (with any
    /// store-generated key filled in).
    async fn insert(&self, table: &str, record: Record) -> StoreResult<Record>;

    /// Updates the record whose `pk_field` equals `id` with the given
    /// changes. Returns the updated record, or `None` if absent.
    async fn update(
        &self,
        table: &str,
        pk_field: &str,
        id: &Value,
        changes: Record,
    ) -> StoreResult<Option<Record>>;

    /// Deletes the record whose `pk_field` equals `id`. Returns true
    /// if a record was removed.
    async fn delete(&self, table: &str, pk_field: &str, id: &Value) -> StoreResult<bool>;

    /// Opens a job transaction for bulk inserts into one table.
    ///
    /// A failed insert inside the job stages nothing and leaves the
    /// job usable; `commit` publishes every staged row atomically.
    /// This is the contract CSV import's row isolation rests on.
    async fn begin_job(&self, table: &str) -> StoreResult<Box<dyn JobTransaction>>;
}

/// A job-scoped bulk-insert transaction.
#[async_trait]
pub trait JobTransaction: Send {
    /// Attempts to stage one record. Constraint checks run against
    /// committed data plus rows already staged in this job.
    async fn insert(&mut self, record: Record) -> StoreResult<Record>;

    /// Publishes all staged rows. Returns how many were committed.
    async fn commit(self: Box<Self>) -> StoreResult<u64>;

    /// Discards all staged rows.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
