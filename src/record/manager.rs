//! The record manager collaborator contract.
//!
//! The query core requires this narrow interface of the storage layer:
//! transactional scans, the three record mutation hooks, and enough index
//! management to answer point-equality lookups. Everything behind it
//! (pages, caching, persistence, locking) is the record manager's own
//! business.

use std::fmt;
use std::sync::Arc;

use crate::catalog::{IndexMeta, Table};

use super::error::StorageError;
use super::trx::Trx;

/// Shared handle to the record manager, threaded through operators.
pub type EngineRef = Arc<dyn RecordManager>;

/// Record identifier, stable while the record is live in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rid(pub u64);

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rid#{}", self.0)
    }
}

/// A physical tuple as delivered by the storage engine: raw bytes plus a
/// stable id. Field decoding uses the table's offsets (see
/// [`codec`](super::codec)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Stable record id.
    pub rid: Rid,
    /// Raw record bytes, `TableMeta::record_size` long.
    pub data: Vec<u8>,
}

/// An equality lookup the scan can satisfy from an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHint {
    /// Index name.
    pub index: String,
    /// Encoded key bytes (the concatenated fixed-width cells of the key
    /// fields, in index order).
    pub key: Vec<u8>,
}

/// Pull-based record iterator returned by [`RecordManager::scan`].
pub trait RecordScanner {
    /// Returns the next record, or `None` when the scan is exhausted.
    fn next(&mut self) -> Result<Option<Record>, StorageError>;
}

/// Storage engine contract required by the query core.
///
/// Only these calls may block on disk or transaction locks; expression
/// evaluation, planning, and resolution never reach storage.
pub trait RecordManager: Send + Sync {
    /// Starts a transaction.
    fn begin(&self) -> Trx;

    /// Commits a transaction.
    fn commit(&self, trx: &Trx) -> Result<(), StorageError>;

    /// Rolls a transaction back, undoing its record mutations.
    fn rollback(&self, trx: &Trx) -> Result<(), StorageError>;

    /// Allocates storage for a newly created table.
    fn create_table(&self, table: &Table) -> Result<(), StorageError>;

    /// Releases a table's storage.
    fn drop_table(&self, name: &str) -> Result<(), StorageError>;

    /// Builds an index from a full scan of the table's current records.
    fn create_index(&self, trx: &Trx, table: &Table, index: &IndexMeta)
        -> Result<(), StorageError>;

    /// Removes an index.
    fn drop_index(&self, table: &Table, index_name: &str) -> Result<(), StorageError>;

    /// Opens a record scan.
    ///
    /// With an [`IndexHint`] the scan returns only records whose key
    /// fields equal the hint key; otherwise every record, in a stable
    /// order within the transaction.
    fn scan(
        &self,
        trx: &Trx,
        table: &Table,
        hint: Option<&IndexHint>,
    ) -> Result<Box<dyn RecordScanner>, StorageError>;

    /// Inserts a record, maintaining every index on the table.
    fn insert_record(&self, trx: &Trx, table: &Table, data: Vec<u8>)
        -> Result<Rid, StorageError>;

    /// Deletes a record by id.
    fn delete_record(&self, trx: &Trx, table: &Table, rid: Rid) -> Result<(), StorageError>;

    /// Replaces a record's bytes in place, maintaining indexes.
    fn update_record(
        &self,
        trx: &Trx,
        table: &Table,
        rid: Rid,
        data: Vec<u8>,
    ) -> Result<(), StorageError>;
}
