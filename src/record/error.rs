//! Storage-layer errors.

use std::fmt;

use super::manager::Rid;

/// Errors surfaced by a record manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The relation has no storage (not created or already dropped).
    TableMissing { name: String },

    /// The record id does not name a live record.
    RecordMissing { rid: Rid },

    /// A unique index rejected a duplicate key.
    DuplicateKey { index: String },

    /// Record bytes do not match the table layout.
    InvalidRecord(String),

    /// The transaction is not active.
    TrxNotActive { id: u64 },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::TableMissing { name } => {
                write!(f, "no storage for table \"{}\"", name)
            }
            StorageError::RecordMissing { rid } => {
                write!(f, "record {} does not exist", rid)
            }
            StorageError::DuplicateKey { index } => {
                write!(f, "duplicate key violates unique index \"{}\"", index)
            }
            StorageError::InvalidRecord(msg) => {
                write!(f, "invalid record: {}", msg)
            }
            StorageError::TrxNotActive { id } => {
                write!(f, "transaction {} is not active", id)
            }
        }
    }
}

impl std::error::Error for StorageError {}
