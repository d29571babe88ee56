//! Executor errors.
//!
//! One error type covers resolution, planning, and execution: the
//! user-visible surface is a single kind plus message per statement.
//! `RECORD_EOF` is not here — end of stream is the `None` arm of
//! `next()`, never an error.

use std::fmt;

use crate::catalog::CatalogError;
use crate::record::StorageError;
use crate::types::CastError;

/// Errors from statement resolution, planning, and execution.
#[derive(Debug)]
pub enum ExecutorError {
    /// Referenced table does not exist.
    TableNotFound { name: String },

    /// Referenced field cannot be resolved against the tables in scope.
    FieldNotFound { name: String },

    /// Type mismatch in an expression or a value/column pairing.
    TypeMismatch { expected: String, found: String },

    /// INSERT row arity does not match the table's user field count.
    ValueCountMismatch { expected: usize, found: usize },

    /// An argument is structurally invalid (for example a CHAR value
    /// longer than the column's declared capacity).
    InvalidArgument(String),

    /// A scalar subquery produced more than one row.
    SubqueryTooManyRows,

    /// The requested path is not implemented; callers with a fallback
    /// (the vectorized scan) retry row-wise instead of failing.
    Unimplemented(&'static str),

    /// Invariant violation inside the engine.
    Internal(String),

    /// Cast failure.
    Cast(CastError),

    /// Catalog failure.
    Catalog(CatalogError),

    /// Storage failure, propagated as-is.
    Storage(StorageError),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::TableNotFound { name } => {
                write!(f, "table \"{}\" does not exist", name)
            }
            ExecutorError::FieldNotFound { name } => {
                write!(f, "field \"{}\" does not exist", name)
            }
            ExecutorError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            ExecutorError::ValueCountMismatch { expected, found } => {
                write!(f, "expected {} values, got {}", expected, found)
            }
            ExecutorError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            ExecutorError::SubqueryTooManyRows => {
                write!(f, "scalar subquery produced more than one row")
            }
            ExecutorError::Unimplemented(what) => write!(f, "unimplemented: {}", what),
            ExecutorError::Internal(msg) => write!(f, "internal error: {}", msg),
            ExecutorError::Cast(e) => write!(f, "{}", e),
            ExecutorError::Catalog(e) => write!(f, "{}", e),
            ExecutorError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Cast(e) => Some(e),
            ExecutorError::Catalog(e) => Some(e),
            ExecutorError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CastError> for ExecutorError {
    fn from(e: CastError) -> Self {
        ExecutorError::Cast(e)
    }
}

impl From<CatalogError> for ExecutorError {
    fn from(e: CatalogError) -> Self {
        ExecutorError::Catalog(e)
    }
}

impl From<StorageError> for ExecutorError {
    fn from(e: StorageError) -> Self {
        ExecutorError::Storage(e)
    }
}
