//! Catalog errors.

use std::fmt;

/// Errors from catalog lookups and DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A table with this name already exists.
    TableExists { name: String },

    /// Referenced table does not exist.
    TableNotFound { name: String },

    /// Referenced field does not exist in the table.
    FieldNotFound { table: String, field: String },

    /// An index with this name already exists on the table.
    IndexExists { name: String },

    /// Referenced index does not exist.
    IndexNotFound { name: String },

    /// The table definition is invalid (empty columns, duplicate names,
    /// zero-length CHAR, and so on).
    InvalidTableDef(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::TableExists { name } => {
                write!(f, "table \"{}\" already exists", name)
            }
            CatalogError::TableNotFound { name } => {
                write!(f, "table \"{}\" does not exist", name)
            }
            CatalogError::FieldNotFound { table, field } => {
                write!(f, "field \"{}.{}\" does not exist", table, field)
            }
            CatalogError::IndexExists { name } => {
                write!(f, "index \"{}\" already exists", name)
            }
            CatalogError::IndexNotFound { name } => {
                write!(f, "index \"{}\" does not exist", name)
            }
            CatalogError::InvalidTableDef(msg) => {
                write!(f, "invalid table definition: {}", msg)
            }
        }
    }
}

impl std::error::Error for CatalogError {}
