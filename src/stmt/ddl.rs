//! DDL statement resolution.

use std::sync::Arc;

use tracing::warn;

use crate::catalog::{Db, FieldDef, IndexMeta, StorageFormat, Table};
use crate::exec::error::ExecutorError;
use crate::sql::ast::{CreateIndexNode, CreateTableNode, DropIndexNode, DropTableNode};
use crate::types::AttrType;

/// Default CHAR capacity when no `(length)` is given.
const DEFAULT_CHAR_LEN: usize = 4;

/// A resolved CREATE TABLE.
pub struct CreateTableStmt {
    /// Table name.
    pub name: String,
    /// Column definitions.
    pub fields: Vec<FieldDef>,
    /// Storage format hint.
    pub storage_format: StorageFormat,
}

/// A resolved DROP TABLE.
pub struct DropTableStmt {
    /// Table name.
    pub name: String,
}

/// A resolved CREATE INDEX.
pub struct CreateIndexStmt {
    /// Table to index.
    pub table: Arc<Table>,
    /// The index definition.
    pub index: IndexMeta,
}

/// A resolved DROP INDEX.
pub struct DropIndexStmt {
    /// Index name.
    pub name: String,
}

/// Resolves CREATE TABLE: column types and the storage format identifier
/// must be known. Layout validation (duplicates, lengths) happens in
/// [`TableMeta::new`](crate::catalog::TableMeta::new) at execution.
pub fn resolve_create_table(node: CreateTableNode) -> Result<CreateTableStmt, ExecutorError> {
    let mut fields = Vec::with_capacity(node.columns.len());
    for column in &node.columns {
        let attr_type = AttrType::parse_column_type(&column.type_name).ok_or_else(|| {
            ExecutorError::InvalidArgument(format!("unknown column type \"{}\"", column.type_name))
        })?;
        let len = match attr_type {
            AttrType::Chars => column.len.unwrap_or(DEFAULT_CHAR_LEN),
            other => other.fixed_len().unwrap_or(4),
        };
        fields.push(FieldDef {
            name: column.name.clone(),
            attr_type,
            len,
            nullable: column.nullable.unwrap_or(false),
        });
    }

    let storage_format = match &node.storage_format {
        None => StorageFormat::default(),
        Some(id) => StorageFormat::parse(id).ok_or_else(|| {
            warn!(format = %id, "unknown storage format");
            ExecutorError::InvalidArgument(format!("unknown storage format \"{}\"", id))
        })?,
    };

    Ok(CreateTableStmt {
        name: node.name,
        fields,
        storage_format,
    })
}

/// Resolves DROP TABLE: the relation must exist.
pub fn resolve_drop_table(db: &Db, node: DropTableNode) -> Result<DropTableStmt, ExecutorError> {
    if db.find_table(&node.name).is_none() {
        return Err(ExecutorError::TableNotFound { name: node.name });
    }
    Ok(DropTableStmt { name: node.name })
}

/// Resolves CREATE INDEX: the table and every indexed field must exist.
pub fn resolve_create_index(
    db: &Db,
    node: CreateIndexNode,
) -> Result<CreateIndexStmt, ExecutorError> {
    let table = db
        .find_table(&node.table)
        .ok_or_else(|| ExecutorError::TableNotFound {
            name: node.table.clone(),
        })?;
    for column in &node.columns {
        if table.meta.field(column).filter(|f| !f.system).is_none() {
            return Err(ExecutorError::FieldNotFound {
                name: format!("{}.{}", node.table, column),
            });
        }
    }
    Ok(CreateIndexStmt {
        table,
        index: IndexMeta {
            name: node.name,
            unique: node.unique,
            fields: node.columns,
        },
    })
}

/// Resolves DROP INDEX; existence is checked against the catalog at
/// execution.
pub fn resolve_drop_index(node: DropIndexNode) -> DropIndexStmt {
    DropIndexStmt { name: node.name }
}
