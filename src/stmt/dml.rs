//! INSERT, UPDATE, and DELETE resolution.

use std::sync::Arc;

use tracing::warn;

use crate::catalog::{Db, FieldMeta, Table};
use crate::exec::error::ExecutorError;
use crate::expr::{CastExpr, Expression};
use crate::sql::ast::{DeleteNode, InsertNode, UpdateNode};
use crate::types::{AttrType, Value};

use super::bind::{contains_subquery, BindContext};

/// A resolved INSERT: literal rows validated against the table layout.
pub struct InsertStmt {
    /// Target table.
    pub table: Arc<Table>,
    /// Validated value rows, one `Value` per user field.
    pub rows: Vec<Vec<Value>>,
}

/// A resolved UPDATE.
pub struct UpdateStmt {
    /// Target table.
    pub table: Arc<Table>,
    /// Label the scan runs under (the table name).
    pub label: String,
    /// SET assignments: target field and its value expression,
    /// re-evaluated per matching row.
    pub sets: Vec<(FieldMeta, Expression)>,
    /// WHERE predicate.
    pub predicate: Option<Expression>,
}

/// A resolved DELETE.
pub struct DeleteStmt {
    /// Target table.
    pub table: Arc<Table>,
    /// Label the scan runs under.
    pub label: String,
    /// WHERE predicate.
    pub predicate: Option<Expression>,
}

/// Resolves an INSERT: the relation must exist, every row's arity must
/// equal the user field count, and every value must fit its column (NULL
/// only if nullable, CHARS within declared capacity, INT literals widen
/// to FLOAT columns).
pub fn resolve_insert(db: &Db, node: InsertNode) -> Result<InsertStmt, ExecutorError> {
    let table = db.find_table(&node.table).ok_or_else(|| {
        warn!(table = %node.table, "insert into missing table");
        ExecutorError::TableNotFound {
            name: node.table.clone(),
        }
    })?;

    let ctx = BindContext::empty(db);
    let field_num = table.meta.user_field_num();
    let mut rows = Vec::with_capacity(node.rows.len());

    for row in &node.rows {
        if row.len() != field_num {
            warn!(
                table = %node.table,
                expected = field_num,
                got = row.len(),
                "insert arity mismatch"
            );
            return Err(ExecutorError::ValueCountMismatch {
                expected: field_num,
                found: row.len(),
            });
        }

        let mut values = Vec::with_capacity(field_num);
        for (i, cell) in row.iter().enumerate() {
            let field = table.meta.user_field(i);
            let value = ctx.bind(cell)?.const_value()?;
            values.push(check_value(field, value)?);
        }
        rows.push(values);
    }

    Ok(InsertStmt { table, rows })
}

/// Validates one value against its column, applying the INT-to-FLOAT
/// literal widening.
pub fn check_value(field: &FieldMeta, value: Value) -> Result<Value, ExecutorError> {
    if value.is_null() {
        if field.nullable {
            return Ok(Value::Null);
        }
        return Err(ExecutorError::TypeMismatch {
            expected: field.attr_type.to_string(),
            found: AttrType::Nulls.to_string(),
        });
    }

    let value = match (value.attr_type(), field.attr_type) {
        (AttrType::Ints, AttrType::Floats) => value.cast_to(AttrType::Floats)?,
        _ => value,
    };

    if value.attr_type() != field.attr_type {
        return Err(ExecutorError::TypeMismatch {
            expected: field.attr_type.to_string(),
            found: value.attr_type().to_string(),
        });
    }

    if let Value::Chars(s) = &value {
        if s.len() > field.len {
            return Err(ExecutorError::InvalidArgument(format!(
                "value for \"{}\" is {} bytes, exceeding the declared length {}",
                field.name,
                s.len(),
                field.len
            )));
        }
    }

    Ok(value)
}

/// Resolves an UPDATE: each SET target must be a user field, and each
/// right-hand side binds against the table (it is re-evaluated per row).
pub fn resolve_update(db: &Db, node: UpdateNode) -> Result<UpdateStmt, ExecutorError> {
    let table = db.find_table(&node.table).ok_or_else(|| {
        warn!(table = %node.table, "update of missing table");
        ExecutorError::TableNotFound {
            name: node.table.clone(),
        }
    })?;
    let label = table.name().to_string();
    let ctx = BindContext::single(db, &label, table.clone());

    let mut sets = Vec::with_capacity(node.sets.len());
    for (field_name, expr) in &node.sets {
        let field = table
            .meta
            .field(field_name)
            .filter(|f| !f.system)
            .ok_or_else(|| ExecutorError::FieldNotFound {
                name: field_name.clone(),
            })?
            .clone();

        let mut bound = ctx.bind(expr)?;
        if contains_subquery(&bound) {
            return Err(ExecutorError::InvalidArgument(
                "subqueries are not allowed in SET".to_string(),
            ));
        }
        // Cast statically-known mismatches toward the column type; NULL
        // and UNDEFINED stay as-is and are checked per row.
        let expr_type = bound.value_type();
        if expr_type != field.attr_type
            && expr_type != AttrType::Nulls
            && expr_type != AttrType::Undefined
        {
            bound = Expression::Cast(CastExpr {
                child: Box::new(bound),
                target: field.attr_type,
            });
        }
        sets.push((field, bound));
    }

    let predicate = match &node.where_clause {
        Some(cond) => Some(ctx.bind(cond)?),
        None => None,
    };

    Ok(UpdateStmt {
        table,
        label,
        sets,
        predicate,
    })
}

/// Resolves a DELETE.
pub fn resolve_delete(db: &Db, node: DeleteNode) -> Result<DeleteStmt, ExecutorError> {
    let table = db.find_table(&node.table).ok_or_else(|| {
        warn!(table = %node.table, "delete from missing table");
        ExecutorError::TableNotFound {
            name: node.table.clone(),
        }
    })?;
    let label = table.name().to_string();
    let ctx = BindContext::single(db, &label, table.clone());

    let predicate = match &node.where_clause {
        Some(cond) => Some(ctx.bind(cond)?),
        None => None,
    };

    Ok(DeleteStmt {
        table,
        label,
        predicate,
    })
}
