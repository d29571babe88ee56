//! CALC, EXPLAIN targets, DESC, LOAD DATA, and SET resolution.

use std::sync::Arc;

use crate::catalog::{Db, Table};
use crate::exec::error::ExecutorError;
use crate::expr::Expression;
use crate::sql::ast::{CalcNode, LoadDataNode, SetNode};
use crate::types::Value;

use super::bind::BindContext;

/// A resolved CALC: constant expressions with display names.
pub struct CalcStmt {
    /// Expressions and their output names.
    pub exprs: Vec<(Expression, String)>,
}

/// A resolved DESC.
pub struct DescTableStmt {
    /// The table to describe.
    pub table: Arc<Table>,
}

/// A resolved LOAD DATA.
pub struct LoadDataStmt {
    /// Source file path.
    pub file: String,
    /// Target table.
    pub table: Arc<Table>,
}

/// A resolved SET.
pub struct SetStmt {
    /// Variable name.
    pub name: String,
    /// Constant value.
    pub value: Value,
}

/// Resolves CALC: expressions bind in an empty scope, so any field
/// reference fails here.
pub fn resolve_calc(db: &Db, node: CalcNode) -> Result<CalcStmt, ExecutorError> {
    let ctx = BindContext::empty(db);
    let mut exprs = Vec::with_capacity(node.exprs.len());
    for expr in &node.exprs {
        let bound = ctx.bind(expr)?;
        let name = bound.to_string();
        exprs.push((bound, name));
    }
    Ok(CalcStmt { exprs })
}

/// Resolves DESC.
pub fn resolve_desc(db: &Db, name: &str) -> Result<DescTableStmt, ExecutorError> {
    let table = db
        .find_table(name)
        .ok_or_else(|| ExecutorError::TableNotFound {
            name: name.to_string(),
        })?;
    Ok(DescTableStmt { table })
}

/// Resolves LOAD DATA: the target table must exist.
pub fn resolve_load_data(db: &Db, node: LoadDataNode) -> Result<LoadDataStmt, ExecutorError> {
    let table = db
        .find_table(&node.table)
        .ok_or_else(|| ExecutorError::TableNotFound {
            name: node.table.clone(),
        })?;
    Ok(LoadDataStmt {
        file: node.file,
        table,
    })
}

/// Resolves SET: the value must be constant.
pub fn resolve_set(db: &Db, node: SetNode) -> Result<SetStmt, ExecutorError> {
    let ctx = BindContext::empty(db);
    let value = ctx.bind(&node.value)?.const_value()?;
    Ok(SetStmt {
        name: node.name,
        value,
    })
}
