//! DML execution: INSERT, DELETE, and UPDATE against the record manager.
//!
//! Each statement runs inside the session's transaction; a failure aborts
//! the statement where it stands and the wrapping transaction decides the
//! ultimate rollback. Error paths still close the scan child.

use tracing::warn;

use crate::expr::Expression;
use crate::record::{codec, EngineRef, Trx};
use crate::stmt::dml::check_value;
use crate::stmt::{DeleteStmt, InsertStmt, UpdateStmt};

use super::error::ExecutorError;
use super::operator::PhysicalOperator;

/// Inserts every value row, returning the row count.
pub fn execute_insert(
    engine: &EngineRef,
    trx: &Trx,
    stmt: &InsertStmt,
) -> Result<usize, ExecutorError> {
    let mut count = 0;
    for row in &stmt.rows {
        let data = codec::encode(&stmt.table.meta, row)?;
        engine.insert_record(trx, &stmt.table, data).map_err(|e| {
            warn!(table = %stmt.table.name(), error = %e, "insert failed");
            e
        })?;
        count += 1;
    }
    Ok(count)
}

/// Deletes every row produced by the child operator.
pub fn execute_delete(
    engine: &EngineRef,
    trx: &Trx,
    stmt: &DeleteStmt,
    child: &mut PhysicalOperator,
) -> Result<usize, ExecutorError> {
    child.open(trx)?;
    let result = delete_rows(engine, trx, stmt, child);
    let _ = child.close();
    result
}

fn delete_rows(
    engine: &EngineRef,
    trx: &Trx,
    stmt: &DeleteStmt,
    child: &mut PhysicalOperator,
) -> Result<usize, ExecutorError> {
    let mut count = 0;
    while let Some(tuple) = child.next()? {
        let rid = tuple.rid().ok_or_else(|| {
            ExecutorError::Internal("delete over rows without record ids".to_string())
        })?;
        engine.delete_record(trx, &stmt.table, rid)?;
        count += 1;
    }
    Ok(count)
}

/// Re-evaluates each SET right-hand side per matching row and updates the
/// record in place.
pub fn execute_update(
    engine: &EngineRef,
    trx: &Trx,
    stmt: &mut UpdateStmt,
    child: &mut PhysicalOperator,
) -> Result<usize, ExecutorError> {
    child.open(trx)?;
    let result = update_rows(engine, trx, stmt, child);
    let _ = child.close();
    result
}

fn update_rows(
    engine: &EngineRef,
    trx: &Trx,
    stmt: &mut UpdateStmt,
    child: &mut PhysicalOperator,
) -> Result<usize, ExecutorError> {
    let sys_fields = stmt.table.meta.sys_field_num;
    let mut count = 0;
    while let Some(tuple) = child.next()? {
        let rid = tuple.rid().ok_or_else(|| {
            ExecutorError::Internal("update over rows without record ids".to_string())
        })?;

        let mut values = tuple.values().to_vec();
        for (field, expr) in &mut stmt.sets {
            let value = expr.get_value(&tuple)?;
            let value = check_value(field, value)?;
            values[field.field_id - sys_fields] = value;
        }

        let data = codec::encode(&stmt.table.meta, &values)?;
        engine.update_record(trx, &stmt.table, rid, data)?;
        count += 1;
    }
    Ok(count)
}

/// Builds the scan (+ filter) child a DELETE or UPDATE drives.
pub fn build_dml_scan(
    engine: &EngineRef,
    table: &std::sync::Arc<crate::catalog::Table>,
    label: &str,
    predicate: Option<Expression>,
) -> PhysicalOperator {
    let scan = PhysicalOperator::TableScan(super::scan::TableScanOp::new(
        engine.clone(),
        table.clone(),
        label,
    ));
    match predicate {
        Some(predicate) => {
            PhysicalOperator::Filter(super::filter::FilterOp::new(scan, predicate))
        }
        None => scan,
    }
}
