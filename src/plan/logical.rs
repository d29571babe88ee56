//! Logical plan construction.
//!
//! Trees assemble bottom-up: scans, then inner joins in from-list order,
//! then the WHERE predicate, then grouping, then HAVING, then the
//! projection. DML plans wrap their resolved statements; EXPLAIN wraps
//! the plan of its target.

use std::sync::Arc;

use crate::catalog::Table;
use crate::exec::error::ExecutorError;
use crate::expr::{AggregateExpr, Expression};
use crate::stmt::{CalcStmt, DeleteStmt, InsertStmt, SelectStmt, Stmt, UpdateStmt};

/// A logical operator tree.
pub enum LogicalPlan {
    /// Scan of one relation.
    TableGet {
        table: Arc<Table>,
        label: String,
    },
    /// Predicate over a child.
    Predicate {
        child: Box<LogicalPlan>,
        condition: Expression,
    },
    /// Inner join.
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        on: Option<Expression>,
    },
    /// Grouping and aggregation.
    GroupBy {
        child: Box<LogicalPlan>,
        keys: Vec<Expression>,
        aggregates: Vec<AggregateExpr>,
    },
    /// Projection with output names.
    Project {
        child: Box<LogicalPlan>,
        exprs: Vec<Expression>,
        names: Vec<String>,
    },
    /// One-row constant evaluation.
    Calc {
        exprs: Vec<Expression>,
        names: Vec<String>,
    },
    /// INSERT.
    Insert(InsertStmt),
    /// DELETE.
    Delete(DeleteStmt),
    /// UPDATE.
    Update(UpdateStmt),
    /// EXPLAIN of a child plan.
    Explain(Box<LogicalPlan>),
}

/// Builds the logical plan for a plannable statement.
///
/// DDL and utility statements have no plan; the session executes them
/// directly.
pub fn build(stmt: Stmt) -> Result<LogicalPlan, ExecutorError> {
    match stmt {
        Stmt::Select(select) => build_select(select),
        Stmt::Insert(insert) => Ok(LogicalPlan::Insert(insert)),
        Stmt::Delete(delete) => Ok(LogicalPlan::Delete(delete)),
        Stmt::Update(update) => Ok(LogicalPlan::Update(update)),
        Stmt::Calc(calc) => build_calc(calc),
        Stmt::Explain(inner) => {
            let child = build(*inner)?;
            Ok(LogicalPlan::Explain(Box::new(child)))
        }
        _ => Err(ExecutorError::Internal(
            "statement kind has no logical plan".to_string(),
        )),
    }
}

/// Builds the plan for a resolved SELECT.
pub fn build_select(stmt: SelectStmt) -> Result<LogicalPlan, ExecutorError> {
    let SelectStmt {
        tables,
        projects,
        predicate,
        group_by,
        aggregates,
        having,
    } = stmt;

    let aggregated = !aggregates.is_empty() || !group_by.is_empty();

    // Scans joined left-deep in from-list order.
    let mut iter = tables.into_iter();
    let first = iter.next().ok_or_else(|| {
        ExecutorError::Internal("select without tables survived resolution".to_string())
    })?;
    let mut plan = LogicalPlan::TableGet {
        table: first.table,
        label: first.label,
    };
    for from in iter {
        let right = LogicalPlan::TableGet {
            table: from.table,
            label: from.label,
        };
        plan = LogicalPlan::Join {
            left: Box::new(plan),
            right: Box::new(right),
            on: from.join_on,
        };
    }

    if let Some(condition) = predicate {
        plan = LogicalPlan::Predicate {
            child: Box::new(plan),
            condition,
        };
    }

    if aggregated {
        plan = LogicalPlan::GroupBy {
            child: Box::new(plan),
            keys: group_by,
            aggregates,
        };
        if let Some(condition) = having {
            plan = LogicalPlan::Predicate {
                child: Box::new(plan),
                condition,
            };
        }
    }

    let (exprs, names): (Vec<Expression>, Vec<String>) = projects.into_iter().unzip();
    Ok(LogicalPlan::Project {
        child: Box::new(plan),
        exprs,
        names,
    })
}

fn build_calc(stmt: CalcStmt) -> Result<LogicalPlan, ExecutorError> {
    let (exprs, names): (Vec<Expression>, Vec<String>) = stmt.exprs.into_iter().unzip();
    Ok(LogicalPlan::Calc { exprs, names })
}
