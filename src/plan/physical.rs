//! Physical planning: logical operators to executable iterators.
//!
//! Rules: a scan under an equality predicate on an indexed field becomes
//! an index scan (the full predicate stays as a filter on top); a scan
//! whose whole predicate vectorizes becomes a chunk scan; grouping with
//! keys hashes, without keys it degenerates to a single bucket. Subquery
//! expressions get their own operator trees here.

use std::sync::Arc;

use crate::catalog::Table;
use crate::exec::dml::build_dml_scan;
use crate::exec::error::ExecutorError;
use crate::exec::filter::FilterOp;
use crate::exec::group::{HashGroupByOp, ScalarAggregateOp};
use crate::exec::join::NestedLoopJoinOp;
use crate::exec::project::{CalcOp, ProjectOp};
use crate::exec::scan::{ChunkScanOp, IndexScanOp, TableScanOp};
use crate::exec::PhysicalOperator;
use crate::expr::Expression;
use crate::record::{codec, EngineRef, IndexHint};
use crate::sql::ast::{CompOp, ConjOp};
use crate::stmt::{DeleteStmt, InsertStmt, UpdateStmt};

use super::logical::{build_select, LogicalPlan};

/// An executable statement plan.
pub enum PhysicalPlan {
    /// Row-producing query tree.
    Query(PhysicalOperator),
    /// INSERT.
    Insert(InsertStmt),
    /// DELETE driving a scan child.
    Delete {
        stmt: DeleteStmt,
        child: PhysicalOperator,
    },
    /// UPDATE driving a scan child.
    Update {
        stmt: UpdateStmt,
        child: PhysicalOperator,
    },
    /// EXPLAIN text, produced without executing the target.
    Explain(String),
}

/// Translates a logical plan into a physical one.
pub fn build(engine: &EngineRef, plan: LogicalPlan) -> Result<PhysicalPlan, ExecutorError> {
    match plan {
        LogicalPlan::Insert(stmt) => Ok(PhysicalPlan::Insert(stmt)),

        LogicalPlan::Delete(mut stmt) => {
            let mut predicate = stmt.predicate.take();
            if let Some(predicate) = predicate.as_mut() {
                plan_subqueries(engine, predicate)?;
            }
            let child = build_dml_scan(engine, &stmt.table, &stmt.label, predicate);
            Ok(PhysicalPlan::Delete { stmt, child })
        }

        LogicalPlan::Update(mut stmt) => {
            let mut predicate = stmt.predicate.take();
            if let Some(predicate) = predicate.as_mut() {
                plan_subqueries(engine, predicate)?;
            }
            let child = build_dml_scan(engine, &stmt.table, &stmt.label, predicate);
            Ok(PhysicalPlan::Update { stmt, child })
        }

        LogicalPlan::Explain(child) => {
            let described = match build(engine, *child)? {
                PhysicalPlan::Query(op) => op.explain(),
                PhysicalPlan::Insert(stmt) => {
                    format!("Insert into {} ({} rows)\n", stmt.table.name(), stmt.rows.len())
                }
                PhysicalPlan::Delete { stmt, child } => {
                    format!("Delete from {}\n{}", stmt.table.name(), indent(&child.explain()))
                }
                PhysicalPlan::Update { stmt, child } => {
                    format!("Update {}\n{}", stmt.table.name(), indent(&child.explain()))
                }
                PhysicalPlan::Explain(text) => text,
            };
            Ok(PhysicalPlan::Explain(described))
        }

        other => Ok(PhysicalPlan::Query(build_query(engine, other)?)),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}\n", line))
        .collect::<String>()
}

/// Builds the operator tree for a row-producing logical plan.
fn build_query(
    engine: &EngineRef,
    plan: LogicalPlan,
) -> Result<PhysicalOperator, ExecutorError> {
    match plan {
        LogicalPlan::TableGet { table, label } => Ok(PhysicalOperator::TableScan(
            TableScanOp::new(engine.clone(), table, &label),
        )),

        LogicalPlan::Predicate { child, mut condition } => {
            plan_subqueries(engine, &mut condition)?;

            // Scan-level strategies apply when the child is a bare scan.
            if let LogicalPlan::TableGet { table, label } = &*child {
                if let Some(hint) = find_index_hint(table, label, &condition) {
                    let scan = PhysicalOperator::IndexScan(IndexScanOp::new(
                        engine.clone(),
                        table.clone(),
                        label,
                        hint,
                    ));
                    return Ok(PhysicalOperator::Filter(FilterOp::new(scan, condition)));
                }
                // Correlated fields belong to an enclosing scan, not this
                // chunk, so they disqualify the vector path.
                if condition.supports_vectorized() && fields_bound_to(&condition, label) {
                    assign_chunk_positions(&mut condition, table);
                    return Ok(PhysicalOperator::ChunkScan(ChunkScanOp::new(
                        engine.clone(),
                        table.clone(),
                        label,
                        condition,
                    )));
                }
            }

            let child = build_query(engine, *child)?;
            Ok(PhysicalOperator::Filter(FilterOp::new(child, condition)))
        }

        LogicalPlan::Join { left, right, mut on } => {
            if let Some(on) = on.as_mut() {
                plan_subqueries(engine, on)?;
            }
            let left = build_query(engine, *left)?;
            let right = build_query(engine, *right)?;
            Ok(PhysicalOperator::NestedLoopJoin(NestedLoopJoinOp::new(
                left, right, on,
            )))
        }

        LogicalPlan::GroupBy {
            child,
            keys,
            aggregates,
        } => {
            let child = build_query(engine, *child)?;
            if keys.is_empty() {
                Ok(PhysicalOperator::ScalarAggregate(ScalarAggregateOp::new(
                    child, aggregates,
                )))
            } else {
                Ok(PhysicalOperator::HashGroupBy(HashGroupByOp::new(
                    child, keys, aggregates,
                )))
            }
        }

        LogicalPlan::Project { child, exprs, names } => {
            let child = build_query(engine, *child)?;
            Ok(PhysicalOperator::Project(ProjectOp::new(
                child, exprs, names,
            )))
        }

        LogicalPlan::Calc { exprs, names } => {
            Ok(PhysicalOperator::Calc(CalcOp::new(exprs, names)))
        }

        LogicalPlan::Insert(_)
        | LogicalPlan::Delete(_)
        | LogicalPlan::Update(_)
        | LogicalPlan::Explain(_) => Err(ExecutorError::Internal(
            "non-query plan in query position".to_string(),
        )),
    }
}

/// Recursively attaches physical operator trees to every subquery in an
/// expression.
fn plan_subqueries(engine: &EngineRef, expr: &mut Expression) -> Result<(), ExecutorError> {
    match expr {
        Expression::SubQuery(sub) => {
            if sub.operator.is_none() {
                let select = sub.select.take().ok_or_else(|| {
                    ExecutorError::Internal("subquery lost its statement".to_string())
                })?;
                let logical = build_select(*select)?;
                let operator = build_query(engine, logical)?;
                sub.set_operator(Box::new(operator));
            }
            Ok(())
        }
        Expression::Field(_) | Expression::Value(_) | Expression::Star(_) => Ok(()),
        Expression::Cast(e) => plan_subqueries(engine, &mut e.child),
        Expression::Arithmetic(e) => {
            plan_subqueries(engine, &mut e.left)?;
            if let Some(right) = e.right.as_mut() {
                plan_subqueries(engine, right)?;
            }
            Ok(())
        }
        Expression::Comparison(e) => {
            plan_subqueries(engine, &mut e.left)?;
            plan_subqueries(engine, &mut e.right)
        }
        Expression::Conjunction(e) => {
            for child in &mut e.children {
                plan_subqueries(engine, child)?;
            }
            Ok(())
        }
        Expression::Aggregate(e) => plan_subqueries(engine, &mut e.child),
        Expression::List(e) => {
            for item in &mut e.items {
                plan_subqueries(engine, item)?;
            }
            Ok(())
        }
    }
}

/// Looks for `field = literal` (under top-level ANDs) where a single-field
/// index covers the field, and builds the equality hint.
///
/// The whole predicate still runs as a filter above the index scan, so a
/// missed extraction only costs performance, never correctness.
fn find_index_hint(table: &Arc<Table>, label: &str, condition: &Expression) -> Option<IndexHint> {
    match condition {
        Expression::Comparison(cmp) if cmp.op == CompOp::Eq => {
            let (field, value) = match (&*cmp.left, &*cmp.right) {
                (Expression::Field(f), Expression::Value(v)) => (f, v),
                (Expression::Value(v), Expression::Field(f)) => (f, v),
                _ => return None,
            };
            if field.table_label != label {
                return None;
            }
            let index = table.index_on(&field.field_name)?;
            if index.fields.len() != 1 {
                return None;
            }
            let key = codec::index_key_from_values(
                &table.meta,
                &index.fields,
                std::slice::from_ref(&value.value),
            )?;
            Some(IndexHint {
                index: index.name.clone(),
                key,
            })
        }
        Expression::Conjunction(conj) if conj.op == ConjOp::And => conj
            .children
            .iter()
            .find_map(|child| find_index_hint(table, label, child)),
        _ => None,
    }
}

/// True when every field reference in the tree belongs to the given scan
/// label.
fn fields_bound_to(expr: &Expression, label: &str) -> bool {
    match expr {
        Expression::Field(field) => field.table_label == label,
        Expression::Value(_) | Expression::Star(_) | Expression::SubQuery(_) => true,
        Expression::Cast(e) => fields_bound_to(&e.child, label),
        Expression::Arithmetic(e) => {
            fields_bound_to(&e.left, label)
                && e.right.as_ref().is_none_or(|r| fields_bound_to(r, label))
        }
        Expression::Comparison(e) => {
            fields_bound_to(&e.left, label) && fields_bound_to(&e.right, label)
        }
        Expression::Conjunction(e) => e.children.iter().all(|c| fields_bound_to(c, label)),
        Expression::Aggregate(e) => fields_bound_to(&e.child, label),
        Expression::List(e) => e.items.iter().all(|i| fields_bound_to(i, label)),
    }
}

/// Assigns chunk column positions to the field references of a
/// vectorizable predicate.
fn assign_chunk_positions(expr: &mut Expression, table: &Arc<Table>) {
    match expr {
        Expression::Field(field) => {
            field.pos = table.meta.user_index(&field.field_name);
        }
        Expression::Value(_) | Expression::Star(_) => {}
        Expression::Cast(e) => assign_chunk_positions(&mut e.child, table),
        Expression::Arithmetic(e) => {
            assign_chunk_positions(&mut e.left, table);
            if let Some(right) = e.right.as_mut() {
                assign_chunk_positions(right, table);
            }
        }
        Expression::Comparison(e) => {
            assign_chunk_positions(&mut e.left, table);
            assign_chunk_positions(&mut e.right, table);
        }
        Expression::Conjunction(e) => {
            for child in &mut e.children {
                assign_chunk_positions(child, table);
            }
        }
        Expression::Aggregate(e) => assign_chunk_positions(&mut e.child, table),
        Expression::List(e) => {
            for item in &mut e.items {
                assign_chunk_positions(item, table);
            }
        }
        Expression::SubQuery(_) => {}
    }
}
