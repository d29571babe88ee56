//! SELECT resolution.
//!
//! Builds the table map and from-list, expands `*` (bare and qualified),
//! resolves every projected expression, rebuilds aggregates, and
//! recursively resolves subqueries against this scope.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::catalog::{Db, Table};
use crate::exec::error::ExecutorError;
use crate::expr::{AggregateExpr, Expression, FieldExpr};
use crate::sql::ast::{Expr, SelectNode};

use super::bind::{collect_aggregates, BindContext};

/// One element of the resolved from-list.
pub struct FromTable {
    /// Label this table is known by (alias or name).
    pub label: String,
    /// The table.
    pub table: Arc<Table>,
    /// ON condition for tables introduced by INNER JOIN; `None` for the
    /// first table of a from-node and for comma cross joins.
    pub join_on: Option<Expression>,
}

/// A resolved SELECT.
pub struct SelectStmt {
    /// From-list in join order.
    pub tables: Vec<FromTable>,
    /// Projected expressions with their output names.
    pub projects: Vec<(Expression, String)>,
    /// WHERE predicate.
    pub predicate: Option<Expression>,
    /// GROUP BY keys.
    pub group_by: Vec<Expression>,
    /// Distinct aggregate calls appearing in projections or HAVING;
    /// drives the aggregation operator.
    pub aggregates: Vec<AggregateExpr>,
    /// HAVING predicate, evaluated over group tuples.
    pub having: Option<Expression>,
}

impl SelectStmt {
    /// True when this statement needs an aggregation operator.
    pub fn is_aggregated(&self) -> bool {
        !self.aggregates.is_empty() || !self.group_by.is_empty()
    }
}

/// Resolves a SELECT node against the catalog, with an optional enclosing
/// scope for correlated subqueries.
pub fn resolve_select(
    db: &Db,
    node: SelectNode,
    parent: Option<&BindContext<'_>>,
) -> Result<SelectStmt, ExecutorError> {
    // Collect the local from-list: each from-node is its base table
    // followed by its join chain.
    let mut tables: Vec<FromTable> = Vec::new();
    let mut local_map: HashMap<String, Arc<Table>> = HashMap::new();

    let mut add_table = |name: &str,
                         alias: Option<&str>,
                         local_map: &mut HashMap<String, Arc<Table>>|
     -> Result<(String, Arc<Table>), ExecutorError> {
        let table = db.find_table(name).ok_or_else(|| {
            warn!(table = name, "no such table in from list");
            ExecutorError::TableNotFound {
                name: name.to_string(),
            }
        })?;
        let label = alias.unwrap_or(name).to_string();
        if local_map.contains_key(&label) {
            return Err(ExecutorError::InvalidArgument(format!(
                "duplicate table name or alias \"{}\"",
                label
            )));
        }
        local_map.insert(label.clone(), table.clone());
        Ok((label, table))
    };

    // First pass: register every table so join conditions can see the
    // whole from-list.
    struct PendingJoin {
        index: usize,
        on: Option<Expr>,
    }
    let mut pending: Vec<PendingJoin> = Vec::new();

    for from_node in &node.from {
        let (label, table) = add_table(&from_node.table, from_node.alias.as_deref(), &mut local_map)?;
        pending.push(PendingJoin {
            index: tables.len(),
            on: None,
        });
        tables.push(FromTable {
            label,
            table,
            join_on: None,
        });
        for join in &from_node.joins {
            let (label, table) = add_table(&join.table, join.alias.as_deref(), &mut local_map)?;
            pending.push(PendingJoin {
                index: tables.len(),
                on: Some(join.on.clone()),
            });
            tables.push(FromTable {
                label,
                table,
                join_on: None,
            });
        }
    }

    // Build the binding scope: local tables shadow the enclosing scope.
    let mut table_map = parent.map(|p| p.table_map.clone()).unwrap_or_default();
    for (label, table) in &local_map {
        table_map.insert(label.clone(), table.clone());
    }
    let ctx = BindContext {
        db,
        table_map,
        tables: tables
            .iter()
            .map(|t| (t.label.clone(), t.table.clone()))
            .collect(),
        default_table: parent.and_then(|p| p.tables.first().cloned()),
    };

    // Second pass: bind join conditions.
    for join in pending {
        if let Some(on) = join.on {
            tables[join.index].join_on = Some(ctx.bind(&on)?);
        }
    }

    // Expand the select list.
    let mut projects: Vec<(Expression, String)> = Vec::new();
    for item in &node.projects {
        match &item.expr {
            Expr::Star { table: None } => {
                for from in &tables {
                    expand_star(&ctx, from, &mut projects);
                }
            }
            Expr::Star { table: Some(label) } => {
                let from = tables
                    .iter()
                    .find(|t| &t.label == label)
                    .ok_or_else(|| ExecutorError::FieldNotFound {
                        name: format!("{}.*", label),
                    })?;
                expand_star(&ctx, from, &mut projects);
            }
            expr => {
                let bound = ctx.bind(expr)?;
                let name = item.alias.clone().unwrap_or_else(|| bound.to_string());
                projects.push((bound, name));
            }
        }
    }
    if projects.is_empty() {
        return Err(ExecutorError::InvalidArgument(
            "select list is empty".to_string(),
        ));
    }

    let predicate = match &node.where_clause {
        Some(cond) => Some(ctx.bind(cond)?),
        None => None,
    };

    let group_by = node
        .group_by
        .iter()
        .map(|expr| ctx.bind(expr))
        .collect::<Result<Vec<_>, _>>()?;

    let having = match &node.having {
        Some(cond) => Some(ctx.bind(cond)?),
        None => None,
    };

    // Rebuild the distinct aggregate calls from projections and HAVING.
    let mut aggregates: Vec<AggregateExpr> = Vec::new();
    for (expr, _) in &projects {
        collect_aggregates(expr, &mut aggregates)?;
    }
    if let Some(having) = &having {
        collect_aggregates(having, &mut aggregates)?;
    }

    if let Some(predicate) = &predicate {
        if predicate.has_aggregate() {
            return Err(ExecutorError::InvalidArgument(
                "aggregates are not allowed in WHERE".to_string(),
            ));
        }
    }

    Ok(SelectStmt {
        tables,
        projects,
        predicate,
        group_by,
        aggregates,
        having,
    })
}

/// Expands `*` for one table into field projections.
fn expand_star(ctx: &BindContext<'_>, from: &FromTable, out: &mut Vec<(Expression, String)>) {
    let single = ctx.tables.len() == 1;
    for field in from.table.meta.user_fields() {
        let display = if single {
            field.name.clone()
        } else {
            format!("{}.{}", from.label, field.name)
        };
        let expr = Expression::Field(FieldExpr::new(&from.label, field.clone(), &display));
        out.push((expr, display));
    }
}
