//! Expression binding against the catalog.
//!
//! [`BindContext`] carries the tables in scope; [`BindContext::bind`]
//! converts a parsed [`Expr`](crate::sql::ast::Expr) into a resolved
//! [`Expression`]. Subqueries recurse through
//! [`select::resolve_select`](super::select::resolve_select) with this
//! scope as the parent, which is how correlated references resolve.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::catalog::{Db, Table};
use crate::exec::error::ExecutorError;
use crate::expr::{
    AggregateExpr, ArithmeticExpr, ArithmeticType, ComparisonExpr, ConjunctionExpr, Expression,
    FieldExpr, ListExpr, StarExpr, SubQueryExpr, ValueExpr,
};
use crate::sql::ast::{AggrFunc, CompOp, Expr};
use crate::types::AttrType;

use super::select;

/// Tables in scope while binding one statement.
pub struct BindContext<'a> {
    /// The catalog.
    pub db: &'a Db,
    /// Every label reachable from this scope, including enclosing scopes.
    pub table_map: HashMap<String, Arc<Table>>,
    /// This statement's own from-list, in source order.
    pub tables: Vec<(String, Arc<Table>)>,
    /// Fallback table for bare fields in a correlated subquery: the
    /// enclosing statement's first table.
    pub default_table: Option<(String, Arc<Table>)>,
}

impl<'a> BindContext<'a> {
    /// Creates a scope with no tables (CALC, SET, INSERT values).
    pub fn empty(db: &'a Db) -> Self {
        Self {
            db,
            table_map: HashMap::new(),
            tables: Vec::new(),
            default_table: None,
        }
    }

    /// Creates a scope over a single table.
    pub fn single(db: &'a Db, label: &str, table: Arc<Table>) -> Self {
        let mut ctx = Self::empty(db);
        ctx.table_map.insert(label.to_string(), table.clone());
        ctx.tables.push((label.to_string(), table));
        ctx
    }

    /// True when display names omit the table qualifier.
    fn is_single_table(&self) -> bool {
        self.tables.len() == 1
    }

    /// Binds a parsed expression to a resolved one.
    pub fn bind(&self, expr: &Expr) -> Result<Expression, ExecutorError> {
        match expr {
            Expr::Literal(value) => Ok(Expression::Value(ValueExpr {
                value: value.clone(),
            })),

            Expr::Field { table, field } => self.bind_field(table.as_deref(), field),

            Expr::Star { table } => Ok(Expression::Star(StarExpr {
                table: table.clone(),
            })),

            Expr::Negate(child) => Ok(Expression::Arithmetic(ArithmeticExpr {
                op: ArithmeticType::Negative,
                left: Box::new(self.bind(child)?),
                right: None,
            })),

            Expr::Arith { op, left, right } => Ok(Expression::Arithmetic(ArithmeticExpr {
                op: (*op).into(),
                left: Box::new(self.bind(left)?),
                right: Some(Box::new(self.bind(right)?)),
            })),

            Expr::Compare { op, left, right } => {
                let left = self.bind(left)?;
                let right = self.bind(right)?;
                // A subquery used as a value (scalar or IN stream) must
                // produce exactly one column; EXISTS only asks for rows.
                if !matches!(op, CompOp::Exists | CompOp::NotExists) {
                    for side in [&left, &right] {
                        if let Expression::SubQuery(sub) = side {
                            let columns =
                                sub.select.as_ref().map(|s| s.projects.len()).unwrap_or(1);
                            if columns != 1 {
                                return Err(ExecutorError::InvalidArgument(
                                    "subquery in a comparison must produce exactly one column"
                                        .to_string(),
                                ));
                            }
                        }
                    }
                }
                Ok(Expression::Comparison(ComparisonExpr {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                }))
            }

            Expr::Conjunction { op, left, right } => Ok(Expression::Conjunction(ConjunctionExpr {
                op: *op,
                children: vec![self.bind(left)?, self.bind(right)?],
            })),

            Expr::Aggregate { func, arg } => self.bind_aggregate(*func, arg),

            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.bind(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expression::List(ListExpr { items }))
            }

            Expr::Select(node) => {
                let select = select::resolve_select(self.db, (**node).clone(), Some(self))?;
                Ok(Expression::SubQuery(SubQueryExpr::new(Box::new(select))))
            }
        }
    }

    /// Resolves a field reference.
    ///
    /// Qualified: the label must be in scope. Bare: a single local table
    /// wins; otherwise the correlation default table; otherwise the field
    /// is unresolvable.
    fn bind_field(&self, table: Option<&str>, field: &str) -> Result<Expression, ExecutorError> {
        let missing = |name: String| {
            warn!(field = %name, "no such field in the tables in scope");
            ExecutorError::FieldNotFound { name }
        };

        let (label, table_ref) = match table {
            Some(label) => {
                let table_ref = self
                    .table_map
                    .get(label)
                    .ok_or_else(|| missing(format!("{}.{}", label, field)))?;
                (label.to_string(), table_ref.clone())
            }
            None => {
                if self.tables.len() == 1 {
                    let (label, table_ref) = &self.tables[0];
                    // A bare field that misses the single local table may
                    // still be a correlated reference to the default table.
                    if table_ref.meta.field(field).is_none() {
                        if let Some((outer_label, outer)) = &self.default_table {
                            if outer.meta.field(field).is_some() {
                                (outer_label.clone(), outer.clone())
                            } else {
                                return Err(missing(field.to_string()));
                            }
                        } else {
                            return Err(missing(field.to_string()));
                        }
                    } else {
                        (label.clone(), table_ref.clone())
                    }
                } else if let Some((label, table_ref)) = &self.default_table {
                    (label.clone(), table_ref.clone())
                } else {
                    return Err(missing(field.to_string()));
                }
            }
        };

        let meta = table_ref
            .meta
            .field(field)
            .filter(|f| !f.system)
            .ok_or_else(|| missing(format!("{}.{}", label, field)))?
            .clone();

        let display = if self.is_single_table() {
            field.to_string()
        } else {
            format!("{}.{}", label, field)
        };

        Ok(Expression::Field(FieldExpr::new(&label, meta, &display)))
    }

    fn bind_aggregate(&self, func: AggrFunc, arg: &Expr) -> Result<Expression, ExecutorError> {
        let child = self.bind(arg)?;

        if child.has_aggregate() {
            return Err(ExecutorError::InvalidArgument(
                "aggregate calls cannot be nested".to_string(),
            ));
        }
        if contains_subquery(&child) {
            return Err(ExecutorError::InvalidArgument(
                "subqueries are not allowed inside aggregates".to_string(),
            ));
        }
        if matches!(child, Expression::Star(_)) && func != AggrFunc::Count {
            return Err(ExecutorError::InvalidArgument(format!(
                "{}(*) is not a valid aggregate",
                func.as_str()
            )));
        }
        if matches!(func, AggrFunc::Sum | AggrFunc::Avg) {
            let child_type = child.value_type();
            if !child_type.is_numeric() && child_type != AttrType::Nulls {
                return Err(ExecutorError::TypeMismatch {
                    expected: "numeric".to_string(),
                    found: child_type.to_string(),
                });
            }
        }

        Ok(Expression::Aggregate(AggregateExpr {
            func,
            child: Box::new(child),
        }))
    }
}

/// True when the tree contains a subquery node.
pub fn contains_subquery(expr: &Expression) -> bool {
    match expr {
        Expression::SubQuery(_) => true,
        Expression::Field(_) | Expression::Value(_) | Expression::Star(_) => false,
        Expression::Cast(e) => contains_subquery(&e.child),
        Expression::Arithmetic(e) => {
            contains_subquery(&e.left)
                || e.right.as_ref().is_some_and(|r| contains_subquery(r))
        }
        Expression::Comparison(e) => contains_subquery(&e.left) || contains_subquery(&e.right),
        Expression::Conjunction(e) => e.children.iter().any(contains_subquery),
        Expression::Aggregate(e) => contains_subquery(&e.child),
        Expression::List(e) => e.items.iter().any(contains_subquery),
    }
}

/// Structurally clones an aggregate-safe subtree (no subqueries).
pub fn clone_subtree(expr: &Expression) -> Result<Expression, ExecutorError> {
    let fail = || ExecutorError::Internal("expression subtree is not cloneable".to_string());
    match expr {
        Expression::Field(e) => Ok(Expression::Field(FieldExpr {
            table_label: e.table_label.clone(),
            field_name: e.field_name.clone(),
            meta: e.meta.clone(),
            pos: e.pos,
            display: e.display.clone(),
        })),
        Expression::Value(e) => Ok(Expression::Value(ValueExpr {
            value: e.value.clone(),
        })),
        Expression::Cast(e) => Ok(Expression::Cast(crate::expr::CastExpr {
            child: Box::new(clone_subtree(&e.child)?),
            target: e.target,
        })),
        Expression::Arithmetic(e) => Ok(Expression::Arithmetic(ArithmeticExpr {
            op: e.op,
            left: Box::new(clone_subtree(&e.left)?),
            right: match e.right.as_ref() {
                Some(right) => Some(Box::new(clone_subtree(right)?)),
                None => None,
            },
        })),
        Expression::Aggregate(e) => Ok(Expression::Aggregate(AggregateExpr {
            func: e.func,
            child: Box::new(clone_subtree(&e.child)?),
        })),
        Expression::Star(e) => Ok(Expression::Star(StarExpr {
            table: e.table.clone(),
        })),
        Expression::Comparison(_)
        | Expression::Conjunction(_)
        | Expression::List(_)
        | Expression::SubQuery(_) => Err(fail()),
    }
}

/// Collects the distinct aggregate calls in an expression, keyed by their
/// lookup text.
pub fn collect_aggregates(
    expr: &Expression,
    out: &mut Vec<AggregateExpr>,
) -> Result<(), ExecutorError> {
    match expr {
        Expression::Aggregate(e) => {
            let name = e.lookup_name();
            if !out.iter().any(|existing| existing.lookup_name() == name) {
                let Expression::Aggregate(cloned) = clone_subtree(expr)? else {
                    return Err(ExecutorError::Internal(
                        "aggregate clone changed shape".to_string(),
                    ));
                };
                out.push(cloned);
            }
            Ok(())
        }
        Expression::Field(_) | Expression::Value(_) | Expression::Star(_) => Ok(()),
        Expression::Cast(e) => collect_aggregates(&e.child, out),
        Expression::Arithmetic(e) => {
            collect_aggregates(&e.left, out)?;
            if let Some(right) = e.right.as_ref() {
                collect_aggregates(right, out)?;
            }
            Ok(())
        }
        Expression::Comparison(e) => {
            collect_aggregates(&e.left, out)?;
            collect_aggregates(&e.right, out)
        }
        Expression::Conjunction(e) => {
            for child in &e.children {
                collect_aggregates(child, out)?;
            }
            Ok(())
        }
        Expression::List(e) => {
            for item in &e.items {
                collect_aggregates(item, out)?;
            }
            Ok(())
        }
        Expression::SubQuery(_) => Ok(()),
    }
}
