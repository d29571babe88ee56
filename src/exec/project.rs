//! Projection and the one-row CALC scan.

use std::sync::Arc;

use crate::expr::{Expression, Tuple, TupleCellSpec};
use crate::record::Trx;

use super::error::ExecutorError;
use super::operator::PhysicalOperator;

/// Builds the output specs of a projection: field cells keep their
/// table/field identity (renamed by alias), computed cells are found by
/// alias only.
fn project_specs(exprs: &[Expression], names: &[String]) -> Arc<Vec<TupleCellSpec>> {
    let specs = exprs
        .iter()
        .zip(names)
        .map(|(expr, name)| match expr {
            Expression::Field(field) => TupleCellSpec {
                table: Some(field.table_label.clone()),
                field: field.field_name.clone(),
                alias: name.clone(),
            },
            _ => TupleCellSpec::aliased(name),
        })
        .collect();
    Arc::new(specs)
}

/// Evaluates the output expressions for each child row.
///
/// `cell_at(n)` of the produced tuple is the n-th output expression's
/// value; `find_cell` resolves by alias.
pub struct ProjectOp {
    child: Box<PhysicalOperator>,
    exprs: Vec<Expression>,
    /// Display text per expression; a child cell carrying exactly this
    /// alias (a group key or aggregate) short-circuits re-evaluation.
    displays: Vec<String>,
    names: Vec<String>,
    specs: Arc<Vec<TupleCellSpec>>,
}

impl ProjectOp {
    /// Creates a projection.
    pub fn new(child: PhysicalOperator, exprs: Vec<Expression>, names: Vec<String>) -> Self {
        let specs = project_specs(&exprs, &names);
        let displays = exprs.iter().map(|e| e.to_string()).collect();
        Self {
            child: Box::new(child),
            exprs,
            displays,
            names,
            specs,
        }
    }

    pub fn open(&mut self, trx: &Trx) -> Result<(), ExecutorError> {
        for expr in &mut self.exprs {
            expr.attach_trx(trx);
        }
        self.child.open(trx)
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        let Some(tuple) = self.child.next()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.exprs.len());
        for (expr, display) in self.exprs.iter_mut().zip(&self.displays) {
            if !matches!(expr, Expression::Field(_)) {
                if let Some(value) = tuple.find_cell(None, display) {
                    values.push(value.clone());
                    continue;
                }
            }
            values.push(expr.get_value(&tuple)?);
        }
        Ok(Some(Tuple::new(self.specs.clone(), values)))
    }

    pub fn close(&mut self) -> Result<(), ExecutorError> {
        self.child.close()
    }

    pub fn schema(&self) -> Arc<Vec<TupleCellSpec>> {
        self.specs.clone()
    }

    pub fn set_parent_tuple(&mut self, parent: Option<&Tuple>) {
        self.child.set_parent_tuple(parent);
    }

    pub fn output_names(&self) -> &[String] {
        &self.names
    }

    pub fn child(&self) -> &PhysicalOperator {
        &self.child
    }

    pub fn describe(&self) -> String {
        format!("Project ({})", self.names.join(", "))
    }
}

/// One-row constant evaluation for CALC: emits a single tuple of the
/// evaluated expressions, then end of stream.
pub struct CalcOp {
    exprs: Vec<Expression>,
    names: Vec<String>,
    specs: Arc<Vec<TupleCellSpec>>,
    done: bool,
}

impl CalcOp {
    /// Creates a CALC operator.
    pub fn new(exprs: Vec<Expression>, names: Vec<String>) -> Self {
        let specs = project_specs(&exprs, &names);
        Self {
            exprs,
            names,
            specs,
            done: false,
        }
    }

    pub fn open(&mut self, _trx: &Trx) -> Result<(), ExecutorError> {
        self.done = false;
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let mut values = Vec::with_capacity(self.exprs.len());
        for expr in &mut self.exprs {
            values.push(expr.const_value()?);
        }
        Ok(Some(Tuple::new(self.specs.clone(), values)))
    }

    pub fn close(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }

    pub fn schema(&self) -> Arc<Vec<TupleCellSpec>> {
        self.specs.clone()
    }

    pub fn output_names(&self) -> &[String] {
        &self.names
    }

    pub fn describe(&self) -> String {
        let exprs: Vec<String> = self.exprs.iter().map(|e| e.to_string()).collect();
        format!("Calc ({})", exprs.join(", "))
    }
}
