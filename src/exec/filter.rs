//! The filter operator.

use std::sync::Arc;

use crate::expr::{Expression, Tuple, TupleCellSpec};
use crate::record::Trx;

use super::error::ExecutorError;
use super::operator::PhysicalOperator;

/// Filters child rows by a predicate expression.
///
/// A predicate evaluating to NULL skips the row, like false: three-valued
/// logic collapses to two values at the condition layer.
pub struct FilterOp {
    child: Box<PhysicalOperator>,
    predicate: Expression,
}

impl FilterOp {
    /// Creates a filter over a child operator.
    pub fn new(child: PhysicalOperator, predicate: Expression) -> Self {
        Self {
            child: Box::new(child),
            predicate,
        }
    }

    pub fn open(&mut self, trx: &Trx) -> Result<(), ExecutorError> {
        self.predicate.attach_trx(trx);
        self.child.open(trx)
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        loop {
            let Some(tuple) = self.child.next()? else {
                return Ok(None);
            };
            let value = self.predicate.get_value(&tuple)?;
            if value.to_bool() {
                return Ok(Some(tuple));
            }
        }
    }

    pub fn close(&mut self) -> Result<(), ExecutorError> {
        self.child.close()
    }

    pub fn schema(&self) -> Arc<Vec<TupleCellSpec>> {
        self.child.schema()
    }

    pub fn set_parent_tuple(&mut self, parent: Option<&Tuple>) {
        self.child.set_parent_tuple(parent);
    }

    pub fn child(&self) -> &PhysicalOperator {
        &self.child
    }

    pub fn describe(&self) -> String {
        format!("Filter ({})", self.predicate)
    }
}
