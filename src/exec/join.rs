//! Nested-loop inner join.

use std::sync::Arc;

use crate::expr::{Expression, Tuple, TupleCellSpec};
use crate::record::Trx;

use super::error::ExecutorError;
use super::operator::PhysicalOperator;

/// Inner join: for every left row, the right child is reopened and
/// drained; the ON condition filters the combined rows. Output preserves
/// outer-then-inner order.
pub struct NestedLoopJoinOp {
    left: Box<PhysicalOperator>,
    right: Box<PhysicalOperator>,
    on: Option<Expression>,
    specs: Arc<Vec<TupleCellSpec>>,
    current_left: Option<Tuple>,
    right_open: bool,
    trx: Option<Trx>,
}

impl NestedLoopJoinOp {
    /// Creates a nested-loop join; the combined schema is left's cells
    /// followed by right's.
    pub fn new(left: PhysicalOperator, right: PhysicalOperator, on: Option<Expression>) -> Self {
        let mut combined: Vec<TupleCellSpec> = (*left.schema()).clone();
        combined.extend((*right.schema()).iter().cloned());
        Self {
            left: Box::new(left),
            right: Box::new(right),
            on,
            specs: Arc::new(combined),
            current_left: None,
            right_open: false,
            trx: None,
        }
    }

    pub fn open(&mut self, trx: &Trx) -> Result<(), ExecutorError> {
        if let Some(on) = self.on.as_mut() {
            on.attach_trx(trx);
        }
        self.trx = Some(*trx);
        self.current_left = None;
        self.right_open = false;
        self.left.open(trx)
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        loop {
            if self.current_left.is_none() {
                let Some(left_tuple) = self.left.next()? else {
                    return Ok(None);
                };
                self.current_left = Some(left_tuple);
                let trx = self
                    .trx
                    .ok_or_else(|| ExecutorError::Internal("join used before open".to_string()))?;
                // Rewind the inner side for the new outer row.
                self.right.open(&trx)?;
                self.right_open = true;
            }

            match self.right.next()? {
                Some(right_tuple) => {
                    let left_tuple = self
                        .current_left
                        .as_ref()
                        .expect("outer row is set in this branch");
                    let joined = Tuple::joined(self.specs.clone(), left_tuple, &right_tuple);
                    match self.on.as_mut() {
                        Some(on) => {
                            if on.get_value(&joined)?.to_bool() {
                                return Ok(Some(joined));
                            }
                        }
                        None => return Ok(Some(joined)),
                    }
                }
                None => {
                    self.right.close()?;
                    self.right_open = false;
                    self.current_left = None;
                }
            }
        }
    }

    pub fn close(&mut self) -> Result<(), ExecutorError> {
        // Children close in reverse creation order; closes are idempotent.
        if self.right_open {
            self.right.close()?;
            self.right_open = false;
        }
        self.left.close()
    }

    pub fn schema(&self) -> Arc<Vec<TupleCellSpec>> {
        self.specs.clone()
    }

    pub fn set_parent_tuple(&mut self, parent: Option<&Tuple>) {
        self.left.set_parent_tuple(parent);
        self.right.set_parent_tuple(parent);
    }

    pub fn children(&self) -> (&PhysicalOperator, &PhysicalOperator) {
        (&self.left, &self.right)
    }

    pub fn describe(&self) -> String {
        match &self.on {
            Some(on) => format!("NestedLoopJoin (on: {})", on),
            None => "NestedLoopJoin".to_string(),
        }
    }
}
