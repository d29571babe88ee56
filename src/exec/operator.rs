//! The physical operator tree.
//!
//! Volcano contract: `open(trx)` once per run, `next()` until it returns
//! `None` (the end-of-stream sentinel — never an error), `close()`
//! releases every resource and is idempotent. Parent operators close the
//! children they opened; any error from `open` or `next` must be followed
//! by `close` before the tree is dropped, which the session layer does.

use std::sync::Arc;

use crate::expr::{Tuple, TupleCellSpec};
use crate::record::Trx;

use super::error::ExecutorError;
use super::filter::FilterOp;
use super::group::{HashGroupByOp, ScalarAggregateOp};
use super::join::NestedLoopJoinOp;
use super::project::{CalcOp, ProjectOp};
use super::scan::{ChunkScanOp, IndexScanOp, TableScanOp};

/// A physical operator node.
pub enum PhysicalOperator {
    /// Sequential table scan.
    TableScan(TableScanOp),
    /// Index equality scan.
    IndexScan(IndexScanOp),
    /// Vectorized scan with an embedded predicate.
    ChunkScan(ChunkScanOp),
    /// Row filter.
    Filter(FilterOp),
    /// Nested-loop inner join.
    NestedLoopJoin(NestedLoopJoinOp),
    /// Hash aggregation with grouping keys.
    HashGroupBy(HashGroupByOp),
    /// Single-bucket aggregation.
    ScalarAggregate(ScalarAggregateOp),
    /// Projection.
    Project(ProjectOp),
    /// One-row constant evaluation.
    Calc(CalcOp),
}

impl PhysicalOperator {
    /// Opens the operator for one run.
    pub fn open(&mut self, trx: &Trx) -> Result<(), ExecutorError> {
        match self {
            PhysicalOperator::TableScan(op) => op.open(trx),
            PhysicalOperator::IndexScan(op) => op.open(trx),
            PhysicalOperator::ChunkScan(op) => op.open(trx),
            PhysicalOperator::Filter(op) => op.open(trx),
            PhysicalOperator::NestedLoopJoin(op) => op.open(trx),
            PhysicalOperator::HashGroupBy(op) => op.open(trx),
            PhysicalOperator::ScalarAggregate(op) => op.open(trx),
            PhysicalOperator::Project(op) => op.open(trx),
            PhysicalOperator::Calc(op) => op.open(trx),
        }
    }

    /// Pulls the next tuple; `None` is end of stream.
    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        match self {
            PhysicalOperator::TableScan(op) => op.next(),
            PhysicalOperator::IndexScan(op) => op.next(),
            PhysicalOperator::ChunkScan(op) => op.next(),
            PhysicalOperator::Filter(op) => op.next(),
            PhysicalOperator::NestedLoopJoin(op) => op.next(),
            PhysicalOperator::HashGroupBy(op) => op.next(),
            PhysicalOperator::ScalarAggregate(op) => op.next(),
            PhysicalOperator::Project(op) => op.next(),
            PhysicalOperator::Calc(op) => op.next(),
        }
    }

    /// Closes the operator and its children; idempotent.
    pub fn close(&mut self) -> Result<(), ExecutorError> {
        match self {
            PhysicalOperator::TableScan(op) => op.close(),
            PhysicalOperator::IndexScan(op) => op.close(),
            PhysicalOperator::ChunkScan(op) => op.close(),
            PhysicalOperator::Filter(op) => op.close(),
            PhysicalOperator::NestedLoopJoin(op) => op.close(),
            PhysicalOperator::HashGroupBy(op) => op.close(),
            PhysicalOperator::ScalarAggregate(op) => op.close(),
            PhysicalOperator::Project(op) => op.close(),
            PhysicalOperator::Calc(op) => op.close(),
        }
    }

    /// The cell specs this operator's tuples carry.
    pub fn schema(&self) -> Arc<Vec<TupleCellSpec>> {
        match self {
            PhysicalOperator::TableScan(op) => op.schema(),
            PhysicalOperator::IndexScan(op) => op.schema(),
            PhysicalOperator::ChunkScan(op) => op.schema(),
            PhysicalOperator::Filter(op) => op.schema(),
            PhysicalOperator::NestedLoopJoin(op) => op.schema(),
            PhysicalOperator::HashGroupBy(op) => op.schema(),
            PhysicalOperator::ScalarAggregate(op) => op.schema(),
            PhysicalOperator::Project(op) => op.schema(),
            PhysicalOperator::Calc(op) => op.schema(),
        }
    }

    /// Installs the correlated outer row before a subquery evaluation.
    /// Scans attach it to every tuple they produce.
    pub fn set_parent_tuple(&mut self, parent: Option<&Tuple>) {
        match self {
            PhysicalOperator::TableScan(op) => op.set_parent_tuple(parent),
            PhysicalOperator::IndexScan(op) => op.set_parent_tuple(parent),
            PhysicalOperator::ChunkScan(_) | PhysicalOperator::Calc(_) => {}
            PhysicalOperator::Filter(op) => op.set_parent_tuple(parent),
            PhysicalOperator::NestedLoopJoin(op) => op.set_parent_tuple(parent),
            PhysicalOperator::HashGroupBy(op) => op.set_parent_tuple(parent),
            PhysicalOperator::ScalarAggregate(op) => op.set_parent_tuple(parent),
            PhysicalOperator::Project(op) => op.set_parent_tuple(parent),
        }
    }

    /// One-line description of this node for EXPLAIN.
    fn describe_node(&self) -> String {
        match self {
            PhysicalOperator::TableScan(op) => op.describe(),
            PhysicalOperator::IndexScan(op) => op.describe(),
            PhysicalOperator::ChunkScan(op) => op.describe(),
            PhysicalOperator::Filter(op) => op.describe(),
            PhysicalOperator::NestedLoopJoin(op) => op.describe(),
            PhysicalOperator::HashGroupBy(op) => op.describe(),
            PhysicalOperator::ScalarAggregate(op) => op.describe(),
            PhysicalOperator::Project(op) => op.describe(),
            PhysicalOperator::Calc(op) => op.describe(),
        }
    }

    fn children(&self) -> Vec<&PhysicalOperator> {
        match self {
            PhysicalOperator::TableScan(_)
            | PhysicalOperator::IndexScan(_)
            | PhysicalOperator::ChunkScan(_)
            | PhysicalOperator::Calc(_) => vec![],
            PhysicalOperator::Filter(op) => vec![op.child()],
            PhysicalOperator::NestedLoopJoin(op) => {
                let (left, right) = op.children();
                vec![left, right]
            }
            PhysicalOperator::HashGroupBy(op) => vec![op.child()],
            PhysicalOperator::ScalarAggregate(op) => vec![op.child()],
            PhysicalOperator::Project(op) => vec![op.child()],
        }
    }

    /// Formats the operator tree for EXPLAIN, two-space indented per
    /// level, without executing anything.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.format_tree(0, &mut out);
        out
    }

    fn format_tree(&self, indent: usize, out: &mut String) {
        out.push_str(&"  ".repeat(indent));
        out.push_str(&self.describe_node());
        out.push('\n');
        for child in self.children() {
            child.format_tree(indent + 1, out);
        }
    }
}
