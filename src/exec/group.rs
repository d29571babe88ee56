//! Aggregation operators.
//!
//! [`HashGroupByOp`] keys a hash table by the tuple of group-by values
//! (NULL is its own key) and gives each bucket one aggregator per
//! aggregate expression. [`ScalarAggregateOp`] is the degenerate
//! single-bucket form used when no grouping keys are present; it emits
//! exactly one row even over empty input.
//!
//! Neither operator guarantees any output ordering.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::expr::{AggregateExpr, Aggregator, Expression, Tuple, TupleCellSpec};
use crate::record::Trx;
use crate::types::Value;

use super::error::ExecutorError;
use super::operator::PhysicalOperator;

/// Hash key over group-by values.
///
/// `Value` itself is neither `Eq` nor `Hash` (NULL and float semantics),
/// so grouping wraps it: NULL equals NULL here, and NaN equals NaN, which
/// is exactly what GROUP BY wants.
#[derive(Debug, Clone)]
pub struct GroupKey(pub Vec<Value>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        self.0.iter().zip(&other.0).all(|(a, b)| match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => a.compare(b) == Some(std::cmp::Ordering::Equal),
        })
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            match value {
                Value::Null => 0u8.hash(state),
                Value::Int(n) => {
                    1u8.hash(state);
                    n.hash(state);
                }
                Value::Float(f) => {
                    2u8.hash(state);
                    f.to_bits().hash(state);
                }
                Value::Chars(s) => {
                    3u8.hash(state);
                    s.hash(state);
                }
                Value::Date(d) => {
                    4u8.hash(state);
                    d.hash(state);
                }
                Value::Bool(b) => {
                    5u8.hash(state);
                    b.hash(state);
                }
            }
        }
    }
}

/// Builds the output specs of an aggregation: one cell per group key
/// followed by one cell per aggregate, found by display text (and by
/// table.field for plain key fields).
fn group_specs(keys: &[Expression], aggregates: &[AggregateExpr]) -> Arc<Vec<TupleCellSpec>> {
    let mut specs = Vec::with_capacity(keys.len() + aggregates.len());
    for key in keys {
        match key {
            Expression::Field(field) => specs.push(TupleCellSpec {
                table: Some(field.table_label.clone()),
                field: field.field_name.clone(),
                alias: field.display.clone(),
            }),
            other => specs.push(TupleCellSpec::aliased(&other.to_string())),
        }
    }
    for aggregate in aggregates {
        specs.push(TupleCellSpec::aliased(&aggregate.lookup_name()));
    }
    Arc::new(specs)
}

/// Feeds one input row into a bucket's aggregators.
fn accumulate_row(
    aggregates: &mut [AggregateExpr],
    aggregators: &mut [Box<dyn Aggregator>],
    tuple: &Tuple,
) -> Result<(), ExecutorError> {
    for (aggregate, aggregator) in aggregates.iter_mut().zip(aggregators.iter_mut()) {
        if aggregate.is_count_star() {
            aggregator.accumulate(&Value::Null)?;
        } else {
            let value = aggregate.child.get_value(tuple)?;
            aggregator.accumulate(&value)?;
        }
    }
    Ok(())
}

/// Hash aggregation over grouping keys.
pub struct HashGroupByOp {
    child: Box<PhysicalOperator>,
    keys: Vec<Expression>,
    aggregates: Vec<AggregateExpr>,
    specs: Arc<Vec<TupleCellSpec>>,
    output: Option<std::vec::IntoIter<Tuple>>,
}

impl HashGroupByOp {
    /// Creates a hash group-by.
    pub fn new(
        child: PhysicalOperator,
        keys: Vec<Expression>,
        aggregates: Vec<AggregateExpr>,
    ) -> Self {
        let specs = group_specs(&keys, &aggregates);
        Self {
            child: Box::new(child),
            keys,
            aggregates,
            specs,
            output: None,
        }
    }

    pub fn open(&mut self, trx: &Trx) -> Result<(), ExecutorError> {
        self.output = None;
        self.child.open(trx)
    }

    /// Drains the child, groups rows, then emits one tuple per bucket.
    fn build(&mut self) -> Result<std::vec::IntoIter<Tuple>, ExecutorError> {
        type Bucket = Vec<Box<dyn Aggregator>>;
        let mut groups: HashMap<GroupKey, Bucket> = HashMap::new();

        while let Some(tuple) = self.child.next()? {
            let mut key_values = Vec::with_capacity(self.keys.len());
            for key in &mut self.keys {
                key_values.push(key.get_value(&tuple)?);
            }
            let bucket = groups
                .entry(GroupKey(key_values))
                .or_insert_with(|| {
                    self.aggregates
                        .iter()
                        .map(|aggregate| aggregate.create_aggregator())
                        .collect()
                });
            accumulate_row(&mut self.aggregates, bucket, &tuple)?;
        }

        let mut tuples = Vec::with_capacity(groups.len());
        for (key, aggregators) in groups {
            let mut values = key.0;
            values.extend(aggregators.iter().map(|a| a.result()));
            tuples.push(Tuple::new(self.specs.clone(), values));
        }
        Ok(tuples.into_iter())
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        if self.output.is_none() {
            let output = self.build()?;
            self.output = Some(output);
        }
        Ok(self.output.as_mut().and_then(Iterator::next))
    }

    pub fn close(&mut self) -> Result<(), ExecutorError> {
        self.output = None;
        self.child.close()
    }

    pub fn schema(&self) -> Arc<Vec<TupleCellSpec>> {
        self.specs.clone()
    }

    pub fn set_parent_tuple(&mut self, parent: Option<&Tuple>) {
        self.child.set_parent_tuple(parent);
    }

    pub fn child(&self) -> &PhysicalOperator {
        &self.child
    }

    pub fn describe(&self) -> String {
        let keys: Vec<String> = self.keys.iter().map(|k| k.to_string()).collect();
        let aggs: Vec<String> = self.aggregates.iter().map(|a| a.lookup_name()).collect();
        format!(
            "HashGroupBy (keys: {}; aggs: {})",
            keys.join(", "),
            aggs.join(", ")
        )
    }
}

/// Single-bucket aggregation for aggregated queries without GROUP BY.
pub struct ScalarAggregateOp {
    child: Box<PhysicalOperator>,
    aggregates: Vec<AggregateExpr>,
    specs: Arc<Vec<TupleCellSpec>>,
    done: bool,
}

impl ScalarAggregateOp {
    /// Creates a single-bucket aggregation.
    pub fn new(child: PhysicalOperator, aggregates: Vec<AggregateExpr>) -> Self {
        let specs = group_specs(&[], &aggregates);
        Self {
            child: Box::new(child),
            aggregates,
            specs,
            done: false,
        }
    }

    pub fn open(&mut self, trx: &Trx) -> Result<(), ExecutorError> {
        self.done = false;
        self.child.open(trx)
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut aggregators: Vec<Box<dyn Aggregator>> = self
            .aggregates
            .iter()
            .map(|aggregate| aggregate.create_aggregator())
            .collect();
        while let Some(tuple) = self.child.next()? {
            accumulate_row(&mut self.aggregates, &mut aggregators, &tuple)?;
        }

        let values: Vec<Value> = aggregators.iter().map(|a| a.result()).collect();
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

    pub fn child(&self) -> &PhysicalOperator {
        &self.child
    }

    pub fn describe(&self) -> String {
        let aggs: Vec<String> = self.aggregates.iter().map(|a| a.lookup_name()).collect();
        format!("Aggregate ({})", aggs.join(", "))
    }
}
