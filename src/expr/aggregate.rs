//! Aggregators: stateful accumulators behind aggregate expressions.
//!
//! An [`Aggregator`] consumes a stream of values via `accumulate` and
//! emits one value via `result`. NULL inputs are skipped by SUM, AVG,
//! MIN, MAX and COUNT(expr); COUNT(*) counts every row it is fed.

use crate::sql::ast::AggrFunc;
use crate::types::Value;

use crate::exec::error::ExecutorError;

/// Stateful accumulator consuming a value stream and emitting one value.
pub trait Aggregator {
    /// Feeds one input value.
    fn accumulate(&mut self, value: &Value) -> Result<(), ExecutorError>;

    /// Produces the final aggregate value.
    fn result(&self) -> Value;
}

/// One-shot factory for the aggregator behind an aggregate expression.
///
/// `count_star` distinguishes `COUNT(*)` (rows) from `COUNT(expr)`
/// (non-NULL values).
pub fn create_aggregator(func: AggrFunc, count_star: bool) -> Box<dyn Aggregator> {
    match func {
        AggrFunc::Count => {
            if count_star {
                Box::new(CountStarAggregator { count: 0 })
            } else {
                Box::new(CountAggregator { count: 0 })
            }
        }
        AggrFunc::Sum => Box::new(SumAggregator { sum: SumState::Empty }),
        AggrFunc::Avg => Box::new(AvgAggregator { sum: 0.0, count: 0 }),
        AggrFunc::Max => Box::new(MaxAggregator { max: Value::Null }),
        AggrFunc::Min => Box::new(MinAggregator { min: Value::Null }),
    }
}

/// COUNT(*): counts rows regardless of value.
struct CountStarAggregator {
    count: i32,
}

impl Aggregator for CountStarAggregator {
    fn accumulate(&mut self, _value: &Value) -> Result<(), ExecutorError> {
        self.count += 1;
        Ok(())
    }

    fn result(&self) -> Value {
        Value::Int(self.count)
    }
}

/// COUNT(expr): counts non-NULL values.
struct CountAggregator {
    count: i32,
}

impl Aggregator for CountAggregator {
    fn accumulate(&mut self, value: &Value) -> Result<(), ExecutorError> {
        if !value.is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn result(&self) -> Value {
        Value::Int(self.count)
    }
}

enum SumState {
    Empty,
    Int(i64),
    Float(f64),
}

/// SUM: integer inputs keep an integer sum, float inputs a float sum.
/// All-NULL input yields NULL.
struct SumAggregator {
    sum: SumState,
}

impl Aggregator for SumAggregator {
    fn accumulate(&mut self, value: &Value) -> Result<(), ExecutorError> {
        match value {
            Value::Null => {}
            Value::Int(n) => {
                self.sum = match self.sum {
                    SumState::Empty => SumState::Int(*n as i64),
                    SumState::Int(sum) => SumState::Int(sum + *n as i64),
                    SumState::Float(sum) => SumState::Float(sum + *n as f64),
                };
            }
            Value::Float(f) => {
                self.sum = match self.sum {
                    SumState::Empty => SumState::Float(*f as f64),
                    SumState::Int(sum) => SumState::Float(sum as f64 + *f as f64),
                    SumState::Float(sum) => SumState::Float(sum + *f as f64),
                };
            }
            other => {
                return Err(ExecutorError::TypeMismatch {
                    expected: "numeric".to_string(),
                    found: other.attr_type().to_string(),
                });
            }
        }
        Ok(())
    }

    fn result(&self) -> Value {
        match self.sum {
            SumState::Empty => Value::Null,
            SumState::Int(sum) => Value::Int(sum as i32),
            SumState::Float(sum) => Value::Float(sum as f32),
        }
    }
}

/// AVG: float mean of the non-NULL inputs; NULL when there are none.
struct AvgAggregator {
    sum: f64,
    count: i64,
}

impl Aggregator for AvgAggregator {
    fn accumulate(&mut self, value: &Value) -> Result<(), ExecutorError> {
        match value {
            Value::Null => {}
            Value::Int(n) => {
                self.sum += *n as f64;
                self.count += 1;
            }
            Value::Float(f) => {
                self.sum += *f as f64;
                self.count += 1;
            }
            other => {
                return Err(ExecutorError::TypeMismatch {
                    expected: "numeric".to_string(),
                    found: other.attr_type().to_string(),
                });
            }
        }
        Ok(())
    }

    fn result(&self) -> Value {
        if self.count == 0 {
            Value::Null
        } else {
            Value::Float((self.sum / self.count as f64) as f32)
        }
    }
}

/// MAX over any comparable type; NULL inputs are skipped.
struct MaxAggregator {
    max: Value,
}

impl Aggregator for MaxAggregator {
    fn accumulate(&mut self, value: &Value) -> Result<(), ExecutorError> {
        if value.is_null() {
            return Ok(());
        }
        if self.max.is_null() {
            self.max = value.clone();
        } else if let Some(std::cmp::Ordering::Greater) = value.compare(&self.max) {
            self.max = value.clone();
        }
        Ok(())
    }

    fn result(&self) -> Value {
        self.max.clone()
    }
}

/// MIN over any comparable type; NULL inputs are skipped.
struct MinAggregator {
    min: Value,
}

impl Aggregator for MinAggregator {
    fn accumulate(&mut self, value: &Value) -> Result<(), ExecutorError> {
        if value.is_null() {
            return Ok(());
        }
        if self.min.is_null() {
            self.min = value.clone();
        } else if let Some(std::cmp::Ordering::Less) = value.compare(&self.min) {
            self.min = value.clone();
        }
        Ok(())
    }

    fn result(&self) -> Value {
        self.min.clone()
    }
}
