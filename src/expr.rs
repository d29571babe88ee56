pub mod aggregate;
pub mod chunk;
pub mod expression;
pub mod kernel;
pub mod tuple;

pub use aggregate::Aggregator;
pub use chunk::{Chunk, Column, ColumnKind};
pub use expression::{
    AggregateExpr, ArithmeticExpr, ArithmeticType, CastExpr, ComparisonExpr, ConjunctionExpr,
    Expression, FieldExpr, ListExpr, StarExpr, SubQueryExpr, ValueExpr,
};
pub use tuple::{Tuple, TupleCellSpec};
