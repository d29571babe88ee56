//! The resolved expression tree.
//!
//! [`Expression`] is the uniform node the resolver produces and the
//! executor evaluates. Every node supports row-wise
//! [`get_value`](Expression::get_value); the numeric nodes additionally
//! support columnar [`get_column`](Expression::get_column), and
//! comparisons/conjunctions evaluate into a selection vector. Nodes own
//! their children exclusively.
//!
//! NULL semantics: arithmetic with a NULL operand yields NULL; ordinary
//! comparison with a NULL operand yields boolean false (`IS [NOT] NULL`
//! is the only NULL-aware predicate). Division by zero yields NULL, not
//! an error.

use std::fmt;

use crate::catalog::FieldMeta;
use crate::exec::error::ExecutorError;
use crate::exec::operator::PhysicalOperator;
use crate::record::Trx;
use crate::sql::ast::{AggrFunc, ArithOp, CompOp, ConjOp};
use crate::types::{like, AttrType, Value};

use super::aggregate::{create_aggregator, Aggregator};
use super::chunk::{Chunk, Column};
use super::kernel;
use super::tuple::Tuple;

/// A resolved expression node.
#[derive(Debug)]
pub enum Expression {
    /// Resolved column reference.
    Field(FieldExpr),
    /// Constant value.
    Value(ValueExpr),
    /// Type cast.
    Cast(CastExpr),
    /// Arithmetic (binary or negation).
    Arithmetic(ArithmeticExpr),
    /// Comparison predicate.
    Comparison(ComparisonExpr),
    /// AND/OR over children.
    Conjunction(ConjunctionExpr),
    /// Aggregate call.
    Aggregate(AggregateExpr),
    /// `*` — survives resolution only as the COUNT(*) argument.
    Star(StarExpr),
    /// Parenthesized value list (IN right-hand side).
    List(ListExpr),
    /// Nested SELECT.
    SubQuery(SubQueryExpr),
}

/// Resolved column reference.
#[derive(Debug)]
pub struct FieldExpr {
    /// Table label in scope (alias or table name).
    pub table_label: String,
    /// Field name.
    pub field_name: String,
    /// Resolved field metadata.
    pub meta: FieldMeta,
    /// User-field position for chunk lookup, set at plan time.
    pub pos: Option<usize>,
    /// Display name: `field` in single-table scope, `table.field` otherwise.
    pub display: String,
}

/// Constant value.
#[derive(Debug)]
pub struct ValueExpr {
    /// The constant.
    pub value: Value,
}

/// Type cast of a child expression.
#[derive(Debug)]
pub struct CastExpr {
    /// Child expression.
    pub child: Box<Expression>,
    /// Target type.
    pub target: AttrType,
}

/// Arithmetic operator kinds, including unary negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticType {
    Add,
    Sub,
    Mul,
    Div,
    Negative,
}

impl From<ArithOp> for ArithmeticType {
    fn from(op: ArithOp) -> Self {
        match op {
            ArithOp::Add => ArithmeticType::Add,
            ArithOp::Sub => ArithmeticType::Sub,
            ArithOp::Mul => ArithmeticType::Mul,
            ArithOp::Div => ArithmeticType::Div,
        }
    }
}

impl ArithmeticType {
    fn as_str(self) -> &'static str {
        match self {
            ArithmeticType::Add => "+",
            ArithmeticType::Sub => "-",
            ArithmeticType::Mul => "*",
            ArithmeticType::Div => "/",
            ArithmeticType::Negative => "-",
        }
    }

    fn binary_op(self) -> Option<ArithOp> {
        match self {
            ArithmeticType::Add => Some(ArithOp::Add),
            ArithmeticType::Sub => Some(ArithOp::Sub),
            ArithmeticType::Mul => Some(ArithOp::Mul),
            ArithmeticType::Div => Some(ArithOp::Div),
            ArithmeticType::Negative => None,
        }
    }
}

/// Arithmetic node; `right` is `None` for negation.
#[derive(Debug)]
pub struct ArithmeticExpr {
    /// Operator.
    pub op: ArithmeticType,
    /// Left (or only) operand.
    pub left: Box<Expression>,
    /// Right operand; absent for negation.
    pub right: Option<Box<Expression>>,
}

/// Comparison node. IN/EXISTS/IS NULL share this node with the ordered
/// operators; the operand shapes differ per operator.
#[derive(Debug)]
pub struct ComparisonExpr {
    /// Operator.
    pub op: CompOp,
    /// Left operand.
    pub left: Box<Expression>,
    /// Right operand.
    pub right: Box<Expression>,
}

/// AND/OR over any number of children.
#[derive(Debug)]
pub struct ConjunctionExpr {
    /// AND or OR.
    pub op: ConjOp,
    /// Child predicates. An empty conjunction is true.
    pub children: Vec<Expression>,
}

/// Aggregate call.
#[derive(Debug)]
pub struct AggregateExpr {
    /// Aggregate function.
    pub func: AggrFunc,
    /// Argument; [`Expression::Star`] for COUNT(*).
    pub child: Box<Expression>,
}

/// `*` or `table.*`.
#[derive(Debug)]
pub struct StarExpr {
    /// Table qualifier.
    pub table: Option<String>,
}

/// Value list, the right-hand side of IN over literals.
#[derive(Debug)]
pub struct ListExpr {
    /// List items.
    pub items: Vec<Expression>,
}

/// A nested SELECT inside a comparison.
///
/// Filled in stages: the resolver attaches the resolved statement, the
/// physical planner attaches the operator tree, and the enclosing
/// operator's `open` attaches the transaction. The containing comparison
/// opens the operator before each evaluation (installing the outer row as
/// the parent tuple) and closes it on every exit path.
pub struct SubQueryExpr {
    /// Resolved statement, consumed by the planner.
    pub select: Option<Box<crate::stmt::SelectStmt>>,
    /// Physical operator tree.
    pub operator: Option<Box<PhysicalOperator>>,
    trx: Option<Trx>,
    opened: bool,
}

impl fmt::Debug for SubQueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubQueryExpr")
            .field("opened", &self.opened)
            .finish_non_exhaustive()
    }
}

impl SubQueryExpr {
    /// Creates a subquery wrapper around a resolved statement.
    pub fn new(select: Box<crate::stmt::SelectStmt>) -> Self {
        Self {
            select: Some(select),
            operator: None,
            trx: None,
            opened: false,
        }
    }

    /// Installs the physical operator tree.
    pub fn set_operator(&mut self, operator: Box<PhysicalOperator>) {
        self.operator = Some(operator);
    }

    fn attach_trx(&mut self, trx: &Trx) {
        // The operator's own open() threads the transaction further down,
        // so storing it here is enough even for nested subqueries.
        self.trx = Some(*trx);
    }

    /// Opens (or rewinds) the subquery for one evaluation against an
    /// outer row.
    fn open(&mut self, parent: &Tuple) -> Result<(), ExecutorError> {
        let trx = self.trx.ok_or_else(|| {
            ExecutorError::Internal("subquery evaluated without a transaction".to_string())
        })?;
        let op = self
            .operator
            .as_mut()
            .ok_or_else(|| ExecutorError::Internal("subquery has no physical plan".to_string()))?;
        op.open(&trx)?;
        op.set_parent_tuple(Some(parent));
        self.opened = true;
        Ok(())
    }

    /// Returns the first cell of the next row, or `None` at end of stream.
    fn next_value(&mut self) -> Result<Option<Value>, ExecutorError> {
        let op = self
            .operator
            .as_mut()
            .ok_or_else(|| ExecutorError::Internal("subquery has no physical plan".to_string()))?;
        match op.next()? {
            None => Ok(None),
            Some(tuple) => {
                let value = tuple.cell_at(0).cloned().ok_or_else(|| {
                    ExecutorError::Internal("subquery row has no cells".to_string())
                })?;
                Ok(Some(value))
            }
        }
    }

    /// Closes the subquery; safe to call when not open.
    fn close(&mut self) {
        if self.opened {
            if let Some(op) = self.operator.as_mut() {
                let _ = op.close();
            }
            self.opened = false;
        }
    }
}

impl Expression {
    /// The result type of this expression, derived from its children.
    pub fn value_type(&self) -> AttrType {
        match self {
            Expression::Field(e) => e.meta.attr_type,
            Expression::Value(e) => e.value.attr_type(),
            Expression::Cast(e) => e.target,
            Expression::Arithmetic(e) => e.value_type(),
            Expression::Comparison(_) | Expression::Conjunction(_) => AttrType::Booleans,
            Expression::Aggregate(e) => e.value_type(),
            Expression::Star(_) | Expression::List(_) | Expression::SubQuery(_) => {
                AttrType::Undefined
            }
        }
    }

    /// Row-wise evaluation.
    pub fn get_value(&mut self, tuple: &Tuple) -> Result<Value, ExecutorError> {
        match self {
            Expression::Field(e) => e.get_value(tuple),
            Expression::Value(e) => Ok(e.value.clone()),
            Expression::Cast(e) => {
                let value = e.child.get_value(tuple)?;
                Ok(value.cast_to(e.target)?)
            }
            Expression::Arithmetic(e) => e.get_value(tuple),
            Expression::Comparison(e) => e.get_value(tuple),
            Expression::Conjunction(e) => e.get_value(tuple),
            Expression::Aggregate(e) => e.get_value(tuple),
            Expression::Star(_) => Err(ExecutorError::Internal(
                "star expression cannot be evaluated".to_string(),
            )),
            Expression::List(_) => Err(ExecutorError::Internal(
                "list expression cannot be evaluated alone".to_string(),
            )),
            Expression::SubQuery(_) => Err(ExecutorError::Internal(
                "subquery evaluated outside a comparison".to_string(),
            )),
        }
    }

    /// Constant evaluation against an empty row, for CALC and literal
    /// folding. Field references fail here.
    pub fn const_value(&mut self) -> Result<Value, ExecutorError> {
        let empty = Tuple::default();
        self.get_value(&empty)
    }

    /// Columnar evaluation. Nodes without a vector form report
    /// [`ExecutorError::Unimplemented`] and the engine falls back to the
    /// row path.
    pub fn get_column(&mut self, chunk: &Chunk) -> Result<Column, ExecutorError> {
        match self {
            Expression::Field(e) => e.get_column(chunk),
            Expression::Value(e) => Column::constant(&e.value, chunk.rows())
                .ok_or(ExecutorError::Unimplemented("non-numeric constant column")),
            Expression::Arithmetic(e) => e.get_column(chunk),
            _ => Err(ExecutorError::Unimplemented("expression has no vector form")),
        }
    }

    /// Evaluates this predicate over a chunk into a 0/1 selection vector.
    pub fn eval_select(
        &mut self,
        chunk: &Chunk,
        select: &mut Vec<u8>,
    ) -> Result<(), ExecutorError> {
        match self {
            Expression::Comparison(e) => e.eval_select(chunk, select),
            Expression::Conjunction(e) => e.eval_select(chunk, select),
            _ => Err(ExecutorError::Unimplemented("predicate has no vector form")),
        }
    }

    /// True when the whole tree can take the vector path.
    pub fn supports_vectorized(&self) -> bool {
        match self {
            Expression::Field(e) => e.meta.attr_type.is_numeric(),
            Expression::Value(e) => e.value.attr_type().is_numeric(),
            Expression::Arithmetic(e) => {
                e.left.supports_vectorized()
                    && e.right.as_ref().is_none_or(|r| r.supports_vectorized())
            }
            Expression::Comparison(e) => {
                matches!(
                    e.op,
                    CompOp::Eq | CompOp::Ne | CompOp::Lt | CompOp::Le | CompOp::Gt | CompOp::Ge
                ) && e.left.supports_vectorized()
                    && e.right.supports_vectorized()
            }
            Expression::Conjunction(e) => e.children.iter().all(|c| c.supports_vectorized()),
            _ => false,
        }
    }

    /// True when this tree contains an aggregate call.
    pub fn has_aggregate(&self) -> bool {
        match self {
            Expression::Aggregate(_) => true,
            Expression::Field(_)
            | Expression::Value(_)
            | Expression::Star(_)
            | Expression::SubQuery(_) => false,
            Expression::Cast(e) => e.child.has_aggregate(),
            Expression::Arithmetic(e) => {
                e.left.has_aggregate() || e.right.as_ref().is_some_and(|r| r.has_aggregate())
            }
            Expression::Comparison(e) => e.left.has_aggregate() || e.right.has_aggregate(),
            Expression::Conjunction(e) => e.children.iter().any(|c| c.has_aggregate()),
            Expression::List(e) => e.items.iter().any(|i| i.has_aggregate()),
        }
    }

    /// Threads the transaction down to every subquery in the tree;
    /// called when the owning operator opens.
    pub fn attach_trx(&mut self, trx: &Trx) {
        match self {
            Expression::Field(_) | Expression::Value(_) | Expression::Star(_) => {}
            Expression::Cast(e) => e.child.attach_trx(trx),
            Expression::Arithmetic(e) => {
                e.left.attach_trx(trx);
                if let Some(right) = e.right.as_mut() {
                    right.attach_trx(trx);
                }
            }
            Expression::Comparison(e) => {
                e.left.attach_trx(trx);
                e.right.attach_trx(trx);
            }
            Expression::Conjunction(e) => {
                for child in &mut e.children {
                    child.attach_trx(trx);
                }
            }
            Expression::Aggregate(e) => e.child.attach_trx(trx),
            Expression::List(e) => {
                for item in &mut e.items {
                    item.attach_trx(trx);
                }
            }
            Expression::SubQuery(e) => e.attach_trx(trx),
        }
    }
}

impl FieldExpr {
    /// Creates a resolved field reference.
    pub fn new(table_label: &str, meta: FieldMeta, display: &str) -> Self {
        Self {
            table_label: table_label.to_string(),
            field_name: meta.name.clone(),
            meta,
            pos: None,
            display: display.to_string(),
        }
    }

    fn get_value(&self, tuple: &Tuple) -> Result<Value, ExecutorError> {
        tuple
            .find_cell(Some(&self.table_label), &self.field_name)
            .cloned()
            .ok_or_else(|| ExecutorError::FieldNotFound {
                name: self.display.clone(),
            })
    }

    fn get_column(&self, chunk: &Chunk) -> Result<Column, ExecutorError> {
        let pos = self
            .pos
            .ok_or(ExecutorError::Unimplemented("field has no chunk position"))?;
        chunk
            .column(pos)
            .cloned()
            .ok_or(ExecutorError::Unimplemented("field type has no vector form"))
    }
}

impl ArithmeticExpr {
    /// The arithmetic result type: NULL if either side is NULL-typed,
    /// INT only when both sides are INT and the operator is not DIV,
    /// FLOAT otherwise. Negation inherits its child type.
    pub fn value_type(&self) -> AttrType {
        let Some(right) = self.right.as_ref() else {
            return self.left.value_type();
        };
        let lt = self.left.value_type();
        let rt = right.value_type();
        if lt == AttrType::Nulls || rt == AttrType::Nulls {
            return AttrType::Nulls;
        }
        if lt == AttrType::Ints && rt == AttrType::Ints && self.op != ArithmeticType::Div {
            return AttrType::Ints;
        }
        AttrType::Floats
    }

    fn get_value(&mut self, tuple: &Tuple) -> Result<Value, ExecutorError> {
        let left_value = self.left.get_value(tuple)?;
        let right_value = match self.right.as_mut() {
            Some(right) => Some(right.get_value(tuple)?),
            None => None,
        };
        self.calc_value(&left_value, right_value.as_ref())
    }

    fn calc_value(
        &self,
        left: &Value,
        right: Option<&Value>,
    ) -> Result<Value, ExecutorError> {
        if self.op == ArithmeticType::Negative {
            return match left {
                Value::Null => Ok(Value::Null),
                Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(ExecutorError::TypeMismatch {
                    expected: "numeric".to_string(),
                    found: other.attr_type().to_string(),
                }),
            };
        }

        let right = right.ok_or_else(|| {
            ExecutorError::Internal("binary arithmetic without a right operand".to_string())
        })?;
        let target = self.value_type();
        if target == AttrType::Nulls || left.is_null() || right.is_null() {
            return Ok(Value::Null);
        }

        let type_error = |v: &Value| ExecutorError::TypeMismatch {
            expected: "numeric".to_string(),
            found: v.attr_type().to_string(),
        };

        if target == AttrType::Ints {
            let a = left.to_i32().ok_or_else(|| type_error(left))?;
            let b = right.to_i32().ok_or_else(|| type_error(right))?;
            let result = match self.op {
                ArithmeticType::Add => a.wrapping_add(b),
                ArithmeticType::Sub => a.wrapping_sub(b),
                ArithmeticType::Mul => a.wrapping_mul(b),
                // DIV never has an INT result type.
                _ => {
                    return Err(ExecutorError::Internal(
                        "unexpected integer division".to_string(),
                    ));
                }
            };
            return Ok(Value::Int(result));
        }

        let a = left.to_f32().ok_or_else(|| type_error(left))?;
        let b = right.to_f32().ok_or_else(|| type_error(right))?;
        let result = match self.op {
            ArithmeticType::Add => a + b,
            ArithmeticType::Sub => a - b,
            ArithmeticType::Mul => a * b,
            ArithmeticType::Div => {
                if matches!(right, Value::Int(0)) || b.abs() < 1e-6 {
                    return Ok(Value::Null);
                }
                a / b
            }
            ArithmeticType::Negative => unreachable!("handled above"),
        };
        Ok(Value::Float(result))
    }

    fn get_column(&mut self, chunk: &Chunk) -> Result<Column, ExecutorError> {
        if self.op == ArithmeticType::Negative {
            let child = self.left.get_column(chunk)?;
            return Ok(kernel::negate_column(&child));
        }
        let op = self
            .op
            .binary_op()
            .ok_or_else(|| ExecutorError::Internal("negation is not binary".to_string()))?;
        let target = self.value_type();
        let right = self.right.as_mut().ok_or_else(|| {
            ExecutorError::Internal("binary arithmetic without a right operand".to_string())
        })?;
        let mut left_column = self.left.get_column(chunk)?;
        let mut right_column = right.get_column(chunk)?;
        if target == AttrType::Floats {
            left_column = left_column.cast_to_float();
            right_column = right_column.cast_to_float();
        }
        kernel::arith_columns(op, &left_column, &right_column)
    }
}

impl ComparisonExpr {
    fn get_value(&mut self, tuple: &Tuple) -> Result<Value, ExecutorError> {
        let result = self.eval_with_subqueries(tuple);
        // Close on every exit path, success or error.
        if let Expression::SubQuery(sub) = self.left.as_mut() {
            sub.close();
        }
        if let Expression::SubQuery(sub) = self.right.as_mut() {
            sub.close();
        }
        result
    }

    fn eval_with_subqueries(&mut self, tuple: &Tuple) -> Result<Value, ExecutorError> {
        if let Expression::SubQuery(sub) = self.left.as_mut() {
            sub.open(tuple)?;
        }
        if let Expression::SubQuery(sub) = self.right.as_mut() {
            sub.open(tuple)?;
        }

        match self.op {
            CompOp::Exists | CompOp::NotExists => {
                let Expression::SubQuery(sub) = self.right.as_mut() else {
                    return Err(ExecutorError::Internal(
                        "EXISTS requires a subquery".to_string(),
                    ));
                };
                let has_row = sub.next_value()?.is_some();
                let result = if self.op == CompOp::Exists {
                    has_row
                } else {
                    !has_row
                };
                Ok(Value::Bool(result))
            }

            CompOp::In | CompOp::NotIn => {
                let left_value = scalar_value(self.left.as_mut(), tuple)?;
                if left_value.is_null() {
                    return Ok(Value::Bool(false));
                }
                let mut found = false;
                let mut has_null = false;
                match self.right.as_mut() {
                    Expression::List(list) => {
                        for item in &mut list.items {
                            let item_value = item.get_value(tuple)?;
                            if item_value.is_null() {
                                has_null = true;
                            } else if left_value.compare(&item_value)
                                == Some(std::cmp::Ordering::Equal)
                            {
                                found = true;
                            }
                        }
                    }
                    Expression::SubQuery(sub) => {
                        while let Some(item_value) = sub.next_value()? {
                            if item_value.is_null() {
                                has_null = true;
                            } else if left_value.compare(&item_value)
                                == Some(std::cmp::Ordering::Equal)
                            {
                                found = true;
                            }
                        }
                    }
                    _ => {
                        return Err(ExecutorError::Internal(
                            "IN requires a list or subquery".to_string(),
                        ));
                    }
                }
                let result = if self.op == CompOp::In {
                    found
                } else {
                    !found && !has_null
                };
                Ok(Value::Bool(result))
            }

            CompOp::IsNull | CompOp::IsNotNull => {
                let left_value = scalar_value(self.left.as_mut(), tuple)?;
                let is_null = left_value.is_null();
                let result = if self.op == CompOp::IsNull {
                    is_null
                } else {
                    !is_null
                };
                Ok(Value::Bool(result))
            }

            _ => {
                let left_value = scalar_value(self.left.as_mut(), tuple)?;
                let right_value = scalar_value(self.right.as_mut(), tuple)?;
                let result = compare_value(self.op, &left_value, &right_value)?;
                Ok(Value::Bool(result))
            }
        }
    }

    fn eval_select(&mut self, chunk: &Chunk, select: &mut Vec<u8>) -> Result<(), ExecutorError> {
        let mut left_column = self.left.get_column(chunk)?;
        let mut right_column = self.right.get_column(chunk)?;
        if left_column.attr_type() != right_column.attr_type() {
            left_column = left_column.cast_to_float();
            right_column = right_column.cast_to_float();
        }
        kernel::compare_columns(self.op, &left_column, &right_column, select)
    }
}

/// Evaluates an operand to one scalar value. A subquery operand yields its
/// single cell: zero rows is NULL, more than one row is an error.
fn scalar_value(expr: &mut Expression, tuple: &Tuple) -> Result<Value, ExecutorError> {
    match expr {
        Expression::SubQuery(sub) => {
            let Some(first) = sub.next_value()? else {
                return Ok(Value::Null);
            };
            if sub.next_value()?.is_some() {
                return Err(ExecutorError::SubqueryTooManyRows);
            }
            Ok(first)
        }
        other => other.get_value(tuple),
    }
}

/// Two-valued comparison: NULL operands make every ordered operator (and
/// LIKE) false; incomparable types are an error.
fn compare_value(op: CompOp, left: &Value, right: &Value) -> Result<bool, ExecutorError> {
    if left.is_null() || right.is_null() {
        return Ok(false);
    }

    if matches!(op, CompOp::Like | CompOp::NotLike) {
        let (Value::Chars(text), Value::Chars(pattern)) = (left, right) else {
            return Err(ExecutorError::TypeMismatch {
                expected: "chars".to_string(),
                found: format!("{} LIKE {}", left.attr_type(), right.attr_type()),
            });
        };
        let matched = like::like_match(text, pattern);
        return Ok(if op == CompOp::Like { matched } else { !matched });
    }

    let ordering = left
        .compare(right)
        .ok_or_else(|| ExecutorError::TypeMismatch {
            expected: left.attr_type().to_string(),
            found: right.attr_type().to_string(),
        })?;
    let result = match op {
        CompOp::Eq => ordering == std::cmp::Ordering::Equal,
        CompOp::Ne => ordering != std::cmp::Ordering::Equal,
        CompOp::Lt => ordering == std::cmp::Ordering::Less,
        CompOp::Le => ordering != std::cmp::Ordering::Greater,
        CompOp::Gt => ordering == std::cmp::Ordering::Greater,
        CompOp::Ge => ordering != std::cmp::Ordering::Less,
        other => {
            return Err(ExecutorError::Internal(format!(
                "operator {} is not an ordered comparison",
                other.as_str()
            )));
        }
    };
    Ok(result)
}

impl ConjunctionExpr {
    fn get_value(&mut self, tuple: &Tuple) -> Result<Value, ExecutorError> {
        if self.children.is_empty() {
            return Ok(Value::Bool(true));
        }
        for child in &mut self.children {
            let value = child.get_value(tuple)?;
            let truth = value.to_bool();
            match self.op {
                ConjOp::And if !truth => return Ok(Value::Bool(false)),
                ConjOp::Or if truth => return Ok(Value::Bool(true)),
                _ => {}
            }
        }
        Ok(Value::Bool(self.op == ConjOp::And))
    }

    fn eval_select(&mut self, chunk: &Chunk, select: &mut Vec<u8>) -> Result<(), ExecutorError> {
        if self.children.is_empty() {
            select.iter_mut().for_each(|b| *b = 1);
            return Ok(());
        }
        let mut first = true;
        let mut child_select = vec![0u8; select.len()];
        for child in &mut self.children {
            if first {
                child.eval_select(chunk, select)?;
                first = false;
                continue;
            }
            child.eval_select(chunk, &mut child_select)?;
            match self.op {
                ConjOp::And => {
                    for (out, b) in select.iter_mut().zip(&child_select) {
                        *out &= b;
                    }
                }
                ConjOp::Or => {
                    for (out, b) in select.iter_mut().zip(&child_select) {
                        *out |= b;
                    }
                }
            }
        }
        Ok(())
    }
}

impl AggregateExpr {
    /// True for COUNT(*).
    pub fn is_count_star(&self) -> bool {
        self.func == AggrFunc::Count && matches!(*self.child, Expression::Star(_))
    }

    /// The aggregate's result type.
    pub fn value_type(&self) -> AttrType {
        match self.func {
            AggrFunc::Count => AttrType::Ints,
            AggrFunc::Avg => AttrType::Floats,
            AggrFunc::Sum | AggrFunc::Max | AggrFunc::Min => self.child.value_type(),
        }
    }

    /// One-shot aggregator factory for this call.
    pub fn create_aggregator(&self) -> Box<dyn Aggregator> {
        create_aggregator(self.func, self.is_count_star())
    }

    /// The display text this aggregate is looked up by in a group tuple.
    pub fn lookup_name(&self) -> String {
        format!("{}({})", self.func.as_str(), self.child)
    }

    fn get_value(&self, tuple: &Tuple) -> Result<Value, ExecutorError> {
        tuple
            .find_cell(None, &self.lookup_name())
            .cloned()
            .ok_or_else(|| ExecutorError::FieldNotFound {
                name: self.lookup_name(),
            })
    }
}

/// Display builds the expression's text: field display names follow the
/// resolver's scope rules, everything else is structural. Aggregates are
/// looked up in group tuples by exactly this text.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Field(e) => write!(f, "{}", e.display),
            Expression::Value(e) => match &e.value {
                Value::Chars(s) => write!(f, "'{}'", s),
                other => write!(f, "{}", other),
            },
            Expression::Cast(e) => write!(f, "{}", e.child),
            Expression::Arithmetic(e) => match &e.right {
                Some(right) => write!(f, "{}{}{}", e.left, e.op.as_str(), right),
                None => write!(f, "-{}", e.left),
            },
            Expression::Comparison(e) => match e.op {
                CompOp::IsNull | CompOp::IsNotNull => {
                    write!(f, "{} {}", e.left, e.op.as_str())
                }
                CompOp::Exists | CompOp::NotExists => {
                    write!(f, "{} {}", e.op.as_str(), e.right)
                }
                _ => write!(f, "{} {} {}", e.left, e.op.as_str(), e.right),
            },
            Expression::Conjunction(e) => {
                let sep = match e.op {
                    ConjOp::And => " AND ",
                    ConjOp::Or => " OR ",
                };
                for (i, child) in e.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", sep)?;
                    }
                    write!(f, "{}", child)?;
                }
                Ok(())
            }
            Expression::Aggregate(e) => {
                write!(f, "{}({})", e.func.as_str(), e.child)
            }
            Expression::Star(e) => match &e.table {
                Some(t) => write!(f, "{}.*", t),
                None => write!(f, "*"),
            },
            Expression::List(e) => {
                write!(f, "(")?;
                for (i, item) in e.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Expression::SubQuery(_) => write!(f, "(subquery)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldMeta;
    use crate::expr::tuple::TupleCellSpec;
    use std::sync::Arc;

    fn int_field(table: &str, name: &str) -> Expression {
        let meta = FieldMeta {
            name: name.to_string(),
            attr_type: AttrType::Ints,
            offset: 0,
            len: 4,
            nullable: true,
            field_id: 1,
            system: false,
        };
        Expression::Field(FieldExpr::new(table, meta, name))
    }

    fn value(v: Value) -> Expression {
        Expression::Value(ValueExpr { value: v })
    }

    fn row(table: &str, cells: &[(&str, Value)]) -> Tuple {
        let specs = Arc::new(
            cells
                .iter()
                .map(|(name, _)| TupleCellSpec::new(Some(table), name))
                .collect::<Vec<_>>(),
        );
        Tuple::new(specs, cells.iter().map(|(_, v)| v.clone()).collect())
    }

    fn compare(op: CompOp, left: Expression, right: Expression) -> Expression {
        Expression::Comparison(ComparisonExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn arith(op: ArithmeticType, left: Expression, right: Expression) -> Expression {
        Expression::Arithmetic(ArithmeticExpr {
            op,
            left: Box::new(left),
            right: Some(Box::new(right)),
        })
    }

    #[test]
    fn test_field_lookup() {
        let mut expr = int_field("t", "id");
        let tuple = row("t", &[("id", Value::Int(7))]);
        assert_eq!(expr.get_value(&tuple).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_field_missing() {
        let mut expr = int_field("t", "id");
        let tuple = row("u", &[("id", Value::Int(7))]);
        assert!(matches!(
            expr.get_value(&tuple),
            Err(ExecutorError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_arith_result_types() {
        let int_int = arith(ArithmeticType::Add, value(Value::Int(1)), value(Value::Int(2)));
        assert_eq!(int_int.value_type(), AttrType::Ints);

        let int_float = arith(
            ArithmeticType::Add,
            value(Value::Int(1)),
            value(Value::Float(2.0)),
        );
        assert_eq!(int_float.value_type(), AttrType::Floats);

        let int_div = arith(ArithmeticType::Div, value(Value::Int(1)), value(Value::Int(2)));
        assert_eq!(int_div.value_type(), AttrType::Floats);

        let with_null = arith(ArithmeticType::Add, value(Value::Int(1)), value(Value::Null));
        assert_eq!(with_null.value_type(), AttrType::Nulls);

        let negate = Expression::Arithmetic(ArithmeticExpr {
            op: ArithmeticType::Negative,
            left: Box::new(value(Value::Float(1.0))),
            right: None,
        });
        assert_eq!(negate.value_type(), AttrType::Floats);
    }

    #[test]
    fn test_arith_null_propagates() {
        let mut expr = arith(ArithmeticType::Add, value(Value::Int(1)), value(Value::Null));
        assert_eq!(expr.const_value().unwrap(), Value::Null);
    }

    #[test]
    fn test_div_by_zero_is_null() {
        let mut expr = arith(ArithmeticType::Div, value(Value::Int(10)), value(Value::Int(0)));
        assert_eq!(expr.const_value().unwrap(), Value::Null);

        let mut expr = arith(
            ArithmeticType::Div,
            value(Value::Float(1.0)),
            value(Value::Float(1e-7)),
        );
        assert_eq!(expr.const_value().unwrap(), Value::Null);
    }

    #[test]
    fn test_div_result_is_float() {
        let mut expr = arith(ArithmeticType::Div, value(Value::Int(7)), value(Value::Int(2)));
        assert_eq!(expr.const_value().unwrap(), Value::Float(3.5));
    }

    #[test]
    fn test_comparison_null_is_false() {
        for op in [CompOp::Eq, CompOp::Ne, CompOp::Lt, CompOp::Ge] {
            let mut expr = compare(op, value(Value::Null), value(Value::Int(1)));
            assert_eq!(expr.const_value().unwrap(), Value::Bool(false));
        }
        let mut expr = compare(CompOp::Eq, value(Value::Null), value(Value::Null));
        assert_eq!(expr.const_value().unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_is_null_predicates() {
        let mut expr = compare(CompOp::IsNull, value(Value::Null), value(Value::Null));
        assert_eq!(expr.const_value().unwrap(), Value::Bool(true));

        let mut expr = compare(CompOp::IsNotNull, value(Value::Int(1)), value(Value::Null));
        assert_eq!(expr.const_value().unwrap(), Value::Bool(true));

        let mut expr = compare(CompOp::IsNull, value(Value::Int(1)), value(Value::Null));
        assert_eq!(expr.const_value().unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_like() {
        let cases = [
            ("abc", "a%", true),
            ("abc", "a_c", true),
            ("abc", "a_", false),
        ];
        for (text, pattern, expected) in cases {
            let mut expr = compare(
                CompOp::Like,
                value(Value::Chars(text.into())),
                value(Value::Chars(pattern.into())),
            );
            assert_eq!(expr.const_value().unwrap(), Value::Bool(expected), "{text} LIKE {pattern}");
        }
    }

    #[test]
    fn test_like_requires_chars() {
        let mut expr = compare(
            CompOp::Like,
            value(Value::Int(1)),
            value(Value::Chars("a%".into())),
        );
        assert!(matches!(
            expr.const_value(),
            Err(ExecutorError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_in_list() {
        let list = Expression::List(ListExpr {
            items: vec![value(Value::Int(1)), value(Value::Int(2))],
        });
        let mut expr = compare(CompOp::In, value(Value::Int(2)), list);
        assert_eq!(expr.const_value().unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_not_in_with_null_in_list_is_false() {
        let list = Expression::List(ListExpr {
            items: vec![value(Value::Int(1)), value(Value::Null)],
        });
        let mut expr = compare(CompOp::NotIn, value(Value::Int(5)), list);
        assert_eq!(expr.const_value().unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_in_with_null_left_is_false() {
        let list = Expression::List(ListExpr {
            items: vec![value(Value::Int(1))],
        });
        let mut expr = compare(CompOp::In, value(Value::Null), list);
        assert_eq!(expr.const_value().unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_conjunction_short_circuit() {
        let mut expr = Expression::Conjunction(ConjunctionExpr {
            op: ConjOp::And,
            children: vec![
                compare(CompOp::Eq, value(Value::Int(1)), value(Value::Int(1))),
                compare(CompOp::Eq, value(Value::Int(1)), value(Value::Int(2))),
            ],
        });
        assert_eq!(expr.const_value().unwrap(), Value::Bool(false));

        let mut expr = Expression::Conjunction(ConjunctionExpr {
            op: ConjOp::Or,
            children: vec![
                compare(CompOp::Eq, value(Value::Int(1)), value(Value::Int(1))),
                compare(CompOp::Eq, value(Value::Int(1)), value(Value::Int(2))),
            ],
        });
        assert_eq!(expr.const_value().unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_empty_conjunction_is_true() {
        let mut expr = Expression::Conjunction(ConjunctionExpr {
            op: ConjOp::And,
            children: vec![],
        });
        assert_eq!(expr.const_value().unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_supports_vectorized() {
        let numeric = compare(CompOp::Gt, int_field("t", "id"), value(Value::Int(1)));
        assert!(numeric.supports_vectorized());

        let like = compare(
            CompOp::Like,
            value(Value::Chars("a".into())),
            value(Value::Chars("a".into())),
        );
        assert!(!like.supports_vectorized());
    }

    #[test]
    fn test_row_and_column_agree_on_single_row() {
        // For a side-effect-free expression, row-wise evaluation over a
        // one-row chunk agrees with columnar evaluation.
        let mut field = int_field("t", "id");
        if let Expression::Field(f) = &mut field {
            f.pos = Some(0);
        }
        let mut expr = arith(ArithmeticType::Mul, field, value(Value::Int(3)));

        let tuple = row("t", &[("id", Value::Int(5))]);
        let row_result = expr.get_value(&tuple).unwrap();

        let column = Column::from_values(AttrType::Ints, &[Value::Int(5)]).unwrap();
        let chunk = Chunk::new(vec![Some(column)], 1);
        let col_result = expr.get_column(&chunk).unwrap();

        assert_eq!(row_result, col_result.value_at(0));
    }

    #[test]
    fn test_display() {
        let expr = compare(
            CompOp::Gt,
            arith(ArithmeticType::Add, int_field("t", "id"), value(Value::Int(1))),
            value(Value::Int(10)),
        );
        assert_eq!(expr.to_string(), "id+1 > 10");

        let agg = Expression::Aggregate(AggregateExpr {
            func: AggrFunc::Count,
            child: Box::new(Expression::Star(StarExpr { table: None })),
        });
        assert_eq!(agg.to_string(), "count(*)");
    }

    #[test]
    fn test_aggregate_lookup_from_group_tuple() {
        let agg = AggregateExpr {
            func: AggrFunc::Sum,
            child: Box::new(int_field("t", "id")),
        };
        let specs = Arc::new(vec![TupleCellSpec::aliased("sum(id)")]);
        let tuple = Tuple::new(specs, vec![Value::Int(42)]);
        assert_eq!(agg.get_value(&tuple).unwrap(), Value::Int(42));
    }
}
