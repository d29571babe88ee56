//! Typed vector kernels.
//!
//! Arithmetic and comparison loops over INT and FLOAT columns, with the
//! four const/column broadcast shapes handled by index selection. Division
//! by zero (integer 0, or a float divisor inside ±1e-6) writes the NULL
//! sentinel instead of a value. Comparison writes a 0/1 byte per row into
//! a selection vector; a NULL on either side compares false.

use crate::exec::error::ExecutorError;
use crate::sql::ast::{ArithOp, CompOp};

use super::chunk::{Column, ColumnData, ColumnKind};

/// Scalar type a kernel can loop over.
trait Scalar: Copy {
    /// Applies an arithmetic operator; `None` is the division-by-zero
    /// NULL sentinel.
    fn apply(op: ArithOp, a: Self, b: Self) -> Option<Self>;

    /// Numeric negation.
    fn negate(a: Self) -> Self;

    /// Applies one of the six ordered comparisons.
    fn compare(op: CompOp, a: Self, b: Self) -> bool;
}

impl Scalar for i32 {
    fn apply(op: ArithOp, a: Self, b: Self) -> Option<Self> {
        match op {
            ArithOp::Add => Some(a.wrapping_add(b)),
            ArithOp::Sub => Some(a.wrapping_sub(b)),
            ArithOp::Mul => Some(a.wrapping_mul(b)),
            ArithOp::Div => {
                if b == 0 {
                    None
                } else {
                    Some(a.wrapping_div(b))
                }
            }
        }
    }

    fn negate(a: Self) -> Self {
        a.wrapping_neg()
    }

    fn compare(op: CompOp, a: Self, b: Self) -> bool {
        match op {
            CompOp::Eq => a == b,
            CompOp::Ne => a != b,
            CompOp::Lt => a < b,
            CompOp::Le => a <= b,
            CompOp::Gt => a > b,
            CompOp::Ge => a >= b,
            _ => false,
        }
    }
}

impl Scalar for f32 {
    fn apply(op: ArithOp, a: Self, b: Self) -> Option<Self> {
        match op {
            ArithOp::Add => Some(a + b),
            ArithOp::Sub => Some(a - b),
            ArithOp::Mul => Some(a * b),
            ArithOp::Div => {
                if b.abs() < 1e-6 {
                    None
                } else {
                    Some(a / b)
                }
            }
        }
    }

    fn negate(a: Self) -> Self {
        -a
    }

    fn compare(op: CompOp, a: Self, b: Self) -> bool {
        match op {
            CompOp::Eq => a == b,
            CompOp::Ne => a != b,
            CompOp::Lt => a < b,
            CompOp::Le => a <= b,
            CompOp::Gt => a > b,
            CompOp::Ge => a >= b,
            _ => false,
        }
    }
}

/// The binary arithmetic loop, shared by all shape combinations: the
/// physical index closures collapse constants to cell 0.
#[allow(clippy::too_many_arguments)]
fn binary_loop<T: Scalar>(
    op: ArithOp,
    left: &[T],
    left_nulls: &[bool],
    left_const: bool,
    right: &[T],
    right_nulls: &[bool],
    right_const: bool,
    width: usize,
) -> (Vec<T>, Vec<bool>)
where
    T: Default,
{
    let mut out = vec![T::default(); width];
    let mut nulls = vec![false; width];
    for i in 0..width {
        let li = if left_const { 0 } else { i };
        let ri = if right_const { 0 } else { i };
        if left_nulls[li] || right_nulls[ri] {
            nulls[i] = true;
            continue;
        }
        match T::apply(op, left[li], right[ri]) {
            Some(v) => out[i] = v,
            None => nulls[i] = true,
        }
    }
    (out, nulls)
}

/// Evaluates binary arithmetic over two columns of the same scalar type.
///
/// Callers promote INT columns to FLOAT beforehand when the expression's
/// result type requires it; a type mismatch here declines vectorization.
pub(crate) fn arith_columns(
    op: ArithOp,
    left: &Column,
    right: &Column,
) -> Result<Column, ExecutorError> {
    let count = left.len().max(right.len());
    let left_const = left.kind == ColumnKind::Constant;
    let right_const = right.kind == ColumnKind::Constant;
    let kind = if left_const && right_const {
        ColumnKind::Constant
    } else {
        ColumnKind::Normal
    };
    let width = if kind == ColumnKind::Constant { 1 } else { count };

    let (data, nulls) = match (&left.data, &right.data) {
        (ColumnData::Ints(l), ColumnData::Ints(r)) => {
            let (out, nulls) =
                binary_loop(op, l, &left.nulls, left_const, r, &right.nulls, right_const, width);
            (ColumnData::Ints(out), nulls)
        }
        (ColumnData::Floats(l), ColumnData::Floats(r)) => {
            let (out, nulls) =
                binary_loop(op, l, &left.nulls, left_const, r, &right.nulls, right_const, width);
            (ColumnData::Floats(out), nulls)
        }
        _ => return Err(ExecutorError::Unimplemented("mixed-type vector arithmetic")),
    };

    let mut result = Column::zeroed(left.attr_type(), kind, count);
    result.data = data;
    result.nulls = nulls;
    Ok(result)
}

/// Evaluates numeric negation over a column.
pub(crate) fn negate_column(child: &Column) -> Column {
    let mut result = child.clone();
    match &mut result.data {
        ColumnData::Ints(data) => {
            for v in data.iter_mut() {
                *v = Scalar::negate(*v);
            }
        }
        ColumnData::Floats(data) => {
            for v in data.iter_mut() {
                *v = Scalar::negate(*v);
            }
        }
    }
    result
}

fn compare_loop<T: Scalar>(
    op: CompOp,
    left: &[T],
    left_nulls: &[bool],
    left_const: bool,
    right: &[T],
    right_nulls: &[bool],
    right_const: bool,
    select: &mut [u8],
) {
    for (i, out) in select.iter_mut().enumerate() {
        let li = if left_const { 0 } else { i };
        let ri = if right_const { 0 } else { i };
        // NULL compares false under every ordered operator.
        *out = if left_nulls[li] || right_nulls[ri] {
            0
        } else {
            T::compare(op, left[li], right[ri]) as u8
        };
    }
}

/// Evaluates one of the six ordered comparisons over two columns,
/// writing a 0/1 byte per row. String comparison has no vector form;
/// the planner keeps string predicates on the row path.
pub(crate) fn compare_columns(
    op: CompOp,
    left: &Column,
    right: &Column,
    select: &mut [u8],
) -> Result<(), ExecutorError> {
    let left_const = left.kind == ColumnKind::Constant;
    let right_const = right.kind == ColumnKind::Constant;
    match (&left.data, &right.data) {
        (ColumnData::Ints(l), ColumnData::Ints(r)) => {
            compare_loop(op, l, &left.nulls, left_const, r, &right.nulls, right_const, select);
        }
        (ColumnData::Floats(l), ColumnData::Floats(r)) => {
            compare_loop(op, l, &left.nulls, left_const, r, &right.nulls, right_const, select);
        }
        _ => return Err(ExecutorError::Unimplemented("mixed-type vector comparison")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttrType, Value};

    fn ints(values: &[Value]) -> Column {
        Column::from_values(AttrType::Ints, values).unwrap()
    }

    fn floats(values: &[Value]) -> Column {
        Column::from_values(AttrType::Floats, values).unwrap()
    }

    #[test]
    fn test_add_column_column() {
        let left = ints(&[Value::Int(1), Value::Int(2), Value::Int(3)]);
        let right = ints(&[Value::Int(10), Value::Int(20), Value::Int(30)]);
        let result = arith_columns(ArithOp::Add, &left, &right).unwrap();
        assert_eq!(result.value_at(0), Value::Int(11));
        assert_eq!(result.value_at(1), Value::Int(22));
        assert_eq!(result.value_at(2), Value::Int(33));
    }

    #[test]
    fn test_add_column_constant() {
        let left = ints(&[Value::Int(1), Value::Int(2)]);
        let right = Column::constant(&Value::Int(100), 2).unwrap();
        let result = arith_columns(ArithOp::Add, &left, &right).unwrap();
        assert_eq!(result.value_at(0), Value::Int(101));
        assert_eq!(result.value_at(1), Value::Int(102));
    }

    #[test]
    fn test_constant_constant_stays_constant() {
        let left = Column::constant(&Value::Int(6), 4).unwrap();
        let right = Column::constant(&Value::Int(7), 4).unwrap();
        let result = arith_columns(ArithOp::Mul, &left, &right).unwrap();
        assert_eq!(result.kind, ColumnKind::Constant);
        assert_eq!(result.len(), 4);
        for row in 0..4 {
            assert_eq!(result.value_at(row), Value::Int(42));
        }
    }

    #[test]
    fn test_div_by_zero_writes_null() {
        let left = ints(&[Value::Int(10), Value::Int(20)]);
        let right = ints(&[Value::Int(2), Value::Int(0)]);
        let result = arith_columns(ArithOp::Div, &left, &right).unwrap();
        assert_eq!(result.value_at(0), Value::Int(5));
        assert_eq!(result.value_at(1), Value::Null);
    }

    #[test]
    fn test_float_div_near_zero_writes_null() {
        let left = floats(&[Value::Float(1.0)]);
        let right = floats(&[Value::Float(1e-7)]);
        let result = arith_columns(ArithOp::Div, &left, &right).unwrap();
        assert_eq!(result.value_at(0), Value::Null);
    }

    #[test]
    fn test_null_propagates_through_arith() {
        let left = ints(&[Value::Int(1), Value::Null]);
        let right = ints(&[Value::Int(2), Value::Int(2)]);
        let result = arith_columns(ArithOp::Add, &left, &right).unwrap();
        assert_eq!(result.value_at(0), Value::Int(3));
        assert_eq!(result.value_at(1), Value::Null);
    }

    #[test]
    fn test_negate() {
        let col = ints(&[Value::Int(5), Value::Null]);
        let result = negate_column(&col);
        assert_eq!(result.value_at(0), Value::Int(-5));
        assert_eq!(result.value_at(1), Value::Null);
    }

    #[test]
    fn test_compare_selection_vector() {
        let left = ints(&[Value::Int(1), Value::Int(5), Value::Null]);
        let right = Column::constant(&Value::Int(3), 3).unwrap();
        let mut select = vec![0u8; 3];
        compare_columns(CompOp::Gt, &left, &right, &mut select).unwrap();
        assert_eq!(select, vec![0, 1, 0]);
    }

    #[test]
    fn test_compare_floats() {
        let left = floats(&[Value::Float(1.5), Value::Float(3.5)]);
        let right = floats(&[Value::Float(2.0), Value::Float(2.0)]);
        let mut select = vec![0u8; 2];
        compare_columns(CompOp::Le, &left, &right, &mut select).unwrap();
        assert_eq!(select, vec![1, 0]);
    }

    #[test]
    fn test_mixed_types_decline() {
        let left = ints(&[Value::Int(1)]);
        let right = floats(&[Value::Float(1.0)]);
        assert!(matches!(
            arith_columns(ArithOp::Add, &left, &right),
            Err(ExecutorError::Unimplemented(_))
        ));
        let mut select = vec![0u8; 1];
        assert!(matches!(
            compare_columns(CompOp::Eq, &left, &right, &mut select),
            Err(ExecutorError::Unimplemented(_))
        ));
    }
}
