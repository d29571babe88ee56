//! Columnar chunks for vectorized evaluation.
//!
//! A [`Chunk`] is a horizontal slice of rows held column-wise. Each
//! [`Column`] is either `Normal` (one cell per row) or `Constant` (one
//! cell broadcast to the chunk's logical length). Only INT and FLOAT
//! columns exist in vector mode; everything else declines and the plan
//! falls back to the row path. NULLs ride in a per-row flag vector — the
//! column's NULL sentinel.

use crate::types::{AttrType, Value};

/// Whether a column stores one cell per row or one broadcast cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// One cell per row.
    Normal,
    /// One cell broadcast to the chunk's logical length.
    Constant,
}

/// Typed column payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// 32-bit integers (INT and DATE cells).
    Ints(Vec<i32>),
    /// 32-bit floats.
    Floats(Vec<f32>),
}

/// A column of a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Normal or constant.
    pub kind: ColumnKind,
    /// Cell payload; length 1 for constants.
    pub data: ColumnData,
    /// NULL flags, parallel to `data`.
    pub nulls: Vec<bool>,
    /// Logical row count of the chunk this column belongs to.
    count: usize,
}

impl Column {
    /// Builds a normal column from row values.
    ///
    /// Returns `None` when the values are not all INT (or all FLOAT):
    /// such a column cannot take the vector path.
    pub fn from_values(attr_type: AttrType, values: &[Value]) -> Option<Self> {
        match attr_type {
            AttrType::Ints => {
                let mut data = Vec::with_capacity(values.len());
                let mut nulls = Vec::with_capacity(values.len());
                for v in values {
                    match v {
                        Value::Int(n) => {
                            data.push(*n);
                            nulls.push(false);
                        }
                        Value::Null => {
                            data.push(0);
                            nulls.push(true);
                        }
                        _ => return None,
                    }
                }
                Some(Self {
                    kind: ColumnKind::Normal,
                    count: data.len(),
                    data: ColumnData::Ints(data),
                    nulls,
                })
            }
            AttrType::Floats => {
                let mut data = Vec::with_capacity(values.len());
                let mut nulls = Vec::with_capacity(values.len());
                for v in values {
                    match v {
                        Value::Float(f) => {
                            data.push(*f);
                            nulls.push(false);
                        }
                        Value::Null => {
                            data.push(0.0);
                            nulls.push(true);
                        }
                        _ => return None,
                    }
                }
                Some(Self {
                    kind: ColumnKind::Normal,
                    count: data.len(),
                    data: ColumnData::Floats(data),
                    nulls,
                })
            }
            _ => None,
        }
    }

    /// Builds a constant column broadcasting one value to `count` rows.
    pub fn constant(value: &Value, count: usize) -> Option<Self> {
        let (data, null) = match value {
            Value::Int(n) => (ColumnData::Ints(vec![*n]), false),
            Value::Float(f) => (ColumnData::Floats(vec![*f]), false),
            _ => return None,
        };
        Some(Self {
            kind: ColumnKind::Constant,
            data,
            nulls: vec![null],
            count,
        })
    }

    /// Creates an uninitialized-result column of the given type and size.
    pub fn zeroed(attr_type: AttrType, kind: ColumnKind, count: usize) -> Self {
        let width = if kind == ColumnKind::Constant { 1 } else { count };
        let data = match attr_type {
            AttrType::Floats => ColumnData::Floats(vec![0.0; width]),
            _ => ColumnData::Ints(vec![0; width]),
        };
        Self {
            kind,
            data,
            nulls: vec![false; width],
            count,
        }
    }

    /// The attribute type of the payload.
    pub fn attr_type(&self) -> AttrType {
        match self.data {
            ColumnData::Ints(_) => AttrType::Ints,
            ColumnData::Floats(_) => AttrType::Floats,
        }
    }

    /// Logical row count.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True if the chunk is empty.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Physical index for a logical row: constants always read cell 0.
    fn physical(&self, row: usize) -> usize {
        match self.kind {
            ColumnKind::Constant => 0,
            ColumnKind::Normal => row,
        }
    }

    /// True if the cell at the logical row is NULL.
    pub fn is_null(&self, row: usize) -> bool {
        self.nulls[self.physical(row)]
    }

    /// Reads a cell back as a [`Value`].
    pub fn value_at(&self, row: usize) -> Value {
        let i = self.physical(row);
        if self.nulls[i] {
            return Value::Null;
        }
        match &self.data {
            ColumnData::Ints(data) => Value::Int(data[i]),
            ColumnData::Floats(data) => Value::Float(data[i]),
        }
    }

    /// Converts an INT column to FLOAT, for promotion before a typed
    /// float kernel. FLOAT columns pass through unchanged.
    pub fn cast_to_float(&self) -> Self {
        match &self.data {
            ColumnData::Floats(_) => self.clone(),
            ColumnData::Ints(data) => Self {
                kind: self.kind,
                data: ColumnData::Floats(data.iter().map(|&n| n as f32).collect()),
                nulls: self.nulls.clone(),
                count: self.count,
            },
        }
    }
}

/// A horizontal slice of rows held column-wise.
///
/// Columns are indexed by user-field position; fields whose type has no
/// vector representation hold `None`.
#[derive(Debug, Default)]
pub struct Chunk {
    columns: Vec<Option<Column>>,
    rows: usize,
}

impl Chunk {
    /// Creates a chunk from per-field columns and the row count.
    pub fn new(columns: Vec<Option<Column>>, rows: usize) -> Self {
        Self { columns, rows }
    }

    /// Number of rows in this chunk.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the column at a user-field position, if it vectorized.
    pub fn column(&self, pos: usize) -> Option<&Column> {
        self.columns.get(pos).and_then(|c| c.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_ints_with_nulls() {
        let col = Column::from_values(
            AttrType::Ints,
            &[Value::Int(1), Value::Null, Value::Int(3)],
        )
        .unwrap();
        assert_eq!(col.len(), 3);
        assert_eq!(col.value_at(0), Value::Int(1));
        assert_eq!(col.value_at(1), Value::Null);
        assert!(col.is_null(1));
        assert_eq!(col.value_at(2), Value::Int(3));
    }

    #[test]
    fn test_from_values_rejects_mixed() {
        assert!(Column::from_values(AttrType::Ints, &[Value::Chars("x".into())]).is_none());
        assert!(Column::from_values(AttrType::Chars, &[Value::Chars("x".into())]).is_none());
    }

    #[test]
    fn test_constant_broadcast() {
        let col = Column::constant(&Value::Int(7), 5).unwrap();
        assert_eq!(col.len(), 5);
        for row in 0..5 {
            assert_eq!(col.value_at(row), Value::Int(7));
        }
    }

    #[test]
    fn test_constant_rejects_non_numeric() {
        assert!(Column::constant(&Value::Chars("x".into()), 3).is_none());
        assert!(Column::constant(&Value::Null, 3).is_none());
    }

    #[test]
    fn test_cast_to_float() {
        let col = Column::from_values(AttrType::Ints, &[Value::Int(2), Value::Null]).unwrap();
        let cast = col.cast_to_float();
        assert_eq!(cast.attr_type(), AttrType::Floats);
        assert_eq!(cast.value_at(0), Value::Float(2.0));
        assert_eq!(cast.value_at(1), Value::Null);
    }

    #[test]
    fn test_chunk_column_lookup() {
        let col = Column::from_values(AttrType::Ints, &[Value::Int(1)]).unwrap();
        let chunk = Chunk::new(vec![Some(col), None], 1);
        assert!(chunk.column(0).is_some());
        assert!(chunk.column(1).is_none());
        assert!(chunk.column(9).is_none());
        assert_eq!(chunk.rows(), 1);
    }
}
