//! Execution-time row abstraction.
//!
//! A [`Tuple`] is an ordered set of values plus the [`TupleCellSpec`]s that
//! name them. Scans produce row tuples with a record id; projections,
//! joins, and group-by produce derived tuples with fresh specs. A tuple may
//! chain to a parent tuple: correlated subqueries install the outer row as
//! the parent, and cell lookup falls back outward when the local specs
//! don't match.

use std::sync::Arc;

use crate::record::Rid;
use crate::types::Value;

/// Names one cell of a tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleCellSpec {
    /// Table label (the alias in scope, or the table name).
    pub table: Option<String>,
    /// Field name.
    pub field: String,
    /// Display/alias name; derived output cells are found by this.
    pub alias: String,
}

impl TupleCellSpec {
    /// Creates a spec for a table field.
    pub fn new(table: Option<&str>, field: &str) -> Self {
        Self {
            table: table.map(str::to_string),
            field: field.to_string(),
            alias: field.to_string(),
        }
    }

    /// Creates a spec for a derived cell found by alias only.
    pub fn aliased(alias: &str) -> Self {
        Self {
            table: None,
            field: String::new(),
            alias: alias.to_string(),
        }
    }
}

/// An execution-time row.
#[derive(Debug, Clone, Default)]
pub struct Tuple {
    specs: Arc<Vec<TupleCellSpec>>,
    values: Vec<Value>,
    rid: Option<Rid>,
    parent: Option<Box<Tuple>>,
}

impl Tuple {
    /// Creates a tuple from specs and values.
    pub fn new(specs: Arc<Vec<TupleCellSpec>>, values: Vec<Value>) -> Self {
        debug_assert_eq!(specs.len(), values.len());
        Self {
            specs,
            values,
            rid: None,
            parent: None,
        }
    }

    /// Creates a row tuple carrying its record id.
    pub fn with_rid(specs: Arc<Vec<TupleCellSpec>>, values: Vec<Value>, rid: Rid) -> Self {
        let mut tuple = Self::new(specs, values);
        tuple.rid = Some(rid);
        tuple
    }

    /// Creates a joined tuple by concatenating two rows under the combined
    /// specs the join precomputed.
    pub fn joined(specs: Arc<Vec<TupleCellSpec>>, left: &Tuple, right: &Tuple) -> Self {
        let mut values = Vec::with_capacity(left.values.len() + right.values.len());
        values.extend_from_slice(&left.values);
        values.extend_from_slice(&right.values);
        let mut tuple = Self::new(specs, values);
        // Either side may carry a correlation parent; keep the left's.
        tuple.parent = left.parent.clone().or_else(|| right.parent.clone());
        tuple
    }

    /// The cell specs.
    pub fn specs(&self) -> &Arc<Vec<TupleCellSpec>> {
        &self.specs
    }

    /// The cell values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.values.len()
    }

    /// The record id, for tuples that came straight from a scan.
    pub fn rid(&self) -> Option<Rid> {
        self.rid
    }

    /// Returns the cell at the given index.
    pub fn cell_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Finds a cell by table label and field name.
    ///
    /// Unqualified lookup also matches derived-cell aliases. If nothing
    /// matches locally the lookup continues in the parent tuple, which is
    /// how correlated subqueries see the outer row.
    pub fn find_cell(&self, table: Option<&str>, field: &str) -> Option<&Value> {
        let found = self.specs.iter().position(|spec| match table {
            Some(t) => spec.table.as_deref() == Some(t) && spec.field == field,
            None => spec.field == field || spec.alias == field,
        });
        if let Some(i) = found {
            return Some(&self.values[i]);
        }
        self.parent.as_ref()?.find_cell(table, field)
    }

    /// Installs the correlation parent for this row.
    pub fn set_parent(&mut self, parent: Option<Tuple>) {
        self.parent = parent.map(Box::new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(items: &[(&str, &str)]) -> Arc<Vec<TupleCellSpec>> {
        Arc::new(
            items
                .iter()
                .map(|(t, f)| TupleCellSpec::new(Some(t), f))
                .collect(),
        )
    }

    #[test]
    fn test_cell_at() {
        let tuple = Tuple::new(
            specs(&[("t", "id"), ("t", "name")]),
            vec![Value::Int(1), Value::Chars("a".into())],
        );
        assert_eq!(tuple.cell_at(0), Some(&Value::Int(1)));
        assert_eq!(tuple.cell_at(2), None);
    }

    #[test]
    fn test_find_cell_qualified_and_bare() {
        let tuple = Tuple::new(
            specs(&[("t", "id"), ("u", "id")]),
            vec![Value::Int(1), Value::Int(2)],
        );
        assert_eq!(tuple.find_cell(Some("t"), "id"), Some(&Value::Int(1)));
        assert_eq!(tuple.find_cell(Some("u"), "id"), Some(&Value::Int(2)));
        // Bare lookup takes the first match.
        assert_eq!(tuple.find_cell(None, "id"), Some(&Value::Int(1)));
        assert_eq!(tuple.find_cell(Some("v"), "id"), None);
    }

    #[test]
    fn test_find_cell_by_alias() {
        let specs = Arc::new(vec![TupleCellSpec::aliased("count(*)")]);
        let tuple = Tuple::new(specs, vec![Value::Int(3)]);
        assert_eq!(tuple.find_cell(None, "count(*)"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_parent_fallback() {
        let mut inner = Tuple::new(specs(&[("u", "id")]), vec![Value::Int(10)]);
        let outer = Tuple::new(specs(&[("t", "id")]), vec![Value::Int(1)]);
        inner.set_parent(Some(outer));

        assert_eq!(inner.find_cell(Some("u"), "id"), Some(&Value::Int(10)));
        assert_eq!(inner.find_cell(Some("t"), "id"), Some(&Value::Int(1)));
        assert_eq!(inner.find_cell(Some("x"), "id"), None);
    }

    #[test]
    fn test_joined_concatenates() {
        let left = Tuple::new(specs(&[("t", "id")]), vec![Value::Int(1)]);
        let right = Tuple::new(specs(&[("u", "id")]), vec![Value::Int(2)]);
        let combined = specs(&[("t", "id"), ("u", "id")]);
        let joined = Tuple::joined(combined, &left, &right);
        assert_eq!(joined.values(), &[Value::Int(1), Value::Int(2)]);
        assert_eq!(joined.find_cell(Some("u"), "id"), Some(&Value::Int(2)));
    }
}
