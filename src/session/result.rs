//! Statement result framing.

use crate::types::Value;

/// What a successfully executed statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlResult {
    /// A result set: column names plus value rows.
    Rows {
        /// Output column names.
        columns: Vec<String>,
        /// One value vector per row.
        rows: Vec<Vec<Value>>,
    },
    /// A row count from DML or LOAD DATA.
    Affected(usize),
    /// EXPLAIN text.
    Explain(String),
    /// A plain acknowledgment or informational message.
    Message(String),
    /// The client asked to leave.
    Exit,
}

impl SqlResult {
    /// Convenience accessor for tests and shells: the rows of a result
    /// set, or `None` for other result kinds.
    pub fn rows(&self) -> Option<&[Vec<Value>]> {
        match self {
            SqlResult::Rows { rows, .. } => Some(rows),
            _ => None,
        }
    }
}
