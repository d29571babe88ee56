//! The user-visible error frame.
//!
//! A statement produces at most one error: a syntax error with source
//! position (and the date flag), or an execution error with its kind's
//! message.

use std::fmt;

use crate::exec::ExecutorError;
use crate::sql::ParseError;

/// Statement-level error returned by the session.
#[derive(Debug)]
pub enum DbError {
    /// Syntax error with its 1-based source position.
    Parse {
        /// The parse error, including the date flag.
        error: ParseError,
        /// Source line.
        line: usize,
        /// Source column.
        column: usize,
    },
    /// Resolution, planning, or execution error.
    Exec(ExecutorError),
}

impl DbError {
    /// Wraps a parse error, deriving its line and column from the input.
    pub fn parse(input: &str, error: ParseError) -> Self {
        let (line, column) = error.line_column(input);
        DbError::Parse {
            error,
            line,
            column,
        }
    }

    /// True when this is a date-literal syntax error.
    pub fn is_date_error(&self) -> bool {
        matches!(self, DbError::Parse { error, .. } if error.is_date)
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Parse {
                error,
                line,
                column,
            } => {
                let kind = if error.is_date {
                    "date syntax error"
                } else {
                    "syntax error"
                };
                write!(
                    f,
                    "{} at line {} column {}: {}",
                    kind, line, column, error.message
                )
            }
            DbError::Exec(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for DbError {}

impl From<ExecutorError> for DbError {
    fn from(error: ExecutorError) -> Self {
        DbError::Exec(error)
    }
}
