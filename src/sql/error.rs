//! SQL parse errors.
//!
//! [`ParseError`] carries the byte span of the offending token plus an
//! `is_date` flag: a literal that looks like a date but names an impossible
//! calendar day is a syntax error with its own user-visible message.

use std::fmt;

/// A span in the source SQL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Byte offset from the start of the input.
    pub start: usize,
    /// Byte offset of the end of the span (exclusive).
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Creates a zero-length span at the given position.
    pub fn at(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }
}

/// SQL syntax error with source position information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Error message.
    pub message: String,
    /// Position in the source where the error occurred.
    pub span: Span,
    /// True when a date-shaped literal failed calendar validation.
    pub is_date: bool,
}

impl ParseError {
    /// Creates a new syntax error at the given position.
    pub fn syntax_error(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            is_date: false,
        }
    }

    /// Creates a new error for an unexpected token.
    pub fn unexpected_token(expected: &str, found: &str, span: Span) -> Self {
        Self::syntax_error(format!("expected {expected}, found {found}"), span)
    }

    /// Creates a new error for an unexpected end of input.
    pub fn unexpected_eof(expected: &str, pos: usize) -> Self {
        Self::syntax_error(
            format!("unexpected end of input, expected {expected}"),
            Span::at(pos),
        )
    }

    /// Creates a new error for an invalid number literal.
    pub fn invalid_number(span: Span) -> Self {
        Self::syntax_error("invalid number literal", span)
    }

    /// Creates a new error for an unterminated string literal.
    pub fn unterminated_string(span: Span) -> Self {
        Self::syntax_error("unterminated string literal", span)
    }

    /// Creates a new error for a date-shaped literal that is not a valid
    /// calendar date.
    pub fn invalid_date(literal: &str, span: Span) -> Self {
        Self {
            message: format!("invalid date '{literal}'"),
            span,
            is_date: true,
        }
    }

    /// Returns the 1-based (line, column) of the error in the given source.
    pub fn line_column(&self, input: &str) -> (usize, usize) {
        let upto = &input[..self.span.start.min(input.len())];
        let line = upto.bytes().filter(|&b| b == b'\n').count() + 1;
        let column = upto
            .rfind('\n')
            .map(|nl| upto[nl + 1..].chars().count() + 1)
            .unwrap_or_else(|| upto.chars().count() + 1);
        (line, column)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.span.start + 1)
    }
}

impl std::error::Error for ParseError {}
