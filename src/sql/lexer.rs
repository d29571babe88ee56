//! SQL lexer/tokenizer.
//!
//! The [`Lexer`] converts a SQL string into a stream of [`Token`]s:
//! keywords (case-insensitive), identifiers, numeric literals,
//! single-quoted strings with `''` escapes, operators, punctuation, and
//! `--` line comments.

use super::error::{ParseError, Span};
use super::token::{Keyword, Token, TokenKind};

/// SQL lexer that tokenizes input strings.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    /// Accumulated errors during tokenization.
    errors: Vec<ParseError>,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Takes all errors, leaving an empty error list.
    pub fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }

    /// Tokenizes the entire input.
    ///
    /// The returned vector always ends with an EOF token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.pos;

        let Some(ch) = self.current_char() else {
            return Token::new(TokenKind::Eof, Span::at(start));
        };

        if ch == '\'' {
            return self.scan_string_literal();
        }

        if ch.is_ascii_digit() {
            return self.scan_number();
        }

        if is_ident_start(ch) {
            return self.scan_identifier_or_keyword();
        }

        self.scan_operator_or_punctuation()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some(ch) = self.current_char() {
                if ch.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }
            if self.input[self.pos..].starts_with("--") {
                while let Some(ch) = self.current_char() {
                    self.advance();
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn scan_string_literal(&mut self) -> Token {
        let start = self.pos;
        self.advance(); // opening quote

        let mut value = String::new();
        loop {
            match self.current_char() {
                None => {
                    self.errors
                        .push(ParseError::unterminated_string(Span::new(start, self.pos)));
                    break;
                }
                Some('\'') => {
                    self.advance();
                    // '' is an escaped quote
                    if self.current_char() == Some('\'') {
                        value.push('\'');
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }

        Token::new(TokenKind::String(value), Span::new(start, self.pos))
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_float = false;
        if self.current_char() == Some('.') && self.peek_char().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let span = Span::new(start, self.pos);
        let text = &self.input[start..self.pos];
        if is_float {
            match text.parse::<f32>() {
                Ok(f) => Token::new(TokenKind::Float(f), span),
                Err(_) => {
                    self.errors.push(ParseError::invalid_number(span));
                    Token::new(TokenKind::Float(0.0), span)
                }
            }
        } else {
            match text.parse::<i32>() {
                Ok(n) => Token::new(TokenKind::Integer(n), span),
                Err(_) => {
                    self.errors.push(ParseError::invalid_number(span));
                    Token::new(TokenKind::Integer(0), span)
                }
            }
        }
    }

    fn scan_identifier_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while self.current_char().is_some_and(is_ident_continue) {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        let span = Span::new(start, self.pos);
        match Keyword::parse(text) {
            Some(kw) => Token::new(TokenKind::Keyword(kw), span),
            None => Token::new(TokenKind::Identifier(text.to_string()), span),
        }
    }

    fn scan_operator_or_punctuation(&mut self) -> Token {
        let start = self.pos;
        let ch = self.current_char().expect("caller checked non-eof");
        self.advance();

        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Asterisk,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '=' => TokenKind::Eq,
            '<' => match self.current_char() {
                Some('=') => {
                    self.advance();
                    TokenKind::LtEq
                }
                Some('>') => {
                    self.advance();
                    TokenKind::Neq
                }
                _ => TokenKind::Lt,
            },
            '>' => {
                if self.current_char() == Some('=') {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '!' => {
                if self.current_char() == Some('=') {
                    self.advance();
                    TokenKind::Neq
                } else {
                    self.errors.push(ParseError::syntax_error(
                        "unexpected character '!'",
                        Span::new(start, self.pos),
                    ));
                    TokenKind::Neq
                }
            }
            other => {
                self.errors.push(ParseError::syntax_error(
                    format!("unexpected character '{}'", other),
                    Span::new(start, self.pos),
                ));
                TokenKind::Eof
            }
        };

        Token::new(kind, Span::new(start, self.pos))
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("select id from t"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Identifier("id".into()),
                TokenKind::Keyword(Keyword::From),
                TokenKind::Identifier("t".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.5"),
            vec![TokenKind::Integer(42), TokenKind::Float(3.5), TokenKind::Eof]
        );
    }

    #[test]
    fn test_string_with_escape() {
        assert_eq!(
            kinds("'it''s'"),
            vec![TokenKind::String("it's".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("'oops");
        lexer.tokenize();
        assert_eq!(lexer.take_errors().len(), 1);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("= <> != < <= > >="),
            vec![
                TokenKind::Eq,
                TokenKind::Neq,
                TokenKind::Neq,
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_line_comment() {
        assert_eq!(
            kinds("select -- comment\n1"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Integer(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = Lexer::new("select id").tokenize();
        assert_eq!(tokens[0].span, Span::new(0, 6));
        assert_eq!(tokens[1].span, Span::new(7, 9));
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("(a, b);"),
            vec![
                TokenKind::LParen,
                TokenKind::Identifier("a".into()),
                TokenKind::Comma,
                TokenKind::Identifier("b".into()),
                TokenKind::RParen,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }
}
