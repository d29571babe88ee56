//! SQL parser using recursive descent.
//!
//! The [`Parser`] converts a token stream into the AST in
//! [`ast`](super::ast). Statements are parsed by dedicated methods;
//! expressions live in `expr.rs`.

use super::ast::*;
use super::error::{ParseError, Span};
use super::lexer::Lexer;
use super::token::{Keyword, Token, TokenKind};

/// SQL parser that converts tokens into an AST.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Creates a new parser for the given SQL input.
    ///
    /// # Errors
    ///
    /// Returns the first tokenization error, if any.
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize();
        if let Some(err) = lexer.take_errors().into_iter().next() {
            return Err(err);
        }
        Ok(Self { tokens, pos: 0 })
    }

    /// Parses the input as a single statement.
    ///
    /// Returns `Ok(None)` for empty input (whitespace/comments only).
    pub fn parse(&mut self) -> Result<Option<Statement>, ParseError> {
        if self.is_eof() {
            return Ok(None);
        }

        let stmt = self.parse_statement()?;

        self.consume_token(&TokenKind::Semicolon);
        if !self.is_eof() {
            return Err(ParseError::unexpected_token(
                "end of input",
                &self.current_token_name(),
                self.current_span(),
            ));
        }

        Ok(Some(stmt))
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        if self.consume_keyword(Keyword::Explain) {
            let inner = self.parse_statement()?;
            return Ok(Statement::Explain(Box::new(inner)));
        }

        if self.consume_keyword(Keyword::Trx) {
            if self.consume_keyword(Keyword::Begin) {
                return Ok(Statement::TrxBegin);
            }
            if self.consume_keyword(Keyword::Commit) {
                return Ok(Statement::TrxCommit);
            }
            if self.consume_keyword(Keyword::Rollback) {
                return Ok(Statement::TrxRollback);
            }
            return Err(ParseError::unexpected_token(
                "BEGIN, COMMIT or ROLLBACK",
                &self.current_token_name(),
                self.current_span(),
            ));
        }

        if self.consume_keyword(Keyword::Create) {
            if self.consume_keyword(Keyword::Table) {
                return self.parse_create_table();
            }
            let unique = self.consume_keyword(Keyword::Unique);
            if self.consume_keyword(Keyword::Index) {
                return self.parse_create_index(unique);
            }
            return Err(ParseError::unexpected_token(
                "TABLE or INDEX",
                &self.current_token_name(),
                self.current_span(),
            ));
        }

        if self.consume_keyword(Keyword::Drop) {
            if self.consume_keyword(Keyword::Table) {
                let name = self.expect_identifier()?;
                return Ok(Statement::DropTable(DropTableNode { name }));
            }
            if self.consume_keyword(Keyword::Index) {
                let name = self.expect_identifier()?;
                return Ok(Statement::DropIndex(DropIndexNode { name }));
            }
            return Err(ParseError::unexpected_token(
                "TABLE or INDEX",
                &self.current_token_name(),
                self.current_span(),
            ));
        }

        if self.consume_keyword(Keyword::Show) {
            self.expect_keyword(Keyword::Tables)?;
            return Ok(Statement::ShowTables);
        }

        if self.consume_keyword(Keyword::Desc) {
            let name = self.expect_identifier()?;
            return Ok(Statement::DescTable(name));
        }

        if self.consume_keyword(Keyword::Load) {
            self.expect_keyword(Keyword::Data)?;
            self.expect_keyword(Keyword::Infile)?;
            let file = self.expect_string()?;
            self.expect_keyword(Keyword::Into)?;
            self.expect_keyword(Keyword::Table)?;
            let table = self.expect_identifier()?;
            return Ok(Statement::LoadData(LoadDataNode { file, table }));
        }

        if self.consume_keyword(Keyword::Set) {
            let name = self.expect_identifier()?;
            self.expect_token(&TokenKind::Eq)?;
            let value = self.parse_expr()?;
            return Ok(Statement::Set(SetNode { name, value }));
        }

        if self.consume_keyword(Keyword::Calc) {
            let exprs = self.parse_expr_list()?;
            return Ok(Statement::Calc(CalcNode { exprs }));
        }

        if self.check_keyword(Keyword::Select) {
            let select = self.parse_select_stmt()?;
            return Ok(Statement::Select(Box::new(select)));
        }

        if self.consume_keyword(Keyword::Insert) {
            return self.parse_insert();
        }

        if self.consume_keyword(Keyword::Update) {
            return self.parse_update();
        }

        if self.consume_keyword(Keyword::Delete) {
            return self.parse_delete();
        }

        if self.consume_keyword(Keyword::Sync) {
            return Ok(Statement::Sync);
        }
        if self.consume_keyword(Keyword::Help) {
            return Ok(Statement::Help);
        }
        if self.consume_keyword(Keyword::Exit) {
            return Ok(Statement::Exit);
        }

        Err(ParseError::unexpected_token(
            "statement",
            &self.current_token_name(),
            self.current_span(),
        ))
    }

    fn parse_create_table(&mut self) -> Result<Statement, ParseError> {
        let name = self.expect_identifier()?;
        self.expect_token(&TokenKind::LParen)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_def()?);
            if !self.consume_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_token(&TokenKind::RParen)?;

        // STORAGE FORMAT = id
        let mut storage_format = None;
        if self.consume_keyword(Keyword::Storage) {
            self.expect_keyword(Keyword::Format)?;
            self.expect_token(&TokenKind::Eq)?;
            storage_format = Some(self.expect_identifier()?);
        }

        Ok(Statement::CreateTable(CreateTableNode {
            name,
            columns,
            storage_format,
        }))
    }

    fn parse_column_def(&mut self) -> Result<ColumnDefNode, ParseError> {
        let name = self.expect_identifier()?;

        let type_name = match self.peek_kind() {
            Some(TokenKind::Keyword(
                kw @ (Keyword::Int | Keyword::Integer | Keyword::Float | Keyword::Date
                | Keyword::Char),
            )) => {
                let s = kw.as_str().to_string();
                self.advance();
                s
            }
            _ => {
                return Err(ParseError::unexpected_token(
                    "column type",
                    &self.current_token_name(),
                    self.current_span(),
                ));
            }
        };

        let len = if self.consume_token(&TokenKind::LParen) {
            let n = self.expect_integer()?;
            self.expect_token(&TokenKind::RParen)?;
            if n < 0 {
                return Err(ParseError::syntax_error(
                    "column length must be positive",
                    self.current_span(),
                ));
            }
            Some(n as usize)
        } else {
            None
        };

        let nullable = if self.consume_keyword(Keyword::Not) {
            self.expect_keyword(Keyword::Null)?;
            Some(false)
        } else if self.consume_keyword(Keyword::Null) {
            Some(true)
        } else {
            None
        };

        Ok(ColumnDefNode {
            name,
            type_name,
            len,
            nullable,
        })
    }

    fn parse_create_index(&mut self, unique: bool) -> Result<Statement, ParseError> {
        let name = self.expect_identifier()?;
        self.expect_keyword(Keyword::On)?;
        let table = self.expect_identifier()?;
        self.expect_token(&TokenKind::LParen)?;
        let mut columns = vec![self.expect_identifier()?];
        while self.consume_token(&TokenKind::Comma) {
            columns.push(self.expect_identifier()?);
        }
        self.expect_token(&TokenKind::RParen)?;
        Ok(Statement::CreateIndex(CreateIndexNode {
            name,
            table,
            columns,
            unique,
        }))
    }

    /// Parses a SELECT statement. Also used for subqueries, which is why
    /// this is separate from `parse_statement`.
    pub(crate) fn parse_select_stmt(&mut self) -> Result<SelectNode, ParseError> {
        self.expect_keyword(Keyword::Select)?;

        let mut projects = vec![self.parse_select_item()?];
        while self.consume_token(&TokenKind::Comma) {
            projects.push(self.parse_select_item()?);
        }

        self.expect_keyword(Keyword::From)?;
        let mut from = vec![self.parse_from_node()?];
        while self.consume_token(&TokenKind::Comma) {
            from.push(self.parse_from_node()?);
        }

        let where_clause = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.consume_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            group_by.push(self.parse_expr()?);
            while self.consume_token(&TokenKind::Comma) {
                group_by.push(self.parse_expr()?);
            }
        }

        let having = if self.consume_keyword(Keyword::Having) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        Ok(SelectNode {
            projects,
            from,
            where_clause,
            group_by,
            having,
        })
    }

    fn parse_select_item(&mut self) -> Result<SelectItem, ParseError> {
        let expr = self.parse_expr()?;

        // A star never takes an alias.
        if matches!(expr, Expr::Star { .. }) {
            return Ok(SelectItem { expr, alias: None });
        }

        let alias = if self.consume_keyword(Keyword::As) {
            Some(self.expect_identifier()?)
        } else if let Some(TokenKind::Identifier(name)) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            None
        };

        Ok(SelectItem { expr, alias })
    }

    fn parse_from_node(&mut self) -> Result<FromNode, ParseError> {
        let table = self.expect_identifier()?;
        let alias = self.parse_table_alias();

        let mut joins = Vec::new();
        while self.consume_keyword(Keyword::Inner) {
            self.expect_keyword(Keyword::Join)?;
            let join_table = self.expect_identifier()?;
            let join_alias = self.parse_table_alias();
            self.expect_keyword(Keyword::On)?;
            let on = self.parse_condition()?;
            joins.push(JoinNode {
                table: join_table,
                alias: join_alias,
                on,
            });
        }

        Ok(FromNode {
            table,
            alias,
            joins,
        })
    }

    fn parse_table_alias(&mut self) -> Option<String> {
        if self.consume_keyword(Keyword::As) {
            if let Some(TokenKind::Identifier(name)) = self.peek_kind() {
                let name = name.clone();
                self.advance();
                return Some(name);
            }
            return None;
        }
        if let Some(TokenKind::Identifier(name)) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            return Some(name);
        }
        None
    }

    fn parse_insert(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword(Keyword::Into)?;
        let table = self.expect_identifier()?;
        self.expect_keyword(Keyword::Values)?;

        let mut rows = Vec::new();
        loop {
            self.expect_token(&TokenKind::LParen)?;
            let row = self.parse_expr_list()?;
            self.expect_token(&TokenKind::RParen)?;
            rows.push(row);
            if !self.consume_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(Statement::Insert(InsertNode { table, rows }))
    }

    fn parse_update(&mut self) -> Result<Statement, ParseError> {
        let table = self.expect_identifier()?;
        self.expect_keyword(Keyword::Set)?;

        let mut sets = Vec::new();
        loop {
            let column = self.expect_identifier()?;
            self.expect_token(&TokenKind::Eq)?;
            let value = self.parse_expr()?;
            sets.push((column, value));
            if !self.consume_token(&TokenKind::Comma) {
                break;
            }
        }

        let where_clause = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        Ok(Statement::Update(UpdateNode {
            table,
            sets,
            where_clause,
        }))
    }

    fn parse_delete(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_identifier()?;
        let where_clause = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_condition()?)
        } else {
            None
        };
        Ok(Statement::Delete(DeleteNode {
            table,
            where_clause,
        }))
    }

    pub(crate) fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut list = vec![self.parse_expr()?];
        while self.consume_token(&TokenKind::Comma) {
            list.push(self.parse_expr()?);
        }
        Ok(list)
    }

    // --- token helpers ---

    /// Current token position, for backtracking.
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Restores a previously saved token position.
    pub(crate) fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    pub(crate) fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    pub(crate) fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or(Span::at(0))
    }

    pub(crate) fn current_token_name(&self) -> String {
        self.peek_kind()
            .map(|k| k.display_name())
            .unwrap_or_else(|| "end of input".to_string())
    }

    pub(crate) fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Keyword(k)) if *k == kw)
    }

    pub(crate) fn consume_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_keyword(&mut self, kw: Keyword) -> Result<(), ParseError> {
        if self.consume_keyword(kw) {
            Ok(())
        } else {
            Err(ParseError::unexpected_token(
                kw.as_str(),
                &self.current_token_name(),
                self.current_span(),
            ))
        }
    }

    pub(crate) fn check_token(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    pub(crate) fn consume_token(&mut self, kind: &TokenKind) -> bool {
        if self.check_token(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_token(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.consume_token(kind) {
            Ok(())
        } else {
            Err(ParseError::unexpected_token(
                &kind.display_name(),
                &self.current_token_name(),
                self.current_span(),
            ))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(ParseError::unexpected_token(
                "identifier",
                &self.current_token_name(),
                self.current_span(),
            )),
        }
    }

    pub(crate) fn expect_integer(&mut self) -> Result<i32, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Integer(n)) => {
                let n = *n;
                self.advance();
                Ok(n)
            }
            _ => Err(ParseError::unexpected_token(
                "integer",
                &self.current_token_name(),
                self.current_span(),
            )),
        }
    }

    pub(crate) fn expect_string(&mut self) -> Result<String, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::String(s)) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(ParseError::unexpected_token(
                "string literal",
                &self.current_token_name(),
                self.current_span(),
            )),
        }
    }
}

/// Parses one statement from a SQL string.
pub fn parse_sql(input: &str) -> Result<Option<Statement>, ParseError> {
    Parser::new(input)?.parse()
}
