//! Expression and condition parsing.
//!
//! Conditions layer OR over AND over single comparisons; comparisons wrap
//! arithmetic expressions, which use the usual add/mul split. There is no
//! general unary NOT: NOT only appears in `NOT LIKE`, `NOT IN`,
//! `NOT EXISTS` and `IS NOT NULL`, as the grammar defines.

use crate::types::{date, Value};

use super::ast::{AggrFunc, ArithOp, CompOp, ConjOp, Expr};
use super::error::ParseError;
use super::parser::Parser;
use super::token::{Keyword, TokenKind};

impl Parser {
    /// Parses a condition: OR of AND of comparisons.
    pub(crate) fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_condition()?;
        while self.consume_keyword(Keyword::Or) {
            let right = self.parse_and_condition()?;
            left = Expr::Conjunction {
                op: ConjOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_condition(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.consume_keyword(Keyword::And) {
            let right = self.parse_comparison()?;
            left = Expr::Conjunction {
                op: ConjOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Parses a single comparison or a bare expression.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        // [NOT] EXISTS (subquery)
        if self.check_keyword(Keyword::Exists) || self.check_keyword(Keyword::Not) {
            let start = self.position();
            let negated = self.consume_keyword(Keyword::Not);
            if self.consume_keyword(Keyword::Exists) {
                let subquery = self.parse_subquery()?;
                let op = if negated {
                    CompOp::NotExists
                } else {
                    CompOp::Exists
                };
                return Ok(Expr::Compare {
                    op,
                    left: Box::new(Expr::Literal(Value::Null)),
                    right: Box::new(subquery),
                });
            }
            // NOT without EXISTS belongs to a postfix form below.
            self.set_position(start);
        }

        let left = self.parse_expr()?;

        // IS [NOT] NULL
        if self.consume_keyword(Keyword::Is) {
            let negated = self.consume_keyword(Keyword::Not);
            self.expect_keyword(Keyword::Null)?;
            let op = if negated {
                CompOp::IsNotNull
            } else {
                CompOp::IsNull
            };
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(Expr::Literal(Value::Null)),
            });
        }

        // [NOT] IN / [NOT] LIKE
        let negated = self.consume_keyword(Keyword::Not);
        if self.consume_keyword(Keyword::In) {
            self.expect_token(&TokenKind::LParen)?;
            let right = if self.check_keyword(Keyword::Select) {
                let select = self.parse_select_stmt()?;
                Expr::Select(Box::new(select))
            } else {
                Expr::List(self.parse_expr_list()?)
            };
            self.expect_token(&TokenKind::RParen)?;
            let op = if negated { CompOp::NotIn } else { CompOp::In };
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        if self.consume_keyword(Keyword::Like) {
            let right = self.parse_expr()?;
            let op = if negated {
                CompOp::NotLike
            } else {
                CompOp::Like
            };
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        if negated {
            return Err(ParseError::unexpected_token(
                "IN or LIKE after NOT",
                &self.current_token_name(),
                self.current_span(),
            ));
        }

        // Plain binary comparison
        let op = match self.peek_kind() {
            Some(TokenKind::Eq) => Some(CompOp::Eq),
            Some(TokenKind::Neq) => Some(CompOp::Ne),
            Some(TokenKind::Lt) => Some(CompOp::Lt),
            Some(TokenKind::LtEq) => Some(CompOp::Le),
            Some(TokenKind::Gt) => Some(CompOp::Gt),
            Some(TokenKind::GtEq) => Some(CompOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_expr()?;
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    /// Parses an arithmetic expression (no comparisons).
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => ArithOp::Add,
                Some(TokenKind::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Asterisk) => ArithOp::Mul,
                Some(TokenKind::Slash) => ArithOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.consume_token(&TokenKind::Minus) {
            let child = self.parse_unary()?;
            return Ok(Expr::Negate(Box::new(child)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.current_span();
        match self.peek_kind().cloned() {
            Some(TokenKind::Integer(n)) => {
                self.advance();
                Ok(Expr::Literal(Value::Int(n)))
            }
            Some(TokenKind::Float(f)) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(f)))
            }
            Some(TokenKind::String(s)) => {
                self.advance();
                // A date-shaped string is a date literal; a date-shaped
                // string naming an impossible day is a date syntax error.
                if date::has_date_shape(&s) {
                    match date::parse_date(&s) {
                        Some(packed) => Ok(Expr::Literal(Value::Date(packed))),
                        None => Err(ParseError::invalid_date(&s, span)),
                    }
                } else {
                    Ok(Expr::Literal(Value::Chars(s)))
                }
            }
            Some(TokenKind::Keyword(Keyword::Null)) => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            Some(TokenKind::Asterisk) => {
                self.advance();
                Ok(Expr::Star { table: None })
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let inner = if self.check_keyword(Keyword::Select) {
                    let select = self.parse_select_stmt()?;
                    Expr::Select(Box::new(select))
                } else {
                    self.parse_condition()?
                };
                self.expect_token(&TokenKind::RParen)?;
                Ok(inner)
            }
            Some(TokenKind::Identifier(name)) => {
                self.advance();
                self.parse_identifier_expr(name)
            }
            _ => Err(ParseError::unexpected_token(
                "expression",
                &self.current_token_name(),
                span,
            )),
        }
    }

    /// Continues parsing after a leading identifier: a function call,
    /// `table.field`, `table.*`, or a bare field.
    fn parse_identifier_expr(&mut self, name: String) -> Result<Expr, ParseError> {
        if self.check_token(&TokenKind::LParen) {
            let Some(func) = AggrFunc::from_name(&name) else {
                return Err(ParseError::syntax_error(
                    format!("unknown function \"{}\"", name),
                    self.current_span(),
                ));
            };
            self.advance();
            let arg = if self.consume_token(&TokenKind::Asterisk) {
                Expr::Star { table: None }
            } else {
                self.parse_expr()?
            };
            self.expect_token(&TokenKind::RParen)?;
            return Ok(Expr::Aggregate {
                func,
                arg: Box::new(arg),
            });
        }

        if self.consume_token(&TokenKind::Dot) {
            if self.consume_token(&TokenKind::Asterisk) {
                return Ok(Expr::Star { table: Some(name) });
            }
            let field = self.expect_identifier()?;
            return Ok(Expr::Field {
                table: Some(name),
                field,
            });
        }

        Ok(Expr::Field {
            table: None,
            field: name,
        })
    }

    fn parse_subquery(&mut self) -> Result<Expr, ParseError> {
        self.expect_token(&TokenKind::LParen)?;
        let select = self.parse_select_stmt()?;
        self.expect_token(&TokenKind::RParen)?;
        Ok(Expr::Select(Box::new(select)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::Statement;
    use crate::sql::parser::parse_sql;

    fn where_clause(input: &str) -> Expr {
        let stmt = parse_sql(input).unwrap().unwrap();
        let Statement::Select(node) = stmt else {
            panic!("expected Select");
        };
        node.where_clause.unwrap()
    }

    #[test]
    fn test_arithmetic_precedence() {
        let expr = where_clause("SELECT id FROM t WHERE id = 1 + 2 * 3");
        let Expr::Compare { right, .. } = expr else {
            panic!("expected comparison");
        };
        // 1 + (2 * 3)
        let Expr::Arith {
            op: ArithOp::Add,
            right: mul,
            ..
        } = *right
        else {
            panic!("expected addition at the top");
        };
        assert!(matches!(
            *mul,
            Expr::Arith {
                op: ArithOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = where_clause("SELECT id FROM t WHERE a = 1 OR b = 2 AND c = 3");
        let Expr::Conjunction {
            op: ConjOp::Or,
            right,
            ..
        } = expr
        else {
            panic!("expected OR at the top");
        };
        assert!(matches!(
            *right,
            Expr::Conjunction {
                op: ConjOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_parenthesized_condition() {
        let expr = where_clause("SELECT id FROM t WHERE (a = 1 OR b = 2) AND c = 3");
        let Expr::Conjunction {
            op: ConjOp::And,
            left,
            ..
        } = expr
        else {
            panic!("expected AND at the top");
        };
        assert!(matches!(
            *left,
            Expr::Conjunction {
                op: ConjOp::Or,
                ..
            }
        ));
    }

    #[test]
    fn test_is_null() {
        let expr = where_clause("SELECT id FROM t WHERE name IS NULL");
        assert!(matches!(
            expr,
            Expr::Compare {
                op: CompOp::IsNull,
                ..
            }
        ));

        let expr = where_clause("SELECT id FROM t WHERE name IS NOT NULL");
        assert!(matches!(
            expr,
            Expr::Compare {
                op: CompOp::IsNotNull,
                ..
            }
        ));
    }

    #[test]
    fn test_like_and_not_like() {
        let expr = where_clause("SELECT id FROM t WHERE name LIKE 'a%'");
        assert!(matches!(
            expr,
            Expr::Compare {
                op: CompOp::Like,
                ..
            }
        ));

        let expr = where_clause("SELECT id FROM t WHERE name NOT LIKE 'a_'");
        assert!(matches!(
            expr,
            Expr::Compare {
                op: CompOp::NotLike,
                ..
            }
        ));
    }

    #[test]
    fn test_in_list() {
        let expr = where_clause("SELECT id FROM t WHERE id IN (1, 2, 3)");
        let Expr::Compare {
            op: CompOp::In,
            right,
            ..
        } = expr
        else {
            panic!("expected IN");
        };
        let Expr::List(items) = *right else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_in_subquery() {
        let expr = where_clause("SELECT id FROM t WHERE id NOT IN (SELECT id FROM u)");
        let Expr::Compare {
            op: CompOp::NotIn,
            right,
            ..
        } = expr
        else {
            panic!("expected NOT IN");
        };
        assert!(matches!(*right, Expr::Select(_)));
    }

    #[test]
    fn test_exists() {
        let expr = where_clause("SELECT id FROM t WHERE EXISTS (SELECT id FROM u)");
        assert!(matches!(
            expr,
            Expr::Compare {
                op: CompOp::Exists,
                ..
            }
        ));

        let expr = where_clause("SELECT id FROM t WHERE NOT EXISTS (SELECT id FROM u)");
        assert!(matches!(
            expr,
            Expr::Compare {
                op: CompOp::NotExists,
                ..
            }
        ));
    }

    #[test]
    fn test_scalar_subquery_comparison() {
        let expr = where_clause("SELECT id FROM t WHERE id = (SELECT max(id) FROM t)");
        let Expr::Compare {
            op: CompOp::Eq,
            right,
            ..
        } = expr
        else {
            panic!("expected =");
        };
        assert!(matches!(*right, Expr::Select(_)));
    }

    #[test]
    fn test_negative_literal() {
        let expr = where_clause("SELECT id FROM t WHERE id = -5");
        let Expr::Compare { right, .. } = expr else {
            panic!("expected comparison");
        };
        assert!(matches!(*right, Expr::Negate(_)));
    }

    #[test]
    fn test_qualified_field_and_star() {
        let expr = where_clause("SELECT id FROM t WHERE t.id = 1");
        let Expr::Compare { left, .. } = expr else {
            panic!("expected comparison");
        };
        assert_eq!(
            *left,
            Expr::Field {
                table: Some("t".into()),
                field: "id".into()
            }
        );
    }

    #[test]
    fn test_aggregate_calls() {
        let stmt = parse_sql("SELECT count(*), sum(id + 1) FROM t").unwrap().unwrap();
        let Statement::Select(node) = stmt else {
            panic!("expected Select");
        };
        assert!(matches!(
            node.projects[0].expr,
            Expr::Aggregate {
                func: AggrFunc::Count,
                ..
            }
        ));
        assert!(matches!(
            node.projects[1].expr,
            Expr::Aggregate {
                func: AggrFunc::Sum,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_function_rejected() {
        assert!(parse_sql("SELECT median(id) FROM t").is_err());
    }

    #[test]
    fn test_bare_not_rejected() {
        assert!(parse_sql("SELECT id FROM t WHERE NOT id = 1").is_err());
    }
}
