//! Expression productions, one level per precedence tier.

use crate::ast::{BinOp, Expr, ExprKind, UnaryOp};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::token::TokenType;

use super::{ParseResult, Parser};

impl<'a> Parser<'a> {
    pub(crate) fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_logic_or()
    }

    fn parse_logic_or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_logic_and()?;
        while self.match_token(&TokenType::OrOr) {
            let rhs = self.parse_logic_and()?;
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_logic_and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.match_token(&TokenType::AndAnd) {
            let rhs = self.parse_equality()?;
            lhs = binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek().kind {
                TokenType::EqEq => BinOp::Eq,
                TokenType::NotEq => BinOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenType::Lt => BinOp::Lt,
                TokenType::LtEq => BinOp::LtEq,
                TokenType::Gt => BinOp::Gt,
                TokenType::GtEq => BinOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenType::Plus => BinOp::Add,
                TokenType::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenType::Star => BinOp::Mul,
                TokenType::Slash => BinOp::Div,
                TokenType::Percent => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek().kind {
            TokenType::Minus => Some(UnaryOp::Neg),
            TokenType::Not => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let op_span = self.advance().span;
            let operand = self.parse_unary()?;
            let span = op_span.to(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary { op, operand: Box::new(operand) },
                span,
            ));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenType::IntLit(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::IntLit(value), token.span))
            }
            TokenType::FloatLit(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::FloatLit(value), token.span))
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::new(ExprKind::BoolLit(true), token.span))
            }
            TokenType::False => {
                self.advance();
                Ok(Expr::new(ExprKind::BoolLit(false), token.span))
            }
            TokenType::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenType::RParen, "to close the parenthesized expression")?;
                Ok(inner)
            }
            TokenType::Ident(name) => {
                self.advance();
                if self.check(&TokenType::LParen) {
                    return self.parse_call(name, token.span);
                }
                if self.check(&TokenType::LBracket) {
                    return self.parse_index(name, token.span);
                }
                Ok(Expr::new(ExprKind::Ident(name), token.span))
            }
            _ => Err(Diagnostic::new(
                DiagnosticKind::UnexpectedToken,
                token.span,
                format!("expected an expression, found {}", token.kind.describe()),
            )),
        }
    }

    fn parse_call(
        &mut self,
        callee: String,
        name_span: crate::token::Span,
    ) -> ParseResult<Expr> {
        self.expect(TokenType::LParen, "to open the argument list")?;
        let mut args = Vec::new();
        if !self.check(&TokenType::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(TokenType::RParen, "to close the argument list")?;
        Ok(Expr::new(
            ExprKind::Call { callee, args },
            name_span.to(end),
        ))
    }

    /// `IDENT ('[' Expr ']')+`; the checker validates that the number of
    /// indices matches the array's declared dimensionality.
    fn parse_index(
        &mut self,
        name: String,
        name_span: crate::token::Span,
    ) -> ParseResult<Expr> {
        let mut indices = Vec::new();
        let mut span = name_span;
        while self.match_token(&TokenType::LBracket) {
            let index = self.parse_expr()?;
            let close = self.expect(TokenType::RBracket, "to close the index")?;
            indices.push(index);
            span = span.to(close);
        }
        Ok(Expr::new(ExprKind::Index { name, indices }, span))
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.to(rhs.span);
    Expr::new(
        ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
        span,
    )
}
