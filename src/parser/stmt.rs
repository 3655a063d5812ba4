//! Statement and block productions.

use crate::ast::{Block, BlockItem, Expr, ExprKind, Stmt, StmtKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::token::TokenType;

use super::{ParseResult, Parser};

impl<'a> Parser<'a> {
    /// `'{' (LocalDecl | Stmt)* '}'`. Declarations and statements may
    /// interleave freely; each item recovers independently so one broken
    /// statement costs one diagnostic.
    pub(crate) fn parse_block(&mut self) -> ParseResult<Block> {
        let open = self.expect(TokenType::LBrace, "to open the block")?;
        let mut items = Vec::new();

        while !self.check(&TokenType::RBrace) && !self.at_eof() {
            if self.peek().kind.is_type_keyword() {
                match self.parse_local_decl() {
                    Ok(decl) => items.push(BlockItem::Decl(decl)),
                    Err(diag) => {
                        self.diags.report(diag);
                        self.recover_stmt();
                    }
                }
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => items.push(BlockItem::Stmt(stmt)),
                Err(diag) => {
                    self.diags.report(diag);
                    self.recover_stmt();
                }
            }
        }

        let close = self.expect(TokenType::RBrace, "to close the block")?;
        Ok(Block { items, span: open.to(close) })
    }

    fn parse_local_decl(&mut self) -> ParseResult<crate::ast::VarDecl> {
        let (base, base_span) = self.parse_type_keyword()?;
        let (name, name_span) = self.expect_ident("after the type")?;
        if self.check(&TokenType::LParen) {
            return Err(Diagnostic::new(
                DiagnosticKind::NestedFunction,
                name_span,
                format!("function '{}' cannot be defined inside another function", name),
            ));
        }
        self.parse_var_decl_tail(base, base_span, name, name_span)
    }

    pub(crate) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            TokenType::LBrace => {
                let block = self.parse_block()?;
                let span = block.span;
                Ok(Stmt::new(StmtKind::Block(block), span))
            }
            TokenType::If => self.parse_if(),
            TokenType::While => self.parse_while(),
            TokenType::Return => self.parse_return(),
            TokenType::Semicolon => {
                let span = self.advance().span;
                Ok(Stmt::new(StmtKind::Empty, span))
            }
            _ => self.parse_expr_or_assign(),
        }
    }

    /// `'if' '(' Expr ')' Stmt ('else' Stmt)?`; an `else` binds to the
    /// nearest preceding `if`, which recursive descent gives for free.
    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let if_span = self.advance().span;
        self.expect(TokenType::LParen, "after 'if'")?;
        let cond = self.parse_expr()?;
        self.expect(TokenType::RParen, "to close the condition")?;
        let then_branch = Box::new(self.parse_statement()?);
        let mut span = if_span.to(then_branch.span);
        let else_branch = if self.match_token(&TokenType::Else) {
            let stmt = self.parse_statement()?;
            span = span.to(stmt.span);
            Some(Box::new(stmt))
        } else {
            None
        };
        Ok(Stmt::new(StmtKind::If { cond, then_branch, else_branch }, span))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let while_span = self.advance().span;
        self.expect(TokenType::LParen, "after 'while'")?;
        let cond = self.parse_expr()?;
        self.expect(TokenType::RParen, "to close the condition")?;
        let body = Box::new(self.parse_statement()?);
        let span = while_span.to(body.span);
        Ok(Stmt::new(StmtKind::While { cond, body }, span))
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let return_span = self.advance().span;
        if self.match_token(&TokenType::Semicolon) {
            return Ok(Stmt::new(
                StmtKind::Return(None),
                return_span.to(self.prev_span()),
            ));
        }
        let value = self.parse_expr()?;
        let end = self.expect(TokenType::Semicolon, "after the return value")?;
        Ok(Stmt::new(StmtKind::Return(Some(value)), return_span.to(end)))
    }

    /// `(Expr | LValue '=' Expr) ';'`. The left side is parsed as a full
    /// expression first; only when `=` follows does its shape matter.
    fn parse_expr_or_assign(&mut self) -> ParseResult<Stmt> {
        let lhs = self.parse_expr()?;
        if self.match_token(&TokenType::Assign) {
            if !is_lvalue(&lhs) {
                return Err(Diagnostic::new(
                    DiagnosticKind::ExpectedLValue,
                    lhs.span,
                    "left side of assignment must be a variable or array element",
                ));
            }
            let value = self.parse_expr()?;
            let end = self.expect(TokenType::Semicolon, "after the assignment")?;
            let span = lhs.span.to(end);
            return Ok(Stmt::new(StmtKind::Assign { target: lhs, value }, span));
        }
        let end = self.expect(TokenType::Semicolon, "after the expression")?;
        let span = lhs.span.to(end);
        Ok(Stmt::new(StmtKind::Expr(lhs), span))
    }
}

fn is_lvalue(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Ident(_) | ExprKind::Index { .. })
}
