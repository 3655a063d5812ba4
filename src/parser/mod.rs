//! Hand-written recursive descent parser.
//!
//! One token of lookahead, plus a second cached token where the grammar
//! needs it: `type IDENT` opens both function definitions and global
//! variables, distinguished by the token after the name. Panic-mode
//! recovery resynchronizes at `;` and `}` so one malformed construct
//! yields one diagnostic and parsing continues.

mod expr;
mod stmt;


use crate::ast::{
    Dims, ElemType, FuncDef, FuncSig, Param, Program, TopDecl, Type, VarDecl, MAX_ARRAY_DIMS,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::token::{Span, Token, TokenType};

pub(crate) type ParseResult<T> = Result<T, Diagnostic>;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    diags: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, diags: &'a mut Diagnostics) -> Self {
        debug_assert!(
            matches!(tokens.last(), Some(t) if t.kind == TokenType::Eof),
            "token stream must end with Eof"
        );
        Parser { tokens, current: 0, diags }
    }

    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    /// The cached second token of lookahead.
    pub(crate) fn peek_second(&self) -> &Token {
        &self.tokens[(self.current + 1).min(self.tokens.len() - 1)]
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.peek().kind == TokenType::Eof
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.at_eof() {
            self.current += 1;
        }
        token
    }

    pub(crate) fn prev_span(&self) -> Span {
        self.tokens[self.current.saturating_sub(1)].span
    }

    pub(crate) fn check(&self, kind: &TokenType) -> bool {
        &self.peek().kind == kind
    }

    pub(crate) fn match_token(&mut self, kind: &TokenType) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    /// Consumes `kind` or produces a diagnostic. A missing closing
    /// delimiter at end of file is reported as unbalanced rather than
    /// merely unexpected.
    pub(crate) fn expect(&mut self, kind: TokenType, context: &str) -> ParseResult<Span> {
        if self.check(&kind) {
            return Ok(self.advance().span);
        }
        let closes_delimiter = matches!(
            kind,
            TokenType::RParen | TokenType::RBrace | TokenType::RBracket
        );
        if closes_delimiter && self.at_eof() {
            return Err(Diagnostic::new(
                DiagnosticKind::UnbalancedDelimiter,
                self.peek().span,
                format!("missing {} {}", kind.describe(), context),
            ));
        }
        Err(Diagnostic::new(
            DiagnosticKind::UnexpectedToken,
            self.peek().span,
            format!(
                "expected {} {}, found {}",
                kind.describe(),
                context,
                self.peek().kind.describe()
            ),
        ))
    }

    pub(crate) fn expect_ident(&mut self, context: &str) -> ParseResult<(String, Span)> {
        if let TokenType::Ident(name) = &self.peek().kind {
            let name = name.clone();
            let span = self.advance().span;
            return Ok((name, span));
        }
        Err(Diagnostic::new(
            DiagnosticKind::UnexpectedToken,
            self.peek().span,
            format!(
                "expected an identifier {}, found {}",
                context,
                self.peek().kind.describe()
            ),
        ))
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Panic-mode resync inside a block: skip forward until a `;` has
    /// been consumed or a `}` is next. Never consumes the `}`; the block
    /// loop owns it.
    pub(crate) fn recover_stmt(&mut self) {
        while !self.at_eof() {
            match self.peek().kind {
                TokenType::Semicolon => {
                    self.advance();
                    return;
                }
                TokenType::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Top-level resync: consume through the next `;` or closing `}`,
    /// skipping over any braced body so one broken declaration yields
    /// one diagnostic.
    fn recover_top(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.advance().kind {
                TokenType::LBrace => depth += 1,
                TokenType::RBrace => {
                    if depth <= 1 {
                        return;
                    }
                    depth -= 1;
                }
                TokenType::Semicolon if depth == 0 => return,
                _ => {}
            }
        }
    }

    // ------------------------------------------------------------------
    // Top-level declarations
    // ------------------------------------------------------------------

    pub fn parse_program(&mut self) -> Program {
        let mut decls = Vec::new();
        while !self.at_eof() {
            match self.parse_top_decl() {
                Ok(decl) => decls.push(decl),
                Err(diag) => {
                    self.diags.report(diag);
                    self.recover_top();
                }
            }
        }
        Program { decls }
    }

    fn parse_top_decl(&mut self) -> ParseResult<TopDecl> {
        if self.check(&TokenType::Extern) {
            return self.parse_extern();
        }

        if self.peek().kind.is_type_keyword() {
            let (ret, ret_span) = self.parse_type_keyword()?;
            let (name, name_span) = self.expect_ident("after the type")?;
            if self.check(&TokenType::LParen) {
                return self.parse_func_def(ret, ret_span, name, name_span);
            }
            let decl = self.parse_var_decl_tail(ret, ret_span, name, name_span)?;
            return Ok(TopDecl::GlobalVar(decl));
        }

        // `name(...)` or `name ident` at top level is a signature whose
        // return type was left out.
        if let TokenType::Ident(_) = self.peek().kind {
            if matches!(
                self.peek_second().kind,
                TokenType::LParen | TokenType::Ident(_)
            ) {
                return Err(Diagnostic::new(
                    DiagnosticKind::MissingReturnType,
                    self.peek().span,
                    "declaration is missing its return type",
                ));
            }
        }

        Err(Diagnostic::new(
            DiagnosticKind::UnexpectedToken,
            self.peek().span,
            format!(
                "expected a declaration, found {}",
                self.peek().kind.describe()
            ),
        ))
    }

    fn parse_extern(&mut self) -> ParseResult<TopDecl> {
        let extern_span = self.advance().span;
        if !self.peek().kind.is_type_keyword() {
            return Err(Diagnostic::new(
                DiagnosticKind::MissingReturnType,
                self.peek().span,
                "extern declaration is missing its return type",
            ));
        }
        let (ret, _) = self.parse_type_keyword()?;
        let (name, name_span) = self.expect_ident("for the extern declaration")?;
        self.expect(TokenType::LParen, "before the parameter list")?;
        let params = self.parse_params()?;
        self.expect(TokenType::RParen, "to close the parameter list")?;
        let end = self.expect(TokenType::Semicolon, "after the extern declaration")?;
        Ok(TopDecl::Extern(FuncSig {
            name,
            ret,
            params,
            name_span,
            span: extern_span.to(end),
        }))
    }

    /// A signature followed by `;` is a forward declaration; followed by
    /// `{` it is a definition.
    fn parse_func_def(
        &mut self,
        ret: Type,
        ret_span: Span,
        name: String,
        name_span: Span,
    ) -> ParseResult<TopDecl> {
        self.expect(TokenType::LParen, "before the parameter list")?;
        let params = self.parse_params()?;
        self.expect(TokenType::RParen, "to close the parameter list")?;
        if self.check(&TokenType::Semicolon) {
            let end = self.advance().span;
            return Ok(TopDecl::Extern(FuncSig {
                name,
                ret,
                params,
                name_span,
                span: ret_span.to(end),
            }));
        }
        let body = self.parse_block()?;
        let span = ret_span.to(body.span);
        Ok(TopDecl::Func(FuncDef {
            sig: FuncSig { name, ret, params, name_span, span },
            body,
        }))
    }

    // ------------------------------------------------------------------
    // Types and declarators
    // ------------------------------------------------------------------

    /// One of the four type keywords.
    pub(crate) fn parse_type_keyword(&mut self) -> ParseResult<(Type, Span)> {
        let ty = match self.peek().kind {
            TokenType::Int => Type::Int,
            TokenType::Float => Type::Float,
            TokenType::Bool => Type::Bool,
            TokenType::Void => Type::Void,
            _ => {
                return Err(Diagnostic::new(
                    DiagnosticKind::UnexpectedToken,
                    self.peek().span,
                    format!("expected a type, found {}", self.peek().kind.describe()),
                ))
            }
        };
        Ok((ty, self.advance().span))
    }

    /// Finishes `type IDENT` into a variable declaration: optional array
    /// dimensions, then `;`. Shared by globals and locals.
    pub(crate) fn parse_var_decl_tail(
        &mut self,
        base: Type,
        base_span: Span,
        name: String,
        name_span: Span,
    ) -> ParseResult<VarDecl> {
        if base == Type::Void {
            return Err(Diagnostic::new(
                DiagnosticKind::VoidVariable,
                name_span,
                format!("variable '{}' declared 'void'", name),
            ));
        }
        let ty = self.parse_array_dims(base, base_span, name_span)?;
        let end = self.expect(TokenType::Semicolon, "after the declaration")?;
        Ok(VarDecl { name, ty, name_span, span: base_span.to(end) })
    }

    /// Zero or more `[N]` suffixes. Dimensions must be positive integer
    /// literals and at most [`MAX_ARRAY_DIMS`] of them may appear.
    pub(crate) fn parse_array_dims(
        &mut self,
        base: Type,
        base_span: Span,
        name_span: Span,
    ) -> ParseResult<Type> {
        if !self.check(&TokenType::LBracket) {
            return Ok(base);
        }

        let mut dims = Dims::new();
        let mut dims_span = self.peek().span;
        while self.match_token(&TokenType::LBracket) {
            let dim_span = self.peek().span;
            let value = match self.peek().kind {
                TokenType::IntLit(v) => {
                    self.advance();
                    v
                }
                _ => {
                    return Err(Diagnostic::new(
                        DiagnosticKind::UnexpectedToken,
                        dim_span,
                        format!(
                            "expected an integer literal array dimension, found {}",
                            self.peek().kind.describe()
                        ),
                    ))
                }
            };
            if value <= 0 {
                return Err(Diagnostic::new(
                    DiagnosticKind::ArrayDimMismatch,
                    dim_span,
                    format!("array dimension must be a positive integer, got {}", value),
                ));
            }
            dims.push(value as u32);
            let close = self.expect(TokenType::RBracket, "to close the array dimension")?;
            dims_span = dims_span.to(close);
        }

        if dims.len() > MAX_ARRAY_DIMS {
            return Err(Diagnostic::new(
                DiagnosticKind::ArrayDimMismatch,
                dims_span,
                format!(
                    "array has {} dimensions but at most {} are supported",
                    dims.len(),
                    MAX_ARRAY_DIMS
                ),
            ));
        }

        let elem = match base {
            Type::Int => ElemType::Int,
            Type::Float => ElemType::Float,
            Type::Bool => {
                return Err(Diagnostic::new(
                    DiagnosticKind::TypeMismatch,
                    base_span.to(name_span),
                    "arrays of 'bool' are not supported",
                ))
            }
            Type::Void | Type::Array { .. } => {
                return Err(Diagnostic::new(
                    DiagnosticKind::VoidVariable,
                    base_span.to(name_span),
                    "arrays of 'void' are not supported",
                ))
            }
        };
        Ok(Type::Array { elem, dims })
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    /// `ε | 'void' | Param (',' Param)*`. A lone `void` is the explicit
    /// empty list.
    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.check(&TokenType::RParen) {
            return Ok(params);
        }
        if self.check(&TokenType::Void) && self.peek_second().kind == TokenType::RParen {
            self.advance();
            return Ok(params);
        }

        loop {
            params.push(self.parse_param()?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> ParseResult<Param> {
        if let TokenType::Ident(name) = &self.peek().kind {
            return Err(Diagnostic::new(
                DiagnosticKind::MissingParamType,
                self.peek().span,
                format!("parameter '{}' is missing its type", name),
            ));
        }
        let (base, base_span) = self.parse_type_keyword()?;
        let (name, name_span) = self.expect_ident("as the parameter name")?;
        if base == Type::Void {
            return Err(Diagnostic::new(
                DiagnosticKind::VoidVariable,
                name_span,
                format!("parameter '{}' declared 'void'", name),
            ));
        }
        let ty = self.parse_array_dims(base, base_span, name_span)?;
        Ok(Param { name, ty, span: base_span.to(self.prev_span()) })
    }
}
