//! Two-pass scope and type checker.
//!
//! Pass one records every global variable, extern declaration, and
//! function signature, so bodies may forward-reference functions and
//! globals declared later. Pass two walks each function body, resolves
//! every expression type, and materializes each implicit widening as an
//! explicit `Coerce` node.
//!
//! Widening follows `bool` < `int` < `float` and is always implicit;
//! narrowing is rejected everywhere except Boolean contexts (the
//! condition of `if`/`while` and the operands of `!`, `&&`, `||`),
//! where any numeric scalar silently becomes a zero test.
//!
//! A subtree that produced a diagnostic keeps `ty == None`; its parents
//! see that and stay silent, so one mistake yields one message.

use crate::ast::{
    BinOp, Block, BlockItem, CoerceKind, Expr, ExprKind, FuncDef, FuncSig, Program, Stmt,
    StmtKind, TopDecl, Type, UnaryOp,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::scope::{FuncEntry, GlobalEntry, SymbolTable, VarEntry};
use crate::suggest::find_similar;
use crate::token::Span;

/// Checks the whole program, decorating the tree in place.
pub fn check(program: &mut Program, diags: &mut Diagnostics) {
    let mut checker = Checker {
        table: SymbolTable::new(),
        diags,
        current_ret: Type::Void,
    };
    checker.collect_signatures(program);
    checker.check_bodies(program);
}

struct Checker<'a> {
    table: SymbolTable,
    diags: &'a mut Diagnostics,
    current_ret: Type,
}

impl<'a> Checker<'a> {
    fn report(&mut self, diag: Diagnostic) {
        self.diags.report(diag);
    }

    // ------------------------------------------------------------------
    // Pass one: the global namespace
    // ------------------------------------------------------------------

    fn collect_signatures(&mut self, program: &Program) {
        for decl in &program.decls {
            match decl {
                TopDecl::GlobalVar(var) => {
                    let entry = GlobalEntry::Var(VarEntry {
                        ty: var.ty.clone(),
                        span: var.name_span,
                    });
                    if let Err(prior) = self.table.declare_global(&var.name, entry) {
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::Duplicate,
                                var.name_span,
                                format!("redeclaration of '{}'", var.name),
                            )
                            .with_secondary(prior, "previously declared here"),
                        );
                    }
                }
                TopDecl::Extern(sig) => self.declare_function(sig, false),
                TopDecl::Func(def) => self.declare_function(&def.sig, true),
            }
        }
    }

    fn declare_function(&mut self, sig: &FuncSig, defines_body: bool) {
        self.check_param_names(sig);

        let entry = FuncEntry {
            ret: sig.ret.clone(),
            params: sig.params.iter().map(|p| p.ty.clone()).collect(),
            span: sig.name_span,
            defined: defines_body,
        };

        match self.table.lookup_global(&sig.name) {
            None => {
                let _ = self
                    .table
                    .declare_global(&sig.name, GlobalEntry::Func(entry));
            }
            Some(GlobalEntry::Func(prior)) => {
                let compatible = prior.ret == entry.ret && prior.params == entry.params;
                let prior_span = prior.span;
                let prior_defined = prior.defined;
                if !compatible {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::Duplicate,
                            sig.name_span,
                            format!("conflicting declaration of '{}'", sig.name),
                        )
                        .with_secondary(prior_span, "previously declared here"),
                    );
                } else if defines_body && prior_defined {
                    self.report(
                        Diagnostic::new(
                            DiagnosticKind::Duplicate,
                            sig.name_span,
                            format!("redefinition of '{}'", sig.name),
                        )
                        .with_secondary(prior_span, "previously defined here"),
                    );
                } else if defines_body {
                    // The definition completes a forward declaration.
                    self.table.replace_global(&sig.name, GlobalEntry::Func(entry));
                }
            }
            Some(GlobalEntry::Var(prior)) => {
                let prior_span = prior.span;
                self.report(
                    Diagnostic::new(
                        DiagnosticKind::Duplicate,
                        sig.name_span,
                        format!("'{}' conflicts with a global variable", sig.name),
                    )
                    .with_secondary(prior_span, "previously declared here"),
                );
            }
        }
    }

    fn check_param_names(&mut self, sig: &FuncSig) {
        for (i, param) in sig.params.iter().enumerate() {
            if let Some(prior) = sig.params[..i].iter().find(|p| p.name == param.name) {
                self.report(
                    Diagnostic::new(
                        DiagnosticKind::ParamNameCollision,
                        param.span,
                        format!(
                            "parameter '{}' appears more than once in '{}'",
                            param.name, sig.name
                        ),
                    )
                    .with_secondary(prior.span, "first appearance here"),
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Pass two: function bodies
    // ------------------------------------------------------------------

    fn check_bodies(&mut self, program: &mut Program) {
        for decl in &mut program.decls {
            if let TopDecl::Func(def) = decl {
                Self::check_function(&mut self.table, self.diags, def);
            }
        }
    }

    fn check_function(table: &mut SymbolTable, diags: &mut Diagnostics, def: &mut FuncDef) {
        let mut body_checker = Checker {
            table: std::mem::take(table),
            diags,
            current_ret: def.sig.ret.clone(),
        };

        // Parameters form the outermost frame of the body, so a local at
        // block level cannot reuse a parameter name.
        body_checker.table.enter_scope();
        for param in &def.sig.params {
            // A second declare of a colliding name fails; pass one
            // already reported it.
            let _ = body_checker.table.declare_in_current(
                &param.name,
                VarEntry { ty: param.ty.clone(), span: param.span },
            );
        }

        body_checker.check_items(&mut def.body.items);
        body_checker.table.leave_scope();

        body_checker.synthesize_return(def);
        *table = std::mem::take(&mut body_checker.table);
    }

    /// Appends a terminal `return` of zero when some path falls off the
    /// end of a non-`void` function; `void` bodies get a bare `return`.
    fn synthesize_return(&mut self, def: &mut FuncDef) {
        if block_returns(&def.body.items) {
            return;
        }
        let span = Span::new(
            def.body.span.end.saturating_sub(1),
            def.body.span.end,
        );
        let value = match self.current_ret {
            Type::Void => None,
            Type::Int => Some(ExprKind::IntLit(0)),
            Type::Float => Some(ExprKind::FloatLit(0.0)),
            Type::Bool => Some(ExprKind::BoolLit(false)),
            Type::Array { .. } => None,
        }
        .map(|kind| {
            let mut zero = Expr::new(kind, span);
            zero.ty = Some(self.current_ret.clone());
            zero
        });
        def.body
            .items
            .push(BlockItem::Stmt(Stmt::new(StmtKind::Return(value), span)));
    }

    fn check_items(&mut self, items: &mut [BlockItem]) {
        for item in items {
            match item {
                BlockItem::Decl(decl) => {
                    let entry = VarEntry { ty: decl.ty.clone(), span: decl.name_span };
                    if let Err(prior) = self.table.declare_in_current(&decl.name, entry) {
                        self.report(
                            Diagnostic::new(
                                DiagnosticKind::Duplicate,
                                decl.name_span,
                                format!("redeclaration of '{}'", decl.name),
                            )
                            .with_secondary(prior, "previously declared here"),
                        );
                    }
                }
                BlockItem::Stmt(stmt) => self.check_stmt(stmt),
            }
        }
    }

    fn check_block(&mut self, block: &mut Block) {
        self.table.enter_scope();
        self.check_items(&mut block.items);
        self.table.leave_scope();
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::Expr(expr) => {
                self.check_expr(expr);
            }
            StmtKind::Assign { target, value } => self.check_assign(target, value),
            StmtKind::If { cond, then_branch, else_branch } => {
                self.check_condition(cond);
                self.check_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_condition(cond);
                self.check_stmt(body);
            }
            StmtKind::Return(value) => self.check_return(value, stmt.span),
            StmtKind::Empty => {}
        }
    }

    fn check_assign(&mut self, target: &mut Expr, value: &mut Expr) {
        let target_ty = self.check_lvalue(target);
        let value_ty = self.check_expr(value);
        if let (Some(target_ty), Some(_)) = (target_ty, value_ty) {
            self.coerce_assign(value, &target_ty, "assignment");
        }
    }

    /// Assignment targets are `Ident` or `Index` by construction (the
    /// parser rejects the rest); both resolve through the scope stack.
    fn check_lvalue(&mut self, target: &mut Expr) -> Option<Type> {
        let ty = match &mut target.kind {
            ExprKind::Ident(name) => {
                let name = name.clone();
                match self.table.lookup_var(&name) {
                    Some(entry) => {
                        if entry.ty.is_array() {
                            let found = entry.ty.clone();
                            self.report(Diagnostic::new(
                                DiagnosticKind::TypeMismatch,
                                target.span,
                                format!(
                                    "cannot assign to '{}' of array type '{}'; assign an element",
                                    name, found
                                ),
                            ));
                            return None;
                        }
                        Some(entry.ty.clone())
                    }
                    None => {
                        if self.table.lookup_func(&name).is_some() {
                            self.report(Diagnostic::new(
                                DiagnosticKind::TypeMismatch,
                                target.span,
                                format!("cannot assign to function '{}'", name),
                            ));
                        } else {
                            self.report_undefined_var(&name, target.span);
                        }
                        None
                    }
                }
            }
            ExprKind::Index { .. } => return self.check_expr(target),
            _ => {
                // Unreachable per the parser's lvalue shape check.
                self.report(Diagnostic::new(
                    DiagnosticKind::InternalError,
                    target.span,
                    "assignment target is not an lvalue",
                ));
                None
            }
        };
        target.ty = ty.clone();
        ty
    }

    fn check_return(&mut self, value: &mut Option<Expr>, span: Span) {
        match value {
            None => {
                if self.current_ret != Type::Void {
                    self.report(Diagnostic::new(
                        DiagnosticKind::MissingReturnValue,
                        span,
                        format!(
                            "function returning '{}' has a bare 'return'",
                            self.current_ret
                        ),
                    ));
                }
            }
            Some(expr) => {
                let ty = self.check_expr(expr);
                if self.current_ret == Type::Void {
                    self.report(Diagnostic::new(
                        DiagnosticKind::VoidReturnsValue,
                        expr.span,
                        "'void' function returns a value",
                    ));
                    return;
                }
                if ty.is_some() {
                    let ret = self.current_ret.clone();
                    self.coerce_assign(expr, &ret, "return value");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Resolves the type of `expr`, wrapping subtrees in `Coerce` nodes
    /// where a widening is needed. Returns `None` when a diagnostic was
    /// produced anywhere below, in which case `expr.ty` stays `None`
    /// and the caller must not pile on.
    fn check_expr(&mut self, expr: &mut Expr) -> Option<Type> {
        let span = expr.span;
        let ty = match &mut expr.kind {
            ExprKind::IntLit(_) => Some(Type::Int),
            ExprKind::FloatLit(_) => Some(Type::Float),
            ExprKind::BoolLit(_) => Some(Type::Bool),
            ExprKind::Ident(name) => self.check_ident(name, span),
            ExprKind::Index { name, indices } => self.check_index(name, indices, span),
            ExprKind::Call { callee, args } => self.check_call(callee, args, span),
            ExprKind::Unary { op, operand } => {
                let op = *op;
                self.check_unary(op, operand, span)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                self.check_binary(op, lhs, rhs, span)
            }
            ExprKind::Coerce { .. } => {
                // The checker is the only producer of coercions.
                self.report(Diagnostic::new(
                    DiagnosticKind::InternalError,
                    span,
                    "coercion node reached the checker",
                ));
                None
            }
        };
        expr.ty = ty.clone();
        ty
    }

    fn check_ident(&mut self, name: &str, span: Span) -> Option<Type> {
        if let Some(entry) = self.table.lookup_var(name) {
            return Some(entry.ty.clone());
        }
        if self.table.lookup_func(name).is_some() {
            self.report(Diagnostic::new(
                DiagnosticKind::TypeMismatch,
                span,
                format!("function '{}' used as a value", name),
            ));
            return None;
        }
        self.report_undefined_var(name, span);
        None
    }

    fn report_undefined_var(&mut self, name: &str, span: Span) {
        let mut diag = Diagnostic::new(
            DiagnosticKind::Undefined,
            span,
            format!("use of undefined variable '{}'", name),
        );
        if let Some(hint) = find_similar(name, &self.table.visible_var_names(), 2) {
            diag = diag.with_help(format!("did you mean '{}'?", hint));
        }
        self.report(diag);
    }

    fn check_index(&mut self, name: &str, indices: &mut [Expr], span: Span) -> Option<Type> {
        let base_ty = match self.table.lookup_var(name) {
            Some(entry) => entry.ty.clone(),
            None => {
                self.report_undefined_var(name, span);
                // Still check the index expressions for their own errors.
                for index in indices.iter_mut() {
                    self.check_expr(index);
                }
                return None;
            }
        };

        let Type::Array { elem, dims } = &base_ty else {
            self.report(Diagnostic::new(
                DiagnosticKind::NotAnArray,
                span,
                format!("'{}' is not an array", name),
            ));
            for index in indices.iter_mut() {
                self.check_expr(index);
            }
            return None;
        };

        let mut ok = true;
        for index in indices.iter_mut() {
            // Indices take no widening at all: bool and float are both
            // rejected.
            if let Some(ty) = self.check_expr(index) {
                if ty != Type::Int {
                    self.report(Diagnostic::new(
                        DiagnosticKind::NonIntegerIndex,
                        index.span,
                        format!("array index must be 'int', got '{}'", ty),
                    ));
                    ok = false;
                }
            } else {
                ok = false;
            }
        }

        if indices.len() != dims.len() {
            self.report(Diagnostic::new(
                DiagnosticKind::ArrayDimMismatch,
                span,
                format!(
                    "array '{}' has {} dimensions but {} indices were given",
                    name,
                    dims.len(),
                    indices.len()
                ),
            ));
            return None;
        }

        ok.then(|| elem.as_type())
    }

    fn check_call(&mut self, callee: &str, args: &mut [Expr], span: Span) -> Option<Type> {
        let arg_types: Vec<Option<Type>> =
            args.iter_mut().map(|arg| self.check_expr(arg)).collect();

        let Some(entry) = self.table.lookup_func(callee) else {
            if self.table.lookup_var(callee).is_some() {
                self.report(Diagnostic::new(
                    DiagnosticKind::NotCallable,
                    span,
                    format!("'{}' is not a function", callee),
                ));
            } else {
                let mut diag = Diagnostic::new(
                    DiagnosticKind::Undefined,
                    span,
                    format!("call to undefined function '{}'", callee),
                );
                if let Some(hint) = find_similar(callee, &self.table.function_names(), 2) {
                    diag = diag.with_help(format!("did you mean '{}'?", hint));
                }
                self.report(diag);
            }
            return None;
        };

        let ret = entry.ret.clone();
        let params = entry.params.clone();

        if args.len() != params.len() {
            self.report(Diagnostic::new(
                DiagnosticKind::ArgCountMismatch,
                span,
                format!(
                    "function '{}' takes {} argument{} but {} {} supplied",
                    callee,
                    params.len(),
                    if params.len() == 1 { "" } else { "s" },
                    args.len(),
                    if args.len() == 1 { "was" } else { "were" },
                ),
            ));
            return None;
        }

        let mut ok = true;
        for (arg, (param_ty, arg_ty)) in
            args.iter_mut().zip(params.iter().zip(arg_types))
        {
            if arg_ty.is_some() {
                ok &= self.coerce_assign(arg, param_ty, "argument");
            } else {
                ok = false;
            }
        }

        ok.then_some(ret)
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &mut Expr, span: Span) -> Option<Type> {
        match op {
            UnaryOp::Neg => {
                let ty = self.check_expr(operand)?;
                if !ty.is_numeric() {
                    self.report(Diagnostic::new(
                        DiagnosticKind::InvalidUnaryOperand,
                        span,
                        format!("operator '-' requires 'int' or 'float', got '{}'", ty),
                    ));
                    return None;
                }
                Some(ty)
            }
            // `!` is a Boolean context: its operand narrows silently.
            UnaryOp::Not => {
                self.coerce_to_bool(operand)?;
                Some(Type::Bool)
            }
        }
    }

    fn check_binary(
        &mut self,
        op: BinOp,
        lhs: &mut Expr,
        rhs: &mut Expr,
        span: Span,
    ) -> Option<Type> {
        if op.is_logical() {
            // Both operands of `&&`/`||` are Boolean contexts.
            let l = self.coerce_to_bool(lhs);
            let r = self.coerce_to_bool(rhs);
            l?;
            r?;
            return Some(Type::Bool);
        }

        // Check both sides before bailing so each reports its own error.
        let lt = self.check_expr(lhs);
        let rt = self.check_expr(rhs);
        let (lt, rt) = (lt?, rt?);

        if op == BinOp::Rem {
            if lt != Type::Int || rt != Type::Int {
                self.report(Diagnostic::new(
                    DiagnosticKind::NonIntegerModulo,
                    span,
                    format!("operator '%' requires 'int' operands, got '{}' and '{}'", lt, rt),
                ));
                return None;
            }
            return Some(Type::Int);
        }

        if matches!(op, BinOp::Eq | BinOp::NotEq) && lt == Type::Bool && rt == Type::Bool {
            return Some(Type::Bool);
        }

        if !lt.is_numeric() || !rt.is_numeric() {
            self.report(Diagnostic::new(
                DiagnosticKind::TypeMismatch,
                span,
                format!(
                    "operator '{}' is not defined on '{}' and '{}'",
                    op.symbol(),
                    lt,
                    rt
                ),
            ));
            return None;
        }

        // Widen the int side when the other is float.
        let operand_ty = if lt == Type::Float || rt == Type::Float {
            if lt == Type::Int {
                wrap_coerce(lhs, CoerceKind::IntToFloat, Type::Float);
            }
            if rt == Type::Int {
                wrap_coerce(rhs, CoerceKind::IntToFloat, Type::Float);
            }
            Type::Float
        } else {
            Type::Int
        };

        if op.is_comparison() {
            Some(Type::Bool)
        } else {
            Some(operand_ty)
        }
    }

    // ------------------------------------------------------------------
    // Coercions
    // ------------------------------------------------------------------

    /// Applies the assignment rule: equal, or exactly one widening.
    /// Reports and returns false otherwise. The expression must already
    /// be typed.
    fn coerce_assign(&mut self, expr: &mut Expr, target: &Type, what: &str) -> bool {
        let Some(from) = expr.ty.clone() else {
            return false;
        };
        if &from == target {
            return true;
        }
        match (&from, target) {
            (Type::Int, Type::Float) => {
                wrap_coerce(expr, CoerceKind::IntToFloat, Type::Float);
                true
            }
            (Type::Bool, Type::Int) => {
                wrap_coerce(expr, CoerceKind::BoolToInt, Type::Int);
                true
            }
            (Type::Bool, Type::Float) => {
                wrap_coerce(expr, CoerceKind::BoolToInt, Type::Int);
                wrap_coerce(expr, CoerceKind::IntToFloat, Type::Float);
                true
            }
            (Type::Float, Type::Int | Type::Bool) | (Type::Int, Type::Bool) => {
                self.report(Diagnostic::new(
                    DiagnosticKind::NarrowingError,
                    expr.span,
                    format!(
                        "narrowing conversion from '{}' to '{}' in {}",
                        from, target, what
                    ),
                ));
                false
            }
            _ => {
                self.report(Diagnostic::new(
                    DiagnosticKind::TypeMismatch,
                    expr.span,
                    format!("expected '{}' in {}, got '{}'", target, what, from),
                ));
                false
            }
        }
    }

    /// Boolean context: any numeric scalar becomes a zero test.
    fn coerce_to_bool(&mut self, expr: &mut Expr) -> Option<()> {
        let ty = self.check_expr(expr)?;
        match ty {
            Type::Bool => Some(()),
            Type::Int => {
                wrap_coerce(expr, CoerceKind::IntToBool, Type::Bool);
                Some(())
            }
            Type::Float => {
                wrap_coerce(expr, CoerceKind::FloatToBool, Type::Bool);
                Some(())
            }
            _ => {
                self.report(Diagnostic::new(
                    DiagnosticKind::TypeMismatch,
                    expr.span,
                    format!("condition must be a scalar, got '{}'", ty),
                ));
                None
            }
        }
    }

    fn check_condition(&mut self, cond: &mut Expr) {
        self.coerce_to_bool(cond);
    }
}

/// Wraps `expr` in place in a coercion node of the given result type.
fn wrap_coerce(expr: &mut Expr, kind: CoerceKind, ty: Type) {
    let placeholder = Expr::new(ExprKind::BoolLit(false), expr.span);
    let inner = std::mem::replace(expr, placeholder);
    *expr = Expr::coerce(kind, inner, ty);
}

/// True when every control path through the items ends in a `return`.
/// A `while` never guarantees one; an `if` only with both branches.
fn block_returns(items: &[BlockItem]) -> bool {
    items
        .iter()
        .any(|item| matches!(item, BlockItem::Stmt(stmt) if stmt_returns(stmt)))
}

fn stmt_returns(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::Block(block) => block_returns(&block.items),
        StmtKind::If { then_branch, else_branch: Some(else_branch), .. } => {
            stmt_returns(then_branch) && stmt_returns(else_branch)
        }
        _ => false,
    }
}
