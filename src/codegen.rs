//! Textual LLVM IR emission.
//!
//! Every named local (parameters included) gets an `alloca` at function
//! entry; reads are `load`s, writes are `store`s, and no mem2reg-style
//! cleanup is attempted. Control flow lowers to labeled basic blocks:
//! `loop`/`body`/`afterloop` for `while`, `then`/`else`/`ifcont` for
//! `if`, and `&&`/`||` branch around their right operand and merge with
//! a `phi i1`. Each block ends with exactly one terminator; statements
//! behind one are unreachable and are not emitted.
//!
//! SSA names come from per-function counters keyed by base name: the
//! first request for a base is unsuffixed, later ones append 1, 2, …
//! (`%i`, `%i1`, `%i2`). Labels use a parallel counter, so re-emission
//! of the same program is byte-identical.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use itertools::Itertools;

use crate::ast::{
    BinOp, BlockItem, CoerceKind, ElemType, Expr, ExprKind, FuncDef, FuncSig, Param, Program,
    Stmt, StmtKind, TopDecl, Type, UnaryOp, VarDecl,
};

/// Emits the whole module: header, globals in source order, then
/// functions and extern declarations in source order.
pub fn emit_program(program: &Program) -> String {
    let mut out = String::new();
    writeln!(out, "; ModuleID = 'mini-c'").unwrap();
    writeln!(out, "source_filename = \"mini-c\"").unwrap();

    let mut globals = HashMap::new();
    for decl in &program.decls {
        if let TopDecl::GlobalVar(var) = decl {
            globals.insert(var.name.clone(), var.ty.clone());
        }
    }

    let global_decls: Vec<&VarDecl> = program
        .decls
        .iter()
        .filter_map(|decl| match decl {
            TopDecl::GlobalVar(var) => Some(var),
            _ => None,
        })
        .collect();
    if !global_decls.is_empty() {
        out.push('\n');
        for var in global_decls {
            writeln!(out, "@{} = global {} zeroinitializer", var.name, ll_type(&var.ty))
                .unwrap();
        }
    }

    // Forward declarations of functions defined in this module add
    // nothing; only genuinely external names get a `declare`.
    let defined: HashSet<&str> = program
        .decls
        .iter()
        .filter_map(|decl| match decl {
            TopDecl::Func(def) => Some(def.sig.name.as_str()),
            _ => None,
        })
        .collect();

    let mut declared = HashSet::new();
    for decl in &program.decls {
        match decl {
            TopDecl::GlobalVar(_) => {}
            TopDecl::Extern(sig) => {
                if defined.contains(sig.name.as_str()) || !declared.insert(sig.name.clone()) {
                    continue;
                }
                out.push('\n');
                emit_extern(&mut out, sig);
            }
            TopDecl::Func(def) => {
                out.push('\n');
                FuncEmitter::new(&mut out, &globals, def.sig.ret.clone()).emit(def);
            }
        }
    }

    out
}

fn emit_extern(out: &mut String, sig: &FuncSig) {
    let params = sig.params.iter().map(|p| param_ll_type(&p.ty)).join(", ");
    writeln!(out, "declare {} @{}({})", ll_type(&sig.ret), sig.name, params).unwrap();
}

// ----------------------------------------------------------------------
// Types and constants
// ----------------------------------------------------------------------

fn ll_type(ty: &Type) -> String {
    match ty {
        Type::Bool => "i1".into(),
        Type::Int => "i32".into(),
        Type::Float => "float".into(),
        Type::Void => "void".into(),
        Type::Array { elem, dims } => ll_array_type(*elem, dims),
    }
}

fn ll_array_type(elem: ElemType, dims: &[u32]) -> String {
    let mut text = ll_type(&elem.as_type());
    for dim in dims.iter().rev() {
        text = format!("[{} x {}]", dim, text);
    }
    text
}

/// Array parameters decay to pointers.
fn param_ll_type(ty: &Type) -> String {
    if ty.is_array() {
        "ptr".into()
    } else {
        ll_type(ty)
    }
}

/// LLVM float constant syntax: plain exponent form when it round-trips
/// exactly, otherwise the hexadecimal bit pattern of the double-widened
/// value (`float` constants are spelled as doubles in textual IR).
fn float_constant(value: f32) -> String {
    let wide = f64::from(value);
    if wide.is_finite() {
        if let Some(text) = exponent_form(wide) {
            return text;
        }
    }
    format!("0x{:016X}", wide.to_bits())
}

fn exponent_form(value: f64) -> Option<String> {
    let formatted = format!("{:e}", value);
    let (mantissa, exponent) = formatted.split_once('e')?;
    let exponent: i32 = exponent.parse().ok()?;
    let (sign, digits) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if frac_part.len() > 6 {
        return None;
    }
    let text = format!(
        "{}{}.{:0<6}e{}{:02}",
        sign,
        int_part,
        frac_part,
        if exponent < 0 { "-" } else { "+" },
        exponent.abs()
    );
    // Only use the decimal spelling when it parses back to the same bits.
    (text.parse::<f64>().ok()? == value).then_some(text)
}

// ----------------------------------------------------------------------
// Per-function emission
// ----------------------------------------------------------------------

/// Where a name lives: its pointer operand, its declared type, and
/// whether the slot holds a decayed array-parameter pointer.
#[derive(Clone)]
struct Slot {
    ptr: String,
    ty: Type,
    param_array: bool,
}

struct FuncEmitter<'a> {
    out: &'a mut String,
    globals: &'a HashMap<String, Type>,
    ret: Type,
    value_counts: HashMap<String, u32>,
    label_counts: HashMap<String, u32>,
    taken_values: HashSet<String>,
    taken_labels: HashSet<String>,
    scopes: Vec<HashMap<String, Slot>>,
    /// Alloca names for every local declaration, in traversal order.
    local_slots: Vec<String>,
    next_local: usize,
    current_label: String,
    terminated: bool,
}

impl<'a> FuncEmitter<'a> {
    fn new(out: &'a mut String, globals: &'a HashMap<String, Type>, ret: Type) -> Self {
        FuncEmitter {
            out,
            globals,
            ret,
            value_counts: HashMap::new(),
            label_counts: HashMap::new(),
            taken_values: HashSet::new(),
            taken_labels: HashSet::new(),
            scopes: Vec::new(),
            local_slots: Vec::new(),
            next_local: 0,
            current_label: String::new(),
            terminated: false,
        }
    }

    fn fresh_value(&mut self, base: &str) -> String {
        loop {
            let count = self.value_counts.entry(base.to_string()).or_insert(0);
            let name = if *count == 0 {
                base.to_string()
            } else {
                format!("{}{}", base, count)
            };
            *count += 1;
            if self.taken_values.insert(name.clone()) {
                return format!("%{}", name);
            }
        }
    }

    fn fresh_label(&mut self, base: &str) -> String {
        loop {
            let count = self.label_counts.entry(base.to_string()).or_insert(0);
            let name = if *count == 0 {
                base.to_string()
            } else {
                format!("{}{}", base, count)
            };
            *count += 1;
            if self.taken_labels.insert(name.clone()) {
                return name;
            }
        }
    }

    fn inst(&mut self, text: String) {
        if !self.terminated {
            writeln!(self.out, "  {}", text).unwrap();
        }
    }

    /// Exactly one terminator per block: anything after the first is
    /// refused until a new label opens.
    fn term(&mut self, text: String) {
        if !self.terminated {
            writeln!(self.out, "  {}", text).unwrap();
            self.terminated = true;
        }
    }

    fn start_block(&mut self, label: &str) {
        writeln!(self.out, "{}:", label).unwrap();
        self.current_label = label.to_string();
        self.terminated = false;
    }

    fn bind(&mut self, name: &str, slot: Slot) {
        self.scopes
            .last_mut()
            .expect("binding outside any scope")
            .insert(name.to_string(), slot);
    }

    fn lookup(&self, name: &str) -> Slot {
        for scope in self.scopes.iter().rev() {
            if let Some(slot) = scope.get(name) {
                return slot.clone();
            }
        }
        let ty = self
            .globals
            .get(name)
            .unwrap_or_else(|| panic!("unresolved name '{}' reached IR generation", name));
        Slot {
            ptr: format!("@{}", name),
            ty: ty.clone(),
            param_array: false,
        }
    }

    // ------------------------------------------------------------------
    // Function skeleton
    // ------------------------------------------------------------------

    fn emit(mut self, def: &FuncDef) {
        let arg_names: Vec<String> = def
            .sig
            .params
            .iter()
            .map(|p| self.fresh_value(&p.name))
            .collect();
        let params = def
            .sig
            .params
            .iter()
            .zip(&arg_names)
            .map(|(p, name)| format!("{} {}", param_ll_type(&p.ty), name))
            .join(", ");
        writeln!(
            self.out,
            "define {} @{}({}) {{",
            ll_type(&def.sig.ret),
            def.sig.name,
            params
        )
        .unwrap();

        self.start_block("entry");
        self.scopes.push(HashMap::new());

        // Parameters spill to stack slots right away.
        for (param, arg_name) in def.sig.params.iter().zip(&arg_names) {
            self.spill_param(param, arg_name);
        }

        // Every local in the body gets its alloca at entry, in the order
        // the declarations will be met again while walking statements.
        let mut locals = Vec::new();
        collect_locals(&def.body.items, &mut locals);
        for (name, ty) in &locals {
            let ptr = self.fresh_value(name);
            self.inst(format!("{} = alloca {}", ptr, ll_type(ty)));
            self.local_slots.push(ptr);
        }

        self.gen_items(&def.body.items);
        self.scopes.pop();

        // An unreachable join block may still be open; close it the same
        // way a missing return would be.
        if !self.terminated {
            let fallback = match &self.ret {
                Type::Void => "ret void".to_string(),
                Type::Int => "ret i32 0".to_string(),
                Type::Bool => "ret i1 false".to_string(),
                Type::Float => format!("ret float {}", float_constant(0.0)),
                Type::Array { .. } => unreachable!("functions cannot return arrays"),
            };
            self.term(fallback);
        }

        writeln!(self.out, "}}").unwrap();
    }

    fn spill_param(&mut self, param: &Param, arg_name: &str) {
        let ptr = self.fresh_value(&param.name);
        if param.ty.is_array() {
            self.inst(format!("{} = alloca ptr", ptr));
            self.inst(format!("store ptr {}, ptr {}", arg_name, ptr));
        } else {
            let ty = ll_type(&param.ty);
            self.inst(format!("{} = alloca {}", ptr, ty));
            self.inst(format!("store {} {}, ptr {}", ty, arg_name, ptr));
        }
        self.bind(
            &param.name,
            Slot {
                ptr,
                ty: param.ty.clone(),
                param_array: param.ty.is_array(),
            },
        );
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn gen_items(&mut self, items: &[BlockItem]) {
        for item in items {
            match item {
                BlockItem::Decl(decl) => self.gen_decl(decl),
                BlockItem::Stmt(stmt) => self.gen_stmt(stmt),
            }
        }
    }

    fn gen_decl(&mut self, decl: &VarDecl) {
        // The alloca was emitted at entry; here the name merely comes
        // into scope.
        let ptr = self.local_slots[self.next_local].clone();
        self.next_local += 1;
        self.bind(
            &decl.name,
            Slot { ptr, ty: decl.ty.clone(), param_array: false },
        );
    }

    fn gen_stmt(&mut self, stmt: &Stmt) {
        if self.terminated {
            // Unreachable statement: emit nothing, but keep the entry
            // alloca cursor aligned with the declarations it skips.
            self.next_local += count_decls_stmt(stmt);
            return;
        }
        match &stmt.kind {
            StmtKind::Block(block) => {
                self.scopes.push(HashMap::new());
                self.gen_items(&block.items);
                self.scopes.pop();
            }
            StmtKind::Expr(expr) => {
                self.gen_expr(expr);
            }
            StmtKind::Assign { target, value } => self.gen_assign(target, value),
            StmtKind::If { cond, then_branch, else_branch } => {
                self.gen_if(cond, then_branch, else_branch.as_deref())
            }
            StmtKind::While { cond, body } => self.gen_while(cond, body),
            StmtKind::Return(value) => self.gen_return(value.as_ref()),
            StmtKind::Empty => {}
        }
    }

    fn gen_assign(&mut self, target: &Expr, value: &Expr) {
        let operand = self.gen_expr(value);
        match &target.kind {
            ExprKind::Ident(name) => {
                let slot = self.lookup(name);
                self.inst(format!(
                    "store {} {}, ptr {}",
                    ll_type(&slot.ty),
                    operand,
                    slot.ptr
                ));
            }
            ExprKind::Index { name, indices } => {
                let elem = ll_type(expr_ty(target));
                let addr = self.gen_element_ptr(name, indices);
                self.inst(format!("store {} {}, ptr {}", elem, operand, addr));
            }
            _ => panic!("assignment target is not an lvalue in IR generation"),
        }
    }

    fn gen_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        let flag = self.gen_expr(cond);
        let then_label = self.fresh_label("then");
        let else_label = else_branch.map(|_| self.fresh_label("else"));
        let cont_label = self.fresh_label("ifcont");

        let false_target = else_label.as_deref().unwrap_or(&cont_label);
        self.term(format!(
            "br i1 {}, label %{}, label %{}",
            flag, then_label, false_target
        ));

        self.start_block(&then_label);
        self.gen_stmt(then_branch);
        self.term(format!("br label %{}", cont_label));

        if let (Some(else_label), Some(else_branch)) = (else_label, else_branch) {
            self.start_block(&else_label);
            self.gen_stmt(else_branch);
            self.term(format!("br label %{}", cont_label));
        }

        self.start_block(&cont_label);
    }

    fn gen_while(&mut self, cond: &Expr, body: &Stmt) {
        let loop_label = self.fresh_label("loop");
        let body_label = self.fresh_label("body");
        let after_label = self.fresh_label("afterloop");

        self.term(format!("br label %{}", loop_label));

        self.start_block(&loop_label);
        let flag = self.gen_expr(cond);
        self.term(format!(
            "br i1 {}, label %{}, label %{}",
            flag, body_label, after_label
        ));

        self.start_block(&body_label);
        self.gen_stmt(body);
        self.term(format!("br label %{}", loop_label));

        self.start_block(&after_label);
    }

    fn gen_return(&mut self, value: Option<&Expr>) {
        match value {
            None => self.term("ret void".to_string()),
            Some(expr) => {
                let operand = self.gen_expr(expr);
                let ty = ll_type(expr_ty(expr));
                self.term(format!("ret {} {}", ty, operand));
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Returns the operand text for the expression's value: a constant,
    /// or the `%name` of the instruction that produced it.
    fn gen_expr(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::IntLit(value) => value.to_string(),
            ExprKind::FloatLit(value) => float_constant(*value),
            ExprKind::BoolLit(value) => value.to_string(),
            ExprKind::Ident(name) => self.gen_ident(name),
            ExprKind::Index { name, indices } => {
                let elem = ll_type(expr_ty(expr));
                let addr = self.gen_element_ptr(name, indices);
                let loaded = self.fresh_value(name);
                self.inst(format!("{} = load {}, ptr {}", loaded, elem, addr));
                loaded
            }
            ExprKind::Call { callee, args } => self.gen_call(expr, callee, args),
            ExprKind::Unary { op, operand } => self.gen_unary(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_logical() {
                    self.gen_short_circuit(*op, lhs, rhs)
                } else {
                    self.gen_binary(*op, lhs, rhs)
                }
            }
            ExprKind::Coerce { kind, inner } => self.gen_coerce(*kind, inner),
        }
    }

    fn gen_ident(&mut self, name: &str) -> String {
        let slot = self.lookup(name);
        if slot.param_array {
            // The slot holds the decayed pointer, not the array.
            let loaded = self.fresh_value(name);
            self.inst(format!("{} = load ptr, ptr {}", loaded, slot.ptr));
            return loaded;
        }
        if slot.ty.is_array() {
            // Arrays appear bare only as call arguments; pass the slot.
            return slot.ptr;
        }
        let loaded = self.fresh_value(name);
        self.inst(format!(
            "{} = load {}, ptr {}",
            loaded,
            ll_type(&slot.ty),
            slot.ptr
        ));
        loaded
    }

    fn gen_call(&mut self, expr: &Expr, callee: &str, args: &[Expr]) -> String {
        let operands: Vec<String> = args.iter().map(|arg| self.gen_expr(arg)).collect();
        let arg_list = args
            .iter()
            .zip(&operands)
            .map(|(arg, op)| format!("{} {}", param_ll_type(expr_ty(arg)), op))
            .join(", ");
        let ret = expr_ty(expr);
        if *ret == Type::Void {
            self.inst(format!("call void @{}({})", callee, arg_list));
            return String::new();
        }
        let result = self.fresh_value("calltmp");
        self.inst(format!(
            "{} = call {} @{}({})",
            result,
            ll_type(ret),
            callee,
            arg_list
        ));
        result
    }

    fn gen_unary(&mut self, op: UnaryOp, operand: &Expr) -> String {
        let value = self.gen_expr(operand);
        match op {
            UnaryOp::Neg => {
                let result = self.fresh_value("negtmp");
                match expr_ty(operand) {
                    Type::Float => {
                        self.inst(format!("{} = fneg float {}", result, value));
                    }
                    _ => {
                        self.inst(format!("{} = sub i32 0, {}", result, value));
                    }
                }
                result
            }
            UnaryOp::Not => {
                let result = self.fresh_value("nottmp");
                self.inst(format!("{} = xor i1 {}, true", result, value));
                result
            }
        }
    }

    /// `&&`/`||`: the right operand runs in its own block and is skipped
    /// entirely when the left value already decides the outcome; the
    /// join block merges with a `phi i1`.
    fn gen_short_circuit(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> String {
        let left = self.gen_expr(lhs);
        let left_block = self.current_label.clone();

        let (rhs_base, cont_base, phi_base, short_value) = match op {
            BinOp::And => ("andrhs", "andcont", "andtmp", "false"),
            BinOp::Or => ("orrhs", "orcont", "ortmp", "true"),
            _ => unreachable!("not a logical operator"),
        };
        let rhs_label = self.fresh_label(rhs_base);
        let cont_label = self.fresh_label(cont_base);

        match op {
            BinOp::And => self.term(format!(
                "br i1 {}, label %{}, label %{}",
                left, rhs_label, cont_label
            )),
            _ => self.term(format!(
                "br i1 {}, label %{}, label %{}",
                left, cont_label, rhs_label
            )),
        }

        self.start_block(&rhs_label);
        let right = self.gen_expr(rhs);
        let rhs_block = self.current_label.clone();
        self.term(format!("br label %{}", cont_label));

        self.start_block(&cont_label);
        let result = self.fresh_value(phi_base);
        self.inst(format!(
            "{} = phi i1 [ {}, %{} ], [ {}, %{} ]",
            result, short_value, left_block, right, rhs_block
        ));
        result
    }

    fn gen_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> String {
        let left = self.gen_expr(lhs);
        let right = self.gen_expr(rhs);
        let operand_ty = expr_ty(lhs);

        let (opcode, base) = binary_opcode(op, operand_ty);
        let result = self.fresh_value(base);
        self.inst(format!(
            "{} = {} {} {}, {}",
            result,
            opcode,
            ll_type(operand_ty),
            left,
            right
        ));
        result
    }

    fn gen_coerce(&mut self, kind: CoerceKind, inner: &Expr) -> String {
        let value = self.gen_expr(inner);
        match kind {
            CoerceKind::IntToFloat => {
                let result = self.fresh_value("conv");
                self.inst(format!("{} = sitofp i32 {} to float", result, value));
                result
            }
            CoerceKind::BoolToInt => {
                let result = self.fresh_value("booltmp");
                self.inst(format!("{} = zext i1 {} to i32", result, value));
                result
            }
            CoerceKind::IntToBool => {
                let result = self.fresh_value("tobool");
                self.inst(format!("{} = icmp ne i32 {}, 0", result, value));
                result
            }
            CoerceKind::FloatToBool => {
                let result = self.fresh_value("tobool");
                self.inst(format!(
                    "{} = fcmp one float {}, {}",
                    result,
                    value,
                    float_constant(0.0)
                ));
                result
            }
        }
    }

    /// Address of an array element. Local and global arrays index the
    /// aggregate directly (leading zero); array parameters load the
    /// decayed pointer and index through it.
    fn gen_element_ptr(&mut self, name: &str, indices: &[Expr]) -> String {
        let slot = self.lookup(name);
        let Type::Array { elem, dims } = &slot.ty else {
            panic!("indexing a non-array in IR generation");
        };
        let index_ops: Vec<String> = indices.iter().map(|i| self.gen_expr(i)).collect();

        let result = self.fresh_value("arrayidx");
        if slot.param_array {
            let base = self.fresh_value(name);
            self.inst(format!("{} = load ptr, ptr {}", base, slot.ptr));
            let pointee = if dims.len() == 1 {
                ll_type(&elem.as_type())
            } else {
                ll_array_type(*elem, &dims[1..])
            };
            let index_list = index_ops.iter().map(|op| format!("i32 {}", op)).join(", ");
            self.inst(format!(
                "{} = getelementptr inbounds {}, ptr {}, {}",
                result, pointee, base, index_list
            ));
        } else {
            let index_list = index_ops.iter().map(|op| format!("i32 {}", op)).join(", ");
            self.inst(format!(
                "{} = getelementptr inbounds {}, ptr {}, i32 0, {}",
                result,
                ll_array_type(*elem, dims),
                slot.ptr,
                index_list
            ));
        }
        result
    }
}

// ----------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------

fn expr_ty(expr: &Expr) -> &Type {
    expr.ty
        .as_ref()
        .expect("untyped expression reached IR generation")
}

fn binary_opcode(op: BinOp, operand_ty: &Type) -> (&'static str, &'static str) {
    let is_float = *operand_ty == Type::Float;
    match op {
        BinOp::Add => (if is_float { "fadd" } else { "add" }, "addtmp"),
        BinOp::Sub => (if is_float { "fsub" } else { "sub" }, "subtmp"),
        BinOp::Mul => (if is_float { "fmul" } else { "mul" }, "multmp"),
        BinOp::Div => (if is_float { "fdiv" } else { "sdiv" }, "divtmp"),
        BinOp::Rem => ("srem", "remtmp"),
        BinOp::Lt => (if is_float { "fcmp olt" } else { "icmp slt" }, "cmptmp"),
        BinOp::LtEq => (if is_float { "fcmp ole" } else { "icmp sle" }, "cmptmp"),
        BinOp::Gt => (if is_float { "fcmp ogt" } else { "icmp sgt" }, "cmptmp"),
        BinOp::GtEq => (if is_float { "fcmp oge" } else { "icmp sge" }, "cmptmp"),
        BinOp::Eq => (if is_float { "fcmp oeq" } else { "icmp eq" }, "cmptmp"),
        BinOp::NotEq => (if is_float { "fcmp one" } else { "icmp ne" }, "cmptmp"),
        BinOp::And | BinOp::Or => unreachable!("logical operators lower to branches"),
    }
}

/// Declarations in the order `gen_items` will meet them again.
fn collect_locals(items: &[BlockItem], out: &mut Vec<(String, Type)>) {
    for item in items {
        match item {
            BlockItem::Decl(decl) => out.push((decl.name.clone(), decl.ty.clone())),
            BlockItem::Stmt(stmt) => collect_locals_stmt(stmt, out),
        }
    }
}

fn collect_locals_stmt(stmt: &Stmt, out: &mut Vec<(String, Type)>) {
    match &stmt.kind {
        StmtKind::Block(block) => collect_locals(&block.items, out),
        StmtKind::If { then_branch, else_branch, .. } => {
            collect_locals_stmt(then_branch, out);
            if let Some(else_branch) = else_branch {
                collect_locals_stmt(else_branch, out);
            }
        }
        StmtKind::While { body, .. } => collect_locals_stmt(body, out),
        _ => {}
    }
}

fn count_decls_stmt(stmt: &Stmt) -> usize {
    let mut locals = Vec::new();
    collect_locals_stmt(stmt, &mut locals);
    locals.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::typeck;

    fn emit(source: &str) -> String {
        let mut diags = Diagnostics::new();
        let tokens = Lexer::new(source, &mut diags).tokenize();
        let mut program = Parser::new(tokens, &mut diags).parse_program();
        typeck::check(&mut program, &mut diags);
        let messages: Vec<_> = diags.iter().map(|d| d.message.clone()).collect();
        assert!(messages.is_empty(), "unexpected diagnostics: {:?}", messages);
        emit_program(&program)
    }

    #[test]
    fn module_header_is_fixed() {
        let ir = emit("int main() { return 0; }");
        assert!(ir.starts_with("; ModuleID = 'mini-c'\nsource_filename = \"mini-c\"\n"));
    }

    #[test]
    fn globals_are_zeroinitialized() {
        let ir = emit("int x; float m[3][4];");
        assert!(ir.contains("@x = global i32 zeroinitializer"), "{}", ir);
        assert!(
            ir.contains("@m = global [3 x [4 x float]] zeroinitializer"),
            "{}",
            ir
        );
    }

    #[test]
    fn extern_becomes_declare() {
        let ir = emit("extern void print_int(int n);");
        assert!(ir.contains("declare void @print_int(i32)"), "{}", ir);
    }

    #[test]
    fn parameters_are_spilled_at_entry() {
        let ir = emit("int id(int n) { return n; }");
        assert!(ir.contains("define i32 @id(i32 %n) {"), "{}", ir);
        assert!(ir.contains("entry:"), "{}", ir);
        assert!(ir.contains("%n1 = alloca i32"), "{}", ir);
        assert!(ir.contains("store i32 %n, ptr %n1"), "{}", ir);
        assert!(ir.contains("%n2 = load i32, ptr %n1"), "{}", ir);
        assert!(ir.contains("ret i32 %n2"), "{}", ir);
    }

    #[test]
    fn locals_load_with_bare_name_first() {
        let ir = emit("int f() { int i; i = 3; return i; }");
        assert!(ir.contains("%i = alloca i32"), "{}", ir);
        assert!(ir.contains("store i32 3, ptr %i"), "{}", ir);
        assert!(ir.contains("%i1 = load i32, ptr %i"), "{}", ir);
    }

    #[test]
    fn while_loop_uses_loop_body_afterloop() {
        let ir = emit(
            "int factorial(int n) {\n\
             int result;\n\
             int i;\n\
             result = 1;\n\
             i = 1;\n\
             while (i <= n) {\n\
             result = result * i;\n\
             i = i + 1;\n\
             }\n\
             return result;\n\
             }",
        );
        assert!(ir.contains("br label %loop"), "{}", ir);
        assert!(ir.contains("loop:"), "{}", ir);
        assert!(ir.contains("br i1 %cmptmp, label %body, label %afterloop"), "{}", ir);
        assert!(ir.contains("body:"), "{}", ir);
        assert!(ir.contains("afterloop:"), "{}", ir);
        assert!(ir.contains("%multmp = mul i32"), "{}", ir);
        assert!(ir.contains("icmp sle i32"), "{}", ir);
    }

    #[test]
    fn nested_whiles_get_numbered_labels() {
        let ir = emit(
            "void f(int n) { while (n > 0) { while (n > 1) { n = n - 1; } n = n - 1; } }",
        );
        assert!(ir.contains("loop:"), "{}", ir);
        assert!(ir.contains("loop1:"), "{}", ir);
        assert!(ir.contains("afterloop1:"), "{}", ir);
    }

    #[test]
    fn if_else_uses_then_else_ifcont() {
        let ir = emit("int sign(int n) { if (n < 0) return 0 - 1; else return 1; }");
        assert!(ir.contains("br i1 %cmptmp, label %then, label %else"), "{}", ir);
        assert!(ir.contains("then:"), "{}", ir);
        assert!(ir.contains("else:"), "{}", ir);
        assert!(ir.contains("ifcont:"), "{}", ir);
    }

    #[test]
    fn if_without_else_branches_to_ifcont() {
        let ir = emit("void f(int n) { if (n) n = 0; }");
        assert!(ir.contains("label %then, label %ifcont"), "{}", ir);
    }

    #[test]
    fn condition_int_is_zero_tested() {
        let ir = emit("void f(int n) { if (n) n = 0; }");
        assert!(ir.contains("%tobool = icmp ne i32 %n2, 0"), "{}", ir);
    }

    #[test]
    fn condition_float_is_zero_tested() {
        let ir = emit("void f(float x) { while (x) x = 0.0; }");
        assert!(ir.contains("fcmp one float %x2, 0.000000e+00"), "{}", ir);
    }

    #[test]
    fn unary_minus_on_int_subtracts_from_zero() {
        let ir = emit("int f(int n) { return -n; }");
        assert!(ir.contains("%negtmp = sub i32 0, %n2"), "{}", ir);
    }

    #[test]
    fn unary_minus_on_float_is_fneg() {
        let ir = emit("float f(float x) { return -x; }");
        assert!(ir.contains("%negtmp = fneg float %x2"), "{}", ir);
    }

    #[test]
    fn not_is_xor_with_true() {
        let ir = emit("bool f(bool b) { return !b; }");
        assert!(ir.contains("%nottmp = xor i1 %b2, true"), "{}", ir);
    }

    #[test]
    fn widening_return_emits_sitofp() {
        let ir = emit("float get_float() { int x; x = 42; return x; }");
        assert!(ir.contains("%conv = sitofp i32 %x1 to float"), "{}", ir);
        assert!(ir.contains("ret float %conv"), "{}", ir);
    }

    #[test]
    fn bool_widens_with_zext() {
        let ir = emit("int f(bool b) { int x; x = b; return x; }");
        assert!(ir.contains("%booltmp = zext i1 %b2 to i32"), "{}", ir);
    }

    #[test]
    fn float_arithmetic_uses_f_opcodes() {
        let ir = emit("float f(float a, float b) { return a / b + a * b - a; }");
        assert!(ir.contains("fdiv float"), "{}", ir);
        assert!(ir.contains("fmul float"), "{}", ir);
        assert!(ir.contains("fadd float"), "{}", ir);
        assert!(ir.contains("fsub float"), "{}", ir);
    }

    #[test]
    fn modulo_is_srem() {
        let ir = emit("int f(int a, int b) { return a % b; }");
        assert!(ir.contains("%remtmp = srem i32"), "{}", ir);
    }

    #[test]
    fn short_circuit_and_branches_around_rhs() {
        let ir = emit(
            "extern int side_effect();\n\
             int f(int x) { int result; result = x && side_effect(); return result; }",
        );
        assert!(ir.contains("br i1 %tobool, label %andrhs, label %andcont"), "{}", ir);
        // The call happens only inside the right-operand block.
        let rhs_block = ir.split("andrhs:").nth(1).unwrap();
        let rhs_body = rhs_block.split("andcont:").next().unwrap();
        assert!(rhs_body.contains("call i32 @side_effect()"), "{}", ir);
        assert!(ir.contains("%andtmp = phi i1 [ false, %entry ], [ %tobool1, %andrhs ]"), "{}", ir);
    }

    #[test]
    fn short_circuit_or_skips_rhs_when_true() {
        let ir = emit("bool f(bool a, bool b) { return a || b; }");
        assert!(ir.contains("br i1 %a2, label %orcont, label %orrhs"), "{}", ir);
        assert!(ir.contains("%ortmp = phi i1 [ true, %entry ], [ %b2, %orrhs ]"), "{}", ir);
    }

    #[test]
    fn assignment_result_feeds_phi_from_nested_blocks() {
        // Nested short-circuits must name the block the value actually
        // arrives from, not the block the expression started in.
        let ir = emit("bool f(bool a, bool b, bool c) { return a && (b || c); }");
        assert!(ir.contains("%andtmp = phi i1 [ false, %entry ], [ %ortmp, %orcont ]"), "{}", ir);
    }

    #[test]
    fn void_call_has_no_result_name() {
        let ir = emit("extern void log_value(int v);\nvoid f() { log_value(3); }");
        assert!(ir.contains("  call void @log_value(i32 3)"), "{}", ir);
    }

    #[test]
    fn call_with_widened_argument() {
        let ir = emit("extern float sqrtf(float x);\nfloat f() { return sqrtf(2); }");
        assert!(ir.contains("%conv = sitofp i32 2 to float"), "{}", ir);
        assert!(ir.contains("%calltmp = call float @sqrtf(float %conv)"), "{}", ir);
    }

    #[test]
    fn local_array_indexes_through_aggregate() {
        let ir = emit("int f() { int a[4]; a[2] = 7; return a[2]; }");
        assert!(ir.contains("%a = alloca [4 x i32]"), "{}", ir);
        assert!(
            ir.contains("%arrayidx = getelementptr inbounds [4 x i32], ptr %a, i32 0, i32 2"),
            "{}",
            ir
        );
        assert!(ir.contains("store i32 7, ptr %arrayidx"), "{}", ir);
    }

    #[test]
    fn array_parameter_loads_decayed_pointer() {
        let ir = emit("int first(int a[8]) { return a[0]; }");
        assert!(ir.contains("define i32 @first(ptr %a) {"), "{}", ir);
        assert!(ir.contains("%a1 = alloca ptr"), "{}", ir);
        assert!(ir.contains("store ptr %a, ptr %a1"), "{}", ir);
        assert!(ir.contains("%a2 = load ptr, ptr %a1"), "{}", ir);
        assert!(
            ir.contains("%arrayidx = getelementptr inbounds i32, ptr %a2, i32 0"),
            "{}",
            ir
        );
    }

    #[test]
    fn matrix_parameter_drops_first_dimension() {
        let ir = emit("float get(float m[3][4], int i, int j) { return m[i][j]; }");
        assert!(
            ir.contains("getelementptr inbounds [4 x float], ptr %m2, i32 %i2, i32 %j2"),
            "{}",
            ir
        );
    }

    #[test]
    fn global_scalar_loads_through_at_name() {
        let ir = emit("int counter; int f() { counter = counter + 1; return counter; }");
        assert!(ir.contains("%counter = load i32, ptr @counter"), "{}", ir);
        assert!(ir.contains("store i32 %addtmp, ptr @counter"), "{}", ir);
    }

    #[test]
    fn array_argument_passes_pointer() {
        let ir = emit(
            "int sum(int a[4]) { return a[0]; }\n\
             int m[4];\n\
             int f() { return sum(m); }",
        );
        assert!(ir.contains("%calltmp = call i32 @sum(ptr @m)"), "{}", ir);
    }

    #[test]
    fn missing_return_falls_back_to_zero() {
        let ir = emit("int f(int n) { n = n + 1; }");
        assert!(ir.contains("ret i32 0"), "{}", ir);
    }

    #[test]
    fn mutual_recursion_matches_expected_shape() {
        let ir = emit(
            "int odd(int n);\n\
             int even(int n) { if (n == 0) return 1; return odd(n - 1); }\n\
             int odd(int n) { if (n == 0) return 0; return even(n - 1); }\n\
             int main() { return even(10); }",
        );
        assert!(ir.contains("define i32 @even(i32 %n) {"), "{}", ir);
        assert!(ir.contains("define i32 @odd(i32 %n) {"), "{}", ir);
        assert!(ir.contains("%cmptmp = icmp eq i32 %n2, 0"), "{}", ir);
        assert!(ir.contains("%calltmp = call i32 @odd(i32 %subtmp)"), "{}", ir);
        assert!(ir.contains("%calltmp = call i32 @even(i32 10)"), "{}", ir);
    }

    #[test]
    fn statements_after_return_are_not_emitted() {
        let ir = emit("int f() { return 1; return 2; }");
        assert!(ir.contains("ret i32 1"), "{}", ir);
        assert!(!ir.contains("ret i32 2"), "{}", ir);
    }

    #[test]
    fn each_block_has_one_terminator() {
        let ir = emit(
            "int abs(int n) { if (n < 0) { return -n; } else { return n; } }",
        );
        for block in ir.split("\n\n").filter(|b| b.contains("define")) {
            let body = block
                .split_once("entry:")
                .map(|(_, rest)| rest)
                .unwrap_or(block);
            for section in body.split(':') {
                let terminators = section
                    .lines()
                    .filter(|l| {
                        let l = l.trim();
                        l.starts_with("br ") || l.starts_with("ret ")
                    })
                    .count();
                assert!(terminators <= 1, "block with multiple terminators: {}", section);
            }
        }
    }

    #[test]
    fn float_literals_round_trip_or_use_hex() {
        let ir = emit("float f() { return 3.14; }");
        assert!(ir.contains("ret float 0x"), "{}", ir);
        let ir = emit("float f() { return 1.5; }");
        assert!(ir.contains("ret float 1.500000e+00"), "{}", ir);
    }

    #[test]
    fn emission_is_deterministic() {
        let source = "int g;\n\
                      extern int read_int();\n\
                      int f(int n) { int i; i = 0; while (i < n) { g = g + i; i = i + 1; } return g; }\n\
                      int main() { return f(read_int()); }";
        assert_eq!(emit(source), emit(source));
    }
}
