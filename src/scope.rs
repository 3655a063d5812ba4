//! Lexical scopes and the global namespace.
//!
//! A stack of block frames over one flat global namespace. Function
//! parameters form the outermost frame of their body. Shadowing an outer
//! name is permitted; redeclaring at the same level is not, and the
//! offender gets the prior declaration's span for the diagnostic.

use std::collections::HashMap;

use crate::ast::Type;
use crate::token::Span;

#[derive(Debug, Clone)]
pub struct VarEntry {
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FuncEntry {
    pub ret: Type,
    pub params: Vec<Type>,
    pub span: Span,
    /// True once a body has been seen; extern and forward declarations
    /// leave this false.
    pub defined: bool,
}

#[derive(Debug, Clone)]
pub enum GlobalEntry {
    Var(VarEntry),
    Func(FuncEntry),
}

impl GlobalEntry {
    pub fn span(&self) -> Span {
        match self {
            GlobalEntry::Var(v) => v.span,
            GlobalEntry::Func(f) => f.span,
        }
    }
}

/// Global (name → decl) mapping plus the stack of block frames.
#[derive(Debug, Default)]
pub struct SymbolTable {
    globals: HashMap<String, GlobalEntry>,
    scopes: Vec<HashMap<String, VarEntry>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn leave_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declares in the innermost frame. Refuses a name already present
    /// at that level and returns the prior span.
    pub fn declare_in_current(&mut self, name: &str, entry: VarEntry) -> Result<(), Span> {
        let scope = self
            .scopes
            .last_mut()
            .expect("declare_in_current outside any scope");
        if let Some(prior) = scope.get(name) {
            return Err(prior.span);
        }
        scope.insert(name.to_string(), entry);
        Ok(())
    }

    /// Declares a global variable or function. Functions and globals
    /// share one namespace, so any prior entry is a conflict.
    pub fn declare_global(&mut self, name: &str, entry: GlobalEntry) -> Result<(), Span> {
        if let Some(prior) = self.globals.get(name) {
            return Err(prior.span());
        }
        self.globals.insert(name.to_string(), entry);
        Ok(())
    }

    /// Replaces an existing global entry (used when a definition
    /// completes a compatible forward declaration).
    pub fn replace_global(&mut self, name: &str, entry: GlobalEntry) {
        self.globals.insert(name.to_string(), entry);
    }

    pub fn lookup_global(&self, name: &str) -> Option<&GlobalEntry> {
        self.globals.get(name)
    }

    /// Searches frames inner-to-outer, then the global namespace.
    pub fn lookup_var(&self, name: &str) -> Option<&VarEntry> {
        for scope in self.scopes.iter().rev() {
            if let Some(entry) = scope.get(name) {
                return Some(entry);
            }
        }
        match self.globals.get(name) {
            Some(GlobalEntry::Var(entry)) => Some(entry),
            _ => None,
        }
    }

    pub fn lookup_func(&self, name: &str) -> Option<&FuncEntry> {
        match self.globals.get(name) {
            Some(GlobalEntry::Func(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Every variable name visible at the current point, sorted for
    /// deterministic "did you mean" hints.
    pub fn visible_var_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .scopes
            .iter()
            .flat_map(|scope| scope.keys().cloned())
            .chain(self.globals.iter().filter_map(|(name, entry)| {
                matches!(entry, GlobalEntry::Var(_)).then(|| name.clone())
            }))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .globals
            .iter()
            .filter_map(|(name, entry)| {
                matches!(entry, GlobalEntry::Func(_)).then(|| name.clone())
            })
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(ty: Type, start: usize) -> VarEntry {
        VarEntry { ty, span: Span::new(start, start + 1) }
    }

    #[test]
    fn lookup_searches_inner_to_outer() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_in_current("x", var(Type::Int, 0)).unwrap();
        table.enter_scope();
        table.declare_in_current("x", var(Type::Float, 10)).unwrap();

        assert_eq!(table.lookup_var("x").unwrap().ty, Type::Float);
        table.leave_scope();
        assert_eq!(table.lookup_var("x").unwrap().ty, Type::Int);
    }

    #[test]
    fn same_level_redeclaration_is_refused() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_in_current("n", var(Type::Int, 4)).unwrap();
        let prior = table.declare_in_current("n", var(Type::Int, 20)).unwrap_err();
        assert_eq!(prior, Span::new(4, 5));
    }

    #[test]
    fn inner_shadowing_is_permitted() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        table.declare_in_current("n", var(Type::Int, 0)).unwrap();
        table.enter_scope();
        assert!(table.declare_in_current("n", var(Type::Bool, 8)).is_ok());
    }

    #[test]
    fn globals_are_found_after_scopes() {
        let mut table = SymbolTable::new();
        table
            .declare_global("g", GlobalEntry::Var(var(Type::Float, 0)))
            .unwrap();
        table.enter_scope();
        assert_eq!(table.lookup_var("g").unwrap().ty, Type::Float);
    }

    #[test]
    fn functions_and_globals_share_a_namespace() {
        let mut table = SymbolTable::new();
        table
            .declare_global("f", GlobalEntry::Var(var(Type::Int, 0)))
            .unwrap();
        let clash = table.declare_global(
            "f",
            GlobalEntry::Func(FuncEntry {
                ret: Type::Void,
                params: vec![],
                span: Span::new(9, 10),
                defined: false,
            }),
        );
        assert!(clash.is_err());
    }

    #[test]
    fn function_lookup_ignores_variables() {
        let mut table = SymbolTable::new();
        table
            .declare_global("x", GlobalEntry::Var(var(Type::Int, 0)))
            .unwrap();
        assert!(table.lookup_func("x").is_none());
        assert!(table.lookup_var("x").is_some());
    }

    #[test]
    fn visible_names_are_sorted_and_deduped() {
        let mut table = SymbolTable::new();
        table
            .declare_global("beta", GlobalEntry::Var(var(Type::Int, 0)))
            .unwrap();
        table.enter_scope();
        table.declare_in_current("alpha", var(Type::Int, 4)).unwrap();
        table.enter_scope();
        table.declare_in_current("alpha", var(Type::Int, 9)).unwrap();
        assert_eq!(table.visible_var_names(), vec!["alpha", "beta"]);
    }
}
