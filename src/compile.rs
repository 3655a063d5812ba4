//! End-to-end compilation pipeline: MiniC source → textual LLVM IR.
//!
//! The phases share one diagnostic sink and every phase runs as far as
//! it can; IR emission happens only when the sink stayed empty.

use std::fs;
use std::path::Path;

use crate::codegen::emit_program;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::typeck;

/// Compiles MiniC source to LLVM IR text. On failure the diagnostics
/// come back sorted by source position, ready to render.
pub fn compile(source: &str) -> Result<String, Vec<Diagnostic>> {
    let mut diags = Diagnostics::new();
    let tokens = Lexer::new(source, &mut diags).tokenize();
    let mut program = Parser::new(tokens, &mut diags).parse_program();
    typeck::check(&mut program, &mut diags);
    if diags.has_errors() {
        return Err(diags.into_sorted());
    }
    Ok(emit_program(&program))
}

/// Compiles a MiniC source file.
pub fn compile_file(path: &Path) -> Result<String, CompileError> {
    let source = fs::read_to_string(path).map_err(|e| CompileError::Io(e.to_string()))?;
    compile(&source).map_err(|diags| CompileError::Source { source, diags })
}

/// Errors that can occur during compilation.
#[derive(Debug)]
pub enum CompileError {
    /// The source had errors; the text is kept for rendering.
    Source {
        source: String,
        diags: Vec<Diagnostic>,
    },
    Io(String),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Source { diags, .. } => write!(
                f,
                "{} error{} generated",
                diags.len(),
                if diags.len() == 1 { "" } else { "s" }
            ),
            CompileError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_produces_ir_for_valid_source() {
        let ir = compile("int main() { return 0; }").unwrap();
        assert!(ir.contains("define i32 @main()"));
        assert!(ir.contains("ret i32 0"));
    }

    #[test]
    fn compile_collects_errors_across_phases() {
        // One lexical error, one type error: both surface in one run.
        let result = compile("int f() { @ return 1.5; }");
        let diags = result.unwrap_err();
        assert_eq!(diags.len(), 2);
        // Sorted by source position.
        assert!(diags[0].span.start <= diags[1].span.start);
    }

    #[test]
    fn no_ir_when_any_diagnostic_exists() {
        assert!(compile("float f; int i; int main() { i = f; return i; }").is_err());
    }
}
