//! mccomp: a compiler front-end and code generator for MiniC, a small
//! statically-typed subset of C.
//!
//! The pipeline is a straight line: the [`lexer`] turns one source file
//! into tokens, the [`parser`] builds a typed-later AST with panic-mode
//! recovery, the [`typeck`] pass resolves scopes and inserts explicit
//! coercion nodes for MiniC's asymmetric widening rule, and [`codegen`]
//! lowers the decorated tree to textual LLVM IR in `alloca`/`load`/
//! `store` form. All phases report into one [`diagnostics::Diagnostics`]
//! sink; any diagnostic suppresses emission.

pub mod ast;
pub mod cli;
pub mod codegen;
pub mod compile;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod source;
pub mod style;
pub mod suggest;
pub mod token;
pub mod typeck;

pub use compile::{compile, compile_file, CompileError};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use lexer::Lexer;
pub use parser::Parser;
pub use source::SourceFile;
pub use token::{Span, Token, TokenType};
