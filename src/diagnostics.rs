//! Diagnostic collection and rendering.
//!
//! Every phase reports into one [`Diagnostics`] sink; nothing aborts on
//! the first error. IR generation is skipped whenever the sink is
//! non-empty, and the sink is flushed in source order at the end.

use crate::source::SourceFile;
use crate::style::Style;
use crate::token::Span;

/// Category of a diagnostic. The wording users see lives in the
/// `message` field; the kind is what tests and tools dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    // Lexical
    LexError,

    // Syntactic
    UnexpectedToken,
    ExpectedLValue,
    UnbalancedDelimiter,
    NestedFunction,
    MissingParamType,
    MissingReturnType,

    // Scope
    Duplicate,
    Undefined,
    NotCallable,
    NotAnArray,
    ParamNameCollision,

    // Type
    VoidVariable,
    VoidReturnsValue,
    MissingReturnValue,
    ArgCountMismatch,
    NonIntegerModulo,
    NonIntegerIndex,
    ArrayDimMismatch,
    NarrowingError,
    TypeMismatch,
    InvalidUnaryOperand,

    // Invariant
    InternalError,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
    pub message: String,
    /// Points at a prior declaration for duplicate reports.
    pub secondary: Option<(Span, String)>,
    /// A "did you mean" style hint.
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            span,
            message: message.into(),
            secondary: None,
            help: None,
        }
    }

    pub fn with_secondary(mut self, span: Span, note: impl Into<String>) -> Self {
        self.secondary = Some((span, note.into()));
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Renders `error: <message>` followed by the offending source line
    /// with a caret underline, plus any note and help lines.
    pub fn render(&self, file: &SourceFile) -> String {
        let (line_num, col) = file.line_col(self.span.start);
        let line_content = file.line_text(line_num);
        let len = self.span.len().max(1);
        let underline = format!("{}{}", " ".repeat(col - 1), "^".repeat(len));

        let error_label = Style::bold_red("error");
        let line_num_str = Style::blue(&format!("{:4}", line_num));
        let pipe = Style::blue("|");

        let mut result = format!(
            "{}: {}\n{} {} {}\n     {} {}",
            error_label,
            self.message,
            line_num_str,
            pipe,
            line_content,
            pipe,
            Style::red(&underline)
        );

        if let Some((span, note)) = &self.secondary {
            let (note_line, _) = file.line_col(span.start);
            result.push_str(&format!(
                "\n     {} {}: {} (line {})",
                pipe,
                Style::cyan("note"),
                note,
                note_line
            ));
        }

        if let Some(help) = &self.help {
            result.push_str(&format!("\n     {} {}: {}", pipe, Style::cyan("help"), help));
        }

        result
    }
}

/// Append-only sink threaded through the lexer, parser, and checker.
#[derive(Debug, Default)]
pub struct Diagnostics {
    list: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.list.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.list.is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.list.iter()
    }

    /// Diagnostics in stable source order, ready to print.
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.list.sort_by_key(|d| d.span.start);
        self.list
    }
}
