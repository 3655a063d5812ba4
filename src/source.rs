use crate::token::Span;

/// Owns the source text of one compilation and maps byte offsets to
/// one-based (line, column) positions.
pub struct SourceFile {
    text: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        SourceFile { text, line_starts }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// One-based (line, column) of a byte offset. Offsets past the end
    /// map to the position just after the last character.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }

    /// The full text of a one-based line, without its newline.
    pub fn line_text(&self, line: usize) -> &str {
        let start = self.line_starts[line - 1];
        let end = self
            .line_starts
            .get(line)
            .map(|&next| next - 1)
            .unwrap_or(self.text.len());
        &self.text[start..end]
    }

    pub fn slice(&self, span: Span) -> &str {
        &self.text[span.start.min(self.text.len())..span.end.min(self.text.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_offset_is_line_one_col_one() {
        let file = SourceFile::new("int x;\n");
        assert_eq!(file.line_col(0), (1, 1));
    }

    #[test]
    fn offsets_after_newline_are_on_next_line() {
        let file = SourceFile::new("int x;\nfloat y;\n");
        assert_eq!(file.line_col(7), (2, 1));
        assert_eq!(file.line_col(13), (2, 7));
    }

    #[test]
    fn line_text_strips_newline() {
        let file = SourceFile::new("int x;\nfloat y;\n");
        assert_eq!(file.line_text(1), "int x;");
        assert_eq!(file.line_text(2), "float y;");
    }

    #[test]
    fn line_text_works_without_trailing_newline() {
        let file = SourceFile::new("int main() {}");
        assert_eq!(file.line_text(1), "int main() {}");
    }

    #[test]
    fn slice_returns_span_text() {
        let file = SourceFile::new("int abc;");
        assert_eq!(file.slice(Span::new(4, 7)), "abc");
    }

    #[test]
    fn offset_past_end_is_clamped() {
        let file = SourceFile::new("x");
        assert_eq!(file.line_col(99), (1, 2));
    }
}
