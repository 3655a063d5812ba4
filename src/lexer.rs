//! Byte-wise scanner producing the finite token stream.
//!
//! Two-character operators win over their one-character prefixes, keywords
//! are matched after the identifier scan, and `//` / `/* ... */` comments
//! are skipped (block comments do not nest). Lexical errors are reported
//! to the sink and scanning continues on the next byte.

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::token::{Span, Token, TokenType};

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    diags: &'a mut Diagnostics,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, diags: &'a mut Diagnostics) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            diags,
        }
    }

    /// Scans the whole input. The stream always ends with a single `Eof`
    /// token so the parser never runs off the end.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let at_end = token.kind == TokenType::Eof;
            tokens.push(token);
            if at_end {
                break;
            }
        }
        tokens
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while self.peek().is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let open = self.pos;
                    self.pos += 2;
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.pos += 2;
                                break;
                            }
                            Some(_) => self.pos += 1,
                            None => {
                                self.diags.report(Diagnostic::new(
                                    DiagnosticKind::LexError,
                                    Span::new(open, open + 2),
                                    "unterminated block comment",
                                ));
                                break;
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let start = self.pos;
        let Some(byte) = self.peek() else {
            return Token::new(TokenType::Eof, Span::new(start, start));
        };

        if byte.is_ascii_alphabetic() || byte == b'_' {
            return self.identifier_or_keyword(start);
        }
        if byte.is_ascii_digit() {
            return self.number(start);
        }

        // Two-character operators take precedence over their prefixes.
        let two = [byte, self.peek_at(1).unwrap_or(0)];
        let double = match &two {
            b"==" => Some(TokenType::EqEq),
            b"!=" => Some(TokenType::NotEq),
            b"<=" => Some(TokenType::LtEq),
            b">=" => Some(TokenType::GtEq),
            b"&&" => Some(TokenType::AndAnd),
            b"||" => Some(TokenType::OrOr),
            _ => None,
        };
        if let Some(kind) = double {
            self.pos += 2;
            return Token::new(kind, Span::new(start, start + 2));
        }

        let single = match byte {
            b'=' => Some(TokenType::Assign),
            b'!' => Some(TokenType::Not),
            b'<' => Some(TokenType::Lt),
            b'>' => Some(TokenType::Gt),
            b'+' => Some(TokenType::Plus),
            b'-' => Some(TokenType::Minus),
            b'*' => Some(TokenType::Star),
            b'/' => Some(TokenType::Slash),
            b'%' => Some(TokenType::Percent),
            b'(' => Some(TokenType::LParen),
            b')' => Some(TokenType::RParen),
            b'{' => Some(TokenType::LBrace),
            b'}' => Some(TokenType::RBrace),
            b'[' => Some(TokenType::LBracket),
            b']' => Some(TokenType::RBracket),
            b';' => Some(TokenType::Semicolon),
            b',' => Some(TokenType::Comma),
            _ => None,
        };
        if let Some(kind) = single {
            self.pos += 1;
            return Token::new(kind, Span::new(start, start + 1));
        }

        // Unknown byte: report it, skip it, and keep scanning.
        let ch = self.source[start..].chars().next().unwrap_or('\u{fffd}');
        let width = ch.len_utf8();
        self.pos += width;
        self.diags.report(Diagnostic::new(
            DiagnosticKind::LexError,
            Span::new(start, start + width),
            format!("unexpected character '{}'", ch.escape_default()),
        ));
        self.next_token()
    }

    fn identifier_or_keyword(&mut self, start: usize) -> Token {
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let kind = match text {
            "int" => TokenType::Int,
            "float" => TokenType::Float,
            "bool" => TokenType::Bool,
            "void" => TokenType::Void,
            "if" => TokenType::If,
            "else" => TokenType::Else,
            "while" => TokenType::While,
            "return" => TokenType::Return,
            "true" => TokenType::True,
            "false" => TokenType::False,
            "extern" => TokenType::Extern,
            _ => TokenType::Ident(text.to_string()),
        };
        Token::new(kind, Span::new(start, self.pos))
    }

    /// `[0-9]+` or `[0-9]+ '.' [0-9]+`; the fractional digits are
    /// mandatory, so `3.` lexes as an integer and leaves the dot behind.
    fn number(&mut self, start: usize) -> Token {
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }

        let is_float = self.peek() == Some(b'.')
            && self.peek_at(1).is_some_and(|b| b.is_ascii_digit());
        if is_float {
            self.pos += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
            let text = &self.source[start..self.pos];
            let value: f32 = text.parse().unwrap_or(0.0);
            return Token::new(TokenType::FloatLit(value), Span::new(start, self.pos));
        }

        let span = Span::new(start, self.pos);
        let text = &self.source[start..self.pos];
        match text.parse::<i32>() {
            Ok(value) => Token::new(TokenType::IntLit(value), span),
            Err(_) => {
                self.diags.report(Diagnostic::new(
                    DiagnosticKind::LexError,
                    span,
                    format!("integer literal '{}' is out of range for 'int'", text),
                ));
                Token::new(TokenType::IntLit(0), span)
            }
        }
    }
}
