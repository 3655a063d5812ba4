//! ANSI terminal color styling for diagnostics.
//!
//! Colors automatically reset at the end of each wrapped string and are
//! suppressed entirely when stderr is not a terminal, so piped output
//! stays plain text.

use std::io::IsTerminal;

/// ANSI escape code styling utilities.
pub struct Style;

impl Style {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const BLUE: &'static str = "\x1b[34m";
    pub const CYAN: &'static str = "\x1b[36m";

    fn enabled() -> bool {
        std::io::stderr().is_terminal()
    }

    fn wrap(codes: &str, s: &str) -> String {
        if Style::enabled() {
            format!("{}{}{}", codes, s, Self::RESET)
        } else {
            s.to_string()
        }
    }

    pub fn red(s: &str) -> String {
        Self::wrap(Self::RED, s)
    }

    pub fn blue(s: &str) -> String {
        Self::wrap(Self::BLUE, s)
    }

    pub fn cyan(s: &str) -> String {
        Self::wrap(Self::CYAN, s)
    }

    pub fn green(s: &str) -> String {
        Self::wrap(Self::GREEN, s)
    }

    pub fn bold_red(s: &str) -> String {
        Self::wrap("\x1b[1m\x1b[31m", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_text_is_preserved() {
        assert!(Style::red("error").contains("error"));
        assert!(Style::bold_red("error").contains("error"));
    }

    #[test]
    fn plain_text_when_not_a_terminal() {
        // Test harnesses capture stderr, so styling is disabled here.
        if !std::io::stderr().is_terminal() {
            assert_eq!(Style::red("error"), "error");
        }
    }
}
