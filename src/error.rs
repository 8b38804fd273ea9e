//! Error types with source location tracking.
//!
//! Every error the compiler can produce carries a [`Span`] pointing at the
//! offending token. All errors are fatal to the current compilation: there
//! is no recovery and there are no warnings. [`CompileError::display_with_source`]
//! renders the classic line-and-carat diagnostic.

use crate::style::Style;
use crate::suggest::{find_similar, KEYWORDS};
use crate::token::{Span, TokenKind};
use std::fmt;

#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum CompileErrorKind {
    // Lexical
    UnexpectedCharacter {
        found: char,
    },
    UnterminatedString,
    UnterminatedComment,
    NumberTooLarge,

    // Syntactic
    UnexpectedToken {
        expected: TokenKind,
        found: TokenKind,
    },
    ExpectedIdentifier {
        found: TokenKind,
    },
    ExpectedNumber {
        found: TokenKind,
    },
    ExpectedExpression {
        found: TokenKind,
    },
    ExpectedTypeName {
        found: TokenKind,
    },
    TooManyArguments,

    // Typing
    InvalidOperands,
    InvalidDereference,
    NotAStruct,
    NoSuchMember {
        name: String,
    },
    StmtExprVoid,
    NotAnLvalue,

    // Name resolution
    UndefinedVariable {
        name: String,
    },
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// The human-readable description of this error, without location.
    pub fn message(&self) -> String {
        match &self.kind {
            CompileErrorKind::UnexpectedCharacter { found } => {
                format!("unexpected character '{}'", found.escape_default())
            }
            CompileErrorKind::UnterminatedString => "unterminated string literal".to_string(),
            CompileErrorKind::UnterminatedComment => "unterminated block comment".to_string(),
            CompileErrorKind::NumberTooLarge => "number literal too large".to_string(),
            CompileErrorKind::UnexpectedToken { expected, found } => {
                format!("expected {}, found {}", expected, found)
            }
            CompileErrorKind::ExpectedIdentifier { found } => {
                format!("expected an identifier, found {}", found)
            }
            CompileErrorKind::ExpectedNumber { found } => {
                format!("expected a number, found {}", found)
            }
            CompileErrorKind::ExpectedExpression { found } => {
                format!("expected an expression, found {}", found)
            }
            CompileErrorKind::ExpectedTypeName { found } => {
                format!("expected a type name, found {}", found)
            }
            CompileErrorKind::TooManyArguments => "too many function arguments".to_string(),
            CompileErrorKind::InvalidOperands => "invalid operands".to_string(),
            CompileErrorKind::InvalidDereference => "invalid pointer dereference".to_string(),
            CompileErrorKind::NotAStruct => "not a struct".to_string(),
            CompileErrorKind::NoSuchMember { name } => format!("no such member '{}'", name),
            CompileErrorKind::StmtExprVoid => {
                "statement expression returning void is not supported".to_string()
            }
            CompileErrorKind::NotAnLvalue => "not an lvalue".to_string(),
            CompileErrorKind::UndefinedVariable { name } => {
                format!("undefined variable '{}'", name)
            }
        }
    }

    /// Renders the error as a colored line/carat diagnostic against `source`.
    pub fn display_with_source(&self, source: &str) -> String {
        let (line_num, line_start, line_content) = self.find_context(source);
        let col = self.span.start.saturating_sub(line_start);
        let len = (self.span.end.saturating_sub(self.span.start)).max(1);
        let underline = format!("{}{}", " ".repeat(col), "^".repeat(len));

        let error_label = Style::bold_red("error");
        let line_num_str = Style::blue(&format!("{:4}", line_num));
        let pipe = Style::blue("|");
        let underline_colored = Style::red(&underline);

        let mut result = format!(
            "{}: {}\n\n{} {} {}\n     {} {}",
            error_label,
            self.message(),
            line_num_str,
            pipe,
            line_content,
            pipe,
            underline_colored
        );

        if let Some(word) = self.extract_word(source) {
            if let Some(suggestion) = find_similar(word, KEYWORDS, 2) {
                let hint = Style::cyan("help");
                result.push_str(&format!(
                    "\n     {} {}: did you mean '{}'?",
                    pipe,
                    hint,
                    Style::green(suggestion)
                ));
            }
        }

        result
    }

    fn extract_word<'a>(&self, source: &'a str) -> Option<&'a str> {
        if self.span.start < source.len() && self.span.end <= source.len() {
            let word = &source[self.span.start..self.span.end];
            if !word.is_empty() && word.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Some(word);
            }
        }
        None
    }

    fn find_context<'a>(&self, source: &'a str) -> (usize, usize, &'a str) {
        let mut line_num = 1;
        let mut line_start = 0;

        for (i, c) in source.char_indices() {
            if i >= self.span.start {
                break;
            }
            if c == '\n' {
                line_num += 1;
                line_start = i + 1;
            }
        }

        let line_end = source[line_start..]
            .find('\n')
            .map(|off| line_start + off)
            .unwrap_or(source.len());

        (line_num, line_start, &source[line_start..line_end])
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}..{}",
            self.message(),
            self.span.start,
            self.span.end
        )
    }
}

impl std::error::Error for CompileError {}

/// Alias for `std::result::Result<T, CompileError>`.
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message_and_span() {
        let err = CompileError::new(
            CompileErrorKind::UnexpectedToken {
                expected: TokenKind::Semicolon,
                found: TokenKind::RBrace,
            },
            Span::new(5, 6),
        );
        let text = err.to_string();
        assert!(text.contains("expected ';'"));
        assert!(text.contains("5..6"));
    }

    #[test]
    fn carat_points_at_offending_token() {
        let source = "int main() { return 1 }";
        let err = CompileError::new(
            CompileErrorKind::UnexpectedToken {
                expected: TokenKind::Semicolon,
                found: TokenKind::RBrace,
            },
            Span::new(22, 23),
        );
        let rendered = err.display_with_source(source);
        assert!(rendered.contains("error"));
        assert!(rendered.contains("int main() { return 1 }"));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn carat_reports_correct_line_number() {
        let source = "int x;\nint y\nint main() { return 0; }";
        // The missing semicolon after `int y` is discovered at the `int`
        // that starts line 3.
        let err = CompileError::new(
            CompileErrorKind::UnexpectedToken {
                expected: TokenKind::Semicolon,
                found: TokenKind::Int,
            },
            Span::new(13, 16),
        );
        let (line, _, content) = err.find_context(source);
        assert_eq!(line, 3);
        assert_eq!(content, "int main() { return 0; }");
    }

    #[test]
    fn misspelled_keyword_gets_suggestion() {
        let source = "int main() { retrun 1; }";
        let err = CompileError::new(
            CompileErrorKind::UndefinedVariable {
                name: "retrun".to_string(),
            },
            Span::new(13, 19),
        );
        let rendered = err.display_with_source(source);
        assert!(rendered.contains("did you mean"));
        assert!(rendered.contains("return"));
    }

    #[test]
    fn punctuator_span_gets_no_suggestion() {
        let source = "int main() { return 1 }";
        let err = CompileError::new(
            CompileErrorKind::UnexpectedToken {
                expected: TokenKind::Semicolon,
                found: TokenKind::RBrace,
            },
            Span::new(22, 23),
        );
        let rendered = err.display_with_source(source);
        assert!(!rendered.contains("did you mean"));
    }
}
