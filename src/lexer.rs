//! Tokenizer for the C subset.
//!
//! The lexer walks the source bytes once and produces a `Vec<Token>`
//! terminated by an `Eof` token. It recognizes:
//!
//! - the keywords `return if else while for int char sizeof struct`,
//! - the punctuators `{ } ( ) [ ] ; , = == != < <= > >= + - * / & .`,
//! - identifiers (`[A-Za-z_][A-Za-z0-9_]*`),
//! - decimal number literals,
//! - double-quoted string literals with C escape sequences,
//! - `//` line comments and `/* */` block comments (skipped).
//!
//! String literal payloads are decoded at lex time and carry a trailing NUL,
//! so the payload length is the byte size of the eventual `char` array.

use crate::error::{CompileError, CompileErrorKind, Result};
use crate::intern::Interner;
use crate::token::{keyword_kind, Span, Token, TokenKind};

pub struct Lexer<'s, 'int> {
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
    interner: &'int mut Interner,
}

impl<'s, 'int> Lexer<'s, 'int> {
    pub fn new(source: &'s str, interner: &'int mut Interner) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            interner,
        }
    }

    /// Tokenizes the whole source, appending a final `Eof` token.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;
            if self.pos >= self.bytes.len() {
                break;
            }
            tokens.push(self.next_token()?);
        }

        let end = self.bytes.len();
        let eof_lexeme = self.interner.intern("");
        tokens.push(Token::new(TokenKind::Eof, eof_lexeme, Span::new(end, end)));
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let c = self.bytes[self.pos];
        match c {
            b'0'..=b'9' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.ident_or_keyword(),
            b'"' => self.string_literal(),
            _ => self.punctuator(),
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.starts_with("//") {
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else if self.starts_with("/*") {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos + 1 >= self.bytes.len() {
                        return Err(CompileError::new(
                            CompileErrorKind::UnterminatedComment,
                            Span::new(start, start + 2),
                        ));
                    }
                    if self.starts_with("*/") {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                return Ok(());
            }
        }
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.source[self.pos..].starts_with(prefix)
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let span = Span::new(start, self.pos);
        let value: i64 = text
            .parse()
            .map_err(|_| CompileError::new(CompileErrorKind::NumberTooLarge, span))?;
        let lexeme = self.interner.intern(text);
        Ok(Token::new(TokenKind::Num(value), lexeme, span))
    }

    fn ident_or_keyword(&mut self) -> Result<Token> {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let span = Span::new(start, self.pos);
        let lexeme = self.interner.intern(text);
        let kind = keyword_kind(text).unwrap_or(TokenKind::Ident(lexeme));
        Ok(Token::new(kind, lexeme, span))
    }

    fn string_literal(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut decoded = String::new();

        loop {
            if self.pos >= self.bytes.len() {
                return Err(CompileError::new(
                    CompileErrorKind::UnterminatedString,
                    Span::new(start, self.bytes.len()),
                ));
            }
            match self.bytes[self.pos] {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => {
                    self.pos += 1;
                    if self.pos >= self.bytes.len() {
                        return Err(CompileError::new(
                            CompileErrorKind::UnterminatedString,
                            Span::new(start, self.bytes.len()),
                        ));
                    }
                    decoded.push(decode_escape(self.bytes[self.pos] as char));
                    self.pos += 1;
                }
                _ => {
                    // Copy the full source character, not just one byte.
                    let ch = self.source[self.pos..]
                        .chars()
                        .next()
                        .unwrap_or('\u{FFFD}');
                    decoded.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }

        // The payload includes the terminating NUL of the C string.
        decoded.push('\0');
        let span = Span::new(start, self.pos);
        let sym = self.interner.intern(&decoded);
        Ok(Token::new(TokenKind::Str(sym), sym, span))
    }

    fn punctuator(&mut self) -> Result<Token> {
        const TWO_CHAR: &[(&str, TokenKind)] = &[
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::NotEq),
            ("<=", TokenKind::LtEq),
            (">=", TokenKind::GtEq),
        ];

        for &(text, kind) in TWO_CHAR {
            if self.starts_with(text) {
                let span = Span::new(self.pos, self.pos + 2);
                self.pos += 2;
                let lexeme = self.interner.intern(text);
                return Ok(Token::new(kind, lexeme, span));
            }
        }

        let kind = match self.bytes[self.pos] {
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b'&' => TokenKind::Amp,
            b'=' => TokenKind::Assign,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            other => {
                let found = self.source[self.pos..].chars().next().unwrap_or(other as char);
                return Err(CompileError::new(
                    CompileErrorKind::UnexpectedCharacter { found },
                    Span::new(self.pos, self.pos + 1),
                ));
            }
        };

        let span = Span::new(self.pos, self.pos + 1);
        let lexeme = self.interner.intern(&self.source[self.pos..self.pos + 1]);
        self.pos += 1;
        Ok(Token::new(kind, lexeme, span))
    }
}

fn decode_escape(c: char) -> char {
    match c {
        'a' => '\x07',
        'b' => '\x08',
        't' => '\t',
        'n' => '\n',
        'v' => '\x0B',
        'f' => '\x0C',
        'r' => '\r',
        'e' => '\x1B',
        '0' => '\0',
        other => other,
    }
}
