//! Module `scanner` implements a one‑pass, streaming lexer for the Lox language.
//!
//! It walks the bytes of a `&str`, skipping whitespace and comments, and emits
//! exactly one `EOF` token at the end. Designed as a `FusedIterator`, it can be
//! chained safely with other iterator adapters.
//!
//! # Public API
//!
//! - `Scanner::new(src: &'a str) -> Scanner<'a>`
//!   Create a new lexer over the input text.
//!
//! - `impl Iterator for Scanner<'a>`
//!   Yields `Result<Token, LoxError>` on each `.next()`, where `Ok(token)` is a scanned token
//!   and `Err` reports a lexing error with line information. Lexing always continues
//!   after an error.
//!
//! - `Scanner::scan_tokens(self, session)`
//!   Drain the iterator, reporting every error to the [`Session`] and returning the tokens.
//!
//! # Token Recognition
//!
//! - Single‑character tokens: `(`, `)`, `{`, `}`, `,`, `.`, `-`, `+`, `;`, `*`, `/`.
//! - One‑or‑two character operators: `!` `!=`, `=` `==`, `<` `<=`, `>` `>=`.
//! - String literals: `"` … `"`, allowing multi‑line and reporting unterminated errors.
//! - Numeric literals: integer and optional fractional part.
//! - Identifiers/keywords: alphanumeric/_ sequences, resolved via a perfect‑hash `KEYWORDS` map.
//!
//! Comments are skipped with `memchr` for the newline search.
//!
//! # Example
//!
//! ```rust
//! use lox_interpreter::scanner::Scanner;
//!
//! let mut scanner = Scanner::new("print 123; // example");
//! for result in &mut scanner {
//!     match result {
//!         Ok(token) => println!("{}", token),
//!         Err(err) => eprintln!("{}", err),
//!     }
//! }
//! ```

use crate::error::{LoxError, Result};
use crate::session::Session;
use crate::token::{Token, TokenType};
use log::{debug, info, trace};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// A single pass **scanner / lexer** that converts source text into a
/// sequence of [`Token`]s.  Lexemes are sliced from `text` and copied into
/// the owned tokens.
pub struct Scanner<'a> {
    text: &'a str,  // source text, for lexeme slicing
    bytes: &'a [u8], // same buffer viewed as bytes
    start: usize,   // first byte of the lexeme being scanned
    pos: usize,     // next byte to look at
    line: usize,    // 1‑based, bumped on every '\n'
    done: bool,     // EOF has been handed out
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `text`.
    #[inline]
    pub fn new(text: &'a str) -> Self {
        info!("Scanner created over {} bytes", text.len());

        Self {
            text,
            bytes: text.as_bytes(),
            start: 0,
            pos: 0,
            line: 1,
            done: false,
        }
    }

    /// Scan the whole input.  Every lexical error is reported to `session`
    /// and scanning carries on, so the result always ends with `EOF`.
    pub fn scan_tokens(self, session: &mut Session) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();

        for item in self {
            match item {
                Ok(token) => tokens.push(token),
                Err(e) => {
                    debug!("Lex diagnostic: {}", e);
                    session.report(&e);
                }
            }
        }

        info!("Scanned {} token(s)", tokens.len());

        tokens
    }

    // ───────────────────────────── cursor ──────────────────────────────────

    #[inline(always)]
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Byte `offset` positions ahead, or `0` past the end.
    #[inline(always)]
    fn look(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn bump(&mut self) -> u8 {
        let b = self.look(0);
        self.pos += 1;
        b
    }

    /// `matched` when the next byte is `=` (consuming it), else `otherwise`.
    #[inline(always)]
    fn with_equal(&mut self, matched: TokenType, otherwise: TokenType) -> TokenType {
        if self.look(0) == b'=' {
            self.pos += 1;
            matched
        } else {
            otherwise
        }
    }

    /// Skip blanks, newlines and `//` comments up to the next lexeme.
    fn skip_trivia(&mut self) {
        loop {
            match self.look(0) {
                b' ' | b'\r' | b'\t' => self.pos += 1,

                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }

                b'/' if self.look(1) == b'/' => {
                    self.pos = match memchr(b'\n', &self.bytes[self.pos..]) {
                        Some(offset) => self.pos + offset,
                        None => self.bytes.len(),
                    };
                }

                _ => return,
            }
        }
    }

    // ───────────────────────────── lexemes ─────────────────────────────────

    /// Kind of the lexeme starting at `self.start`.  Assumes a byte is left.
    fn lexeme(&mut self) -> Result<TokenType> {
        let kind = match self.bump() {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,
            b'/' => TokenType::SLASH,

            b'!' => self.with_equal(TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.with_equal(TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.with_equal(TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.with_equal(TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'"' => self.string()?,
            b'0'..=b'9' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.word(),

            _ => {
                // A multi‑byte character is one error, not one per byte.
                if let Some(c) = self.text[self.start..].chars().next() {
                    self.pos = self.start + c.len_utf8();
                }

                return Err(LoxError::lex(self.line, "Unexpected character."));
            }
        };

        Ok(kind)
    }

    /// Body of a `"…"` literal; newlines inside are allowed.
    fn string(&mut self) -> Result<TokenType> {
        let Some(offset) = memchr(b'"', &self.bytes[self.pos..]) else {
            self.line += self.bytes[self.pos..].iter().filter(|&&b| b == b'\n').count();
            self.pos = self.bytes.len();

            return Err(LoxError::lex(self.line, "Unterminated string."));
        };

        let body: &str = &self.text[self.pos..self.pos + offset];
        self.line += body.bytes().filter(|&b| b == b'\n').count();
        self.pos += offset + 1;

        Ok(TokenType::STRING(body.to_owned()))
    }

    /// `123` or `3.14`; a trailing `.` is left for the next token.
    fn number(&mut self) -> TokenType {
        self.digits();

        if self.look(0) == b'.' && self.look(1).is_ascii_digit() {
            self.pos += 1;
            self.digits();
        }

        let value: f64 = self.text[self.start..self.pos].parse().unwrap_or_default();

        TokenType::NUMBER(value)
    }

    fn digits(&mut self) {
        while self.look(0).is_ascii_digit() {
            self.pos += 1;
        }
    }

    /// Identifier, or a keyword from [`KEYWORDS`].
    fn word(&mut self) -> TokenType {
        while matches!(self.look(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.pos += 1;
        }

        KEYWORDS
            .get(&self.bytes[self.start..self.pos])
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.skip_trivia();

        if self.at_end() {
            self.done = true;
            return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
        }

        self.start = self.pos;

        let item = self.lexeme().map(|kind| {
            trace!("Scanned {:?} on line {}", kind, self.line);
            Token::new(kind, &self.text[self.start..self.pos], self.line)
        });

        Some(item)
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
