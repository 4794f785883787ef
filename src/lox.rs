//! The driver: wires scanner → parser → resolver → interpreter for one
//! source text, and maps the session's flags onto process exit codes.

use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use log::{debug, info};

use crate::ast::{ExprId, Stmt};
use crate::ast_printer::AstPrinter;
use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::session::Session;
use crate::token::Token;

// see "man sysexits"
pub const EX_OK: i32 = 0;
pub const EX_USAGE: i32 = 64;
pub const EX_DATAERR: i32 = 65;
pub const EX_SOFTWARE: i32 = 70;
pub const EX_IOERR: i32 = 74;

pub const USAGE: &str = "Usage: lox [script]";
pub const PROMPT: &str = "> ";

/// One interpreter plus the session it reports to.  Globals persist across
/// calls to [`Lox::run`], which is what the prompt relies on.
pub struct Lox {
    interpreter: Interpreter,
    session: Session,
}

impl Lox {
    /// Prints to stdout, diagnostics to stderr.
    pub fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
            session: Session::new(),
        }
    }

    /// Explicit output and diagnostic writers, for embedding and tests.
    pub fn with_io(out: Box<dyn Write>, diagnostics: Box<dyn Write>) -> Self {
        Lox {
            interpreter: Interpreter::with_output(out),
            session: Session::with_sink(diagnostics),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Scan, parse, resolve and run `source`.  Each phase only runs when
    /// none before it reported an error.
    pub fn run(&mut self, source: &str) {
        let statements: Vec<Stmt> = self.parse(source);

        if self.session.had_error() {
            debug!("Skipping resolution: syntax errors were reported");
            return;
        }

        let top_level: Vec<ExprId> =
            Resolver::new(&mut self.interpreter, &mut self.session).resolve(&statements);

        if self.session.had_error() {
            debug!("Skipping execution: resolution errors were reported");
        } else {
            self.interpreter.interpret(&statements, &mut self.session);
        }

        // `statements` is dropped here; only function bodies can run again.
        self.interpreter.forget(&top_level);
    }

    /// The interpreter, for inspecting its state.
    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Read a script and run it once.  Returns the exit code to use.
    pub fn run_file(&mut self, path: &Path) -> Result<i32> {
        info!("Reading file: {:?}", path);

        let bytes: Vec<u8> = fs::read(path)?;
        let source: String = String::from_utf8(bytes)?;

        info!("Read {} bytes from {:?}", source.len(), path);

        self.run(&source);

        Ok(self.exit_code())
    }

    /// Read‑eval loop: one line per program, until `input` is exhausted.
    /// Errors are reported and the loop carries on.
    pub fn run_prompt(&mut self, input: &mut dyn BufRead, prompt: &mut dyn Write) -> Result<()> {
        info!("Starting prompt");

        let mut line = String::new();

        loop {
            write!(prompt, "{}", PROMPT)?;
            prompt.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }

            self.run(&line);
            self.session.reset();
        }

        info!("Prompt closed");

        Ok(())
    }

    /// Tokens of `source`, with lexical errors reported.
    pub fn tokenize(&mut self, source: &str) -> Vec<Token> {
        Scanner::new(source).scan_tokens(&mut self.session)
    }

    /// Statements of `source`, with lexical and syntax errors reported.
    pub fn parse(&mut self, source: &str) -> Vec<Stmt> {
        let tokens: Vec<Token> = self.tokenize(source);
        Parser::new(tokens, &mut self.session).parse()
    }

    /// Parenthesised rendering of `source`'s statements.
    pub fn dump_ast(&mut self, source: &str) -> String {
        AstPrinter::print_program(&self.parse(source))
    }

    /// 65 after a compile error, 70 after a runtime error, else 0.
    pub fn exit_code(&self) -> i32 {
        if self.session.had_error() {
            EX_DATAERR
        } else if self.session.had_runtime_error() {
            EX_SOFTWARE
        } else {
            EX_OK
        }
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}
