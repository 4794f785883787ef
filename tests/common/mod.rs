#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use lox_interpreter::session::Session;
use lox_interpreter::Lox;

/// Shared in-memory writer; clones see the same buffer.
#[derive(Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A session whose diagnostics can be read back.
pub fn session() -> (Session, Capture) {
    let diagnostics = Capture::default();
    (Session::with_sink(Box::new(diagnostics.clone())), diagnostics)
}

/// Run `source` once; returns (stdout, stderr, exit code).
pub fn run(source: &str) -> (String, String, i32) {
    let out = Capture::default();
    let err = Capture::default();

    let mut lox = Lox::with_io(Box::new(out.clone()), Box::new(err.clone()));
    lox.run(source);

    (out.text(), err.text(), lox.exit_code())
}
