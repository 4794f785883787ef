//! Per‑run diagnostic state.
//!
//! A [`Session`] is the sink every phase reports its errors to, plus the two
//! flags the driver consults to decide whether to keep going and which exit
//! code to use.  It is owned by the driver and lent out by `&mut`.

use std::fmt;
use std::io::{self, Write};

use log::{debug, warn};

use crate::error::LoxError;

pub struct Session {
    had_error: bool,
    had_runtime_error: bool,
    sink: Box<dyn Write>,
}

impl Session {
    /// A session that writes diagnostics to standard error.
    pub fn new() -> Self {
        Self::with_sink(Box::new(io::stderr()))
    }

    pub fn with_sink(sink: Box<dyn Write>) -> Self {
        Self {
            had_error: false,
            had_runtime_error: false,
            sink,
        }
    }

    /// Write `error` to the sink and raise the matching flag.
    pub fn report(&mut self, error: &LoxError) {
        debug!("Reporting diagnostic: {}", error);

        if error.is_compile_time() {
            self.had_error = true;
        } else {
            self.had_runtime_error = true;
        }

        if let Err(e) = writeln!(self.sink, "{}", error) {
            warn!("Failed to write diagnostic: {}", e);
        }
    }

    /// A lex, parse or resolve error was reported.
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Forget compile errors, e.g. between two prompt lines.
    pub fn reset(&mut self) {
        self.had_error = false;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("had_error", &self.had_error)
            .field("had_runtime_error", &self.had_runtime_error)
            .finish_non_exhaustive()
    }
}
