//! Embedding facade.
//!
//! Wires the pipeline together: scan, parse, resolve, interpret. One
//! [`Lox`] value owns one interpreter, so globals and side tables
//! survive across `run` calls — which is what the REPL relies on.

use std::io::{BufRead, Write};

use log::info;

use crate::error::{LoxError, Result};
use crate::interpreter::{CancelToken, Interpreter};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

pub struct Lox {
    interpreter: Interpreter,
}

impl Lox {
    /// Create an interpreter writing program output to `sink`.
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Lox {
            interpreter: Interpreter::new(sink),
        }
    }

    /// Replace the output sink. Safe to call while a script is
    /// printing; the swap and the writes share one lock.
    pub fn set_sink(&self, sink: Box<dyn Write + Send>) {
        self.interpreter.set_sink(sink);
    }

    /// Run a script to completion.
    ///
    /// The source is borrowed and never modified. The cancellation
    /// handle stops evaluation between top-level statements; a
    /// cancelled or failed run leaves the interpreter reusable.
    pub fn run(&mut self, cancel: &CancelToken, source: &[u8]) -> Result<()> {
        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();
        if !scan_errors.is_empty() {
            return Err(LoxError::Syntax(scan_errors));
        }

        let (statements, parse_errors) = Parser::new(tokens).parse();
        if !parse_errors.is_empty() {
            return Err(LoxError::Syntax(parse_errors));
        }

        Resolver::new(&mut self.interpreter).resolve(&statements)?;

        self.interpreter.interpret(cancel, &statements)
    }

    /// Read a script file and run it.
    pub fn run_file(&mut self, cancel: &CancelToken, path: &str) -> Result<()> {
        info!("Running script file {}", path);

        let source = std::fs::read(path)?;
        self.run(cancel, &source)
    }

    /// Interactive prompt: one line at a time against the same
    /// interpreter state. An empty line or EOF ends the session;
    /// per-line errors are reported and the loop continues.
    pub fn run_prompt(&mut self, cancel: &CancelToken) -> Result<()> {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let line = match lines.next() {
                Some(line) => line?,
                None => break,
            };

            if line.is_empty() {
                break;
            }

            if let Err(e) = self.run(cancel, line.as_bytes()) {
                eprintln!("{}", e);
            }
        }

        Ok(())
    }
}
