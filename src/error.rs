//! Centralised error hierarchy for the interpreter.
//!
//! All pipeline stages (scanner, parser, resolver, runtime) convert
//! their failure modes into a variant of [`LoxError`]. Compile-time
//! categories carry the 1-based source line; the runtime category
//! carries the line of the token at fault. Cancellation is its own
//! variant so embedders can tell it apart from a failing program.

use std::fmt::Write as _;
use std::io;

use thiserror::Error;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error.
    #[error("[line {line}] Error: {message}")]
    Lex { message: String, line: usize },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error: {message}")]
    Parse { message: String, line: usize },

    /// Static-analysis failure from the resolution pass.
    #[error("[line {line}] Error: {message}")]
    Resolve { message: String, line: usize },

    /// Runtime evaluation error.
    #[error("[line {line}] Runtime error: {message}")]
    Runtime { message: String, line: usize },

    /// Interpretation was cancelled by the caller. Not a defect in the
    /// user's program.
    #[error("interpretation cancelled")]
    Cancelled,

    /// Several compile-time errors collected in one pass.
    #[error("{}", render_collected(.0))]
    Syntax(Vec<LoxError>),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the scanner.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        LoxError::Lex {
            message: msg.into(),
            line,
        }
    }

    /// Helper constructor for the parser.
    pub fn parse<S: Into<String>>(line: usize, msg: S) -> Self {
        LoxError::Parse {
            message: msg.into(),
            line,
        }
    }

    /// Helper constructor for the resolver.
    pub fn resolve<S: Into<String>>(line: usize, msg: S) -> Self {
        LoxError::Resolve {
            message: msg.into(),
            line,
        }
    }

    /// Helper constructor for the evaluator.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        LoxError::Runtime {
            message: msg.into(),
            line,
        }
    }

    /// True for errors raised while the program was running, as opposed
    /// to errors raised before execution started.
    pub fn is_runtime(&self) -> bool {
        matches!(self, LoxError::Runtime { .. })
    }
}

fn render_collected(errs: &[LoxError]) -> String {
    if errs.len() == 1 {
        return errs[0].to_string();
    }

    let mut out = format!("got {} error(s):\n", errs.len());
    for (index, err) in errs.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", index + 1, err);
        if index >= 9 {
            out.push_str("too many errors, more contents omitted...\n");
            break;
        }
    }

    out
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
