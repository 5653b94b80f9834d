//! Polaris - a minimal embeddable Lisp-family scripting runtime
//!
//! This crate reads s-expression source text into a homogeneous expression tree,
//! evaluates it under a chained lexical environment and exposes a fixed core of
//! special forms plus a small procedure library. A host drives it incrementally,
//! line by line, through a [`feeder::Feeder`], and may extend the language with
//! its own native procedures and file-based modules.
//!
//! ```scheme
//! (define fact (lambda (n) (if (<= n 1) 1 (* n (fact (- n 1))))))
//! (fact 12)          ; 479001600
//! (cdr (list 1))     ; nil
//! (import "math.pol") ; evaluated at most once per canonical path
//! ```
//!
//! ## Embedding
//!
//! ```
//! use polaris::interpreter::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! interp.feed("(define twice", false).unwrap();
//! interp.feed("  (lambda (x) (* 2 x)))", false).unwrap();
//! let result = interp.eval_str("(twice 5)").unwrap();
//! assert_eq!(result.to_string(), "10");
//! ```
//!
//! ## Errors
//!
//! Every failure is returned as an [`Error`] and threaded up through the evaluator,
//! the builtins and the feeder. Nothing in the library terminates the process: an
//! interactive driver reports and keeps going, a batch driver may stop at the first
//! error. `(exit n)` surfaces as [`Error::Exit`] for the same reason.
//!
//! ## Modules
//!
//! - `ast`: the cell type and its rendering
//! - `reader`: tokenizer and recursive-descent parser
//! - `environment`: scoped bindings with shared parent frames
//! - `evaluator`: special forms and procedure application
//! - `builtins`: the procedure library installed into a root environment
//! - `feeder`: incremental statement assembly for REPLs and script files
//! - `importer`: include-directory module loading
//! - `output`: the line sink behind `print`
//! - `interpreter`: one-stop wiring of all of the above

/// Maximum list nesting accepted by the reader
pub const MAX_PARSE_DEPTH: usize = 256;

/// Default maximum evaluation depth.
/// There is no tail-call elimination; the evaluator grows its stack on demand and
/// this limit only stops runaway recursion. Each procedure call costs two to four
/// levels, so a few thousand nested calls fit.
pub const MAX_EVAL_DEPTH: usize = 20_000;

/// How serious a reported error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Bad input or program state; feeding the same text again fails again
    Fatal,
    /// The host environment failed (file access); retrying may succeed
    Failure,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Fatal => write!(f, "fatal"),
            Severity::Failure => write!(f, "failure"),
        }
    }
}

/// Error-reporting collaborator invoked with every failure a feeder observes
pub type ErrorCallback = Box<dyn FnMut(Severity, &str)>;

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Lookup missed through the whole environment chain
    #[error("Unbound symbol: [{0}]")]
    UnboundSymbol(String),
    /// Application of something that is neither a lambda nor a native procedure
    #[error("Not a function: {0}")]
    NotCallable(String),
    /// Operand text that does not read as a number
    #[error("invalid argument for numerical conversion: {0}")]
    NumericConversion(String),
    /// Operand or result outside the representable numeric range
    #[error("out of range: {0}")]
    NumericRange(String),
    /// No literal path nor include directory resolved a module
    #[error("File not found: {0}")]
    ImportNotFound(String),
    /// Syntactically or structurally invalid form
    #[error("Malformed {form}: {reason}")]
    MalformedForm { form: String, reason: String },
    /// Evaluation recursed deeper than the configured limit
    #[error("Evaluation depth limit exceeded (max: {0})")]
    DepthLimitExceeded(usize),
    /// A module or script could not be read
    #[error("Unable to read {path}: {message}")]
    Io { path: String, message: String },
    /// `(exit code)` was evaluated
    #[error("exit requested with code {0}")]
    Exit(i32),
}

impl Error {
    /// Create a MalformedForm error
    pub fn malformed(form: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedForm {
            form: form.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        Error::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Error::Io { .. } => Severity::Failure,
            _ => Severity::Fatal,
        }
    }

    /// Exit requests are control flow, not failures
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::Exit(code) => Some(*code),
            _ => None,
        }
    }
}

pub mod ast;
pub mod builtins;
pub mod environment;
pub mod evaluator;
pub mod feeder;
pub mod importer;
pub mod interpreter;
pub mod output;
pub mod reader;

pub use ast::Value;
pub use environment::Environment;
pub use evaluator::Evaluator;
pub use feeder::Feeder;
pub use importer::Importer;
pub use interpreter::{Config, Interpreter};
