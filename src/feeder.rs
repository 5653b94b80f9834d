//! Incremental statement assembly.
//!
//! A [`Feeder`] accepts source text one line at a time, as a console or a file
//! reader produces it, and evaluates each statement once its parentheses balance.
//! The boolean returned by [`Feeder::feed`] tells an interactive driver whether to
//! show a fresh prompt or a continuation prompt.

use crate::ast::Value;
use crate::environment::Environment;
use crate::evaluator::Evaluator;
use crate::output::Output;
use crate::reader::read_all;
use crate::{Error, ErrorCallback};
use std::rc::Rc;

/// Remove everything from the first `;` that is not preceded by a backslash.
/// String literals are not recognized here, so a `;` inside one still starts a
/// comment.
fn strip_comment(line: &str) -> &str {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if c == ';' && !escaped {
            return &line[..i];
        }
        escaped = c == '\\' && !escaped;
    }
    line
}

pub struct Feeder {
    evaluator: Rc<Evaluator>,
    env: Environment,
    output: Output,
    buffer: String,
    /// Open parentheses outside string literals
    depth: i64,
    in_string: bool,
    escaped: bool,
    error_callback: Option<ErrorCallback>,
}

impl Feeder {
    /// Create a feeder evaluating against `env`. Results are printed to stdout
    /// unless [`Feeder::with_output`] says otherwise.
    pub fn new(evaluator: Rc<Evaluator>, env: Environment) -> Self {
        Feeder {
            evaluator,
            env,
            output: Output::stdout(),
            buffer: String::new(),
            depth: 0,
            in_string: false,
            escaped: false,
            error_callback: None,
        }
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.error_callback = Some(callback);
        self
    }

    pub fn set_error_callback(&mut self, callback: Option<ErrorCallback>) {
        self.error_callback = callback;
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Current parenthesis depth of the pending statement. Negative once a line
    /// closed more than it opened.
    pub fn depth(&self) -> i64 {
        self.depth
    }

    /// Text accumulated for the statement that is not complete yet
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Whether no statement is partially assembled
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard any partially assembled statement
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
    }

    /// Submit one line of input.
    ///
    /// Returns `Ok(true)` when the line completed a statement (which has then been
    /// evaluated) or was blank, `Ok(false)` when more input is needed.
    ///
    /// A failure is handed to the error callback, or logged when none is
    /// installed, and the pending statement is discarded before the error is
    /// returned. [`Error::Exit`] is returned without being reported.
    pub fn feed(&mut self, line: &str, print_result: bool) -> Result<bool, Error> {
        let result = self.feed_unreported(line, print_result);
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    /// [`Feeder::feed`] without reporting, for callers that pass errors further up
    pub(crate) fn feed_unreported(&mut self, line: &str, print_result: bool) -> Result<bool, Error> {
        let code = strip_comment(line);
        if code.trim().is_empty() {
            return Ok(true);
        }

        self.scan(code);
        if self.depth != 0 || self.in_string {
            self.buffer.push(' ');
            return Ok(false);
        }

        let statement = std::mem::take(&mut self.buffer);
        tracing::trace!(statement = statement.trim(), "statement complete");
        if let Err(e) = self.run(&statement, print_result) {
            self.reset();
            return Err(e);
        }
        Ok(true)
    }

    fn scan(&mut self, code: &str) {
        for c in code.chars() {
            self.buffer.push(c);
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == '"' {
                    self.in_string = false;
                }
                continue;
            }
            match c {
                '"' => self.in_string = true,
                '(' => self.depth += 1,
                ')' => self.depth -= 1,
                _ => {}
            }
        }
        if self.depth < 0 {
            tracing::warn!(depth = self.depth, "more closing than opening parentheses");
        }
    }

    fn run(&self, statement: &str, print_result: bool) -> Result<(), Error> {
        for form in read_all(statement)? {
            let value: Value = self.evaluator.eval(&form, &self.env)?;
            if print_result {
                self.output.write_line(&value.to_string())?;
            }
        }
        Ok(())
    }

    fn report(&mut self, error: &Error) {
        if error.exit_code().is_some() {
            return;
        }
        match self.error_callback.as_mut() {
            Some(callback) => callback(error.severity(), &error.to_string()),
            None => tracing::error!(severity = %error.severity(), "{error}"),
        }
    }
}

impl std::fmt::Debug for Feeder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feeder")
            .field("buffer", &self.buffer)
            .field("depth", &self.depth)
            .field("in_string", &self.in_string)
            .finish_non_exhaustive()
    }
}
