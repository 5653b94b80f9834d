//! One-stop wiring of reader, evaluator, environment, builtins, feeder and importer.

use crate::ast::{Value, nil};
use crate::builtins::add_globals;
use crate::environment::Environment;
use crate::evaluator::Evaluator;
use crate::feeder::Feeder;
use crate::importer::Importer;
use crate::output::Output;
use crate::reader::read_all;
use crate::{Error, ErrorCallback, MAX_EVAL_DEPTH};
use std::path::PathBuf;
use std::rc::Rc;

/// Session settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directories searched by `import`, in order
    pub include_dirs: Vec<PathBuf>,
    pub max_eval_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            include_dirs: Vec::new(),
            max_eval_depth: MAX_EVAL_DEPTH,
        }
    }
}

impl Config {
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn with_include_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.include_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn with_max_eval_depth(mut self, max_eval_depth: usize) -> Self {
        self.max_eval_depth = max_eval_depth;
        self
    }
}

/// A complete interpreter session: one root environment with the builtin library,
/// a line feeder for REPL and script input, and an importer for modules.
///
/// Dropping the interpreter clears the root environment, releasing any lambdas
/// that were stored in it.
pub struct Interpreter {
    evaluator: Rc<Evaluator>,
    env: Environment,
    importer: Rc<Importer>,
    feeder: Feeder,
    config: Config,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_output(config, Output::stdout())
    }

    /// Create a session whose `print` calls and echoed results go to `output`
    pub fn with_output(config: Config, output: Output) -> Self {
        let evaluator = Rc::new(Evaluator::new().with_max_depth(config.max_eval_depth));
        let env = Environment::new();
        let importer = Rc::new(Importer::new(
            evaluator.clone(),
            env.clone(),
            config.include_dirs.clone(),
        ));
        add_globals(&env, &importer, &output);
        let feeder = Feeder::new(evaluator.clone(), env.clone()).with_output(output);

        Interpreter {
            evaluator,
            env,
            importer,
            feeder,
            config,
        }
    }

    /// Submit one line of input; see [`Feeder::feed`]
    pub fn feed(&mut self, line: &str, print_result: bool) -> Result<bool, Error> {
        self.feeder.feed(line, print_result)
    }

    /// Evaluate every form in `source` and return the value of the last one
    /// (`nil` when there is none). Does not touch the feeder's pending statement.
    pub fn eval_str(&self, source: &str) -> Result<Value, Error> {
        let mut result = nil();
        for form in read_all(source)? {
            result = self.evaluator.eval(&form, &self.env)?;
        }
        Ok(result)
    }

    /// Import a module as `(import name)` would
    pub fn import(&self, name: &str) -> Result<(), Error> {
        self.importer.import(name)
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn importer(&self) -> &Importer {
        &self.importer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a partially fed statement is waiting for more lines
    pub fn is_idle(&self) -> bool {
        self.feeder.is_idle()
    }

    /// Bind a host closure in the root environment
    pub fn register_native<F>(&self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, Error> + 'static,
    {
        self.env.register_native(name, func);
    }

    pub fn set_error_callback(&mut self, callback: ErrorCallback) {
        self.feeder.set_error_callback(Some(callback));
    }

    /// Discard a partially fed statement. Bindings are kept.
    pub fn reset(&mut self) {
        self.feeder.reset();
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.env.clear();
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("env", &self.env)
            .field("feeder", &self.feeder)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
