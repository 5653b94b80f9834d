//! File-based modules.
//!
//! `(import "name")` evaluates a source file into the shared root environment.
//! A name that is itself the path of a regular file is used as is; otherwise the
//! include directories are searched in the order they were configured and the first
//! hit wins. Each canonical path is evaluated at most once per importer.

use crate::Error;
use crate::environment::Environment;
use crate::evaluator::Evaluator;
use crate::feeder::Feeder;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug)]
pub struct Importer {
    evaluator: Rc<Evaluator>,
    env: Environment,
    include_dirs: Vec<PathBuf>,
    /// Canonical paths of every module imported so far
    imported: RefCell<BTreeSet<PathBuf>>,
}

impl Importer {
    pub fn new(evaluator: Rc<Evaluator>, env: Environment, include_dirs: Vec<PathBuf>) -> Self {
        Importer {
            evaluator,
            env,
            include_dirs,
            imported: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    /// Canonical paths imported so far, in sorted order
    pub fn imported(&self) -> Vec<PathBuf> {
        self.imported.borrow().iter().cloned().collect()
    }

    /// Find the file `name` refers to and return its canonical path
    pub fn resolve(&self, name: &str) -> Result<PathBuf, Error> {
        let literal = Path::new(name);
        let found = if literal.is_file() {
            Some(literal.to_path_buf())
        } else {
            self.include_dirs
                .iter()
                .map(|dir| dir.join(name))
                .find(|candidate| candidate.is_file())
        };

        let Some(path) = found else {
            return Err(Error::ImportNotFound(name.to_owned()));
        };
        fs::canonicalize(&path).map_err(|e| Error::io(&path, &e))
    }

    /// Evaluate the module `name` unless it has been imported before.
    ///
    /// The path is recorded before the module runs, so a module that imports
    /// itself, directly or through others, stops there instead of recursing. A
    /// module that fails is forgotten again and may be retried.
    pub fn import(&self, name: &str) -> Result<(), Error> {
        let path = self.resolve(name)?;
        if !self.imported.borrow_mut().insert(path.clone()) {
            tracing::debug!(module = name, path = %path.display(), "already imported");
            return Ok(());
        }

        tracing::debug!(module = name, path = %path.display(), "importing");
        let result = self.evaluate_file(&path);
        if result.is_err() {
            self.imported.borrow_mut().remove(&path);
        }
        result
    }

    fn evaluate_file(&self, path: &Path) -> Result<(), Error> {
        let source = fs::read_to_string(path).map_err(|e| Error::io(path, &e))?;

        let mut feeder = Feeder::new(self.evaluator.clone(), self.env.clone());
        for line in source.lines() {
            feeder.feed_unreported(line, false)?;
        }

        if feeder.is_idle() {
            Ok(())
        } else {
            Err(Error::malformed(
                "module",
                format!("{} ends inside an unfinished statement", path.display()),
            ))
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{Value, int};
    use crate::builtins::add_globals;
    use crate::output::{CapturedOutput, Output};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        importer: Rc<Importer>,
        env: Environment,
        captured: CapturedOutput,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.env.clear();
        }
    }

    fn fixture(include_dirs: Vec<PathBuf>) -> Fixture {
        let (output, captured) = Output::capture();
        let env = Environment::new();
        let importer = Rc::new(Importer::new(
            Rc::new(Evaluator::new()),
            env.clone(),
            include_dirs,
        ));
        add_globals(&env, &importer, &output);
        Fixture {
            importer,
            env,
            captured,
        }
    }

    fn write_module(dir: &TempDir, name: &str, source: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_import_defines_into_shared_environment() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "math.pol",
            "; helpers\n(define square\n  (lambda (x) (* x x)))\n\n(define answer 42)\n",
        );
        let f = fixture(vec![dir.path().to_path_buf()]);

        f.importer.import("math.pol").unwrap();
        assert_eq!(f.env.lookup("answer").unwrap(), int(42));
        assert!(matches!(f.env.lookup("square").unwrap(), Value::Lambda(_)));
    }

    #[test]
    fn test_include_dirs_searched_in_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_module(&second, "lib.pol", "(define origin \"second\")");
        let f = fixture(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        f.importer.import("lib.pol").unwrap();
        assert_eq!(f.env.lookup("origin").unwrap(), Value::from("second"));

        // Once both directories hold the module, the earlier one wins
        write_module(&first, "lib.pol", "(define origin \"first\")");
        let f = fixture(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        f.importer.import("lib.pol").unwrap();
        assert_eq!(f.env.lookup("origin").unwrap(), Value::from("first"));
    }

    #[test]
    fn test_literal_path_wins() {
        let dir = TempDir::new().unwrap();
        let path = write_module(&dir, "direct.pol", "(define direct #t)");
        let f = fixture(Vec::new());
        f.importer.import(path.to_str().unwrap()).unwrap();
        assert_eq!(f.env.lookup("direct").unwrap().to_string(), "#t");
        assert_eq!(f.importer.imported(), vec![fs::canonicalize(&path).unwrap()]);
    }

    #[test]
    fn test_import_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = write_module(&dir, "noisy.pol", "(print \"loaded\")");
        let f = fixture(vec![dir.path().to_path_buf()]);

        f.importer.import("noisy.pol").unwrap();
        f.importer.import("noisy.pol").unwrap();
        // Same file through a different spelling
        f.importer.import(path.to_str().unwrap()).unwrap();

        assert_eq!(f.captured.lines(), vec!["loaded"]);
        assert_eq!(f.importer.imported().len(), 1);
    }

    #[test]
    fn test_self_import_terminates() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "a.pol", "(import \"b.pol\")\n(print \"a\")");
        write_module(&dir, "b.pol", "(import \"a.pol\")\n(print \"b\")");
        let f = fixture(vec![dir.path().to_path_buf()]);

        f.importer.import("a.pol").unwrap();
        assert_eq!(f.captured.lines(), vec!["b", "a"]);
    }

    #[test]
    fn test_import_failures() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "broken.pol", "(define x 1)\n(undefined-thing)");
        write_module(&dir, "open.pol", "(define y\n  (+ 1");
        let f = fixture(vec![dir.path().to_path_buf()]);

        assert_eq!(
            f.importer.import("missing.pol").unwrap_err(),
            Error::ImportNotFound("missing.pol".into())
        );
        assert_eq!(
            f.importer.import("broken.pol").unwrap_err(),
            Error::UnboundSymbol("undefined-thing".into())
        );
        assert!(f.importer.imported().is_empty());

        let err = f.importer.import("open.pol").unwrap_err();
        assert!(err.to_string().contains("unfinished statement"), "got {err}");

        // A fixed module can be imported after a failure
        write_module(&dir, "broken.pol", "(define x 2)");
        f.importer.import("broken.pol").unwrap();
        assert_eq!(f.env.lookup("x").unwrap(), int(2));
    }

    #[test]
    fn test_import_builtin() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "one.pol", "(define one 1)");
        write_module(&dir, "two.pol", "(define two 2)");
        let f = fixture(vec![dir.path().to_path_buf()]);

        let evaluator = Evaluator::new();
        let expr = crate::reader::read("(import \"one.pol\" \"two.pol\")").unwrap();
        assert_eq!(evaluator.eval(&expr, &f.env).unwrap().to_string(), "#t");
        assert_eq!(f.env.lookup("two").unwrap(), int(2));
        assert_eq!(f.importer.include_dirs(), &[dir.path().to_path_buf()]);
    }
}
