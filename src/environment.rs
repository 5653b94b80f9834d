use crate::Error;
use crate::ast::{NativeProcedure, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One lexical scope: name to value mapping plus the enclosing frame
#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// Shared handle to an environment frame.
///
/// Cloning the handle shares the frame; it never copies bindings. A child only
/// points at its parent, so sibling lambda calls see the same enclosing frame,
/// including bindings added to it after the lambda was created.
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Environment {
    /// Create a root environment with no parent
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty frame whose parent is `parent`
    pub fn with_parent(parent: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    /// Create a frame binding `params` to `args` positionally.
    /// Surplus arguments are dropped and surplus parameters stay unbound.
    pub fn with_bindings(params: &[String], args: Vec<Value>, parent: &Environment) -> Self {
        let env = Self::with_parent(parent);
        {
            let mut frame = env.0.borrow_mut();
            for (param, arg) in params.iter().zip(args) {
                frame.bindings.insert(param.clone(), arg);
            }
        }
        env
    }

    pub fn parent(&self) -> Option<Environment> {
        self.0.borrow().parent.clone()
    }

    /// Write into this frame, creating or replacing the binding
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Whether this frame itself binds `name`
    pub fn contains_local(&self, name: &str) -> bool {
        self.0.borrow().bindings.contains_key(name)
    }

    /// Locate the innermost frame binding `name`
    pub fn find(&self, name: &str) -> Result<Environment, Error> {
        let mut current = self.clone();
        loop {
            if current.contains_local(name) {
                return Ok(current);
            }
            let Some(parent) = current.parent() else {
                return Err(Error::UnboundSymbol(name.to_owned()));
            };
            current = parent;
        }
    }

    /// Resolve `name` innermost-first
    pub fn get(&self, name: &str) -> Option<Value> {
        let frame = self.0.borrow();
        match frame.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => frame.parent.as_ref().and_then(|parent| parent.get(name)),
        }
    }

    /// Resolve `name` innermost-first, failing when nothing binds it
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnboundSymbol(name.to_owned()))
    }

    /// Overwrite an existing binding in the frame that owns it
    pub fn set(&self, name: &str, value: Value) -> Result<Value, Error> {
        let owner = self.find(name)?;
        owner.define(name, value.clone());
        Ok(value)
    }

    /// Bind a host closure as a native procedure in this frame.
    ///
    /// # Example
    /// ```
    /// use polaris::interpreter::Interpreter;
    /// use polaris::ast::{Value, int};
    ///
    /// let interp = Interpreter::new();
    /// interp.environment().register_native("argc", |args: &[Value]| Ok(int(args.len() as i64)));
    /// assert_eq!(interp.eval_str("(argc 1 2 3)").unwrap(), int(3));
    /// ```
    pub fn register_native<F>(&self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, Error> + 'static,
    {
        self.define(
            name,
            Value::NativeProcedure(NativeProcedure::new(name, func)),
        );
    }

    /// Get all bindings visible from this frame, inner bindings shadowing outer
    /// ones. Returns (name, value) pairs sorted by name.
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        if let Some(parent) = self.parent() {
            bindings.extend(parent.bindings());
        }

        for (name, value) in &self.0.borrow().bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Drop every binding of this frame.
    /// Lambdas stored in a frame hold that frame alive through their captured
    /// environment; clearing is how an owner releases such a loop.
    pub fn clear(&self) {
        // Take the map out first so dropped values never observe a borrowed frame
        let bindings = std::mem::take(&mut self.0.borrow_mut().bindings);
        drop(bindings);
    }

    /// Whether two handles refer to the same frame
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let frame = self.0.borrow();
        f.debug_struct("Environment")
            .field("bindings", &frame.bindings.len())
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}
