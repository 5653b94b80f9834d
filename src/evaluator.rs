use crate::Error;
use crate::MAX_EVAL_DEPTH;
use crate::ast::{Lambda, Value, nil};
use crate::environment::Environment;
use std::collections::HashMap;
use std::rc::Rc;

/// Grow the stack once less than this much remains
const RED_ZONE: usize = 100 * 1024;

/// Size of each additional stack segment
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Special forms receive the evaluator, their unevaluated arguments (the list minus
/// its head), the current environment and the current evaluation depth
pub(crate) type SpecialForm = fn(&Evaluator, &[Value], &Environment, usize) -> Result<Value, Error>;

/// Tree-walking evaluator.
///
/// The special-form table is built once by [`Evaluator::new`] and never changes
/// afterwards, so one evaluator can be shared by every feeder and importer of a
/// session.
pub struct Evaluator {
    special_forms: HashMap<&'static str, SpecialForm>,
    max_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut forms: Vec<_> = self.special_forms.keys().collect();
        forms.sort();
        f.debug_struct("Evaluator")
            .field("special_forms", &forms)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        let special_forms: HashMap<&'static str, SpecialForm> = [
            ("quote", eval_quote as SpecialForm),
            ("if", eval_if),
            ("set!", eval_set),
            ("define", eval_define),
            ("lambda", eval_lambda),
            ("begin", eval_begin),
        ]
        .into_iter()
        .collect();

        Evaluator {
            special_forms,
            max_depth: MAX_EVAL_DEPTH,
        }
    }

    /// Replace the evaluation depth limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether `name` heads a special form
    pub fn is_special_form(&self, name: &str) -> bool {
        self.special_forms.contains_key(name)
    }

    /// Evaluate an expression (public API)
    pub fn eval(&self, expr: &Value, env: &Environment) -> Result<Value, Error> {
        self.eval_with_depth_tracking(expr, env, 0)
    }

    /// Evaluate an expression with depth tracking to prevent stack overflow
    fn eval_with_depth_tracking(
        &self,
        expr: &Value,
        env: &Environment,
        depth: usize,
    ) -> Result<Value, Error> {
        if depth >= self.max_depth {
            return Err(Error::DepthLimitExceeded(self.max_depth));
        }
        match expr {
            Value::Symbol(name) => env.lookup(name),

            Value::Integer(_)
            | Value::Double(_)
            | Value::String(_)
            | Value::NativeProcedure(_)
            | Value::Lambda(_) => Ok(expr.clone()),

            Value::List(elements) => stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || {
                self.eval_list(elements, env, depth)
            }),
        }
    }

    fn eval_list(&self, elements: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
        // Special forms get the unevaluated tail and decide what to evaluate
        if let [Value::Symbol(head), args @ ..] = elements
            && let Some(form) = self.special_forms.get(head.as_str())
        {
            return form(self, args, env, depth);
        }

        match elements {
            [] => Ok(nil()),

            [proc_expr, arg_exprs @ ..] => {
                let procedure = self.eval_with_depth_tracking(proc_expr, env, depth + 1)?;
                // Left to right; the order is observable through side effects
                let args = arg_exprs
                    .iter()
                    .map(|arg| self.eval_with_depth_tracking(arg, env, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply_with_depth(&procedure, args, depth)
            }
        }
    }

    /// Apply a procedure value to already evaluated arguments
    pub fn apply(&self, procedure: &Value, args: Vec<Value>) -> Result<Value, Error> {
        self.apply_with_depth(procedure, args, 0)
    }

    fn apply_with_depth(
        &self,
        procedure: &Value,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, Error> {
        match procedure {
            Value::Lambda(lambda) => {
                tracing::trace!(params = ?lambda.params, argc = args.len(), "applying lambda");
                // Parent is the captured environment, not the caller's
                let frame = Environment::with_bindings(&lambda.params, args, &lambda.env);
                self.eval_with_depth_tracking(&lambda.body, &frame, depth + 1)
            }
            Value::NativeProcedure(native) => {
                tracing::trace!(name = %native.name, argc = args.len(), "applying native procedure");
                native.call(&args)
            }
            other => Err(Error::NotCallable(other.to_string())),
        }
    }
}

/// Evaluate quote special form
fn eval_quote(
    _evaluator: &Evaluator,
    args: &[Value],
    _env: &Environment,
    _depth: usize,
) -> Result<Value, Error> {
    match args {
        [expr, ..] => Ok(expr.clone()),
        [] => Err(Error::malformed("quote", "missing expression")),
    }
}

/// Evaluate if special form. Only a test rendering as `#f` selects the else branch.
fn eval_if(
    evaluator: &Evaluator,
    args: &[Value],
    env: &Environment,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [test_expr, then_expr, rest @ ..] => {
            let test = evaluator.eval_with_depth_tracking(test_expr, env, depth + 1)?;
            if test.is_false() {
                match rest.first() {
                    Some(else_expr) => evaluator.eval_with_depth_tracking(else_expr, env, depth + 1),
                    None => Ok(nil()),
                }
            } else {
                evaluator.eval_with_depth_tracking(then_expr, env, depth + 1)
            }
        }
        _ => Err(Error::malformed("if", "expected a test and a then branch")),
    }
}

/// Evaluate set! special form
fn eval_set(
    evaluator: &Evaluator,
    args: &[Value],
    env: &Environment,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = evaluator.eval_with_depth_tracking(expr, env, depth + 1)?;
            env.set(name, value)
        }
        [_, _] => Err(Error::malformed("set!", "target must be a symbol")),
        _ => Err(Error::malformed("set!", "expected a name and a value")),
    }
}

/// Evaluate define special form. Always binds in the innermost frame.
fn eval_define(
    evaluator: &Evaluator,
    args: &[Value],
    env: &Environment,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = evaluator.eval_with_depth_tracking(expr, env, depth + 1)?;
            env.define(name.clone(), value.clone());
            Ok(value)
        }
        [_, _] => Err(Error::malformed("define", "name must be a symbol")),
        _ => Err(Error::malformed("define", "expected a name and a value")),
    }
}

/// Evaluate lambda special form
fn eval_lambda(
    _evaluator: &Evaluator,
    args: &[Value],
    env: &Environment,
    _depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::List(param_list), body] => {
            let params = param_list
                .iter()
                .map(|param| match param {
                    Value::Symbol(name) => Ok(name.clone()),
                    other => Err(Error::malformed(
                        "lambda",
                        format!("parameter {other} is not a symbol"),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;

            // The captured frame is fixed now and never rebound
            Ok(Value::Lambda(Rc::new(Lambda {
                params,
                body: body.clone(),
                env: Environment::with_parent(env),
            })))
        }
        [_, _] => Err(Error::malformed("lambda", "parameters must be a list")),
        _ => Err(Error::malformed(
            "lambda",
            "expected a parameter list and a single body",
        )),
    }
}

/// Evaluate begin special form
fn eval_begin(
    evaluator: &Evaluator,
    args: &[Value],
    env: &Environment,
    depth: usize,
) -> Result<Value, Error> {
    let Some((last, effects)) = args.split_last() else {
        return Ok(nil());
    };
    for expr in effects {
        evaluator.eval_with_depth_tracking(expr, env, depth + 1)?;
    }
    evaluator.eval_with_depth_tracking(last, env, depth + 1)
}
