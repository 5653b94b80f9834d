//! This module defines the cell type, [`Value`], shared by the reader, the evaluator
//! and the builtin library. Atoms keep their source text as payload: numbers are
//! parsed on demand by the arithmetic builtins, which is what lets `2.0` render back
//! as `2.0` and lets equality compare tag and text only. Lists own their children;
//! lambdas own their parameter names, body and captured environment; native
//! procedures wrap a Rust closure. Helper functions such as [`sym`], [`int`] and
//! [`nil`] keep AST construction short in code and tests.

use crate::Error;
use crate::environment::Environment;
use std::rc::Rc;

/// Symbol rendered by a false test in `if`
pub const FALSE_SYMBOL: &str = "#f";
/// Canonical true symbol returned by predicates
pub const TRUE_SYMBOL: &str = "#t";
/// The nil constant, a symbol rather than an empty list
pub const NIL_SYMBOL: &str = "nil";

/// Rendering placeholder for lambdas
pub const LAMBDA_PLACEHOLDER: &str = "<Lambda>";
/// Rendering placeholder for native procedures
pub const NATIVE_PLACEHOLDER: &str = "<Proc>";

/// Canonical erased signature of a host-provided procedure
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, Error>;

/// Host-provided procedure. Compared by name.
#[derive(Clone)]
pub struct NativeProcedure {
    pub name: String,
    pub func: Rc<NativeFn>,
}

impl NativeProcedure {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + 'static,
    {
        NativeProcedure {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, Error> {
        (self.func)(args)
    }
}

/// A closure: parameter names, a single body expression and the frame captured
/// when the `lambda` form was evaluated
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Value,
    pub env: Environment,
}

/// Tag of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Symbol,
    Integer,
    Double,
    String,
    List,
    NativeProcedure,
    Lambda,
}

impl Tag {
    /// Name reported by the `ref` builtin
    pub fn type_name(self) -> &'static str {
        match self {
            Tag::Symbol => "symbol",
            Tag::Integer => "integer",
            Tag::Double => "double",
            Tag::String => "string",
            Tag::List => "list",
            Tag::NativeProcedure => "procedure",
            Tag::Lambda => "lambda",
        }
    }
}

/// Core cell type of the interpreter
#[derive(Clone)]
pub enum Value {
    /// Identifiers, including `nil`, `#t` and `#f`
    Symbol(String),
    /// Integer literal or integer arithmetic result, as text
    Integer(String),
    /// Floating literal or floating arithmetic result, as text
    Double(String),
    /// String literal with the surrounding quotes stripped
    String(String),
    /// Ordered children; position is significant
    List(Vec<Value>),
    NativeProcedure(NativeProcedure),
    Lambda(Rc<Lambda>),
}

impl Value {
    pub fn tag(&self) -> Tag {
        match self {
            Value::Symbol(_) => Tag::Symbol,
            Value::Integer(_) => Tag::Integer,
            Value::Double(_) => Tag::Double,
            Value::String(_) => Tag::String,
            Value::List(_) => Tag::List,
            Value::NativeProcedure(_) => Tag::NativeProcedure,
            Value::Lambda(_) => Tag::Lambda,
        }
    }

    /// Textual payload. Lists and procedures carry none.
    pub fn text(&self) -> &str {
        match self {
            Value::Symbol(s) | Value::Integer(s) | Value::Double(s) | Value::String(s) => s,
            Value::List(_) | Value::NativeProcedure(_) | Value::Lambda(_) => "",
        }
    }

    /// Child sequence. Atoms and procedures have none.
    pub fn children(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            _ => &[],
        }
    }

    /// Whether this is a symbol with the given name
    pub fn is_symbol(&self, name: &str) -> bool {
        matches!(self, Value::Symbol(s) if s == name)
    }

    /// Whether this value renders as the false symbol, whatever its tag.
    /// Lists and procedures never render as an atom, so only atom text is checked.
    pub fn is_false(&self) -> bool {
        self.text() == FALSE_SYMBOL
    }

    /// Whether both values share tag and textual payload (the `eq` relation)
    pub fn same_atom(&self, other: &Value) -> bool {
        self.tag() == other.tag() && self.text() == other.text()
    }

    pub fn nil() -> Value {
        Value::Symbol(NIL_SYMBOL.to_owned())
    }

    pub fn truth(b: bool) -> Value {
        Value::Symbol(if b { TRUE_SYMBOL } else { FALSE_SYMBOL }.to_owned())
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Integer(s) => write!(f, "Integer({s})"),
            Value::Double(s) => write!(f, "Double({s})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::NativeProcedure(native) => write!(f, "NativeProcedure({})", native.name),
            Value::Lambda(lambda) => {
                write!(f, "Lambda(params={:?}, body={:?})", lambda.params, lambda.body)
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::Lambda(_) => write!(f, "{LAMBDA_PLACEHOLDER}"),
            Value::NativeProcedure(_) => write!(f, "{NATIVE_PLACEHOLDER}"),
            atom => write!(f, "{}", atom.text()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a == b,
            (Value::NativeProcedure(a), Value::NativeProcedure(b)) => a.name == b.name,
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::List(_) | Value::NativeProcedure(_) | Value::Lambda(_), _)
            | (_, Value::List(_) | Value::NativeProcedure(_) | Value::Lambda(_)) => false,
            _ => self.same_atom(other),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::truth(b)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(n.to_string())
            }
        }
    };
}

impl_from_integer!(i32);
impl_from_integer!(i64);
impl_from_integer!(usize);

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(format_double(n))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

/// Text of a floating arithmetic result: fixed six decimals
pub(crate) fn format_double(n: f64) -> String {
    format!("{n:.6}")
}

/// Helper function for creating symbols
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating integer cells
pub fn int(n: i64) -> Value {
    Value::Integer(n.to_string())
}

/// Helper function for creating Values from Rust literals
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// The nil constant
pub fn nil() -> Value {
    Value::nil()
}
