//! Built-in procedure library.
//!
//! [`add_globals`] installs the constants `nil`, `#t` and `#f` and every procedure
//! below into a root environment:
//!
//! ```scheme
//! (print "x = " x)        ; writes one line, returns #t
//! (car (list 1 2))        ; 1
//! (cdr (list 1))          ; nil, not ()
//! (eq 1 2 1)              ; #t - only the last comparison counts
//! (+ 1 2.5)               ; 3.500000
//! (ref 1 "a")             ; (integer string)
//! (import "lib.pol")      ; evaluate a module once
//! ```
//!
//! ## Numbers
//!
//! Atoms keep their source text, so arithmetic and comparison read each operand's
//! text as a number; a string such as `"2.5"` is a valid operand. The result is
//! Integer-tagged unless some operand is Double-tagged. Folds over integer text are
//! checked; otherwise the fold runs in floating point and an Integer-tagged result
//! is truncated at the end. Overflow and integer division by zero are `NumericRange`
//! errors, unreadable text is a `NumericConversion` error.
//!
//! ## Adding New Procedures
//!
//! 1. **Implement the function** with the signature `fn(args: &[Value]) -> Result<Value, Error>`
//! 2. **Add it to BUILTIN_OPS** under the name scripts call it by
//! 3. Procedures that need session state (output, importer) are closures registered
//!    directly by [`add_globals`]

use crate::Error;
use crate::ast::{FALSE_SYMBOL, NIL_SYMBOL, TRUE_SYMBOL, Tag, Value, format_double, nil};
use crate::environment::Environment;
use crate::importer::Importer;
use crate::output::Output;
use nom::IResult;
use std::cmp::Ordering;
use std::num::IntErrorKind;
use std::rc::{Rc, Weak};

/// Definition of a stateless built-in procedure
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOp {
    /// The name this procedure is bound to
    pub name: &'static str,
    pub func: fn(&[Value]) -> Result<Value, Error>,
}

//
// Argument helpers
//

fn nth_arg<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a Value, Error> {
    args.get(index).ok_or_else(|| {
        Error::malformed(
            name,
            format!("expected at least {} argument(s), got {}", index + 1, args.len()),
        )
    })
}

/// A number read from an operand's text. The representation follows the text;
/// whether a result is Double-tagged is decided by the operand tags alone.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Integer(i64),
    Double(f64),
}

impl Number {
    fn from_value(value: &Value, op: &str) -> Result<Number, Error> {
        let text = value.text();
        if value.tag() != Tag::Double {
            match text.parse::<i64>() {
                Ok(n) => return Ok(Number::Integer(n)),
                Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                    return Err(Error::NumericRange(format!("{op}: '{text}' does not fit an integer")));
                }
                Err(_) => {}
            }
        }
        text.parse::<f64>()
            .map(Number::Double)
            .map_err(|_| Error::NumericConversion(format!("{op} cannot read '{value}' as a number")))
    }

    fn as_integer(self) -> Option<i64> {
        match self {
            Number::Integer(n) => Some(n),
            Number::Double(_) => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Double(d) => d,
        }
    }

    fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

/// Fold `operands` left to right, starting from `identity` when given and from the
/// first operand otherwise.
///
/// Integer text with no Double-tagged operand is folded with checked `i64` steps; a
/// failed step with a zero operand is a division by zero, any other an overflow.
/// Everything else accumulates in floating point and only the final value is shaped:
/// Double-tagged when some operand is, truncated to an integer otherwise.
fn fold_numbers(
    op: &str,
    operands: &[Value],
    identity: Option<i64>,
    int_step: fn(i64, i64) -> Option<i64>,
    float_step: fn(f64, f64) -> f64,
) -> Result<Value, Error> {
    let double_tagged = operands.iter().any(|value| value.tag() == Tag::Double);
    let mut numbers: Vec<Number> = identity.map(Number::Integer).into_iter().collect();
    for value in operands {
        numbers.push(Number::from_value(value, op)?);
    }
    let Some((&first, rest)) = numbers.split_first() else {
        return Err(Error::malformed(op, "expected at least 1 argument(s), got 0"));
    };

    if !double_tagged
        && let Some(integers) = numbers.iter().map(|n| n.as_integer()).collect::<Option<Vec<_>>>()
        && let Some((&seed, steps)) = integers.split_first()
    {
        let mut total = seed;
        for &b in steps {
            total = match int_step(total, b) {
                Some(n) => n,
                None if b == 0 => {
                    return Err(Error::NumericRange(format!("division by zero in {op}")));
                }
                None => return Err(Error::NumericRange(format!("integer overflow in {op}"))),
            };
        }
        return Ok(Value::Integer(total.to_string()));
    }

    let total = rest
        .iter()
        .fold(first.as_f64(), |acc, n| float_step(acc, n.as_f64()));
    if double_tagged {
        return Ok(Value::Double(format_double(total)));
    }

    let truncated = total.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(Error::NumericRange(format!("{op}: {total} does not fit an integer")));
    }
    Ok(Value::Integer((truncated as i64).to_string()))
}

//
// Builtin Function Implementations
//

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    fold_numbers("+", args, Some(0), i64::checked_add, |a, b| a + b)
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    fold_numbers("-", args, None, i64::checked_sub, |a, b| a - b)
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    fold_numbers("*", args, Some(1), i64::checked_mul, |a, b| a * b)
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    fold_numbers("/", args, None, i64::checked_div, |a, b| a / b)
}

// Macro to generate numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op_str:expr, $holds:pat) => {
        /// Every later operand is compared against the first one
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let first = Number::from_value(nth_arg(args, 0, $op_str)?, $op_str)?;
            for value in &args[1..] {
                let other = Number::from_value(value, $op_str)?;
                if !matches!(first.compare(other), Some($holds)) {
                    return Ok(Value::truth(false));
                }
            }
            Ok(Value::truth(true))
        }
    };
}

numeric_comparison!(builtin_gt, ">", Ordering::Greater);
numeric_comparison!(builtin_lt, "<", Ordering::Less);
numeric_comparison!(builtin_le, "<=", Ordering::Less | Ordering::Equal);
numeric_comparison!(builtin_ge, ">=", Ordering::Greater | Ordering::Equal);

/// Only the comparison of the last argument against the first decides the result
fn last_pairwise_equal(args: &[Value], name: &str) -> Result<bool, Error> {
    let first = nth_arg(args, 0, name)?;
    Ok(args[1..]
        .iter()
        .fold(false, |_, other| first.same_atom(other)))
}

fn builtin_eq(args: &[Value]) -> Result<Value, Error> {
    last_pairwise_equal(args, "eq").map(Value::truth)
}

fn builtin_neq(args: &[Value]) -> Result<Value, Error> {
    last_pairwise_equal(args, "neq").map(|equal| Value::truth(!equal))
}

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    match nth_arg(args, 0, "car")?.children().first() {
        Some(first) => Ok(first.clone()),
        None => Err(Error::malformed("car", "car of empty list")),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    let children = nth_arg(args, 0, "cdr")?.children();
    if children.len() < 2 {
        return Ok(nil());
    }
    Ok(Value::List(children[1..].to_vec()))
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    let head = nth_arg(args, 0, "cons")?;
    let tail = nth_arg(args, 1, "cons")?;
    let mut list = Vec::with_capacity(tail.children().len() + 1);
    list.push(head.clone());
    list.extend_from_slice(tail.children());
    Ok(Value::List(list))
}

fn builtin_append(args: &[Value]) -> Result<Value, Error> {
    let front = nth_arg(args, 0, "append")?;
    let back = nth_arg(args, 1, "append")?;
    let mut list = front.children().to_vec();
    list.extend_from_slice(back.children());
    Ok(Value::List(list))
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.to_vec()))
}

fn builtin_length(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::from(nth_arg(args, 0, "length")?.children().len()))
}

fn builtin_null(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::truth(nth_arg(args, 0, "null?")?.children().is_empty()))
}

fn builtin_ref(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(
        args.iter()
            .map(|value| Value::String(value.tag().type_name().to_owned()))
            .collect(),
    ))
}

fn builtin_exit(args: &[Value]) -> Result<Value, Error> {
    let Some(code) = args.first() else {
        return Err(Error::Exit(0));
    };
    // Only the leading integer counts, so `3.0` exits with 3
    let parsed: IResult<&str, i32> = nom::character::complete::i32(code.text());
    match parsed {
        Ok((_, code)) => Err(Error::Exit(code)),
        Err(_) => Err(Error::NumericConversion(format!(
            "exit: failed to cast return code '{code}'"
        ))),
    }
}

/// Registry of the stateless built-in procedures
pub const BUILTIN_OPS: &[BuiltinOp] = &[
    // Arithmetic operations
    BuiltinOp { name: "+", func: builtin_add },
    BuiltinOp { name: "-", func: builtin_sub },
    BuiltinOp { name: "*", func: builtin_mul },
    BuiltinOp { name: "/", func: builtin_div },
    // Comparison operations
    BuiltinOp { name: ">", func: builtin_gt },
    BuiltinOp { name: "<", func: builtin_lt },
    BuiltinOp { name: "<=", func: builtin_le },
    BuiltinOp { name: ">=", func: builtin_ge },
    // Equality
    BuiltinOp { name: "eq", func: builtin_eq },
    BuiltinOp { name: "neq", func: builtin_neq },
    // List operations
    BuiltinOp { name: "car", func: builtin_car },
    BuiltinOp { name: "cdr", func: builtin_cdr },
    BuiltinOp { name: "cons", func: builtin_cons },
    BuiltinOp { name: "append", func: builtin_append },
    BuiltinOp { name: "list", func: builtin_list },
    BuiltinOp { name: "length", func: builtin_length },
    BuiltinOp { name: "null?", func: builtin_null },
    // Control and utility
    BuiltinOp { name: "ref", func: builtin_ref },
    BuiltinOp { name: "exit", func: builtin_exit },
];

/// Find a stateless builtin by name
pub fn find_builtin_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_OPS.iter().find(|op| op.name == name)
}

/// Install the constants and the whole procedure library into `env`.
///
/// `print` writes to `output`. `import` reaches `importer` through a weak handle:
/// the importer owns the root environment, so a strong one would keep both alive
/// forever.
pub fn add_globals(env: &Environment, importer: &Rc<Importer>, output: &Output) {
    for constant in [NIL_SYMBOL, TRUE_SYMBOL, FALSE_SYMBOL] {
        env.define(constant, Value::Symbol(constant.to_owned()));
    }

    for op in BUILTIN_OPS {
        env.register_native(op.name, op.func);
    }

    let output = output.clone();
    env.register_native("print", move |args: &[Value]| {
        let line: String = args.iter().map(ToString::to_string).collect();
        output.write_line(&line)?;
        Ok(Value::truth(true))
    });

    let importer: Weak<Importer> = Rc::downgrade(importer);
    env.register_native("import", move |args: &[Value]| {
        if args.is_empty() {
            return Err(Error::malformed("import", "no module given"));
        }
        let Some(importer) = importer.upgrade() else {
            return Err(Error::malformed("import", "importer is no longer available"));
        };
        for module in args {
            importer.import(module.text())?;
        }
        Ok(Value::truth(true))
    });
}
