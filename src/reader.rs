//! Tokenizer and recursive-descent parser for s-expression source text.
//!
//! Reading happens in three steps: [`tokenize`] splits text into parentheses and
//! atom tokens, [`classify`] turns a single atom token into a typed cell, and
//! [`parse`] assembles one value from the front of a token stream. [`read`] and
//! [`read_all`] chain them for callers holding plain text.

use nom::{
    IResult, Parser,
    character::complete::{char, digit0, digit1, one_of},
    combinator::{all_consuming, opt, recognize},
    sequence::pair,
};
use std::collections::VecDeque;

use crate::Error;
use crate::MAX_PARSE_DEPTH;
use crate::ast::Value;

/// Token stream consumed front to back by [`parse`]
pub type Tokens = VecDeque<String>;

/// Split source text into tokens.
///
/// Parentheses are always tokens of their own. Everything else runs until
/// whitespace or a parenthesis, except inside a double-quoted section where both
/// are kept. A quote preceded by a backslash does not open or close a section.
pub fn tokenize(text: &str) -> Tokens {
    let mut tokens = Tokens::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' || c == ')' {
            tokens.push_back(c.to_string());
            chars.next();
            continue;
        }

        let mut token = String::new();
        let mut in_string = false;
        let mut escaped = false;
        while let Some(&c) = chars.peek() {
            if !in_string && (c.is_whitespace() || c == '(' || c == ')') {
                break;
            }
            if c == '"' && !escaped {
                in_string = !in_string;
            }
            escaped = c == '\\' && !escaped;
            token.push(c);
            chars.next();
        }
        tokens.push_back(token);
    }

    tokens
}

/// Recognize `[+-]?(digits)?(.digits)?`
fn numeric_literal(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(one_of("+-")),
        digit0,
        opt(pair(char('.'), digit1)),
    ))
    .parse(input)
}

/// Undo the escapes the tokenizer allowed inside a string literal
fn unescape(body: &str) -> String {
    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => result.push(next),
                Some(other) => {
                    result.push(c);
                    result.push(other);
                }
                None => result.push(c),
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Turn a single non-parenthesis token into an atom
pub fn classify(token: &str) -> Value {
    if all_consuming(numeric_literal).parse(token).is_ok()
        && token.chars().any(|c| c.is_ascii_digit())
    {
        return if token.contains('.') {
            Value::Double(token.to_owned())
        } else {
            Value::Integer(token.to_owned())
        };
    }

    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        return Value::String(unescape(&token[1..token.len() - 1]));
    }

    Value::Symbol(token.to_owned())
}

/// Parse exactly one value from the front of `tokens`
pub fn parse(tokens: &mut Tokens) -> Result<Value, Error> {
    parse_with_depth(tokens, 0)
}

fn parse_with_depth(tokens: &mut Tokens, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(Error::malformed(
            "expression",
            format!("too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        ));
    }

    let Some(token) = tokens.pop_front() else {
        return Err(Error::malformed("expression", "unexpected end of input"));
    };

    match token.as_str() {
        "(" => {
            let mut elements = Vec::new();
            loop {
                match tokens.front().map(String::as_str) {
                    Some(")") => {
                        tokens.pop_front();
                        return Ok(Value::List(elements));
                    }
                    Some(_) => elements.push(parse_with_depth(tokens, depth + 1)?),
                    None => return Err(Error::malformed("list", "missing ')'")),
                }
            }
        }
        ")" => Err(Error::malformed("expression", "unexpected ')'")),
        atom => Ok(classify(atom)),
    }
}

/// Read the first complete form in `text`
pub fn read(text: &str) -> Result<Value, Error> {
    parse(&mut tokenize(text))
}

/// Read every top-level form in `text`, in order
pub fn read_all(text: &str) -> Result<Vec<Value>, Error> {
    let mut tokens = tokenize(text);
    let mut forms = Vec::new();
    while !tokens.is_empty() {
        forms.push(parse(&mut tokens)?);
    }
    Ok(forms)
}
