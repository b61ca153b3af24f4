// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::errors::EvalError;
use crate::value::Literal;

/// Parse a raw comma-separated argument string into typed literals.
///
/// Splitting happens on top-level commas only. An unquoted token is trimmed
/// and auto-typed: `true`/`false` become `Bool`, integer-parseable tokens
/// become `Int`, float-parseable tokens become `Float`, everything else is a
/// `String`. A token wrapped in single quotes is always a `String` with
/// interior whitespace preserved; `''` decodes to a literal `'`.
pub fn parse_arguments(raw: &str) -> Result<Vec<Literal>, EvalError> {
    let mut args = vec![];
    let mut in_string = false;
    let mut start = 0;

    let mut chars = raw.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' if in_string => {
                // '' inside a quoted token is an escaped quote
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            '\'' => in_string = true,
            ',' if !in_string => {
                args.push(convert_token(&raw[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_string {
        return Err(EvalError::malformed(format!(
            "unterminated single quote in '{raw}'"
        )));
    }
    args.push(convert_token(&raw[start..])?);
    Ok(args)
}

/// Parse a single argument token (e.g. the `value` attribute of a node).
pub fn parse_argument(raw: &str) -> Result<Literal, EvalError> {
    convert_token(raw)
}

fn convert_token(token: &str) -> Result<Literal, EvalError> {
    let token = token.trim();
    if let Some(rest) = token.strip_prefix('\'') {
        return unquote(rest, token);
    }
    Ok(match token {
        "true" => Literal::Bool(true),
        "false" => Literal::Bool(false),
        _ => {
            if let Ok(i) = token.parse::<i64>() {
                Literal::Int(i)
            } else if let Ok(f) = token.parse::<f64>() {
                Literal::Float(f)
            } else {
                Literal::String(token.to_string())
            }
        }
    })
}

// `rest` is the token body after the opening quote.
fn unquote(rest: &str, token: &str) -> Result<Literal, EvalError> {
    let mut out = String::with_capacity(rest.len());
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            out.push(c);
            continue;
        }
        if matches!(chars.peek(), Some('\'')) {
            chars.next();
            out.push('\'');
        } else if chars.next().is_some() {
            return Err(EvalError::malformed(format!(
                "unexpected text after closing quote in '{token}'"
            )));
        } else {
            return Ok(Literal::String(out));
        }
    }
    Err(EvalError::malformed(format!(
        "unterminated single quote in '{token}'"
    )))
}
