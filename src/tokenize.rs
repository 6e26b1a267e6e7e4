// src/tokenize.rs

//! Shell-like splitting of matrix file lines.
//!
//! Numeric data never needs quoting, so the common case borrows slices of the
//! line directly. Quoted tokens and backslash escapes follow POSIX shell rules:
//! single quotes are literal, double quotes honour `\"` and `\\`.

use std::borrow::Cow;

/// Splits `line` into whitespace-separated tokens, honouring shell quoting.
///
/// Returns an error message when a quote is left open or the line ends in a
/// dangling backslash.
pub fn split_line(line: &str) -> Result<Vec<Cow<'_, str>>, String> {
    if !line.contains(['\'', '"', '\\']) {
        return Ok(line.split_whitespace().map(Cow::Borrowed).collect());
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(Cow::Owned(std::mem::take(&mut current)));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => current.push(inner),
                        None => return Err("no closing single quotation".to_string()),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => current.push(escaped),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => return Err("no closing double quotation".to_string()),
                        },
                        Some(inner) => current.push(inner),
                        None => return Err("no closing double quotation".to_string()),
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err("no escaped character after backslash".to_string()),
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }
    if in_token {
        tokens.push(Cow::Owned(current));
    }
    Ok(tokens)
}
