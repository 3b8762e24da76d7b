//! Reading R's printed output back into host values.
//!
//! Every decoder fragment prints one element per line through `writeLines`,
//! so no R print formatting (index prefixes, column wrapping) ever reaches
//! the parsers here.

use crate::csv;
use regex::Regex;
use replbridge_core::{BridgeError, HostValue, Result};
use std::sync::LazyLock;

/// Strips the `[n]` index prefix of R's default vector printing.
static INDEX_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[\d+\]\s?").expect("index prefix regex must compile"));

/// What a value's class says about how to bring it over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Null,
    Double,
    Integer,
    Logical,
    Character,
    Factor,
    DataFrame,
    Matrix,
    /// Functions, lists and environments stay in the guest.
    Remote,
    /// Anything else comes over as its printed form.
    Printed,
}

impl Shape {
    /// Classify from the lines of `class(x)` and `is.vector(x)`.
    pub(crate) fn classify(classes: &[&str], is_vector: bool) -> Shape {
        let has = |name: &str| classes.contains(&name);
        if has("data.frame") {
            Shape::DataFrame
        } else if has("factor") {
            Shape::Factor
        } else if has("matrix") {
            Shape::Matrix
        } else if has("NULL") {
            Shape::Null
        } else if has("function") || has("environment") || has("list") {
            Shape::Remote
        } else if !is_vector {
            Shape::Printed
        } else if has("numeric") {
            Shape::Double
        } else if has("integer") {
            Shape::Integer
        } else if has("logical") {
            Shape::Logical
        } else if has("character") {
            Shape::Character
        } else {
            Shape::Printed
        }
    }

    /// Fragment that prints the value of `code` in decodable form.
    pub(crate) fn fragment(&self, code: &str) -> Option<String> {
        Some(match self {
            Shape::Null | Shape::Remote => return None,
            Shape::Double => format!("writeLines(sprintf(\"%.17g\", {}))", code),
            Shape::Integer | Shape::Logical => format!("writeLines(as.character({}))", code),
            Shape::Character | Shape::Factor => format!(
                "writeLines(ifelse(is.na({0}), \"NA\", encodeString(as.character({0}), quote = '\"')))",
                code
            ),
            Shape::DataFrame => format!("write.csv({}, row.names = FALSE)", code),
            Shape::Matrix => format!("write.csv(as.data.frame({}), row.names = FALSE)", code),
            Shape::Printed => code.to_string(),
        })
    }

    fn is_vector(&self) -> bool {
        matches!(
            self,
            Shape::Double | Shape::Integer | Shape::Logical | Shape::Character | Shape::Factor
        )
    }
}

/// The error text of a failed `class(try(x))` probe, if it failed.
///
/// `Some("")` means the value is a stored `try-error` whose message was
/// not printed.
pub(crate) fn try_error(probe: &str) -> Option<String> {
    let lines: Vec<&str> = probe.lines().collect();
    let (last, before) = lines.split_last()?;
    if last.trim() != "try-error" {
        return None;
    }
    Some(before.join("\n"))
}

/// Parse a non-negative count printed on its own line.
pub(crate) fn parse_count(text: &str, expression: &str) -> Result<usize> {
    let line = strip_index(last_line(text));
    line.parse::<usize>()
        .map_err(|_| BridgeError::decode(expression, format!("expected a length, got {:?}", line)))
}

/// Parse a printed `TRUE`/`FALSE`.
pub(crate) fn parse_flag(text: &str, expression: &str) -> Result<bool> {
    match strip_index(last_line(text)) {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        other => Err(BridgeError::decode(
            expression,
            format!("expected TRUE or FALSE, got {:?}", other),
        )),
    }
}

fn last_line(text: &str) -> &str {
    text.lines().last().unwrap_or("").trim()
}

fn strip_index(line: &str) -> &str {
    match INDEX_PREFIX.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Decode the output of [`Shape::fragment`].
pub(crate) fn decode(shape: Shape, text: &str, length: usize, expression: &str) -> Result<HostValue> {
    match shape {
        Shape::Null => Ok(HostValue::Null),
        Shape::DataFrame | Shape::Matrix => csv::parse_table(text)
            .map(HostValue::Table)
            .map_err(|e| BridgeError::decode(expression, e.to_string())),
        Shape::Printed => Ok(HostValue::Str(text.trim_end().to_string())),
        Shape::Remote => Err(BridgeError::decode(expression, "remote values have no printed form")),
        _ if shape.is_vector() => {
            let lines: Vec<&str> = text.lines().collect();
            if lines.len() != length {
                return Err(BridgeError::decode(
                    expression,
                    format!("expected {} elements, got {} lines", length, lines.len()),
                ));
            }
            let mut items = lines
                .into_iter()
                .map(|line| element(shape, line, expression))
                .collect::<Result<Vec<_>>>()?;
            if items.len() == 1 {
                Ok(items.remove(0))
            } else {
                Ok(HostValue::Seq(items))
            }
        }
        _ => Err(BridgeError::decode(expression, format!("no decoder for {:?}", shape))),
    }
}

fn element(shape: Shape, line: &str, expression: &str) -> Result<HostValue> {
    if line == "NA" {
        return Ok(HostValue::Null);
    }
    let bad = |what: &str| BridgeError::decode(expression, format!("{} {:?}", what, line));
    match shape {
        Shape::Double => parse_double(line).map(HostValue::Float).ok_or_else(|| bad("not a double:")),
        Shape::Integer => line.parse::<i64>().map(HostValue::Int).map_err(|_| bad("not an integer:")),
        Shape::Logical => match line {
            "TRUE" => Ok(HostValue::Bool(true)),
            "FALSE" => Ok(HostValue::Bool(false)),
            _ => Err(bad("not a logical:")),
        },
        _ => unquote(line).map(HostValue::Str).ok_or_else(|| bad("not a quoted string:")),
    }
}

fn parse_double(text: &str) -> Option<f64> {
    match text {
        "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Undo `encodeString(x, quote = '"')`.
pub(crate) fn unquote(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'x' => out.push(hex_char(&mut chars, 2)?),
            'u' => out.push(hex_char(&mut chars, 4)?),
            'U' => out.push(hex_char(&mut chars, 8)?),
            other => out.push(other),
        }
    }
    Some(out)
}

/// Read a hex escape body: either `{...}` or up to `max` hex digits.
fn hex_char(chars: &mut std::str::Chars<'_>, max: usize) -> Option<char> {
    let mut digits = String::new();
    let mut lookahead = chars.clone();
    if lookahead.next() == Some('{') {
        *chars = lookahead;
        for c in chars.by_ref() {
            if c == '}' {
                break;
            }
            digits.push(c);
        }
    } else {
        while digits.len() < max {
            let mut peek = chars.clone();
            match peek.next() {
                Some(c) if c.is_ascii_hexdigit() => {
                    digits.push(c);
                    *chars = peek;
                }
                _ => break,
            }
        }
    }
    u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
}
