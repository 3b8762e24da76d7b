//! Host values as R source text.

use regex::Regex;
use replbridge_core::{HostValue, LiteralTable, Result, Table};
use std::fmt::Write as _;
use std::sync::LazyLock;

/// R reads console input in lines of at most 4096 bytes; long vectors are
/// broken well before that.
const MAX_LINE: usize = 1024;

static SYNTACTIC_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z]|\.[A-Za-z._]|\.$)[A-Za-z0-9._]*$").expect("valid regex")
});

pub(crate) static R_LITERALS: LiteralTable = LiteralTable::new(
    "R",
    Some(scalar_literal),
    Some(sequence_literal),
    Some(table_literal),
);

/// Quote `name` with back-ticks unless it is already a syntactic R name.
pub(crate) fn quote_name(name: &str) -> String {
    if SYNTACTIC_NAME.is_match(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Longest single string token written to R, quotes included.
const STRING_CHUNK: usize = MAX_LINE / 2;

fn escape_char(c: char, out: &mut String) {
    match c {
        '"' => out.push_str("\\\""),
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if c.is_control() => {
            let _ = write!(out, "\\u{{{:x}}}", c as u32);
        }
        c => out.push(c),
    }
}

/// Double-quoted R string literal.
///
/// Text longer than [`STRING_CHUNK`] is split into pieces glued back
/// together with `paste0`, wrapped like any other argument list.
pub(crate) fn string_literal(text: &str) -> String {
    let mut chunks = Vec::new();
    let mut current = String::from("\"");
    let mut escaped = String::new();
    for c in text.chars() {
        escaped.clear();
        escape_char(c, &mut escaped);
        if current.len() + escaped.len() + 1 > STRING_CHUNK {
            current.push('"');
            chunks.push(std::mem::replace(&mut current, String::from("\"")));
        }
        current.push_str(&escaped);
    }
    current.push('"');
    if chunks.is_empty() {
        return current;
    }
    chunks.push(current);
    wrap_items("paste0(", chunks)
}

fn double_literal(value: f64) -> String {
    if value.is_nan() {
        "NaN".into()
    } else if value.is_infinite() {
        if value > 0.0 { "Inf" } else { "-Inf" }.into()
    } else {
        // Debug formatting is the shortest text that round-trips.
        format!("{:?}", value)
    }
}

fn int_literal(value: i64) -> String {
    // i32::MIN is NA_integer_ in R.
    if value > i64::from(i32::MIN) && value <= i64::from(i32::MAX) {
        format!("{}L", value)
    } else {
        double_literal(value as f64)
    }
}

/// A scalar in element position, where missing values are `NA`.
fn element(value: &HostValue) -> Result<String> {
    match value {
        HostValue::Null => Ok("NA".into()),
        other => scalar_literal(other),
    }
}

pub(crate) fn scalar_literal(value: &HostValue) -> Result<String> {
    Ok(match value {
        HostValue::Null => "NULL".into(),
        HostValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.into(),
        HostValue::Int(n) => int_literal(*n),
        HostValue::Float(f) => double_literal(*f),
        HostValue::Str(s) => string_literal(s),
        HostValue::Seq(_) => return sequence_literal(value),
        HostValue::Table(table) => return render_table(table),
    })
}

/// Join rendered items inside `open ... )`, starting a new line before any
/// item that would push the current one past [`MAX_LINE`].
///
/// Items may span lines themselves; only their first line has to fit.
fn wrap_items(open: &str, items: Vec<String>) -> String {
    let mut out = String::from(open);
    let mut line_len = out.len();
    for (i, item) in items.into_iter().enumerate() {
        let head = item.find('\n').unwrap_or(item.len());
        if i > 0 {
            out.push(',');
            line_len += 1;
            // Room for ", item" plus the comma or paren that follows it.
            if line_len + 1 + head + 1 > MAX_LINE {
                out.push('\n');
                line_len = 0;
            } else {
                out.push(' ');
                line_len += 1;
            }
        }
        out.push_str(&item);
        line_len = match item.rfind('\n') {
            Some(pos) => item.len() - pos - 1,
            None => line_len + item.len(),
        };
    }
    out.push(')');
    out
}

/// `c(...)` for flat sequences, `list(...)` once anything nests.
pub(crate) fn sequence_literal(value: &HostValue) -> Result<String> {
    let Some(items) = value.as_seq() else {
        return scalar_literal(value);
    };
    let nested = items
        .iter()
        .any(|item| matches!(item, HostValue::Seq(_) | HostValue::Table(_)));
    if nested {
        let rendered = items.iter().map(scalar_literal).collect::<Result<Vec<_>>>()?;
        return Ok(wrap_items("list(", rendered));
    }
    let rendered = items.iter().map(element).collect::<Result<Vec<_>>>()?;
    Ok(wrap_items("c(", rendered))
}

pub(crate) fn table_literal(value: &HostValue) -> Result<String> {
    match value.as_table() {
        Some(table) => render_table(table),
        None => scalar_literal(value),
    }
}

/// `data.frame(col = c(...), ...)` built column by column.
///
/// Column names too long to stay on one line are attached afterwards with
/// `structure(..., names = c(...))`, where they can be split like any
/// other string.
fn render_table(table: &Table) -> Result<String> {
    let long_names = table
        .columns
        .iter()
        .any(|name| quote_name(name).len() + 2 > STRING_CHUNK);

    let mut columns = Vec::with_capacity(table.columns.len() + 2);
    for (idx, name) in table.columns.iter().enumerate() {
        let cells = table
            .rows
            .iter()
            .map(|row| element(&row[idx]))
            .collect::<Result<Vec<_>>>()?;
        let vector = wrap_items("c(", cells);
        if long_names {
            columns.push(vector);
        } else {
            columns.push(format!("{} = {}", quote_name(name), vector));
        }
    }
    columns.push("check.names = FALSE".into());
    columns.push("stringsAsFactors = FALSE".into());
    let frame = wrap_items("data.frame(", columns);
    if !long_names {
        return Ok(frame);
    }

    let names = table.columns.iter().map(|name| string_literal(name)).collect();
    Ok(wrap_items(
        "structure(",
        vec![frame, format!("names = {}", wrap_items("c(", names))],
    ))
}
