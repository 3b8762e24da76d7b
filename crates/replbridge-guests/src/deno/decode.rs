//! Probe and payload fragments for Deno, and decoding of their output.
//!
//! The REPL echoes the completion value of every statement, so each
//! diagnostic prints its answer on a line of its own behind
//! [`PAYLOAD_PREFIX`] and everything else in the reply is ignored.

use replbridge_core::{BridgeError, HostValue, Result, Table};
use serde_json::Value;

/// Marks the one line of a reply that carries a diagnostic's answer.
pub(crate) const PAYLOAD_PREFIX: &str = "@@replbridge@@ ";

/// Runtime type of a probed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tag {
    Null,
    Undefined,
    Number,
    String,
    Boolean,
    Array,
    Object,
    Function,
    BigInt,
    Symbol,
    /// Evaluation threw, or the value is an `Error`.
    Error(String),
}

/// Fragment printing `[tag, error]` for `code`.
pub(crate) fn probe_fragment(code: &str) -> String {
    format!(
        "try {{ const __v = ({code}); console.log({p:?} + JSON.stringify(__v instanceof Error \
         ? [\"error\", String(__v)] \
         : [__v === null ? \"null\" : Array.isArray(__v) ? \"array\" : typeof __v, null])); }} \
         catch (__e) {{ console.log({p:?} + JSON.stringify([\"error\", String(__e)])); }}",
        code = code,
        p = PAYLOAD_PREFIX
    )
}

/// Fragment printing the JSON form of `code`, non-finite numbers as text.
pub(crate) fn payload_fragment(code: &str) -> String {
    format!(
        "try {{ const __v = ({code}); console.log({p:?} + JSON.stringify(\
         typeof __v === \"number\" && !Number.isFinite(__v) ? String(__v) : __v)); }} \
         catch (__e) {{ console.log({p:?} + \"null\"); }}",
        code = code,
        p = PAYLOAD_PREFIX
    )
}

/// The prefixed line of a reply, without its prefix.
fn payload_line<'t>(text: &'t str, expression: &str) -> Result<&'t str> {
    text.lines()
        .find_map(|line| line.strip_prefix(PAYLOAD_PREFIX))
        .ok_or_else(|| BridgeError::decode(expression, format!("no payload line in {:?}", text)))
}

/// Parse the output of [`probe_fragment`].
pub(crate) fn parse_probe(text: &str, expression: &str) -> Result<Tag> {
    let line = payload_line(text, expression)?;
    let (tag, error): (String, Option<String>) = serde_json::from_str(line)
        .map_err(|e| BridgeError::decode(expression, format!("bad probe {:?}: {}", line, e)))?;
    Ok(match tag.as_str() {
        "error" => Tag::Error(error.unwrap_or_default()),
        "null" => Tag::Null,
        "undefined" => Tag::Undefined,
        "number" => Tag::Number,
        "string" => Tag::String,
        "boolean" => Tag::Boolean,
        "array" => Tag::Array,
        "function" => Tag::Function,
        "bigint" => Tag::BigInt,
        "symbol" => Tag::Symbol,
        _ => Tag::Object,
    })
}

/// Parse the output of [`payload_fragment`] for a value of type `tag`.
pub(crate) fn decode_payload(tag: &Tag, text: &str, expression: &str) -> Result<HostValue> {
    let line = payload_line(text, expression)?;
    let value: Value = serde_json::from_str(line)
        .map_err(|e| BridgeError::decode(expression, format!("bad payload {:?}: {}", line, e)))?;
    match (tag, value) {
        (Tag::Number, Value::String(special)) => match special.as_str() {
            "NaN" => Ok(HostValue::Float(f64::NAN)),
            "Infinity" => Ok(HostValue::Float(f64::INFINITY)),
            "-Infinity" => Ok(HostValue::Float(f64::NEG_INFINITY)),
            other => Err(BridgeError::decode(expression, format!("not a number: {:?}", other))),
        },
        (_, value) => json_to_host(value, expression),
    }
}

/// Map JSON onto host values. Arrays of objects sharing one key set become
/// tables; other objects have no host form.
pub(crate) fn json_to_host(value: Value, expression: &str) -> Result<HostValue> {
    Ok(match value {
        Value::Null => HostValue::Null,
        Value::Bool(b) => HostValue::Bool(b),
        Value::Number(n) => number(&n),
        Value::String(s) => HostValue::Str(s),
        Value::Array(items) => {
            if let Some(table) = as_table(&items, expression)? {
                HostValue::Table(table)
            } else {
                HostValue::Seq(
                    items
                        .into_iter()
                        .map(|item| json_to_host(item, expression))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
        }
        Value::Object(_) => {
            return Err(BridgeError::unsupported(
                "Deno",
                format!("object inside `{}` to a host value", expression),
            ))
        }
    })
}

fn number(n: &serde_json::Number) -> HostValue {
    if let Some(i) = n.as_i64() {
        return HostValue::Int(i);
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        HostValue::Int(f as i64)
    } else {
        HostValue::Float(f)
    }
}

fn as_table(items: &[Value], expression: &str) -> Result<Option<Table>> {
    let Some(Value::Object(first)) = items.first() else {
        return Ok(None);
    };
    let columns: Vec<String> = first.keys().cloned().collect();
    let uniform = items.iter().all(|item| match item {
        Value::Object(row) => row.len() == columns.len() && columns.iter().all(|c| row.contains_key(c)),
        _ => false,
    });
    if !uniform || columns.is_empty() {
        return Ok(None);
    }

    let mut table = Table::new(columns.iter().cloned());
    for item in items {
        if let Value::Object(row) = item {
            let cells = columns
                .iter()
                .map(|c| json_to_host(row.get(c).cloned().unwrap_or(Value::Null), expression))
                .collect::<Result<Vec<_>>>()?;
            table.push_row(cells)?;
        }
    }
    Ok(Some(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(line: &str) -> String {
        format!("{}{}\nundefined\n", PAYLOAD_PREFIX, line)
    }

    #[test]
    fn test_fragments_are_single_line() {
        assert!(!probe_fragment("x").contains('\n'));
        assert!(!payload_fragment("x").contains('\n'));
        assert!(probe_fragment("fuga").contains("const __v = (fuga);"));
        assert!(payload_fragment("fuga").contains("\"@@replbridge@@ \""));
    }

    #[test]
    fn test_parse_probe() {
        assert_eq!(parse_probe(&reply(r#"["number",null]"#), "x").unwrap(), Tag::Number);
        assert_eq!(parse_probe(&reply(r#"["array",null]"#), "x").unwrap(), Tag::Array);
        assert_eq!(parse_probe(&reply(r#"["function",null]"#), "x").unwrap(), Tag::Function);
        assert_eq!(
            parse_probe(&reply(r#"["error","ReferenceError: ho is not defined"]"#), "ho").unwrap(),
            Tag::Error("ReferenceError: ho is not defined".into())
        );
    }

    #[test]
    fn test_missing_payload_line() {
        assert!(matches!(
            parse_probe("undefined\n", "x"),
            Err(BridgeError::Decode { .. })
        ));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(decode_payload(&Tag::Number, &reply("5"), "x").unwrap(), HostValue::Int(5));
        assert_eq!(decode_payload(&Tag::Number, &reply("2.5"), "x").unwrap(), HostValue::Float(2.5));
        assert_eq!(decode_payload(&Tag::Number, &reply("1e+21"), "x").unwrap(), HostValue::Float(1e21));
        let nan = decode_payload(&Tag::Number, &reply("\"NaN\""), "x").unwrap();
        assert!(nan.as_f64().is_some_and(f64::is_nan));
        assert_eq!(
            decode_payload(&Tag::Number, &reply("\"-Infinity\""), "x").unwrap(),
            HostValue::Float(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn test_arrays() {
        assert_eq!(
            decode_payload(&Tag::Array, &reply("[4,5,5,3]"), "x").unwrap(),
            HostValue::from(vec![4, 5, 5, 3])
        );
        assert_eq!(
            decode_payload(&Tag::Array, &reply("[]"), "x").unwrap(),
            HostValue::Seq(vec![])
        );
    }

    #[test]
    fn test_uniform_objects_become_table() {
        let value = decode_payload(&Tag::Array, &reply(r#"[{"a":1,"b":"x"},{"b":"y","a":2}]"#), "t").unwrap();
        let table = value.as_table().unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows[1], vec![HostValue::Int(2), "y".into()]);
    }

    #[test]
    fn test_ragged_objects_are_unsupported() {
        let result = decode_payload(&Tag::Array, &reply(r#"[{"a":1},{"b":2}]"#), "t");
        assert!(matches!(result, Err(BridgeError::UnsupportedConversion { .. })));
    }
}
