//! Minimal CSV reader for tables printed by guests.
//!
//! Handles the dialect R's `write.csv` produces: comma separated, fields
//! optionally double-quoted, embedded quotes doubled. Quoted fields are
//! always text; bare fields are typed by their spelling.

use replbridge_core::{BridgeError, HostValue, Result, Table};

/// One parsed field.
#[derive(Debug, Clone, PartialEq)]
enum Field {
    Quoted(String),
    Bare(String),
}

impl Field {
    fn into_name(self) -> String {
        match self {
            Field::Quoted(s) | Field::Bare(s) => s,
        }
    }

    fn into_value(self) -> HostValue {
        match self {
            Field::Quoted(s) => HostValue::Str(s),
            Field::Bare(s) => bare_value(&s),
        }
    }
}

/// Type a bare field: `NA` and empty are null, then logical, integer, double.
fn bare_value(text: &str) -> HostValue {
    match text {
        "" | "NA" => HostValue::Null,
        "TRUE" => HostValue::Bool(true),
        "FALSE" => HostValue::Bool(false),
        "Inf" => HostValue::Float(f64::INFINITY),
        "-Inf" => HostValue::Float(f64::NEG_INFINITY),
        "NaN" => HostValue::Float(f64::NAN),
        _ => {
            if let Ok(n) = text.parse::<i64>() {
                HostValue::Int(n)
            } else if let Ok(f) = text.parse::<f64>() {
                HostValue::Float(f)
            } else {
                HostValue::Str(text.to_string())
            }
        }
    }
}

fn parse_records(text: &str) -> Result<Vec<Vec<Field>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() && !quoted => {
                quoted = true;
                in_quotes = true;
            }
            ',' => record.push(take_field(&mut field, &mut quoted)),
            '\r' => {}
            '\n' => {
                record.push(take_field(&mut field, &mut quoted));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(BridgeError::Other("unterminated quoted CSV field".into()));
    }
    if !field.is_empty() || quoted || !record.is_empty() {
        record.push(take_field(&mut field, &mut quoted));
        records.push(record);
    }
    Ok(records)
}

fn take_field(field: &mut String, quoted: &mut bool) -> Field {
    let text = std::mem::take(field);
    if std::mem::take(quoted) {
        Field::Quoted(text)
    } else {
        Field::Bare(text)
    }
}

/// Parse header-first CSV text into a [`Table`].
pub fn parse_table(text: &str) -> Result<Table> {
    let mut records = parse_records(text)?.into_iter();
    let Some(header) = records.next() else {
        return Ok(Table::default());
    };
    let mut table = Table::new(header.into_iter().map(Field::into_name));
    for record in records {
        table.push_row(record.into_iter().map(Field::into_value).collect())?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_write_csv_output() {
        let text = "\"X0\",\"name\",\"ok\"\n9,\"a\",TRUE\n4.5,\"b, c\",NA\n";
        let table = parse_table(text).unwrap();
        assert_eq!(table.columns, vec!["X0", "name", "ok"]);
        assert_eq!(
            table.rows,
            vec![
                vec![HostValue::Int(9), "a".into(), HostValue::Bool(true)],
                vec![HostValue::Float(4.5), "b, c".into(), HostValue::Null],
            ]
        );
    }

    #[test]
    fn test_doubled_quotes_and_embedded_newline() {
        let text = "\"q\"\n\"say \"\"hi\"\"\"\n\"two\nlines\"\n";
        let table = parse_table(text).unwrap();
        assert_eq!(table.rows[0][0], HostValue::from("say \"hi\""));
        assert_eq!(table.rows[1][0], HostValue::from("two\nlines"));
    }

    #[test]
    fn test_quoted_numbers_stay_text() {
        let table = parse_table("\"a\"\n\"3\"\n").unwrap();
        assert_eq!(table.rows[0][0], HostValue::from("3"));
    }

    #[test]
    fn test_header_only_and_empty() {
        let table = parse_table("\"a\",\"b\"\n").unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert!(table.is_empty());
        assert_eq!(parse_table("").unwrap(), Table::default());
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        assert!(parse_table("\"a\",\"b\"\n1\n").is_err());
        assert!(parse_table("\"a\n").is_err());
    }
}
