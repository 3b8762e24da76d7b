//! Host values as JavaScript source text.

use replbridge_core::{HostValue, LiteralTable, Result, Table};

pub(crate) static DENO_LITERALS: LiteralTable = LiteralTable::new(
    "Deno",
    Some(value_literal),
    Some(value_literal),
    Some(value_literal),
);

pub(crate) fn string_literal(text: &str) -> Result<String> {
    Ok(serde_json::to_string(text)?)
}

fn number_literal(value: f64) -> String {
    if value.is_nan() {
        "NaN".into()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.into()
    } else {
        format!("{:?}", value)
    }
}

/// One converter covers every tag: JavaScript literals nest freely.
pub(crate) fn value_literal(value: &HostValue) -> Result<String> {
    Ok(match value {
        HostValue::Null => "null".into(),
        HostValue::Bool(b) => b.to_string(),
        HostValue::Int(n) => n.to_string(),
        HostValue::Float(f) => number_literal(*f),
        HostValue::Str(s) => string_literal(s)?,
        HostValue::Seq(items) => format!(
            "[{}]",
            items
                .iter()
                .map(value_literal)
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        ),
        HostValue::Table(table) => table_literal(table)?,
    })
}

/// Array of row objects.
fn table_literal(table: &Table) -> Result<String> {
    let keys = table
        .columns
        .iter()
        .map(|c| string_literal(c))
        .collect::<Result<Vec<_>>>()?;
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let fields = keys
                .iter()
                .zip(row)
                .map(|(key, cell)| Ok(format!("{}: {}", key, value_literal(cell)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("{{{}}}", fields.join(", ")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("[{}]", rows.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(DENO_LITERALS.convert(&HostValue::Null).unwrap(), "null");
        assert_eq!(DENO_LITERALS.convert(&5.into()).unwrap(), "5");
        assert_eq!(DENO_LITERALS.convert(&2.5.into()).unwrap(), "2.5");
        assert_eq!(DENO_LITERALS.convert(&f64::INFINITY.into()).unwrap(), "Infinity");
        assert_eq!(DENO_LITERALS.convert(&f64::NAN.into()).unwrap(), "NaN");
        assert_eq!(DENO_LITERALS.convert(&"a\"b\n".into()).unwrap(), "\"a\\\"b\\n\"");
    }

    #[test]
    fn test_sequences_nest() {
        let value = HostValue::Seq(vec![4.into(), vec![5, 5].into(), HostValue::Null]);
        assert_eq!(DENO_LITERALS.convert(&value).unwrap(), "[4, [5, 5], null]");
    }

    #[test]
    fn test_table_as_row_objects() {
        let table = Table::new(["a", "b c"])
            .with_row(vec![1.into(), "x".into()])
            .unwrap();
        assert_eq!(
            DENO_LITERALS.convert(&table.into()).unwrap(),
            "[{\"a\": 1, \"b c\": \"x\"}]"
        );
    }
}
