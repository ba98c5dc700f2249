// TOML reader/writer. The module name shadows the crate, hence `::toml` paths.
use crate::config::ConvertOptions;
use crate::error::{ParseError, SourceLocation, WriteError};
use crate::value::{Number, Record, Value};
use toml_edit::{Array, ArrayOfTables, DocumentMut, InlineTable, Item, Table};

/// Parses a TOML document into a Record. Datetimes become strings.
pub fn read(input: &str, options: &ConvertOptions) -> Result<Value, ParseError> {
    let table: ::toml::Table = ::toml::from_str(input).map_err(|err| {
        let location = err
            .span()
            .map(|span| SourceLocation::from_offset(input, span.start));
        if err.message().contains("recursion limit exceeded") {
            return ParseError::DepthExceeded {
                limit: options.max_depth,
                location,
            };
        }
        ParseError::syntax(err.message().trim().to_string(), location)
    })?;
    let value = toml_to_value(::toml::Value::Table(table));
    if value.depth() > options.max_depth {
        return Err(ParseError::DepthExceeded {
            limit: options.max_depth,
            location: None,
        });
    }
    Ok(value)
}

fn toml_to_value(value: ::toml::Value) -> Value {
    match value {
        ::toml::Value::String(s) => Value::String(s),
        ::toml::Value::Integer(i) => Value::Number(Number::Integer(i)),
        ::toml::Value::Float(f) => Value::Number(Number::Float(f)),
        ::toml::Value::Boolean(b) => Value::Boolean(b),
        ::toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        ::toml::Value::Array(items) => Value::Sequence(items.into_iter().map(toml_to_value).collect()),
        ::toml::Value::Table(table) => Value::Record(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_value(value)))
                .collect(),
        ),
    }
}

/// Renders a Record as a TOML document. A top-level list is written under
/// `options.table_name`; scalars have no document form.
///
/// Key order is kept: a sub-table followed by a plain key in the same table
/// is written inline, since a `[header]` would end the parent's keys.
pub fn write(value: &Value, options: &ConvertOptions) -> Result<String, WriteError> {
    let table = match value {
        Value::Record(record) => block_table(record, "$")?,
        Value::Sequence(_) => {
            let mut wrapper = Record::with_capacity(1);
            wrapper.push(options.table_name.clone(), value.clone());
            block_table(&wrapper, "$")?
        }
        _ => {
            return Err(WriteError::unsupported(
                "$",
                "a TOML document must be a table or a list",
            ))
        }
    };
    Ok(DocumentMut::from(table).to_string())
}

/// Builds a `[table]`. Entries after the last plain value may use header
/// form; everything before it is inline.
fn block_table(record: &Record, path: &str) -> Result<Table, WriteError> {
    if record.has_duplicate_keys() {
        return Err(WriteError::unsupported(path, "TOML tables cannot repeat keys"));
    }
    let entries: Vec<&(String, Value)> = record.iter().collect();
    let mut headers_allowed = vec![false; entries.len()];
    let mut tail_is_headers = true;
    for (idx, (_, value)) in entries.iter().enumerate().rev() {
        tail_is_headers &= takes_header(value);
        headers_allowed[idx] = tail_is_headers;
    }

    let mut table = Table::new();
    for ((key, value), header) in entries.into_iter().zip(headers_allowed) {
        let child = format!("{path}.{key}");
        let item = match value {
            Value::Record(inner) if header => Item::Table(block_table(inner, &child)?),
            Value::Sequence(items) if header => {
                let mut array = ArrayOfTables::new();
                for (idx, item) in items.iter().enumerate() {
                    let record = item.as_record().ok_or_else(|| {
                        WriteError::unsupported(format!("{child}[{idx}]"), "expected a table")
                    })?;
                    array.push(block_table(record, &format!("{child}[{idx}]"))?);
                }
                Item::ArrayOfTables(array)
            }
            other => Item::Value(inline_value(other, &child)?),
        };
        table.insert(key, item);
    }
    Ok(table)
}

/// Records and non-empty lists of records can be written as headers.
fn takes_header(value: &Value) -> bool {
    match value {
        Value::Record(_) => true,
        Value::Sequence(items) => !items.is_empty() && items.iter().all(|item| item.as_record().is_some()),
        _ => false,
    }
}

fn inline_value(value: &Value, path: &str) -> Result<toml_edit::Value, WriteError> {
    Ok(match value {
        Value::Null => return Err(WriteError::unsupported(path, "TOML has no null")),
        Value::Boolean(b) => toml_edit::Value::from(*b),
        Value::Number(Number::Integer(i)) => toml_edit::Value::from(*i),
        Value::Number(Number::Float(f)) => toml_edit::Value::from(*f),
        Value::String(s) => toml_edit::Value::from(s.as_str()),
        Value::Sequence(items) => {
            let mut array = Array::new();
            for (idx, item) in items.iter().enumerate() {
                array.push(inline_value(item, &format!("{path}[{idx}]"))?);
            }
            toml_edit::Value::Array(array)
        }
        Value::Record(record) => {
            if record.has_duplicate_keys() {
                return Err(WriteError::unsupported(path, "TOML tables cannot repeat keys"));
            }
            let mut table = InlineTable::new();
            for (key, item) in record {
                table.insert(key.as_str(), inline_value(item, &format!("{path}.{key}"))?);
            }
            toml_edit::Value::InlineTable(table)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ConvertOptions {
        ConvertOptions::default()
    }

    #[test]
    fn reads_tables_in_order() {
        let input = "title = \"demo\"\ncount = 3\nratio = 0.5\nwhen = 1979-05-27T07:32:00Z\n\n[owner]\nname = \"Ada\"\n";
        let value = read(input, &opts()).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["title", "count", "ratio", "when", "owner"]);
        assert_eq!(record.get("count"), Some(&Value::from(3i64)));
        assert_eq!(record.get("ratio"), Some(&Value::from(0.5)));
        assert_eq!(record.get("when"), Some(&Value::from("1979-05-27T07:32:00Z")));
    }

    #[test]
    fn syntax_error_has_offset() {
        let err = read("a = \n", &opts()).unwrap_err();
        assert_eq!(err.kind(), "SyntaxError");
        assert!(err.location().is_some());
    }

    #[test]
    fn depth_limit_applies() {
        let options = ConvertOptions {
            max_depth: 2,
            ..opts()
        };
        let err = read("[a.b.c]\nx = 1\n", &options).unwrap_err();
        assert_eq!(err.kind(), "DepthExceeded");
    }

    #[test]
    fn writes_and_reads_back() {
        let mut inner = Record::new();
        inner.push("name", Value::from("Ada"));
        let mut record = Record::new();
        record.push("id", Value::from(1i64));
        record.push("tags", Value::Sequence(vec![Value::from("a"), Value::from("b")]));
        record.push("owner", Value::Record(inner));
        let value = Value::Record(record);
        let text = write(&value, &opts()).unwrap();
        assert_eq!(read(&text, &opts()).unwrap(), value);
    }

    #[test]
    fn parser_recursion_limit_maps_to_depth() {
        let depth = 100_000;
        let arrays = format!("a = {}{}\n", "[".repeat(depth), "]".repeat(depth));
        let err = read(&arrays, &opts()).unwrap_err();
        assert!(matches!(err, ParseError::DepthExceeded { limit: 64, .. }));

        let tables = format!("a = {}1{}\n", "{b = ".repeat(depth), "}".repeat(depth));
        assert_eq!(read(&tables, &opts()).unwrap_err().kind(), "DepthExceeded");
    }

    #[test]
    fn key_order_survives_when_a_table_comes_first() {
        let mut owner = Record::new();
        owner.push("name", Value::from("Ada"));
        let mut row = Record::new();
        row.push("n", Value::from(1i64));
        let mut record = Record::new();
        record.push("owner", Value::Record(owner.clone()));
        record.push("rows", Value::Sequence(vec![Value::Record(row)]));
        record.push("title", Value::from("x"));
        record.push("meta", Value::Record(owner));
        let value = Value::Record(record);

        let text = write(&value, &opts()).unwrap();
        assert!(text.contains("[meta]"));
        assert!(!text.contains("[owner]"));
        let back = read(&text, &opts()).unwrap();
        let keys: Vec<&str> = back.as_record().unwrap().keys().collect();
        assert_eq!(keys, vec!["owner", "rows", "title", "meta"]);
        assert_eq!(back, value);
    }

    #[test]
    fn top_level_list_is_wrapped() {
        let mut row = Record::new();
        row.push("x", Value::from(1i64));
        let value = Value::Sequence(vec![Value::Record(row)]);
        let text = write(&value, &opts()).unwrap();
        let back = read(&text, &opts()).unwrap();
        assert_eq!(back.as_record().unwrap().get("data"), Some(&value));
    }

    #[test]
    fn null_and_duplicates_are_rejected() {
        let mut record = Record::new();
        record.push("a", Value::Null);
        let err = write(&Value::Record(record), &opts()).unwrap_err();
        assert!(matches!(err, WriteError::UnsupportedValue { ref path, .. } if path == "$.a"));

        let mut record = Record::new();
        record.push("a", Value::from(1i64));
        record.push("a", Value::from(2i64));
        assert!(write(&Value::Record(record), &opts()).is_err());
        assert!(write(&Value::from("scalar"), &opts()).is_err());
    }
}
