// Turns an arbitrary value into header + rows for the tabular writers.
//
// Column identity is (name, occurrence) so duplicate keys coming from CSV
// headers or XML siblings stay separate columns.
use crate::config::ConvertOptions;
use crate::convert::formats::FormatDescriptor;
use crate::convert::json;
use crate::error::WriteError;
use crate::value::{Record, Value};

/// Header plus rows of cells. Cells are scalars whenever the target only
/// holds scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

type Column = (String, usize);

impl Table {
    /// Extracts rows, flattens nested values when the target needs scalar
    /// cells, then aligns every row to the column set.
    ///
    /// Targets that require a uniform shape use the union of all keys in
    /// first-seen order; others take the first row's columns and reject rows
    /// that introduce new ones.
    pub fn from_value(
        value: &Value,
        descriptor: &FormatDescriptor,
        options: &ConvertOptions,
    ) -> Result<Self, WriteError> {
        let mut rows = Vec::new();
        for (idx, row) in extract_rows(value).into_iter().enumerate() {
            let path = format!("$[{idx}]");
            let record = match row {
                Value::Record(record) => record.clone(),
                other => Record::from_iter([("value".to_string(), other.clone())]),
            };
            let fields = if descriptor.supports_arrays_of_scalars_only {
                let mut flat = Vec::with_capacity(record.len());
                let flattener = Flattener {
                    separator: &options.flatten_separator,
                    expand_records: !descriptor.supports_nested_objects,
                };
                flattener.flatten_into(&mut flat, None, &record, &path)?;
                flat
            } else {
                record.into_iter().collect()
            };
            rows.push(number_occurrences(fields));
        }

        let mut columns: Vec<Column> = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            for (column, _) in row {
                if columns.contains(column) {
                    continue;
                }
                if idx > 0 && !descriptor.requires_uniform_record_shape {
                    return Err(WriteError::ShapeMismatch {
                        row: idx + 1,
                        message: format!("column `{}` is not present in the first row", column.0),
                    });
                }
                columns.push(column.clone());
            }
        }
        if columns.is_empty() && !rows.is_empty() {
            return Err(WriteError::unsupported("$", "rows have no fields to use as columns"));
        }

        let cells = rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| {
                        row.iter()
                            .find(|(key, _)| key == column)
                            .map(|(_, cell)| cell.clone())
                            .unwrap_or(Value::Null)
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            rows: cells,
        })
    }
}

/// Picks the row list out of common document shapes: a list, a single-key
/// wrapper around a list, or an XML-style element list. Anything else is one
/// row.
pub(crate) fn extract_rows(value: &Value) -> Vec<&Value> {
    match value {
        Value::Sequence(items) => items.iter().collect(),
        Value::Record(record) if record.len() == 1 => {
            let (_, inner) = &record.iter().as_slice()[0];
            match inner {
                Value::Sequence(items) => items.iter().collect(),
                Value::Record(list) => element_list(list).unwrap_or_else(|| vec![value]),
                _ => vec![value],
            }
        }
        other => vec![other],
    }
}

/// `<list><item/><item/></list>` in raw form (repeated keys) or grouped form
/// (one key holding a list of records).
fn element_list(list: &Record) -> Option<Vec<&Value>> {
    let mut entries = list.iter();
    let (first_key, first) = entries.next()?;
    if list.len() == 1 {
        return match first {
            Value::Sequence(items) if items.len() > 1 && items.iter().all(|item| item.as_record().is_some()) => {
                Some(items.iter().collect())
            }
            _ => None,
        };
    }
    let shared = list
        .iter()
        .all(|(key, item)| key == first_key && item.as_record().is_some());
    shared.then(|| list.iter().map(|(_, item)| item).collect())
}

/// Reduces a row to scalar cells. Nested records become separator-joined
/// columns when the target has no nested objects; every other container is
/// stored as compact JSON.
struct Flattener<'a> {
    separator: &'a str,
    expand_records: bool,
}

impl Flattener<'_> {
    fn flatten_into(
        &self,
        out: &mut Vec<(String, Value)>,
        prefix: Option<&str>,
        record: &Record,
        path: &str,
    ) -> Result<(), WriteError> {
        for (key, value) in record {
            let name = match prefix {
                Some(prefix) => format!("{prefix}{}{key}", self.separator),
                None => key.clone(),
            };
            match value {
                Value::Record(inner) if self.expand_records && !inner.is_empty() => {
                    self.flatten_into(out, Some(&name), inner, &format!("{path}.{key}"))?;
                }
                Value::Record(_) | Value::Sequence(_) => {
                    let encoded = json::compact(value, &format!("{path}.{key}"))?;
                    out.push((name, Value::String(encoded)));
                }
                scalar => out.push((name, scalar.clone())),
            }
        }
        Ok(())
    }
}

fn number_occurrences(fields: Vec<(String, Value)>) -> Vec<(Column, Value)> {
    let mut numbered: Vec<(Column, Value)> = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let seen = numbered.iter().filter(|((key, _), _)| *key == name).count();
        numbered.push(((name, seen), value));
    }
    numbered
}
