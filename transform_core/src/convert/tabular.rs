// Delimited text (CSV/TSV) reading and writing via the csv crate.
use crate::config::ConvertOptions;
use crate::convert::shape::Table;
use crate::error::{ParseError, SourceLocation, WriteError};
use crate::value::{Number, Record, Value};

/// Parses delimited text into a list of records keyed by the header row.
///
/// Quoting follows RFC 4180 (doubled quotes inside quoted fields). Rows whose
/// field count differs from the header fail with the offending line number.
///
/// # Example
/// ```
/// use transform_core::config::ConvertOptions;
/// use transform_core::convert::tabular::read;
/// let rows = read("id,name\n1,Ada\n", b',', &ConvertOptions::default())?;
/// assert_eq!(rows.depth(), 2);
/// # Ok::<(), transform_core::error::ParseError>(())
/// ```
pub fn read(input: &str, delimiter: u8, options: &ConvertOptions) -> Result<Value, ParseError> {
    if input.trim().is_empty() {
        return Ok(Value::Sequence(Vec::new()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(input.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| csv_error(input, &err))?
        .clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| csv_error(input, &err))?;
        if record.len() != headers.len() {
            let row = record
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(rows.len() + 2);
            return Err(ParseError::ShapeMismatch {
                row,
                message: format!("expected {} fields, found {}", headers.len(), record.len()),
            });
        }
        let mut row = Record::with_capacity(headers.len());
        for (name, field) in headers.iter().zip(record.iter()) {
            let cell = if options.infer_types {
                infer_cell(field)
            } else {
                Value::String(field.to_string())
            };
            row.push(name, cell);
        }
        rows.push(Value::Record(row));
    }
    Ok(Value::Sequence(rows))
}

fn csv_error(input: &str, err: &csv::Error) -> ParseError {
    let location = err
        .position()
        .map(|pos| SourceLocation::from_offset(input, pos.byte() as usize));
    ParseError::syntax(err.to_string(), location)
}

/// Types a cell only when the typed value prints back to the same text, so
/// `007` or `1e3` stay strings.
fn infer_cell(field: &str) -> Value {
    match field {
        "" => return Value::Null,
        "true" => return Value::Boolean(true),
        "false" => return Value::Boolean(false),
        _ => {}
    }
    if let Ok(int) = field.parse::<i64>() {
        if int.to_string() == field {
            return Value::Number(Number::Integer(int));
        }
    }
    if let Ok(float) = field.parse::<f64>() {
        let number = Number::Float(float);
        if float.is_finite() && number.to_string() == field {
            return Value::Number(number);
        }
    }
    Value::String(field.to_string())
}

/// Writes a header line followed by one line per row. `Null` cells are empty.
pub fn write(table: &Table, delimiter: u8) -> Result<String, WriteError> {
    if table.columns.is_empty() {
        return Ok(String::new());
    }
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_writer(Vec::new());
    wtr.write_record(&table.columns).map_err(write_error)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|cell| cell.scalar_text().unwrap_or_default()))
            .map_err(write_error)?;
    }
    wtr.flush()
        .map_err(|err| WriteError::unsupported("$", err.to_string()))?;
    let bytes = wtr
        .into_inner()
        .map_err(|err| WriteError::unsupported("$", err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| WriteError::unsupported("$", err.to_string()))
}

fn write_error(err: csv::Error) -> WriteError {
    WriteError::unsupported("$", err.to_string())
}
