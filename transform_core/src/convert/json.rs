// JSON reader/writer plus the serde error mapping shared with the YAML reader.
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeSeed;

use crate::config::ConvertOptions;
use crate::error::{ParseError, SourceLocation, WriteError};
use crate::value::{DepthGuard, Number, Trip, Value};

/// Parses JSON text, keeping duplicate keys and the integer/float split.
///
/// # Example
/// ```
/// use transform_core::config::ConvertOptions;
/// use transform_core::convert::json::read;
/// use transform_core::value::Value;
/// let value = read("[1, 1.0]", &ConvertOptions::default())?;
/// assert_eq!(value, Value::Sequence(vec![Value::from(1i64), Value::from(1.0)]));
/// # Ok::<(), transform_core::error::ParseError>(())
/// ```
pub fn read(input: &str, options: &ConvertOptions) -> Result<Value, ParseError> {
    let guard = DepthGuard::new(options.max_depth);
    let mut de = serde_json::Deserializer::from_str(input);
    let value = guard
        .seed()
        .deserialize(&mut de)
        .and_then(|value| de.end().map(|_| value))
        .map_err(|err| {
            let location = (err.line() > 0)
                .then(|| SourceLocation::from_line_column(input, err.line(), err.column()));
            seeded_error(&guard, &err.to_string(), location)
        })?;
    Ok(value)
}

/// Renders JSON, pretty (2-space) or compact per `options.pretty`.
pub fn write(value: &Value, options: &ConvertOptions) -> Result<String, WriteError> {
    check_finite(value, &mut String::from("$"))?;
    let rendered = if options.pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.map_err(|err| WriteError::unsupported("$", err.to_string()))
}

/// Compact JSON for a single table cell holding a container.
pub(crate) fn compact(value: &Value, path: &str) -> Result<String, WriteError> {
    serde_json::to_string(value).map_err(|err| WriteError::unsupported(path, err.to_string()))
}

fn check_finite(value: &Value, path: &mut String) -> Result<(), WriteError> {
    match value {
        Value::Number(Number::Float(f)) if !f.is_finite() => Err(WriteError::unsupported(
            path.clone(),
            format!("{f} has no JSON representation"),
        )),
        Value::Sequence(items) => {
            for (idx, item) in items.iter().enumerate() {
                let len = path.len();
                path.push_str(&format!("[{idx}]"));
                check_finite(item, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        Value::Record(record) => {
            for (key, item) in record {
                let len = path.len();
                path.push('.');
                path.push_str(key);
                check_finite(item, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Turns a serde error from a seeded read into a [`ParseError`], preferring
/// the reason recorded by the guard over the parser's own message.
pub(crate) fn seeded_error(
    guard: &DepthGuard,
    message: &str,
    location: Option<SourceLocation>,
) -> ParseError {
    match guard.tripped() {
        Some(Trip::Depth) => ParseError::DepthExceeded {
            limit: guard.limit(),
            location,
        },
        Some(Trip::Tagged) => ParseError::UnsupportedFeature {
            feature: "tags".into(),
            location,
        },
        Some(Trip::ComplexKey) => ParseError::UnsupportedFeature {
            feature: "complex mapping keys".into(),
            location,
        },
        None if message.starts_with("recursion limit exceeded") => ParseError::DepthExceeded {
            limit: guard.limit(),
            location,
        },
        None => ParseError::syntax(strip_position(message), location),
    }
}

fn position_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" at line \d+ column \d+").unwrap())
}

/// Drops the parser's own "at line N column M" suffix; positions are carried
/// by [`SourceLocation`] instead.
pub(crate) fn strip_position(message: &str) -> String {
    position_regex().replace_all(message, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    fn opts() -> ConvertOptions {
        ConvertOptions::default()
    }

    #[test]
    fn keeps_key_order_and_duplicates() {
        let value = read(r#"{"b":1,"a":2,"b":3}"#, &opts()).unwrap();
        let keys: Vec<&str> = value.as_record().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "a", "b"]);
    }

    #[test]
    fn syntax_error_reports_position() {
        let err = read("{invalid", &opts()).unwrap_err();
        assert_eq!(err.kind(), "SyntaxError");
        let location = err.location().expect("location");
        assert_eq!(location.line, 1);
        assert!(location.offset <= 8);
        assert!(!err.to_string().contains("column 2 at"));
    }

    #[test]
    fn trailing_characters_are_rejected() {
        let err = read("[1] x", &opts()).unwrap_err();
        assert_eq!(err.kind(), "SyntaxError");
    }

    #[test]
    fn deep_nesting_hits_depth_limit() {
        let input = format!("{}{}", "[".repeat(100), "]".repeat(100));
        let err = read(&input, &opts()).unwrap_err();
        assert!(matches!(err, ParseError::DepthExceeded { limit: 64, .. }));
    }

    #[test]
    fn parser_recursion_limit_maps_to_depth() {
        let options = ConvertOptions {
            max_depth: 1000,
            ..opts()
        };
        let input = format!("{}{}", "[".repeat(200), "]".repeat(200));
        let err = read(&input, &options).unwrap_err();
        assert_eq!(err.kind(), "DepthExceeded");
    }

    #[test]
    fn write_pretty_and_compact() {
        let mut record = Record::new();
        record.push("a", Value::from(1i64));
        record.push("b", Value::Sequence(vec![Value::Null, Value::from(true)]));
        let value = Value::Record(record);
        let compact = write(&value, &ConvertOptions { pretty: false, ..opts() }).unwrap();
        assert_eq!(compact, r#"{"a":1,"b":[null,true]}"#);
        let pretty = write(&value, &opts()).unwrap();
        assert!(pretty.starts_with("{\n  \"a\": 1,"));
    }

    #[test]
    fn floats_keep_fraction() {
        let value = read("[2.0, 3]", &opts()).unwrap();
        let text = write(&value, &ConvertOptions { pretty: false, ..opts() }).unwrap();
        assert_eq!(text, "[2.0,3]");
    }

    #[test]
    fn non_finite_float_is_rejected_with_path() {
        let mut record = Record::new();
        record.push("xs", Value::Sequence(vec![Value::from(1.5), Value::from(f64::NAN)]));
        let err = write(&Value::Record(record), &opts()).unwrap_err();
        assert_eq!(
            err,
            WriteError::UnsupportedValue {
                path: "$.xs[1]".into(),
                message: "NaN has no JSON representation".into(),
            }
        );
    }

    #[test]
    fn strip_position_removes_suffix() {
        assert_eq!(
            strip_position("expected value at line 3 column 7"),
            "expected value"
        );
    }
}
