use std::thread;

use transform_core::convert::formats::{read, write};
use transform_core::error::Stage;
use transform_core::{convert_formats, convert_formats_with, ConvertOptions, FormatId, Value};

const ROWS: &str = r#"[{"name":"Ann","age":30,"score":2.5,"active":true},{"name":"Bo","age":25,"score":-1.0,"active":false}]"#;

fn compact() -> ConvertOptions {
    ConvertOptions {
        pretty: false,
        ..ConvertOptions::default()
    }
}

fn through(via: &str, input: &str) -> String {
    let intermediate = convert_formats("json", via, input).unwrap_or_else(|err| panic!("json -> {via}: {err}"));
    convert_formats_with(via, "json", &intermediate, &compact()).unwrap_or_else(|err| panic!("{via} -> json: {err}"))
}

#[test]
fn typed_rows_survive_tabular_and_sql() {
    for via in ["csv", "tsv", "sql", "yaml", "json"] {
        assert_eq!(through(via, ROWS), ROWS, "through {via}");
    }
}

#[test]
fn toml_wraps_top_level_lists() {
    let expected = format!(r#"{{"data":{ROWS}}}"#);
    assert_eq!(through("toml", ROWS), expected);

    let document = r#"{"title":"cfg","owner":{"name":"Ada","tags":["a","b"]}}"#;
    assert_eq!(through("toml", document), document);

    let table_first = r#"{"owner":{"name":"Ada"},"title":"x"}"#;
    assert_eq!(through("toml", table_first), table_first);
}

#[test]
fn xml_keeps_leaf_whitespace() {
    let document = r#"{"r":{"a":"  padded  ","b":"line1\n"}}"#;
    assert_eq!(through("xml", document), document);
}

#[test]
fn xml_keeps_structure_but_not_scalar_types() {
    let json = through("xml", ROWS);
    assert_eq!(
        json,
        r#"{"root":{"item":[{"name":"Ann","age":"30","score":"2.5","active":"true"},{"name":"Bo","age":"25","score":"-1.0","active":"false"}]}}"#
    );
}

#[test]
fn nested_documents_round_trip_through_yaml() {
    let document = r#"{"z":{"b":[1,{"c":null}],"a":"x"},"big":9007199254740993,"neg":-3}"#;
    assert_eq!(through("yaml", document), document);
}

#[test]
fn every_readable_format_reaches_every_target() {
    let options = ConvertOptions::default();
    for source in FormatId::ALL {
        if !source.descriptor().readable {
            continue;
        }
        let seeded = convert_formats("json", source_name(source), ROWS).unwrap();
        for target in FormatId::ALL {
            let result = convert_formats_with(source_name(source), source_name(target), &seeded, &options);
            assert!(result.is_ok(), "{source:?} -> {target:?}: {:?}", result.err());
        }
    }
}

fn source_name(id: FormatId) -> &'static str {
    id.descriptor().extension
}

#[test]
fn reader_output_is_format_neutral() {
    let options = ConvertOptions::default();
    let from_json = read(FormatId::Json, ROWS, &options).unwrap();
    let csv = write(FormatId::Csv, &from_json, &options).unwrap();
    let from_csv = read(FormatId::Csv, &csv, &options).unwrap();
    assert_eq!(from_csv, from_json);
    assert!(matches!(from_csv, Value::Sequence(ref rows) if rows.len() == 2));
}

#[test]
fn nesting_limits_apply_to_every_tree_reader() {
    let depth = 100;
    let yaml = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
    let xml = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
    let toml = format!("a = {}{}\n", "[".repeat(depth), "]".repeat(depth));
    for (format, input) in [("yaml", yaml), ("xml", xml), ("toml", toml)] {
        let err = convert_formats(format, "json", &input).unwrap_err();
        assert_eq!(err.stage, Stage::Parse, "{format}");
        assert_eq!(err.kind(), "DepthExceeded", "{format}");
    }
}

#[test]
fn serialize_failures_name_the_stage() {
    let err = convert_formats("json", "toml", "42").unwrap_err();
    assert_eq!(err.stage, Stage::Serialize);
    let err = convert_formats("json", "sql", r#"[{"a":1},{"a":2,"b":3}]"#).unwrap_err();
    assert_eq!(err.stage, Stage::Serialize);
    assert_eq!(err.report().row, Some(2));
}

#[test]
fn concurrent_conversions_are_independent() {
    let inputs: Vec<String> = (0..16)
        .map(|idx| format!(r#"[{{"id":{idx},"label":"row {idx}"}}]"#))
        .collect();
    let expected: Vec<String> = inputs
        .iter()
        .map(|input| convert_formats("json", "csv", input).unwrap())
        .collect();

    let results: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| scope.spawn(move || convert_formats("json", "csv", input).unwrap()))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });
    assert_eq!(results, expected);
}
