// YAML reader/writer. Parsing goes through serde_yaml with the shared value seed;
// a lexical pre-pass rejects anchors, aliases and tags, which serde_yaml would
// otherwise resolve or drop silently.
use serde::de::DeserializeSeed;

use crate::config::ConvertOptions;
use crate::convert::json::seeded_error;
use crate::error::{ParseError, SourceLocation, WriteError};
use crate::value::{DepthGuard, Value};

/// Parses a single YAML document. Empty or comment-only input is `Null`.
pub fn read(input: &str, options: &ConvertOptions) -> Result<Value, ParseError> {
    if is_blank_document(input) {
        return Ok(Value::Null);
    }
    NodeScanner::new(input).scan()?;

    let guard = DepthGuard::new(options.max_depth);
    guard
        .seed()
        .deserialize(serde_yaml::Deserializer::from_str(input))
        .map_err(|err| {
            let location = err
                .location()
                .map(|loc| SourceLocation::from_offset(input, loc.index()));
            seeded_error(&guard, &err.to_string(), location)
        })
}

pub fn write(value: &Value) -> Result<String, WriteError> {
    serde_yaml::to_string(value).map_err(|err| WriteError::unsupported("$", err.to_string()))
}

fn is_blank_document(input: &str) -> bool {
    input.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

/// Walks the raw text tracking just enough YAML lexical state (quotes, flow
/// collections, block scalars) to know where a node can begin, and fails on
/// `&`, `*` or `!` in that position.
struct NodeScanner<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    quote: Option<u8>,
    flow_depth: usize,
    /// Indent of the line that opened a `|`/`>` block scalar.
    block_parent: Option<usize>,
    line_indent: usize,
    expect_node: bool,
}

impl<'a> NodeScanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            quote: None,
            flow_depth: 0,
            block_parent: None,
            line_indent: 0,
            expect_node: true,
        }
    }

    fn scan(mut self) -> Result<(), ParseError> {
        let mut at_line_start = true;
        while self.pos < self.bytes.len() {
            if at_line_start {
                at_line_start = false;
                if self.start_line() {
                    at_line_start = true;
                }
                continue;
            }
            let byte = self.bytes[self.pos];
            if let Some(quote) = self.quote {
                at_line_start = self.step_quoted(quote, byte);
                continue;
            }
            match byte {
                b'\n' => {
                    at_line_start = true;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'#' if self.after_whitespace() => self.skip_to_newline(),
                b'&' | b'*' | b'!' if self.expect_node => return Err(self.reject(byte)),
                b'"' | b'\'' if self.expect_node => {
                    self.quote = Some(byte);
                    self.expect_node = false;
                    self.pos += 1;
                }
                b'|' | b'>' if self.expect_node && self.flow_depth == 0 => {
                    self.block_parent = Some(self.line_indent);
                    self.expect_node = false;
                    self.skip_to_newline();
                }
                b'[' | b'{' if self.expect_node => {
                    self.flow_depth += 1;
                    self.pos += 1;
                }
                b']' | b'}' if self.flow_depth > 0 => {
                    self.flow_depth -= 1;
                    self.expect_node = false;
                    self.pos += 1;
                }
                b',' if self.flow_depth > 0 => {
                    self.expect_node = true;
                    self.pos += 1;
                }
                b'-' | b'.' if self.document_marker() => self.pos += 3,
                b'-' | b'?' if self.expect_node && self.indicator_follows() => self.pos += 1,
                b':' if self.indicator_follows() => {
                    self.expect_node = true;
                    self.pos += 1;
                }
                _ => {
                    self.expect_node = false;
                    self.pos += 1;
                }
            }
        }
        Ok(())
    }

    /// Consumes indentation. Returns true when the whole line belongs to a
    /// block scalar and was skipped.
    fn start_line(&mut self) -> bool {
        let indent = self.bytes[self.pos..]
            .iter()
            .take_while(|byte| **byte == b' ')
            .count();
        if self.quote.is_none() {
            if let Some(parent) = self.block_parent {
                let blank = self.bytes[self.pos + indent..]
                    .iter()
                    .take_while(|byte| **byte != b'\n')
                    .all(|byte| matches!(byte, b' ' | b'\t' | b'\r'));
                if blank || indent > parent {
                    self.skip_to_newline();
                    self.pos = (self.pos + 1).min(self.bytes.len());
                    return true;
                }
                self.block_parent = None;
            }
            self.line_indent = indent;
            if self.flow_depth == 0 {
                self.expect_node = true;
            }
        }
        self.pos += indent;
        false
    }

    /// Advances through a quoted scalar. Returns true on a newline.
    fn step_quoted(&mut self, quote: u8, byte: u8) -> bool {
        let next = self.bytes.get(self.pos + 1).copied();
        if quote == b'"' && byte == b'\\' {
            self.pos += 2;
            return next == Some(b'\n');
        }
        if byte == quote {
            if quote == b'\'' && next == Some(b'\'') {
                self.pos += 2;
                return false;
            }
            self.quote = None;
        }
        self.pos += 1;
        byte == b'\n'
    }

    fn after_whitespace(&self) -> bool {
        self.pos == 0 || matches!(self.bytes[self.pos - 1], b' ' | b'\t' | b'\n')
    }

    fn indicator_follows(&self) -> bool {
        match self.bytes.get(self.pos + 1) {
            None => true,
            Some(b' ' | b'\t' | b'\r' | b'\n') => true,
            Some(b',' | b']' | b'}') => self.flow_depth > 0,
            _ => false,
        }
    }

    /// `---` or `...` in column zero followed by a blank. A node may still
    /// start on the same line.
    fn document_marker(&self) -> bool {
        let rest = &self.bytes[self.pos..];
        let at_column_zero = self.pos == 0 || self.bytes[self.pos - 1] == b'\n';
        at_column_zero
            && self.flow_depth == 0
            && (rest.starts_with(b"---") || rest.starts_with(b"..."))
            && matches!(rest.get(3), None | Some(b' ' | b'\t' | b'\r' | b'\n'))
    }

    fn skip_to_newline(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn reject(&self, byte: u8) -> ParseError {
        let feature = match byte {
            b'&' => "anchors",
            b'*' => "aliases",
            _ => "tags",
        };
        ParseError::UnsupportedFeature {
            feature: feature.into(),
            location: Some(SourceLocation::from_offset(self.input, self.pos)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    fn read_default(input: &str) -> Result<Value, ParseError> {
        read(input, &ConvertOptions::default())
    }

    #[test]
    fn reads_block_and_flow_styles() {
        let value = read_default("name: Ada\ntags: [a, b]\nmeta: {active: true, score: 1.5}\nnone: ~\n").unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.get("name"), Some(&Value::from("Ada")));
        assert_eq!(
            record.get("tags"),
            Some(&Value::Sequence(vec![Value::from("a"), Value::from("b")]))
        );
        let meta = record.get("meta").and_then(Value::as_record).unwrap();
        assert_eq!(meta.get("active"), Some(&Value::from(true)));
        assert_eq!(meta.get("score"), Some(&Value::from(1.5)));
        assert_eq!(record.get("none"), Some(&Value::Null));
    }

    #[test]
    fn empty_document_is_null() {
        assert_eq!(read_default("").unwrap(), Value::Null);
        assert_eq!(read_default("  \n# comment only\n").unwrap(), Value::Null);
    }

    #[test]
    fn rejects_anchor_with_offset() {
        let input = "base: &b 1\nother: *b\n";
        let err = read_default(input).unwrap_err();
        match err {
            ParseError::UnsupportedFeature { feature, location } => {
                assert_eq!(feature, "anchors");
                assert_eq!(location.map(|loc| loc.offset), Some(6));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_alias_and_tag() {
        let err = read_default("- *ref\n").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFeature { ref feature, .. } if feature == "aliases"));
        let err = read_default("value: !!str 12\n").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFeature { ref feature, .. } if feature == "tags"));
        let err = read_default("[1, &x 2]").unwrap_err();
        assert_eq!(err.kind(), "UnsupportedFeature");
    }

    #[test]
    fn indicator_characters_inside_scalars_are_fine() {
        let input = "a: 'quoted &anchor'\nb: \"*star\"\nc: x & y\nd: |\n  !not a tag\n  *nor alias\ne: done # trailing &comment\n";
        let value = read_default(input).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.get("a"), Some(&Value::from("quoted &anchor")));
        assert_eq!(record.get("b"), Some(&Value::from("*star")));
        assert_eq!(record.get("c"), Some(&Value::from("x & y")));
        assert_eq!(record.get("d"), Some(&Value::from("!not a tag\n*nor alias\n")));
        assert_eq!(record.get("e"), Some(&Value::from("done")));
    }

    #[test]
    fn node_properties_after_document_marker_are_rejected() {
        let err = read_default("--- !!str 5\n").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFeature { ref feature, .. } if feature == "tags"));
        let err = read_default("--- &a [1, 2]\n").unwrap_err();
        match err {
            ParseError::UnsupportedFeature { feature, location } => {
                assert_eq!(feature, "anchors");
                assert_eq!(location.map(|loc| loc.offset), Some(4));
            }
            other => panic!("unexpected error {other:?}"),
        }
        let err = read_default("---\n- 1\n---   *b\n").unwrap_err();
        assert_eq!(err.kind(), "UnsupportedFeature");
    }

    #[test]
    fn document_markers_still_read() {
        assert_eq!(read_default("--- 5\n").unwrap(), Value::from(5i64));
        let value = read_default("---\nname: Ada\n...\n").unwrap();
        assert_eq!(value.as_record().unwrap().get("name"), Some(&Value::from("Ada")));
        assert_eq!(read_default("---x\n").unwrap(), Value::from("---x"));
    }

    #[test]
    fn syntax_error_has_location() {
        let err = read_default("key: [1, 2\n").unwrap_err();
        assert_eq!(err.kind(), "SyntaxError");
        assert!(err.location().is_some());
    }

    #[test]
    fn depth_limit_applies() {
        let options = ConvertOptions {
            max_depth: 3,
            ..ConvertOptions::default()
        };
        let err = read("[[[[1]]]]", &options).unwrap_err();
        assert_eq!(err.kind(), "DepthExceeded");
    }

    #[test]
    fn write_then_read_is_identity() {
        let mut record = Record::new();
        record.push("id", Value::from(7i64));
        record.push("ratio", Value::from(0.5));
        record.push("label", Value::from("123"));
        record.push("flag", Value::from(false));
        record.push("missing", Value::Null);
        record.push("list", Value::Sequence(vec![Value::from("x")]));
        let value = Value::Record(record);
        let text = write(&value).unwrap();
        assert_eq!(read_default(&text).unwrap(), value);
    }
}
