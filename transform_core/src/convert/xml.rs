// XML reader/writer built on quick-xml's pull parser.
use std::sync::OnceLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

use crate::config::ConvertOptions;
use crate::error::{ParseError, SourceLocation, WriteError};
use crate::value::{Record, Value, ATTRIBUTES_KEY, TEXT_KEY};

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Parses a document into `Record[(root_tag, element)]`.
///
/// An element without attributes or child elements becomes its text exactly
/// as written; anything else becomes a Record of `@attributes`, children in
/// document order, then `#text`. Text mixed with child elements is trimmed
/// per run and runs are joined with a space.
pub fn read(input: &str, options: &ConvertOptions) -> Result<Value, ParseError> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|err| {
            ParseError::syntax_at(err.to_string(), input, reader.error_position() as usize)
        })?;
        match event {
            Event::Start(_) | Event::Empty(_) if root.is_some() => {
                return Err(ParseError::syntax_at("document has more than one root element", input, start));
            }
            Event::Start(tag) => {
                check_depth(stack.len(), options, input, start)?;
                stack.push(XmlElement::open(&tag, input, start)?);
            }
            Event::Empty(tag) => {
                check_depth(stack.len(), options, input, start)?;
                let element = XmlElement::open(&tag, input, start)?;
                close(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    close(&mut stack, &mut root, element);
                }
            }
            Event::Text(text) => {
                let unescaped = text
                    .unescape()
                    .map_err(|err| ParseError::syntax_at(err.to_string(), input, start))?;
                append_text(&mut stack, unescaped.into_owned(), input, start)?;
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                append_text(&mut stack, String::from_utf8_lossy(&raw).into_owned(), input, start)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::syntax_at(
            format!("element `{}` is never closed", open.name),
            input,
            input.len(),
        ));
    }
    let (name, value) =
        root.ok_or_else(|| ParseError::syntax_at("document has no root element", input, input.len()))?;
    let mut document = Record::with_capacity(1);
    document.push(name, value);
    Ok(Value::Record(document))
}

fn check_depth(open: usize, options: &ConvertOptions, input: &str, offset: usize) -> Result<(), ParseError> {
    if open >= options.max_depth {
        return Err(ParseError::DepthExceeded {
            limit: options.max_depth,
            location: Some(SourceLocation::from_offset(input, offset)),
        });
    }
    Ok(())
}

fn close(stack: &mut Vec<XmlElement>, root: &mut Option<(String, Value)>, element: XmlElement) {
    let name = element.name.clone();
    let value = element.into_value();
    match stack.last_mut() {
        Some(parent) => parent.children.push(name, value),
        None => *root = Some((name, value)),
    }
}

fn append_text(stack: &mut [XmlElement], text: String, input: &str, offset: usize) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(current) => current.text.push(text),
        None if text.trim().is_empty() => {}
        None => return Err(ParseError::syntax_at("text outside the root element", input, offset)),
    }
    Ok(())
}

#[derive(Debug)]
struct XmlElement {
    name: String,
    attributes: Record,
    children: Record,
    /// Raw text and CDATA runs in document order.
    text: Vec<String>,
}

impl XmlElement {
    fn open(tag: &BytesStart<'_>, input: &str, offset: usize) -> Result<Self, ParseError> {
        let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
        let mut attributes = Record::new();
        for attr in tag.attributes() {
            let attr = attr.map_err(|err| ParseError::syntax_at(err.to_string(), input, offset))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| ParseError::syntax_at(err.to_string(), input, offset))?;
            attributes.push(key, Value::String(value.into_owned()));
        }
        Ok(Self {
            name,
            attributes,
            children: Record::new(),
            text: Vec::new(),
        })
    }

    fn into_value(self) -> Value {
        if self.children.is_empty() {
            let text = self.text.concat();
            if self.attributes.is_empty() {
                return Value::String(text);
            }
            let mut record = Record::with_capacity(2);
            record.push(ATTRIBUTES_KEY, Value::Record(self.attributes));
            if !text.is_empty() {
                record.push(TEXT_KEY, Value::String(text));
            }
            return Value::Record(record);
        }
        let text = self
            .text
            .iter()
            .map(|run| run.trim())
            .filter(|run| !run.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let mut record = Record::with_capacity(self.children.len() + 2);
        if !self.attributes.is_empty() {
            record.push(ATTRIBUTES_KEY, Value::Record(self.attributes));
        }
        for (key, value) in self.children {
            record.push(key, value);
        }
        if !text.is_empty() {
            record.push(TEXT_KEY, Value::String(text));
        }
        Value::Record(record)
    }
}

/// Renders a value as an indented XML document with a declaration.
///
/// A Record with a single non-list entry supplies the root element; anything
/// else is wrapped in `options.root_element`.
pub fn write(value: &Value, options: &ConvertOptions) -> Result<String, WriteError> {
    let mut out = String::from(DECLARATION);
    match value {
        Value::Record(record) if record.len() == 1 => {
            let (name, inner) = &record.iter().as_slice()[0];
            if matches!(inner, Value::Sequence(_)) {
                write_element(&mut out, &options.root_element, value, 0, "$")?;
            } else {
                write_element(&mut out, name, inner, 0, &format!("$.{name}"))?;
            }
        }
        other => write_element(&mut out, &options.root_element, other, 0, "$")?,
    }
    Ok(out)
}

fn element_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}._:-]*$").unwrap())
}

fn check_name(name: &str, path: &str) -> Result<(), WriteError> {
    if element_name_regex().is_match(name) {
        Ok(())
    } else {
        Err(WriteError::unsupported(
            path,
            format!("`{name}` is not a valid XML name"),
        ))
    }
}

/// Writes a record entry: a list repeats the tag once per item.
fn write_field(out: &mut String, name: &str, value: &Value, depth: usize, path: &str) -> Result<(), WriteError> {
    match value {
        Value::Sequence(items) if !items.is_empty() => {
            for (idx, item) in items.iter().enumerate() {
                write_element(out, name, item, depth, &format!("{path}[{idx}]"))?;
            }
            Ok(())
        }
        other => write_element(out, name, other, depth, path),
    }
}

fn write_element(out: &mut String, name: &str, value: &Value, depth: usize, path: &str) -> Result<(), WriteError> {
    check_name(name, path)?;
    let indent = "  ".repeat(depth);
    match value {
        Value::Null => out.push_str(&format!("{indent}<{name}/>\n")),
        Value::Sequence(items) => {
            if items.is_empty() {
                out.push_str(&format!("{indent}<{name}/>\n"));
                return Ok(());
            }
            out.push_str(&format!("{indent}<{name}>\n"));
            for (idx, item) in items.iter().enumerate() {
                write_element(out, "item", item, depth + 1, &format!("{path}[{idx}]"))?;
            }
            out.push_str(&format!("{indent}</{name}>\n"));
        }
        Value::Record(record) => write_record(out, name, record, depth, path)?,
        scalar => {
            let text = scalar.scalar_text().unwrap_or_default();
            out.push_str(&format!("{indent}<{name}>{}</{name}>\n", escape_text(&text)));
        }
    }
    Ok(())
}

fn write_record(out: &mut String, name: &str, record: &Record, depth: usize, path: &str) -> Result<(), WriteError> {
    let indent = "  ".repeat(depth);
    let mut attributes = String::new();
    let mut text: Option<String> = None;
    let mut children: Vec<(&str, &Value)> = Vec::new();

    for (key, value) in record {
        let child_path = format!("{path}.{key}");
        if key == ATTRIBUTES_KEY {
            let attrs = value.as_record().ok_or_else(|| {
                WriteError::unsupported(child_path.clone(), "attributes must be a record")
            })?;
            for (attr, attr_value) in attrs {
                push_attribute(&mut attributes, attr, attr_value, &format!("{child_path}.{attr}"))?;
            }
        } else if let Some(attr) = key.strip_prefix('@').filter(|rest| !rest.is_empty()) {
            push_attribute(&mut attributes, attr, value, &child_path)?;
        } else if key == TEXT_KEY {
            let content = value
                .scalar_text()
                .ok_or_else(|| WriteError::unsupported(child_path.clone(), "text must be a scalar"))?;
            text = Some(content);
        } else {
            children.push((key, value));
        }
    }

    match (children.is_empty(), text) {
        (true, None) => out.push_str(&format!("{indent}<{name}{attributes}/>\n")),
        (true, Some(text)) => out.push_str(&format!(
            "{indent}<{name}{attributes}>{}</{name}>\n",
            escape_text(&text)
        )),
        (false, text) => {
            out.push_str(&format!("{indent}<{name}{attributes}>\n"));
            if let Some(text) = text {
                out.push_str(&format!("{indent}  {}\n", escape_text(&text)));
            }
            for (key, value) in children {
                write_field(out, key, value, depth + 1, &format!("{path}.{key}"))?;
            }
            out.push_str(&format!("{indent}</{name}>\n"));
        }
    }
    Ok(())
}

fn push_attribute(out: &mut String, name: &str, value: &Value, path: &str) -> Result<(), WriteError> {
    check_name(name, path)?;
    let text = value
        .scalar_text()
        .ok_or_else(|| WriteError::unsupported(path, "attribute values must be scalars"))?;
    out.push_str(&format!(" {name}=\"{}\"", escape_attribute(&text)));
    Ok(())
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(input: &str) -> String {
    escape_text(input).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ConvertOptions {
        ConvertOptions::default()
    }

    fn record(pairs: Vec<(&str, Value)>) -> Value {
        Value::Record(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn leaf_elements_become_text() {
        let value = read("<note><to>Ada</to><from>Bob</from></note>", &opts()).unwrap();
        let expected = record(vec![(
            "note",
            record(vec![("to", Value::from("Ada")), ("from", Value::from("Bob"))]),
        )]);
        assert_eq!(value, expected);
    }

    #[test]
    fn attributes_children_and_text_are_ordered() {
        let input = r#"<?xml version="1.0"?><a id="1" kind="x &amp; y">hello <b>inner</b> world<b/></a>"#;
        let value = read(input, &opts()).unwrap();
        let expected = record(vec![(
            "a",
            record(vec![
                (
                    ATTRIBUTES_KEY,
                    record(vec![("id", Value::from("1")), ("kind", Value::from("x & y"))]),
                ),
                ("b", Value::from("inner")),
                ("b", Value::from("")),
                (TEXT_KEY, Value::from("hello world")),
            ]),
        )]);
        assert_eq!(value, expected);
    }

    #[test]
    fn cdata_is_verbatim() {
        let value = read("<code><![CDATA[a < b && c]]></code>", &opts()).unwrap();
        assert_eq!(value, record(vec![("code", Value::from("a < b && c"))]));
    }

    #[test]
    fn mismatched_end_tag_is_a_syntax_error() {
        let err = read("<a><b></a>", &opts()).unwrap_err();
        assert_eq!(err.kind(), "SyntaxError");
        assert!(err.location().is_some());
    }

    #[test]
    fn unclosed_and_missing_roots_fail() {
        assert_eq!(read("<a><b>text</b>", &opts()).unwrap_err().kind(), "SyntaxError");
        assert_eq!(read("   ", &opts()).unwrap_err().kind(), "SyntaxError");
        assert_eq!(read("<a/><b/>", &opts()).unwrap_err().kind(), "SyntaxError");
    }

    #[test]
    fn nesting_limit_applies() {
        let options = ConvertOptions {
            max_depth: 3,
            ..opts()
        };
        let err = read("<a><b><c><d/></c></b></a>", &options).unwrap_err();
        assert_eq!(err.kind(), "DepthExceeded");
        assert!(read("<a><b><c/></b></a>", &options).is_ok());
    }

    #[test]
    fn writes_single_key_record_as_root() {
        let value = record(vec![(
            "user",
            record(vec![
                ("@id", Value::from(7i64)),
                ("name", Value::from("Ada & Co")),
                ("tags", Value::Sequence(vec![Value::from("a"), Value::from("b")])),
                ("note", Value::Null),
            ]),
        )]);
        let xml = write(&value, &opts()).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <user id=\"7\">\n  <name>Ada &amp; Co</name>\n  <tags>a</tags>\n  <tags>b</tags>\n  <note/>\n</user>\n"
        );
    }

    #[test]
    fn wraps_lists_and_multi_key_records() {
        let list = Value::Sequence(vec![Value::from(1i64), Value::from(2i64)]);
        let xml = write(&list, &opts()).unwrap();
        assert!(xml.ends_with("<root>\n  <item>1</item>\n  <item>2</item>\n</root>\n"));

        let flat = record(vec![("a", Value::from(1i64)), ("b", Value::from(true))]);
        let xml = write(&flat, &ConvertOptions { root_element: "doc".into(), ..opts() }).unwrap();
        assert!(xml.ends_with("<doc>\n  <a>1</a>\n  <b>true</b>\n</doc>\n"));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let value = record(vec![("first name", Value::from("Ada")), ("x", Value::Null)]);
        let err = write(&value, &opts()).unwrap_err();
        assert!(matches!(err, WriteError::UnsupportedValue { ref path, .. } if path == "$.first name"));
    }

    #[test]
    fn leaf_whitespace_survives_a_round_trip() {
        let value = record(vec![(
            "r",
            record(vec![
                ("a", Value::from("  padded  ")),
                ("b", Value::from("line1\n")),
                ("c", record(vec![("@id", Value::from("1")), (TEXT_KEY, Value::from(" x "))])),
            ]),
        )]);
        let xml = write(&value, &opts()).unwrap();
        let back = read(&xml, &opts()).unwrap();
        let expected = record(vec![(
            "r",
            record(vec![
                ("a", Value::from("  padded  ")),
                ("b", Value::from("line1\n")),
                (
                    "c",
                    record(vec![
                        (ATTRIBUTES_KEY, record(vec![("id", Value::from("1"))])),
                        (TEXT_KEY, Value::from(" x ")),
                    ]),
                ),
            ]),
        )]);
        assert_eq!(back, expected);
    }

    #[test]
    fn indentation_between_elements_is_not_text() {
        let input = "<?xml version=\"1.0\"?>\n<a>\n  <b>  y </b>\n  <c><![CDATA[ z ]]></c>\n</a>\n";
        let value = read(input, &opts()).unwrap();
        let expected = record(vec![(
            "a",
            record(vec![("b", Value::from("  y ")), ("c", Value::from(" z "))]),
        )]);
        assert_eq!(value, expected);
        assert_eq!(read("<a/> trailing", &opts()).unwrap_err().kind(), "SyntaxError");
    }

    #[test]
    fn read_write_read_is_stable() {
        let input = r#"<a id="1">x<b>y</b><b>z</b></a>"#;
        let first = read(input, &opts()).unwrap();
        let written = write(&first, &opts()).unwrap();
        assert_eq!(read(&written, &opts()).unwrap(), first);
    }
}
