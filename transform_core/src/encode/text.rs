// Text-to-text escapes: URL form encoding, HTML entities, and `\xHH` escaping
// of non-ASCII bytes.
use crate::error::EncodeError;

/// Percent-encodes everything outside `A-Z a-z 0-9 - _ . ~`, with spaces as `+`.
pub fn url_encode(input: &str) -> String {
    urlencoding::encode(input).replace("%20", "+")
}

/// Reverses [`url_encode`]; `+` decodes to a space. Every `%` must start a
/// two-digit hex escape.
pub fn url_decode(input: &str) -> Result<String, EncodeError> {
    let bytes = input.as_bytes();
    for (idx, byte) in bytes.iter().enumerate() {
        if *byte != b'%' {
            continue;
        }
        let valid = bytes
            .get(idx + 1..idx + 3)
            .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return Err(EncodeError::invalid("url", "invalid percent-escape", Some(idx)));
        }
    }
    let normalized = input.replace('+', " ");
    urlencoding::decode(&normalized)
        .map(|cow| cow.into_owned())
        .map_err(|_| EncodeError::invalid("url", "escapes do not form valid UTF-8", None))
}

/// Escapes `& < > " '` as entities.
pub fn html_encode(input: &str) -> String {
    html_escape::encode_safe(input).into_owned()
}

/// Decodes named and numeric entities. A bare `&`, an unterminated entity
/// or an unknown name is rejected.
pub fn html_decode(input: &str) -> Result<String, EncodeError> {
    let mut search = 0;
    while let Some(found) = input[search..].find('&') {
        let start = search + found;
        let rest = &input[start + 1..];
        let end = rest
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '#'))
            .filter(|end| rest[*end..].starts_with(';'))
            .ok_or_else(|| EncodeError::invalid("html", "unterminated entity", Some(start)))?;
        let body = &rest[..end];
        if !is_known_entity(body) {
            return Err(EncodeError::invalid(
                "html",
                format!("unknown entity `&{body};`"),
                Some(start),
            ));
        }
        search = start + 1 + end + 1;
    }
    Ok(html_escape::decode_html_entities(input).into_owned())
}

/// True when html-escape would replace `&body;`. Numeric references must
/// name a character allowed in a document; U+0000 and the C0 controls other
/// than whitespace are not.
fn is_known_entity(body: &str) -> bool {
    if let Some(numeric) = body.strip_prefix('#') {
        if !numeric_reference(numeric).is_some_and(is_document_char) {
            return false;
        }
    } else if body.is_empty() || body.contains('#') {
        return false;
    }
    let entity = format!("&{body};");
    html_escape::decode_html_entities(&entity) != entity
}

fn numeric_reference(reference: &str) -> Option<char> {
    let (digits, radix) = match reference.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16),
        None => (reference, 10),
    };
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(digits, radix).ok().and_then(char::from_u32)
}

fn is_document_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\u{000C}' | '\r') || !matches!(ch, '\0'..='\u{001F}')
}

/// Keeps printable ASCII, writes `\` as `\\` and every other byte as `\xHH`.
pub fn utf8_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out
}

/// Reverses [`utf8_escape`]. Only `\\` and `\xHH` escapes are accepted and the
/// resulting bytes must be valid UTF-8.
pub fn utf8_unescape(input: &str) -> Result<String, EncodeError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] != b'\\' {
            out.push(bytes[idx]);
            idx += 1;
            continue;
        }
        match bytes.get(idx + 1) {
            Some(b'\\') => {
                out.push(b'\\');
                idx += 2;
            }
            Some(b'x') => {
                let byte = input
                    .get(idx + 2..idx + 4)
                    .filter(|hex| hex.bytes().all(|byte| byte.is_ascii_hexdigit()))
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                    .ok_or_else(|| EncodeError::invalid("utf8", "invalid \\x escape", Some(idx)))?;
                out.push(byte);
                idx += 4;
            }
            _ => return Err(EncodeError::invalid("utf8", "invalid escape sequence", Some(idx))),
        }
    }
    String::from_utf8(out)
        .map_err(|err| EncodeError::invalid("utf8", format!("escapes do not form valid UTF-8: {err}"), None))
}
