//! Encoding transforms: byte codecs (Base16/32/58/64, Base64-URL) and text
//! escapes (URL, HTML entities, UTF-8 `\xHH`).
//!
//! Every scheme satisfies `decode(encode(x)) == x`, and decoders reject
//! malformed input instead of guessing.
//!
//! ```rust
//! use transform_core::encode::apply_encoding;
//!
//! assert_eq!(apply_encoding("base64", "encode", "hello")?, "aGVsbG8=");
//! assert_eq!(apply_encoding("base64", "decode", "aGVsbG8=")?, "hello");
//! # Ok::<(), transform_core::error::ConversionError>(())
//! ```
pub mod base;
pub mod text;

use serde::Serialize;
use tracing::debug;

use crate::error::{ConversionError, EncodeError, ErrorDetail, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeId {
    Base16,
    Base32,
    Base58,
    Base64,
    Base64Url,
    Url,
    Html,
    Utf8,
}

impl SchemeId {
    pub const ALL: [SchemeId; 8] = [
        Self::Base16,
        Self::Base32,
        Self::Base58,
        Self::Base64,
        Self::Base64Url,
        Self::Url,
        Self::Html,
        Self::Utf8,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "base16" | "hex" => Some(Self::Base16),
            "base32" => Some(Self::Base32),
            "base58" => Some(Self::Base58),
            "base64" => Some(Self::Base64),
            "base64url" | "base64-url" => Some(Self::Base64Url),
            "url" => Some(Self::Url),
            "html" => Some(Self::Html),
            "utf8" | "utf-8" => Some(Self::Utf8),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn descriptor(self) -> &'static EncodingScheme {
        SCHEMES
            .iter()
            .find(|scheme| scheme.id == self)
            .unwrap_or(&SCHEMES[0])
    }
}

/// Whether a scheme maps bytes to text or text to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    Bytes,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Encode,
    Decode,
}

impl Direction {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "encode" => Some(Self::Encode),
            "decode" => Some(Self::Decode),
            _ => None,
        }
    }

    fn stage(self) -> Stage {
        match self {
            Self::Encode => Stage::Encode,
            Self::Decode => Stage::Decode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodingScheme {
    pub id: SchemeId,
    pub name: &'static str,
    pub label: &'static str,
    pub kind: SchemeKind,
}

static SCHEMES: [EncodingScheme; 8] = [
    EncodingScheme { id: SchemeId::Base16, name: "base16", label: "Base16 (hex)", kind: SchemeKind::Bytes },
    EncodingScheme { id: SchemeId::Base32, name: "base32", label: "Base32", kind: SchemeKind::Bytes },
    EncodingScheme { id: SchemeId::Base58, name: "base58", label: "Base58", kind: SchemeKind::Bytes },
    EncodingScheme { id: SchemeId::Base64, name: "base64", label: "Base64", kind: SchemeKind::Bytes },
    EncodingScheme { id: SchemeId::Base64Url, name: "base64url", label: "Base64 URL-safe", kind: SchemeKind::Bytes },
    EncodingScheme { id: SchemeId::Url, name: "url", label: "URL encoding", kind: SchemeKind::Text },
    EncodingScheme { id: SchemeId::Html, name: "html", label: "HTML entities", kind: SchemeKind::Text },
    EncodingScheme { id: SchemeId::Utf8, name: "utf8", label: "UTF-8 escapes", kind: SchemeKind::Text },
];

/// Runs one scheme in one direction over raw bytes.
///
/// Byte schemes encode any bytes and decode text; text schemes need UTF-8 in
/// both directions.
pub fn transform(scheme: SchemeId, direction: Direction, input: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let output = match direction {
        Direction::Encode => match scheme {
            SchemeId::Base16 => base::encode_base16(input),
            SchemeId::Base32 => base::encode_base32(input),
            SchemeId::Base58 => base::encode_base58(input),
            SchemeId::Base64 => base::encode_base64(input),
            SchemeId::Base64Url => base::encode_base64url(input),
            SchemeId::Url => text::url_encode(as_text(scheme, input)?),
            SchemeId::Html => text::html_encode(as_text(scheme, input)?),
            SchemeId::Utf8 => text::utf8_escape(as_text(scheme, input)?),
        }
        .into_bytes(),
        Direction::Decode => {
            let input = as_text(scheme, input)?;
            match scheme {
                SchemeId::Base16 => base::decode_base16(input)?,
                SchemeId::Base32 => base::decode_base32(input)?,
                SchemeId::Base58 => base::decode_base58(input)?,
                SchemeId::Base64 => base::decode_base64(input)?,
                SchemeId::Base64Url => base::decode_base64url(input)?,
                SchemeId::Url => text::url_decode(input)?.into_bytes(),
                SchemeId::Html => text::html_decode(input)?.into_bytes(),
                SchemeId::Utf8 => text::utf8_unescape(input)?.into_bytes(),
            }
        }
    };
    Ok(output)
}

fn as_text(scheme: SchemeId, input: &[u8]) -> Result<&str, EncodeError> {
    std::str::from_utf8(input).map_err(|err| {
        EncodeError::invalid(scheme.name(), "input is not valid UTF-8", Some(err.valid_up_to()))
    })
}

fn resolve(scheme: &str, direction: &str) -> Result<(SchemeId, Direction), ConversionError> {
    let id = SchemeId::parse(scheme).ok_or_else(|| ConversionError::unknown(scheme, direction, scheme))?;
    let dir = Direction::parse(direction).ok_or_else(|| ConversionError::unknown(scheme, direction, direction))?;
    Ok((id, dir))
}

/// Applies `scheme` in `direction` ("encode" or "decode") to binary input.
pub fn apply_encoding_bytes(scheme: &str, direction: &str, input: &[u8]) -> Result<Vec<u8>, ConversionError> {
    let (id, dir) = resolve(scheme, direction)?;
    debug!(scheme = id.name(), direction = ?dir, bytes = input.len(), "applying encoding");
    let output = transform(id, dir, input).map_err(|err| {
        debug!(kind = err.kind(), "encoding failed");
        ConversionError::new(dir.stage(), scheme, direction, err)
    })?;
    debug!(bytes = output.len(), "encoding finished");
    Ok(output)
}

/// Text interface over [`apply_encoding_bytes`]. Decoded bytes that are not
/// UTF-8 are reported as invalid input.
pub fn apply_encoding(scheme: &str, direction: &str, input: &str) -> Result<String, ConversionError> {
    let (id, dir) = resolve(scheme, direction)?;
    let output = apply_encoding_bytes(scheme, direction, input.as_bytes())?;
    String::from_utf8(output).map_err(|err| {
        let detail = EncodeError::invalid(
            id.name(),
            "decoded bytes are not valid UTF-8; use the byte interface",
            Some(err.utf8_error().valid_up_to()),
        );
        ConversionError::new(dir.stage(), scheme, direction, ErrorDetail::Encode(detail))
    })
}

pub fn list_schemes() -> Vec<&'static EncodingScheme> {
    SCHEMES.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scheme_round_trips_text() {
        let sample = "Grüße, 世界! a+b=c & <d> \\ 100%";
        for id in SchemeId::ALL {
            let encoded = apply_encoding(id.name(), "encode", sample).unwrap();
            let decoded = apply_encoding(id.name(), "decode", &encoded).unwrap();
            assert_eq!(decoded, sample, "scheme {}", id.name());
        }
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(SchemeId::parse("HEX"), Some(SchemeId::Base16));
        assert_eq!(SchemeId::parse(" base64-url "), Some(SchemeId::Base64Url));
        assert_eq!(SchemeId::Base64Url.name(), "base64url");
    }

    #[test]
    fn unknown_scheme_and_direction_fail_at_resolve() {
        let err = apply_encoding("rot13", "encode", "x").unwrap_err();
        assert_eq!(err.stage, Stage::Resolve);
        assert_eq!(err.kind(), "UnknownFormat");
        let err = apply_encoding("base64", "sideways", "x").unwrap_err();
        assert_eq!(err.kind(), "UnknownFormat");
    }

    #[test]
    fn decode_errors_carry_stage_and_offset() {
        let err = apply_encoding("base64", "decode", "not-base64!").unwrap_err();
        assert_eq!(err.stage, Stage::Decode);
        assert_eq!(err.kind(), "InvalidInput");
        assert_eq!(err.report().offset, Some(3));
    }

    #[test]
    fn binary_payloads_need_the_byte_interface() {
        let err = apply_encoding("base16", "decode", "FF00").unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
        let bytes = apply_encoding_bytes("base16", "decode", b"FF00").unwrap();
        assert_eq!(bytes, vec![0xff, 0x00]);
        let text = apply_encoding_bytes("base58", "encode", &[0xff, 0x00]).unwrap();
        assert_eq!(apply_encoding_bytes("base58", "decode", &text).unwrap(), vec![0xff, 0x00]);
    }

    #[test]
    fn text_schemes_reject_non_utf8_input() {
        let err = transform(SchemeId::Url, Direction::Encode, &[b'a', 0xff]).unwrap_err();
        assert_eq!(err.offset(), Some(1));
    }

    #[test]
    fn double_application_is_detectable() {
        let once = apply_encoding("url", "encode", "a%b").unwrap();
        let twice = apply_encoding("url", "encode", &once).unwrap();
        assert_ne!(once, twice);
        let once = apply_encoding("html", "encode", "a&b").unwrap();
        assert_ne!(apply_encoding("html", "encode", &once).unwrap(), once);
    }

    #[test]
    fn registry_lists_every_scheme() {
        let schemes = list_schemes();
        assert_eq!(schemes.len(), SchemeId::ALL.len());
        assert!(schemes.iter().all(|scheme| scheme.id.descriptor() == *scheme));
        assert_eq!(SchemeId::Url.descriptor().kind, SchemeKind::Text);
    }
}
