// Byte-to-text codecs. Decoders trim surrounding whitespace and report
// offsets relative to the untrimmed input.
use std::sync::OnceLock;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use data_encoding::BASE32;

use crate::error::EncodeError;

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

static BASE58_LOOKUP: OnceLock<[i8; 256]> = OnceLock::new();

fn trimmed(input: &str) -> (&str, usize) {
    let start = input.len() - input.trim_start().len();
    (input.trim(), start)
}

pub fn encode_base16(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Accepts upper- or lower-case digits.
pub fn decode_base16(input: &str) -> Result<Vec<u8>, EncodeError> {
    let (text, start) = trimmed(input);
    hex::decode(text).map_err(|err| {
        let offset = match err {
            hex::FromHexError::InvalidHexCharacter { index, .. } => Some(start + index),
            _ => None,
        };
        EncodeError::invalid("base16", err.to_string(), offset)
    })
}

pub fn encode_base32(data: &[u8]) -> String {
    BASE32.encode(data)
}

pub fn decode_base32(input: &str) -> Result<Vec<u8>, EncodeError> {
    let (text, start) = trimmed(input);
    BASE32
        .decode(text.as_bytes())
        .map_err(|err| EncodeError::invalid("base32", err.to_string(), Some(start + err.position)))
}

pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode_base64(input: &str) -> Result<Vec<u8>, EncodeError> {
    decode_with(&STANDARD, "base64", input)
}

pub fn encode_base64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn decode_base64url(input: &str) -> Result<Vec<u8>, EncodeError> {
    decode_with(&URL_SAFE_NO_PAD, "base64url", input)
}

fn decode_with<E: Engine>(engine: &E, scheme: &'static str, input: &str) -> Result<Vec<u8>, EncodeError> {
    let (text, start) = trimmed(input);
    engine.decode(text.as_bytes()).map_err(|err| {
        let offset = match err {
            base64::DecodeError::InvalidByte(idx, _) | base64::DecodeError::InvalidLastSymbol(idx, _) => {
                Some(start + idx)
            }
            _ => None,
        };
        EncodeError::invalid(scheme, err.to_string(), offset)
    })
}

/// Bitcoin-alphabet Base58. Each leading zero byte maps to a leading `1`.
///
/// Runs in time quadratic in the input length, so it suits keys and hashes
/// rather than bulk data.
pub fn encode_base58(data: &[u8]) -> String {
    let zeros = data.iter().take_while(|byte| **byte == 0).count();
    // Little-endian base-58 digits of the remaining big-endian number.
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 138 / 100 + 1);
    for &byte in &data[zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(std::iter::repeat('1').take(zeros));
    out.extend(digits.iter().rev().map(|digit| BASE58_ALPHABET[*digit as usize] as char));
    out
}

pub fn decode_base58(input: &str) -> Result<Vec<u8>, EncodeError> {
    let (text, start) = trimmed(input);
    let table = base58_lookup();
    let zeros = text.bytes().take_while(|byte| *byte == b'1').count();
    let mut bytes: Vec<u8> = Vec::with_capacity(text.len());
    for (idx, byte) in text.bytes().enumerate() {
        let value = table[byte as usize];
        if value < 0 {
            let ch = text[idx..].chars().next().unwrap_or('?');
            return Err(EncodeError::invalid(
                "base58",
                format!("invalid character `{ch}`"),
                Some(start + idx),
            ));
        }
        let mut carry = value as u32;
        for out in bytes.iter_mut() {
            carry += (*out as u32) * 58;
            *out = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    let mut decoded = vec![0u8; zeros];
    decoded.extend(bytes.iter().rev());
    Ok(decoded)
}

fn base58_lookup() -> &'static [i8; 256] {
    BASE58_LOOKUP.get_or_init(|| {
        let mut table = [-1i8; 256];
        for (idx, byte) in BASE58_ALPHABET.iter().enumerate() {
            table[*byte as usize] = idx as i8;
        }
        table
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base16_is_upper_and_case_insensitive() {
        assert_eq!(encode_base16(b"\x01\xab"), "01AB");
        assert_eq!(decode_base16("01ab").unwrap(), vec![1, 0xab]);
        let err = decode_base16("  0g").unwrap_err();
        assert_eq!(err.offset(), Some(3));
        assert!(decode_base16("abc").is_err());
    }

    #[test]
    fn base32_requires_padding() {
        assert_eq!(encode_base32(b"hi"), "NBUQ====");
        assert_eq!(decode_base32("NBUQ====").unwrap(), b"hi");
        assert!(decode_base32("NBUQ").is_err());
    }

    #[test]
    fn base64_standard_and_url() {
        assert_eq!(encode_base64(b"hello"), "aGVsbG8=");
        assert_eq!(decode_base64(" aGVsbG8=\n").unwrap(), b"hello");
        assert_eq!(encode_base64url(&[0xfb, 0xff]), "-_8");
        assert_eq!(decode_base64url("-_8").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn base64_rejects_bad_input() {
        let err = decode_base64("not-base64!").unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
        assert_eq!(err.offset(), Some(3));
        assert!(decode_base64("aGVsbG8").is_err());
    }

    #[test]
    fn base58_known_vectors() {
        assert_eq!(encode_base58(b""), "");
        assert_eq!(encode_base58(b"hello world"), "StV1DL6CwTryKyV");
        assert_eq!(encode_base58(&[0, 0, 1]), "112");
        assert_eq!(decode_base58("StV1DL6CwTryKyV").unwrap(), b"hello world");
        assert_eq!(decode_base58("112").unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn base58_rejects_ambiguous_characters() {
        let err = decode_base58("abc0").unwrap_err();
        assert_eq!(err.offset(), Some(3));
        assert!(decode_base58("Il").is_err());
    }

    #[test]
    fn base58_round_trips_a_pasted_key_file() {
        let data: Vec<u8> = (0..4096u32).map(|idx| (idx * 31 % 251) as u8).collect();
        let encoded = encode_base58(&data);
        assert_eq!(decode_base58(&encoded).unwrap(), data);
    }
}
