//! Stateless encoders and decoders for textual stream I/O.
//!
//! None of these functions keep state between calls. Alignment of chunk
//! boundaries to encoding units is the caller's job (see `adapter`).

use base64::{engine::general_purpose::STANDARD, Engine as _};

use cipherflow_common::{Encoding, Error, Result};

/// Raw bytes per base64 quantum.
pub const BASE64_RAW_UNIT: usize = 3;

/// Characters per base64 quantum.
pub const BASE64_TEXT_UNIT: usize = 4;

/// Characters per hex-encoded byte.
pub const HEX_TEXT_UNIT: usize = 2;

/// Encode bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode an even-length run of hex digits.
///
/// # Errors
/// - `MalformedInput` on odd length or a non-hex character
pub fn hex_decode(text: &[u8]) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::MalformedInput(format!("hex: {}", e)))
}

/// Encode bytes as standard base64 without line breaks.
///
/// Padding is emitted only when `bytes.len()` is not a multiple of 3.
pub fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, ignoring ASCII whitespace.
///
/// # Errors
/// - `MalformedInput` on invalid symbols, bad padding or a dangling quantum
pub fn base64_decode(text: &[u8]) -> Result<Vec<u8>> {
    let compact = strip_whitespace(text);
    STANDARD
        .decode(&compact)
        .map_err(|e| Error::MalformedInput(format!("base64: {}", e)))
}

/// Copy `text` without ASCII whitespace.
pub fn strip_whitespace(text: &[u8]) -> Vec<u8> {
    text.iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect()
}

/// Encode a complete value in one step.
///
/// Used for digest and signature output, which is produced exactly once
/// and so never needs a carry.
///
/// # Errors
/// - `BadEncoding` for `Utf8`, which cannot represent arbitrary bytes
pub fn encode_once(bytes: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Binary => Ok(bytes.to_vec()),
        Encoding::Hex => Ok(hex_encode(bytes).into_bytes()),
        Encoding::Base64 => Ok(base64_encode(bytes).into_bytes()),
        Encoding::Utf8 => Err(Error::BadEncoding(encoding.to_string())),
    }
}

/// Decode a complete value in one step. `Binary` and `Utf8` pass through.
///
/// # Errors
/// - `MalformedInput` if hex/base64 text cannot be decoded
pub fn decode_once(text: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Binary | Encoding::Utf8 => Ok(text.to_vec()),
        Encoding::Hex => hex_decode(text),
        Encoding::Base64 => base64_decode(text),
    }
}

/// Length of `bytes` excluding a trailing, incomplete multi-byte UTF-8 sequence.
///
/// Only a lead byte that still waits for continuation bytes is held back.
/// Malformed tails (stray continuation bytes, invalid lead bytes, surplus
/// continuations) count as complete so they are never deferred forever.
pub fn utf8_valid_prefix_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    let mut continuations = 0;

    for (index, &byte) in bytes.iter().enumerate().rev().take(4) {
        if byte & 0x80 == 0x00 {
            return len;
        }
        if byte & 0xc0 == 0x80 {
            continuations += 1;
            continue;
        }

        let needed = if byte & 0xe0 == 0xc0 {
            1
        } else if byte & 0xf0 == 0xe0 {
            2
        } else if byte & 0xf8 == 0xf0 {
            3
        } else {
            // 11111xxx can never start a sequence.
            return len;
        };

        return if continuations < needed { index } else { len };
    }

    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_encode_lowercase() {
        assert_eq!(hex_encode(&[0x00, 0xab, 0xff]), "00abff");
        assert_eq!(hex_encode(&[]), "");
    }

    #[test]
    fn test_hex_decode_mixed_case() {
        assert_eq!(hex_decode(b"00AbfF").unwrap(), vec![0x00, 0xab, 0xff]);
    }

    #[test]
    fn test_hex_decode_rejects_garbage() {
        assert!(matches!(hex_decode(b"zz"), Err(Error::MalformedInput(_))));
        assert!(matches!(hex_decode(b"abc"), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_base64_padding_only_when_unaligned() {
        assert_eq!(base64_encode(b"abc"), "YWJj");
        assert_eq!(base64_encode(b"abcd"), "YWJjZA==");
    }

    #[test]
    fn test_base64_decode_ignores_whitespace() {
        assert_eq!(base64_decode(b"YWJj\nZA==\r\n").unwrap(), b"abcd");
    }

    #[test]
    fn test_base64_decode_rejects_garbage() {
        assert!(matches!(base64_decode(b"YW*j"), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_encode_once() {
        assert_eq!(encode_once(b"\x01\xff", Encoding::Hex).unwrap(), b"01ff");
        assert_eq!(encode_once(b"ab", Encoding::Base64).unwrap(), b"YWI=");
        assert_eq!(encode_once(b"ab", Encoding::Binary).unwrap(), b"ab");
        assert_eq!(
            encode_once(b"ab", Encoding::Utf8),
            Err(Error::BadEncoding("utf8".to_string()))
        );
    }

    #[test]
    fn test_decode_once() {
        assert_eq!(decode_once(b"01ff", Encoding::Hex).unwrap(), vec![0x01, 0xff]);
        assert_eq!(decode_once(b"YWI=", Encoding::Base64).unwrap(), b"ab");
        assert_eq!(decode_once("\u{e9}".as_bytes(), Encoding::Utf8).unwrap(), vec![0xc3, 0xa9]);
        assert!(matches!(decode_once(b"0", Encoding::Hex), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_utf8_prefix_empty_and_ascii() {
        assert_eq!(utf8_valid_prefix_len(b""), 0);
        assert_eq!(utf8_valid_prefix_len(b"hello"), 5);
    }

    #[test]
    fn test_utf8_prefix_complete_multibyte() {
        let text = "caf\u{e9} \u{4e2d}";
        assert_eq!(utf8_valid_prefix_len(text.as_bytes()), text.len());
        let emoji = "\u{1f600}";
        assert_eq!(utf8_valid_prefix_len(emoji.as_bytes()), 4);
    }

    #[test]
    fn test_utf8_prefix_holds_back_incomplete_tail() {
        // "é" is c3 a9
        assert_eq!(utf8_valid_prefix_len(&[b'a', 0xc3]), 1);
        // "中" is e4 b8 ad
        assert_eq!(utf8_valid_prefix_len(&[b'a', 0xe4]), 1);
        assert_eq!(utf8_valid_prefix_len(&[b'a', 0xe4, 0xb8]), 1);
        // U+1F600 is f0 9f 98 80
        assert_eq!(utf8_valid_prefix_len(&[0xf0, 0x9f, 0x98]), 0);
    }

    #[test]
    fn test_utf8_prefix_malformed_not_held() {
        // Lone continuation bytes cannot form a prefix.
        assert_eq!(utf8_valid_prefix_len(&[0x80, 0x80]), 2);
        assert_eq!(utf8_valid_prefix_len(&[0x80, 0x80, 0x80, 0x80, 0x80]), 5);
        // Invalid lead byte.
        assert_eq!(utf8_valid_prefix_len(&[b'a', 0xff]), 2);
        // Surplus continuation after a two-byte lead.
        assert_eq!(utf8_valid_prefix_len(&[0xc3, 0xa9, 0xa9]), 3);
    }
}
