//! Hex encoding helpers
//!
//! The module exchanges payloads, NVM addresses and NVM values as hex text.
//! Addresses are big-endian; the module may omit leading zeros in its
//! responses, hence the padding helpers.

use crate::error::ParseError;

/// Hex representation of a byte slice (lowercase)
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    ::hex::encode(bytes)
}

/// Hex representation of a single byte
pub fn byte_to_hex(byte: u8) -> String {
    bytes_to_hex(&[byte])
}

/// Big-endian hex representation of a `u16`
pub fn u16_to_hex(value: u16) -> String {
    bytes_to_hex(&value.to_be_bytes())
}

/// Decode a hex string into bytes
pub fn hex_to_bytes(h: &str) -> Result<Vec<u8>, ParseError> {
    ::hex::decode(h).map_err(|e| ParseError::InvalidHex(format!("{h:?}: {e}")))
}

/// Decode a hex string holding exactly one byte
pub fn hex_to_byte(h: &str) -> Result<u8, ParseError> {
    match hex_to_bytes(h)?.as_slice() {
        [byte] => Ok(*byte),
        other => Err(ParseError::UnexpectedLength {
            expected: 1,
            actual: other.len(),
        }),
    }
}

/// Decode a hex string holding exactly one big-endian `u16`
pub fn hex_to_u16(h: &str) -> Result<u16, ParseError> {
    match hex_to_bytes(h)?.as_slice() {
        [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
        other => Err(ParseError::UnexpectedLength {
            expected: 2,
            actual: other.len(),
        }),
    }
}

/// Pad with leading zeros until the string has at least `digits` characters
pub fn pad_hex(h: &str, digits: usize) -> String {
    format!("{h:0>digits$}")
}

/// Pad with a single leading zero only if the string has an odd length
pub fn pad_hex_to_even_length(h: &str) -> String {
    if h.len() % 2 == 0 {
        h.to_string()
    } else {
        format!("0{h}")
    }
}
