//! Conversions between arbitrary-precision integers and their textual forms
//!
//! Integers cross the byte boundary as big-endian, minimal-length buffers
//! (`0` is the single byte `0x00`). Base64 uses the standard alphabet with
//! padding. Decimal text is unsigned; surrounding whitespace and leading
//! zeros are tolerated on input and never produced on output.

use crate::error::{Result, SignError};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use num_bigint::BigUint;
use num_traits::Num;

/// BigUint -> base64 of its minimal big-endian bytes
pub fn to_base64(value: &BigUint) -> String {
    STANDARD.encode(value.to_bytes_be())
}

/// base64 -> bytes -> non-negative BigUint
pub fn from_base64(text: &str) -> Result<BigUint> {
    let bytes = decode_base64(text)?;
    if bytes.is_empty() {
        return Err(SignError::SignatureMalformed("empty value".into()));
    }
    Ok(BigUint::from_bytes_be(&bytes))
}

pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.split_whitespace().collect();
    STANDARD
        .decode(compact)
        .map_err(|err| SignError::SignatureMalformed(format!("invalid base64: {err}")))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Lowercase hex, for logs and fingerprints
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Strips `-----BEGIN ...-----` / `-----END ...-----` lines and whitespace.
pub fn unarmor(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("-----"))
        .flat_map(|line| line.split_whitespace())
        .collect()
}

/// Parses an unsigned decimal string. Signs, empty strings and any non-digit
/// character are rejected.
pub fn parse_decimal(text: &str) -> Option<BigUint> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigUint::from_str_radix(trimmed, 10).ok()
}

pub fn to_decimal(value: &BigUint) -> String {
    value.to_str_radix(10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64() {
        let v = BigUint::from(65537u32);
        assert_eq!(to_base64(&v), "AQAB");
        assert_eq!(from_base64("AQAB").unwrap(), v);

        // leading zero bytes are absorbed by the integer
        assert_eq!(from_base64("AAEAAQ==").unwrap(), v);

        // zero still has a one byte representation
        assert_eq!(to_base64(&BigUint::from(0u32)), "AA==");

        assert!(matches!(
            from_base64("not base64!"),
            Err(SignError::SignatureMalformed(_))
        ));
        assert!(matches!(
            from_base64(""),
            Err(SignError::SignatureMalformed(_))
        ));
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x00, 0x0f, 0xab]), "000fab");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn test_unarmor() {
        let text = "-----BEGIN RSA SIGNATURE-----\nAQ\nAB \n-----END RSA SIGNATURE-----\n";
        assert_eq!(unarmor(text), "AQAB");
        // body lines may contain the marker words
        assert_eq!(unarmor("ENDx\nBEGIN"), "ENDxBEGIN");
    }

    #[test]
    fn test_decimal() {
        assert_eq!(parse_decimal("143"), Some(BigUint::from(143u32)));
        assert_eq!(parse_decimal(" 00143\n"), Some(BigUint::from(143u32)));
        assert_eq!(parse_decimal("-143"), None);
        assert_eq!(parse_decimal("+143"), None);
        assert_eq!(parse_decimal("14x3"), None);
        assert_eq!(parse_decimal(""), None);

        assert_eq!(to_decimal(&BigUint::from(143u32)), "143");
    }
}
