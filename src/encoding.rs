//! Key encoding
//!
//! A key half travels as text in exactly one of two forms:
//!
//!   - JSON, `{"e":"<decimal>","n":"<decimal>"}` for the public half and
//!     `{"d":"<decimal>","n":"<decimal>"}` for the private half
//!   - a base64 standard-encoded blob (SPKI / PKCS#8 or PKCS#1 DER, optionally
//!     PEM-armored), only understood by the native RSA path
//!
//! The form is sniffed once, in `decode`, and carried as a `Key` from then on.
//! Text that looks like JSON but lacks a field is a `MalformedKey`; it is never
//! retried as a blob.

use crate::codec::{encode_base64, parse_decimal, to_decimal, unarmor};
use crate::error::{Result, SignError};
use crate::keygen::KeyParameters;
use crate::native;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyHalf {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyForm {
    Json,
    Native,
}

/// The numbers carried by a JSON key half. `exponent` is `e` for the public
/// half and `d` for the private half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFields {
    pub half: KeyHalf,
    pub exponent: BigUint,
    pub n: BigUint,
}

/// DER bytes of a standard-encoded key, opaque to everything but `native`.
#[derive(Clone, PartialEq, Eq)]
pub struct NativeBlob(Vec<u8>);

impl NativeBlob {
    pub fn new(der: Vec<u8>) -> Self {
        NativeBlob(der)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for NativeBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "NativeBlob({} bytes)", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Json(KeyFields),
    Native(NativeBlob),
}

impl Key {
    pub fn form(&self) -> KeyForm {
        match self {
            Key::Json(_) => KeyForm::Json,
            Key::Native(_) => KeyForm::Native,
        }
    }
}

/// The textual public/private pair as stored by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedKeyPair {
    pub public_key: String,
    pub private_key: String,
}

impl EncodedKeyPair {
    /// JSON form of a parameter set
    pub fn from_parameters(params: &KeyParameters) -> Self {
        EncodedKeyPair {
            public_key: encode(params, KeyHalf::Public),
            private_key: encode(params, KeyHalf::Private),
        }
    }

    /// Decodes both halves, rejecting pairs whose halves use different forms
    /// or are swapped.
    pub fn decode(&self) -> Result<(Key, Key)> {
        let public = decode(&self.public_key)?;
        let private = decode(&self.private_key)?;

        if public.form() != private.form() {
            return Err(SignError::MalformedKey(
                "public and private halves use different encodings".into(),
            ));
        }
        if let (Key::Json(public), Key::Json(private)) = (&public, &private) {
            if public.half != KeyHalf::Public || private.half != KeyHalf::Private {
                return Err(SignError::MalformedKey(
                    "expected {e,n} as the public half and {d,n} as the private half".into(),
                ));
            }
        }

        Ok((public, private))
    }

    pub fn form(&self) -> Result<KeyForm> {
        Ok(self.decode()?.0.form())
    }
}

/// Emits the JSON form of one half.
pub fn encode(params: &KeyParameters, half: KeyHalf) -> String {
    let n = to_decimal(&params.n);
    match half {
        KeyHalf::Public => json!({ "e": to_decimal(&params.e), "n": n }).to_string(),
        KeyHalf::Private => json!({ "d": to_decimal(&params.d), "n": n }).to_string(),
    }
}

/// Emits the standard-encoded form: base64 SPKI DER public half, base64 PKCS#8
/// DER private half.
pub fn encode_native(params: &KeyParameters) -> Result<EncodedKeyPair> {
    let (public_der, private_der) = native::encode_der(params)?;
    Ok(EncodedKeyPair {
        public_key: encode_base64(&public_der),
        private_key: encode_base64(&private_der),
    })
}

/// Sniffs the form of `text` and decodes it.
pub fn decode(text: &str) -> Result<Key> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SignError::MalformedKey("empty key".into()));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(fields)) => decode_fields(&fields).map(Key::Json),
        Ok(_) if trimmed.starts_with('[') => Err(SignError::MalformedKey(
            "JSON key must be an object".into(),
        )),
        Err(err) if trimmed.starts_with('{') => {
            Err(SignError::MalformedKey(format!("invalid JSON key: {err}")))
        }
        _ => decode_blob(trimmed).map(Key::Native),
    }
}

fn decode_fields(fields: &Map<String, Value>) -> Result<KeyFields> {
    let string_field = |name: &str| -> Result<Option<BigUint>> {
        match fields.get(name) {
            None => Ok(None),
            Some(Value::String(text)) => parse_decimal(text).map(Some).ok_or_else(|| {
                SignError::MalformedKey(format!("field {name} is not an unsigned decimal"))
            }),
            Some(_) => Err(SignError::MalformedKey(format!(
                "field {name} must be a decimal string"
            ))),
        }
    };

    if fields.len() != 2 {
        return Err(SignError::MalformedKey(
            "JSON key must have exactly the fields {e,n} or {d,n}".into(),
        ));
    }

    let n = string_field("n")?
        .ok_or_else(|| SignError::MalformedKey("JSON key is missing field n".into()))?;

    match (string_field("e")?, string_field("d")?) {
        (Some(e), None) => Ok(KeyFields {
            half: KeyHalf::Public,
            exponent: e,
            n,
        }),
        (None, Some(d)) => Ok(KeyFields {
            half: KeyHalf::Private,
            exponent: d,
            n,
        }),
        _ => Err(SignError::MalformedKey(
            "JSON key must have exactly the fields {e,n} or {d,n}".into(),
        )),
    }
}

fn decode_blob(text: &str) -> Result<NativeBlob> {
    let der = STANDARD.decode(unarmor(text)).map_err(|_| {
        SignError::MalformedKey("key is neither a JSON key nor a base64 key blob".into())
    })?;
    if der.is_empty() {
        return Err(SignError::MalformedKey("empty key blob".into()));
    }

    Ok(NativeBlob(der))
}

/// True when both halves share a modulus. Moduli are compared as integers.
pub fn match_public_private_modulus(public: &Key, private: &Key) -> Result<bool> {
    match (public, private) {
        (Key::Json(public), Key::Json(private)) => Ok(public.n == private.n),
        (Key::Native(public), Key::Native(private)) => {
            Ok(native::public_modulus(public)? == native::private_modulus(private)?)
        }
        _ => Err(SignError::MalformedKey(
            "public and private halves use different encodings".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KeyParameters {
        KeyParameters {
            p: Some(BigUint::from(11u32)),
            q: Some(BigUint::from(13u32)),
            e: BigUint::from(7u32),
            d: BigUint::from(103u32),
            n: BigUint::from(143u32),
        }
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode(&sample(), KeyHalf::Public), r#"{"e":"7","n":"143"}"#);
        assert_eq!(
            encode(&sample(), KeyHalf::Private),
            r#"{"d":"103","n":"143"}"#
        );
    }

    #[test]
    fn test_decode_json() {
        let key = decode(r#"{"e":"7","n":"143"}"#).unwrap();
        assert_eq!(
            key,
            Key::Json(KeyFields {
                half: KeyHalf::Public,
                exponent: BigUint::from(7u32),
                n: BigUint::from(143u32),
            })
        );

        let key = decode(r#" {"n": "0143", "d": " 103"} "#).unwrap();
        assert!(matches!(key, Key::Json(KeyFields { half: KeyHalf::Private, .. })));
    }

    #[test]
    fn test_decode_partial_json_is_malformed() {
        for text in [
            r#"{"e":"7"}"#,
            r#"{"e":"7","d":"103"}"#,
            r#"{"e":"7","n":143}"#,
            r#"{"e":"-7","n":"143"}"#,
            r#"{"e":"7","n":"143","d":"103"}"#,
            r#"{"e":"7","#,
            r#"["7","143"]"#,
        ] {
            assert!(
                matches!(decode(text), Err(SignError::MalformedKey(_))),
                "{text} should be malformed"
            );
        }
    }

    #[test]
    fn test_decode_blob() {
        let key = decode("MIIBCgKCAQEA").unwrap();
        assert_eq!(key.form(), KeyForm::Native);

        let armored = "-----BEGIN PUBLIC KEY-----\nMIIB\nCgKC\n-----END PUBLIC KEY-----\n";
        match decode(armored).unwrap() {
            Key::Native(blob) => assert_eq!(blob.as_bytes(), STANDARD.decode("MIIBCgKC").unwrap()),
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            decode("not a key at all!"),
            Err(SignError::MalformedKey(_))
        ));
        assert!(matches!(decode("   "), Err(SignError::MalformedKey(_))));
    }

    #[test]
    fn test_pair_forms() {
        let pair = EncodedKeyPair::from_parameters(&sample());
        assert_eq!(pair.form().unwrap(), KeyForm::Json);

        let mixed = EncodedKeyPair {
            public_key: pair.public_key.clone(),
            private_key: "MIIBCgKCAQEA".into(),
        };
        assert!(matches!(mixed.form(), Err(SignError::MalformedKey(_))));

        let swapped = EncodedKeyPair {
            public_key: pair.private_key.clone(),
            private_key: pair.public_key.clone(),
        };
        assert!(matches!(swapped.decode(), Err(SignError::MalformedKey(_))));
    }

    #[test]
    fn test_match_modulus() {
        let public = decode(r#"{"e":"7","n":"143"}"#).unwrap();
        let private = decode(r#"{"d":"103","n":" 000143"}"#).unwrap();
        assert!(match_public_private_modulus(&public, &private).unwrap());

        let other = decode(r#"{"d":"103","n":"145"}"#).unwrap();
        assert!(!match_public_private_modulus(&public, &other).unwrap());
    }
}
