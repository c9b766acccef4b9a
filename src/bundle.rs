//! Key export bundles
//!
//! A bundle is a JSON object carrying a named key pair:
//!
//! ```json
//! {
//!   "signatureName": "...", "signatureType": "...", "exportDate": "<RFC 3339>",
//!   "publicKey": "...", "privateKey": "...",
//!   "p": "...", "q": "...", "e": "...", "d": "..."
//! }
//! ```
//!
//! `p`, `q`, `e`, `d` are optional decimal strings. Importing checks that both
//! halves are present, share a form and a modulus, and for JSON halves that
//! the numbers form a valid RSA key.

use crate::codec::to_decimal;
use crate::encoding::{match_public_private_modulus, EncodedKeyPair, Key};
use crate::error::{ParameterError, Result, SignError};
use crate::keygen::{validate_or_build_key, KeyParameters};
use crate::native;

use chrono::{SecondsFormat, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExport {
    pub signature_name: String,
    pub signature_type: String,
    pub export_date: String,
    pub public_key: String,
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
}

/// The lenient shape accepted on import, so missing fields become
/// `MalformedKey` rather than a deserializer error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExport {
    signature_name: Option<String>,
    signature_type: Option<String>,
    export_date: Option<String>,
    public_key: Option<String>,
    private_key: Option<String>,
    p: Option<String>,
    q: Option<String>,
    e: Option<String>,
    d: Option<String>,
}

/// A validated import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedKey {
    pub export: KeyExport,
    pub parameters: KeyParameters,
}

impl KeyExport {
    /// Bundles `pair`, stamping the current time. `parameters` adds the
    /// `p, q, e, d` fields when known.
    pub fn new(
        signature_name: &str,
        signature_type: &str,
        pair: &EncodedKeyPair,
        parameters: Option<&KeyParameters>,
    ) -> Self {
        let decimal = |value: Option<&BigUint>| value.map(to_decimal);

        KeyExport {
            signature_name: signature_name.to_string(),
            signature_type: signature_type.to_string(),
            export_date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            public_key: pair.public_key.clone(),
            private_key: pair.private_key.clone(),
            p: parameters.and_then(|k| decimal(k.p.as_ref())),
            q: parameters.and_then(|k| decimal(k.q.as_ref())),
            e: parameters.map(|k| to_decimal(&k.e)),
            d: parameters.map(|k| to_decimal(&k.d)),
        }
    }

    pub fn pair(&self) -> EncodedKeyPair {
        EncodedKeyPair {
            public_key: self.public_key.clone(),
            private_key: self.private_key.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| SignError::MalformedKey(format!("cannot serialize bundle: {err}")))
    }
}

fn present(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SignError::MalformedKey(format!("bundle is missing {name}")))
}

fn optional_decimal(value: &Option<String>, name: &'static str) -> Result<Option<BigUint>> {
    match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Ok(Some(
            crate::codec::parse_decimal(v).ok_or(ParameterError::NotANumber(name))?,
        )),
        None => Ok(None),
    }
}

/// Parses and validates a bundle.
pub fn import_bundle(json: &str) -> Result<ImportedKey> {
    let raw: RawExport = serde_json::from_str(json)
        .map_err(|err| SignError::MalformedKey(format!("invalid key bundle: {err}")))?;

    let pair = EncodedKeyPair {
        public_key: present(raw.public_key, "publicKey")?,
        private_key: present(raw.private_key, "privateKey")?,
    };
    let (public, private) = pair.decode()?;
    if !match_public_private_modulus(&public, &private)? {
        return Err(SignError::ModulusMismatch);
    }

    let p = optional_decimal(&raw.p, "p")?;
    let q = optional_decimal(&raw.q, "q")?;
    let e = optional_decimal(&raw.e, "e")?;
    let d = optional_decimal(&raw.d, "d")?;

    let parameters = match (public, private) {
        (Key::Json(public), Key::Json(private)) => {
            if e.as_ref().is_some_and(|e| *e != public.exponent)
                || d.as_ref().is_some_and(|d| *d != private.exponent)
            {
                return Err(SignError::MalformedKey(
                    "bundle exponents disagree with the key halves".into(),
                ));
            }
            validate_or_build_key(
                p.as_ref(),
                q.as_ref(),
                &public.exponent,
                &private.exponent,
                Some(&public.n),
            )?
        }
        (_, Key::Native(private)) => native::parameters_of(&private)?,
        _ => {
            return Err(SignError::MalformedKey(
                "public and private halves use different encodings".into(),
            ))
        }
    };

    let export = KeyExport {
        signature_name: raw.signature_name.unwrap_or_default(),
        signature_type: raw.signature_type.unwrap_or_default(),
        export_date: raw.export_date.unwrap_or_default(),
        public_key: pair.public_key,
        private_key: pair.private_key,
        p: raw.p,
        q: raw.q,
        e: raw.e,
        d: raw.d,
    };
    info!(name = %export.signature_name, "imported key bundle");

    Ok(ImportedKey { export, parameters })
}
