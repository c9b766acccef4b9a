//! RSA Sign and Verify
//!
//! Signature Generation
//! The signature is the deciphering operation applied to the message digest,
//! reduced into the ring first:
//! s = (h mod n)^d mod n, where h = DIGEST(message) read as a big-endian integer
//!
//! Signature Verification
//! Given a signature `s`, we compute h' = s^e mod n with the public exponent.
//!
//! The signature is valid iff h' = h mod n.
//!
//! This is textbook RSA: there is no padding, and reducing `h` modulo `n`
//! means any two digests congruent mod `n` share a signature. It is weak
//! and kept exactly as is so existing signatures keep verifying.
//!
//! Keys in the blob form are routed to `native` instead (PKCS#1 v1.5). The
//! two paths never verify each other's signatures.

use crate::cipher::mod_pow;
use crate::codec::{decode_base64, encode_base64, from_base64, to_base64};
use crate::digest::DigestAlgorithm;
use crate::encoding::{decode, Key, KeyFields, KeyHalf};
use crate::error::{Result, SignError};
use crate::native::{self, NativeCheck};

use num_bigint::BigUint;
use std::io::Read;
use tracing::{debug, warn};

pub const VALID_DIAGNOSTIC: &str = "signature is valid";

/// Why a structurally sound signature did not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchCause {
    /// the signature integer is not below the modulus
    SignatureOutOfRange,
    /// the signature bytes do not have the modulus length
    SignatureLength,
    /// the recovered digest differs from the recomputed one
    DigestMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    pub diagnostic: String,
    pub cause: Option<MismatchCause>,
}

impl Verification {
    fn valid() -> Self {
        Verification {
            valid: true,
            diagnostic: VALID_DIAGNOSTIC.to_string(),
            cause: None,
        }
    }

    fn mismatch(cause: MismatchCause, diagnostic: String) -> Self {
        warn!(?cause, %diagnostic, "signature did not verify");
        Verification {
            valid: false,
            diagnostic,
            cause: Some(cause),
        }
    }

    /// `Ok(())` when valid, `SignError::VerificationFailed` otherwise
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(SignError::VerificationFailed {
                diagnostic: self.diagnostic,
            })
        }
    }
}

fn digest_mismatch(algorithm: DigestAlgorithm, hashed: &[u8]) -> Verification {
    Verification::mismatch(
        MismatchCause::DigestMismatch,
        format!(
            "hash mismatch: recomputed {algorithm} digest {} does not match the signed digest",
            encode_base64(hashed)
        ),
    )
}

/// Signs `message` with the private half `key` and returns the base64 signature.
pub fn sign(message: &[u8], key: &str, algorithm: DigestAlgorithm) -> Result<String> {
    let key = decode(key)?;
    sign_digest(&algorithm.digest(message), &key, algorithm)
}

/// Like `sign`, hashing `reader` in one streaming pass.
pub fn sign_reader<R: Read>(reader: R, key: &str, algorithm: DigestAlgorithm) -> Result<String> {
    let key = decode(key)?;
    let hashed = algorithm.digest_reader(reader)?;
    sign_digest(&hashed, &key, algorithm)
}

/// Signs an already computed digest with a decoded key.
pub fn sign_digest(hashed: &[u8], key: &Key, algorithm: DigestAlgorithm) -> Result<String> {
    match key {
        Key::Json(fields) => {
            let (d, n) = private_fields(fields)?;
            debug!(%algorithm, bits = n.bits(), "signing with textbook RSA");

            // s = (h mod n)^d mod n
            let h = BigUint::from_bytes_be(hashed) % n;
            let s = mod_pow(&h, d, n);

            Ok(to_base64(&s))
        }
        Key::Native(blob) => {
            let signature = native::sign_digest(blob, algorithm, hashed)?;
            Ok(encode_base64(&signature))
        }
    }
}

/// Verifies a base64 `signature` over `message` with the public half `key`.
///
/// Malformed keys or signatures are `Err`; a well-formed signature that does
/// not match is `Ok` with `valid == false` and a diagnostic.
///
/// On the textbook path a signature value `s >= n` is rejected before
/// exponentiating, even when `s mod n` would verify. `sign` never produces
/// such values.
pub fn verify(
    message: &[u8],
    signature: &str,
    key: &str,
    algorithm: DigestAlgorithm,
) -> Result<Verification> {
    let key = decode(key)?;
    verify_digest(&algorithm.digest(message), signature, &key, algorithm)
}

/// Like `verify`, hashing `reader` in one streaming pass.
pub fn verify_reader<R: Read>(
    reader: R,
    signature: &str,
    key: &str,
    algorithm: DigestAlgorithm,
) -> Result<Verification> {
    let key = decode(key)?;
    let hashed = algorithm.digest_reader(reader)?;
    verify_digest(&hashed, signature, &key, algorithm)
}

pub fn verify_digest(
    hashed: &[u8],
    signature: &str,
    key: &Key,
    algorithm: DigestAlgorithm,
) -> Result<Verification> {
    match key {
        Key::Json(fields) => {
            let (e, n) = public_fields(fields)?;
            let s = from_base64(signature)?;
            debug!(%algorithm, bits = n.bits(), "verifying with textbook RSA");

            if s >= *n {
                return Ok(Verification::mismatch(
                    MismatchCause::SignatureOutOfRange,
                    "signature value is not below the modulus".to_string(),
                ));
            }

            // h' = s^e mod n
            let expected = BigUint::from_bytes_be(hashed) % n;
            let recovered = mod_pow(&s, e, n);

            if recovered == expected {
                Ok(Verification::valid())
            } else {
                Ok(digest_mismatch(algorithm, hashed))
            }
        }
        Key::Native(blob) => {
            let signature = decode_base64(signature)?;
            if signature.is_empty() {
                return Err(SignError::SignatureMalformed("empty value".into()));
            }

            match native::verify_digest(blob, algorithm, hashed, &signature)? {
                NativeCheck::Valid => Ok(Verification::valid()),
                NativeCheck::WrongLength { expected, actual } => Ok(Verification::mismatch(
                    MismatchCause::SignatureLength,
                    format!("signature value is {actual} bytes, the modulus is {expected}"),
                )),
                NativeCheck::Rejected => Ok(digest_mismatch(algorithm, hashed)),
            }
        }
    }
}

fn floor_check(value: &BigUint, name: &str) -> Result<()> {
    if *value < BigUint::from(3u32) {
        return Err(SignError::InvalidKey(format!("{name} must be at least 3")));
    }
    Ok(())
}

fn private_fields(fields: &KeyFields) -> Result<(&BigUint, &BigUint)> {
    if fields.half != KeyHalf::Private {
        return Err(SignError::MalformedKey(
            "signing needs the private half {d,n}".into(),
        ));
    }
    floor_check(&fields.n, "n")?;
    floor_check(&fields.exponent, "d")?;
    Ok((&fields.exponent, &fields.n))
}

fn public_fields(fields: &KeyFields) -> Result<(&BigUint, &BigUint)> {
    if fields.half != KeyHalf::Public {
        return Err(SignError::MalformedKey(
            "verification needs the public half {e,n}".into(),
        ));
    }
    floor_check(&fields.n, "n")?;
    floor_check(&fields.exponent, "e")?;
    Ok((&fields.exponent, &fields.n))
}
