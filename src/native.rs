//! Standard RSA path
//!
//! Keys in the blob form are handed to the `rsa` crate and signed with
//! PKCS#1 v1.5 over the selected digest. Signatures from this path and from
//! the textbook path are not interchangeable, even for the same numbers.
//!
//! Native key objects only live for the duration of one call and are dropped
//! (and zeroized by the `rsa` crate) on every exit path.

use crate::digest::DigestAlgorithm;
use crate::encoding::{EncodedKeyPair, NativeBlob};
use crate::error::{Result, SignError};
use crate::keygen::KeyParameters;

use md5::Md5;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use tracing::debug;

fn scheme(algorithm: DigestAlgorithm) -> Pkcs1v15Sign {
    match algorithm {
        DigestAlgorithm::Md5 => Pkcs1v15Sign::new::<Md5>(),
        DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

pub(crate) fn to_native_uint(value: &num_bigint::BigUint) -> rsa::BigUint {
    rsa::BigUint::from_bytes_be(&value.to_bytes_be())
}

pub(crate) fn from_native_uint(value: &rsa::BigUint) -> num_bigint::BigUint {
    num_bigint::BigUint::from_bytes_be(&value.to_bytes_be())
}

/// PKCS#8 first, then PKCS#1
pub fn private_key(blob: &NativeBlob) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_der(blob.as_bytes())
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(blob.as_bytes()))
        .map_err(|_| SignError::MalformedKey("key blob is not an RSA private key".into()))
}

/// SPKI first, then PKCS#1
pub fn public_key(blob: &NativeBlob) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_der(blob.as_bytes())
        .or_else(|_| RsaPublicKey::from_pkcs1_der(blob.as_bytes()))
        .map_err(|_| SignError::MalformedKey("key blob is not an RSA public key".into()))
}

pub fn public_modulus(blob: &NativeBlob) -> Result<num_bigint::BigUint> {
    Ok(from_native_uint(public_key(blob)?.n()))
}

pub fn private_modulus(blob: &NativeBlob) -> Result<num_bigint::BigUint> {
    Ok(from_native_uint(private_key(blob)?.n()))
}

/// Signs an already computed digest.
pub fn sign_digest(blob: &NativeBlob, algorithm: DigestAlgorithm, hashed: &[u8]) -> Result<Vec<u8>> {
    let key = private_key(blob)?;
    debug!(bits = key.n().bits(), %algorithm, "signing with PKCS#1 v1.5");
    Ok(key.sign(scheme(algorithm), hashed)?)
}

/// Outcome of a PKCS#1 v1.5 check over an already computed digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCheck {
    Valid,
    /// the signature does not even have the modulus length
    WrongLength { expected: usize, actual: usize },
    Rejected,
}

pub fn verify_digest(
    blob: &NativeBlob,
    algorithm: DigestAlgorithm,
    hashed: &[u8],
    signature: &[u8],
) -> Result<NativeCheck> {
    let key = public_key(blob)?;
    let expected = key.size();
    if signature.len() != expected {
        return Ok(NativeCheck::WrongLength {
            expected,
            actual: signature.len(),
        });
    }

    match key.verify(scheme(algorithm), hashed, signature) {
        Ok(()) => Ok(NativeCheck::Valid),
        Err(_) => Ok(NativeCheck::Rejected),
    }
}

/// Builds a native private key from a parameter set. Without the primes the
/// `rsa` crate recovers them from `(n, e, d)`.
pub fn private_key_from_parameters(params: &KeyParameters) -> Result<RsaPrivateKey> {
    let primes = match (&params.p, &params.q) {
        (Some(p), Some(q)) => vec![to_native_uint(p), to_native_uint(q)],
        _ => Vec::new(),
    };

    Ok(RsaPrivateKey::from_components(
        to_native_uint(&params.n),
        to_native_uint(&params.e),
        to_native_uint(&params.d),
        primes,
    )?)
}

/// (SPKI DER, PKCS#8 DER)
pub fn encode_der(params: &KeyParameters) -> Result<(Vec<u8>, Vec<u8>)> {
    let key = private_key_from_parameters(params)?;
    der_pair(&key)
}

fn der_pair(key: &RsaPrivateKey) -> Result<(Vec<u8>, Vec<u8>)> {
    let public = key
        .to_public_key()
        .to_public_key_der()
        .map_err(|err| SignError::Native(err.to_string()))?;
    let private = key
        .to_pkcs8_der()
        .map_err(|err| SignError::Native(err.to_string()))?;

    Ok((public.as_bytes().to_vec(), private.as_bytes().to_vec()))
}

/// Generates a standard key pair of `bits` bits.
pub fn generate_native(bits: usize) -> Result<EncodedKeyPair> {
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, bits)?;
    let (public, private) = der_pair(&key)?;

    Ok(EncodedKeyPair {
        public_key: crate::codec::encode_base64(&public),
        private_key: crate::codec::encode_base64(&private),
    })
}

/// Extracts the quintuple of a native private key.
pub fn parameters_of(blob: &NativeBlob) -> Result<KeyParameters> {
    use rsa::traits::PrivateKeyParts;

    let key = private_key(blob)?;
    let primes = key.primes();
    let (p, q) = match primes {
        [p, q] => (Some(from_native_uint(p)), Some(from_native_uint(q))),
        _ => (None, None),
    };

    Ok(KeyParameters {
        p,
        q,
        e: from_native_uint(key.e()),
        d: from_native_uint(key.d()),
        n: from_native_uint(key.n()),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::decode_base64;
    use crate::encoding::{decode, Key};
    use std::sync::OnceLock;

    /// One 1024-bit key shared by the native tests.
    pub(crate) fn test_pair() -> &'static EncodedKeyPair {
        static PAIR: OnceLock<EncodedKeyPair> = OnceLock::new();
        PAIR.get_or_init(|| generate_native(1024).unwrap())
    }

    fn blobs(pair: &EncodedKeyPair) -> (NativeBlob, NativeBlob) {
        match (decode(&pair.public_key).unwrap(), decode(&pair.private_key).unwrap()) {
            (Key::Native(public), Key::Native(private)) => (public, private),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_sign_verify_digest() {
        let (public, private) = blobs(test_pair());
        let hashed = DigestAlgorithm::Sha256.digest(b"native");

        let signature = sign_digest(&private, DigestAlgorithm::Sha256, &hashed).unwrap();
        assert_eq!(signature.len(), 128);
        assert_eq!(
            verify_digest(&public, DigestAlgorithm::Sha256, &hashed, &signature).unwrap(),
            NativeCheck::Valid
        );

        let other = DigestAlgorithm::Sha256.digest(b"natives");
        assert_eq!(
            verify_digest(&public, DigestAlgorithm::Sha256, &other, &signature).unwrap(),
            NativeCheck::Rejected
        );
        assert_eq!(
            verify_digest(&public, DigestAlgorithm::Sha256, &hashed, &signature[1..]).unwrap(),
            NativeCheck::WrongLength {
                expected: 128,
                actual: 127
            }
        );
    }

    #[test]
    fn test_parameters_round_trip() {
        let (public, private) = blobs(test_pair());
        let params = parameters_of(&private).unwrap();
        assert_eq!(public_modulus(&public).unwrap(), params.n);

        let (public_der, _) = encode_der(&params).unwrap();
        assert_eq!(public_der, decode_base64(&test_pair().public_key).unwrap());
    }

    #[test]
    fn test_wrong_half() {
        let (public, private) = blobs(test_pair());
        assert!(matches!(private_key(&public), Err(SignError::MalformedKey(_))));
        assert!(matches!(public_key(&private), Err(SignError::MalformedKey(_))));
    }
}
