//! I/O operations
//!
//! Read/Write Keys
//! Read/Write Key Parameters
//! Read/Write Signature
//! Read/Write Export Bundles
//!
//! Blob-form keys and signatures are written with PEM-style armor; readers
//! accept armored or bare text.

use crate::bundle::KeyExport;
use crate::codec::{to_decimal, unarmor};
use crate::encoding::{EncodedKeyPair, KeyForm};
use crate::error::{Result, SignError};
use crate::keygen::{validate_or_build_key_decimal, KeyParameters};

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

pub const FILE_PUBKEY: &str = "public.key";
pub const FILE_PRIVKEY: &str = "private.key";
pub const FILE_PARAMS: &str = "parameters.json";
pub const SIGNATURE_EXTENSION: &str = "sig";

const LABEL_SIGNATURE: &str = "RSA SIGNATURE";
const LABEL_PUBKEY: &str = "PUBLIC KEY";
const LABEL_PRIVKEY: &str = "PRIVATE KEY";

/// Wraps base64 text in 64-column armor.
pub fn armor(label: &str, b64: &str) -> String {
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        b64.as_bytes()
            .chunks(64)
            .map(String::from_utf8_lossy)
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// Writes the pair to `dir`/{FILE_PUBKEY, FILE_PRIVKEY}
pub fn write_keypair(pair: &EncodedKeyPair, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;

    let (public, private) = match pair.form()? {
        KeyForm::Json => (
            format!("{}\n", pair.public_key),
            format!("{}\n", pair.private_key),
        ),
        KeyForm::Native => (
            armor(LABEL_PUBKEY, &unarmor(&pair.public_key)),
            armor(LABEL_PRIVKEY, &unarmor(&pair.private_key)),
        ),
    };

    fs::write(dir.join(FILE_PUBKEY), public)?;
    fs::write(dir.join(FILE_PRIVKEY), private)?;
    debug!(dir = %dir.display(), "wrote key pair");

    Ok(())
}

/// Reads the pair from `dir`/{FILE_PUBKEY, FILE_PRIVKEY}
pub fn read_keypair(dir: &Path) -> Result<EncodedKeyPair> {
    let public_key = fs::read_to_string(dir.join(FILE_PUBKEY))?;
    let private_key = fs::read_to_string(dir.join(FILE_PRIVKEY))?;

    Ok(EncodedKeyPair {
        public_key: public_key.trim().to_string(),
        private_key: private_key.trim().to_string(),
    })
}

/// Decimal quintuple as kept next to the key pair
#[derive(Debug, Serialize, Deserialize)]
struct StoredParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    q: Option<String>,
    e: String,
    d: String,
    n: String,
}

/// Writes `params` to `dir`/FILE_PARAMS, or removes a stale file when the
/// parameters of the new pair are unknown.
pub fn write_parameters(params: Option<&KeyParameters>, dir: &Path) -> Result<()> {
    let path = dir.join(FILE_PARAMS);
    let Some(params) = params else {
        return match fs::remove_file(&path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        };
    };

    let stored = StoredParameters {
        p: params.p.as_ref().map(to_decimal),
        q: params.q.as_ref().map(to_decimal),
        e: to_decimal(&params.e),
        d: to_decimal(&params.d),
        n: to_decimal(&params.n),
    };
    let text = serde_json::to_string_pretty(&stored)
        .map_err(|err| SignError::MalformedKey(format!("cannot serialize parameters: {err}")))?;
    fs::write(&path, text)?;
    debug!(path = %path.display(), "wrote key parameters");

    Ok(())
}

/// Reads and revalidates `dir`/FILE_PARAMS. `None` when the file is absent.
pub fn read_parameters(dir: &Path) -> Result<Option<KeyParameters>> {
    let text = match fs::read_to_string(dir.join(FILE_PARAMS)) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let stored: StoredParameters = serde_json::from_str(&text)
        .map_err(|err| SignError::MalformedKey(format!("invalid parameters file: {err}")))?;

    let params = validate_or_build_key_decimal(
        stored.p.as_deref(),
        stored.q.as_deref(),
        &stored.e,
        &stored.d,
        Some(&stored.n),
    )?;
    Ok(Some(params))
}

pub fn read_public_key(dir: &Path) -> Result<String> {
    Ok(fs::read_to_string(dir.join(FILE_PUBKEY))?.trim().to_string())
}

pub fn read_private_key(dir: &Path) -> Result<String> {
    Ok(fs::read_to_string(dir.join(FILE_PRIVKEY))?.trim().to_string())
}

/// Write a base64 signature to `path`
pub fn write_signature(signature: &str, path: &Path) -> Result<()> {
    fs::write(path, armor(LABEL_SIGNATURE, signature))?;
    Ok(())
}

/// Read a base64 signature from `path`
pub fn read_signature(path: &Path) -> Result<String> {
    Ok(unarmor(&fs::read_to_string(path)?))
}

/// `<document>.sig`
pub fn signature_path(document: &Path) -> std::path::PathBuf {
    let mut name = document.as_os_str().to_os_string();
    name.push(".");
    name.push(SIGNATURE_EXTENSION);
    name.into()
}

pub fn write_bundle(bundle: &KeyExport, path: &Path) -> Result<()> {
    fs::write(path, bundle.to_json()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::import_bundle;
    use crate::digest::DigestAlgorithm;
    use crate::sig::{sign_reader, verify_reader};
    use num_bigint::BigUint;
    use std::fs::File;

    const PUBLIC: &str = r#"{"e":"7","n":"143"}"#;
    const PRIVATE: &str = r#"{"d":"103","n":"143"}"#;

    #[test]
    fn test_armor() {
        let b64 = "A".repeat(130);
        let armored = armor("RSA SIGNATURE", &b64);
        let lines: Vec<&str> = armored.lines().collect();
        assert_eq!(lines[0], "-----BEGIN RSA SIGNATURE-----");
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines[3].len(), 2);
        assert_eq!(lines[4], "-----END RSA SIGNATURE-----");
        assert_eq!(unarmor(&armored), b64);
    }

    #[test]
    fn test_keypair_files() {
        let dir = tempfile::tempdir().unwrap();
        let pair = EncodedKeyPair {
            public_key: PUBLIC.into(),
            private_key: PRIVATE.into(),
        };
        write_keypair(&pair, dir.path()).unwrap();
        assert_eq!(read_keypair(dir.path()).unwrap(), pair);
        assert_eq!(read_public_key(dir.path()).unwrap(), PUBLIC);

        let native = crate::native::tests::test_pair();
        let native_dir = dir.path().join("native");
        write_keypair(native, &native_dir).unwrap();
        let read = read_keypair(&native_dir).unwrap();
        assert!(read.public_key.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(unarmor(&read.private_key), native.private_key);
        assert_eq!(read.form().unwrap(), KeyForm::Native);
    }

    #[test]
    fn test_sign_file() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("test.txt");
        fs::write(&document, b"test").unwrap();

        let signature = sign_reader(File::open(&document).unwrap(), PRIVATE, DigestAlgorithm::Sha256).unwrap();
        let sig_path = signature_path(&document);
        assert_eq!(sig_path, dir.path().join("test.txt.sig"));
        write_signature(&signature, &sig_path).unwrap();

        let read = read_signature(&sig_path).unwrap();
        assert_eq!(read, signature);
        let result = verify_reader(File::open(&document).unwrap(), &read, PUBLIC, DigestAlgorithm::Sha256).unwrap();
        assert!(result.valid);
    }

    #[test]
    fn test_parameters_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_parameters(dir.path()).unwrap(), None);

        let params = validate_or_build_key_decimal(Some("11"), Some("13"), "7", "103", None).unwrap();
        write_parameters(Some(&params), dir.path()).unwrap();
        assert_eq!(read_parameters(dir.path()).unwrap(), Some(params));

        write_parameters(None, dir.path()).unwrap();
        assert!(!dir.path().join(FILE_PARAMS).exists());
        write_parameters(None, dir.path()).unwrap();

        fs::write(dir.path().join(FILE_PARAMS), r#"{"p":"11","q":"13","e":"7","d":"101","n":"143"}"#).unwrap();
        assert!(matches!(
            read_parameters(dir.path()),
            Err(SignError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_keygen_export_import_keeps_primes() {
        let dir = tempfile::tempdir().unwrap();
        let params = validate_or_build_key_decimal(Some("11"), Some("13"), "7", "103", None).unwrap();
        write_keypair(&EncodedKeyPair::from_parameters(&params), dir.path()).unwrap();
        write_parameters(Some(&params), dir.path()).unwrap();

        let pair = read_keypair(dir.path()).unwrap();
        let stored = read_parameters(dir.path()).unwrap();
        let bundle = KeyExport::new("contracts", "detached", &pair, stored.as_ref());
        assert_eq!(bundle.p.as_deref(), Some("11"));
        assert_eq!(bundle.q.as_deref(), Some("13"));

        let path = dir.path().join("bundle.json");
        write_bundle(&bundle, &path).unwrap();
        let imported = import_bundle(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(imported.parameters, params);
        assert_eq!(imported.parameters.phi(), Some(BigUint::from(120u32)));
    }
}
