//! Digest selection
//!
//! Maps an algorithm name to a hash function. Names are matched
//! case-insensitively; unknown or missing names fall back to SHA-256, and the
//! fallback is reported in the `DigestSelection` so the caller can log it.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::str::FromStr;

const READ_BUFFER: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

/// The outcome of resolving a possibly missing or unknown algorithm name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSelection {
    pub algorithm: DigestAlgorithm,
    /// the name that could not be resolved, if the default was substituted
    pub unrecognized: Option<String>,
}

impl DigestSelection {
    pub fn fell_back(&self) -> bool {
        self.unrecognized.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown digest algorithm: {0}")]
pub struct UnknownDigest(pub String);

impl FromStr for DigestAlgorithm {
    type Err = UnknownDigest;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_uppercase().as_str() {
            "MD5" => Ok(DigestAlgorithm::Md5),
            "SHA1" => Ok(DigestAlgorithm::Sha1),
            "SHA256" => Ok(DigestAlgorithm::Sha256),
            "SHA512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(UnknownDigest(name.to_string())),
        }
    }
}

impl Display for DigestAlgorithm {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl DigestAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA1",
            DigestAlgorithm::Sha256 => "SHA256",
            DigestAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Output length in bytes
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 16,
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// Resolves `name`, degrading to SHA-256 when it is absent or unknown.
    pub fn select(name: Option<&str>) -> DigestSelection {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => DigestSelection {
                algorithm: DigestAlgorithm::default(),
                unrecognized: None,
            },
            Some(name) => match name.parse() {
                Ok(algorithm) => DigestSelection {
                    algorithm,
                    unrecognized: None,
                },
                Err(UnknownDigest(name)) => DigestSelection {
                    algorithm: DigestAlgorithm::default(),
                    unrecognized: Some(name),
                },
            },
        }
    }

    pub fn digest(&self, bytes: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Md5 => Md5::digest(bytes).to_vec(),
            DigestAlgorithm::Sha1 => Sha1::digest(bytes).to_vec(),
            DigestAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }

    /// Hashes everything `reader` yields in a single buffered pass.
    pub fn digest_reader<R: Read>(&self, reader: R) -> std::io::Result<Vec<u8>> {
        match self {
            DigestAlgorithm::Md5 => hash_reader::<Md5, R>(reader),
            DigestAlgorithm::Sha1 => hash_reader::<Sha1, R>(reader),
            DigestAlgorithm::Sha256 => hash_reader::<Sha256, R>(reader),
            DigestAlgorithm::Sha512 => hash_reader::<Sha512, R>(reader),
        }
    }
}

fn hash_reader<D: Digest, R: Read>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut hasher = D::new();
    let mut buffer = [0u8; READ_BUFFER];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_hex;

    #[test]
    fn test_known_digests() {
        let input = b"abc";
        assert_eq!(
            to_hex(&DigestAlgorithm::Md5.digest(input)),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            to_hex(&DigestAlgorithm::Sha1.digest(input)),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            to_hex(&DigestAlgorithm::Sha256.digest(input)),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        for algorithm in [
            DigestAlgorithm::Md5,
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha512,
        ] {
            assert_eq!(algorithm.digest(input).len(), algorithm.output_len());
        }
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let data: Vec<u8> = (0..3 * READ_BUFFER + 17).map(|i| (i % 251) as u8).collect();
        for algorithm in [DigestAlgorithm::Md5, DigestAlgorithm::Sha512] {
            let streamed = algorithm.digest_reader(&data[..]).unwrap();
            assert_eq!(streamed, algorithm.digest(&data));
        }
    }

    #[test]
    fn test_names() {
        assert_eq!("sha512".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Sha512));
        assert_eq!(" Md5 ".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Md5));
        assert_eq!(
            "SHA3".parse::<DigestAlgorithm>(),
            Err(UnknownDigest("SHA3".into()))
        );
        assert_eq!(DigestAlgorithm::Sha1.to_string(), "SHA1");
    }

    #[test]
    fn test_select_falls_back() {
        let selection = DigestAlgorithm::select(None);
        assert_eq!(selection.algorithm, DigestAlgorithm::Sha256);
        assert!(!selection.fell_back());

        let selection = DigestAlgorithm::select(Some("sha1"));
        assert_eq!(selection.algorithm, DigestAlgorithm::Sha1);
        assert!(!selection.fell_back());

        let selection = DigestAlgorithm::select(Some("whirlpool"));
        assert_eq!(selection.algorithm, DigestAlgorithm::Sha256);
        assert_eq!(selection.unrecognized.as_deref(), Some("whirlpool"));
    }
}
