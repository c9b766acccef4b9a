//! Textbook RSA document signing
//!
//! digest -> integer -> (h mod n)^d mod n -> base64
//!
//! Keys are stored either as JSON `{e,n}` / `{d,n}` pairs, signed with the
//! textbook scheme in `sig`, or as standard-encoded blobs, signed with
//! PKCS#1 v1.5 in `native`. The two are not interchangeable.
//!
//! The textbook scheme has no padding and is not safe for real use. It exists
//! to stay compatible with signatures already produced by it.

pub mod bundle;
pub mod cipher;
pub mod codec;
pub mod container;
pub mod digest;
pub mod encoding;
pub mod error;
pub mod io;
pub mod keygen;
pub mod native;
pub mod sig;
pub mod tamper;

pub use bundle::{import_bundle, ImportedKey, KeyExport};
pub use container::{sign_embedded, verify_embedded, ContainerSigner};
pub use digest::{DigestAlgorithm, DigestSelection};
pub use encoding::{decode, encode, encode_native, EncodedKeyPair, Key, KeyFields, KeyForm, KeyHalf};
pub use error::{ParameterError, Result, SignError};
pub use keygen::{
    derive_ed, derive_ed_decimal, generate_keypair, validate_by_trial_round_trip,
    validate_or_build_key, validate_or_build_key_decimal, validate_quintuple, KeyGenConfig,
    KeyParameters,
};
pub use native::generate_native;
pub use sig::{sign, sign_reader, verify, verify_reader, MismatchCause, Verification};
pub use tamper::{classify, classify_diagnostic, TamperKind};
