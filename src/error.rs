//! Error types
//!
//! Malformed input (keys, signatures, parameters) is always reported through a
//! variant distinct from `VerificationFailed`, so a caller can never mistake a
//! broken key for a tampered document.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SignError>;

#[derive(Debug, Error)]
pub enum SignError {
    /// p/q out of range, e not coprime to φ(n), e·d ≢ 1 (mod φ(n)), ...
    #[error("invalid RSA parameters: {0}")]
    InvalidParameters(#[from] ParameterError),

    /// JSON present but missing fields, or neither JSON nor a decodable blob.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("public and private key moduli do not match")]
    ModulusMismatch,

    /// Key decoded fine but its numbers are below the usable floor.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("malformed signature: {0}")]
    SignatureMalformed(String),

    #[error("verification failed: {diagnostic}")]
    VerificationFailed { diagnostic: String },

    /// Failure inside the platform RSA implementation or a container signer.
    #[error("native RSA error: {0}")]
    Native(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The specific RSA invariant a parameter set violates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("p and q must both be at least 2")]
    PrimeTooSmall,

    #[error("{0} is not prime")]
    NotPrime(&'static str),

    #[error("p and q must be distinct")]
    IdenticalPrimes,

    #[error("p * q does not equal n")]
    ModulusNotProduct,

    #[error("p and q must be supplied together")]
    IncompletePrimes,

    #[error("n is required when p and q are not supplied")]
    MissingModulus,

    #[error("e must satisfy 1 < e < phi(n)")]
    ExponentOutOfRange,

    #[error("e is not coprime to phi(n)")]
    NotCoprime,

    #[error("e * d is not congruent to 1 mod phi(n)")]
    NotInverse,

    #[error("no public exponent coprime to phi(n) exists below phi(n)")]
    NoCoprimeExponent,

    #[error("each prime must be at least 3 bits long")]
    PrimeBitsTooSmall,

    #[error("the public exponent must be odd and at least 3")]
    InvalidPublicExponent,

    #[error("no prime pair with phi(n) coprime to the public exponent was found")]
    ExponentNeverCoprime,

    #[error("n, e and d must each be at least 3")]
    BelowFloor,

    #[error("trial encryption/decryption did not recover the sentinel value")]
    RoundTripFailed,

    #[error("{0} is not a valid decimal integer")]
    NotANumber(&'static str),
}

impl From<rsa::Error> for SignError {
    fn from(err: rsa::Error) -> Self {
        SignError::Native(err.to_string())
    }
}
