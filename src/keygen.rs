//! RSA key algebra
//!
//! Choose two integers, `p` and `q`, such that they are prime and `p` != `q`.
//!
//! Derive `n`, the modulus, such that `n` = `p` * `q`.
//!
//! Calculate Euler's totient of `n`, φ(n) = `(p-1)` × `(q-1)`.
//!
//! Choose a public exponent `e` coprime to φ(n) with 1 < `e` < φ(n). 65537 is
//! tried first; small moduli fall back to 3, then to the odd integers from 5.
//!
//! Calculate the private exponent `d` such that (`d` * `e`) mod φ(n) = 1, by
//! the extended Euclidean algorithm.
//!
//! When only `(n, e, d)` are known, φ(n) is unavailable. The parameters are then
//! checked by encrypting and decrypting a sentinel value. That check is
//! necessary but not sufficient: it catches grossly wrong triples only.

use crate::cipher::{cipher, decipher};
use crate::codec::parse_decimal;
use crate::error::{ParameterError, Result};

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::identities::{One, Zero};
use rand::thread_rng;
use std::fmt::{Display, Formatter};
use tracing::debug;

pub const DEFAULT_PUBLIC_EXPONENT: u32 = 65537;
const SENTINEL: u32 = 42;
const MIN_PRIME_BITS: u64 = 3;
/// prime pairs drawn before giving up on the configured exponent
const MAX_PRIME_DRAWS: u32 = 1000;
const SMALL_PRIMES: [u32; 25] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Parameters for `generate_keypair`.
#[derive(Debug, Clone)]
pub struct KeyGenConfig {
    /// bit length of each prime, the modulus is twice as long
    pub prime_bits: u64,
    /// Miller-Rabin rounds, P(Err) <= 4^-rounds
    pub rounds: u32,
    pub public_exponent: u32,
}

impl Default for KeyGenConfig {
    fn default() -> Self {
        KeyGenConfig {
            prime_bits: 512,
            rounds: 64,
            public_exponent: DEFAULT_PUBLIC_EXPONENT,
        }
    }
}

/// The RSA quintuple. `p` and `q` are absent when a key was imported from
/// `(n, e, d)` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParameters {
    pub p: Option<BigUint>,
    pub q: Option<BigUint>,
    pub e: BigUint,
    pub d: BigUint,
    pub n: BigUint,
}

impl KeyParameters {
    /// φ(n), only available when the primes are known
    pub fn phi(&self) -> Option<BigUint> {
        match (&self.p, &self.q) {
            (Some(p), Some(q)) => Some(totient(p, q)),
            _ => None,
        }
    }
}

impl Display for KeyParameters {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        writeln!(f, "KeyParameters {{")?;
        if let (Some(p), Some(q)) = (&self.p, &self.q) {
            writeln!(f, "\tp: {},", p)?;
            writeln!(f, "\tq: {},", q)?;
        }
        writeln!(f, "\tn: {},", self.n)?;
        writeln!(f, "\te: {},", self.e)?;
        writeln!(f, "\td: {},", self.d)?;
        write!(f, "}}")
    }
}

fn totient(p: &BigUint, q: &BigUint) -> BigUint {
    (p - BigUint::one()) * (q - BigUint::one())
}

/// Generate `KeyParameters` with a modulus of 2 * `prime_bits`
pub fn generate_keypair(config: &KeyGenConfig) -> Result<KeyParameters> {
    if config.prime_bits < MIN_PRIME_BITS {
        return Err(ParameterError::PrimeBitsTooSmall.into());
    }
    if config.public_exponent < 3 || config.public_exponent % 2 == 0 {
        return Err(ParameterError::InvalidPublicExponent.into());
    }
    let preferred = BigUint::from(config.public_exponent);

    for _ in 0..MAX_PRIME_DRAWS {
        let p = generate_prime(config.prime_bits, config.rounds);
        let q = generate_prime(config.prime_bits, config.rounds);
        if p == q {
            continue;
        }

        let phi = totient(&p, &q);
        let e = if preferred < phi {
            if !preferred.gcd(&phi).is_one() {
                continue;
            }
            preferred.clone()
        } else {
            match choose_exponent(&phi) {
                Some(e) => e,
                None => continue,
            }
        };

        // `d` is the modular inverse of `e` mod `phi`
        let d = mod_inverse(&e, &phi).ok_or(ParameterError::NotInverse)?;
        let n = &p * &q;
        debug!(bits = n.bits(), "generated key parameters");

        return Ok(KeyParameters {
            p: Some(p),
            q: Some(q),
            e,
            d,
            n,
        });
    }

    Err(ParameterError::ExponentNeverCoprime.into())
}

/// Generates a probable prime of `bits` bits, `bits` >= 2
fn generate_prime(bits: u64, rounds: u32) -> BigUint {
    let mut rng = thread_rng();

    loop {
        let mut n = rng.gen_biguint(bits);
        n |= BigUint::one();
        n |= BigUint::one() << (bits - 1);

        if is_probable_prime(&n, rounds) {
            return n;
        }
    }
}

/// Trial division by the small primes, then Miller-Rabin
pub fn is_probable_prime(n: &BigUint, rounds: u32) -> bool {
    if n < &BigUint::from(2u32) {
        return false;
    }

    for small in SMALL_PRIMES {
        let small = BigUint::from(small);
        if *n == small {
            return true;
        }
        if (n % &small).is_zero() {
            return false;
        }
    }

    // every composite below 101^2 has a factor in SMALL_PRIMES
    if n < &BigUint::from(101u32 * 101) {
        return true;
    }

    miller_rabin(n, rounds)
}

/// Determines P(prime) via the Miller-Rabin test
/// The probability of error `P(Err)` is 4^-k, where `k` is the number of rounds
fn miller_rabin(n: &BigUint, rounds: u32) -> bool {
    let one = BigUint::one();
    let two = BigUint::from(2u32);

    if n <= &one {
        return false;
    }
    if n <= &BigUint::from(3u32) {
        return true;
    }
    if n.is_even() {
        return false;
    }

    let n_minus_one = n - &one;
    let mut r = 0u32;
    let mut d = n_minus_one.clone();
    while d.is_even() {
        r += 1;
        d >>= 1;
    }

    let mut rng = thread_rng();
    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);

        if x == one || x == n_minus_one {
            continue 'witness;
        }

        for _ in 0..r - 1 {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
            if x == one {
                return false;
            }
        }
        return false;
    }
    true
}

/// Modular inverse (a * a^-1 (mod m) = 1)
/// Returns an Option<T> because not all numbers have an inverse
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    if m.is_zero() {
        return None;
    }

    let (mut t, mut newt) = (BigInt::zero(), BigInt::one());
    let (mut r, mut newr) = (BigInt::from(m.clone()), BigInt::from(a % m));

    while !newr.is_zero() {
        let quotient = &r / &newr;
        let tmp_t = t.clone();
        t = newt.clone();
        newt = tmp_t - &quotient * newt;

        let tmp_r = r.clone();
        r = newr.clone();
        newr = tmp_r - quotient * newr;
    }

    if r > BigInt::one() {
        return None;
    }

    let m = BigInt::from(m.clone());
    t.mod_floor(&m).to_biguint()
}

/// Smallest conventional exponent for φ: 65537, then 3, then odd integers from 5
fn choose_exponent(phi: &BigUint) -> Option<BigUint> {
    let preferred = BigUint::from(DEFAULT_PUBLIC_EXPONENT);
    if preferred < *phi && preferred.gcd(phi).is_one() {
        return Some(preferred);
    }

    let mut e = BigUint::from(3u32);
    while e < *phi {
        if e.gcd(phi).is_one() {
            return Some(e);
        }
        e += 2u32;
    }
    None
}

/// Derives `(e, d)` from two primes.
pub fn derive_ed(p: &BigUint, q: &BigUint) -> Result<(BigUint, BigUint)> {
    let two = BigUint::from(2u32);
    if p < &two || q < &two {
        return Err(ParameterError::PrimeTooSmall.into());
    }

    let phi = totient(p, q);
    let e = choose_exponent(&phi).ok_or(ParameterError::NoCoprimeExponent)?;
    let d = mod_inverse(&e, &phi).ok_or(ParameterError::NotInverse)?;

    debug!(%e, "derived exponents from p, q");
    Ok((e, d))
}

/// `derive_ed` over decimal strings
pub fn derive_ed_decimal(p: &str, q: &str) -> Result<(BigUint, BigUint)> {
    let p = parse_decimal(p).ok_or(ParameterError::NotANumber("p"))?;
    let q = parse_decimal(q).ok_or(ParameterError::NotANumber("q"))?;
    derive_ed(&p, &q)
}

/// Checks every invariant of the quintuple and reports the first that fails.
pub fn validate_quintuple(
    p: &BigUint,
    q: &BigUint,
    e: &BigUint,
    d: &BigUint,
) -> std::result::Result<(), ParameterError> {
    let two = BigUint::from(2u32);
    if p < &two || q < &two {
        return Err(ParameterError::PrimeTooSmall);
    }
    if p == q {
        return Err(ParameterError::IdenticalPrimes);
    }

    let rounds = KeyGenConfig::default().rounds;
    if !is_probable_prime(p, rounds) {
        return Err(ParameterError::NotPrime("p"));
    }
    if !is_probable_prime(q, rounds) {
        return Err(ParameterError::NotPrime("q"));
    }

    let phi = totient(p, q);
    if e <= &BigUint::one() || e >= &phi {
        return Err(ParameterError::ExponentOutOfRange);
    }
    if !e.gcd(&phi).is_one() {
        return Err(ParameterError::NotCoprime);
    }
    if !((e * d) % &phi).is_one() {
        return Err(ParameterError::NotInverse);
    }

    Ok(())
}

/// Weak self-consistency check for `(n, e, d)` without the primes.
///
/// Encrypts a sentinel with `e`, decrypts with `d`, and requires the sentinel
/// back. Passing does not prove the triple is a valid RSA key.
///
/// `n`, `e` and `d` below 3 are rejected first: `e = d = 1` round-trips any
/// value.
pub fn validate_by_trial_round_trip(
    n: &BigUint,
    e: &BigUint,
    d: &BigUint,
) -> std::result::Result<(), ParameterError> {
    let floor = BigUint::from(3u32);
    if n < &floor || e < &floor || d < &floor {
        return Err(ParameterError::BelowFloor);
    }

    let sentinel = BigUint::from(SENTINEL);
    let sentinel = if sentinel < *n {
        sentinel
    } else {
        BigUint::from(2u32)
    };

    let ciphertext = cipher(&sentinel, n, e).map_err(|_| ParameterError::RoundTripFailed)?;
    let recovered = decipher(&ciphertext, n, d).map_err(|_| ParameterError::RoundTripFailed)?;

    if recovered != sentinel {
        return Err(ParameterError::RoundTripFailed);
    }
    Ok(())
}

/// Builds a validated `KeyParameters` from whatever subset of the quintuple
/// the caller has. With both primes, `n` is computed (and must agree with a
/// supplied `n`) and the full invariants are checked. Without them, `n` is
/// required and only the trial round trip is possible.
pub fn validate_or_build_key(
    p: Option<&BigUint>,
    q: Option<&BigUint>,
    e: &BigUint,
    d: &BigUint,
    n: Option<&BigUint>,
) -> Result<KeyParameters> {
    match (p, q) {
        (Some(p), Some(q)) => {
            let product = p * q;
            if let Some(n) = n {
                if *n != product {
                    return Err(ParameterError::ModulusNotProduct.into());
                }
            }
            validate_quintuple(p, q, e, d)?;

            Ok(KeyParameters {
                p: Some(p.clone()),
                q: Some(q.clone()),
                e: e.clone(),
                d: d.clone(),
                n: product,
            })
        }
        (None, None) => {
            let n = n.ok_or(ParameterError::MissingModulus)?;
            validate_by_trial_round_trip(n, e, d)?;

            Ok(KeyParameters {
                p: None,
                q: None,
                e: e.clone(),
                d: d.clone(),
                n: n.clone(),
            })
        }
        _ => Err(ParameterError::IncompletePrimes.into()),
    }
}

/// `validate_or_build_key` over decimal strings; empty optional fields count
/// as absent.
pub fn validate_or_build_key_decimal(
    p: Option<&str>,
    q: Option<&str>,
    e: &str,
    d: &str,
    n: Option<&str>,
) -> Result<KeyParameters> {
    fn optional(value: Option<&str>, name: &'static str) -> Result<Option<BigUint>> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Ok(Some(parse_decimal(v).ok_or(ParameterError::NotANumber(name))?)),
            None => Ok(None),
        }
    }

    let p = optional(p, "p")?;
    let q = optional(q, "q")?;
    let n = optional(n, "n")?;
    let e = parse_decimal(e).ok_or(ParameterError::NotANumber("e"))?;
    let d = parse_decimal(d).ok_or(ParameterError::NotANumber("d"))?;

    validate_or_build_key(p.as_ref(), q.as_ref(), &e, &d, n.as_ref())
}
