//! Raw RSA primitive
//!
//! Everything the engine does reduces to one operation: x^y mod n.
//!
//! Ciphering a value: c = m^e mod n
//! Deciphering a value: m = c^d mod n
//!
//! No padding is applied here. Values must already be reduced below `n`.

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Left-to-right square-and-multiply. Not constant time.
pub fn mod_pow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    if modulus.is_one() {
        return BigUint::zero();
    }

    let base = base % modulus;
    let mut result = BigUint::one();

    for i in (0..exponent.bits()).rev() {
        result = &result * &result % modulus;
        if exponent.bit(i) {
            result = &result * &base % modulus;
        }
    }

    result
}

/// value to ciphertext
/// c = m^e mod n
pub fn cipher(value: &BigUint, n: &BigUint, e: &BigUint) -> Result<BigUint, &'static str> {
    if value >= n {
        return Err("value must be < n");
    }

    Ok(mod_pow(value, e, n))
}

/// ciphertext to value
/// m = c^d mod n
pub fn decipher(ciphertext: &BigUint, n: &BigUint, d: &BigUint) -> Result<BigUint, &'static str> {
    if ciphertext >= n {
        return Err("ciphertext must be < n");
    }

    Ok(mod_pow(ciphertext, d, n))
}
