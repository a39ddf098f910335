// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};

/// A cryptographically secure random number generator which can be used as a
/// trait object.
///
/// Round handlers are stored behind `dyn` pointers, so they cannot be generic
/// over the generator type.
pub trait CryptoRngCore: RngCore + CryptoRng {}

impl<T: RngCore + CryptoRng + ?Sized> CryptoRngCore for T {}

/// Computes a^e (mod n)
#[cfg_attr(feature = "flame_it", flame("utils"))]
pub(crate) fn modpow(a: &BigUint, e: &BigUint, n: &BigUint) -> BigUint {
    a.modpow(e, n)
}

/// Computes a * b (mod n)
pub(crate) fn modmul(a: &BigUint, b: &BigUint, n: &BigUint) -> BigUint {
    (a * b) % n
}

/// Computes a - b (mod n), for any a, b.
pub(crate) fn modsub(a: &BigUint, b: &BigUint, n: &BigUint) -> BigUint {
    ((a % n) + n - (b % n)) % n
}

/// Computes a^{-1} (mod p) for a prime p, via Fermat's little theorem.
///
/// The caller guarantees that `a` is non-zero modulo `p`.
pub(crate) fn modinv_prime(a: &BigUint, p: &BigUint) -> BigUint {
    let exponent = p - BigUint::from(2u32);
    a.modpow(&exponent, p)
}

/// Multiplies all the values together (mod n)
pub(crate) fn modprod<'a>(values: impl IntoIterator<Item = &'a BigUint>, n: &BigUint) -> BigUint {
    values
        .into_iter()
        .fold(BigUint::one(), |acc, value| modmul(&acc, value, n))
}

/// Generate a random BigUint in the range 0..n
pub(crate) fn random_below<R: RngCore + CryptoRng + ?Sized>(rng: &mut R, n: &BigUint) -> BigUint {
    rng.gen_biguint_below(n)
}

/// Generate a random BigUint in the range 1..n (non-zero)
pub(crate) fn random_nonzero_below<R: RngCore + CryptoRng + ?Sized>(
    rng: &mut R,
    n: &BigUint,
) -> BigUint {
    loop {
        let bn = rng.gen_biguint_below(n);
        if !bn.is_zero() {
            return bn;
        }
    }
}
