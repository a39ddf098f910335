// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The prime-order group that every ciphertext and proof lives in.
//!
//! A [`GroupParameters`] fixes a prime modulus `p`, a prime `q` dividing
//! `p - 1`, a generator `g` of the order-`q` subgroup of `Z_p^*`, and a
//! public marker element `Y` of the same subgroup which encodes "bid here" in
//! encrypted bid vectors.
//!
//! Group elements are always reduced modulo `p`, exponents modulo `q`. The
//! helpers in this module name which of the two moduli they use so that
//! callers never need to pick one by hand.

use crate::{
    errors::{InternalError, Result},
    parameters::INDEX_BYTES,
    serialization::i2osp,
    utils::{self, modinv_prime, modmul, modpow, modsub},
};
use lazy_static::lazy_static;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use tracing::error;

const MODP_1024_HEX: &str = "ffffffffffffffffc90fdaa22168c234c4c6628b80dc1cd129024e088a67cc74\
    020bbea63b139b22514a08798e3404ddef9519b3cd3a431b302b0a6df25f1437\
    4fe1356d6d51c245e485b576625e7ec6f44c42e9a637ed6b0bff5cb6f406b7ed\
    ee386bfb5a899fa5ae9f24117c4b1fe649286651ece65381ffffffffffffffff";

const MODP_2048_HEX: &str = "ffffffffffffffffc90fdaa22168c234c4c6628b80dc1cd129024e088a67cc74\
    020bbea63b139b22514a08798e3404ddef9519b3cd3a431b302b0a6df25f1437\
    4fe1356d6d51c245e485b576625e7ec6f44c42e9a637ed6b0bff5cb6f406b7ed\
    ee386bfb5a899fa5ae9f24117c4b1fe649286651ece45b3dc2007cb8a163bf05\
    98da48361c55d39a69163fa8fd24cf5f83655d23dca3ad961c62f356208552bb\
    9ed529077096966d670c354e4abc9804f1746c08ca18217c32905e462e36ce3b\
    e39e772c180e86039b2783a2ec07a28fb5c55df06f4c52c9de2bcbf695581718\
    3995497cea956ae515d2261898fa051015728e5a8aacaa68ffffffffffffffff";

lazy_static! {
    static ref TOY: GroupParameters = GroupParameters {
        p: BigUint::from(34_531_109u64),
        q: BigUint::from(8_632_777u64),
        g: BigUint::from(19_044_154u64),
        marker: BigUint::from(16u64),
    };
    static ref MODP_1024: GroupParameters = GroupParameters::safe_prime(MODP_1024_HEX);
    static ref MODP_2048: GroupParameters = GroupParameters::safe_prime(MODP_2048_HEX);
}

/// The built-in parameter sets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NamedGroup {
    /// A 25-bit group. Fast, and only suitable for tests and demos.
    Toy,
    /// The 1024-bit MODP group of RFC 2409 (Oakley group 2).
    Modp1024,
    /// The 2048-bit MODP group of RFC 3526 (group 14).
    Modp2048,
}

impl NamedGroup {
    /// The parameters for this group.
    pub fn parameters(self) -> GroupParameters {
        match self {
            NamedGroup::Toy => TOY.clone(),
            NamedGroup::Modp1024 => MODP_1024.clone(),
            NamedGroup::Modp2048 => MODP_2048.clone(),
        }
    }
}

/// Public parameters of the order-`q` subgroup of `Z_p^*`.
#[derive(Clone, PartialEq, Eq)]
pub struct GroupParameters {
    p: BigUint,
    q: BigUint,
    g: BigUint,
    marker: BigUint,
}

impl Debug for GroupParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupParameters")
            .field("p_bits", &self.p.bits())
            .field("q_bits", &self.q.bits())
            .finish()
    }
}

impl Default for GroupParameters {
    fn default() -> Self {
        NamedGroup::Modp1024.parameters()
    }
}

impl GroupParameters {
    /// Build a parameter set, checking the subgroup structure.
    ///
    /// Primality of `p` and `q` is the caller's responsibility; this checks
    /// that `q` divides `p - 1` and that `g` and `marker` are non-trivial
    /// elements of the order-`q` subgroup.
    pub fn new(p: BigUint, q: BigUint, g: BigUint, marker: BigUint) -> Result<Self> {
        if q.is_zero() || p <= BigUint::one() {
            return arg_err!("group modulus and order must be non-trivial");
        }
        if !((&p - 1u32) % &q).is_zero() {
            error!("Group order does not divide p - 1");
            return arg_err!("q must divide p - 1");
        }
        let group = Self { p, q, g, marker };
        if group.g.is_one() || group.check_element(&group.g).is_err() {
            return arg_err!("g must generate the order-q subgroup");
        }
        if group.marker.is_one() || group.check_element(&group.marker).is_err() {
            return arg_err!("the marker must be a non-identity subgroup element");
        }
        Ok(group)
    }

    /// Parameters for a safe prime `p = 2q + 1` given in hex, using `g = 4`
    /// and marker `Y = 9` (both quadratic residues).
    fn safe_prime(hex_modulus: &str) -> Self {
        let p = BigUint::parse_bytes(hex_modulus.as_bytes(), 16)
            .expect("built-in group moduli are valid hex. qed.");
        let q = (&p - 1u32) >> 1;
        Self {
            p,
            q,
            g: BigUint::from(4u32),
            marker: BigUint::from(9u32),
        }
    }

    /// The prime modulus `p`.
    pub fn modulus(&self) -> &BigUint {
        &self.p
    }

    /// The prime subgroup order `q`.
    pub fn order(&self) -> &BigUint {
        &self.q
    }

    /// The subgroup generator `g`.
    pub fn generator(&self) -> &BigUint {
        &self.g
    }

    /// The public marker element `Y`.
    pub fn marker(&self) -> &BigUint {
        &self.marker
    }

    /// Check that `a` is an element of the order-`q` subgroup.
    pub fn check_element(&self, a: &BigUint) -> Result<()> {
        if a.is_zero() || a >= &self.p || !modpow(a, &self.q, &self.p).is_one() {
            return Err(InternalError::NotInGroup);
        }
        Ok(())
    }

    /// Check every element of `values`.
    pub(crate) fn check_elements<'a>(
        &self,
        values: impl IntoIterator<Item = &'a BigUint>,
    ) -> Result<()> {
        values.into_iter().try_for_each(|a| self.check_element(a))
    }

    /// `base^exponent mod p`
    pub(crate) fn pow(&self, base: &BigUint, exponent: &BigUint) -> BigUint {
        modpow(base, exponent, &self.p)
    }

    /// `g^exponent mod p`
    pub(crate) fn pow_g(&self, exponent: &BigUint) -> BigUint {
        modpow(&self.g, exponent, &self.p)
    }

    /// `a * b mod p`
    pub(crate) fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        modmul(a, b, &self.p)
    }

    /// `a / b mod p`
    pub(crate) fn div(&self, a: &BigUint, b: &BigUint) -> BigUint {
        modmul(a, &self.inv(b), &self.p)
    }

    /// `a^{-1} mod p`
    pub(crate) fn inv(&self, a: &BigUint) -> BigUint {
        modinv_prime(a, &self.p)
    }

    /// Product of all `values` mod p.
    pub(crate) fn product<'a>(&self, values: impl IntoIterator<Item = &'a BigUint>) -> BigUint {
        utils::modprod(values, &self.p)
    }

    /// `a + b mod q`
    pub(crate) fn scalar_add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.q
    }

    /// `a - b mod q`
    pub(crate) fn scalar_sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        modsub(a, b, &self.q)
    }

    /// `a * b mod q`
    pub(crate) fn scalar_mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        modmul(a, b, &self.q)
    }

    /// `-a mod q`
    pub(crate) fn scalar_neg(&self, a: &BigUint) -> BigUint {
        modsub(&BigUint::zero(), a, &self.q)
    }

    /// Reduce an arbitrary integer into the exponent range.
    pub(crate) fn scalar(&self, a: &BigUint) -> BigUint {
        a % &self.q
    }

    /// Sample a uniform exponent in `[0, q)`.
    pub(crate) fn random_scalar<R: RngCore + CryptoRng + ?Sized>(&self, rng: &mut R) -> BigUint {
        utils::random_below(rng, &self.q)
    }

    /// Sample a uniform exponent in `[1, q)`.
    pub(crate) fn random_nonzero_scalar<R: RngCore + CryptoRng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> BigUint {
        utils::random_nonzero_below(rng, &self.q)
    }

    /// Deterministically map `(tag, index)` to a non-identity subgroup
    /// element whose discrete logarithm is unknown to everybody.
    pub(crate) fn hash_to_element(&self, tag: &[u8], index: usize) -> Result<BigUint> {
        let cofactor = (&self.p - 1u32) / &self.q;
        // Expand past the modulus size so that the reduction is close to
        // uniform.
        let blocks = (self.p.bits() as usize + 64) / 256 + 1;
        for counter in 0usize.. {
            let mut bytes = Vec::with_capacity(blocks * 32);
            for block in 0..blocks {
                let mut hasher = Sha256::new();
                hasher.update(tag);
                hasher.update(i2osp(index, INDEX_BYTES)?);
                hasher.update(i2osp(counter, INDEX_BYTES)?);
                hasher.update(i2osp(block, INDEX_BYTES)?);
                bytes.extend_from_slice(&hasher.finalize());
            }
            let candidate = BigUint::from_bytes_be(&bytes) % &self.p;
            let element = modpow(&candidate, &cofactor, &self.p);
            if !element.is_zero() && !element.is_one() {
                return Ok(element);
            }
        }
        Err(InternalError::InternalInvariantFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_named_groups_are_well_formed() -> Result<()> {
        for named in [NamedGroup::Toy, NamedGroup::Modp1024, NamedGroup::Modp2048] {
            let group = named.parameters();
            let rebuilt = GroupParameters::new(
                group.modulus().clone(),
                group.order().clone(),
                group.generator().clone(),
                group.marker().clone(),
            )?;
            assert_eq!(rebuilt, group);
        }
        assert_eq!(NamedGroup::Modp1024.parameters().modulus().bits(), 1024);
        assert_eq!(NamedGroup::Modp2048.parameters().modulus().bits(), 2048);
        Ok(())
    }

    #[test]
    fn test_new_rejects_bad_structure() {
        let toy = NamedGroup::Toy.parameters();
        // 7 does not divide p - 1
        assert!(GroupParameters::new(
            toy.modulus().clone(),
            BigUint::from(7u32),
            toy.generator().clone(),
            toy.marker().clone()
        )
        .is_err());
        // 2 has order larger than q
        assert!(GroupParameters::new(
            toy.modulus().clone(),
            toy.order().clone(),
            BigUint::from(2u32),
            toy.marker().clone()
        )
        .is_err());
        // The identity is not a usable marker
        assert!(GroupParameters::new(
            toy.modulus().clone(),
            toy.order().clone(),
            toy.generator().clone(),
            BigUint::one()
        )
        .is_err());
    }

    #[test]
    fn test_check_element() {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        for _ in 0..100 {
            let x = group.random_scalar(&mut rng);
            assert!(group.check_element(&group.pow_g(&x)).is_ok());
        }
        assert_eq!(
            group.check_element(&BigUint::zero()),
            Err(InternalError::NotInGroup)
        );
        assert_eq!(
            group.check_element(group.modulus()),
            Err(InternalError::NotInGroup)
        );
        // p - 1 has order 2
        assert_eq!(
            group.check_element(&(group.modulus() - 1u32)),
            Err(InternalError::NotInGroup)
        );
    }

    #[test]
    fn test_scalar_arithmetic_wraps_mod_q() {
        let group = NamedGroup::Toy.parameters();
        let q = group.order();
        let one = BigUint::one();
        assert!(group.scalar_add(&(q - 1u32), &one).is_zero());
        assert_eq!(group.scalar_sub(&BigUint::zero(), &one), q - 1u32);
        assert_eq!(group.scalar_neg(&one), q - 1u32);
        assert!(group.scalar_neg(&BigUint::zero()).is_zero());
        // Exponents only matter mod q for subgroup elements
        let g = group.generator();
        assert_eq!(group.pow(g, &(q + 5u32)), group.pow(g, &BigUint::from(5u32)));
    }

    #[test]
    fn test_hash_to_element_is_deterministic_and_distinct() -> Result<()> {
        let group = NamedGroup::Toy.parameters();
        let a = group.hash_to_element(b"tag", 0)?;
        let b = group.hash_to_element(b"tag", 1)?;
        let c = group.hash_to_element(b"other", 0)?;
        assert_eq!(a, group.hash_to_element(b"tag", 0)?);
        assert_ne!(a, b);
        assert_ne!(a, c);
        group.check_elements([&a, &b, &c])?;
        Ok(())
    }
}
