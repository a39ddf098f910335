// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Threshold ElGamal over the order-`q` subgroup.
//!
//! Every party holds a [`KeyPair`]; the joint public key is the product of all
//! public keys, so decryption needs one [`decryption_share`] from every
//! party.

use crate::{errors::Result, group::GroupParameters, utils::CryptoRngCore};
use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A party's ElGamal key pair `(x, y = g^x)`.
#[derive(Clone)]
pub struct KeyPair {
    private: BigUint,
    public: BigUint,
}

impl Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private", &"[redacted]")
            .field("public", &self.public)
            .finish()
    }
}

impl KeyPair {
    /// Sample a fresh key pair.
    pub fn generate(group: &GroupParameters, rng: &mut dyn CryptoRngCore) -> Self {
        let private = group.random_nonzero_scalar(rng);
        Self::from_private(group, private)
    }

    pub(crate) fn from_private(group: &GroupParameters, private: BigUint) -> Self {
        let public = group.pow_g(&private);
        Self { private, public }
    }

    pub(crate) fn private(&self) -> &BigUint {
        &self.private
    }

    /// The public key `y = g^x`.
    pub fn public(&self) -> &BigUint {
        &self.public
    }
}

/// The joint public key: the product of every party's public key.
pub fn aggregate_public_key<'a>(
    group: &GroupParameters,
    public_keys: impl IntoIterator<Item = &'a BigUint>,
) -> BigUint {
    group.product(public_keys)
}

/// An ElGamal ciphertext `(alpha, beta) = (m * y^r, g^r)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    #[serde(with = "crate::serialization::bytes")]
    pub(crate) alpha: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    pub(crate) beta: BigUint,
}

impl Ciphertext {
    pub(crate) fn new(alpha: BigUint, beta: BigUint) -> Self {
        Self { alpha, beta }
    }

    /// Encrypt `message` under `public_key` with explicit randomness `r`.
    pub fn encrypt_with(
        group: &GroupParameters,
        public_key: &BigUint,
        message: &BigUint,
        r: &BigUint,
    ) -> Self {
        let alpha = group.mul(message, &group.pow(public_key, r));
        let beta = group.pow_g(r);
        Self { alpha, beta }
    }

    /// Encrypt `message` under `public_key`, returning the ciphertext and the
    /// randomness used.
    pub fn encrypt(
        group: &GroupParameters,
        public_key: &BigUint,
        message: &BigUint,
        rng: &mut dyn CryptoRngCore,
    ) -> (Self, BigUint) {
        let r = group.random_scalar(rng);
        (Self::encrypt_with(group, public_key, message, &r), r)
    }

    /// The first component `m * y^r`.
    pub fn alpha(&self) -> &BigUint {
        &self.alpha
    }

    /// The second component `g^r`.
    pub fn beta(&self) -> &BigUint {
        &self.beta
    }

    /// Component-wise product, which encrypts the product of the plaintexts.
    pub fn multiply(&self, group: &GroupParameters, other: &Self) -> Self {
        Self {
            alpha: group.mul(&self.alpha, &other.alpha),
            beta: group.mul(&self.beta, &other.beta),
        }
    }

    /// Raise both components to `exponent`, which encrypts `m^exponent`.
    pub fn pow(&self, group: &GroupParameters, exponent: &BigUint) -> Self {
        Self {
            alpha: group.pow(&self.alpha, exponent),
            beta: group.pow(&self.beta, exponent),
        }
    }

    /// Multiply by an encryption of `1` under randomness `r`.
    pub fn reencrypt_with(&self, group: &GroupParameters, public_key: &BigUint, r: &BigUint) -> Self {
        let blind = Self::encrypt_with(group, public_key, &BigUint::one(), r);
        self.multiply(group, &blind)
    }

    /// Decrypt with the full private key matching the key encrypted under.
    pub fn decrypt(&self, group: &GroupParameters, private_key: &BigUint) -> BigUint {
        combine_decryption_shares(self, group, [&group.pow(&self.beta, private_key)])
    }

    /// Check that both components are subgroup elements.
    pub(crate) fn check(&self, group: &GroupParameters) -> Result<()> {
        group.check_element(&self.alpha)?;
        group.check_element(&self.beta)
    }
}

/// A party's share `beta^x` of the decryption of a ciphertext.
pub fn decryption_share(group: &GroupParameters, beta: &BigUint, key: &KeyPair) -> BigUint {
    group.pow(beta, key.private())
}

/// Recover the plaintext once every party's share is known.
pub fn combine_decryption_shares<'a>(
    ciphertext: &Ciphertext,
    group: &GroupParameters,
    shares: impl IntoIterator<Item = &'a BigUint>,
) -> BigUint {
    group.div(&ciphertext.alpha, &group.product(shares))
}

/// Split a vector of ciphertexts into its alphas and betas.
pub(crate) fn split(ciphertexts: &[Ciphertext]) -> (Vec<BigUint>, Vec<BigUint>) {
    ciphertexts
        .iter()
        .map(|c| (c.alpha.clone(), c.beta.clone()))
        .unzip()
}

/// Zip alphas and betas back into ciphertexts.
pub(crate) fn join(alphas: &[BigUint], betas: &[BigUint]) -> Vec<Ciphertext> {
    alphas
        .iter()
        .zip(betas)
        .map(|(alpha, beta)| Ciphertext::new(alpha.clone(), beta.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::NamedGroup;
    use rand::rngs::OsRng;

    #[test]
    fn test_encrypt_then_decrypt() {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let key = KeyPair::generate(&group, &mut rng);
        for _ in 0..50 {
            let m = group.pow_g(&group.random_scalar(&mut rng));
            let (c, _) = Ciphertext::encrypt(&group, key.public(), &m, &mut rng);
            assert_eq!(c.decrypt(&group, key.private()), m);
        }
    }

    #[test]
    fn test_multiply_is_homomorphic() {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let key = KeyPair::generate(&group, &mut rng);
        let m1 = group.marker().clone();
        let m2 = group.pow_g(&BigUint::from(12345u32));
        let (c1, _) = Ciphertext::encrypt(&group, key.public(), &m1, &mut rng);
        let (c2, _) = Ciphertext::encrypt(&group, key.public(), &m2, &mut rng);
        let product = c1.multiply(&group, &c2);
        assert_eq!(product.decrypt(&group, key.private()), group.mul(&m1, &m2));
    }

    #[test]
    fn test_reencryption_preserves_plaintext() {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let key = KeyPair::generate(&group, &mut rng);
        let m = group.marker().clone();
        let (c, _) = Ciphertext::encrypt(&group, key.public(), &m, &mut rng);
        let r = group.random_nonzero_scalar(&mut rng);
        let fresh = c.reencrypt_with(&group, key.public(), &r);
        assert_ne!(fresh, c);
        assert_eq!(fresh.decrypt(&group, key.private()), m);
    }

    #[test]
    fn test_threshold_decryption() {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let keys: Vec<_> = (0..4).map(|_| KeyPair::generate(&group, &mut rng)).collect();
        let joint = aggregate_public_key(&group, keys.iter().map(KeyPair::public));
        let m = group.marker().clone();
        let (c, _) = Ciphertext::encrypt(&group, &joint, &m, &mut rng);

        let shares: Vec<_> = keys
            .iter()
            .map(|key| decryption_share(&group, c.beta(), key))
            .collect();
        assert_eq!(combine_decryption_shares(&c, &group, &shares), m);
        // Any missing share leaves the plaintext hidden
        assert_ne!(combine_decryption_shares(&c, &group, &shares[1..]), m);
    }

    #[test]
    fn test_pow_raises_plaintext() {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let key = KeyPair::generate(&group, &mut rng);
        let (c, _) = Ciphertext::encrypt(&group, key.public(), &BigUint::one(), &mut rng);
        let e = group.random_nonzero_scalar(&mut rng);
        // Encryptions of one stay encryptions of one
        assert!(c.pow(&group, &e).decrypt(&group, key.private()).is_one());

        let (c, _) = Ciphertext::encrypt(&group, key.public(), group.marker(), &mut rng);
        assert_eq!(
            c.pow(&group, &e).decrypt(&group, key.private()),
            group.pow(group.marker(), &e)
        );
    }
}
