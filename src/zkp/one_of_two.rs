// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Proof that an ElGamal ciphertext encrypts either `1` or a public marker
//! `z`, without revealing which.
//!
//! This is the Cramer-Damgård-Schoenmakers OR-composition of two
//! Chaum-Pedersen proofs. Branch 1 claims `(alpha / z, beta)` encrypts `1`,
//! branch 2 claims `(alpha, beta)` encrypts `1`. The prover answers the true
//! branch honestly and simulates the other one by choosing its challenge
//! share and response first. The challenge shares must add up to
//! `c = H(a1 || a2 || b1 || b2) mod q`.

use super::{Challenge, Proof};
use crate::{
    elgamal::Ciphertext,
    errors::{Result, VerificationReport},
    group::GroupParameters,
};
use num_bigint::BigUint;
use num_traits::One;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct OneOfTwoProof {
    #[serde(with = "crate::serialization::bytes")]
    a1: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    a2: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    b1: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    b2: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    d1: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    d2: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    r1: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    r2: BigUint,
}

pub(crate) struct OneOfTwoInput {
    group: GroupParameters,
    /// The key the ciphertext was encrypted under.
    public_key: BigUint,
    /// The non-identity plaintext the ciphertext may hold.
    marker: BigUint,
    ciphertext: Ciphertext,
}

impl OneOfTwoInput {
    pub(crate) fn new(
        group: &GroupParameters,
        public_key: &BigUint,
        marker: &BigUint,
        ciphertext: &Ciphertext,
    ) -> Self {
        Self {
            group: group.clone(),
            public_key: public_key.clone(),
            marker: marker.clone(),
            ciphertext: ciphertext.clone(),
        }
    }
}

pub(crate) struct OneOfTwoSecret {
    plaintext: BigUint,
    randomness: BigUint,
}

impl OneOfTwoSecret {
    pub(crate) fn new(plaintext: &BigUint, randomness: &BigUint) -> Self {
        Self {
            plaintext: plaintext.clone(),
            randomness: randomness.clone(),
        }
    }
}

fn challenge(group: &GroupParameters, a1: &BigUint, a2: &BigUint, b1: &BigUint, b2: &BigUint) -> BigUint {
    Challenge::new(b"OneOfTwoProof")
        .append_all([a1, a2, b1, b2])
        .finish(group.order())
}

impl Proof for OneOfTwoProof {
    type CommonInput = OneOfTwoInput;
    type ProverSecret = OneOfTwoSecret;

    #[cfg_attr(feature = "flame_it", flame("OneOfTwoProof"))]
    fn prove<R: RngCore + CryptoRng + ?Sized>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        rng: &mut R,
    ) -> Result<Self> {
        let group = &input.group;
        let y = &input.public_key;
        let Ciphertext { alpha, beta } = &input.ciphertext;
        let alpha_over_z = group.div(alpha, &input.marker);
        let r = &secret.randomness;
        let w = group.random_scalar(rng);

        if secret.plaintext.is_one() {
            // Branch 2 is true; simulate branch 1
            let r1 = group.random_scalar(rng);
            let d1 = group.random_scalar(rng);
            let a1 = group.mul(&group.pow_g(&r1), &group.pow(beta, &d1));
            let b1 = group.mul(&group.pow(y, &r1), &group.pow(&alpha_over_z, &d1));
            let a2 = group.pow_g(&w);
            let b2 = group.pow(y, &w);
            let c = challenge(group, &a1, &a2, &b1, &b2);
            let d2 = group.scalar_sub(&c, &d1);
            let r2 = group.scalar_sub(&w, &group.scalar_mul(r, &d2));
            Ok(Self {
                a1,
                a2,
                b1,
                b2,
                d1,
                d2,
                r1,
                r2,
            })
        } else if secret.plaintext == input.marker {
            // Branch 1 is true; simulate branch 2
            let r2 = group.random_scalar(rng);
            let d2 = group.random_scalar(rng);
            let a2 = group.mul(&group.pow_g(&r2), &group.pow(beta, &d2));
            let b2 = group.mul(&group.pow(y, &r2), &group.pow(alpha, &d2));
            let a1 = group.pow_g(&w);
            let b1 = group.pow(y, &w);
            let c = challenge(group, &a1, &a2, &b1, &b2);
            let d1 = group.scalar_sub(&c, &d2);
            let r1 = group.scalar_sub(&w, &group.scalar_mul(r, &d1));
            Ok(Self {
                a1,
                a2,
                b1,
                b2,
                d1,
                d2,
                r1,
                r2,
            })
        } else {
            error!("Asked to prove a plaintext that is neither 1 nor the marker");
            arg_err!("plaintext must be 1 or the marker")
        }
    }

    #[cfg_attr(feature = "flame_it", flame("OneOfTwoProof"))]
    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let group = &input.group;
        let y = &input.public_key;
        let Ciphertext { alpha, beta } = &input.ciphertext;
        let alpha_over_z = group.div(alpha, &input.marker);

        let mut report = VerificationReport::new("one-of-two proof");
        let c = challenge(group, &self.a1, &self.a2, &self.b1, &self.b2);
        report.compare("c == d1 + d2", &c, &group.scalar_add(&self.d1, &self.d2));

        let a1 = group.mul(&group.pow_g(&self.r1), &group.pow(beta, &self.d1));
        report.compare("a1 == g^r1 * beta^d1", &a1, &self.a1);
        let a2 = group.mul(&group.pow_g(&self.r2), &group.pow(beta, &self.d2));
        report.compare("a2 == g^r2 * beta^d2", &a2, &self.a2);
        let b1 = group.mul(&group.pow(y, &self.r1), &group.pow(&alpha_over_z, &self.d1));
        report.compare("b1 == y^r1 * (alpha/z)^d1", &b1, &self.b1);
        let b2 = group.mul(&group.pow(y, &self.r2), &group.pow(alpha, &self.d2));
        report.compare("b2 == y^r2 * alpha^d2", &b2, &self.b2);
        report.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{elgamal::KeyPair, errors::InternalError, group::NamedGroup};
    use rand::rngs::OsRng;

    fn prove_plaintext(
        group: &GroupParameters,
        marker: &BigUint,
        plaintext: &BigUint,
    ) -> Result<(OneOfTwoInput, OneOfTwoProof)> {
        let mut rng = OsRng;
        let key = KeyPair::generate(group, &mut rng);
        let (ciphertext, r) = Ciphertext::encrypt(group, key.public(), plaintext, &mut rng);
        let input = OneOfTwoInput::new(group, key.public(), marker, &ciphertext);
        let proof = OneOfTwoProof::prove(&input, &OneOfTwoSecret::new(plaintext, &r), &mut rng)?;
        Ok((input, proof))
    }

    #[test]
    fn test_one_of_two_completeness() -> Result<()> {
        let group = NamedGroup::Toy.parameters();
        for trial in 0..100 {
            let plaintext = if trial % 2 == 0 {
                BigUint::one()
            } else {
                group.marker().clone()
            };
            let (input, proof) = prove_plaintext(&group, group.marker(), &plaintext)?;
            proof.verify(&input)?;
        }
        Ok(())
    }

    #[test]
    fn test_one_of_two_with_marker_42() -> Result<()> {
        let group = NamedGroup::Toy.parameters();
        let z = BigUint::from(42u32);

        let (input, proof) = prove_plaintext(&group, &z, &BigUint::one())?;
        proof.verify(&input)?;

        let (input, proof) = prove_plaintext(&group, &z, &z)?;
        proof.verify(&input)?;
        Ok(())
    }

    #[test]
    fn test_one_of_two_rejects_other_plaintexts() -> Result<()> {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let key = KeyPair::generate(&group, &mut rng);
        let seven = BigUint::from(7u32);
        let (ciphertext, r) = Ciphertext::encrypt(&group, key.public(), &seven, &mut rng);
        let input = OneOfTwoInput::new(&group, key.public(), group.marker(), &ciphertext);

        assert!(matches!(
            OneOfTwoProof::prove(&input, &OneOfTwoSecret::new(&seven, &r), &mut rng),
            Err(InternalError::InvalidArgument(_))
        ));

        // Lying about the plaintext produces a proof that does not verify
        let proof = OneOfTwoProof::prove(&input, &OneOfTwoSecret::new(&BigUint::one(), &r), &mut rng)?;
        assert!(proof.verify(&input).is_err());
        let proof = OneOfTwoProof::prove(&input, &OneOfTwoSecret::new(group.marker(), &r), &mut rng)?;
        assert!(proof.verify(&input).is_err());
        Ok(())
    }

    #[test]
    fn test_one_of_two_rejects_every_single_mutation() -> Result<()> {
        let group = NamedGroup::Toy.parameters();
        let (input, proof) = prove_plaintext(&group, group.marker(), group.marker())?;
        let g = group.generator();
        let one = BigUint::one();

        let mutations: Vec<(&str, Box<dyn Fn(&mut OneOfTwoProof) + '_>)> = vec![
            ("a1", Box::new(|p: &mut OneOfTwoProof| p.a1 = group.mul(&p.a1, g))),
            ("a2", Box::new(|p: &mut OneOfTwoProof| p.a2 = group.mul(&p.a2, g))),
            ("b1", Box::new(|p: &mut OneOfTwoProof| p.b1 = group.mul(&p.b1, g))),
            ("b2", Box::new(|p: &mut OneOfTwoProof| p.b2 = group.mul(&p.b2, g))),
            ("d1", Box::new(|p: &mut OneOfTwoProof| p.d1 = group.scalar_add(&p.d1, &one))),
            ("d2", Box::new(|p: &mut OneOfTwoProof| p.d2 = group.scalar_add(&p.d2, &one))),
            ("r1", Box::new(|p: &mut OneOfTwoProof| p.r1 = group.scalar_add(&p.r1, &one))),
            ("r2", Box::new(|p: &mut OneOfTwoProof| p.r2 = group.scalar_add(&p.r2, &one))),
        ];
        for (field, mutate) in mutations {
            let mut bad = proof.clone();
            mutate(&mut bad);
            assert!(
                matches!(bad.verify(&input), Err(InternalError::FailedToVerifyProof(_))),
                "mutating {field} was not detected"
            );
        }

        // Shifting weight between the challenge shares keeps the sum but
        // breaks the branch equations, and both are reported
        let mut shifted = proof;
        shifted.d1 = group.scalar_add(&shifted.d1, &one);
        shifted.d2 = group.scalar_sub(&shifted.d2, &one);
        match shifted.verify(&input) {
            Err(InternalError::FailedToVerifyProof(failure)) => {
                assert_eq!(
                    failure.failed_checks(),
                    vec![
                        "a1 == g^r1 * beta^d1",
                        "a2 == g^r2 * beta^d2",
                        "b1 == y^r1 * (alpha/z)^d1",
                        "b2 == y^r2 * alpha^d2",
                    ]
                );
            }
            other => panic!("shifted challenge shares were accepted: {other:?}"),
        }
        Ok(())
    }
}
