// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Proof of equality of discrete logarithms (Chaum-Pedersen), generalized to
//! any number of bases.
//!
//! Proves that the same secret `x` satisfies `Y_i = g_i^x` for every base
//! `g_i`. One nonce `v` is shared across all bases: `t_i = g_i^v`,
//! `c = H(g_0 || Y_0 || t_0 || g_1 || ...) mod q` and `r = v - c*x mod q`.
//! The verifier checks `t_i == g_i^r * Y_i^c mod p` for every `i` and reports
//! every index that fails.

use super::{Challenge, Proof};
use crate::{
    errors::{Result, VerificationReport},
    group::GroupParameters,
};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DleProof {
    #[serde(with = "crate::serialization::bytes_vec")]
    t: Vec<BigUint>,
    #[serde(with = "crate::serialization::bytes")]
    r: BigUint,
}

pub(crate) struct DleInput {
    group: GroupParameters,
    bases: Vec<BigUint>,
    values: Vec<BigUint>,
}

impl DleInput {
    pub(crate) fn new(group: &GroupParameters, bases: Vec<BigUint>, values: Vec<BigUint>) -> Self {
        Self {
            group: group.clone(),
            bases,
            values,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.bases.len() < 2 {
            error!(
                "Discrete-log equality needs at least two bases, got {}",
                self.bases.len()
            );
            return arg_err!("discrete-log equality needs at least two bases");
        }
        if self.bases.len() != self.values.len() {
            error!(
                "Got {} bases but {} values for discrete-log equality",
                self.bases.len(),
                self.values.len()
            );
            return arg_err!("discrete-log equality needs one value per base");
        }
        Ok(())
    }

    fn challenge(&self, t: &[BigUint]) -> BigUint {
        let mut transcript = Challenge::new(b"DleProof");
        for ((g, y), t) in self.bases.iter().zip(&self.values).zip(t) {
            transcript.append(g).append(y).append(t);
        }
        transcript.finish(self.group.order())
    }
}

pub(crate) struct DleSecret {
    x: BigUint,
}

impl DleSecret {
    pub(crate) fn new(x: &BigUint) -> Self {
        Self { x: x.clone() }
    }
}

impl Proof for DleProof {
    type CommonInput = DleInput;
    type ProverSecret = DleSecret;

    #[cfg_attr(feature = "flame_it", flame("DleProof"))]
    fn prove<R: RngCore + CryptoRng + ?Sized>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        rng: &mut R,
    ) -> Result<Self> {
        input.validate()?;
        let group = &input.group;
        let v = group.random_scalar(rng);
        let t: Vec<_> = input.bases.iter().map(|g| group.pow(g, &v)).collect();
        let c = input.challenge(&t);
        let r = group.scalar_sub(&v, &group.scalar_mul(&c, &secret.x));
        Ok(Self { t, r })
    }

    #[cfg_attr(feature = "flame_it", flame("DleProof"))]
    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        input.validate()?;
        if self.t.len() != input.bases.len() {
            error!(
                "Discrete-log equality proof has {} commitments for {} bases",
                self.t.len(),
                input.bases.len()
            );
            return malformed!("discrete-log equality proof has the wrong length");
        }
        let group = &input.group;
        let c = input.challenge(&self.t);
        let mut report = VerificationReport::new("discrete-log equality proof");
        for (i, ((g, y), t)) in input.bases.iter().zip(&input.values).zip(&self.t).enumerate() {
            let expected = group.mul(&group.pow(g, &self.r), &group.pow(y, &c));
            report.compare(format!("t[{i}] == g[{i}]^r * Y[{i}]^c"), &expected, t);
        }
        report.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::InternalError, group::NamedGroup};
    use rand::rngs::OsRng;

    fn random_dle_proof(bases: usize) -> Result<(DleInput, DleProof)> {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let x = group.random_nonzero_scalar(&mut rng);
        let bases: Vec<_> = (0..bases)
            .map(|_| group.pow_g(&group.random_nonzero_scalar(&mut rng)))
            .collect();
        let values = bases.iter().map(|g| group.pow(g, &x)).collect();
        let input = DleInput::new(&group, bases, values);
        let proof = DleProof::prove(&input, &DleSecret::new(&x), &mut rng)?;
        Ok((input, proof))
    }

    #[test]
    fn test_dle_proof_completeness() -> Result<()> {
        for trial in 0..100 {
            let (input, proof) = random_dle_proof(2 + trial % 4)?;
            proof.verify(&input)?;
        }
        Ok(())
    }

    #[test]
    fn test_dle_proof_needs_two_bases() {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let x = BigUint::from(5u32);
        let input = DleInput::new(
            &group,
            vec![group.generator().clone()],
            vec![group.pow_g(&x)],
        );
        assert!(matches!(
            DleProof::prove(&input, &DleSecret::new(&x), &mut rng),
            Err(InternalError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_dle_proof_reports_every_failing_index() -> Result<()> {
        let (input, proof) = random_dle_proof(4)?;
        let group = &input.group;

        // Using a different exponent for some of the bases breaks exactly
        // those indices
        let mut values = input.values.clone();
        values[1] = group.mul(&values[1], group.generator());
        values[3] = group.mul(&values[3], group.generator());
        let tampered = DleInput::new(group, input.bases.clone(), values);
        match proof.verify(&tampered) {
            Err(InternalError::FailedToVerifyProof(failure)) => {
                // The challenge changed too, so every index is reported
                assert_eq!(failure.mismatches.len(), 4);
            }
            other => panic!("tampered statement was accepted: {other:?}"),
        }

        let mut bad_t = proof.clone();
        bad_t.t[2] = group.mul(&bad_t.t[2], group.generator());
        assert!(bad_t.verify(&input).is_err());

        let mut bad_r = proof.clone();
        bad_r.r = group.scalar_add(&bad_r.r, &BigUint::from(1u32));
        match bad_r.verify(&input) {
            Err(InternalError::FailedToVerifyProof(failure)) => {
                assert_eq!(failure.mismatches.len(), 4);
            }
            other => panic!("mutated response was accepted: {other:?}"),
        }

        let mut short = proof;
        let _ = short.t.pop();
        assert!(matches!(
            short.verify(&input),
            Err(InternalError::MalformedMessage(_))
        ));
        Ok(())
    }

    #[test]
    fn test_dle_proof_with_different_secrets_fails() -> Result<()> {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let x = group.random_nonzero_scalar(&mut rng);
        let other = group.scalar_add(&x, &BigUint::from(1u32));
        let bases = vec![
            group.generator().clone(),
            group.pow_g(&group.random_nonzero_scalar(&mut rng)),
        ];
        let values = vec![group.pow(&bases[0], &x), group.pow(&bases[1], &other)];
        let input = DleInput::new(&group, bases, values);
        let proof = DleProof::prove(&input, &DleSecret::new(&x), &mut rng)?;
        match proof.verify(&input) {
            Err(InternalError::FailedToVerifyProof(failure)) => {
                assert_eq!(failure.failed_checks(), vec!["t[1] == g[1]^r * Y[1]^c"]);
            }
            other => panic!("unequal logarithms were accepted: {other:?}"),
        }
        Ok(())
    }
}
