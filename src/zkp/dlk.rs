// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Proof of knowledge of a discrete logarithm (Schnorr).
//!
//! Proves knowledge of `x` such that `y = g^x`. The prover sends `t = g^v`
//! and `r = v - c*x mod q` where `c = H(g || y || t) mod q`; the verifier
//! checks `t == g^r * y^c mod p`.

use super::{Challenge, Proof};
use crate::{
    errors::{Result, VerificationReport},
    group::GroupParameters,
};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DlkProof {
    #[serde(with = "crate::serialization::bytes")]
    t: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    r: BigUint,
}

pub(crate) struct DlkInput {
    group: GroupParameters,
    base: BigUint,
    public: BigUint,
}

impl DlkInput {
    pub(crate) fn new(group: &GroupParameters, base: &BigUint, public: &BigUint) -> Self {
        Self {
            group: group.clone(),
            base: base.clone(),
            public: public.clone(),
        }
    }
}

pub(crate) struct DlkSecret {
    x: BigUint,
}

impl DlkSecret {
    pub(crate) fn new(x: &BigUint) -> Self {
        Self { x: x.clone() }
    }
}

fn challenge(input: &DlkInput, t: &BigUint) -> BigUint {
    Challenge::new(b"DlkProof")
        .append(&input.base)
        .append(&input.public)
        .append(t)
        .finish(input.group.order())
}

impl Proof for DlkProof {
    type CommonInput = DlkInput;
    type ProverSecret = DlkSecret;

    #[cfg_attr(feature = "flame_it", flame("DlkProof"))]
    fn prove<R: RngCore + CryptoRng + ?Sized>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        rng: &mut R,
    ) -> Result<Self> {
        let group = &input.group;
        let v = group.random_scalar(rng);
        let t = group.pow(&input.base, &v);
        let c = challenge(input, &t);
        let r = group.scalar_sub(&v, &group.scalar_mul(&c, &secret.x));
        Ok(Self { t, r })
    }

    #[cfg_attr(feature = "flame_it", flame("DlkProof"))]
    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let group = &input.group;
        let c = challenge(input, &self.t);
        let expected = group.mul(
            &group.pow(&input.base, &self.r),
            &group.pow(&input.public, &c),
        );
        let mut report = VerificationReport::new("discrete-log knowledge proof");
        report.compare("t == g^r * y^c", &expected, &self.t);
        report.finish()
    }
}
