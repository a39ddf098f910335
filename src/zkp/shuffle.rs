// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Verifiable secret shuffle of ElGamal ciphertexts (Furukawa-Sako style).
//!
//! The statement is that `E_i = e_{π(i)} * Enc(1; R_i)` for a secret
//! permutation `π` and secret re-encryption randomness `R_i`.
//!
//! The prover commits to the permutation matrix row by row:
//! `c_j = Commit(u_{π^{-1}(j)}, 3 d_{π^{-1}(j)}, 3 d_{π^{-1}(j)}^2; r_j)`
//! where `u_i` is the `i`-th unit vector, together with two aggregate
//! commitments `cd`, `cD` and the ciphertext `ER = Enc(1; -RR) * Π E_i^{d_i}`.
//! The challenges `t_j` hash the whole statement and the first message.
//! The verifier then checks
//!
//! 1. `cd * Π c_j^{t_j} == Commit(f, yd, fd; zd)`
//! 2. `cD * Π c_j^{t_j^2} == Commit(F, fD, yD; zD)` with
//!    `fD = Σ f_i^3 - Σ t_j^3 - fd`
//! 3. `Π E_i^{f_i} == Π e_j^{t_j} * Enc(1; Z) * ER`
//!
//! All exponents are reduced modulo `q`, and every product modulo `p`.

use super::{Challenge, Proof};
use crate::{
    commitment::CommitmentKey,
    elgamal::Ciphertext,
    errors::{Result, VerificationReport},
    group::GroupParameters,
    permutation::Permutation,
};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ShuffleProof {
    /// Commitments to the rows of the permutation matrix.
    #[serde(with = "crate::serialization::bytes_vec")]
    c: Vec<BigUint>,
    #[serde(with = "crate::serialization::bytes")]
    cd: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    cD: BigUint,
    ER: Ciphertext,
    #[serde(with = "crate::serialization::bytes_vec")]
    f: Vec<BigUint>,
    #[serde(with = "crate::serialization::bytes_vec")]
    F: Vec<BigUint>,
    #[serde(with = "crate::serialization::bytes")]
    fd: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    yd: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    zd: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    yD: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    zD: BigUint,
    #[serde(with = "crate::serialization::bytes")]
    Z: BigUint,
}

pub(crate) struct ShuffleInput {
    group: GroupParameters,
    public_key: BigUint,
    inputs: Vec<Ciphertext>,
    outputs: Vec<Ciphertext>,
}

impl ShuffleInput {
    pub(crate) fn new(
        group: &GroupParameters,
        public_key: &BigUint,
        inputs: Vec<Ciphertext>,
        outputs: Vec<Ciphertext>,
    ) -> Self {
        Self {
            group: group.clone(),
            public_key: public_key.clone(),
            inputs,
            outputs,
        }
    }

    fn len(&self) -> usize {
        self.inputs.len()
    }

    fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() || self.inputs.len() != self.outputs.len() {
            error!(
                "Shuffle of {} ciphertexts into {}",
                self.inputs.len(),
                self.outputs.len()
            );
            return malformed!("shuffle needs equally many (and at least one) inputs and outputs");
        }
        Ok(())
    }

    /// The challenge vector `t_j = H(statement, first message, j) mod q`.
    fn challenges(
        &self,
        c: &[BigUint],
        cd: &BigUint,
        cD: &BigUint,
        ER: &Ciphertext,
    ) -> Vec<BigUint> {
        let mut prefix = Challenge::new(b"ShuffleProof");
        prefix.append(&self.public_key);
        for ciphertext in self.inputs.iter().chain(&self.outputs) {
            prefix.append(&ciphertext.alpha).append(&ciphertext.beta);
        }
        prefix
            .append_all(c)
            .append(cd)
            .append(cD)
            .append(&ER.alpha)
            .append(&ER.beta);
        (0..self.len())
            .map(|j| prefix.clone().append_index(j).finish(self.group.order()))
            .collect()
    }
}

pub(crate) struct ShuffleSecret {
    permutation: Permutation,
    randomness: Vec<BigUint>,
}

impl ShuffleSecret {
    pub(crate) fn new(permutation: Permutation, randomness: Vec<BigUint>) -> Self {
        Self {
            permutation,
            randomness,
        }
    }
}

/// `Σ terms mod q`
fn sum(group: &GroupParameters, terms: impl IntoIterator<Item = BigUint>) -> BigUint {
    terms
        .into_iter()
        .fold(BigUint::zero(), |acc, term| group.scalar_add(&acc, &term))
}

fn square(group: &GroupParameters, a: &BigUint) -> BigUint {
    group.scalar_mul(a, a)
}

fn cube(group: &GroupParameters, a: &BigUint) -> BigUint {
    group.scalar_mul(&square(group, a), a)
}

/// Π ciphertexts[i]^exponents[i]
fn weighted_product(
    group: &GroupParameters,
    ciphertexts: &[Ciphertext],
    exponents: &[BigUint],
) -> Ciphertext {
    ciphertexts.iter().zip(exponents).fold(
        Ciphertext::new(BigUint::one(), BigUint::one()),
        |acc, (ciphertext, e)| acc.multiply(group, &ciphertext.pow(group, e)),
    )
}

impl Proof for ShuffleProof {
    type CommonInput = ShuffleInput;
    type ProverSecret = ShuffleSecret;

    #[cfg_attr(feature = "flame_it", flame("ShuffleProof"))]
    fn prove<R: RngCore + CryptoRng + ?Sized>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        rng: &mut R,
    ) -> Result<Self> {
        input.validate()?;
        let n = input.len();
        if secret.permutation.len() != n || secret.randomness.len() != n {
            error!("Shuffle witness does not match a statement of size {}", n);
            return arg_err!("shuffle witness has the wrong size");
        }
        let group = &input.group;
        let y = &input.public_key;
        let pi = &secret.permutation;
        let key = CommitmentKey::derive(group, n + 2)?;
        let three = BigUint::from(3u32);

        let d: Vec<_> = (0..n).map(|_| group.random_scalar(rng)).collect();
        let D: Vec<_> = (0..n).map(|_| group.random_scalar(rng)).collect();
        let r: Vec<_> = (0..n).map(|_| group.random_scalar(rng)).collect();
        let rd = group.random_scalar(rng);
        let rD = group.random_scalar(rng);
        let sd = group.random_scalar(rng);
        let sD = group.random_scalar(rng);
        let delta = group.random_scalar(rng);
        let RR = group.random_scalar(rng);

        // Row j of the permutation matrix has its one in column π^{-1}(j)
        let mut c = Vec::with_capacity(n);
        for (j, r_j) in r.iter().enumerate() {
            let i = pi.preimage(j);
            let mut messages = vec![BigUint::zero(); n + 2];
            messages[i] = BigUint::one();
            messages[n] = group.scalar_mul(&three, &d[i]);
            messages[n + 1] = group.scalar_mul(&three, &square(group, &d[i]));
            c.push(key.commit(group, &messages, r_j)?);
        }

        let d_cubed = sum(group, d.iter().map(|d_i| cube(group, d_i)));
        let fd_blind = group.scalar_sub(&d_cubed, &delta);
        let cd = key.commit(group, &[d.clone(), vec![sd.clone(), fd_blind.clone()]].concat(), &rd)?;
        let cD = key.commit(group, &[D.clone(), vec![delta, sD.clone()]].concat(), &rD)?;

        let ER = Ciphertext::encrypt_with(group, y, &BigUint::one(), &group.scalar_neg(&RR))
            .multiply(group, &weighted_product(group, &input.outputs, &d));

        let t = input.challenges(&c, &cd, &cD, &ER);

        // t_{π(i)} lines up with output i
        let t_pi = pi.apply(&t)?;
        // d_{π^{-1}(j)} lines up with challenge j
        let d_pre = pi.inverse().apply(&d)?;

        let f = t_pi
            .iter()
            .zip(&d)
            .map(|(t_i, d_i)| group.scalar_add(t_i, d_i))
            .collect();
        let F = t_pi
            .iter()
            .zip(&D)
            .map(|(t_i, D_i)| group.scalar_add(&square(group, t_i), D_i))
            .collect();

        let yd = group.scalar_add(
            &group.scalar_mul(
                &three,
                &sum(group, t.iter().zip(&d_pre).map(|(t_j, d_j)| group.scalar_mul(t_j, d_j))),
            ),
            &sd,
        );
        let fd = group.scalar_add(
            &group.scalar_mul(
                &three,
                &sum(
                    group,
                    t.iter()
                        .zip(&d_pre)
                        .map(|(t_j, d_j)| group.scalar_mul(t_j, &square(group, d_j))),
                ),
            ),
            &fd_blind,
        );
        let yD = group.scalar_add(
            &group.scalar_mul(
                &three,
                &sum(
                    group,
                    t.iter()
                        .zip(&d_pre)
                        .map(|(t_j, d_j)| group.scalar_mul(&square(group, t_j), &square(group, d_j))),
                ),
            ),
            &sD,
        );
        let zd = group.scalar_add(
            &sum(group, t.iter().zip(&r).map(|(t_j, r_j)| group.scalar_mul(t_j, r_j))),
            &rd,
        );
        let zD = group.scalar_add(
            &sum(
                group,
                t.iter()
                    .zip(&r)
                    .map(|(t_j, r_j)| group.scalar_mul(&square(group, t_j), r_j)),
            ),
            &rD,
        );
        let Z = group.scalar_add(
            &sum(
                group,
                t_pi.iter()
                    .zip(&secret.randomness)
                    .map(|(t_i, R_i)| group.scalar_mul(t_i, R_i)),
            ),
            &RR,
        );

        Ok(Self {
            c,
            cd,
            cD,
            ER,
            f,
            F,
            fd,
            yd,
            zd,
            yD,
            zD,
            Z,
        })
    }

    #[cfg_attr(feature = "flame_it", flame("ShuffleProof"))]
    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        input.validate()?;
        let n = input.len();
        if self.c.len() != n || self.f.len() != n || self.F.len() != n {
            error!(
                "Shuffle proof vectors have lengths ({}, {}, {}) for {} ciphertexts",
                self.c.len(),
                self.f.len(),
                self.F.len(),
                n
            );
            return malformed!("shuffle proof has the wrong length");
        }
        let group = &input.group;
        group.check_elements(self.c.iter().chain([&self.cd, &self.cD]))?;
        self.ER.check(group)?;

        let key = CommitmentKey::derive(group, n + 2)?;
        let t = input.challenges(&self.c, &self.cd, &self.cD, &self.ER);
        let t_squared: Vec<_> = t.iter().map(|t_j| square(group, t_j)).collect();
        let mut report = VerificationReport::new("shuffle proof");

        let lhs1 = self
            .c
            .iter()
            .zip(&t)
            .fold(self.cd.clone(), |acc, (c_j, t_j)| group.mul(&acc, &group.pow(c_j, t_j)));
        let rhs1 = key.commit(
            group,
            &[self.f.clone(), vec![self.yd.clone(), self.fd.clone()]].concat(),
            &self.zd,
        )?;
        report.compare("equation 1: cd * prod c_j^t_j == Commit(f, yd, fd; zd)", &rhs1, &lhs1);

        let fD = group.scalar_sub(
            &group.scalar_sub(
                &sum(group, self.f.iter().map(|f_i| cube(group, f_i))),
                &sum(group, t.iter().map(|t_j| cube(group, t_j))),
            ),
            &self.fd,
        );
        let lhs2 = self
            .c
            .iter()
            .zip(&t_squared)
            .fold(self.cD.clone(), |acc, (c_j, t_j)| group.mul(&acc, &group.pow(c_j, t_j)));
        let rhs2 = key.commit(
            group,
            &[self.F.clone(), vec![fD, self.yD.clone()]].concat(),
            &self.zD,
        )?;
        report.compare("equation 2: cD * prod c_j^(t_j^2) == Commit(F, fD, yD; zD)", &rhs2, &lhs2);

        let lhs3 = weighted_product(group, &input.outputs, &self.f);
        let rhs3 = weighted_product(group, &input.inputs, &t)
            .multiply(
                group,
                &Ciphertext::encrypt_with(group, &input.public_key, &BigUint::one(), &self.Z),
            )
            .multiply(group, &self.ER);
        report.compare(
            "equation 3: prod E_i^f_i == prod e_j^t_j * Enc(1; Z) * ER (alpha)",
            &rhs3.alpha,
            &lhs3.alpha,
        );
        report.compare(
            "equation 3: prod E_i^f_i == prod e_j^t_j * Enc(1; Z) * ER (beta)",
            &rhs3.beta,
            &lhs3.beta,
        );
        report.finish()
    }
}

/// Re-encrypt and permute `inputs` under `public_key`.
///
/// Returns the outputs together with the permutation and the re-encryption
/// randomness that witness the shuffle.
pub(crate) fn mix<R: RngCore + CryptoRng + ?Sized>(
    group: &GroupParameters,
    public_key: &BigUint,
    inputs: &[Ciphertext],
    rng: &mut R,
) -> Result<(Vec<Ciphertext>, Permutation, Vec<BigUint>)> {
    let permutation = Permutation::random(inputs.len(), rng);
    let randomness: Vec<_> = (0..inputs.len()).map(|_| group.random_scalar(rng)).collect();
    let outputs = permutation
        .apply(inputs)?
        .iter()
        .zip(&randomness)
        .map(|(e, R_i)| e.reencrypt_with(group, public_key, R_i))
        .collect();
    Ok((outputs, permutation, randomness))
}

/// Mix `inputs` and prove that the output is a shuffle of the input.
pub(crate) fn shuffle<R: RngCore + CryptoRng + ?Sized>(
    group: &GroupParameters,
    public_key: &BigUint,
    inputs: &[Ciphertext],
    rng: &mut R,
) -> Result<(Vec<Ciphertext>, ShuffleProof)> {
    let (outputs, permutation, randomness) = mix(group, public_key, inputs, rng)?;
    let input = ShuffleInput::new(group, public_key, inputs.to_vec(), outputs.clone());
    let proof = ShuffleProof::prove(&input, &ShuffleSecret::new(permutation, randomness), rng)?;
    Ok((outputs, proof))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        elgamal::KeyPair,
        errors::InternalError,
        group::NamedGroup,
    };
    use rand::rngs::OsRng;

    struct Fixture {
        group: GroupParameters,
        key: KeyPair,
        plaintexts: Vec<BigUint>,
        inputs: Vec<Ciphertext>,
    }

    fn fixture(n: usize) -> Fixture {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let key = KeyPair::generate(&group, &mut rng);
        let plaintexts: Vec<_> = (0..n)
            .map(|_| group.pow_g(&group.random_scalar(&mut rng)))
            .collect();
        let inputs = plaintexts
            .iter()
            .map(|m| Ciphertext::encrypt(&group, key.public(), m, &mut rng).0)
            .collect();
        Fixture {
            group,
            key,
            plaintexts,
            inputs,
        }
    }

    fn failed_checks(result: Result<()>) -> Vec<String> {
        match result {
            Err(InternalError::FailedToVerifyProof(failure)) => failure
                .failed_checks()
                .iter()
                .map(|check| check.split(':').next().unwrap_or_default().to_string())
                .collect(),
            other => panic!("expected a proof failure, got {other:?}"),
        }
    }

    #[test]
    fn test_shuffle_completeness() -> Result<()> {
        let mut rng = OsRng;
        for trial in 0..100 {
            let Fixture { group, key, inputs, .. } = fixture(1 + trial % 6);
            let (outputs, proof) = shuffle(&group, key.public(), &inputs, &mut rng)?;
            proof.verify(&ShuffleInput::new(&group, key.public(), inputs, outputs))?;
        }
        Ok(())
    }

    #[test]
    fn test_shuffle_of_100_ciphertexts_round_trips() -> Result<()> {
        let mut rng = OsRng;
        let Fixture {
            group,
            key,
            plaintexts,
            inputs,
        } = fixture(100);
        let (outputs, permutation, randomness) = mix(&group, key.public(), &inputs, &mut rng)?;
        let input = ShuffleInput::new(&group, key.public(), inputs.clone(), outputs.clone());
        let proof = ShuffleProof::prove(
            &input,
            &ShuffleSecret::new(permutation.clone(), randomness),
            &mut rng,
        )?;
        proof.verify(&input)?;

        // The outputs hold the same multiset of plaintexts
        let mut decrypted: Vec<_> = outputs
            .iter()
            .map(|c| c.decrypt(&group, key.private()))
            .collect();
        let mut expected = plaintexts.clone();
        decrypted.sort();
        expected.sort();
        assert_eq!(decrypted, expected);

        // Undoing the permutation restores the original order, and the
        // untouched inputs still decrypt
        let restored = permutation.inverse().apply(&outputs)?;
        for ((restored, original), m) in restored.iter().zip(&inputs).zip(&plaintexts) {
            assert_eq!(&restored.decrypt(&group, key.private()), m);
            assert_eq!(&original.decrypt(&group, key.private()), m);
        }
        Ok(())
    }

    #[test]
    fn test_shuffle_rejects_mutated_proofs() -> Result<()> {
        let mut rng = OsRng;
        let Fixture { group, key, inputs, .. } = fixture(5);
        let (outputs, proof) = shuffle(&group, key.public(), &inputs, &mut rng)?;
        let input = ShuffleInput::new(&group, key.public(), inputs, outputs);
        let g = group.generator();
        let one = BigUint::one();

        let mut bad = proof.clone();
        bad.Z = group.scalar_add(&bad.Z, &one);
        assert_eq!(
            failed_checks(bad.verify(&input)),
            vec!["equation 3", "equation 3"]
        );

        let mut bad = proof.clone();
        bad.yd = group.scalar_add(&bad.yd, &one);
        assert_eq!(failed_checks(bad.verify(&input)), vec!["equation 1"]);

        let mut bad = proof.clone();
        bad.zD = group.scalar_add(&bad.zD, &one);
        assert_eq!(failed_checks(bad.verify(&input)), vec!["equation 2"]);

        let mut bad = proof.clone();
        bad.fd = group.scalar_add(&bad.fd, &one);
        assert_eq!(
            failed_checks(bad.verify(&input)),
            vec!["equation 1", "equation 2"]
        );

        let mut bad = proof.clone();
        bad.F[3] = group.scalar_add(&bad.F[3], &one);
        assert_eq!(failed_checks(bad.verify(&input)), vec!["equation 2"]);

        type Mutation = fn(&mut ShuffleProof, &BigUint, &GroupParameters);
        let mutations: [Mutation; 7] = [
            |p, g, group| p.c[0] = group.mul(&p.c[0], g),
            |p, g, group| p.cd = group.mul(&p.cd, g),
            |p, g, group| p.cD = group.mul(&p.cD, g),
            |p, g, group| p.ER.beta = group.mul(&p.ER.beta, g),
            |p, _, group| p.f[1] = group.scalar_add(&p.f[1], &BigUint::one()),
            |p, _, group| p.yD = group.scalar_add(&p.yD, &BigUint::one()),
            |p, _, group| p.zd = group.scalar_add(&p.zd, &BigUint::one()),
        ];
        for mutate in mutations {
            let mut bad = proof.clone();
            mutate(&mut bad, g, &group);
            assert!(matches!(
                bad.verify(&input),
                Err(InternalError::FailedToVerifyProof(_))
            ));
        }

        let mut short = proof;
        let _ = short.f.pop();
        assert!(matches!(
            short.verify(&input),
            Err(InternalError::MalformedMessage(_))
        ));
        Ok(())
    }

    #[test]
    fn test_shuffle_rejects_changed_plaintext() -> Result<()> {
        let mut rng = OsRng;
        let Fixture { group, key, inputs, .. } = fixture(4);
        let (mut outputs, proof) = shuffle(&group, key.public(), &inputs, &mut rng)?;
        // Swap in an output that encrypts something else
        outputs[2] = outputs[2].multiply(
            &group,
            &Ciphertext::encrypt(&group, key.public(), group.marker(), &mut rng).0,
        );
        let input = ShuffleInput::new(&group, key.public(), inputs, outputs);
        assert!(proof.verify(&input).is_err());

        // Claiming a shuffle with a wrong witness fails too
        let Fixture { group, key, inputs, .. } = fixture(4);
        let outputs = inputs
            .iter()
            .map(|e| e.reencrypt_with(&group, key.public(), &BigUint::from(5u32)))
            .collect();
        let input = ShuffleInput::new(&group, key.public(), inputs, outputs);
        let wrong = Permutation::new(vec![1, 0, 2, 3])?;
        let proof = ShuffleProof::prove(
            &input,
            &ShuffleSecret::new(wrong, vec![BigUint::from(5u32); 4]),
            &mut rng,
        )?;
        assert!(proof.verify(&input).is_err());
        Ok(())
    }
}
