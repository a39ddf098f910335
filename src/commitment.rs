// Copyright (c) 2023 Bolt Labs, Inc.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A generalized Pedersen commitment scheme for vectors of messages.
//!
//! A commitment to `m_0, ..., m_{k-1}` with blinding `r` is
//! `g_0^{m_0} * ... * g_{k-1}^{m_{k-1}} * h^r`. The generators are derived by
//! hashing into the order-`q` subgroup, so the committer knows no relation
//! between them and the scheme is binding. Messages and blinding factors are
//! exponents, so they only matter modulo `q`.

use crate::{
    errors::Result,
    group::GroupParameters,
    parameters::COMMITMENT_KEY_TAG,
};
use num_bigint::BigUint;
use tracing::error;

/// Public parameters for committing to up to [`CommitmentKey::capacity`]
/// messages at once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CommitmentKey {
    /// The message generators `g_i`.
    generators: Vec<BigUint>,
    /// The blinding generator `h`.
    blinding: BigUint,
}

impl CommitmentKey {
    /// Derive a key for `capacity` messages in `group`.
    ///
    /// The derivation is deterministic, so a prover and a verifier that agree
    /// on the group and the capacity agree on the key.
    pub(crate) fn derive(group: &GroupParameters, capacity: usize) -> Result<Self> {
        let generators = (0..capacity)
            .map(|i| group.hash_to_element(COMMITMENT_KEY_TAG, i))
            .collect::<Result<Vec<_>>>()?;
        let blinding = group.hash_to_element(COMMITMENT_KEY_TAG, capacity)?;
        Ok(Self {
            generators,
            blinding,
        })
    }

    /// Maximum number of messages per commitment.
    pub(crate) fn capacity(&self) -> usize {
        self.generators.len()
    }

    /// Commit to `messages` with blinding factor `randomness`.
    ///
    /// Fewer messages than the capacity are allowed; the unused generators are
    /// treated as committing to zero.
    pub(crate) fn commit(
        &self,
        group: &GroupParameters,
        messages: &[BigUint],
        randomness: &BigUint,
    ) -> Result<BigUint> {
        if messages.len() > self.capacity() {
            error!(
                "Tried to commit to {} messages with a key for {}",
                messages.len(),
                self.capacity()
            );
            return arg_err!("too many messages for this commitment key");
        }
        let commitment = self
            .generators
            .iter()
            .zip(messages)
            .fold(group.pow(&self.blinding, randomness), |acc, (g, m)| {
                group.mul(&acc, &group.pow(g, &group.scalar(m)))
            });
        Ok(commitment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::NamedGroup;
    use rand::rngs::OsRng;

    #[test]
    fn test_commitment_is_homomorphic() -> Result<()> {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let key = CommitmentKey::derive(&group, 4)?;

        let a: Vec<_> = (0..4).map(|_| group.random_scalar(&mut rng)).collect();
        let b: Vec<_> = (0..4).map(|_| group.random_scalar(&mut rng)).collect();
        let (ra, rb) = (group.random_scalar(&mut rng), group.random_scalar(&mut rng));

        let sum: Vec<_> = a.iter().zip(&b).map(|(x, y)| group.scalar_add(x, y)).collect();
        let lhs = group.mul(&key.commit(&group, &a, &ra)?, &key.commit(&group, &b, &rb)?);
        let rhs = key.commit(&group, &sum, &group.scalar_add(&ra, &rb))?;
        assert_eq!(lhs, rhs);
        Ok(())
    }

    #[test]
    fn test_commitment_binds_messages_and_randomness() -> Result<()> {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let key = CommitmentKey::derive(&group, 3)?;
        let m: Vec<_> = (0..3).map(|_| group.random_scalar(&mut rng)).collect();
        let r = group.random_scalar(&mut rng);
        let c = key.commit(&group, &m, &r)?;

        let mut other = m.clone();
        other[1] = group.scalar_add(&other[1], &BigUint::from(1u32));
        assert_ne!(c, key.commit(&group, &other, &r)?);
        assert_ne!(c, key.commit(&group, &m, &group.scalar_add(&r, &BigUint::from(1u32)))?);
        // Messages are exponents, so they are taken mod q
        let wrapped: Vec<_> = m.iter().map(|x| x + group.order()).collect();
        assert_eq!(c, key.commit(&group, &wrapped, &r)?);
        Ok(())
    }

    #[test]
    fn test_key_derivation() -> Result<()> {
        let group = NamedGroup::Toy.parameters();
        let key = CommitmentKey::derive(&group, 5)?;
        assert_eq!(key, CommitmentKey::derive(&group, 5)?);
        assert_eq!(key.capacity(), 5);
        assert!(key
            .commit(&group, &vec![BigUint::from(1u32); 6], &BigUint::from(0u32))
            .is_err());
        Ok(())
    }
}
