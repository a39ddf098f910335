// Copyright (c) 2023 Bolt Labs, Inc.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The threshold ElGamal steps shared by both auctions: agreeing on a joint
//! key, blinding ciphertexts with secret exponents, and decrypting jointly.

use crate::{
    elgamal::{decryption_share, Ciphertext, KeyPair},
    errors::{InternalError, Result},
    group::GroupParameters,
    messages::{DecryptionInfo, Key, RandomizedOutput},
    participant::{Round, Route},
    protocol::PartyId,
    utils::CryptoRngCore,
    zkp::{
        dle::{DleInput, DleProof, DleSecret},
        dlk::{DlkInput, DlkProof, DlkSecret},
        verify_each, Proof,
    },
};
use num_bigint::BigUint;
use std::collections::BTreeMap;
use tracing::{debug, error};

/// This party's key pair and every party's public key.
pub(crate) struct KeyShares {
    key: KeyPair,
    public_keys: BTreeMap<PartyId, BigUint>,
    joint_key: Option<BigUint>,
}

impl KeyShares {
    pub(crate) fn generate(group: &GroupParameters, rng: &mut dyn CryptoRngCore) -> Self {
        Self {
            key: KeyPair::generate(group, rng),
            public_keys: BTreeMap::new(),
            joint_key: None,
        }
    }

    pub(crate) fn key(&self) -> &KeyPair {
        &self.key
    }

    pub(crate) fn joint_key(&self) -> Result<&BigUint> {
        self.joint_key.as_ref().ok_or_else(|| {
            error!("The joint key is used before it was agreed on");
            InternalError::InternalInvariantFailed
        })
    }

    pub(crate) fn public_key(&self, id: PartyId) -> Result<&BigUint> {
        self.public_keys.get(&id).ok_or_else(|| {
            error!("No public key stored for {}", id);
            InternalError::InternalInvariantFailed
        })
    }

    /// This party's decryption shares of `phis`, each proven against its
    /// public key.
    pub(crate) fn decryption_info(
        &self,
        group: &GroupParameters,
        phis: &[BigUint],
        rng: &mut dyn CryptoRngCore,
    ) -> Result<DecryptionInfo> {
        let mut info = DecryptionInfo {
            phis: Vec::with_capacity(phis.len()),
            proofs: Vec::with_capacity(phis.len()),
        };
        for phi in phis {
            let share = decryption_share(group, phi, &self.key);
            let input = share_statement(group, phi, &share, self.key.public());
            info.proofs
                .push(DleProof::prove(&input, &DleSecret::new(self.key.private()), &mut *rng)?);
            info.phis.push(share);
        }
        Ok(info)
    }

    /// Check `from`'s decryption shares of `phis`.
    pub(crate) fn check_decryption_info(
        &self,
        group: &GroupParameters,
        phis: &[BigUint],
        from: PartyId,
        info: &DecryptionInfo,
    ) -> Result<()> {
        info.check_shape(phis.len())?;
        group.check_elements(&info.phis)?;
        let public_key = self.public_key(from)?;
        let inputs = phis
            .iter()
            .zip(&info.phis)
            .map(|(phi, share)| share_statement(group, phi, share, public_key))
            .collect::<Vec<_>>();
        verify_each("decryption share", &info.proofs, inputs.into_iter())
    }
}

/// `share = phi^x` and `y = g^x` for the same `x`.
fn share_statement(
    group: &GroupParameters,
    phi: &BigUint,
    share: &BigUint,
    public_key: &BigUint,
) -> DleInput {
    DleInput::new(
        group,
        vec![phi.clone(), group.generator().clone()],
        vec![share.clone(), public_key.clone()],
    )
}

/// Protocol state that takes part in the joint key agreement.
pub(crate) trait HasKeyShares {
    fn group(&self) -> &GroupParameters;
    fn key_shares(&self) -> &KeyShares;
    fn key_shares_mut(&mut self) -> &mut KeyShares;
}

/// Publish a key share with a proof of knowledge of its private key; the
/// joint key is the product of all shares.
pub(crate) struct KeyRound;

impl<S: HasKeyShares + Send + Sync> Round<S> for KeyRound {
    type Payload = Key;

    fn name(&self) -> &'static str {
        "key"
    }

    fn route(&self) -> Route {
        Route::Broadcast
    }

    fn compute(&self, state: &mut S, rng: &mut dyn CryptoRngCore) -> Result<Key> {
        let group = state.group();
        let key = state.key_shares().key();
        let input = DlkInput::new(group, group.generator(), key.public());
        let proof = DlkProof::prove(&input, &DlkSecret::new(key.private()), rng)?;
        Ok(Key {
            public_key: key.public().clone(),
            proof,
        })
    }

    fn check(&self, state: &S, _: PartyId, payload: &Key) -> Result<()> {
        let group = state.group();
        group.check_element(&payload.public_key)?;
        payload
            .proof
            .verify(&DlkInput::new(group, group.generator(), &payload.public_key))
    }

    fn receive(&self, state: &mut S, payloads: Vec<(PartyId, Key)>) -> Result<()> {
        let public_keys: BTreeMap<_, _> = payloads
            .into_iter()
            .map(|(from, key)| (from, key.public_key))
            .collect();
        let joint_key = state.group().product(public_keys.values());
        let shares = state.key_shares_mut();
        shares.public_keys = public_keys;
        shares.joint_key = Some(joint_key);
        debug!("Computed the joint public key");
        Ok(())
    }
}

/// Raise every entry to its own fresh secret exponent and prove that both
/// components used the same one.
pub(crate) fn randomize(
    group: &GroupParameters,
    entries: &[Ciphertext],
    rng: &mut dyn CryptoRngCore,
) -> Result<RandomizedOutput> {
    let mut output = RandomizedOutput {
        gammas: Vec::with_capacity(entries.len()),
        deltas: Vec::with_capacity(entries.len()),
        proofs: Vec::with_capacity(entries.len()),
    };
    for entry in entries {
        let m = group.random_nonzero_scalar(&mut *rng);
        let randomized = entry.pow(group, &m);
        let input = randomize_statement(group, entry, randomized.alpha(), randomized.beta());
        output
            .proofs
            .push(DleProof::prove(&input, &DleSecret::new(&m), &mut *rng)?);
        output.gammas.push(randomized.alpha);
        output.deltas.push(randomized.beta);
    }
    Ok(output)
}

/// Check another party's [`randomize`] output for `entries`.
pub(crate) fn check_randomized(
    group: &GroupParameters,
    entries: &[Ciphertext],
    payload: &RandomizedOutput,
) -> Result<()> {
    payload.check_shape(entries.len())?;
    group.check_elements(payload.gammas.iter().chain(&payload.deltas))?;
    let inputs = entries
        .iter()
        .zip(payload.gammas.iter().zip(&payload.deltas))
        .map(|(entry, (gamma, delta))| randomize_statement(group, entry, gamma, delta))
        .collect::<Vec<_>>();
    verify_each("randomization", &payload.proofs, inputs.into_iter())
}

fn randomize_statement(
    group: &GroupParameters,
    entry: &Ciphertext,
    gamma: &BigUint,
    delta: &BigUint,
) -> DleInput {
    DleInput::new(
        group,
        vec![entry.alpha().clone(), entry.beta().clone()],
        vec![gamma.clone(), delta.clone()],
    )
}

/// Multiply every party's randomized copy entry by entry.
pub(crate) fn combine_randomized(
    group: &GroupParameters,
    outputs: &[RandomizedOutput],
    len: usize,
) -> Vec<Ciphertext> {
    (0..len)
        .map(|j| {
            Ciphertext::new(
                group.product(outputs.iter().map(|o| &o.gammas[j])),
                group.product(outputs.iter().map(|o| &o.deltas[j])),
            )
        })
        .collect()
}
