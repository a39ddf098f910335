// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::MillionaireState;
use crate::{
    comparison::{bit_plaintext, calculate_gamma_delta, calculate_v, comparison_winner, to_bits},
    elgamal::Ciphertext,
    errors::{InternalError, Result},
    messages::{AlphaBeta, DecryptionInfo, MixedOutput, RandomizedOutput},
    participant::{Round, Route},
    protocol::PartyId,
    threshold::{check_randomized, randomize},
    utils::CryptoRngCore,
    zkp::{
        one_of_two::{OneOfTwoInput, OneOfTwoProof, OneOfTwoSecret},
        shuffle::{shuffle, ShuffleInput},
        verify_each, Proof,
    },
};
use tracing::{error, info};

/// Round 2: publish the value encrypted bit by bit under the joint key.
pub(crate) struct AlphaBetaRound;

impl Round<MillionaireState> for AlphaBetaRound {
    type Payload = AlphaBeta;

    fn name(&self) -> &'static str {
        "alpha/beta"
    }

    fn route(&self) -> Route {
        Route::Broadcast
    }

    fn compute(
        &self,
        state: &mut MillionaireState,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<AlphaBeta> {
        let group = &state.group;
        let joint_key = state.keys.joint_key()?;
        let mut ciphertexts = Vec::with_capacity(state.bit_width);
        let mut proofs = Vec::with_capacity(state.bit_width);
        for bit in to_bits(state.value, state.bit_width) {
            let plaintext = bit_plaintext(group, bit);
            let (ciphertext, r) = Ciphertext::encrypt(group, joint_key, &plaintext, &mut *rng);
            let input = OneOfTwoInput::new(group, joint_key, group.marker(), &ciphertext);
            proofs.push(OneOfTwoProof::prove(
                &input,
                &OneOfTwoSecret::new(&plaintext, &r),
                &mut *rng,
            )?);
            ciphertexts.push(ciphertext);
        }
        let (alphas, betas) = crate::elgamal::split(&ciphertexts);
        Ok(AlphaBeta {
            alphas,
            betas,
            proofs,
        })
    }

    fn check(&self, state: &MillionaireState, _: PartyId, payload: &AlphaBeta) -> Result<()> {
        let group = &state.group;
        let joint_key = state.keys.joint_key()?;
        payload.check_shape(state.bit_width)?;
        group.check_elements(payload.alphas.iter().chain(&payload.betas))?;
        let inputs = payload
            .ciphertexts()
            .into_iter()
            .map(|c| OneOfTwoInput::new(group, joint_key, group.marker(), &c))
            .collect::<Vec<_>>();
        verify_each("one-of-two", &payload.proofs, inputs.into_iter())
    }

    fn receive(
        &self,
        state: &mut MillionaireState,
        payloads: Vec<(PartyId, AlphaBeta)>,
    ) -> Result<()> {
        state.bits = payloads
            .into_iter()
            .map(|(from, bits)| (from, bits.ciphertexts()))
            .collect();
        Ok(())
    }
}

/// The gamma/delta vector both parties derive from the encrypted bits.
fn initial_mix(state: &MillionaireState) -> Result<Vec<Ciphertext>> {
    calculate_gamma_delta(
        &state.group,
        state.bits_of(PartyId::new(0))?,
        state.bits_of(PartyId::new(1))?,
    )
}

/// Check a shuffled vector against the vector it claims to shuffle.
fn check_mixed(state: &MillionaireState, before: Vec<Ciphertext>, payload: &MixedOutput) -> Result<()> {
    let group = &state.group;
    if payload.gammas.len() != state.bit_width || payload.deltas.len() != state.bit_width {
        error!(
            "Expected {} mixed entries, got {} gammas and {} deltas",
            state.bit_width,
            payload.gammas.len(),
            payload.deltas.len()
        );
        return malformed!("mixed output has the wrong length");
    }
    group.check_elements(payload.gammas.iter().chain(&payload.deltas))?;
    let input = ShuffleInput::new(group, state.keys.joint_key()?, before, payload.ciphertexts());
    payload.proof.verify(&input)
}

fn mixed_output(
    state: &MillionaireState,
    before: &[Ciphertext],
    rng: &mut dyn CryptoRngCore,
) -> Result<MixedOutput> {
    let (after, proof) = shuffle(&state.group, state.keys.joint_key()?, before, rng)?;
    let (gammas, deltas) = crate::elgamal::split(&after);
    Ok(MixedOutput {
        gammas,
        deltas,
        proof,
    })
}

fn take_single<P>(payloads: Vec<(PartyId, P)>) -> Result<P> {
    let count = payloads.len();
    let mut payloads = payloads.into_iter();
    match (payloads.next(), payloads.next()) {
        (Some((_, payload)), None) => Ok(payload),
        _ => {
            error!("Expected exactly one contribution, got {}", count);
            Err(InternalError::InternalInvariantFailed)
        }
    }
}

/// Round 3: the seller computes the gamma/delta mix and shuffles it.
pub(crate) struct SellerMixRound;

impl Round<MillionaireState> for SellerMixRound {
    type Payload = MixedOutput;

    fn name(&self) -> &'static str {
        "seller mix"
    }

    fn route(&self) -> Route {
        Route::FromSeller
    }

    fn compute(
        &self,
        state: &mut MillionaireState,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<MixedOutput> {
        let before = initial_mix(state)?;
        mixed_output(state, &before, rng)
    }

    fn check(&self, state: &MillionaireState, _: PartyId, payload: &MixedOutput) -> Result<()> {
        check_mixed(state, initial_mix(state)?, payload)
    }

    fn receive(
        &self,
        state: &mut MillionaireState,
        payloads: Vec<(PartyId, MixedOutput)>,
    ) -> Result<()> {
        state.mixed = take_single(payloads)?.ciphertexts();
        Ok(())
    }
}

/// Round 4: the other party shuffles the seller's output once more, so
/// neither party alone knows where the deciding position went.
pub(crate) struct BidderMixRound;

impl Round<MillionaireState> for BidderMixRound {
    type Payload = MixedOutput;

    fn name(&self) -> &'static str {
        "bidder mix"
    }

    fn route(&self) -> Route {
        Route::ToSeller
    }

    fn compute(
        &self,
        state: &mut MillionaireState,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<MixedOutput> {
        mixed_output(state, &state.mixed, rng)
    }

    fn check(&self, state: &MillionaireState, _: PartyId, payload: &MixedOutput) -> Result<()> {
        check_mixed(state, state.mixed.clone(), payload)
    }

    fn receive(
        &self,
        state: &mut MillionaireState,
        payloads: Vec<(PartyId, MixedOutput)>,
    ) -> Result<()> {
        state.mixed = take_single(payloads)?.ciphertexts();
        Ok(())
    }
}

/// Round 5: raise every entry to a fresh secret exponent, so that only the
/// deciding entry still decrypts to a recognizable value.
pub(crate) struct RandomizeRound;

impl Round<MillionaireState> for RandomizeRound {
    type Payload = RandomizedOutput;

    fn name(&self) -> &'static str {
        "randomize"
    }

    fn route(&self) -> Route {
        Route::Broadcast
    }

    fn compute(
        &self,
        state: &mut MillionaireState,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<RandomizedOutput> {
        randomize(&state.group, &state.mixed, rng)
    }

    fn check(
        &self,
        state: &MillionaireState,
        _: PartyId,
        payload: &RandomizedOutput,
    ) -> Result<()> {
        check_randomized(&state.group, &state.mixed, payload)
    }

    fn receive(
        &self,
        state: &mut MillionaireState,
        payloads: Vec<(PartyId, RandomizedOutput)>,
    ) -> Result<()> {
        state.randomized = payloads
            .into_iter()
            .map(|(from, output)| (from, crate::elgamal::join(&output.gammas, &output.deltas)))
            .collect();
        Ok(())
    }
}

/// Round 6: publish decryption shares of the combined deltas and decide.
pub(crate) struct DecryptRound;

impl Round<MillionaireState> for DecryptRound {
    type Payload = DecryptionInfo;

    fn name(&self) -> &'static str {
        "decrypt"
    }

    fn route(&self) -> Route {
        Route::Broadcast
    }

    fn compute(
        &self,
        state: &mut MillionaireState,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<DecryptionInfo> {
        state.keys.decryption_info(&state.group, &state.phis(), rng)
    }

    fn check(&self, state: &MillionaireState, from: PartyId, payload: &DecryptionInfo) -> Result<()> {
        state
            .keys
            .check_decryption_info(&state.group, &state.phis(), from, payload)
    }

    fn receive(
        &self,
        state: &mut MillionaireState,
        payloads: Vec<(PartyId, DecryptionInfo)>,
    ) -> Result<()> {
        let group = &state.group;
        let first = state.randomized.get(&PartyId::new(0));
        let second = state.randomized.get(&PartyId::new(1));
        let (first, second, [(_, shares1), (_, shares2)]) =
            match (first, second, <[_; 2]>::try_from(payloads)) {
                (Some(first), Some(second), Ok(shares)) => (first, second, shares),
                _ => {
                    error!("Missing randomized output or decryption shares after round 6");
                    return Err(InternalError::InternalInvariantFailed);
                }
            };
        let values: Vec<_> = (0..state.mixed.len())
            .map(|j| {
                calculate_v(
                    group,
                    first[j].alpha(),
                    second[j].alpha(),
                    &shares1.phis[j],
                    &shares2.phis[j],
                )
            })
            .collect();
        let winner = comparison_winner(&values);
        info!("{} decided the comparison: {} wins", state.id, winner);
        state.winner = Some(winner);
        Ok(())
    }
}
