// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Two-party secure comparison ("Millionaire's problem").
//!
//! Parties 0 and 1 learn which of them holds the strictly larger value and
//! nothing else. The run has six rounds:
//!
//! | # | Route       | Payload                | Content                                      |
//! |---|-------------|------------------------|----------------------------------------------|
//! | 1 | broadcast   | `Key`                  | ElGamal key share and proof of knowledge      |
//! | 2 | broadcast   | `AlphaBeta`            | bitwise encrypted value, one-of-two proofs    |
//! | 3 | from seller | `MixedOutput`          | gamma/delta mix, shuffled by the seller       |
//! | 4 | to seller   | `MixedOutput`          | the same vector shuffled again by the other   |
//! | 5 | broadcast   | `RandomizedOutput`     | every entry raised to a secret exponent       |
//! | 6 | broadcast   | `DecryptionInfo`       | decryption shares with equality proofs        |
//!
//! After round 6 both parties compute the comparison values and agree on the
//! winner. Ties go to party 1.

pub(crate) mod rounds;

use crate::{
    comparison::exponent_bits,
    elgamal::Ciphertext,
    errors::{InternalError, Result},
    group::GroupParameters,
    parameters::DEFAULT_BIT_WIDTH,
    participant::{run_rounds, ErasedRound, PartyContext},
    protocol::{ParticipantConfig, PartyId},
    threshold::{HasKeyShares, KeyRound, KeyShares},
    utils::CryptoRngCore,
};
use num_bigint::BigUint;
use std::collections::BTreeMap;
use tracing::{error, info, instrument};

/// The parameters both parties must agree on before a comparison.
#[derive(Debug, Clone)]
pub struct MillionaireConfig {
    group: GroupParameters,
    bit_width: usize,
}

impl Default for MillionaireConfig {
    fn default() -> Self {
        Self {
            group: GroupParameters::default(),
            bit_width: DEFAULT_BIT_WIDTH,
        }
    }
}

impl MillionaireConfig {
    /// Compare values of `bit_width` bits in `group`.
    ///
    /// Fails if the bit width is zero or above 64, or if the group order is
    /// too small for the comparison exponents of that width.
    pub fn new(group: GroupParameters, bit_width: usize) -> Result<Self> {
        if bit_width == 0 || bit_width > 64 {
            error!("Bit width must be between 1 and 64, got {bit_width}");
            return arg_err!("bit width must be between 1 and 64");
        }
        if group.order().bits() <= exponent_bits(bit_width) {
            error!(
                "A {}-bit group order is too small to compare {}-bit values",
                group.order().bits(),
                bit_width
            );
            return arg_err!("group order too small for the bit width");
        }
        Ok(Self { group, bit_width })
    }

    /// The group the comparison runs in.
    pub fn group(&self) -> &GroupParameters {
        &self.group
    }

    /// Number of bits of each compared value.
    pub fn bit_width(&self) -> usize {
        self.bit_width
    }

    fn check_value(&self, value: u64) -> Result<()> {
        if self.bit_width < 64 && value >> self.bit_width != 0 {
            error!(
                "Value {} does not fit in {} bits",
                value, self.bit_width
            );
            return arg_err!("value does not fit in the configured bit width");
        }
        Ok(())
    }
}

/// What a party learns from a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MillionaireOutput {
    /// The party holding the strictly larger value, or party 1 on a tie.
    pub winner: PartyId,
}

/// Everything a party accumulates during a comparison.
pub(crate) struct MillionaireState {
    group: GroupParameters,
    bit_width: usize,
    id: PartyId,
    value: u64,
    keys: KeyShares,
    /// Each party's encrypted bits, least significant first.
    bits: BTreeMap<PartyId, Vec<Ciphertext>>,
    /// The gamma/delta vector after the latest shuffle.
    mixed: Vec<Ciphertext>,
    /// Each party's exponentiated copy of `mixed`.
    randomized: BTreeMap<PartyId, Vec<Ciphertext>>,
    winner: Option<PartyId>,
}

impl MillionaireState {
    pub(crate) fn new(
        config: &MillionaireConfig,
        id: PartyId,
        value: u64,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<Self> {
        config.check_value(value)?;
        Ok(Self {
            group: config.group.clone(),
            bit_width: config.bit_width,
            id,
            value,
            keys: KeyShares::generate(&config.group, rng),
            bits: BTreeMap::new(),
            mixed: Vec::new(),
            randomized: BTreeMap::new(),
            winner: None,
        })
    }

    fn bits_of(&self, id: PartyId) -> Result<&[Ciphertext]> {
        self.bits.get(&id).map(Vec::as_slice).ok_or_else(|| {
            error!("No encrypted bits stored for {}", id);
            InternalError::InternalInvariantFailed
        })
    }

    /// `phi_j`: the product of every party's randomized deltas.
    fn phis(&self) -> Vec<BigUint> {
        (0..self.mixed.len())
            .map(|j| {
                self.group
                    .product(self.randomized.values().map(|entries| entries[j].beta()))
            })
            .collect()
    }
}

impl HasKeyShares for MillionaireState {
    fn group(&self) -> &GroupParameters {
        &self.group
    }

    fn key_shares(&self) -> &KeyShares {
        &self.keys
    }

    fn key_shares_mut(&mut self) -> &mut KeyShares {
        &mut self.keys
    }
}

/// The six rounds of a comparison, in order.
pub(crate) fn millionaire_rounds() -> Vec<Box<dyn ErasedRound<MillionaireState>>> {
    vec![
        Box::new(KeyRound),
        Box::new(rounds::AlphaBetaRound),
        Box::new(rounds::SellerMixRound),
        Box::new(rounds::BidderMixRound),
        Box::new(rounds::RandomizeRound),
        Box::new(rounds::DecryptRound),
    ]
}

/// Run a comparison of `value` against the other party's value.
///
/// Exactly two parties take part. Blocks until the comparison finished or
/// failed; on failure the other party is halted as well.
#[instrument(skip_all)]
pub fn run_millionaire(
    config: &MillionaireConfig,
    context: &PartyContext,
    value: u64,
    rng: &mut dyn CryptoRngCore,
) -> Result<MillionaireOutput> {
    let rounds = millionaire_rounds();
    run_millionaire_with(config, context, value, &rounds, rng)
}

fn setup(
    config: &MillionaireConfig,
    participant: &ParticipantConfig,
    value: u64,
    rng: &mut dyn CryptoRngCore,
) -> Result<MillionaireState> {
    if participant.party_count != 2 {
        error!(
            "A comparison needs exactly two parties, got {}",
            participant.party_count
        );
        return arg_err!("a comparison needs exactly two parties");
    }
    MillionaireState::new(config, participant.id, value, rng)
}

pub(crate) fn run_millionaire_with(
    config: &MillionaireConfig,
    context: &PartyContext,
    value: u64,
    rounds: &[Box<dyn ErasedRound<MillionaireState>>],
    rng: &mut dyn CryptoRngCore,
) -> Result<MillionaireOutput> {
    let participant = context.config();
    let mut state = setup(config, participant, value, &mut *rng).map_err(|e| {
        context.halt_all();
        e
    })?;
    run_rounds(context, &mut state, rounds, rng)?;
    let winner = state.winner.ok_or_else(|| {
        error!("The comparison finished without a winner");
        InternalError::InternalInvariantFailed
    })?;
    info!("{} finished the comparison, winner is {}", participant.id, winner);
    Ok(MillionaireOutput { winner })
}
