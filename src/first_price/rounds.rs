// Copyright (c) 2023 Bolt Labs, Inc.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{
    outcome::{decode_outcome, outcome_ciphertexts},
    AuctionOutcome, FirstPriceState,
};
use crate::{
    comparison::bit_plaintext,
    elgamal::{combine_decryption_shares, Ciphertext},
    errors::{InternalError, Result},
    group::GroupParameters,
    messages::{AlphaBeta, AuctionResult, BidVector, DecryptionInfo, RandomizedOutput},
    participant::{Round, Route},
    protocol::PartyId,
    threshold::{check_randomized, combine_randomized, randomize},
    utils::CryptoRngCore,
    zkp::{
        dle::{DleInput, DleProof, DleSecret},
        one_of_two::{OneOfTwoInput, OneOfTwoProof, OneOfTwoSecret},
        verify_each, Proof,
    },
};
use num_bigint::BigUint;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// `Π alpha / Y = y^R` and `Π beta = g^R` for the same `R`, which holds only
/// if the plaintexts multiply to the marker.
fn sum_statement(group: &GroupParameters, joint_key: &BigUint, bid: &[Ciphertext]) -> DleInput {
    let alphas = group.product(bid.iter().map(Ciphertext::alpha));
    let betas = group.product(bid.iter().map(Ciphertext::beta));
    DleInput::new(
        group,
        vec![joint_key.clone(), group.generator().clone()],
        vec![group.div(&alphas, group.marker()), betas],
    )
}

/// Round 2: publish a one-hot encrypted bid.
pub(crate) struct BidRound;

impl Round<FirstPriceState> for BidRound {
    type Payload = BidVector;

    fn name(&self) -> &'static str {
        "bid"
    }

    fn route(&self) -> Route {
        Route::Broadcast
    }

    fn compute(
        &self,
        state: &mut FirstPriceState,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<BidVector> {
        let group = &state.group;
        let joint_key = state.keys.joint_key()?;
        let mut ciphertexts = Vec::with_capacity(state.levels);
        let mut proofs = Vec::with_capacity(state.levels);
        let mut randomness = BigUint::default();
        for level in 0..state.levels {
            let plaintext = bit_plaintext(group, level == state.bid_level);
            let (ciphertext, r) = Ciphertext::encrypt(group, joint_key, &plaintext, &mut *rng);
            let input = OneOfTwoInput::new(group, joint_key, group.marker(), &ciphertext);
            proofs.push(OneOfTwoProof::prove(
                &input,
                &OneOfTwoSecret::new(&plaintext, &r),
                &mut *rng,
            )?);
            randomness = group.scalar_add(&randomness, &r);
            ciphertexts.push(ciphertext);
        }
        let sum_proof = DleProof::prove(
            &sum_statement(group, joint_key, &ciphertexts),
            &DleSecret::new(&randomness),
            &mut *rng,
        )?;
        let (alphas, betas) = crate::elgamal::split(&ciphertexts);
        Ok(BidVector {
            levels: AlphaBeta {
                alphas,
                betas,
                proofs,
            },
            sum_proof,
        })
    }

    fn check(&self, state: &FirstPriceState, from: PartyId, payload: &BidVector) -> Result<()> {
        let group = &state.group;
        let joint_key = state.keys.joint_key()?;
        let levels = &payload.levels;
        levels.check_shape(state.levels)?;
        group.check_elements(levels.alphas.iter().chain(&levels.betas))?;
        let bid = levels.ciphertexts();
        let inputs = bid
            .iter()
            .map(|c| OneOfTwoInput::new(group, joint_key, group.marker(), c))
            .collect::<Vec<_>>();
        verify_each("one-of-two", &levels.proofs, inputs.into_iter())?;
        payload
            .sum_proof
            .verify(&sum_statement(group, joint_key, &bid))
            .map_err(|e| {
                error!("The bid of {} does not hold exactly one marker", from);
                e
            })
    }

    fn receive(
        &self,
        state: &mut FirstPriceState,
        payloads: Vec<(PartyId, BidVector)>,
    ) -> Result<()> {
        state.bids = payloads
            .into_iter()
            .map(|(from, bid)| (from, bid.levels.ciphertexts()))
            .collect();
        let bids: Vec<_> = state.bids.values().cloned().collect();
        state.outcome = outcome_ciphertexts(&state.group, &bids, state.levels)?;
        debug!(
            "{} computed {} outcome entries",
            state.id,
            state.outcome.len()
        );
        Ok(())
    }
}

/// Round 3: blind every outcome entry with a fresh secret exponent.
pub(crate) struct BlindRound;

impl Round<FirstPriceState> for BlindRound {
    type Payload = RandomizedOutput;

    fn name(&self) -> &'static str {
        "blind"
    }

    fn route(&self) -> Route {
        Route::Broadcast
    }

    fn compute(
        &self,
        state: &mut FirstPriceState,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<RandomizedOutput> {
        randomize(&state.group, &state.outcome, rng)
    }

    fn check(
        &self,
        state: &FirstPriceState,
        _: PartyId,
        payload: &RandomizedOutput,
    ) -> Result<()> {
        check_randomized(&state.group, &state.outcome, payload)
    }

    fn receive(
        &self,
        state: &mut FirstPriceState,
        payloads: Vec<(PartyId, RandomizedOutput)>,
    ) -> Result<()> {
        let outputs: Vec<_> = payloads.into_iter().map(|(_, output)| output).collect();
        state.blinded = combine_randomized(&state.group, &outputs, state.outcome.len());
        Ok(())
    }
}

/// Round 4: every bidder hands its decryption shares to the seller.
pub(crate) struct ShareRound;

impl Round<FirstPriceState> for ShareRound {
    type Payload = DecryptionInfo;

    fn name(&self) -> &'static str {
        "decryption shares"
    }

    fn route(&self) -> Route {
        Route::ToSeller
    }

    fn compute(
        &self,
        state: &mut FirstPriceState,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<DecryptionInfo> {
        state.keys.decryption_info(&state.group, &state.phis(), rng)
    }

    fn check(&self, state: &FirstPriceState, from: PartyId, payload: &DecryptionInfo) -> Result<()> {
        state
            .keys
            .check_decryption_info(&state.group, &state.phis(), from, payload)
    }

    fn receive(
        &self,
        state: &mut FirstPriceState,
        payloads: Vec<(PartyId, DecryptionInfo)>,
    ) -> Result<()> {
        state.shares.extend(payloads);
        Ok(())
    }
}

/// Decrypt every blinded outcome entry with one share set per party.
fn decide(
    state: &FirstPriceState,
    shares: &BTreeMap<PartyId, DecryptionInfo>,
) -> Result<AuctionOutcome> {
    let values: Vec<_> = state
        .blinded
        .iter()
        .enumerate()
        .map(|(j, c)| combine_decryption_shares(c, &state.group, shares.values().map(|s| &s.phis[j])))
        .collect();
    let (winner, price) = decode_outcome(&values, state.levels)?;
    Ok(AuctionOutcome { winner, price })
}

/// Round 5: the seller decrypts and announces the outcome together with all
/// shares, so every bidder can redo the decryption.
pub(crate) struct ResultRound;

impl Round<FirstPriceState> for ResultRound {
    type Payload = AuctionResult;

    fn name(&self) -> &'static str {
        "result"
    }

    fn route(&self) -> Route {
        Route::FromSeller
    }

    fn compute(
        &self,
        state: &mut FirstPriceState,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<AuctionResult> {
        let own = state.keys.decryption_info(&state.group, &state.phis(), rng)?;
        state.shares.insert(state.id, own);
        if state.shares.len() != state.parties.len() {
            error!(
                "The seller holds {} share sets for {} parties",
                state.shares.len(),
                state.parties.len()
            );
            return Err(InternalError::InternalInvariantFailed);
        }
        let outcome = decide(state, &state.shares)?;
        info!(
            "{} decrypted the auction: {} wins at level {}",
            state.id, outcome.winner, outcome.price
        );
        Ok(AuctionResult {
            winner: outcome.winner,
            price: outcome.price,
            shares: state
                .shares
                .iter()
                .map(|(id, info)| (*id, info.clone()))
                .collect(),
        })
    }

    fn check(&self, state: &FirstPriceState, _: PartyId, payload: &AuctionResult) -> Result<()> {
        let shares: BTreeMap<_, _> = payload.shares.iter().cloned().collect();
        if shares.len() != payload.shares.len() || !shares.keys().eq(state.parties.iter()) {
            error!(
                "The result must carry exactly one share set per party, got {:?}",
                payload.shares.iter().map(|(id, _)| *id).collect::<Vec<_>>()
            );
            return malformed!("result does not carry one share set per party");
        }
        let phis = state.phis();
        for (from, info) in &shares {
            state
                .keys
                .check_decryption_info(&state.group, &phis, *from, info)?;
        }
        let outcome = decide(state, &shares)?;
        if outcome.winner != payload.winner || outcome.price != payload.price {
            error!(
                "The announced outcome ({}, {}) differs from the decrypted one ({}, {})",
                payload.winner, payload.price, outcome.winner, outcome.price
            );
            return malformed!("announced outcome does not match the shares");
        }
        Ok(())
    }

    fn receive(
        &self,
        state: &mut FirstPriceState,
        payloads: Vec<(PartyId, AuctionResult)>,
    ) -> Result<()> {
        let mut payloads = payloads.into_iter();
        match (payloads.next(), payloads.next()) {
            (Some((_, result)), None) => {
                state.result = Some(AuctionOutcome {
                    winner: result.winner,
                    price: result.price,
                });
                Ok(())
            }
            _ => {
                error!("Expected exactly one auction result");
                Err(InternalError::InternalInvariantFailed)
            }
        }
    }
}
