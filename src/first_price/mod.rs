// Copyright (c) 2023 Bolt Labs, Inc.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! First-price sealed-bid auction among `n` parties.
//!
//! Every party, the seller included, bids one of `price_levels` levels. All
//! parties learn the highest level and the lowest-indexed party that bid it;
//! the other bids stay hidden.
//!
//! | # | Route       | Payload            |
//! |---|-------------|--------------------|
//! | 1 | broadcast   | `Key`              |
//! | 2 | broadcast   | `BidVector`        |
//! | 3 | broadcast   | `RandomizedOutput` |
//! | 4 | to seller   | `DecryptionInfo`   |
//! | 5 | from seller | `AuctionResult`    |

mod outcome;
mod rounds;

use crate::{
    elgamal::Ciphertext,
    errors::{InternalError, Result},
    group::GroupParameters,
    messages::DecryptionInfo,
    parameters::DEFAULT_PRICE_LEVELS,
    participant::{run_rounds, ErasedRound, PartyContext},
    protocol::PartyId,
    threshold::{HasKeyShares, KeyRound, KeyShares},
    utils::CryptoRngCore,
};
use num_bigint::BigUint;
use std::collections::BTreeMap;
use tracing::{error, info, instrument};

/// The parameters every party must agree on before an auction.
#[derive(Debug, Clone)]
pub struct FirstPriceConfig {
    group: GroupParameters,
    price_levels: usize,
}

impl Default for FirstPriceConfig {
    fn default() -> Self {
        Self {
            group: GroupParameters::default(),
            price_levels: DEFAULT_PRICE_LEVELS,
        }
    }
}

impl FirstPriceConfig {
    /// Run auctions with `price_levels` possible bids in `group`.
    pub fn new(group: GroupParameters, price_levels: usize) -> Result<Self> {
        if price_levels == 0 {
            error!("An auction needs at least one price level");
            return arg_err!("an auction needs at least one price level");
        }
        Ok(Self {
            group,
            price_levels,
        })
    }

    /// The group the auction runs in.
    pub fn group(&self) -> &GroupParameters {
        &self.group
    }

    /// Number of distinct bid levels; bids are `0..price_levels`.
    pub fn price_levels(&self) -> usize {
        self.price_levels
    }

    /// Outcome exponents reach `2n` and must not wrap around the group
    /// order, or a losing entry could decrypt to `1`.
    fn check_party_count(&self, party_count: usize) -> Result<()> {
        if &outcome::max_exponent(party_count) >= self.group.order() {
            error!(
                "{} parties are too many for a group of order {}",
                party_count,
                self.group.order()
            );
            return arg_err!("too many parties for the group order");
        }
        Ok(())
    }

    fn check_bid(&self, bid_level: usize) -> Result<()> {
        if bid_level >= self.price_levels {
            error!(
                "Bid level {} is outside 0..{}",
                bid_level, self.price_levels
            );
            return arg_err!("bid level out of range");
        }
        Ok(())
    }
}

/// What every party learns from an auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionOutcome {
    /// The lowest-indexed party among those that bid the highest level.
    pub winner: PartyId,
    /// The highest bid level.
    pub price: usize,
}

pub(crate) struct FirstPriceState {
    group: GroupParameters,
    levels: usize,
    id: PartyId,
    parties: Vec<PartyId>,
    bid_level: usize,
    keys: KeyShares,
    /// Every party's encrypted one-hot bid, by party.
    bids: BTreeMap<PartyId, Vec<Ciphertext>>,
    /// The outcome ciphertexts before blinding, bidder by bidder.
    outcome: Vec<Ciphertext>,
    /// The product of every party's blinded copy of `outcome`.
    blinded: Vec<Ciphertext>,
    /// Decryption shares that reached the seller.
    shares: BTreeMap<PartyId, DecryptionInfo>,
    result: Option<AuctionOutcome>,
}

impl FirstPriceState {
    fn new(
        config: &FirstPriceConfig,
        context: &PartyContext,
        bid_level: usize,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<Self> {
        let participant = context.config();
        config.check_party_count(participant.party_count)?;
        config.check_bid(bid_level)?;
        Ok(Self {
            group: config.group.clone(),
            levels: config.price_levels,
            id: participant.id,
            parties: participant.all_parties().collect(),
            bid_level,
            keys: KeyShares::generate(&config.group, rng),
            bids: BTreeMap::new(),
            outcome: Vec::new(),
            blinded: Vec::new(),
            shares: BTreeMap::new(),
            result: None,
        })
    }

    /// `phi` for every outcome entry: the blinded second components.
    fn phis(&self) -> Vec<BigUint> {
        self.blinded.iter().map(|c| c.beta().clone()).collect()
    }
}

impl HasKeyShares for FirstPriceState {
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

pub(crate) fn first_price_rounds() -> Vec<Box<dyn ErasedRound<FirstPriceState>>> {
    vec![
        Box::new(KeyRound),
        Box::new(rounds::BidRound),
        Box::new(rounds::BlindRound),
        Box::new(rounds::ShareRound),
        Box::new(rounds::ResultRound),
    ]
}

/// Take part in a first-price auction bidding `bid_level`.
///
/// Blocks until the outcome is known or the run failed; on failure every
/// other party is halted as well.
#[instrument(skip_all)]
pub fn run_first_price(
    config: &FirstPriceConfig,
    context: &PartyContext,
    bid_level: usize,
    rng: &mut dyn CryptoRngCore,
) -> Result<AuctionOutcome> {
    let rounds = first_price_rounds();
    run_first_price_with(config, context, bid_level, &rounds, rng)
}

pub(crate) fn run_first_price_with(
    config: &FirstPriceConfig,
    context: &PartyContext,
    bid_level: usize,
    rounds: &[Box<dyn ErasedRound<FirstPriceState>>],
    rng: &mut dyn CryptoRngCore,
) -> Result<AuctionOutcome> {
    let mut state = FirstPriceState::new(config, context, bid_level, &mut *rng).map_err(|e| {
        context.halt_all();
        e
    })?;
    run_rounds(context, &mut state, rounds, rng)?;
    let result = state.result.ok_or_else(|| {
        error!("The auction finished without an outcome");
        InternalError::InternalInvariantFailed
    })?;
    info!(
        "{} finished the auction: {} wins at level {}",
        state.id, result.winner, result.price
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::NamedGroup;

    #[test]
    fn test_config_checks() {
        let toy = NamedGroup::Toy.parameters();
        assert!(FirstPriceConfig::new(toy.clone(), 0).is_err());
        let config = FirstPriceConfig::new(toy, 4).unwrap();
        assert!(config.check_bid(3).is_ok());
        assert!(config.check_bid(4).is_err());
        assert!(config.check_party_count(100).is_ok());
        assert_eq!(FirstPriceConfig::default().price_levels(), 27);
    }

    #[test]
    fn test_party_count_is_bounded_by_the_group_order() {
        let toy = NamedGroup::Toy.parameters();
        let config = FirstPriceConfig::new(toy.clone(), 2).unwrap();
        // q = 8632777; 2n must stay below it
        assert!(config.check_party_count(4_316_388).is_ok());
        assert!(config.check_party_count(4_316_389).is_err());
    }
}
