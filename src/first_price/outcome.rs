// Copyright (c) 2023 Bolt Labs, Inc.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The winner/price mix of the first-price auction.
//!
//! Each bidder `h` encrypts a one-hot vector `x_h` over the price levels
//! (`Y` at its bid level, `1` elsewhere). For bidder `a` and level `j` the
//! outcome ciphertext encrypts `Y^{e_aj}` with
//!
//! ```text
//! e_aj = Σ_h Σ_{d > j} x_hd + (1 - x_aj) + Σ_{h < a} x_hj
//! ```
//!
//! which vanishes exactly at the highest bid level and the lowest-indexed
//! bidder at that level. Entries are stored row by row, bidder first.

use crate::{
    elgamal::Ciphertext,
    errors::{InternalError, Result},
    group::GroupParameters,
    protocol::PartyId,
};
use num_bigint::BigUint;
use num_traits::One;
use tracing::error;

/// Outcome matrix entry for one component of the ciphertexts.
fn outcome_component(
    group: &GroupParameters,
    bids: &[Vec<BigUint>],
    levels: usize,
    lead: &BigUint,
) -> Vec<BigUint> {
    let bidders = bids.len();
    let mut out = vec![BigUint::one(); bidders * levels];
    // Π_h Π_{d > j} x_hd
    let mut above = BigUint::one();
    for j in (0..levels).rev() {
        // Π_{h < a} x_hj
        let mut before = BigUint::one();
        for (a, bid) in bids.iter().enumerate() {
            let entry = group.mul(&group.mul(lead, &above), &group.mul(&group.inv(&bid[j]), &before));
            out[a * levels + j] = entry;
            before = group.mul(&before, &bid[j]);
        }
        // `before` now holds the product of every bidder's entry at level j
        above = group.mul(&above, &before);
    }
    out
}

/// Computes the `bidders x levels` outcome ciphertexts from every bidder's
/// encrypted one-hot vector, in bidder order.
pub(crate) fn outcome_ciphertexts(
    group: &GroupParameters,
    bids: &[Vec<Ciphertext>],
    levels: usize,
) -> Result<Vec<Ciphertext>> {
    if let Some(bad) = bids.iter().position(|bid| bid.len() != levels) {
        error!(
            "Bid vector {} has {} levels instead of {}",
            bad,
            bids[bad].len(),
            levels
        );
        return malformed!("bid vector has the wrong number of levels");
    }
    let (alphas, betas): (Vec<_>, Vec<_>) = bids.iter().map(|bid| crate::elgamal::split(bid)).unzip();
    let gammas = outcome_component(group, &alphas, levels, group.marker());
    let deltas = outcome_component(group, &betas, levels, &BigUint::one());
    Ok(crate::elgamal::join(&gammas, &deltas))
}

/// Reads `(winner, price level)` off the decrypted outcome values.
///
/// Exactly one value must be `1`.
pub(crate) fn decode_outcome(values: &[BigUint], levels: usize) -> Result<(PartyId, usize)> {
    let mut hits = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_one())
        .map(|(i, _)| i);
    match (hits.next(), hits.next()) {
        (Some(i), None) if levels > 0 => Ok((PartyId::new(i / levels), i % levels)),
        (first, second) => {
            error!(
                "The auction outcome must have exactly one winning entry, got {:?} and {:?}",
                first, second
            );
            Err(InternalError::InternalInvariantFailed)
        }
    }
}

/// The largest exponent an outcome entry can carry when every bid vector is
/// one-hot: at most one bid above the level from each bidder, one for the
/// bidder's own level and one per earlier bidder.
pub(crate) fn max_exponent(bidders: usize) -> BigUint {
    BigUint::from(2 * bidders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        comparison::bit_plaintext,
        elgamal::{combine_decryption_shares, decryption_share, KeyPair},
        group::NamedGroup,
    };
    use rand::rngs::OsRng;

    fn one_hot(group: &GroupParameters, bid: usize, levels: usize) -> Vec<BigUint> {
        (0..levels).map(|j| bit_plaintext(group, j == bid)).collect()
    }

    /// The expected winner: highest level, lowest index on ties.
    fn expected(bids: &[usize]) -> (PartyId, usize) {
        let price = bids.iter().copied().max().unwrap_or_default();
        let winner = bids.iter().position(|&b| b == price).unwrap_or_default();
        (PartyId::new(winner), price)
    }

    #[test]
    fn test_every_three_bidder_outcome() -> Result<()> {
        let group = NamedGroup::Toy.parameters();
        let levels = 4;
        for code in 0..levels * levels * levels {
            let bids = [code % levels, (code / levels) % levels, code / (levels * levels)];
            let encrypted: Vec<Vec<_>> = bids
                .iter()
                .map(|&bid| {
                    one_hot(&group, bid, levels)
                        .into_iter()
                        .map(|m| Ciphertext::new(m, BigUint::one()))
                        .collect()
                })
                .collect();
            let outcome = outcome_ciphertexts(&group, &encrypted, levels)?;
            let values: Vec<_> = outcome.iter().map(|c| c.alpha().clone()).collect();
            assert_eq!(decode_outcome(&values, levels)?, expected(&bids), "bids {bids:?}");
        }
        Ok(())
    }

    #[test]
    fn test_outcome_under_joint_encryption() -> Result<()> {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let levels = 6;
        let keys: Vec<_> = (0..3).map(|_| KeyPair::generate(&group, &mut rng)).collect();
        let joint = group.product(keys.iter().map(KeyPair::public));
        let bids = [2, 5, 5];
        let encrypted: Vec<Vec<_>> = bids
            .iter()
            .map(|&bid| {
                one_hot(&group, bid, levels)
                    .iter()
                    .map(|m| Ciphertext::encrypt(&group, &joint, m, &mut rng).0)
                    .collect()
            })
            .collect();
        let outcome = outcome_ciphertexts(&group, &encrypted, levels)?;
        let values: Vec<_> = outcome
            .iter()
            .map(|c| {
                let shares: Vec<_> = keys
                    .iter()
                    .map(|k| decryption_share(&group, c.beta(), k))
                    .collect();
                combine_decryption_shares(c, &group, &shares)
            })
            .collect();
        assert_eq!(decode_outcome(&values, levels)?, (PartyId::new(1), 5));
        Ok(())
    }

    #[test]
    fn test_decode_needs_a_unique_winner() {
        let one = BigUint::one();
        let two = BigUint::from(2u32);
        assert!(decode_outcome(&[two.clone(), two.clone()], 2).is_err());
        assert!(decode_outcome(&[one.clone(), one.clone()], 2).is_err());
        assert_eq!(
            decode_outcome(&[two.clone(), two, one], 1).ok(),
            Some((PartyId::new(2), 0))
        );
    }

    #[test]
    fn test_ragged_bids_are_malformed() {
        let group = NamedGroup::Toy.parameters();
        let bid = vec![Ciphertext::new(BigUint::one(), BigUint::one()); 3];
        let short = vec![Ciphertext::new(BigUint::one(), BigUint::one()); 2];
        assert!(outcome_ciphertexts(&group, &[bid, short], 3).is_err());
    }
}
