// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The secure comparison at the heart of the Millionaire protocol.
//!
//! Both parties encrypt their values bit by bit (least significant bit at
//! index 0), each bit as `1` or the marker `Y`. For two bit vectors `a` and
//! `b` the mixed ciphertext at index `j` encrypts `Y^{e_j}` with
//!
//! ```text
//! e_j = 1 + b_j - a_j + Σ_{d > j} w(d) (a_d - b_d),    w(d) = 2^(d+2) - 2
//! ```
//!
//! The weight of index `d` is `2^(s+1) - 2` for the 1-based significance
//! `s = d + 1`, which dominates every lower position. So `e_j = 0` exactly at
//! the most significant position where the bits differ, and only if party 0's
//! bit is the one that is set there. Decrypting to `1` anywhere therefore means
//! party 0 holds the strictly larger value; equal values never decrypt to `1`.

use crate::{
    elgamal::Ciphertext,
    errors::Result,
    group::GroupParameters,
    protocol::PartyId,
};
use num_bigint::BigUint;
use num_traits::One;
use tracing::error;

/// Exponent weight of bit index `d`.
pub(crate) fn weight(d: usize) -> BigUint {
    (BigUint::one() << (d + 2)) - 2u32
}

/// Upper bound on the bit length of any mixing exponent for `bit_width` bits.
///
/// Exponents must stay below `q`, or a non-zero exponent could vanish.
pub(crate) fn exponent_bits(bit_width: usize) -> u64 {
    bit_width as u64 + 2
}

/// The bits of `value`, least significant first.
pub(crate) fn to_bits(value: u64, bit_width: usize) -> Vec<bool> {
    (0..bit_width).map(|j| j < 64 && (value >> j) & 1 == 1).collect()
}

/// The plaintext that encodes a single bit: `Y` for one, `1` for zero.
pub(crate) fn bit_plaintext(group: &GroupParameters, bit: bool) -> BigUint {
    if bit {
        group.marker().clone()
    } else {
        BigUint::one()
    }
}

/// One component of the mix:
/// `lead * x2_j / x1_j * Π_{d>j} (x1_d / x2_d)^w(d)`.
fn mix_component(
    group: &GroupParameters,
    first: &[BigUint],
    second: &[BigUint],
    lead: &BigUint,
) -> Vec<BigUint> {
    let mut out = vec![BigUint::one(); first.len()];
    let mut suffix = BigUint::one();
    for j in (0..first.len()).rev() {
        out[j] = group.mul(&group.mul(lead, &second[j]), &group.mul(&group.inv(&first[j]), &suffix));
        let ratio = group.div(&first[j], &second[j]);
        suffix = group.mul(&suffix, &group.pow(&ratio, &weight(j)));
    }
    out
}

/// Computes the gamma/delta vectors from both parties' encrypted bits.
///
/// `first` belongs to party 0 and `second` to party 1. Gamma (the alpha
/// side) carries the extra marker factor, delta (the beta side) does not.
/// The result is returned as ciphertexts `(gamma_j, delta_j)`.
pub fn calculate_gamma_delta(
    group: &GroupParameters,
    first: &[Ciphertext],
    second: &[Ciphertext],
) -> Result<Vec<Ciphertext>> {
    if first.len() != second.len() {
        error!(
            "Comparing bit vectors of different lengths: {} and {}",
            first.len(),
            second.len()
        );
        return malformed!("bit vectors must have the same length");
    }
    let (alpha1, beta1): (Vec<_>, Vec<_>) = crate::elgamal::split(first);
    let (alpha2, beta2): (Vec<_>, Vec<_>) = crate::elgamal::split(second);
    let gammas = mix_component(group, &alpha1, &alpha2, group.marker());
    let deltas = mix_component(group, &beta1, &beta2, &BigUint::one());
    Ok(crate::elgamal::join(&gammas, &deltas))
}

/// `v = (gamma1 * gamma2) / (phi1 * phi2) mod p`
pub fn calculate_v(
    group: &GroupParameters,
    gamma1: &BigUint,
    gamma2: &BigUint,
    phi1: &BigUint,
    phi2: &BigUint,
) -> BigUint {
    group.div(&group.mul(gamma1, gamma2), &group.mul(phi1, phi2))
}

/// The winner given every decrypted comparison value.
///
/// Party 0 wins if any value is `1`; otherwise (including ties) party 1 wins.
pub fn comparison_winner(values: &[BigUint]) -> PartyId {
    if values.iter().any(One::is_one) {
        PartyId::new(0)
    } else {
        PartyId::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        elgamal::{aggregate_public_key, decryption_share, KeyPair},
        group::NamedGroup,
    };
    use num_traits::Zero;
    use rand::rngs::OsRng;

    /// Bits encrypted with zero randomness, i.e. the plaintexts themselves.
    fn transparent(group: &GroupParameters, value: u64, bit_width: usize) -> Vec<Ciphertext> {
        to_bits(value, bit_width)
            .into_iter()
            .map(|bit| Ciphertext::new(bit_plaintext(group, bit), BigUint::one()))
            .collect()
    }

    #[test]
    fn test_weights() {
        assert_eq!(weight(0), BigUint::from(2u32));
        assert_eq!(weight(1), BigUint::from(6u32));
        assert_eq!(weight(5), BigUint::from(126u32));
    }

    #[test]
    fn test_bits_are_least_significant_first() {
        assert_eq!(to_bits(5, 4), vec![true, false, true, false]);
        assert_eq!(to_bits(u64::MAX, 66)[64..], [false, false]);
    }

    #[test]
    fn test_exhaustive_plaintext_comparison() -> Result<()> {
        let group = NamedGroup::Toy.parameters();
        let bit_width = 4;
        for a in 0..16 {
            for b in 0..16 {
                let mixed = calculate_gamma_delta(
                    &group,
                    &transparent(&group, a, bit_width),
                    &transparent(&group, b, bit_width),
                )?;
                let zeros = mixed.iter().filter(|c| c.alpha().is_one()).count();
                assert_eq!(zeros, usize::from(a > b), "comparing {a} and {b}");
                let gammas: Vec<_> = mixed.iter().map(|c| c.alpha().clone()).collect();
                let expected = if a > b { 0 } else { 1 };
                assert_eq!(comparison_winner(&gammas), PartyId::new(expected));
            }
        }
        Ok(())
    }

    #[test]
    fn test_five_beats_three_under_encryption() -> Result<()> {
        let mut rng = OsRng;
        let group = NamedGroup::Toy.parameters();
        let keys = [
            KeyPair::generate(&group, &mut rng),
            KeyPair::generate(&group, &mut rng),
        ];
        let joint = aggregate_public_key(&group, keys.iter().map(KeyPair::public));
        let encrypt = |value: u64, rng: &mut OsRng| -> Vec<Ciphertext> {
            to_bits(value, 8)
                .into_iter()
                .map(|bit| Ciphertext::encrypt(&group, &joint, &bit_plaintext(&group, bit), rng).0)
                .collect()
        };

        for (a, b, winner) in [(5, 3, 0), (3, 5, 1), (4, 4, 1)] {
            let mixed = calculate_gamma_delta(&group, &encrypt(a, &mut rng), &encrypt(b, &mut rng))?;
            let values: Vec<_> = mixed
                .iter()
                .map(|c| {
                    calculate_v(
                        &group,
                        c.alpha(),
                        &BigUint::one(),
                        &decryption_share(&group, c.beta(), &keys[0]),
                        &decryption_share(&group, c.beta(), &keys[1]),
                    )
                })
                .collect();
            assert_eq!(comparison_winner(&values), PartyId::new(winner));
        }
        Ok(())
    }

    #[test]
    fn test_five_versus_three_decides_at_bit_two() -> Result<()> {
        let group = NamedGroup::Toy.parameters();
        let mixed = calculate_gamma_delta(
            &group,
            &transparent(&group, 5, 8),
            &transparent(&group, 3, 8),
        )?;
        // e = [9, 16, 0, 1, 1, 1, 1, 1]
        let exponents = [9u32, 16, 0, 1, 1, 1, 1, 1];
        for (c, e) in mixed.iter().zip(exponents) {
            assert_eq!(c.alpha(), &group.pow(group.marker(), &BigUint::from(e)));
            assert!(c.beta().is_one());
        }
        assert!(!BigUint::from(exponents[0]).is_zero());
        Ok(())
    }

    #[test]
    fn test_mismatched_lengths_are_malformed() {
        let group = NamedGroup::Toy.parameters();
        assert!(calculate_gamma_delta(
            &group,
            &transparent(&group, 1, 4),
            &transparent(&group, 1, 5)
        )
        .is_err());
    }
}
