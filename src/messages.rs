// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Contains the functions and definitions for dealing with messages that are
//! passed between participants, and the payloads carried by each round.

use crate::{
    elgamal::Ciphertext,
    errors::{InternalError, Result},
    protocol::PartyId,
    zkp::{dle::DleProof, dlk::DlkProof, one_of_two::OneOfTwoProof, shuffle::ShuffleProof},
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{error, instrument, trace};

/// A message that can be posted to (and read from) the communication channel.
#[derive(Clone, Serialize, Deserialize)]
pub struct Message {
    /// Which participant this message is coming from.
    from: PartyId,
    /// Which participant this message is addressed to.
    to: PartyId,
    /// The 1-based round this message belongs to.
    round: u32,
    /// The serialized round payload, which still needs to be checked.
    pub(crate) unverified_bytes: Vec<u8>,
}

impl Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("round", &self.round)
            .field("bytes", &self.unverified_bytes.len())
            .finish()
    }
}

impl Message {
    /// Creates a new instance of [`Message`] from an already serialized
    /// payload.
    ///
    /// Transports that carry messages over their own wire use this to rebuild
    /// them on the receiving side.
    #[instrument(skip_all)]
    pub fn new(from: PartyId, to: PartyId, round: u32, unverified_bytes: Vec<u8>) -> Self {
        trace!("New message created.");
        Self {
            from,
            to,
            round,
            unverified_bytes,
        }
    }

    /// The participant that sent this message.
    pub fn from(&self) -> PartyId {
        self.from
    }

    /// The participant that should receive this message.
    pub fn to(&self) -> PartyId {
        self.to
    }

    /// The round this message belongs to.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Check that the message was addressed to `recipient`.
    pub(crate) fn check_recipient(&self, recipient: PartyId) -> Result<()> {
        if self.to != recipient {
            error!(
                "A message was misrouted. Expected {}, Got {}",
                recipient, self.to
            );
            return Err(InternalError::WrongMessageRecipient);
        }
        Ok(())
    }
}

/// Round 1 of both protocols: a party's ElGamal public key and a proof of
/// knowledge of its private key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Key {
    #[serde(with = "crate::serialization::bytes")]
    pub(crate) public_key: BigUint,
    pub(crate) proof: DlkProof,
}

/// A bit-wise (or level-wise) encrypted bid with one-of-two proofs that each
/// entry encrypts `1` or the marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AlphaBeta {
    #[serde(with = "crate::serialization::bytes_vec")]
    pub(crate) alphas: Vec<BigUint>,
    #[serde(with = "crate::serialization::bytes_vec")]
    pub(crate) betas: Vec<BigUint>,
    pub(crate) proofs: Vec<OneOfTwoProof>,
}

impl AlphaBeta {
    pub(crate) fn ciphertexts(&self) -> Vec<Ciphertext> {
        crate::elgamal::join(&self.alphas, &self.betas)
    }

    /// Check that there is exactly one proof per ciphertext and `expected`
    /// entries in total.
    pub(crate) fn check_shape(&self, expected: usize) -> Result<()> {
        if self.alphas.len() != expected
            || self.betas.len() != expected
            || self.proofs.len() != expected
        {
            error!(
                "Expected {} encrypted entries, got {} alphas, {} betas and {} proofs",
                expected,
                self.alphas.len(),
                self.betas.len(),
                self.proofs.len()
            );
            return malformed!("encrypted bid has the wrong length");
        }
        Ok(())
    }
}

/// A shuffled gamma/delta vector and the proof that it is a shuffle of the
/// previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MixedOutput {
    #[serde(with = "crate::serialization::bytes_vec")]
    pub(crate) gammas: Vec<BigUint>,
    #[serde(with = "crate::serialization::bytes_vec")]
    pub(crate) deltas: Vec<BigUint>,
    pub(crate) proof: ShuffleProof,
}

impl MixedOutput {
    pub(crate) fn ciphertexts(&self) -> Vec<Ciphertext> {
        crate::elgamal::join(&self.gammas, &self.deltas)
    }
}

/// Gamma/delta entries raised to a party's secret random exponent, with one
/// discrete-log equality proof per entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RandomizedOutput {
    #[serde(with = "crate::serialization::bytes_vec")]
    pub(crate) gammas: Vec<BigUint>,
    #[serde(with = "crate::serialization::bytes_vec")]
    pub(crate) deltas: Vec<BigUint>,
    pub(crate) proofs: Vec<DleProof>,
}

impl RandomizedOutput {
    pub(crate) fn check_shape(&self, expected: usize) -> Result<()> {
        if self.gammas.len() != expected
            || self.deltas.len() != expected
            || self.proofs.len() != expected
        {
            error!(
                "Expected {} randomized entries, got {} gammas, {} deltas and {} proofs",
                expected,
                self.gammas.len(),
                self.deltas.len(),
                self.proofs.len()
            );
            return malformed!("randomized output has the wrong length");
        }
        Ok(())
    }
}

/// A party's decryption shares, each with a proof that it used the private
/// key behind its published public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DecryptionInfo {
    #[serde(with = "crate::serialization::bytes_vec")]
    pub(crate) phis: Vec<BigUint>,
    pub(crate) proofs: Vec<DleProof>,
}

impl DecryptionInfo {
    pub(crate) fn check_shape(&self, expected: usize) -> Result<()> {
        if self.phis.len() != expected || self.proofs.len() != expected {
            error!(
                "Expected {} decryption shares, got {} shares and {} proofs",
                expected,
                self.phis.len(),
                self.proofs.len()
            );
            return malformed!("decryption info has the wrong length");
        }
        Ok(())
    }
}

/// A first-price bid: the level-wise encryption plus a proof that exactly one
/// level holds the marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BidVector {
    pub(crate) levels: AlphaBeta,
    pub(crate) sum_proof: DleProof,
}

/// The seller's announcement of a first-price auction outcome, carrying
/// every party's decryption shares so bidders can check the outcome
/// themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AuctionResult {
    pub(crate) winner: PartyId,
    pub(crate) price: usize,
    pub(crate) shares: Vec<(PartyId, DecryptionInfo)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_recipient() {
        let message = Message::new(PartyId::new(1), PartyId::new(0), 3, vec![1, 2, 3]);
        assert!(message.check_recipient(PartyId::new(0)).is_ok());
        assert_eq!(
            message.check_recipient(PartyId::new(2)),
            Err(InternalError::WrongMessageRecipient)
        );
        assert_eq!(message.round(), 3);
    }

    #[test]
    fn test_shape_checks() {
        let info = DecryptionInfo {
            phis: vec![BigUint::from(1u32); 3],
            proofs: vec![],
        };
        assert!(matches!(
            info.check_shape(3),
            Err(InternalError::MalformedMessage(_))
        ));
        let bid = AlphaBeta {
            alphas: vec![BigUint::from(1u32); 2],
            betas: vec![BigUint::from(1u32); 2],
            proofs: vec![],
        };
        assert!(bid.check_shape(2).is_err());
        assert!(bid.check_shape(0).is_err());
    }
}
