// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2023 Bolt Labs, Inc.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements a trait for zero-knowledge proofs.
//!
//! In more detail, this module provides a trait [`Proof`] for constructing a
//! (non-interactive) zero knowledge proof. The trait provides two methods,
//! [`Proof::prove`] and [`Proof::verify`]. The former builds a proof and the
//! latter verifies the proof was constructed correctly.
//!
//! Every proof here is made non-interactive with the Fiat-Shamir transform.
//! The statement and the prover's first messages go into a [`Transcript`]
//! labelled with the proof's name, one length-framed big-endian message per
//! integer. The challenge is 64 bytes drawn from the transcript, read as an
//! integer and reduced modulo the group order `q`.

pub(crate) mod dle;
pub(crate) mod dlk;
pub(crate) mod one_of_two;
pub(crate) mod shuffle;

use crate::errors::{InternalError, Mismatch, ProofFailure, Result};
use merlin::Transcript;
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

/// Bytes drawn from the transcript per challenge; twice the width of the
/// largest group order, so the reduction mod `q` is close to uniform.
const CHALLENGE_BYTES: usize = 64;

/// A trait for constructing zero knowledge proofs.
///
/// The associated type [`Proof::CommonInput`] denotes the data known the both
/// the prover and verifier, and the associated type [`Proof::ProverSecret`]
/// denotes the data known only to the prover.
pub(crate) trait Proof: Sized + Serialize + DeserializeOwned {
    type CommonInput;
    type ProverSecret;
    /// Constructs a zero knowledge proof over [`Proof::ProverSecret`] and
    /// [`Proof::CommonInput`].
    fn prove<R: RngCore + CryptoRng + ?Sized>(
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
        rng: &mut R,
    ) -> Result<Self>;
    /// Verifies a zero knowledge proof using the provided
    /// [`Proof::CommonInput`].
    ///
    /// On failure the error lists every equation that did not hold.
    fn verify(&self, input: &Self::CommonInput) -> Result<()>;
}

/// Running Fiat-Shamir transcript over big-endian encoded integers.
#[derive(Clone)]
pub(crate) struct Challenge {
    transcript: Transcript,
}

impl Challenge {
    /// Start a transcript for the proof system named `label`.
    pub(crate) fn new(label: &'static [u8]) -> Self {
        Self {
            transcript: Transcript::new(label),
        }
    }

    /// Absorb one integer.
    pub(crate) fn append(&mut self, value: &BigUint) -> &mut Self {
        self.transcript
            .append_message(b"element", &value.to_bytes_be());
        self
    }

    /// Absorb every integer in order.
    pub(crate) fn append_all<'a>(&mut self, values: impl IntoIterator<Item = &'a BigUint>) -> &mut Self {
        for value in values {
            self.append(value);
        }
        self
    }

    /// Absorb an index.
    pub(crate) fn append_index(&mut self, index: usize) -> &mut Self {
        self.transcript.append_u64(b"index", index as u64);
        self
    }

    /// The raw challenge, before any reduction.
    fn digest(&self) -> BigUint {
        let mut bytes = [0u8; CHALLENGE_BYTES];
        self.transcript
            .clone()
            .challenge_bytes(b"challenge", &mut bytes);
        BigUint::from_bytes_be(&bytes)
    }

    /// The challenge `H(...) mod q`.
    pub(crate) fn finish(&self, q: &BigUint) -> BigUint {
        self.digest() % q
    }
}

/// Verify one proof per statement.
///
/// Every failing index is logged, and all their failing equations are
/// returned together in one [`ProofFailure`], each check prefixed with
/// `proof[i]`. Any other error is returned as is. A malformed-message error
/// is returned if there are not exactly as many proofs as statements.
pub(crate) fn verify_each<P: Proof>(
    what: &str,
    proofs: &[P],
    inputs: impl ExactSizeIterator<Item = P::CommonInput>,
) -> Result<()> {
    if proofs.len() != inputs.len() {
        error!(
            "Got {} {} proofs for {} statements",
            proofs.len(),
            what,
            inputs.len()
        );
        return malformed!("wrong number of proofs");
    }
    let mut merged: Option<ProofFailure> = None;
    let mut other = None;
    for (i, (proof, input)) in proofs.iter().zip(inputs).enumerate() {
        match proof.verify(&input) {
            Ok(()) => {}
            Err(InternalError::FailedToVerifyProof(failure)) => {
                error!("{} proof at index {} failed: {}", what, i, failure);
                merged
                    .get_or_insert_with(|| ProofFailure {
                        proof: failure.proof,
                        mismatches: Vec::new(),
                    })
                    .mismatches
                    .extend(failure.mismatches.into_iter().map(|m| Mismatch {
                        check: format!("proof[{i}] {}", m.check),
                        ..m
                    }));
            }
            Err(e) => {
                error!("{} proof at index {} failed: {}", what, i, e);
                other.get_or_insert(e);
            }
        }
    }
    match (other, merged) {
        (Some(e), _) => Err(e),
        (None, Some(failure)) => Err(InternalError::FailedToVerifyProof(failure)),
        (None, None) => Ok(()),
    }
}
