// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A list of error types which are produced during an execution of the protocol
use core::fmt::{self, Display};
use num_bigint::BigUint;
use thiserror::Error;

/// The default Result type used in this crate
pub type Result<T> = std::result::Result<T, InternalError>;

/// Represents an error in the manipulation of internal cryptographic data
#[derive(Clone, Eq, PartialEq, Error, Debug)]
#[allow(missing_docs)]
pub enum InternalError {
    #[error("Serialization Error")]
    Serialization,
    #[error("Failed to verify proof: {0}")]
    FailedToVerifyProof(ProofFailure),
    #[error("Received a malformed message: `{0}`")]
    MalformedMessage(String),
    #[error("Function call contained invalid arguments: `{0}`")]
    InvalidArgument(String),
    #[error("Value is not an element of the order-q subgroup")]
    NotInGroup,
    #[error("Represents some code assumption that was checked at runtime but failed to be true")]
    InternalInvariantFailed,
    #[error("This Participant was given a message intended for somebody else")]
    WrongMessageRecipient,
    #[error("Received a second message from the same sender for the same round")]
    DuplicateMessage,
    #[error("Received a message for a round that has already been processed")]
    StaleMessage,
    #[error("The protocol run was halted")]
    Halted,
}

/// A single failing equation found while verifying a proof.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Mismatch {
    /// Which equation (and which index, for vector proofs) failed.
    pub check: String,
    /// Hex encoding of the value the verifier recomputed.
    pub expected: String,
    /// Hex encoding of the value carried in the proof.
    pub actual: String,
}

impl Mismatch {
    pub(crate) fn new(check: impl Into<String>, expected: &BigUint, actual: &BigUint) -> Self {
        Self {
            check: check.into(),
            expected: hex::encode(expected.to_bytes_be()),
            actual: hex::encode(actual.to_bytes_be()),
        }
    }
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (expected 0x{}, got 0x{})",
            self.check, self.expected, self.actual
        )
    }
}

/// Every failing equation of one proof verification.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ProofFailure {
    /// Name of the proof system that rejected.
    pub proof: &'static str,
    /// All equations that did not hold, in check order.
    pub mismatches: Vec<Mismatch>,
}

impl ProofFailure {
    /// The labels of every failing check.
    pub fn failed_checks(&self) -> Vec<&str> {
        self.mismatches.iter().map(|m| m.check.as_str()).collect()
    }
}

impl Display for ProofFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rejected", self.proof)?;
        for (i, mismatch) in self.mismatches.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{mismatch}")?;
        }
        Ok(())
    }
}

/// Collects mismatches while a verifier walks through its equations.
pub(crate) struct VerificationReport {
    proof: &'static str,
    mismatches: Vec<Mismatch>,
}

impl VerificationReport {
    pub(crate) fn new(proof: &'static str) -> Self {
        Self {
            proof,
            mismatches: Vec::new(),
        }
    }

    /// Record a failure unless `expected == actual`.
    pub(crate) fn compare(&mut self, check: impl Into<String>, expected: &BigUint, actual: &BigUint) {
        if expected != actual {
            self.mismatches.push(Mismatch::new(check, expected, actual));
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        if self.mismatches.is_empty() {
            Ok(())
        } else {
            Err(InternalError::FailedToVerifyProof(ProofFailure {
                proof: self.proof,
                mismatches: self.mismatches,
            }))
        }
    }
}

macro_rules! serialize {
    ($x:expr) => {{
        bincode::serialize($x).or(Err(crate::errors::InternalError::Serialization))
    }};
}

macro_rules! deserialize {
    ($x:expr) => {{
        bincode::deserialize($x).or(Err(crate::errors::InternalError::Serialization))
    }};
}

macro_rules! arg_err {
    ($x:expr) => {{
        Err(crate::errors::InternalError::InvalidArgument(String::from(
            $x,
        )))
    }};
}

macro_rules! malformed {
    ($x:expr) => {{
        Err(crate::errors::InternalError::MalformedMessage(
            String::from($x),
        ))
    }};
}
