// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Protocol parameter definitions.
//!
//! The group itself is chosen through
//! [`GroupParameters`](crate::group::GroupParameters); this module only fixes
//! the protocol shapes that do not depend on the group.
//!
//! ## References
//! 1. More Modular Exponential (MODP) Diffie-Hellman groups for Internet Key
//!    Exchange (IKE), RFC 3526.
//! 2. F. Brandt. Fully Private Auctions in a Constant Number of Rounds.
//!    Financial Cryptography 2003.

/// Number of bits of a bid in the Millionaire comparison when none is
/// configured.
pub(crate) const DEFAULT_BIT_WIDTH: usize = 32;

/// Number of price levels in the first-price auction when none is configured.
pub(crate) const DEFAULT_PRICE_LEVELS: usize = 27;

/// Domain separator used when deriving the shuffle commitment key.
///
/// Both prover and verifier hash this tag together with a generator index to
/// obtain the commitment generators, so nobody knows their relative discrete
/// logarithms.
pub(crate) const COMMITMENT_KEY_TAG: &[u8] = b"sealed-auctions shuffle commitment key";

/// Width in bytes of the integer framing used when hashing indices.
pub(crate) const INDEX_BYTES: usize = 8;
