// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Sealed-bid auctions and secure comparison over threshold ElGamal.
//!
//! Two protocols are provided:
//!
//! - [`run_millionaire`]: two parties learn which of them holds the strictly
//!   larger value (Yao's millionaire problem) and nothing else.
//! - [`run_first_price`]: `n` parties each bid one of a fixed set of price
//!   levels and learn the highest level and who bid it, while every other bid
//!   stays hidden.
//!
//! All values are encrypted under a joint ElGamal key that no party knows on
//! its own. Every message carries a zero-knowledge proof (knowledge of a
//! discrete log, discrete-log equality, one-of-two plaintext, or a verifiable
//! shuffle) and every party checks every proof it receives. A failed check
//! aborts the run for all parties.
//!
//! The protocols run in lockstep rounds. Each party runs on its own thread
//! with a [`PartyContext`] bundling its [`ParticipantConfig`], the
//! [`RoundGate`] its inbound messages arrive at, and a [`Transport`] to reach
//! the other parties. [`LocalNetwork`] is an in-memory transport connecting
//! parties within one process.
//!
//! ```no_run
//! use rand::rngs::OsRng;
//! use sealed_auctions::{
//!     run_millionaire, LocalNetwork, MillionaireConfig, ParticipantConfig, PartyContext,
//! };
//! use std::{sync::Arc, thread};
//!
//! let network = LocalNetwork::new(2);
//! let config = MillionaireConfig::default();
//! let handles: Vec<_> = ParticipantConfig::quorum(2)?
//!     .into_iter()
//!     .zip([5u64, 3])
//!     .map(|(participant, value)| {
//!         let network = network.clone();
//!         let config = config.clone();
//!         thread::spawn(move || {
//!             let gate = network.gate(participant.id)?;
//!             let context = PartyContext::new(participant, gate, Arc::new(network));
//!             run_millionaire(&config, &context, value, &mut OsRng)
//!         })
//!     })
//!     .collect();
//! # Ok::<(), sealed_auctions::errors::InternalError>(())
//! ```

#![allow(non_snake_case)] // FIXME: To be removed in the future
#![warn(missing_docs)]
#![cfg_attr(feature = "flame_it", feature(proc_macro_hygiene))]
#[cfg(feature = "flame_it")]
extern crate flame;
#[cfg(feature = "flame_it")]
#[macro_use]
extern crate flamer;

#[macro_use]
pub mod errors;

mod commitment;
mod comparison;
mod elgamal;
mod first_price;
mod group;
mod messages;
mod millionaire;
mod parameters;
mod participant;
mod permutation;
mod protocol;
mod round_gate;
mod serialization;
mod threshold;
mod transport;
mod utils;
mod zkp;

pub use comparison::{calculate_gamma_delta, calculate_v, comparison_winner};
pub use elgamal::{
    aggregate_public_key, combine_decryption_shares, decryption_share, Ciphertext, KeyPair,
};
pub use errors::{InternalError, Result};
pub use first_price::{run_first_price, AuctionOutcome, FirstPriceConfig};
pub use group::{GroupParameters, NamedGroup};
pub use messages::Message;
pub use millionaire::{run_millionaire, MillionaireConfig, MillionaireOutput};
pub use participant::PartyContext;
pub use protocol::{ParticipantConfig, PartyId};
pub use round_gate::RoundGate;
pub use transport::{LocalNetwork, Transport};
pub use utils::CryptoRngCore;
