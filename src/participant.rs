// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! This module contains [`Round`], the core trait for implementing the rounds
//! of the auction protocols, and the loop that drives a party through them.
//!
//! A round computes this party's contribution, sends it along the round's
//! [`Route`], waits for every expected peer contribution, checks each of them
//! and finally folds all contributions into the protocol state. Rounds run
//! strictly one after the other. Any error is fatal: the party logs it, halts
//! every peer through the transport and returns the error.

use crate::{
    errors::{InternalError, Result},
    messages::Message,
    protocol::{ParticipantConfig, PartyId},
    round_gate::RoundGate,
    transport::Transport,
    utils::CryptoRngCore,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{sync::Arc, thread};
use tracing::{debug, error, info, instrument};

/// Who sends a round's message to whom.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Route {
    /// Every party sends to every other party.
    Broadcast,
    /// Every party except the seller sends to the seller.
    ToSeller,
    /// Only the seller sends, to every other party.
    FromSeller,
}

impl Route {
    /// The parties this party sends to. Empty if it does not compute in
    /// this round.
    pub(crate) fn recipients(self, config: &ParticipantConfig) -> Vec<PartyId> {
        match self {
            Route::Broadcast => config.other_parties().collect(),
            Route::ToSeller if config.is_seller() => Vec::new(),
            Route::ToSeller => vec![config.seller],
            Route::FromSeller if config.is_seller() => config.other_parties().collect(),
            Route::FromSeller => Vec::new(),
        }
    }

    /// The parties this party waits for.
    pub(crate) fn expected_senders(self, config: &ParticipantConfig) -> Vec<PartyId> {
        match self {
            Route::Broadcast => config.other_parties().collect(),
            Route::ToSeller if config.is_seller() => config.other_parties().collect(),
            Route::ToSeller => Vec::new(),
            Route::FromSeller if config.is_seller() => Vec::new(),
            Route::FromSeller => vec![config.seller],
        }
    }

    /// Whether this party computes a message in this round.
    pub(crate) fn sends(self, config: &ParticipantConfig) -> bool {
        !self.recipients(config).is_empty()
    }
}

/// One round of a protocol over state `S`.
pub(crate) trait Round<S>: Send + Sync {
    /// The message this round exchanges.
    type Payload: Serialize + DeserializeOwned + Send + Sync;

    /// A short name for logging.
    fn name(&self) -> &'static str;

    fn route(&self) -> Route;

    /// Produce this party's contribution. Only called if the party sends in
    /// this round.
    fn compute(&self, state: &mut S, rng: &mut dyn CryptoRngCore) -> Result<Self::Payload>;

    /// Verify a peer's contribution against the current state.
    fn check(&self, state: &S, from: PartyId, payload: &Self::Payload) -> Result<()>;

    /// Fold every contribution of the round into the state, including this
    /// party's own if it sent one. Contributions are ordered by sender.
    fn receive(&self, state: &mut S, payloads: Vec<(PartyId, Self::Payload)>) -> Result<()>;
}

/// A [`Round`] with its payload type erased, so the rounds of a protocol can
/// be listed together.
pub(crate) trait ErasedRound<S>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the round to completion as round number `number`.
    fn execute(
        &self,
        number: u32,
        state: &mut S,
        context: &PartyContext,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<()>;
}

impl<S: Sync, R: Round<S>> ErasedRound<S> for R {
    fn name(&self) -> &'static str {
        <R as Round<S>>::name(self)
    }

    fn execute(
        &self,
        number: u32,
        state: &mut S,
        context: &PartyContext,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<()> {
        let config = context.config();
        let route = self.route();

        let own = if route.sends(config) {
            let payload = self.compute(state, rng)?;
            context.scatter(number, &route.recipients(config), &serialize!(&payload)?)?;
            Some(payload)
        } else {
            None
        };

        let inbound = context
            .gate()
            .collect(number, &route.expected_senders(config))?
            .into_iter()
            .map(|(from, bytes)| {
                let payload: R::Payload = deserialize!(&bytes).map_err(|e| {
                    error!(
                        "Could not decode the {} message from {}",
                        <R as Round<S>>::name(self),
                        from
                    );
                    e
                })?;
                Ok((from, payload))
            })
            .collect::<Result<Vec<_>>>()?;

        check_all(self, state, &inbound)?;

        let mut payloads = inbound;
        if let Some(payload) = own {
            payloads.push((config.id, payload));
        }
        payloads.sort_by_key(|(from, _)| *from);
        self.receive(state, payloads)
    }
}

/// Check every peer contribution concurrently and wait for all of them.
fn check_all<S: Sync, R: Round<S>>(
    round: &R,
    state: &S,
    inbound: &[(PartyId, R::Payload)],
) -> Result<()> {
    let results: Vec<Result<()>> = thread::scope(|scope| {
        let handles: Vec<_> = inbound
            .iter()
            .map(|(from, payload)| scope.spawn(move || round.check(state, *from, payload)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or(Err(InternalError::InternalInvariantFailed))
            })
            .collect()
    });

    let mut first_failure = None;
    for ((from, _), result) in inbound.iter().zip(results) {
        if let Err(e) = result {
            error!(
                "The {} message from {} failed its checks: {}",
                <R as Round<S>>::name(round),
                from,
                e
            );
            first_failure.get_or_insert(e);
        }
    }
    first_failure.map_or(Ok(()), Err)
}

/// Everything a party needs to take part in a run: who it is, where its
/// inbound messages arrive and how to reach the others.
#[derive(Clone)]
pub struct PartyContext {
    config: ParticipantConfig,
    gate: Arc<RoundGate>,
    transport: Arc<dyn Transport>,
}

impl PartyContext {
    /// Bundle a party's config, inbound gate and outbound transport.
    pub fn new(
        config: ParticipantConfig,
        gate: Arc<RoundGate>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            gate,
            transport,
        }
    }

    pub(crate) fn config(&self) -> &ParticipantConfig {
        &self.config
    }

    pub(crate) fn gate(&self) -> &RoundGate {
        &self.gate
    }

    /// Halt every party reachable through the transport.
    pub(crate) fn halt_all(&self) {
        self.transport.halt();
    }

    /// Send `bytes` to every recipient in parallel and wait until all of
    /// them accepted it.
    fn scatter(&self, round: u32, recipients: &[PartyId], bytes: &[u8]) -> Result<()> {
        let me = self.config.id;
        let results: Vec<Result<()>> = thread::scope(|scope| {
            let handles: Vec<_> = recipients
                .iter()
                .map(|&to| {
                    let message = Message::new(me, to, round, bytes.to_vec());
                    scope.spawn(move || self.transport.publish(message))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or(Err(InternalError::InternalInvariantFailed))
                })
                .collect()
        });
        for (to, result) in recipients.iter().zip(&results) {
            if let Err(e) = result {
                error!("{} could not send round {} to {}: {}", me, round, to, e);
            }
        }
        results.into_iter().collect()
    }
}

/// Drive a party through `rounds` in order, numbering them from 1.
///
/// On failure every party reachable through the transport is halted before
/// the error is returned.
#[instrument(skip_all, fields(party = %context.config().id))]
pub(crate) fn run_rounds<S: Sync>(
    context: &PartyContext,
    state: &mut S,
    rounds: &[Box<dyn ErasedRound<S>>],
    rng: &mut dyn CryptoRngCore,
) -> Result<()> {
    let me = context.config().id;
    context.gate().mark_ready()?;
    for (i, round) in rounds.iter().enumerate() {
        let number = i as u32 + 1;
        debug!("{} starting round {} ({})", me, number, round.name());
        if let Err(e) = round.execute(number, state, context, &mut *rng) {
            if e == InternalError::Halted {
                info!("{} was halted during round {} ({})", me, number, round.name());
            } else {
                error!(
                    "{} failed in round {} ({}): {}",
                    me,
                    number,
                    round.name(),
                    e
                );
                context.halt_all();
            }
            return Err(e);
        }
    }
    info!("{} finished all {} rounds", me, rounds.len());
    Ok(())
}
