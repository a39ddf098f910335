// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The `RoundGate` type for parking inbound messages until their round opens.
//!
//! [`RoundGate`] keeps one inbox per round number. The transport calls
//! [`RoundGate::deliver`] from any thread as messages arrive, in whatever
//! order the network produced them; the protocol thread calls
//! [`RoundGate::collect`] once per round and blocks until every expected
//! sender's message for that round is present. A message for a later round
//! is parked in its own inbox and never folded into an earlier one.
//!
//! Nothing is delivered before [`RoundGate::mark_ready`] has been called, so
//! a fast peer cannot race ahead of this party's own setup.

use crate::{
    errors::{InternalError, Result},
    messages::Message,
    protocol::PartyId,
};
use std::{
    collections::BTreeMap,
    sync::{Condvar, Mutex, MutexGuard},
};
use tracing::{debug, error, trace};

#[derive(Default)]
struct GateState {
    ready: bool,
    halted: bool,
    /// Rounds below this number have been collected.
    next_round: u32,
    inboxes: BTreeMap<u32, BTreeMap<PartyId, Vec<u8>>>,
}

/// Per-party inbound message buffer keyed by round number.
pub struct RoundGate {
    owner: PartyId,
    party_count: usize,
    state: Mutex<GateState>,
    changed: Condvar,
}

impl RoundGate {
    /// Create the gate of party `owner` in a run of `party_count` parties.
    pub fn new(owner: PartyId, party_count: usize) -> Self {
        Self {
            owner,
            party_count,
            state: Mutex::new(GateState {
                next_round: 1,
                ..Default::default()
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, GateState>> {
        self.state.lock().map_err(|_| {
            error!("Round gate of {} was poisoned", self.owner);
            InternalError::InternalInvariantFailed
        })
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, GateState>) -> Result<MutexGuard<'a, GateState>> {
        self.changed.wait(guard).map_err(|_| {
            error!("Round gate of {} was poisoned", self.owner);
            InternalError::InternalInvariantFailed
        })
    }

    /// Open the gate once local setup is done.
    pub fn mark_ready(&self) -> Result<()> {
        self.lock()?.ready = true;
        self.changed.notify_all();
        Ok(())
    }

    /// Stop the run: every blocked and future call fails with
    /// [`InternalError::Halted`].
    pub fn halt(&self) {
        // A poisoned lock still holds the flag we need to set.
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.halted = true;
        drop(state);
        self.changed.notify_all();
    }

    /// Whether [`RoundGate::halt`] has been called.
    pub fn is_halted(&self) -> bool {
        self.lock().map(|state| state.halted).unwrap_or(true)
    }

    /// The round the owner will collect next.
    pub fn next_round(&self) -> Result<u32> {
        Ok(self.lock()?.next_round)
    }

    /// Park an inbound message in the inbox of its round.
    ///
    /// Blocks until the gate is ready. Messages for rounds that were already
    /// collected, second messages from the same sender in one round, and
    /// messages that are misaddressed or come from outside the run are
    /// rejected.
    pub fn deliver(&self, message: Message) -> Result<()> {
        message.check_recipient(self.owner)?;
        let from = message.from();
        if from == self.owner || from.index() >= self.party_count {
            error!("{} received a message from invalid sender {}", self.owner, from);
            return Err(InternalError::WrongMessageRecipient);
        }

        let mut state = self.lock()?;
        while !state.ready && !state.halted {
            state = self.wait(state)?;
        }
        if state.halted {
            return Err(InternalError::Halted);
        }
        if message.round() < state.next_round {
            error!(
                "{} received a message from {} for round {}, but is already in round {}",
                self.owner,
                from,
                message.round(),
                state.next_round
            );
            return Err(InternalError::StaleMessage);
        }
        if message.round() > state.next_round {
            debug!(
                "{} parked a message from {} for round {} while in round {}",
                self.owner,
                from,
                message.round(),
                state.next_round
            );
        }
        let round = message.round();
        let inbox = state.inboxes.entry(round).or_default();
        if inbox.contains_key(&from) {
            error!(
                "{} received a second message from {} for round {}",
                self.owner, from, round
            );
            return Err(InternalError::DuplicateMessage);
        }
        let _ = inbox.insert(from, message.unverified_bytes);
        trace!("{} stored a message from {} for round {}", self.owner, from, round);
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    /// Block until every party in `expected` delivered its message for
    /// `round`, then return those messages ordered by sender.
    ///
    /// Rounds must be collected in increasing order.
    pub fn collect(&self, round: u32, expected: &[PartyId]) -> Result<Vec<(PartyId, Vec<u8>)>> {
        let mut state = self.lock()?;
        if round != state.next_round {
            error!(
                "{} tried to collect round {} while in round {}",
                self.owner, round, state.next_round
            );
            return Err(InternalError::InternalInvariantFailed);
        }
        loop {
            if state.halted {
                return Err(InternalError::Halted);
            }
            let complete = state
                .inboxes
                .get(&round)
                .map(|inbox| expected.iter().all(|p| inbox.contains_key(p)))
                .unwrap_or(expected.is_empty());
            if complete {
                break;
            }
            state = self.wait(state)?;
        }

        let inbox = state.inboxes.remove(&round).unwrap_or_default();
        state.next_round = round + 1;
        drop(state);

        if let Some(unexpected) = inbox.keys().find(|p| !expected.contains(p)) {
            error!(
                "{} received a message from {} that was not expected in round {}",
                self.owner, unexpected, round
            );
            return malformed!("message from an unexpected sender");
        }
        debug!("{} collected {} messages for round {}", self.owner, inbox.len(), round);
        Ok(inbox.into_iter().collect())
    }
}
