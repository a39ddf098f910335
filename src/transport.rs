// Copyright (c) 2023 Bolt Labs, Inc.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! How messages leave a party.
//!
//! A [`Transport`] delivers a [`Message`] authentically to the party named in
//! its `to` field, or fails. [`LocalNetwork`] connects parties running in one
//! process by handing each message straight to the recipient's
//! [`RoundGate`].

use crate::{
    errors::{InternalError, Result},
    messages::Message,
    protocol::PartyId,
    round_gate::RoundGate,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{error, warn};

/// An authenticated point-to-point channel to every other party.
pub trait Transport: Send + Sync {
    /// Deliver `message` to its recipient, returning once it was accepted.
    fn publish(&self, message: Message) -> Result<()>;

    /// Tell every party that the run is over because of a fatal error.
    fn halt(&self);
}

/// An in-process network connecting the [`RoundGate`]s of all parties.
#[derive(Clone)]
pub struct LocalNetwork {
    gates: Arc<BTreeMap<PartyId, Arc<RoundGate>>>,
}

impl LocalNetwork {
    /// Create a gate for every one of `party_count` parties and a network
    /// joining them.
    pub fn new(party_count: usize) -> Self {
        let gates = (0..party_count)
            .map(PartyId::new)
            .map(|id| (id, Arc::new(RoundGate::new(id, party_count))))
            .collect();
        Self {
            gates: Arc::new(gates),
        }
    }

    /// The gate holding inbound messages of party `id`.
    pub fn gate(&self, id: PartyId) -> Result<Arc<RoundGate>> {
        self.gates.get(&id).cloned().ok_or_else(|| {
            error!("{} is not connected to this network", id);
            InternalError::InvalidArgument(format!("unknown party {id}"))
        })
    }
}

impl Transport for LocalNetwork {
    fn publish(&self, message: Message) -> Result<()> {
        let gate = self.gates.get(&message.to()).ok_or_else(|| {
            error!("Cannot route a message to unknown {}", message.to());
            InternalError::WrongMessageRecipient
        })?;
        gate.deliver(message)
    }

    fn halt(&self) {
        warn!("Halting every party on the local network");
        for gate in self.gates.values() {
            gate.halt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_network_routes_by_recipient() -> Result<()> {
        let network = LocalNetwork::new(3);
        for id in 0..3 {
            network.gate(PartyId::new(id))?.mark_ready()?;
        }
        network.publish(Message::new(PartyId::new(0), PartyId::new(2), 1, vec![9]))?;
        let inbox = network.gate(PartyId::new(2))?.collect(1, &[PartyId::new(0)])?;
        assert_eq!(inbox, vec![(PartyId::new(0), vec![9])]);

        assert!(network
            .publish(Message::new(PartyId::new(0), PartyId::new(7), 1, vec![]))
            .is_err());
        assert!(network.gate(PartyId::new(3)).is_err());
        Ok(())
    }

    #[test]
    fn test_halt_reaches_every_gate() -> Result<()> {
        let network = LocalNetwork::new(2);
        network.halt();
        for id in 0..2 {
            assert!(network.gate(PartyId::new(id))?.is_halted());
        }
        Ok(())
    }
}
