// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Party identities and the static configuration of a protocol run.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use tracing::error;

/// The index of a party in the configured host list.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyId(usize);

impl PartyId {
    /// Wrap a host-list index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The host-list index of this party.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for PartyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Party({})", self.0)
    }
}

/// Who this party is and who it runs the protocol with.
///
/// Parties are identified by their index `0..party_count`. One of them is the
/// seller, which aggregates intermediate results in the rounds that are not
/// broadcast.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParticipantConfig {
    /// This party's identifier.
    pub id: PartyId,
    /// Total number of parties in the run.
    pub party_count: usize,
    /// The distinguished aggregating party.
    pub seller: PartyId,
}

impl ParticipantConfig {
    /// Create a config, checking that both `id` and `seller` are in range.
    pub fn new(id: PartyId, party_count: usize, seller: PartyId) -> Result<Self> {
        if party_count < 2 {
            error!("A protocol run needs at least two parties, got {party_count}");
            return arg_err!("a protocol run needs at least two parties");
        }
        if id.index() >= party_count || seller.index() >= party_count {
            error!(
                "Party {} or seller {} is out of range for {} parties",
                id, seller, party_count
            );
            return arg_err!("party index out of range");
        }
        Ok(Self {
            id,
            party_count,
            seller,
        })
    }

    /// The configs of every party in a run of `party_count` parties, with
    /// party 0 as the seller.
    pub fn quorum(party_count: usize) -> Result<Vec<Self>> {
        (0..party_count)
            .map(|i| Self::new(PartyId::new(i), party_count, PartyId::new(0)))
            .collect()
    }

    /// Every party in the run, in index order.
    pub fn all_parties(&self) -> impl Iterator<Item = PartyId> {
        (0..self.party_count).map(PartyId::new)
    }

    /// Every party except this one, in index order.
    pub fn other_parties(&self) -> impl Iterator<Item = PartyId> + '_ {
        self.all_parties().filter(move |&p| p != self.id)
    }

    /// Whether this party is the seller.
    pub fn is_seller(&self) -> bool {
        self.id == self.seller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_has_one_seller() -> Result<()> {
        let quorum = ParticipantConfig::quorum(4)?;
        assert_eq!(quorum.iter().filter(|c| c.is_seller()).count(), 1);
        assert_eq!(
            quorum[2].other_parties().collect::<Vec<_>>(),
            vec![PartyId::new(0), PartyId::new(1), PartyId::new(3)]
        );
        Ok(())
    }

    #[test]
    fn test_config_rejects_out_of_range_parties() {
        assert!(ParticipantConfig::new(PartyId::new(2), 2, PartyId::new(0)).is_err());
        assert!(ParticipantConfig::new(PartyId::new(0), 2, PartyId::new(5)).is_err());
        assert!(ParticipantConfig::quorum(1).is_err());
    }
}
