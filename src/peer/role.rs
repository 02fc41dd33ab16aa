use std::fmt;

use crate::signaling::Roster;

/// Which side of the room this client is on. Fixed once per join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// First in the room; waits for an `Init` and answers
    Creator,
    /// Found someone already there; announces itself and offers
    Joiner,
}

impl PeerRole {
    /// Empty roster: wait for a peer. Otherwise: drive the offer.
    pub fn from_roster(roster: &Roster) -> Self {
        if roster.is_empty() {
            PeerRole::Creator
        } else {
            PeerRole::Joiner
        }
    }

    pub fn is_offerer(self) -> bool {
        matches!(self, PeerRole::Joiner)
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerRole::Creator => f.write_str("creator"),
            PeerRole::Joiner => f.write_str("joiner"),
        }
    }
}
