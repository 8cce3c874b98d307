//! Routing entry types

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::identity::RouterIdentity;

/// Where traffic for a destination is sent next
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NextHop {
    /// The destination is this router
    Local,
    /// Forward through a neighbouring router
    Via(RouterIdentity),
}

impl NextHop {
    /// Check if this is the self route
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }

    /// The neighbour, if any
    pub fn neighbor(&self) -> Option<&RouterIdentity> {
        match self {
            Self::Local => None,
            Self::Via(id) => Some(id),
        }
    }
}

impl Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "self"),
            Self::Via(id) => write!(f, "{}", id),
        }
    }
}

/// Reachability of one destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingEntry {
    /// The router this entry reaches
    pub destination: RouterIdentity,
    /// Next hop toward the destination
    pub next_hop: NextHop,
    /// Hop count to the destination
    pub cost: u32,
    /// Origin-owned sequence number, strictly increasing per publication
    pub sequence: u64,
    /// Round in which the entry was last refreshed
    pub round: u64,
}

impl RoutingEntry {
    /// Create the self route for a router
    pub fn local(destination: RouterIdentity, sequence: u64, round: u64) -> Self {
        Self {
            destination,
            next_hop: NextHop::Local,
            cost: 0,
            sequence,
            round,
        }
    }

    /// Create a route learned through a neighbour
    pub fn via(
        destination: RouterIdentity,
        neighbor: RouterIdentity,
        cost: u32,
        sequence: u64,
        round: u64,
    ) -> Self {
        Self {
            destination,
            next_hop: NextHop::Via(neighbor),
            cost,
            sequence,
            round,
        }
    }
}
