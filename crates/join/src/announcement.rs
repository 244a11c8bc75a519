//! Join request announcement received from a remote node

use std::fmt;

use proven_topology::Address;
use serde::{Deserialize, Serialize};

/// A remote node proposing itself as a peer
///
/// Carries what the merge decision needs: who sent it and how large the
/// sender believes its own cluster is.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct JoinAnnouncement {
    /// Sender address
    pub address: Address,
    /// Member count of the sender's cluster
    pub member_count: usize,
}

impl JoinAnnouncement {
    /// Create a new announcement
    pub fn new(address: Address, member_count: usize) -> Self {
        Self {
            address,
            member_count,
        }
    }
}

impl fmt::Display for JoinAnnouncement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JoinAnnouncement {{ address: {}, member_count: {} }}",
            self.address, self.member_count
        )
    }
}
