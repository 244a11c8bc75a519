//! Cluster member record

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Address;

/// A participant of the cluster as seen from this process
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Member {
    address: Address,
    local: bool,
}

impl Member {
    /// Create a new member record
    pub fn new(address: Address, local: bool) -> Self {
        Self { address, local }
    }

    /// Record for this process itself
    pub fn local(address: Address) -> Self {
        Self::new(address, true)
    }

    /// Record for another node
    pub fn remote(address: Address) -> Self {
        Self::new(address, false)
    }

    /// Get the address of this member
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Whether this record is the local process
    pub fn is_local(&self) -> bool {
        self.local
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Member [{}]", self.address)?;
        if self.local {
            write!(f, " this")?;
        }
        Ok(())
    }
}
