//! Simple error types for topology operations

use thiserror::Error as ThisError;

use crate::Address;

/// Topology-related errors
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum TopologyError {
    /// Two members of one view share an address
    #[error("Duplicate member address: {0}")]
    DuplicateMember(Address),

    /// Address could not be parsed
    #[error("Invalid address '{input}': {reason}")]
    InvalidAddress {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },
}
