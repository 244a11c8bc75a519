//! Error types for the join coordinator

use std::fmt;
use std::time::Duration;

use proven_topology::{Address, TopologyError};
use proven_transport::TransportError;
use thiserror::Error;

use crate::traits::DiscoveryMode;

/// Result type for join operations
pub type JoinResult<T> = Result<T, JoinError>;

/// Join operation errors
#[derive(Debug, Error)]
pub enum JoinError {
    /// Join request validation hook failed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Discovery could not complete
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Attempts to reach a discovered master were exhausted
    #[error("{0}")]
    FailedJoiningToMaster(Box<MasterJoinFailure>),

    /// A wait was cancelled by node shutdown
    #[error("Interrupted by shutdown")]
    Interrupted,

    /// Timeout
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Cluster task queue is no longer running
    #[error("Cluster task queue closed")]
    QueueClosed,

    /// Cluster manager reported a failure
    #[error("Cluster error: {0}")]
    Cluster(String),

    /// Invalid configuration or missing collaborator
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Topology error
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Inconsistent local state
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure raised by a join request validation hook
#[derive(Clone, Debug, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// A wait was cancelled because the node is shutting down
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("Interrupted by shutdown")]
pub struct Interrupted;

impl From<Interrupted> for JoinError {
    fn from(_: Interrupted) -> Self {
        JoinError::Interrupted
    }
}

/// Operator report for a node that could not reach its discovered master
#[derive(Clone, Debug)]
pub struct MasterJoinFailure {
    /// This node's address
    pub address: Address,
    /// The master discovery pointed at
    pub master_address: Option<Address>,
    /// How the master was discovered
    pub discovery_mode: DiscoveryMode,
    /// Connection to the master at the time of failure, if any
    pub connection: Option<String>,
    /// Join attempts made
    pub attempts: u32,
}

impl fmt::Display for MasterJoinFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let master = self
            .master_address
            .map_or_else(|| "none".to_string(), |a| a.to_string());
        let connection = self.connection.as_deref().unwrap_or("none");

        writeln!(f)?;
        writeln!(f, "===========================")?;
        writeln!(
            f,
            "Couldn't connect to discovered master! attempts: {}",
            self.attempts
        )?;
        writeln!(f, "address: {}", self.address)?;
        writeln!(f, "master address: {master}")?;
        writeln!(f, "discovery mode: {}", self.discovery_mode)?;
        writeln!(f, "connection: {connection}")?;
        writeln!(f, "===========================")
    }
}
