//! Collaborator interfaces consumed by the join coordinator

use std::fmt;

use async_trait::async_trait;
use proven_topology::Address;
use serde::{Deserialize, Serialize};

use crate::announcement::JoinAnnouncement;
use crate::error::{JoinResult, ValidationError};
use crate::node::NodeState;

/// How peers are located
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Broadcast-based discovery
    Multicast,
    /// Configured seed list
    TcpIp,
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryMode::Multicast => write!(f, "multicast"),
            DiscoveryMode::TcpIp => write!(f, "tcp-ip"),
        }
    }
}

/// Result of one discovery run
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Discovered {
    /// Master the responding peers agree on, if any
    pub master: Option<Address>,
    /// Candidate peer addresses
    pub peers: Vec<Address>,
}

/// Peer discovery strategy
#[async_trait]
pub trait Discovery: Send + Sync + 'static {
    /// Locate candidate peers and the current master
    async fn discover(&self, node: &NodeState) -> JoinResult<Discovered>;

    /// Discovery mode, reported in failure diagnostics
    fn mode(&self) -> DiscoveryMode;
}

/// Policy hook deciding whether a join announcement is acceptable
pub trait JoinValidator: Send + Sync + 'static {
    /// `Ok(false)` and `Err(_)` both reject the announcement
    fn validate(&self, announcement: &JoinAnnouncement) -> Result<bool, ValidationError>;
}

impl<F> JoinValidator for F
where
    F: Fn(&JoinAnnouncement) -> Result<bool, ValidationError> + Send + Sync + 'static,
{
    fn validate(&self, announcement: &JoinAnnouncement) -> Result<bool, ValidationError> {
        self(announcement)
    }
}

/// Cluster membership management
#[async_trait]
pub trait ClusterManager: Send + Sync + 'static {
    /// Commit this node as an accepted, visible member
    async fn finalize_join(&self) -> JoinResult<()>;

    /// Seed a new cluster with this node as its only member
    async fn form_cluster(&self) -> JoinResult<()>;

    /// Discard pending membership before a rejoin
    async fn reset(&self) -> JoinResult<()>;

    /// Send a join request to `address`
    ///
    /// `resolve_address` asks the receiver to reply with its own details
    /// because this node may not know it directly yet.
    async fn send_join_request(
        &self,
        address: &Address,
        resolve_address: bool,
    ) -> JoinResult<()>;
}
