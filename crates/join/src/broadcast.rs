//! Opportunistic join request broadcasting
//!
//! Called by discovery while it searches for peers. If some connection
//! attempts have failed, a peer we cannot reach directly may still be able to
//! reach us; a join request flagged for address resolution asks it to reply
//! with its details.

use std::sync::Arc;

use futures::future::join_all;
use proven_topology::Address;
use tracing::{debug, trace};

use crate::node::NodeState;
use crate::traits::ClusterManager;

/// Retries failed peers and re-sends join requests
pub struct JoinRequestBroadcaster {
    node: Arc<NodeState>,
    cluster: Arc<dyn ClusterManager>,
}

impl JoinRequestBroadcaster {
    /// Create a new broadcaster
    pub fn new(node: Arc<NodeState>, cluster: Arc<dyn ClusterManager>) -> Self {
        Self { node, cluster }
    }

    /// Connect to each candidate and send it a join request
    ///
    /// Does nothing unless the registry currently tracks a failed connection.
    /// Candidates are handled concurrently in no particular order; failures are
    /// logged and otherwise ignored.
    pub async fn connect_and_send_join_request<I>(&self, candidates: I)
    where
        I: IntoIterator<Item = Address>,
    {
        let connections = self.node.connections();
        if !connections.has_failed_connections() {
            trace!("No failed connections, skipping join request broadcast");
            return;
        }

        let sends = candidates.into_iter().map(|address| async move {
            if connections.get_or_connect(&address).await.is_none() {
                trace!("Could not connect to {} for join request", address);
                return;
            }

            debug!("Sending join request to {}", address);
            if let Err(e) = self.cluster.send_join_request(&address, true).await {
                debug!("Join request to {} failed: {}", address, e);
            }
        });

        join_all(sends).await;
    }
}
