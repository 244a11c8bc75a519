//! Joining a discovered master
//!
//! Runs discovery, then either takes the master role (nobody else answered)
//! or keeps sending join requests to the discovered master until it accepts
//! this node or the attempt budget runs out.

use std::sync::Arc;
use std::time::Duration;

use proven_topology::Address;
use tracing::{debug, error, info, warn};

use crate::config::JoinConfig;
use crate::error::{JoinError, JoinResult, MasterJoinFailure};
use crate::node::NodeState;
use crate::traits::{ClusterManager, Discovered, Discovery};

/// Discovery-driven join procedure
pub struct MasterJoiner {
    node: Arc<NodeState>,
    discovery: Arc<dyn Discovery>,
    cluster: Arc<dyn ClusterManager>,
    max_attempts: u32,
    retry_interval: Duration,
}

impl MasterJoiner {
    /// Create a joiner using the configured attempt budget
    pub fn new(
        node: Arc<NodeState>,
        discovery: Arc<dyn Discovery>,
        cluster: Arc<dyn ClusterManager>,
        config: &JoinConfig,
    ) -> Self {
        Self {
            node,
            discovery,
            cluster,
            max_attempts: config.max_master_join_attempts,
            retry_interval: config.master_join_retry_interval,
        }
    }

    /// Discover the cluster and join it
    ///
    /// Returns `Ok(())` once this node is master or has been accepted by the
    /// master. `Err(JoinError::Interrupted)` means the node shut down while
    /// waiting between attempts.
    pub async fn join(&self) -> JoinResult<()> {
        let discovered = match self.discovery.discover(&self.node).await {
            Ok(discovered) => discovered,
            Err(e) => {
                warn!("Discovery failed, assuming no master: {}", e);
                Discovered::default()
            }
        };

        debug!(
            "Discovery found master {:?} among {} peers",
            discovered.master,
            discovered.peers.len()
        );

        match discovered.master {
            Some(master) if master != *self.node.address() => self.join_master(master).await,
            _ => {
                self.become_master().await;
                Ok(())
            }
        }
    }

    async fn become_master(&self) {
        info!(
            "No master found, {} forms a new cluster",
            self.node.address()
        );

        self.node.set_as_master();
        if let Err(e) = self.cluster.form_cluster().await {
            error!("Failed to form cluster: {}", e);
        }
    }

    async fn join_master(&self, master: Address) -> JoinResult<()> {
        self.node.set_master_address(Some(master));
        let connections = self.node.connections();
        let cancel = self.node.shutdown_token();

        for attempt in 1..=self.max_attempts {
            if self.node.has_joined() {
                return Ok(());
            }

            debug!(
                "Joining master {} (attempt {}/{})",
                master, attempt, self.max_attempts
            );

            if connections.get_or_connect(&master).await.is_some() {
                if let Err(e) = self.cluster.send_join_request(&master, false).await {
                    debug!("Join request to master {} failed: {}", master, e);
                }
            }

            if self.node.has_joined() {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JoinError::Interrupted),
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }

        if self.node.has_joined() {
            return Ok(());
        }

        Err(JoinError::FailedJoiningToMaster(Box::new(
            self.failure_report(master),
        )))
    }

    fn failure_report(&self, master: Address) -> MasterJoinFailure {
        MasterJoinFailure {
            address: *self.node.address(),
            master_address: self.node.master_address().or(Some(master)),
            discovery_mode: self.discovery.mode(),
            connection: self
                .node
                .connections()
                .get_connection(&master)
                .map(|connection| format!("{connection:?}")),
            attempts: self.max_attempts,
        }
    }
}
