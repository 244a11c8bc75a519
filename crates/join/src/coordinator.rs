//! Join lifecycle orchestration
//!
//! After the master join, a node either holds the master role or must prove
//! it can reach every member before its join is committed. A node that cannot
//! reports [`PostJoinOutcome::Rejoin`] after a grace period and the caller
//! starts over. A node stuck in that loop promotes itself to master on its
//! fifth attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::JoinConfig;
use crate::error::{JoinError, JoinResult};
use crate::master::MasterJoiner;
use crate::node::NodeState;
use crate::promotion::MasterPromotionPolicy;
use crate::queue::ClusterTaskQueue;
use crate::rejoin::RejoinScheduler;
use crate::traits::{ClusterManager, Discovery};
use crate::verifier::ConnectivityVerifier;

/// How a join attempt ended
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PostJoinOutcome {
    /// Node was no longer active; nothing happened
    Inactive,
    /// Node holds the master role
    Master,
    /// Join committed after full connectivity was verified
    Finalized,
    /// Join sequence must restart from discovery
    Rejoin,
    /// Node was shut down during a wait
    Shutdown,
}

impl fmt::Display for PostJoinOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostJoinOutcome::Inactive => write!(f, "inactive"),
            PostJoinOutcome::Master => write!(f, "master"),
            PostJoinOutcome::Finalized => write!(f, "finalized"),
            PostJoinOutcome::Rejoin => write!(f, "rejoin"),
            PostJoinOutcome::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Drives one node through join, verification and finalization
///
/// Keep one coordinator across the rejoins of a join cycle: its attempt
/// counter is what eventually forces master promotion.
pub struct JoinCoordinator {
    node: Arc<NodeState>,
    cluster: Arc<dyn ClusterManager>,
    queue: ClusterTaskQueue,
    master_joiner: MasterJoiner,
    promotion: MasterPromotionPolicy,
    verifier: ConnectivityVerifier,
    rejoin: RejoinScheduler,
    barrier_timeout: Duration,
}

impl JoinCoordinator {
    /// Create a coordinator with a zeroed attempt counter
    pub fn new(
        node: Arc<NodeState>,
        discovery: Arc<dyn Discovery>,
        cluster: Arc<dyn ClusterManager>,
        queue: ClusterTaskQueue,
        config: &JoinConfig,
    ) -> Self {
        Self {
            master_joiner: MasterJoiner::new(node.clone(), discovery, cluster.clone(), config),
            promotion: MasterPromotionPolicy::new(),
            verifier: ConnectivityVerifier::new(node.clone(), config),
            rejoin: RejoinScheduler::new(config),
            barrier_timeout: config.topology_barrier_timeout,
            node,
            cluster,
            queue,
        }
    }

    /// Post-join attempts recorded by this coordinator
    pub fn attempts(&self) -> u32 {
        self.promotion.attempts()
    }

    /// Join the discovered master (or become master), then run [`post_join`]
    ///
    /// A master join failure escalates; a shutdown while waiting for the
    /// master ends in [`PostJoinOutcome::Shutdown`].
    ///
    /// [`post_join`]: JoinCoordinator::post_join
    pub async fn join(&self) -> JoinResult<PostJoinOutcome> {
        if !self.node.is_active() {
            return Ok(PostJoinOutcome::Inactive);
        }

        match self.master_joiner.join().await {
            Ok(()) => {}
            Err(JoinError::Interrupted) => return Ok(self.shutdown_node("joining master")),
            Err(e) => return Err(e),
        }

        Ok(self.post_join().await)
    }

    /// Verify and finalize the join that just completed
    pub async fn post_join(&self) -> PostJoinOutcome {
        if !self.node.is_active() {
            return PostJoinOutcome::Inactive;
        }

        let attempt = self.promotion.record_attempt();
        if self.promotion.should_promote(attempt) {
            warn!(
                "Join attempt {} reached, {} takes the master role",
                attempt,
                self.node.address()
            );
            self.node.set_as_master();
        }

        let outcome = if self.node.is_master() {
            PostJoinOutcome::Master
        } else {
            self.verify_and_finalize().await
        };

        if matches!(outcome, PostJoinOutcome::Master | PostJoinOutcome::Finalized) {
            self.topology_barrier().await;
        }

        outcome
    }

    /// Return the node and cluster manager to their pre-join state
    pub async fn reset_for_rejoin(&self) {
        self.rejoin
            .prepare_rejoin(&self.node, self.cluster.as_ref())
            .await;
    }

    async fn verify_and_finalize(&self) -> PostJoinOutcome {
        let cancel = self.node.shutdown_token();
        let joined = self.node.has_joined();

        let connectivity = if joined {
            match self.verifier.verify(cancel).await {
                Ok(connectivity) => connectivity,
                Err(_) => return self.shutdown_node("verifying connectivity"),
            }
        } else {
            Default::default()
        };

        if joined && connectivity.all_connected {
            match self.cluster.finalize_join().await {
                Ok(()) => {
                    info!("Node {} finalized its join", self.node.address());
                    return PostJoinOutcome::Finalized;
                }
                Err(e) => warn!("Failed to finalize join: {}", e),
            }
        } else {
            warn!(
                "Failed to connect, node joined={}, all connected={} to all other members after {} checks",
                joined, connectivity.all_connected, connectivity.checks
            );
        }

        warn!(
            "Rejoining after {}",
            humantime::format_duration(self.rejoin.grace_period())
        );

        match self.rejoin.wait_grace(cancel).await {
            Ok(()) => PostJoinOutcome::Rejoin,
            Err(_) => self.shutdown_node("waiting to rejoin"),
        }
    }

    /// Wait for the cluster task context to drain up to our task
    async fn topology_barrier(&self) {
        let view = self.node.cluster_view().clone();
        let address = *self.node.address();

        let barrier = self.queue.enqueue_and_wait(
            move || {
                let snapshot = view.snapshot();
                if snapshot.size() == 1 {
                    info!("Cluster topology of {}: {}", address, snapshot);
                }
            },
            self.barrier_timeout,
        );

        match barrier.await {
            Ok(()) => debug!("Topology barrier passed"),
            Err(e) => warn!("Topology barrier did not complete: {}", e),
        }
    }

    fn shutdown_node(&self, during: &str) -> PostJoinOutcome {
        error!(
            "Node {} interrupted while {}, shutting down",
            self.node.address(),
            during
        );
        self.node.shutdown();
        PostJoinOutcome::Shutdown
    }
}
