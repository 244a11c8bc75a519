//! Rejoin grace wait and state reset
//!
//! A rejoin is a state transition, not a call: the coordinator reports
//! [`PostJoinOutcome::Rejoin`](crate::PostJoinOutcome::Rejoin) and the outer
//! join loop resets the node and runs discovery again. The joiner stack never
//! grows across cycles.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::JoinConfig;
use crate::error::Interrupted;
use crate::node::NodeState;
use crate::traits::ClusterManager;

/// Fixed grace wait before restarting the join sequence
#[derive(Clone, Debug)]
pub struct RejoinScheduler {
    grace_period: Duration,
}

impl RejoinScheduler {
    /// Create a scheduler with the configured grace period
    pub fn new(config: &JoinConfig) -> Self {
        Self {
            grace_period: config.rejoin_grace_period,
        }
    }

    /// Grace period waited before every rejoin
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Wait out the grace period unless `cancel` fires first
    pub async fn wait_grace(&self, cancel: &CancellationToken) -> Result<(), Interrupted> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupted),
            _ = tokio::time::sleep(self.grace_period) => Ok(()),
        }
    }

    /// Return the node and the cluster manager to their pre-join state
    pub async fn prepare_rejoin(&self, node: &NodeState, cluster: &dyn ClusterManager) {
        debug!("Preparing node {} for rejoin", node.address());

        node.reset_for_rejoin();
        if let Err(e) = cluster.reset().await {
            warn!("Failed to reset cluster state before rejoin: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_waits_the_full_grace_period() {
        let scheduler = RejoinScheduler::new(&JoinConfig::default());

        let started = Instant::now();
        scheduler
            .wait_grace(&CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_is_interrupted() {
        let scheduler = RejoinScheduler::new(&JoinConfig::default());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        assert_eq!(scheduler.wait_grace(&cancel).await, Err(Interrupted));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
