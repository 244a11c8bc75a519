//! Connectivity polling after a join is accepted

use std::sync::Arc;
use std::time::Duration;

use proven_topology::Address;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::JoinConfig;
use crate::error::Interrupted;
use crate::node::NodeState;

/// Outcome of a connectivity verification
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Connectivity {
    /// Every remote member had a live connection at the last check
    pub all_connected: bool,
    /// Checks performed
    pub checks: u32,
}

/// Polls until this node is connected to every known member
pub struct ConnectivityVerifier {
    node: Arc<NodeState>,
    interval: Duration,
    max_checks: u32,
}

impl ConnectivityVerifier {
    /// Create a verifier using the configured interval and check budget
    pub fn new(node: Arc<NodeState>, config: &JoinConfig) -> Self {
        Self {
            node,
            interval: config.connectivity_check_interval,
            max_checks: config.max_connectivity_checks,
        }
    }

    /// Poll at most `max_checks` times, one interval apart
    ///
    /// The first check happens one interval after the call. Returns as soon
    /// as a check finds every remote member connected. Each wait is raced
    /// against `cancel`.
    pub async fn verify(&self, cancel: &CancellationToken) -> Result<Connectivity, Interrupted> {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut checks = 0;
        while checks < self.max_checks {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupted),
                _ = ticker.tick() => {}
            }
            checks += 1;

            let missing = self.missing_connections();
            if missing.is_empty() {
                debug!("Connected to all members after {} checks", checks);
                return Ok(Connectivity {
                    all_connected: true,
                    checks,
                });
            }

            trace!(
                "Check {}/{}: no connection to {:?}",
                checks, self.max_checks, missing
            );
        }

        Ok(Connectivity {
            all_connected: false,
            checks,
        })
    }

    /// Remote members of the current view without a live connection
    pub fn missing_connections(&self) -> Vec<Address> {
        let view = self.node.cluster_view().snapshot();
        let connections = self.node.connections();

        view.remote_members()
            .map(|member| *member.address())
            .filter(|address| connections.get_connection(address).is_none())
            .collect()
    }
}
