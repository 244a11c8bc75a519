//! Join coordinator configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{JoinError, JoinResult};

/// Configuration for the join coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Time between connectivity checks after a join
    pub connectivity_check_interval: Duration,
    /// Connectivity checks before giving up and rejoining
    pub max_connectivity_checks: u32,
    /// Wait before restarting the join sequence
    pub rejoin_grace_period: Duration,
    /// Bound on the topology logging barrier
    pub topology_barrier_timeout: Duration,
    /// Join requests sent to a discovered master before failing
    pub max_master_join_attempts: u32,
    /// Time between join requests to the master
    pub master_join_retry_interval: Duration,
    /// Bound on waiting for the join loop during shutdown
    pub shutdown_timeout: Duration,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            connectivity_check_interval: Duration::from_secs(1),
            max_connectivity_checks: 100,
            rejoin_grace_period: Duration::from_secs(10),
            topology_barrier_timeout: Duration::from_secs(5),
            max_master_join_attempts: 5,
            master_join_retry_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl JoinConfig {
    /// Reject values that would stall or skip the join sequence
    pub fn validate(&self) -> JoinResult<()> {
        if self.max_connectivity_checks == 0 {
            return Err(JoinError::Configuration(
                "max_connectivity_checks must be at least 1".to_string(),
            ));
        }

        if self.max_master_join_attempts == 0 {
            return Err(JoinError::Configuration(
                "max_master_join_attempts must be at least 1".to_string(),
            ));
        }

        // tokio intervals panic on a zero period
        if self.connectivity_check_interval.is_zero() {
            return Err(JoinError::Configuration(
                "connectivity_check_interval must be non-zero".to_string(),
            ));
        }

        if self.topology_barrier_timeout.is_zero() {
            return Err(JoinError::Configuration(
                "topology_barrier_timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
