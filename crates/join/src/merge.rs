//! Split-brain merge decision
//!
//! When discovery hears a join announcement from a node outside our cluster,
//! two independently formed clusters exist. The smaller one merges into the
//! larger one; on equal sizes the address hashes decide, so exactly one side
//! initiates the merge.

use std::cmp::Ordering;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::announcement::JoinAnnouncement;
use crate::error::{JoinError, JoinResult};
use crate::node::NodeState;
use crate::queue::panic_message;
use crate::traits::JoinValidator;

/// Why a merge was chosen
enum MergeReason {
    /// Remote cluster has more members
    LargerCluster { remote: usize, local: usize },
    /// Equal sizes, our address hashes higher
    HashTieBreak { local_hash: i32, remote_hash: i32 },
}

impl fmt::Display for MergeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeReason::LargerCluster { remote, local } => {
                write!(f, "remote member count {remote} > local member count {local}")
            }
            MergeReason::HashTieBreak {
                local_hash,
                remote_hash,
            } => write!(
                f,
                "equal member counts, local address hash {local_hash} > remote address hash {remote_hash}"
            ),
        }
    }
}

/// Decides whether this node should merge into a remote cluster
pub struct MergeDecisionEngine {
    node: Arc<NodeState>,
    validator: Arc<dyn JoinValidator>,
}

impl MergeDecisionEngine {
    /// Create a new merge decision engine
    pub fn new(node: Arc<NodeState>, validator: Arc<dyn JoinValidator>) -> Self {
        Self { node, validator }
    }

    /// Whether this node should merge into the announcing node's cluster
    ///
    /// Fail-closed: a missing or invalid announcement, or any failure while
    /// deciding, yields `false`. Never panics into the caller.
    pub fn should_merge(&self, announcement: Option<&JoinAnnouncement>) -> bool {
        let Some(announcement) = announcement else {
            return false;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| self.decide(announcement))) {
            Ok(Ok(merge)) => merge,
            Ok(Err(e)) => {
                error!(
                    "Merge decision for join request from {} failed: {}",
                    announcement.address, e
                );
                false
            }
            Err(panic) => {
                error!(
                    "Merge decision for join request from {} panicked: {}",
                    announcement.address,
                    panic_message(panic.as_ref())
                );
                false
            }
        }
    }

    fn decide(&self, announcement: &JoinAnnouncement) -> JoinResult<bool> {
        if !self.is_valid(announcement) {
            return Ok(false);
        }

        // One snapshot for the membership scan and the size comparison
        let view = self.node.cluster_view().snapshot();

        if view.contains(&announcement.address) {
            return Ok(false);
        }

        if view.is_empty() {
            return Err(JoinError::Internal(format!(
                "cluster view of {} is empty",
                self.node.address()
            )));
        }

        let local_count = view.size();
        let reason = match announcement.member_count.cmp(&local_count) {
            Ordering::Greater => MergeReason::LargerCluster {
                remote: announcement.member_count,
                local: local_count,
            },
            Ordering::Equal => {
                let local_hash = self.node.address().stable_hash();
                let remote_hash = announcement.address.stable_hash();
                if local_hash <= remote_hash {
                    return Ok(false);
                }
                MergeReason::HashTieBreak {
                    local_hash,
                    remote_hash,
                }
            }
            Ordering::Less => return Ok(false),
        };

        trace!(
            "{} merging because {}: {}",
            self.node.address(),
            reason,
            announcement
        );

        Ok(true)
    }

    fn is_valid(&self, announcement: &JoinAnnouncement) -> bool {
        match self.validator.validate(announcement) {
            Ok(valid) => valid,
            Err(e) => {
                debug!(
                    "Join request from {} failed validation: {}",
                    announcement.address, e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proven_topology::{Address, ClusterView, Member, SharedClusterView};
    use proven_transport_memory::{MemoryNetwork, MemoryRegistry};

    use crate::error::ValidationError;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn accept_all() -> Arc<dyn JoinValidator> {
        Arc::new(|_: &JoinAnnouncement| Ok::<bool, ValidationError>(true))
    }

    /// Node at `local` whose view holds `local` plus `remotes`
    fn engine(
        local: &str,
        remotes: &[&str],
        validator: Arc<dyn JoinValidator>,
    ) -> MergeDecisionEngine {
        let local = addr(local);
        let mut members = vec![Member::local(local)];
        members.extend(remotes.iter().map(|r| Member::remote(addr(r))));

        let node = NodeState::new(
            local,
            SharedClusterView::new(ClusterView::new(members).unwrap()),
            Arc::new(MemoryRegistry::new(local, MemoryNetwork::new())),
        );

        MergeDecisionEngine::new(Arc::new(node), validator)
    }

    #[test]
    fn test_missing_announcement_never_merges() {
        let engine = engine("10.0.0.1:5701", &[], accept_all());
        assert!(!engine.should_merge(None));
    }

    #[test]
    fn test_larger_remote_cluster_merges() {
        let engine = engine(
            "10.0.0.1:5701",
            &["10.0.0.2:5701", "10.0.0.3:5701"],
            accept_all(),
        );
        let announcement = JoinAnnouncement::new(addr("10.0.1.1:5701"), 5);

        assert!(engine.should_merge(Some(&announcement)));
    }

    #[test]
    fn test_smaller_remote_cluster_does_not_merge() {
        let engine = engine(
            "10.0.0.1:5701",
            &["10.0.0.2:5701", "10.0.0.3:5701"],
            accept_all(),
        );
        let announcement = JoinAnnouncement::new(addr("10.0.1.1:5701"), 2);

        assert!(!engine.should_merge(Some(&announcement)));
    }

    #[test]
    fn test_existing_member_never_merges() {
        let engine = engine(
            "10.0.0.1:5701",
            &["10.0.0.2:5701", "10.0.0.3:5701"],
            accept_all(),
        );
        let announcement = JoinAnnouncement::new(addr("10.0.0.2:5701"), 50);

        assert!(!engine.should_merge(Some(&announcement)));
    }

    #[test]
    fn test_rejected_announcement_never_merges() {
        let reject: Arc<dyn JoinValidator> =
            Arc::new(|_: &JoinAnnouncement| Ok::<bool, ValidationError>(false));
        let engine = engine("10.0.0.1:5701", &[], reject);
        let announcement = JoinAnnouncement::new(addr("10.0.1.1:5701"), 50);

        assert!(!engine.should_merge(Some(&announcement)));
    }

    #[test]
    fn test_failing_validator_counts_as_invalid() {
        let failing: Arc<dyn JoinValidator> = Arc::new(|_: &JoinAnnouncement| {
            Err::<bool, _>(ValidationError("group name mismatch".to_string()))
        });
        let engine = engine("10.0.0.1:5701", &[], failing);
        let announcement = JoinAnnouncement::new(addr("10.0.1.1:5701"), 50);

        assert!(!engine.should_merge(Some(&announcement)));
    }

    #[test]
    fn test_panicking_validator_is_contained() {
        let panicking: Arc<dyn JoinValidator> =
            Arc::new(|_: &JoinAnnouncement| -> Result<bool, ValidationError> {
                panic!("validator bug")
            });
        let engine = engine("10.0.0.1:5701", &[], panicking);
        let announcement = JoinAnnouncement::new(addr("10.0.1.1:5701"), 50);

        assert!(!engine.should_merge(Some(&announcement)));
    }

    #[test]
    fn test_empty_view_fails_closed() {
        let local = addr("10.0.0.1:5701");
        let node = NodeState::new(
            local,
            SharedClusterView::default(),
            Arc::new(MemoryRegistry::new(local, MemoryNetwork::new())),
        );
        let engine = MergeDecisionEngine::new(Arc::new(node), accept_all());
        let announcement = JoinAnnouncement::new(addr("10.0.1.1:5701"), 0);

        assert!(!engine.should_merge(Some(&announcement)));
    }

    #[test]
    fn test_equal_size_tie_break_is_one_sided() {
        let a = "10.0.0.1:5701";
        let b = "10.0.0.2:5701";
        assert_ne!(addr(a).stable_hash(), addr(b).stable_hash());

        let from_a = engine(a, &["10.0.0.3:5701", "10.0.0.4:5701"], accept_all())
            .should_merge(Some(&JoinAnnouncement::new(addr(b), 3)));
        let from_b = engine(b, &["10.0.0.5:5701", "10.0.0.6:5701"], accept_all())
            .should_merge(Some(&JoinAnnouncement::new(addr(a), 3)));

        assert!(from_a ^ from_b, "exactly one side must merge");
        // The higher hash merges
        assert_eq!(from_b, addr(b).stable_hash() > addr(a).stable_hash());
    }

    #[test]
    fn test_colliding_hashes_never_merge() {
        let a = "10.0.0.1:5730";
        let b = "10.0.0.2:5701";
        assert_eq!(addr(a).stable_hash(), addr(b).stable_hash());

        let from_a = engine(a, &["10.0.0.3:5701"], accept_all())
            .should_merge(Some(&JoinAnnouncement::new(addr(b), 2)));
        let from_b = engine(b, &["10.0.0.4:5701"], accept_all())
            .should_merge(Some(&JoinAnnouncement::new(addr(a), 2)));

        assert!(!from_a && !from_b);
    }
}
