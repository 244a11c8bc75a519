//! This process's view of itself

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use proven_topology::{Address, SharedClusterView};
use proven_transport::ConnectionRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Local node state
///
/// Flags are atomics: the discovery layer reads them from its own tasks
/// while the joiner task mutates them.
pub struct NodeState {
    address: Address,
    active: AtomicBool,
    master: AtomicBool,
    joined: AtomicBool,
    master_address: RwLock<Option<Address>>,
    cluster_view: SharedClusterView,
    connections: Arc<dyn ConnectionRegistry>,
    shutdown_token: CancellationToken,
}

impl NodeState {
    /// Create state for an active node that has not joined yet
    pub fn new(
        address: Address,
        cluster_view: SharedClusterView,
        connections: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        Self {
            address,
            active: AtomicBool::new(true),
            master: AtomicBool::new(false),
            joined: AtomicBool::new(false),
            master_address: RwLock::new(None),
            cluster_view,
            connections,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// This node's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Whether the process is still running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether this node holds the master role
    pub fn is_master(&self) -> bool {
        self.master.load(Ordering::SeqCst)
    }

    /// Whether this node has completed a join
    pub fn has_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }

    /// Mark the join as accepted by the master
    pub fn set_joined(&self, joined: bool) {
        self.joined.store(joined, Ordering::SeqCst);
    }

    /// Current master address, if known
    pub fn master_address(&self) -> Option<Address> {
        *self.master_address.read()
    }

    /// Record the master discovery pointed at
    pub fn set_master_address(&self, master: Option<Address>) {
        *self.master_address.write() = master;
    }

    /// Take the master role
    ///
    /// The master is trivially a member of its own cluster, so this also marks
    /// the node joined.
    pub fn set_as_master(&self) {
        info!("Node {} is now master", self.address);
        self.set_master_address(Some(self.address));
        self.master.store(true, Ordering::SeqCst);
        self.joined.store(true, Ordering::SeqCst);
    }

    /// Clear role and join flags before restarting the join sequence
    pub fn reset_for_rejoin(&self) {
        debug!("Resetting join state of node {}", self.address);
        self.master.store(false, Ordering::SeqCst);
        self.joined.store(false, Ordering::SeqCst);
        self.set_master_address(None);
    }

    /// Shared handle to the current cluster view
    pub fn cluster_view(&self) -> &SharedClusterView {
        &self.cluster_view
    }

    /// Connection registry
    pub fn connections(&self) -> &Arc<dyn ConnectionRegistry> {
        &self.connections
    }

    /// Token cancelled when the node shuts down
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// Stop the node; pending waits observe the cancelled token
    pub fn shutdown(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("Shutting down node {}", self.address);
        }
        self.shutdown_token.cancel();
    }
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeState")
            .field("address", &self.address)
            .field("active", &self.is_active())
            .field("master", &self.is_master())
            .field("joined", &self.has_joined())
            .field("master_address", &self.master_address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proven_topology::ClusterView;
    use proven_transport_memory::{MemoryNetwork, MemoryRegistry};

    fn node() -> NodeState {
        let address: Address = "10.0.0.1:5701".parse().unwrap();
        NodeState::new(
            address,
            SharedClusterView::new(ClusterView::single(address)),
            Arc::new(MemoryRegistry::new(address, MemoryNetwork::new())),
        )
    }

    #[test]
    fn test_new_node_is_active_and_unjoined() {
        let node = node();
        assert!(node.is_active());
        assert!(!node.is_master());
        assert!(!node.has_joined());
        assert_eq!(node.master_address(), None);
    }

    #[test]
    fn test_set_as_master_marks_joined() {
        let node = node();
        node.set_as_master();

        assert!(node.is_master());
        assert!(node.has_joined());
        assert_eq!(node.master_address(), Some(*node.address()));
    }

    #[test]
    fn test_reset_for_rejoin_clears_flags() {
        let node = node();
        node.set_as_master();
        node.reset_for_rejoin();

        assert!(!node.is_master());
        assert!(!node.has_joined());
        assert_eq!(node.master_address(), None);
        assert!(node.is_active());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let node = node();
        node.shutdown();
        node.shutdown();

        assert!(!node.is_active());
        assert!(node.shutdown_token().is_cancelled());
    }
}
