//! In-memory connection registry for testing
//!
//! Nodes in the same process share a [`MemoryNetwork`]; a node is reachable
//! while its address is listening on that network. Each node keeps its own
//! [`MemoryRegistry`] of live and failed connections.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use proven_topology::Address;
use proven_transport::{Connection, ConnectionRegistry};
use tracing::{debug, info};
use uuid::Uuid;

/// Shared set of listening addresses
#[derive(Clone, Debug, Default)]
pub struct MemoryNetwork {
    listeners: Arc<DashSet<Address>>,
}

impl MemoryNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `address` accept connections
    pub fn listen(&self, address: Address) {
        debug!("Memory listener created for {}", address);
        self.listeners.insert(address);
    }

    /// Stop accepting connections on `address`
    pub fn close(&self, address: &Address) {
        debug!("Closing memory listener for {}", address);
        self.listeners.remove(address);
    }

    /// Whether `address` accepts connections
    pub fn is_listening(&self, address: &Address) -> bool {
        self.listeners.contains(address)
    }
}

/// Memory connection implementation
#[derive(Debug)]
pub struct MemoryConnection {
    id: Uuid,
    endpoint: Address,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn new(endpoint: Address) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint,
            closed: AtomicBool::new(false),
        }
    }

    /// Connection ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Connection for MemoryConnection {
    fn endpoint(&self) -> &Address {
        &self.endpoint
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

/// Per-node registry of connections over a [`MemoryNetwork`]
#[derive(Debug)]
pub struct MemoryRegistry {
    local: Address,
    network: MemoryNetwork,
    connections: DashMap<Address, Arc<MemoryConnection>>,
    failed: DashSet<Address>,
    connect_attempts: AtomicUsize,
}

impl MemoryRegistry {
    /// Create a registry for the node at `local`
    pub fn new(local: Address, network: MemoryNetwork) -> Self {
        Self {
            local,
            network,
            connections: DashMap::new(),
            failed: DashSet::new(),
            connect_attempts: AtomicUsize::new(0),
        }
    }

    /// Address of the owning node
    pub fn local_address(&self) -> &Address {
        &self.local
    }

    /// Number of outbound connection attempts made so far
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Record a connection opened by the remote side
    pub fn accept(&self, remote: Address) {
        info!("{} accepted memory connection from {}", self.local, remote);
        self.failed.remove(&remote);
        self.connections
            .insert(remote, Arc::new(MemoryConnection::new(remote)));
    }

    /// Drop the connection to `address`, if any
    pub fn disconnect(&self, address: &Address) {
        if let Some((_, conn)) = self.connections.remove(address) {
            debug!("Closing memory connection {} to {}", conn.id, address);
            conn.close();
        }
    }

    /// Mark `address` as failed without attempting to connect
    pub fn mark_failed(&self, address: Address) {
        self.disconnect(&address);
        self.failed.insert(address);
    }
}

#[async_trait]
impl ConnectionRegistry for MemoryRegistry {
    async fn get_or_connect(&self, address: &Address) -> Option<Arc<dyn Connection>> {
        if let Some(conn) = self.get_connection(address) {
            return Some(conn);
        }

        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        debug!("Connecting to memory node {}", address);

        if !self.network.is_listening(address) {
            debug!("No listener for memory node {}", address);
            self.failed.insert(*address);
            return None;
        }

        let conn = Arc::new(MemoryConnection::new(*address));
        self.connections.insert(*address, conn.clone());
        self.failed.remove(address);

        info!("Memory connection established to {}", address);

        Some(conn)
    }

    fn get_connection(&self, address: &Address) -> Option<Arc<dyn Connection>> {
        self.connections
            .get(address)
            .filter(|conn| conn.is_alive())
            .map(|conn| conn.value().clone() as Arc<dyn Connection>)
    }

    fn failed_connections(&self) -> HashSet<Address> {
        self.failed.iter().map(|address| *address).collect()
    }
}
