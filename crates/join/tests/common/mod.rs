//! Shared fixtures for join integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use proven_join::{
    ClusterManager, Discovered, Discovery, DiscoveryMode, JoinAnnouncement, JoinError,
    JoinResult, JoinValidator, NodeState, ValidationError,
};
use proven_topology::{Address, ClusterView, Member, SharedClusterView};
use proven_transport_memory::{MemoryNetwork, MemoryRegistry};

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

/// A node wired to an in-memory network
pub struct TestNode {
    pub node: Arc<NodeState>,
    pub registry: Arc<MemoryRegistry>,
    pub network: MemoryNetwork,
}

impl TestNode {
    /// Node at `local` whose view holds `local` plus `remotes`
    pub fn new(network: &MemoryNetwork, local: &str, remotes: &[&str]) -> Self {
        let local = addr(local);
        let mut members = vec![Member::local(local)];
        members.extend(remotes.iter().map(|r| Member::remote(addr(r))));

        let registry = Arc::new(MemoryRegistry::new(local, network.clone()));
        let node = Arc::new(NodeState::new(
            local,
            SharedClusterView::new(ClusterView::new(members).unwrap()),
            registry.clone(),
        ));

        Self {
            node,
            registry,
            network: network.clone(),
        }
    }
}

/// Discovery returning scripted results, then a fixed fallback
pub struct ScriptedDiscovery {
    script: Mutex<VecDeque<JoinResult<Discovered>>>,
    fallback: Discovered,
    mode: DiscoveryMode,
    calls: AtomicUsize,
}

impl ScriptedDiscovery {
    /// Always report `master`
    pub fn master(master: Option<Address>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Discovered {
                master,
                peers: master.into_iter().collect(),
            },
            mode: DiscoveryMode::TcpIp,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_mode(mut self, mode: DiscoveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Queue a result returned before the fallback
    pub fn then(self, result: JoinResult<Discovered>) -> Self {
        self.script.lock().push_back(result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Discovery for ScriptedDiscovery {
    async fn discover(&self, _node: &NodeState) -> JoinResult<Discovered> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn mode(&self) -> DiscoveryMode {
        self.mode
    }
}

/// Cluster manager recording every call
///
/// When accepting, a join request sent to the master marks the node joined,
/// as the master's acceptance would.
pub struct RecordingClusterManager {
    node: Arc<NodeState>,
    accept_joins: AtomicBool,
    fail_finalize: AtomicBool,
    pub finalize_calls: AtomicUsize,
    pub form_calls: AtomicUsize,
    pub reset_calls: AtomicUsize,
    requests: Mutex<Vec<(Address, bool)>>,
}

impl RecordingClusterManager {
    pub fn new(node: Arc<NodeState>, accept_joins: bool) -> Self {
        Self {
            node,
            accept_joins: AtomicBool::new(accept_joins),
            fail_finalize: AtomicBool::new(false),
            finalize_calls: AtomicUsize::new(0),
            form_calls: AtomicUsize::new(0),
            reset_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail_finalize(&self, fail: bool) {
        self.fail_finalize.store(fail, Ordering::SeqCst);
    }

    /// `(address, resolve_address)` of every join request sent
    pub fn requests(&self) -> Vec<(Address, bool)> {
        self.requests.lock().clone()
    }

    pub fn finalize_calls(&self) -> usize {
        self.finalize_calls.load(Ordering::SeqCst)
    }

    pub fn form_calls(&self) -> usize {
        self.form_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterManager for RecordingClusterManager {
    async fn finalize_join(&self) -> JoinResult<()> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(JoinError::Cluster("finalize rejected".to_string()));
        }
        Ok(())
    }

    async fn form_cluster(&self) -> JoinResult<()> {
        self.form_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reset(&self) -> JoinResult<()> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_join_request(&self, address: &Address, resolve_address: bool) -> JoinResult<()> {
        self.requests.lock().push((*address, resolve_address));
        if !resolve_address && self.accept_joins.load(Ordering::SeqCst) {
            self.node.set_joined(true);
        }
        Ok(())
    }
}

pub fn accept_all() -> Arc<dyn JoinValidator> {
    Arc::new(|_: &JoinAnnouncement| Ok::<bool, ValidationError>(true))
}
