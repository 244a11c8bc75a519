//! Outer join loop
//!
//! One `run()` is one join cycle. It owns a single [`JoinCoordinator`] and
//! restarts the join sequence from discovery every time the coordinator
//! reports [`PostJoinOutcome::Rejoin`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::broadcast::JoinRequestBroadcaster;
use crate::config::JoinConfig;
use crate::coordinator::{JoinCoordinator, PostJoinOutcome};
use crate::error::{JoinError, JoinResult};
use crate::merge::MergeDecisionEngine;
use crate::node::NodeState;
use crate::queue::ClusterTaskQueue;
use crate::traits::{ClusterManager, Discovery};

/// Joiner task of one node
///
/// Cloning yields another handle to the same service.
#[derive(Clone)]
pub struct JoinService {
    node: Arc<NodeState>,
    discovery: Arc<dyn Discovery>,
    cluster: Arc<dyn ClusterManager>,
    queue: ClusterTaskQueue,
    owns_queue: bool,
    config: JoinConfig,
    merge_engine: Arc<MergeDecisionEngine>,
    broadcaster: Arc<JoinRequestBroadcaster>,
    rejoin_cycles: Arc<AtomicU32>,
    task_tracker: TaskTracker,
    last_outcome: Arc<Mutex<Option<JoinResult<PostJoinOutcome>>>>,
}

impl JoinService {
    /// Assemble a service from its collaborators
    ///
    /// Prefer [`JoinServiceBuilder`](crate::JoinServiceBuilder), which also
    /// validates the configuration. `owns_queue` decides whether
    /// [`shutdown`](JoinService::shutdown) also stops `queue`; a queue shared
    /// with the cluster manager must outlive the join service.
    pub fn new(
        node: Arc<NodeState>,
        discovery: Arc<dyn Discovery>,
        cluster: Arc<dyn ClusterManager>,
        merge_engine: Arc<MergeDecisionEngine>,
        queue: ClusterTaskQueue,
        owns_queue: bool,
        config: JoinConfig,
    ) -> Self {
        let broadcaster = Arc::new(JoinRequestBroadcaster::new(node.clone(), cluster.clone()));

        Self {
            node,
            discovery,
            cluster,
            queue,
            owns_queue,
            config,
            merge_engine,
            broadcaster,
            rejoin_cycles: Arc::new(AtomicU32::new(0)),
            task_tracker: TaskTracker::new(),
            last_outcome: Arc::new(Mutex::new(None)),
        }
    }

    /// Run one join cycle to completion
    ///
    /// Returns the first outcome other than [`PostJoinOutcome::Rejoin`]. A
    /// master join failure is returned as an error and is not retried.
    pub async fn run(&self) -> JoinResult<PostJoinOutcome> {
        let coordinator = JoinCoordinator::new(
            self.node.clone(),
            self.discovery.clone(),
            self.cluster.clone(),
            self.queue.clone(),
            &self.config,
        );

        loop {
            let outcome = coordinator.join().await?;
            if outcome != PostJoinOutcome::Rejoin {
                info!(
                    "Join of {} ended: {} after {} attempts",
                    self.node.address(),
                    outcome,
                    coordinator.attempts()
                );
                return Ok(outcome);
            }

            let cycle = self.rejoin_cycles.fetch_add(1, Ordering::SeqCst) + 1;
            info!("Node {} starting rejoin cycle {}", self.node.address(), cycle);
            coordinator.reset_for_rejoin().await;
        }
    }

    /// Spawn [`run`](JoinService::run) in the background
    pub fn start(&self) {
        let service = self.clone();
        self.task_tracker.spawn(async move {
            let result = service.run().await;
            if let Err(e) = &result {
                error!("Join of {} failed: {}", service.node.address(), e);
            }
            *service.last_outcome.lock() = Some(result);
        });
    }

    /// Wait for a started join cycle and take its result
    ///
    /// Returns `None` if nothing was started or the result was already taken.
    pub async fn wait(&self) -> Option<JoinResult<PostJoinOutcome>> {
        self.task_tracker.close();
        self.task_tracker.wait().await;
        self.task_tracker.reopen();

        self.last_outcome.lock().take()
    }

    /// Shut the node down and stop the background join loop
    ///
    /// The cluster task queue is stopped only if this service spawned it.
    pub async fn shutdown(&self) -> JoinResult<()> {
        info!("Shutting down join service of {}", self.node.address());

        self.node.shutdown();
        self.task_tracker.close();

        let stopped = tokio::time::timeout(self.config.shutdown_timeout, self.task_tracker.wait())
            .await
            .is_ok();
        if self.owns_queue {
            self.queue.shutdown().await;
        }

        if stopped {
            Ok(())
        } else {
            warn!(
                "Join loop did not stop within {}",
                humantime::format_duration(self.config.shutdown_timeout)
            );
            Err(JoinError::Timeout(self.config.shutdown_timeout))
        }
    }

    /// Merge decision engine for the discovery layer
    pub fn merge_engine(&self) -> Arc<MergeDecisionEngine> {
        self.merge_engine.clone()
    }

    /// Join request broadcaster for the discovery layer
    pub fn broadcaster(&self) -> Arc<JoinRequestBroadcaster> {
        self.broadcaster.clone()
    }

    /// Local node state
    pub fn node(&self) -> &Arc<NodeState> {
        &self.node
    }

    /// Rejoin cycles started since the service was created
    pub fn rejoin_cycles(&self) -> u32 {
        self.rejoin_cycles.load(Ordering::SeqCst)
    }
}
