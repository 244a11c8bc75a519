//! Join service builder pattern

use std::sync::Arc;

use crate::config::JoinConfig;
use crate::error::{JoinError, JoinResult};
use crate::merge::MergeDecisionEngine;
use crate::node::NodeState;
use crate::queue::ClusterTaskQueue;
use crate::service::JoinService;
use crate::traits::{ClusterManager, Discovery, JoinValidator};

/// Join service builder
pub struct JoinServiceBuilder {
    /// Local node state
    node: Arc<NodeState>,

    /// Configuration
    config: Option<JoinConfig>,

    /// Peer discovery
    discovery: Option<Arc<dyn Discovery>>,

    /// Join request validation hook
    validator: Option<Arc<dyn JoinValidator>>,

    /// Cluster membership manager
    cluster: Option<Arc<dyn ClusterManager>>,

    /// Cluster task context
    task_queue: Option<ClusterTaskQueue>,
}

impl JoinServiceBuilder {
    /// Create a new join service builder
    pub fn new(node: Arc<NodeState>) -> Self {
        Self {
            node,
            config: None,
            discovery: None,
            validator: None,
            cluster: None,
            task_queue: None,
        }
    }

    /// Set configuration; defaults are used otherwise
    pub fn with_config(mut self, config: JoinConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set peer discovery
    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Set the join request validation hook
    pub fn with_validator(mut self, validator: Arc<dyn JoinValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Set the cluster membership manager
    pub fn with_cluster_manager(mut self, cluster: Arc<dyn ClusterManager>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Share an existing cluster task context; a new one is spawned otherwise
    ///
    /// A shared queue stays running when the service shuts down.
    pub fn with_task_queue(mut self, queue: ClusterTaskQueue) -> Self {
        self.task_queue = Some(queue);
        self
    }

    /// Build the join service
    ///
    /// Must be called inside a Tokio runtime when no task queue was supplied.
    pub fn build(self) -> JoinResult<JoinService> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let discovery = self
            .discovery
            .ok_or_else(|| JoinError::Configuration("Discovery not set".to_string()))?;

        let validator = self
            .validator
            .ok_or_else(|| JoinError::Configuration("Join validator not set".to_string()))?;

        let cluster = self
            .cluster
            .ok_or_else(|| JoinError::Configuration("Cluster manager not set".to_string()))?;

        let (queue, owns_queue) = match self.task_queue {
            Some(queue) => (queue, false),
            None => (ClusterTaskQueue::spawn(), true),
        };

        let merge_engine = Arc::new(MergeDecisionEngine::new(self.node.clone(), validator));

        Ok(JoinService::new(
            self.node,
            discovery,
            cluster,
            merge_engine,
            queue,
            owns_queue,
            config,
        ))
    }
}
