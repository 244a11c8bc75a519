//! Join and split-brain merge coordination for cluster nodes
//!
//! This crate governs what happens after discovery has located candidate
//! peers:
//! - Joining the discovered master, or taking the master role when none exists
//! - Verifying full connectivity to every member before finalizing the join
//! - Restarting the join sequence when connectivity cannot be established
//! - Deciding, fail-closed, whether this node should merge into another cluster
//!
//! Discovery, membership storage and the connection layer are collaborators
//! supplied through the traits in [`traits`].

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Join request announcements
pub mod announcement;

/// Opportunistic join request broadcasting
pub mod broadcast;

/// Builder for the join service
pub mod builder;

/// Configuration types
pub mod config;

/// Join lifecycle orchestration
pub mod coordinator;

/// Error types
pub mod error;

/// Joining a discovered master
pub mod master;

/// Split-brain merge decision
pub mod merge;

/// Local node state
pub mod node;

/// Forced master promotion
pub mod promotion;

/// Serialized cluster task context
pub mod queue;

/// Rejoin grace wait and reset
pub mod rejoin;

/// Outer join loop
pub mod service;

/// Collaborator traits
pub mod traits;

/// Connectivity polling
pub mod verifier;

pub use {
    announcement::JoinAnnouncement,
    broadcast::JoinRequestBroadcaster,
    builder::JoinServiceBuilder,
    config::JoinConfig,
    coordinator::{JoinCoordinator, PostJoinOutcome},
    error::{Interrupted, JoinError, JoinResult, MasterJoinFailure, ValidationError},
    merge::MergeDecisionEngine,
    node::NodeState,
    promotion::{MASTER_PROMOTION_THRESHOLD, MasterPromotionPolicy},
    queue::ClusterTaskQueue,
    rejoin::RejoinScheduler,
    service::JoinService,
    traits::{ClusterManager, Discovered, Discovery, DiscoveryMode, JoinValidator},
    verifier::{Connectivity, ConnectivityVerifier},
};
