//! Cluster topology types for the join coordinator
//!
//! This crate provides:
//! - Node addressing (`Address`)
//! - Member records and point-in-time cluster views
//! - A shared, swappable view handle used by cluster-management collaborators

pub mod address;
pub mod error;
pub mod member;
pub mod view;

pub use address::Address;
pub use error::TopologyError;
pub use member::Member;
pub use view::{ClusterView, SharedClusterView};
