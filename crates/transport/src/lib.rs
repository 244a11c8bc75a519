//! Connection registry abstraction for the join coordinator
//!
//! This crate provides a transport-agnostic view of peer connections.
//! Specific transports (TCP, in-memory, etc.) are provided in separate crates.
//!
//! The join coordinator only asks three things of a transport:
//! - Is there a live connection to an address
//! - Open one if there is not
//! - Which addresses recently failed to connect

pub mod error;

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use proven_topology::Address;

pub use error::TransportError;
pub use error::TransportError as Error;

/// A live connection to a peer
pub trait Connection: Debug + Send + Sync + 'static {
    /// Address of the remote end
    fn endpoint(&self) -> &Address;

    /// Whether the connection is still usable
    fn is_alive(&self) -> bool;
}

/// Address to live-connection lookup
///
/// Implementations track addresses whose last connection attempt failed.
/// All methods may be called concurrently from several tasks.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync + 'static {
    /// Return the live connection to `address`, opening one if needed
    ///
    /// Returns `None` when the peer could not be reached; the address is then
    /// reported by [`ConnectionRegistry::failed_connections`].
    async fn get_or_connect(&self, address: &Address) -> Option<Arc<dyn Connection>>;

    /// Return the live connection to `address` without connecting
    fn get_connection(&self, address: &Address) -> Option<Arc<dyn Connection>>;

    /// Addresses with a currently failed connection attempt
    fn failed_connections(&self) -> HashSet<Address>;

    /// Whether any connection attempt is currently failed
    fn has_failed_connections(&self) -> bool {
        !self.failed_connections().is_empty()
    }
}
