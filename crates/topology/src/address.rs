//! Network address of a cluster node

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TopologyError;

/// Network address of a cluster node
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(SocketAddr);

impl Address {
    /// Create an address from an IP and port
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self(SocketAddr::new(ip, port))
    }

    /// Get the IP of this address
    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    /// Get the port of this address
    pub fn port(&self) -> u16 {
        self.0.port()
    }

    /// Get the underlying socket address
    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }

    /// Hash that every process computes identically for the same address.
    ///
    /// Tie-breaks between two nodes compare these values from both sides, so
    /// this must not depend on `std::hash` (whose output may differ between
    /// builds). The IP octets are folded with a 31 polynomial, then combined
    /// with the port; arithmetic wraps.
    ///
    /// Distinct addresses can collide (`10.0.0.1:5730` and `10.0.0.2:5701`
    /// hash alike). Callers comparing with a strict `>` then see neither side
    /// win the tie.
    pub fn stable_hash(&self) -> i32 {
        let ip_hash = match self.0.ip() {
            IpAddr::V4(ip) => fold_octets(&ip.octets()),
            IpAddr::V6(ip) => fold_octets(&ip.octets()),
        };

        ip_hash
            .wrapping_mul(29)
            .wrapping_add(i32::from(self.0.port()))
    }
}

fn fold_octets(octets: &[u8]) -> i32 {
    octets
        .iter()
        .fold(0i32, |hash, octet| {
            hash.wrapping_mul(31).wrapping_add(i32::from(*octet))
        })
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddr>()
            .map(Self)
            .map_err(|e| TopologyError::InvalidAddress {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl From<Address> for SocketAddr {
    fn from(address: Address) -> Self {
        address.0
    }
}
