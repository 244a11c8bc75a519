//! Error types for transport operations

use thiserror::Error;

/// Transport-related errors
#[derive(Clone, Debug, Error)]
pub enum TransportError {
    /// Connection could not be established
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection was closed by either side
    #[error("Connection closed")]
    ConnectionClosed,

    /// Address is not usable by this transport
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
