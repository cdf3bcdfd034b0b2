use std::io;
use thiserror::Error;

use super::types::ClientId;

/// Custom error types for the lidar link protocol
///
/// There is no variant for an unresolved destination: the directory
/// reports `None` and the send goes out as a broadcast.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed message: {len} bytes is shorter than a message")]
    Malformed {
        /// Number of bytes actually received
        len: usize,
    },

    #[error("Message addressed to client {to}, not to this node")]
    Unaddressed {
        /// Recipient carried by the message
        to: ClientId,
    },

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new not-ready error
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Error::NotReady(msg.into())
    }

    /// Creates a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
