use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use super::{Error, Result};

/// Small integer identifying a node in the fleet
///
/// Id 0 is reserved: as a recipient it means "every node".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub i32);

impl ClientId {
    /// Reserved id addressing all nodes
    pub const BROADCAST: ClientId = ClientId(0);

    /// Returns whether this is the reserved broadcast id
    pub fn is_broadcast(&self) -> bool {
        self.0 == 0
    }

    /// Returns the raw wire value
    pub fn get(&self) -> i32 {
        self.0
    }

    /// Returns the directory slot for this id, if it fits a roster of `size`
    pub fn slot(&self, size: usize) -> Option<usize> {
        usize::try_from(self.0).ok().filter(|&slot| slot > 0 && slot < size)
    }
}

impl From<i32> for ClientId {
    fn from(id: i32) -> Self {
        ClientId(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Id of the local node
    pub client_id: ClientId,
    /// Whether this node is the coordinator ("brain")
    pub coordinator: bool,
    /// UDP port shared by every node
    pub port: u16,
    /// Local IPv4 address, when known up-front (coordinators)
    pub local_ip: Option<Ipv4Addr>,
    /// Number of directory slots; ids outside `1..roster_size` are never tracked
    pub roster_size: usize,
    /// Size of the datagram receive buffer
    pub recv_buffer_size: usize,
    /// Whether to broadcast our id periodically
    pub broadcast_id: bool,
    /// Interval between periodic id broadcasts
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub broadcast_interval: Duration,
    /// Minimum interval between reconnection attempts
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub reconnect_interval: Duration,
    /// Default timeout for node state machines
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub state_timeout: Duration,
}

impl Config {
    /// Creates a default configuration for the given node
    pub fn new(client_id: impl Into<ClientId>, coordinator: bool) -> Self {
        Config {
            client_id: client_id.into(),
            coordinator,
            ..Default::default()
        }
    }

    /// Checks that the configuration describes a usable node
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_broadcast() {
            return Err(Error::config("client id 0 is reserved for broadcast"));
        }
        if self.client_id.slot(self.roster_size).is_none() {
            return Err(Error::config(format!(
                "client id {} does not fit a roster of {}",
                self.client_id, self.roster_size
            )));
        }
        if self.port == 0 {
            return Err(Error::config("port must be non-zero"));
        }
        if self.recv_buffer_size < super::MESSAGE_SIZE {
            return Err(Error::config(format!(
                "receive buffer of {} bytes cannot hold a message",
                self.recv_buffer_size
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            client_id: ClientId(1),
            coordinator: false,
            port: super::DEFAULT_PORT,
            local_ip: None,
            roster_size: super::DEFAULT_ROSTER_SIZE,
            recv_buffer_size: super::RECV_BUFFER_SIZE,
            broadcast_id: false,
            broadcast_interval: Duration::from_millis(super::DEFAULT_BROADCAST_INTERVAL_MS),
            reconnect_interval: Duration::from_millis(super::DEFAULT_RECONNECT_INTERVAL_MS),
            state_timeout: Duration::from_millis(super::DEFAULT_STATE_TIMEOUT_MS),
        }
    }
}
