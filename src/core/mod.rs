//! Core types and traits for the lidar link protocol
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{ClientId, Config};

/// Size of an encoded message in bytes
pub const MESSAGE_SIZE: usize = 20;

/// Default UDP port shared by every node
pub const DEFAULT_PORT: u16 = 21337;

/// Size of the buffer used to read a single datagram
pub const RECV_BUFFER_SIZE: usize = 255;

/// Default number of client ids the directory can hold
pub const DEFAULT_ROSTER_SIZE: usize = 10;

/// Default state timeout in milliseconds
pub const DEFAULT_STATE_TIMEOUT_MS: u64 = 10_000;

/// Default interval between unsolicited id broadcasts in milliseconds
pub const DEFAULT_BROADCAST_INTERVAL_MS: u64 = 10_000;

/// Default interval between reconnection attempts in milliseconds
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 1_000;
