//! Lidar link: discovery and messaging for small embedded fleets
//!
//! A coordinator ("brain") and a handful of peer nodes find each other on a
//! shared broadcast domain and exchange fixed-width 20-byte command and
//! telemetry messages over UDP. Each node also tracks its operational phase
//! with a timed state machine.
//!
//! ```no_run
//! use lidar_link::core::Config;
//! use lidar_link::network::{Comms, UdpTransport};
//!
//! # fn main() -> lidar_link::Result<()> {
//! let config = Config::new(2, false);
//! let transport = UdpTransport::bind(config.port)?;
//! let mut comms = Comms::new(config, transport)?;
//! comms.set_message_handler(|message| println!("{}", message));
//! comms.on_link_up("192.168.4.2".parse().unwrap())?;
//! loop {
//!     comms.tick()?;
//! }
//! # }
//! ```
pub mod core;

pub mod network;
pub mod protocol;
pub mod time;
mod util;

// Re-export commonly used items
pub use crate::core::{ClientId, Config, Error, Result};
pub use crate::network::Comms;
pub use crate::protocol::{Descriptor, Message, StateMachine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
