//! Network management and peer communication module
//!
//! This module handles peer discovery, address resolution and message
//! routing on top of a datagram [`Transport`].

mod comms;
mod directory;
pub mod mock;
mod transport;

pub use self::comms::{Comms, ConnectionHandler, MessageHandler};
pub use self::directory::Directory;
pub use self::transport::{Transport, UdpTransport};

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::time::Clock;

/// Drives `comms` until `shutdown` resolves
///
/// Every `poll_interval` the node handles at most one waiting datagram and
/// sends any periodic broadcast that is due. Poll and send failures are
/// logged and the loop carries on; the next tick is the retry.
pub async fn run<T, C, F>(comms: &mut Comms<T, C>, poll_interval: Duration, shutdown: F)
where
    T: Transport,
    C: Clock,
    F: Future<Output = ()>,
{
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(client = %comms.client_id(), ?poll_interval, "Node loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(client = %comms.client_id(), "Node loop stopped");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = comms.tick() {
                    warn!(error = %e, "Poll failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::{Arc, Mutex};

    use crate::core::{ClientId, Config};
    use crate::protocol::{encode, Descriptor, Message};
    use mock::MockTransport;

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let transport = MockTransport::new();
        let mut comms = Comms::new(Config::new(2, false), transport.clone()).unwrap();
        comms.set_local_ip(Ipv4Addr::new(10, 0, 0, 2));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        comms.set_message_handler(move |message| sink.lock().unwrap().push(message));

        let source = Ipv4Addr::new(10, 0, 0, 3);
        let first = Message::new(ClientId(3), ClientId(0), Descriptor::IDENTIFY, 0, 3);
        let second = Message::new(ClientId(3), ClientId(2), Descriptor(30), 4, 5);
        transport.inject(source, &encode(&first));
        transport.inject(source, &[0u8; 4]);
        transport.inject(source, &encode(&second));

        run(
            &mut comms,
            Duration::from_millis(1),
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;

        assert_eq!(*seen.lock().unwrap(), vec![first, second]);
        assert!(comms.is_client_known(ClientId(3)));
    }

    #[tokio::test]
    async fn test_run_survives_send_failures() {
        let transport = MockTransport::new();
        let mut config = Config::new(1, true);
        config.broadcast_id = true;
        config.broadcast_interval = Duration::from_millis(1);
        let mut comms = Comms::new(config, transport.clone()).unwrap();
        transport.set_fail_sends(true);

        run(
            &mut comms,
            Duration::from_millis(1),
            tokio::time::sleep(Duration::from_millis(20)),
        )
        .await;

        assert!(transport.sent().is_empty());
    }
}
