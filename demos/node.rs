use lidar_link::core::Config;
use lidar_link::network::{self, Comms, UdpTransport};
use lidar_link::protocol::{Descriptor, StateMachine};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const IDLE: i32 = 0;
const RUNNING: i32 = 1;

/// Runs a single node on the local network.
///
/// Usage: `cargo run --example node -- [config.json] [local-ip]`
///
/// The config file is optional; without it the node runs as client 2.
/// Peers pass the address they were given by the access point so they can
/// say hello; coordinators set `local_ip` in their config instead.
#[tokio::main]
async fn main() -> lidar_link::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text)
                .map_err(|e| lidar_link::Error::config(format!("{}: {}", path, e)))?
        }
        None => Config::new(2, false),
    };
    let local_ip: Option<Ipv4Addr> = args.next().and_then(|ip| ip.parse().ok());

    info!(?config, "Starting node");

    let mut phase = StateMachine::new(IDLE, config.state_timeout);
    phase.set_transition_handler(|to, from| info!(to, from, "Phase changed"));

    let transport = UdpTransport::bind(config.port)?;
    let mut comms = Comms::new(config, transport)?;
    comms.set_message_handler(|message| info!(%message, "Message"));
    comms.set_connection_handler(|client| info!(%client, "Peer connected"));
    comms.set_disconnection_handler(|client| warn!(%client, "Connection lost"));

    if let Some(ip) = local_ip {
        if let Err(e) = comms.on_link_up(ip) {
            warn!(error = %e, "Hello failed");
        }
        phase.transition_to(RUNNING);
    }

    network::run(&mut comms, Duration::from_millis(10), async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    if phase.is_timed_out() {
        info!("Node ran past its phase timeout");
    }
    match comms.broadcast_system_failure(0) {
        Ok(()) => info!(descriptor = %Descriptor::SYSTEM_FAILURE, "Announced shutdown"),
        Err(e) => warn!(error = %e, "Failed to announce shutdown"),
    }

    Ok(())
}
