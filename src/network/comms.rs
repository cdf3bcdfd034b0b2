use std::net::Ipv4Addr;

use tracing::{debug, info, trace, warn};

use crate::core::{ClientId, Config, Error, Result};
use crate::protocol::{decode, encode, Descriptor, HelloFlag, Message};
use crate::time::{Clock, SystemClock};
use crate::util::elapsed_at_least;
use super::directory::Directory;
use super::transport::Transport;

/// Callback receiving every message addressed to this node
pub type MessageHandler = Box<dyn FnMut(Message) + Send>;

/// Callback receiving a client id on connection changes
pub type ConnectionHandler = Box<dyn FnMut(ClientId) + Send>;

/// Protocol context of a single node
///
/// Owns the peer directory and the transport, performs the hello handshake,
/// resolves client ids to addresses (falling back to broadcast), and hands
/// every addressed message to the application's handler.
///
/// Everything runs on the caller's thread: feed it datagrams through
/// [`tick`](Comms::tick) or [`on_datagram_received`](Comms::on_datagram_received),
/// and callbacks fire inline.
pub struct Comms<T, C = SystemClock> {
    config: Config,
    transport: T,
    clock: C,
    directory: Directory,
    connected: bool,
    last_message_time: Option<u64>,
    last_connection_attempt: Option<u64>,
    last_id_broadcast: Option<u64>,
    recv_buffer: Vec<u8>,
    message_handler: Option<MessageHandler>,
    connection_handler: Option<ConnectionHandler>,
    disconnection_handler: Option<ConnectionHandler>,
}

impl<T: Transport> Comms<T, SystemClock> {
    /// Creates a node on the system clock
    pub fn new(config: Config, transport: T) -> Result<Self> {
        Self::with_clock(config, transport, SystemClock::new())
    }
}

impl<T: Transport, C: Clock> Comms<T, C> {
    /// Creates a node reading time from `clock`
    pub fn with_clock(config: Config, transport: T, clock: C) -> Result<Self> {
        config.validate()?;

        let mut directory = Directory::new(config.client_id, config.roster_size);
        if let Some(local_ip) = config.local_ip {
            directory.set_local_ip(local_ip);
        }

        Ok(Comms {
            recv_buffer: vec![0; config.recv_buffer_size],
            config,
            transport,
            clock,
            directory,
            connected: false,
            last_message_time: None,
            last_connection_attempt: None,
            last_id_broadcast: None,
            message_handler: None,
            connection_handler: None,
            disconnection_handler: None,
        })
    }

    /// Sets the callback for messages addressed to this node
    pub fn set_message_handler<F>(&mut self, handler: F)
    where
        F: FnMut(Message) + Send + 'static,
    {
        self.message_handler = Some(Box::new(handler));
    }

    /// Sets the callback fired when a peer is greeted back
    pub fn set_connection_handler<F>(&mut self, handler: F)
    where
        F: FnMut(ClientId) + Send + 'static,
    {
        self.connection_handler = Some(Box::new(handler));
    }

    /// Sets the callback fired when this node loses its link
    pub fn set_disconnection_handler<F>(&mut self, handler: F)
    where
        F: FnMut(ClientId) + Send + 'static,
    {
        self.disconnection_handler = Some(Box::new(handler));
    }

    /// Removes every registered callback
    pub fn clear_handlers(&mut self) {
        self.message_handler = None;
        self.connection_handler = None;
        self.disconnection_handler = None;
    }

    /// Sets the local address; coordinators call this with their access point address
    pub fn set_local_ip(&mut self, local_ip: Ipv4Addr) {
        self.config.local_ip = Some(local_ip);
        self.directory.set_local_ip(local_ip);
    }

    /// Sends a message to every node
    pub fn send_broadcast(&mut self, descriptor: Descriptor, meta_data: i32, value: i32) -> Result<()> {
        self.send_to_ip(None, ClientId::BROADCAST, descriptor, meta_data, value)
    }

    /// Sends a message to `to`, broadcasting it when the address is unknown
    ///
    /// The payload keeps `to` either way, so other nodes drop it.
    pub fn send_to(&mut self, to: ClientId, descriptor: Descriptor, meta_data: i32, value: i32) -> Result<()> {
        let dest = if to.is_broadcast() {
            None
        } else {
            let dest = self.directory.resolve(to);
            debug!(client = %to, ?dest, "Resolved client address");
            dest
        };
        self.send_to_ip(dest, to, descriptor, meta_data, value)
    }

    fn send_to_ip(
        &mut self,
        dest: Option<Ipv4Addr>,
        to: ClientId,
        descriptor: Descriptor,
        meta_data: i32,
        value: i32,
    ) -> Result<()> {
        let message = Message::new(self.config.client_id, to, descriptor, meta_data, value);
        let payload = encode(&message);
        match dest {
            Some(addr) => {
                debug!(%message, %addr, "Sending message");
                self.transport.send_to(addr, &payload)
            }
            None => {
                debug!(%message, "Broadcasting message");
                self.transport.broadcast(&payload)
            }
        }
    }

    /// Handles one received datagram
    ///
    /// Returns the decoded message, or `Malformed` / `Unaddressed` when it
    /// was dropped. Both are routine and need no reaction from the caller.
    pub fn on_datagram_received(&mut self, source: Ipv4Addr, raw: &[u8]) -> Result<Message> {
        if raw.len() < crate::core::MESSAGE_SIZE {
            debug!(len = raw.len(), %source, "Message discarded for being undersized");
            return Err(Error::Malformed { len: raw.len() });
        }

        self.last_message_time = Some(self.clock.now_millis());

        let message = decode(raw)?;
        trace!(%message, %source, "Message received");

        if !message.is_addressed_to(self.config.client_id) {
            return Err(Error::Unaddressed { to: message.to });
        }

        match message.descriptor {
            Descriptor::IDENTIFY => {
                self.directory.record(message.from, source.octets()[3]);
                if HelloFlag::from_meta(message.meta_data) == Some(HelloFlag::Greeting) {
                    match self.hello_reply(message.from) {
                        Ok(()) => {}
                        Err(Error::NotReady(reason)) => debug!(%reason, "Not replying to hello"),
                        Err(e) => warn!(error = %e, client = %message.from, "Failed to reply to hello"),
                    }
                }
            }
            Descriptor::CLIENT_INFO => match u8::try_from(message.meta_data) {
                Ok(octet) => {
                    self.directory.record(ClientId(message.value), octet);
                }
                Err(_) => debug!(octet = message.meta_data, "Client info carries an invalid octet"),
            },
            _ => {}
        }

        if let Some(handler) = self.message_handler.as_mut() {
            handler(message);
        }

        Ok(message)
    }

    /// Greets the network with our id
    pub fn hello(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::not_ready("cannot say hello while disconnected"));
        }

        info!(client = %self.config.client_id, "Hello, announcing ourselves");
        self.send_broadcast(Descriptor::IDENTIFY, HelloFlag::Greeting as i32, self.config.client_id.get())
    }

    /// Answers a greeting from `to`
    pub fn hello_reply(&mut self, to: ClientId) -> Result<()> {
        if !self.config.coordinator && !self.connected {
            return Err(Error::not_ready("cannot reply to hello while disconnected"));
        }

        info!(client = %to, "Hello back");
        if let Some(handler) = self.connection_handler.as_mut() {
            handler(to);
        }

        self.send_to(to, Descriptor::IDENTIFY, HelloFlag::Reply as i32, self.config.client_id.get())
    }

    /// Sends our id to `to` without expecting an answer
    pub fn send_id(&mut self, to: ClientId) -> Result<()> {
        self.send_to(to, Descriptor::IDENTIFY, HelloFlag::Announce as i32, self.config.client_id.get())
    }

    /// Broadcasts our id without expecting an answer
    pub fn broadcast_id(&mut self) -> Result<()> {
        self.send_broadcast(Descriptor::IDENTIFY, HelloFlag::Announce as i32, self.config.client_id.get())
    }

    /// Sends `to` one client-info message per known peer, returning how many were sent
    pub fn send_client_info(&mut self, to: ClientId) -> Result<usize> {
        let entries: Vec<_> = self.directory.entries().collect();
        for &(client_id, octet) in &entries {
            self.send_to(to, Descriptor::CLIENT_INFO, i32::from(octet), client_id.get())?;
        }
        Ok(entries.len())
    }

    /// Asks every node to restart; only the coordinator may do so
    pub fn broadcast_system_restart(&mut self, reason: i32) -> Result<()> {
        if !self.config.coordinator {
            return Err(Error::not_ready("only the coordinator may restart the system"));
        }
        self.send_broadcast(Descriptor::SYSTEM_RESTART, 0, reason)
    }

    /// Reports an unrecoverable failure on this node
    pub fn broadcast_system_failure(&mut self, reason: i32) -> Result<()> {
        self.send_broadcast(Descriptor::SYSTEM_FAILURE, 0, reason)
    }

    /// Records that the link came up with `local_ip`, then says hello
    ///
    /// The coordinator hosts the network and ignores link events.
    pub fn on_link_up(&mut self, local_ip: Ipv4Addr) -> Result<()> {
        if self.config.coordinator {
            info!("Client connected");
            return Ok(());
        }

        self.connected = true;
        self.set_local_ip(local_ip);
        info!(%local_ip, "Link up");

        self.hello()
    }

    /// Records that the link went down and notifies the disconnection handler
    pub fn on_link_down(&mut self) {
        if self.config.coordinator {
            info!("Client lost connection");
            return;
        }

        self.connected = false;
        warn!("Link lost");

        let client_id = self.config.client_id;
        if let Some(handler) = self.disconnection_handler.as_mut() {
            handler(client_id);
        }
    }

    /// Returns whether a reconnection attempt is due, recording it if so
    ///
    /// Never due while connected or on the coordinator; otherwise attempts
    /// are spaced by at least the configured reconnect interval.
    pub fn should_reconnect(&mut self) -> bool {
        if self.connected || self.config.coordinator {
            return false;
        }

        let now = self.clock.now_millis();
        if let Some(last) = self.last_connection_attempt {
            if !elapsed_at_least(now, last, self.config.reconnect_interval) {
                return false;
            }
        }

        self.last_connection_attempt = Some(now);
        true
    }

    /// Runs one cooperative step
    ///
    /// Handles at most one waiting datagram, then sends the periodic id
    /// broadcast if enabled and due. Returns the message handled, if any.
    pub fn tick(&mut self) -> Result<Option<Message>> {
        let handled = match self.transport.poll(&mut self.recv_buffer)? {
            Some((source, len)) => {
                let raw = std::mem::take(&mut self.recv_buffer);
                let result = self.on_datagram_received(source, &raw[..len]);
                self.recv_buffer = raw;
                match result {
                    Ok(message) => Some(message),
                    Err(e @ (Error::Malformed { .. } | Error::Unaddressed { .. })) => {
                        trace!(error = %e, "Dropped datagram");
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
            None => None,
        };

        if self.id_broadcast_due() {
            self.last_id_broadcast = Some(self.clock.now_millis());
            self.broadcast_id()?;
        }

        Ok(handled)
    }

    fn id_broadcast_due(&self) -> bool {
        if !self.config.broadcast_id || !(self.connected || self.config.coordinator) {
            return false;
        }
        match self.last_id_broadcast {
            Some(last) => elapsed_at_least(self.clock.now_millis(), last, self.config.broadcast_interval),
            None => true,
        }
    }

    /// Returns the local client id
    pub fn client_id(&self) -> ClientId {
        self.config.client_id
    }

    /// Returns whether this node is the coordinator
    pub fn is_coordinator(&self) -> bool {
        self.config.coordinator
    }

    /// Returns whether the link is up
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns when the last datagram of message size arrived, in clock milliseconds
    pub fn last_message_time(&self) -> Option<u64> {
        self.last_message_time
    }

    /// Returns whether an address is known for `client_id`
    pub fn is_client_known(&self, client_id: ClientId) -> bool {
        self.directory.contains(client_id)
    }

    /// Returns the peer directory
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
