//! Mock transport for testing

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};

use super::Transport;
use crate::core::{Error, Result};
use crate::protocol::{decode, Message};

/// A datagram handed to the mock transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    /// Sent to the broadcast address
    Broadcast(Vec<u8>),
    /// Sent to a single node
    Unicast(Ipv4Addr, Vec<u8>),
}

impl Sent {
    /// Returns the raw payload
    pub fn payload(&self) -> &[u8] {
        match self {
            Sent::Broadcast(payload) | Sent::Unicast(_, payload) => payload,
        }
    }

    /// Decodes the payload as a message
    pub fn message(&self) -> Result<Message> {
        decode(self.payload())
    }

    /// Returns the unicast destination, if any
    pub fn destination(&self) -> Option<Ipv4Addr> {
        match self {
            Sent::Broadcast(_) => None,
            Sent::Unicast(addr, _) => Some(*addr),
        }
    }
}

/// In-memory transport for unit testing
///
/// Clones share state, so a test can keep a handle after moving the
/// transport into a [`Comms`](super::Comms).
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    inbound: VecDeque<(Ipv4Addr, Vec<u8>)>,
    sent: Vec<Sent>,
    fail_sends: bool,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a datagram to be returned by `poll`
    pub fn inject(&self, source: Ipv4Addr, payload: &[u8]) {
        self.lock().inbound.push_back((source, payload.to_vec()));
    }

    /// Get every datagram sent so far
    pub fn sent(&self) -> Vec<Sent> {
        self.lock().sent.clone()
    }

    /// Take every datagram sent so far, clearing the record
    pub fn take_sent(&self) -> Vec<Sent> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Make subsequent sends fail
    pub fn set_fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    fn record(&self, sent: Sent) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_sends {
            return Err(Error::network("mock transport refused send"));
        }
        inner.sent.push(sent);
        Ok(())
    }
}

impl Transport for MockTransport {
    fn broadcast(&mut self, payload: &[u8]) -> Result<()> {
        self.record(Sent::Broadcast(payload.to_vec()))
    }

    fn send_to(&mut self, addr: Ipv4Addr, payload: &[u8]) -> Result<()> {
        self.record(Sent::Unicast(addr, payload.to_vec()))
    }

    fn poll(&mut self, buf: &mut [u8]) -> Result<Option<(Ipv4Addr, usize)>> {
        let Some((source, payload)) = self.lock().inbound.pop_front() else {
            return Ok(None);
        };
        // Oversized datagrams are truncated like a real socket read
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok(Some((source, len)))
    }
}
