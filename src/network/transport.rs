use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, trace};

use crate::core::{Error, Result};

/// Datagram transport used by [`Comms`](super::Comms)
///
/// Implementations must never block: `poll` returns `Ok(None)` when no
/// datagram is waiting, and yields at most one datagram per call.
pub trait Transport {
    /// Sends `payload` to every node on the network
    fn broadcast(&mut self, payload: &[u8]) -> Result<()>;

    /// Sends `payload` to a single node
    fn send_to(&mut self, addr: Ipv4Addr, payload: &[u8]) -> Result<()>;

    /// Reads one waiting datagram into `buf`, returning its source and length
    fn poll(&mut self, buf: &mut [u8]) -> Result<Option<(Ipv4Addr, usize)>>;
}

/// Non-blocking UDP transport bound to the fleet port on all interfaces
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    port: u16,
}

impl UdpTransport {
    /// Binds to `port` on all interfaces with broadcast enabled
    pub fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port), port)
    }

    /// Binds to `local`, sending to peers on `peer_port`
    pub fn bind_addr(local: SocketAddrV4, peer_port: u16) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| Error::network(format!("Failed to create socket: {}", e)))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        socket
            .bind(&SocketAddr::V4(local).into())
            .map_err(|e| Error::network(format!("Failed to bind socket to {}: {}", local, e)))?;

        debug!(%local, "Ready for UDP messages");

        Ok(UdpTransport {
            socket: socket.into(),
            port: peer_port,
        })
    }

    /// Returns the local socket address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| Error::network(format!("Failed to get local address: {}", e)))
    }

    fn send(&self, addr: Ipv4Addr, payload: &[u8]) -> Result<()> {
        let target = SocketAddrV4::new(addr, self.port);
        self.socket
            .send_to(payload, target)
            .map_err(|e| Error::network(format!("Failed to send to {}: {}", target, e)))?;
        Ok(())
    }
}

impl Transport for UdpTransport {
    fn broadcast(&mut self, payload: &[u8]) -> Result<()> {
        self.send(Ipv4Addr::BROADCAST, payload)
    }

    fn send_to(&mut self, addr: Ipv4Addr, payload: &[u8]) -> Result<()> {
        self.send(addr, payload)
    }

    fn poll(&mut self, buf: &mut [u8]) -> Result<Option<(Ipv4Addr, usize)>> {
        match self.socket.recv_from(buf) {
            Ok((len, SocketAddr::V4(source))) => {
                trace!(len, source = %source, "Packet received");
                Ok(Some((*source.ip(), len)))
            }
            Ok((_, SocketAddr::V6(source))) => {
                trace!(%source, "Ignoring IPv6 packet");
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn loopback() -> UdpTransport {
        UdpTransport::bind_addr(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), 0).unwrap()
    }

    #[test]
    fn test_poll_empty_socket() {
        let mut transport = loopback();
        let mut buf = [0u8; 32];
        assert!(transport.poll(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_loopback_exchange() {
        let mut receiver = loopback();
        let port = receiver.local_addr().unwrap().port();
        let mut sender =
            UdpTransport::bind_addr(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), port).unwrap();

        sender.send_to(Ipv4Addr::LOCALHOST, &[1, 2, 3, 4]).unwrap();

        let mut buf = [0u8; 32];
        let mut received = None;
        for _ in 0..100 {
            if let Some(datagram) = receiver.poll(&mut buf).unwrap() {
                received = Some(datagram);
                break;
            }
            sleep(Duration::from_millis(5));
        }

        assert_eq!(received, Some((Ipv4Addr::LOCALHOST, 4)));
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
    }
}
