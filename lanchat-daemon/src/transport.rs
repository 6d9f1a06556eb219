//! The single UDP socket shared by the announce and receive loops.
//!
//! Bound once with broadcast and address reuse enabled so several local
//! instances can share the port during testing. Sends are best-effort and
//! never retried; receiving is the only blocking operation and is unblocked
//! deterministically by `close`.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Receive buffer size. Oversized datagrams are truncated by the OS and then
/// rejected by packet decode; there is no fragmentation support.
pub const MAX_DATAGRAM: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// `close` was called; any in-flight or later receive reports this.
    #[error("transport closed")]
    Closed,
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

pub struct Transport {
    socket: UdpSocket,
    /// Destination port for broadcast and unicast. Equals the configured
    /// port, or the kernel-picked one when bound to port 0 in tests.
    port: u16,
    closed: CancellationToken,
}

impl Transport {
    /// Bind the shared socket on all interfaces at `port`.
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        let raw = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        raw.set_reuse_address(true)?;
        raw.set_broadcast(true)?;
        raw.set_nonblocking(true)?;
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        raw.bind(&bind_addr.into())?;
        let socket = UdpSocket::from_std(raw.into())?;
        let port = socket.local_addr()?.port();
        Ok(Self {
            socket,
            port,
            closed: CancellationToken::new(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Best-effort send to the limited broadcast address. No retry.
    pub async fn broadcast(&self, payload: &[u8]) -> Result<(), TransportError> {
        let dest = SocketAddrV4::new(Ipv4Addr::BROADCAST, self.port);
        self.send_to(SocketAddr::V4(dest), payload).await
    }

    /// Best-effort unicast send. No retry.
    pub async fn send_to(&self, dest: SocketAddr, payload: &[u8]) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.socket.send_to(payload, dest).await?;
        Ok(())
    }

    /// Wait for one datagram. Returns `Closed` once `close` has been called,
    /// including for a receive already in flight at that moment.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        tokio::select! {
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            received = self.socket.recv_from(buf) => Ok(received?),
        }
    }

    /// Idempotent. Unblocks any in-flight `recv`.
    pub fn close(&self) {
        self.closed.cancel();
    }
}
