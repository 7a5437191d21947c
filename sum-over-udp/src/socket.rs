//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::packet::Packet`] instead of raw bytes.  All protocol logic lives
//! elsewhere; this module owns only byte I/O.
//!
//! The client and server are written against the [`Transport`] trait rather
//! than [`Socket`] directly, so tests can slot a
//! [`crate::simulator::Simulator`] in between.

use std::future::Future;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::packet::{Packet, PacketError};

/// Receive buffer size.  Larger than [`crate::packet::PACKET_LEN`] so
/// oversized datagrams are seen whole and rejected instead of silently
/// truncated into a packet.
const RECV_BUF: usize = 512;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A datagram arrived from `from` but could not be decoded.
    #[error("bad datagram from {from}: {source}")]
    Decode {
        from: SocketAddr,
        #[source]
        source: PacketError,
    },
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A packet-oriented, unreliable datagram channel.
///
/// All methods take `&self` so one transport can be shared between the
/// receive loop and spawned request handlers.
pub trait Transport: Send + Sync + 'static {
    /// Address this transport is bound to.
    fn local_addr(&self) -> SocketAddr;

    /// Send `packet` as a single datagram to `dest`.
    fn send_to(
        &self,
        packet: &Packet,
        dest: SocketAddr,
    ) -> impl Future<Output = Result<(), SocketError>> + Send;

    /// Receive the next datagram and decode it.
    fn recv_from(&self) -> impl Future<Output = Result<(Packet, SocketAddr), SocketError>> + Send;
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async, packet-oriented, broadcast-capable UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr` and enable `SO_BROADCAST`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        inner.set_broadcast(true)?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }
}

impl Transport for Socket {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(&packet.encode(), dest).await?;
        Ok(())
    }

    /// Returns `(packet, sender_address)`.  Datagrams that fail to decode are
    /// returned as [`SocketError::Decode`]; the caller decides whether to
    /// keep receiving.
    async fn recv_from(&self) -> Result<(Packet, SocketAddr), SocketError> {
        let mut buf = [0u8; RECV_BUF];
        let (n, from) = self.inner.recv_from(&mut buf).await?;
        let packet =
            Packet::decode(&buf[..n]).map_err(|source| SocketError::Decode { from, source })?;
        Ok((packet, from))
    }
}
