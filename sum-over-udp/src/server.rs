//! Aggregation server: receive loop plus one task per Request.
//!
//! ```text
//!   recv loop ──Discover──▶ discovery::respond (inline)
//!       │
//!       └──────Request───▶ tokio::spawn(handle_request)
//!                              ├── registry.accept_request   (one lock)
//!                              ├── send RequestAck
//!                              └── sink.emit
//! ```
//!
//! Request handlers for different clients run concurrently; the registry
//! lock is the only point where they serialise.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::discovery;
use crate::packet::{Body, Packet};
use crate::registry::ClientRegistry;
use crate::sink::{Event, SinkHandle};
use crate::socket::{Socket, SocketError, Transport};

/// Server-side settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl ServerConfig {
    /// Listen on every IPv4 interface at `port`.
    pub fn any(port: u16) -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
        }
    }
}

pub struct Server<T = Socket> {
    transport: Arc<T>,
    registry: ClientRegistry,
    sink: SinkHandle,
}

impl Server<Socket> {
    /// Bind a broadcast-capable socket per `config`.
    pub async fn bind(config: &ServerConfig, sink: SinkHandle) -> Result<Self, SocketError> {
        let socket = Socket::bind(config.bind).await?;
        Ok(Self::new(socket, sink))
    }
}

impl<T: Transport> Server<T> {
    pub fn new(transport: T, sink: SinkHandle) -> Self {
        Self {
            transport: Arc::new(transport),
            registry: ClientRegistry::new(),
            sink,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Shared handle to the registry and aggregate.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Serve forever.
    pub async fn run(&self) {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves.
    ///
    /// Handlers already spawned are left to finish on their own.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.sink.emit(Event::Startup(self.registry.aggregate()));
        tokio::pin!(shutdown);

        loop {
            let received = tokio::select! {
                _ = &mut shutdown => {
                    log::info!("shutting down receive loop");
                    break;
                }
                received = self.transport.recv_from() => received,
            };

            match received {
                Ok((packet, from)) => self.dispatch(packet, from).await,
                Err(SocketError::Decode { from, source }) => {
                    log::warn!("discarding datagram from {from}: {source}");
                }
                Err(e) => log::warn!("receive failed: {e}"),
            }
        }
    }

    async fn dispatch(&self, packet: Packet, from: SocketAddr) {
        match packet.body {
            Body::Discover => {
                if let Err(e) = discovery::respond(&*self.transport, &self.registry, from).await {
                    log::warn!("discover from {from} abandoned: {e}");
                }
            }
            Body::Request { value } => {
                tokio::spawn(handle_request(
                    Arc::clone(&self.transport),
                    self.registry.clone(),
                    self.sink.clone(),
                    from,
                    packet.seq,
                    value,
                ));
            }
            Body::DiscoverAck | Body::RequestAck(_) => {
                log::debug!("ignoring {:?} from {from}", packet.kind());
            }
        }
    }
}

/// Deduplicate, aggregate, reply, report.
async fn handle_request<T: Transport>(
    transport: Arc<T>,
    registry: ClientRegistry,
    sink: SinkHandle,
    from: SocketAddr,
    seq: u32,
    value: u32,
) {
    let Some(accepted) = registry.accept_request(from, seq, value) else {
        log::debug!("dropping request seq={seq} from unregistered {from}");
        return;
    };

    let ack = Packet::request_ack(seq, accepted.request_count, accepted.total_sum);
    if let Err(e) = transport.send_to(&ack, from).await {
        log::warn!("ack of seq={seq} to {from} failed: {e}");
    }

    sink.emit(Event::Processed {
        client: from.ip(),
        duplicate: accepted.duplicate,
        seq,
        value,
        request_count: accepted.request_count,
        total_sum: accepted.total_sum,
    });
}
