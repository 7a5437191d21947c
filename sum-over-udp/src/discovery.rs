//! Discovery handshake.
//!
//! ```text
//!   client                               server
//!     │ ── Discover (broadcast) ─────────▶ │  respond(): DiscoverAck,
//!     │ ◀──────────────────── DiscoverAck ─ │  then register the sender
//!     │   server_addr := sender of the ack  │
//! ```
//!
//! The client resends Discover every poll interval until an answer arrives.
//! The first DiscoverAck wins; nothing authenticates the responder.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::time::timeout_at;

use crate::packet::{Body, Packet};
use crate::registry::{ClientRegistry, Registration};
use crate::socket::{SocketError, Transport};
use crate::timer::RetransmitTimer;

/// Limited-broadcast address for `port`.
pub fn broadcast_target(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::BROADCAST, port))
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// Answer a Discover from `from`: send one DiscoverAck, then make sure a
/// client record exists.
///
/// If the ack cannot be sent the Discover is abandoned without registering;
/// the client will broadcast again.
pub async fn respond<T: Transport>(
    transport: &T,
    registry: &ClientRegistry,
    from: SocketAddr,
) -> Result<Registration, SocketError> {
    transport.send_to(&Packet::discover_ack(), from).await?;
    let registration = registry.register_or_lookup(from);
    if registration.created {
        log::info!("registered client {from}");
    } else {
        log::debug!("repeat discover from known client {from}");
    }
    Ok(registration)
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Broadcast Discover to `target` until a DiscoverAck arrives and return the
/// address that sent it.
///
/// Never gives up.  Send and receive errors are logged and the poll goes on.
pub async fn discover<T: Transport>(
    transport: &T,
    target: SocketAddr,
    interval: Duration,
) -> SocketAddr {
    let discover = Packet::discover();
    send_logged(transport, &discover, target).await;
    let mut timer = RetransmitTimer::start(interval);

    loop {
        match timeout_at(timer.deadline(), transport.recv_from()).await {
            Ok(Ok((packet, from))) => match packet.body {
                Body::DiscoverAck => {
                    log::info!(
                        "discovered server {from} after {} attempt(s)",
                        timer.expirations() + 1
                    );
                    return from;
                }
                _ => log::debug!("[discovery] ignoring {:?} from {from}", packet.kind()),
            },
            Ok(Err(e)) => log::warn!("[discovery] receive failed: {e}"),
            Err(_elapsed) => {
                timer.on_expired();
                log::debug!("[discovery] no answer; re-sending discover to {target}");
                send_logged(transport, &discover, target).await;
            }
        }
    }
}

async fn send_logged<T: Transport>(transport: &T, packet: &Packet, dest: SocketAddr) {
    if let Err(e) = transport.send_to(packet, dest).await {
        log::warn!("[discovery] send to {dest} failed: {e}");
    }
}
