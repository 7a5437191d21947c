//! `sum-over-udp` — reliable request aggregation over unreliable UDP.
//!
//! Clients find the server by broadcast, then submit numbers; the server
//! keeps a running count and sum and answers every submission with the
//! current totals.  Loss and duplication are handled by client-side
//! retransmission and server-side deduplication on per-client sequence
//! numbers.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐   Discover / Request    ┌──────────────────────────┐
//!  │    Client    │────────────────────────▶│          Server          │
//!  │ ┌──────────┐ │                         │ ┌──────────────────────┐ │
//!  │ │  Sender  │ │ DiscoverAck / ReqAck    │ │    ClientRegistry    │ │
//!  │ │  Timer   │ │◀────────────────────────│ │ (records+Aggregate)  │ │
//!  │ └──────────┘ │                         │ └──────────────────────┘ │
//!  └──────┬───────┘                         └────────────┬─────────────┘
//!         │ events                                       │ events
//!  ┌──────▼──────────────────────────────────────────────▼─────┐
//!  │                 Output sink (batched lines)               │
//!  └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]     — wire format (serialise / deserialise)
//! - [`socket`]     — async UDP socket and the `Transport` trait
//! - [`simulator`]  — lossy/duplicating transport for testing
//! - [`aggregate`]  — running count and sum
//! - [`registry`]   — per-client records and deduplication
//! - [`discovery`]  — broadcast discovery handshake
//! - [`state`]      — client finite-state-machine types
//! - [`sender`]     — stop-and-wait outbound request state
//! - [`timer`]      — retransmit timeouts
//! - [`client`]     — client session and interactive loop
//! - [`server`]     — receive loop and per-request handlers
//! - [`sink`]       — timestamped output lines, drained in batches

pub mod aggregate;
pub mod client;
pub mod discovery;
pub mod packet;
pub mod registry;
pub mod sender;
pub mod server;
pub mod simulator;
pub mod sink;
pub mod socket;
pub mod state;
pub mod timer;

pub use client::{Acknowledgement, Client, ClientConfig, ClientError};
pub use packet::{Packet, PacketError, PacketKind};
pub use server::{Server, ServerConfig};
pub use socket::{Socket, SocketError, Transport};
