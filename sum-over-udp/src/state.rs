//! Client finite-state machine types.
//!
//! Two small machines describe a client:
//!
//! ```text
//!  ClientState:
//!    DISCOVERING ──DiscoverAck from S──▶ READY(S)
//!
//!  SubmissionState (one per submitted value):
//!    IDLE ──send──▶ SENT ──matching RequestAck──▶ ACKNOWLEDGED
//!                   │  ▲
//!                   └──┘ timeout: resend the same Request
//! ```
//!
//! Transitions are driven by [`crate::client`] and [`crate::sender`]; this
//! module only names the states.

use std::net::SocketAddr;

/// Where a client is in its session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// No server known yet; input is refused.
    #[default]
    Discovering,
    /// Discovery completed; `server` answered the first DiscoverAck and is
    /// never changed afterwards.
    Ready { server: SocketAddr },
}

impl ClientState {
    pub fn server(&self) -> Option<SocketAddr> {
        match self {
            ClientState::Discovering => None,
            ClientState::Ready { server } => Some(*server),
        }
    }
}

/// Progress of the request currently held by [`crate::sender::RequestSender`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    /// Nothing outstanding.
    #[default]
    Idle,
    /// A Request is on the wire, waiting for its RequestAck.
    Sent,
    /// The last Request was acknowledged; the next one may be built.
    Acknowledged,
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
