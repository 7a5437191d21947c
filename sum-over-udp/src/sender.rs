//! Outbound request state for stop-and-wait submission.
//!
//! [`RequestSender`] tracks the client's sequence numbers and the single
//! in-flight Request.  It does **not** touch the socket;
//! [`crate::client::Client`] calls these methods and owns the actual
//! send/receive loop.
//!
//! # Stop-and-Wait contract
//! - At most **one** Request is in flight at any moment (`unacked`).
//! - A new Request may only be built once `unacked` is `None`.
//! - On a RequestAck echoing the in-flight sequence: advance `next_seq` by
//!   one; clear `unacked`.
//! - On timeout: increment `tx_count`; resend the same packet unchanged.
//! - Any other RequestAck is stale and changes nothing.

use std::time::{Duration, Instant};

use crate::packet::{AckPayload, Body, Packet};
use crate::state::SubmissionState;

/// First sequence number a fresh session uses.
pub const INITIAL_SEQ: u32 = 1;

// ---------------------------------------------------------------------------
// RetransmitEntry
// ---------------------------------------------------------------------------

/// A Request that has been sent but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetransmitEntry {
    /// The Request on the wire.
    pub packet: Packet,
    /// Value carried by the Request.
    pub value: u32,
    /// How many times this Request has been transmitted (1 = first send).
    pub tx_count: u32,
    /// Time of the first transmission.
    pub first_sent_at: Instant,
}

/// A Request that has been acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completed {
    pub seq: u32,
    pub value: u32,
    pub tx_count: u32,
    /// Time from first transmission to the matching RequestAck.
    pub elapsed: Duration,
    pub ack: AckPayload,
}

// ---------------------------------------------------------------------------
// RequestSender
// ---------------------------------------------------------------------------

/// Stop-and-wait send-side state for one client session.
#[derive(Debug)]
pub struct RequestSender {
    /// Sequence number of the **next** Request to send.
    ///
    /// Advances by one each time a Request is acknowledged.  Remains
    /// unchanged while a Request is in flight, including across resends.
    pub next_seq: u32,

    /// The in-flight Request, or `None` when the sender is idle.
    pub unacked: Option<RetransmitEntry>,

    state: SubmissionState,
}

impl Default for RequestSender {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestSender {
    pub fn new() -> Self {
        Self {
            next_seq: INITIAL_SEQ,
            unacked: None,
            state: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Build the Request for `value` under the current sequence number.
    ///
    /// The caller must subsequently call [`record_sent`](Self::record_sent)
    /// with it once the packet has been handed to the socket.
    pub fn build_request(&self, value: u32) -> Packet {
        Packet::request(self.next_seq, value)
    }

    /// Move `packet` into the in-flight slot (first transmission).
    ///
    /// Panics in debug mode if a Request is already in flight.
    pub fn record_sent(&mut self, packet: Packet) {
        debug_assert!(
            self.unacked.is_none(),
            "record_sent called while a request is already in flight"
        );
        let value = match packet.body {
            Body::Request { value } => value,
            _ => 0,
        };
        self.unacked = Some(RetransmitEntry {
            packet,
            value,
            tx_count: 1,
            first_sent_at: Instant::now(),
        });
        self.state = SubmissionState::Sent;
    }

    /// Process an inbound RequestAck.
    ///
    /// Returns the completed submission if the ack echoes the in-flight
    /// sequence number.  Returns `None` for a stale or unexpected ack, in
    /// which case nothing changes.
    pub fn on_ack(&mut self, ack: &AckPayload) -> Option<Completed> {
        let entry = self.unacked.as_ref()?;
        if ack.acked_seq != entry.packet.seq {
            return None;
        }
        let entry = self.unacked.take()?;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.state = SubmissionState::Acknowledged;
        Some(Completed {
            seq: entry.packet.seq,
            value: entry.value,
            tx_count: entry.tx_count,
            elapsed: entry.first_sent_at.elapsed(),
            ack: *ack,
        })
    }

    /// Count one more transmission of the in-flight Request and return the
    /// packet to put back on the wire.
    pub fn on_retransmit(&mut self) -> Option<Packet> {
        let entry = self.unacked.as_mut()?;
        entry.tx_count = entry.tx_count.saturating_add(1);
        Some(entry.packet)
    }

    /// Returns the number of times the in-flight Request has been sent,
    /// or `0` if the sender is idle.
    pub fn retransmit_count(&self) -> u32 {
        self.unacked.as_ref().map_or(0, |e| e.tx_count)
    }

    /// `true` when a Request is waiting for its RequestAck.
    pub fn has_unacked(&self) -> bool {
        self.unacked.is_some()
    }
}
