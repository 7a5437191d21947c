//! Wire-format definitions for protocol datagrams.
//!
//! Every datagram exchanged between client and server is a [`Packet`].  This
//! module is responsible for:
//! - Defining the on-wire binary layout (kind, sequence number, payload).
//! - Serialising a [`Packet`] into a fixed-size byte buffer.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for wrongly sized input or an unknown packet kind.
//!
//! No I/O happens here; this module only transforms data.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.  The layout is packed: there is
//! no padding between fields, and every packet has the same size regardless
//! of kind.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |             Kind              |    Sequence Number (hi)       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Sequence Number (lo)       |  Payload (16 bytes, union) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Payload variants (offsets from the start of the packet):
//!
//! | Kind        | Field            | Offset | Width |
//! |-------------|------------------|--------|-------|
//! | Request     | `value`          | 6      | 4     |
//! | RequestAck  | `acked_seq`      | 6      | 4     |
//! | RequestAck  | `request_count`  | 10     | 4     |
//! | RequestAck  | `total_sum`      | 14     | 8     |
//!
//! Bytes not used by a variant are zero on encode and ignored on decode.
//! Total size: [`PACKET_LEN`] = 22 bytes.

use thiserror::Error;

/// Byte length of every packet on the wire.
pub const PACKET_LEN: usize = 22;

// Byte offsets of each field within the serialised packet.
const OFF_KIND: usize = 0;
const OFF_SEQ: usize = 2;
const OFF_VALUE: usize = 6;
const OFF_ACKED_SEQ: usize = 6;
const OFF_REQUEST_COUNT: usize = 10;
const OFF_TOTAL_SUM: usize = 14;

/// The four message kinds, with their on-wire discriminants.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Discover = 1,
    DiscoverAck = 2,
    Request = 3,
    RequestAck = 4,
}

impl PacketKind {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            1 => PacketKind::Discover,
            2 => PacketKind::DiscoverAck,
            3 => PacketKind::Request,
            4 => PacketKind::RequestAck,
            _ => return None,
        })
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Server reply to a Request: the echoed sequence number and the aggregate
/// as it stood after the request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPayload {
    pub acked_seq: u32,
    pub request_count: u32,
    pub total_sum: u64,
}

/// Kind-specific part of a packet.
///
/// The variant *is* the packet kind, so a payload can never be read under the
/// wrong interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    Discover,
    DiscoverAck,
    Request { value: u32 },
    RequestAck(AckPayload),
}

/// A complete protocol datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Per-client sequence number.  Zero for Discover / DiscoverAck.
    pub seq: u32,
    pub body: Body,
}

impl Packet {
    pub fn discover() -> Self {
        Self {
            seq: 0,
            body: Body::Discover,
        }
    }

    pub fn discover_ack() -> Self {
        Self {
            seq: 0,
            body: Body::DiscoverAck,
        }
    }

    pub fn request(seq: u32, value: u32) -> Self {
        Self {
            seq,
            body: Body::Request { value },
        }
    }

    /// Build the reply to request `seq`.  The header sequence number echoes
    /// the acknowledged one.
    pub fn request_ack(seq: u32, request_count: u32, total_sum: u64) -> Self {
        Self {
            seq,
            body: Body::RequestAck(AckPayload {
                acked_seq: seq,
                request_count,
                total_sum,
            }),
        }
    }

    pub fn kind(&self) -> PacketKind {
        match self.body {
            Body::Discover => PacketKind::Discover,
            Body::DiscoverAck => PacketKind::DiscoverAck,
            Body::Request { .. } => PacketKind::Request,
            Body::RequestAck(_) => PacketKind::RequestAck,
        }
    }

    /// Serialise this packet into its fixed-size wire representation.
    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];

        buf[OFF_KIND..OFF_KIND + 2].copy_from_slice(&self.kind().to_u16().to_be_bytes());
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_be_bytes());

        match self.body {
            Body::Discover | Body::DiscoverAck => {}
            Body::Request { value } => {
                buf[OFF_VALUE..OFF_VALUE + 4].copy_from_slice(&value.to_be_bytes());
            }
            Body::RequestAck(ack) => {
                buf[OFF_ACKED_SEQ..OFF_ACKED_SEQ + 4].copy_from_slice(&ack.acked_seq.to_be_bytes());
                buf[OFF_REQUEST_COUNT..OFF_REQUEST_COUNT + 4]
                    .copy_from_slice(&ack.request_count.to_be_bytes());
                buf[OFF_TOTAL_SUM..OFF_TOTAL_SUM + 8].copy_from_slice(&ack.total_sum.to_be_bytes());
            }
        }

        buf
    }

    /// Parse a [`Packet`] from a raw byte slice.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is not exactly [`PACKET_LEN`] bytes long, or
    /// - the kind field holds an unrecognised value.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        let buf: &[u8; PACKET_LEN] = buf
            .try_into()
            .map_err(|_| PacketError::WrongLength(buf.len()))?;

        let raw_kind = u16::from_be_bytes([buf[OFF_KIND], buf[OFF_KIND + 1]]);
        let kind = PacketKind::from_u16(raw_kind).ok_or(PacketError::UnknownKind(raw_kind))?;
        let seq = read_u32(buf, OFF_SEQ);

        let body = match kind {
            PacketKind::Discover => Body::Discover,
            PacketKind::DiscoverAck => Body::DiscoverAck,
            PacketKind::Request => Body::Request {
                value: read_u32(buf, OFF_VALUE),
            },
            PacketKind::RequestAck => Body::RequestAck(AckPayload {
                acked_seq: read_u32(buf, OFF_ACKED_SEQ),
                request_count: read_u32(buf, OFF_REQUEST_COUNT),
                total_sum: read_u64(buf, OFF_TOTAL_SUM),
            }),
        };

        Ok(Packet { seq, body })
    }
}

fn read_u32(buf: &[u8; PACKET_LEN], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn read_u64(buf: &[u8; PACKET_LEN], off: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&buf[off..off + 8]);
    u64::from_be_bytes(word)
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Datagram length differs from the fixed packet size.
    #[error("datagram is {0} bytes, not a fixed-size packet")]
    WrongLength(usize),
    /// Kind field does not name one of the four message kinds.
    #[error("unknown packet kind {0}")]
    UnknownKind(u16),
}
