//! Network simulator for deterministic testing.
//!
//! Real networks drop and duplicate datagrams.  To exercise the retry engine
//! and server-side deduplication without depending on actual network
//! conditions, [`Simulator`] wraps another [`Transport`] and intercepts sends
//! and receives, applying a configurable fault model:
//!
//! | Fault            | Description                                           |
//! |------------------|-------------------------------------------------------|
//! | Packet loss      | Drop a datagram (either direction) with `loss_rate`.  |
//! | Duplication      | Send an outbound datagram twice with `duplicate_rate`.|
//! | Ack blackout     | Drop the first `drop_first_acks` inbound RequestAcks. |
//!
//! Random decisions come from a [`StdRng`] seeded from `seed`, so a failing
//! run can be replayed exactly.

use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::packet::{Packet, PacketKind};
use crate::socket::{Socket, SocketError, Transport};

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`; values outside it are
/// clamped.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that an outbound datagram is delivered twice.
    pub duplicate_rate: f64,
    /// Number of inbound RequestAck packets to swallow before letting any
    /// through.
    pub drop_first_acks: u32,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default; the simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            drop_first_acks: 0,
            seed: 0,
        }
    }
}

impl SimulatorConfig {
    pub fn with_loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate;
        self
    }

    pub fn with_duplicate_rate(mut self, rate: f64) -> Self {
        self.duplicate_rate = rate;
        self
    }

    pub fn with_drop_first_acks(mut self, count: u32) -> Self {
        self.drop_first_acks = count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Counters of what the simulator did to the traffic passing through it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    /// Datagrams actually handed to the inner transport (duplicates included).
    pub sent: u64,
    pub dropped_outbound: u64,
    pub duplicated: u64,
    pub dropped_inbound: u64,
    /// RequestAcks swallowed by the ack blackout.
    pub acks_dropped: u32,
}

struct FaultState {
    rng: StdRng,
    stats: SimulatorStats,
}

/// A fault-injecting wrapper around a [`Transport`].
pub struct Simulator<T = Socket> {
    inner: T,
    config: SimulatorConfig,
    state: Mutex<FaultState>,
}

impl<T: Transport> Simulator<T> {
    pub fn new(inner: T, mut config: SimulatorConfig) -> Self {
        config.loss_rate = config.loss_rate.clamp(0.0, 1.0);
        config.duplicate_rate = config.duplicate_rate.clamp(0.0, 1.0);
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            state: Mutex::new(FaultState {
                rng,
                stats: SimulatorStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn stats(&self) -> SimulatorStats {
        self.lock().stats
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FaultState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// How many copies of an outbound datagram to put on the wire (0, 1 or 2).
    fn outbound_copies(&self) -> u32 {
        let mut state = self.lock();
        if state.rng.random_bool(self.config.loss_rate) {
            state.stats.dropped_outbound += 1;
            return 0;
        }
        if state.rng.random_bool(self.config.duplicate_rate) {
            state.stats.duplicated += 1;
            state.stats.sent += 2;
            return 2;
        }
        state.stats.sent += 1;
        1
    }

    /// Decide whether an inbound packet is swallowed.
    fn drop_inbound(&self, packet: &Packet) -> bool {
        let mut state = self.lock();
        if packet.kind() == PacketKind::RequestAck
            && state.stats.acks_dropped < self.config.drop_first_acks
        {
            state.stats.acks_dropped += 1;
            state.stats.dropped_inbound += 1;
            return true;
        }
        if state.rng.random_bool(self.config.loss_rate) {
            state.stats.dropped_inbound += 1;
            return true;
        }
        false
    }
}

impl<T: Transport> Transport for Simulator<T> {
    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }

    async fn send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<(), SocketError> {
        let copies = self.outbound_copies();
        if copies == 0 {
            log::debug!("[sim] dropped outbound {:?} seq={}", packet.kind(), packet.seq);
        }
        for _ in 0..copies {
            self.inner.send_to(packet, dest).await?;
        }
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Packet, SocketAddr), SocketError> {
        loop {
            let (packet, from) = self.inner.recv_from().await?;
            if self.drop_inbound(&packet) {
                log::debug!("[sim] dropped inbound {:?} seq={}", packet.kind(), packet.seq);
                continue;
            }
            return Ok((packet, from));
        }
    }
}
