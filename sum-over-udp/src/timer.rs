//! Retransmission timers.
//!
//! Reliable delivery requires that an unacknowledged datagram is re-sent if
//! no answer arrives within a bounded time.  This module provides:
//! - [`TimerConfig`] — the timeouts used by discovery and request retry.
//! - [`RetransmitTimer`] — a deadline that the retry loops race a receive
//!   against with [`tokio::time::timeout_at`], re-armed after every resend.
//!
//! The timeout is fixed, with no back-off and no retry ceiling: a pending
//! discovery or submission is retransmitted until it is answered or the
//! caller drops the whole future.

use std::time::Duration;

use tokio::time::Instant;

/// Default wait before a datagram is sent again.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10);

/// Adjustable timeout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Wait for a RequestAck before resending the Request.
    pub retransmit_timeout: Duration,
    /// Wait for a DiscoverAck before broadcasting Discover again.
    pub discovery_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            retransmit_timeout: DEFAULT_TIMEOUT,
            discovery_interval: DEFAULT_TIMEOUT,
        }
    }
}

/// A fixed-interval retransmit deadline for one outstanding datagram.
#[derive(Debug)]
pub struct RetransmitTimer {
    timeout: Duration,
    deadline: Instant,
    /// How many times the deadline has passed since the timer was created.
    expirations: u32,
}

impl RetransmitTimer {
    /// Create a timer armed to fire `timeout` from now.
    pub fn start(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: Instant::now() + timeout,
            expirations: 0,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn expirations(&self) -> u32 {
        self.expirations
    }

    /// Record that the deadline passed and re-arm for another full timeout.
    ///
    /// Non-matching traffic received while waiting must *not* call this; the
    /// original deadline keeps running.
    pub fn on_expired(&mut self) {
        self.expirations = self.expirations.saturating_add(1);
        self.deadline = Instant::now() + self.timeout;
    }
}
