//! Client session: discovery, then stop-and-wait submission.
//!
//! A [`Client`] owns the complete state for one session with a server:
//! - Driving the session FSM (see [`crate::state::ClientState`]).
//! - Running discovery through [`crate::discovery`].
//! - Turning values into Requests via [`crate::sender::RequestSender`] and
//!   retransmitting each one on a [`crate::timer::RetransmitTimer`] until its
//!   RequestAck arrives.
//! - Reporting discoveries and acknowledgements to the output sink.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::timeout_at;

use crate::discovery::{self, broadcast_target};
use crate::packet::Body;
use crate::sender::RequestSender;
use crate::sink::{Event, SinkHandle};
use crate::socket::{Socket, Transport};
use crate::state::ClientState;
use crate::timer::{RetransmitTimer, TimerConfig};

/// Client-side settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Where Discover is sent.  The limited-broadcast address on the server
    /// port in normal use.
    pub discovery_target: SocketAddr,
    pub timers: TimerConfig,
}

impl ClientConfig {
    /// Broadcast discovery on `port` with default timers.
    pub fn broadcast(port: u16) -> Self {
        Self {
            discovery_target: broadcast_target(port),
            timers: TimerConfig::default(),
        }
    }

    /// Send Discover straight to `server` instead of broadcasting.
    pub fn unicast(server: SocketAddr) -> Self {
        Self {
            discovery_target: server,
            timers: TimerConfig::default(),
        }
    }

}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    /// A value was submitted before discovery completed.
    #[error("server not yet found")]
    ServerNotFound,
}

/// The server's answer to one submitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgement {
    pub server: SocketAddr,
    pub seq: u32,
    pub value: u32,
    pub request_count: u32,
    pub total_sum: u64,
    /// Times the Request was put on the wire (1 = no retransmission).
    pub transmissions: u32,
    /// From the first transmission to the matching RequestAck.
    pub elapsed: Duration,
}

/// A handle to one client session.
pub struct Client<T = Socket> {
    transport: T,
    config: ClientConfig,
    state: ClientState,
    sender: RequestSender,
    sink: SinkHandle,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: ClientConfig, sink: SinkHandle) -> Self {
        Self {
            transport,
            config,
            state: ClientState::Discovering,
            sender: RequestSender::new(),
            sink,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn server(&self) -> Option<SocketAddr> {
        self.state.server()
    }

    /// Sequence number the next submission will use.
    pub fn next_seq(&self) -> u32 {
        self.sender.next_seq
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run discovery to completion and remember the server.
    ///
    /// A client that already found its server returns it without sending
    /// anything.
    pub async fn discover(&mut self) -> SocketAddr {
        if let Some(server) = self.server() {
            return server;
        }
        let server = discovery::discover(
            &self.transport,
            self.config.discovery_target,
            self.config.timers.discovery_interval,
        )
        .await;
        self.on_discovered(server);
        server
    }

    fn on_discovered(&mut self, server: SocketAddr) {
        self.state = ClientState::Ready { server };
        self.sink.emit(Event::Discovered { server: server.ip() });
    }

    /// Deliver `value` to the server at least once and return its answer.
    ///
    /// Resends the identical Request every retransmit timeout until a
    /// RequestAck echoing its sequence number arrives.  There is no retry
    /// ceiling; drop the future to abandon the submission.
    pub async fn submit(&mut self, value: u32) -> Result<Acknowledgement, ClientError> {
        let server = self.server().ok_or(ClientError::ServerNotFound)?;

        let request = self.sender.build_request(value);
        if let Err(e) = self.transport.send_to(&request, server).await {
            log::warn!("send of request seq={} failed: {e}", request.seq);
        }
        self.sender.record_sent(request);
        let mut timer = RetransmitTimer::start(self.config.timers.retransmit_timeout);

        let completed = loop {
            match timeout_at(timer.deadline(), self.transport.recv_from()).await {
                Ok(Ok((packet, from))) => match packet.body {
                    Body::RequestAck(ack) => match self.sender.on_ack(&ack) {
                        Some(done) => break done,
                        None => log::debug!(
                            "stale ack for seq={} from {from} (waiting on seq={})",
                            ack.acked_seq,
                            request.seq
                        ),
                    },
                    _ => log::debug!(
                        "ignoring {:?} from {from} while {}",
                        packet.kind(),
                        self.sender.state()
                    ),
                },
                Ok(Err(e)) => log::warn!("receive failed: {e}"),
                Err(_elapsed) => {
                    timer.on_expired();
                    if let Some(resend) = self.sender.on_retransmit() {
                        log::debug!(
                            "timeout; re-sending seq={} (transmission {})",
                            resend.seq,
                            self.sender.retransmit_count()
                        );
                        if let Err(e) = self.transport.send_to(&resend, server).await {
                            log::warn!("re-send of seq={} failed: {e}", resend.seq);
                        }
                    }
                }
            }
        };

        let ack = Acknowledgement {
            server,
            seq: completed.seq,
            value: completed.value,
            request_count: completed.ack.request_count,
            total_sum: completed.ack.total_sum,
            transmissions: completed.tx_count,
            elapsed: completed.elapsed,
        };
        log::debug!(
            "seq={} acked after {} transmission(s) in {:?}",
            ack.seq,
            ack.transmissions,
            ack.elapsed
        );
        self.sink.emit(Event::Acknowledged {
            server: server.ip(),
            seq: ack.seq,
            value: ack.value,
            request_count: ack.request_count,
            total_sum: ack.total_sum,
        });
        Ok(ack)
    }

    /// Interactive loop: discover the server, then submit one value per
    /// input line until the input ends.
    ///
    /// Lines that arrive while discovery is still running are reported and
    /// dropped, not queued.  Lines that are not an unsigned 32-bit integer
    /// are skipped with a warning.
    pub async fn run<R>(&mut self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;

        if self.server().is_none() {
            let server = {
                let discovery = discovery::discover(
                    &self.transport,
                    self.config.discovery_target,
                    self.config.timers.discovery_interval,
                );
                tokio::pin!(discovery);
                loop {
                    tokio::select! {
                        server = &mut discovery => break server,
                        line = lines.next_line(), if input_open => match line? {
                            Some(_) => log::warn!("{}; input dropped", ClientError::ServerNotFound),
                            None => input_open = false,
                        },
                    }
                }
            };
            self.on_discovered(server);
        }

        if !input_open {
            return Ok(());
        }

        while let Some(line) = lines.next_line().await? {
            let Some(value) = parse_value(&line) else {
                if !line.trim().is_empty() {
                    log::warn!("not an unsigned 32-bit value: {:?}", line.trim());
                }
                continue;
            };
            if let Err(e) = self.submit(value).await {
                log::warn!("{e}");
            }
        }
        Ok(())
    }
}

/// Parse one line of input as a request value.
pub fn parse_value(line: &str) -> Option<u32> {
    line.trim().parse().ok()
}
