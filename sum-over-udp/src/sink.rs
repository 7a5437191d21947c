//! Output sink for human-readable protocol events.
//!
//! Producers (the server's request handlers, the client's retry loop) call
//! [`SinkHandle::emit`], which timestamps and formats an [`Event`] and pushes
//! it onto an unbounded channel.  That is the whole cost on the hot path: no
//! lock shared with the registry, no I/O.
//!
//! A single consumer task started by [`spawn`] sleeps until at least one line
//! is queued, drains every queued line into one batch, writes and flushes
//! the batch, then goes back to sleep.  When every [`SinkHandle`] has been
//! dropped the consumer finishes and hands its writer back.

use std::fmt;
use std::net::IpAddr;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::aggregate::Aggregate;

/// Local-time prefix of every output line.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Something worth showing the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Server startup: the (empty) aggregate.
    Startup(Aggregate),
    /// Client: discovery finished, `server` answered.
    Discovered { server: IpAddr },
    /// Server: a Request was handled, applied or recognised as a duplicate.
    Processed {
        client: IpAddr,
        duplicate: bool,
        seq: u32,
        value: u32,
        request_count: u32,
        total_sum: u64,
    },
    /// Client: a submission was acknowledged.
    Acknowledged {
        server: IpAddr,
        seq: u32,
        value: u32,
        request_count: u32,
        total_sum: u64,
    },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Event::Startup(agg) => write!(
                f,
                "num_reqs {} total_sum {}",
                agg.request_count, agg.total_sum
            ),
            Event::Discovered { server } => write!(f, "server_addr {server}"),
            Event::Processed {
                client,
                duplicate,
                seq,
                value,
                request_count,
                total_sum,
            } => write!(
                f,
                "client {client} {}id_req {seq} value {value} num_reqs {request_count} total_sum {total_sum}",
                if duplicate { "DUP!! " } else { "" }
            ),
            Event::Acknowledged {
                server,
                seq,
                value,
                request_count,
                total_sum,
            } => write!(
                f,
                "server {server} id_req {seq} value {value} num_reqs {request_count} total_sum {total_sum}"
            ),
        }
    }
}

/// Cheap, cloneable producer side of the sink.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl SinkHandle {
    /// Timestamp `event` and queue it.  Never blocks.
    pub fn emit(&self, event: Event) {
        let line = format!("{} {event}", chrono::Local::now().format(TIMESTAMP_FORMAT));
        if self.tx.send(line).is_err() {
            log::debug!("output sink closed; dropping event {event:?}");
        }
    }
}

/// Start the consumer task writing to `writer`.
///
/// The task resolves to the writer once every [`SinkHandle`] is gone, or to
/// the first write error.
pub fn spawn<W>(writer: W) -> (SinkHandle, JoinHandle<std::io::Result<W>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(drain(rx, writer));
    (SinkHandle { tx }, task)
}

async fn drain<W>(mut rx: mpsc::UnboundedReceiver<String>, mut writer: W) -> std::io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = String::new();
    while let Some(first) = rx.recv().await {
        batch.clear();
        batch.push_str(&first);
        batch.push('\n');
        while let Ok(line) = rx.try_recv() {
            batch.push_str(&line);
            batch.push('\n');
        }
        writer.write_all(batch.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;

    /// In-memory writer that counts flushes (one per drained batch).
    #[derive(Default)]
    struct CountingWriter {
        buf: Vec<u8>,
        flushes: usize,
    }

    impl AsyncWrite for CountingWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.buf.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.flushes += 1;
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn lines(w: &CountingWriter) -> Vec<String> {
        String::from_utf8(w.buf.clone())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Strip the `YYYY-MM-DD HH:MM:SS ` prefix.
    fn body(line: &str) -> &str {
        assert!(line.len() > 20, "line too short: {line:?}");
        assert_eq!(&line[4..5], "-");
        assert_eq!(&line[10..11], " ");
        assert_eq!(&line[13..14], ":");
        &line[20..]
    }

    #[test]
    fn processed_line_format() {
        let ev = Event::Processed {
            client: "10.0.0.2".parse().unwrap(),
            duplicate: false,
            seq: 1,
            value: 5,
            request_count: 1,
            total_sum: 5,
        };
        assert_eq!(
            ev.to_string(),
            "client 10.0.0.2 id_req 1 value 5 num_reqs 1 total_sum 5"
        );
    }

    #[test]
    fn duplicate_line_carries_marker() {
        let ev = Event::Processed {
            client: "10.0.0.2".parse().unwrap(),
            duplicate: true,
            seq: 1,
            value: 5,
            request_count: 2,
            total_sum: 15,
        };
        assert_eq!(
            ev.to_string(),
            "client 10.0.0.2 DUP!! id_req 1 value 5 num_reqs 2 total_sum 15"
        );
    }

    #[test]
    fn client_side_line_formats() {
        let server: IpAddr = "192.168.1.7".parse().unwrap();
        assert_eq!(
            Event::Discovered { server }.to_string(),
            "server_addr 192.168.1.7"
        );
        assert_eq!(
            Event::Acknowledged {
                server,
                seq: 2,
                value: 10,
                request_count: 2,
                total_sum: 15,
            }
            .to_string(),
            "server 192.168.1.7 id_req 2 value 10 num_reqs 2 total_sum 15"
        );
        assert_eq!(
            Event::Startup(Aggregate::default()).to_string(),
            "num_reqs 0 total_sum 0"
        );
    }

    #[tokio::test]
    async fn queued_lines_are_drained_in_one_batch() {
        let (sink, task) = spawn(CountingWriter::default());

        // The consumer cannot run until this task yields, so all three lines
        // are queued before the first wake-up.
        sink.emit(Event::Startup(Aggregate::default()));
        sink.emit(Event::Discovered { server: "127.0.0.1".parse().unwrap() });
        sink.emit(Event::Startup(Aggregate { request_count: 1, total_sum: 2 }));
        drop(sink);

        let writer = task.await.unwrap().unwrap();
        assert_eq!(writer.flushes, 1);

        let out = lines(&writer);
        assert_eq!(out.len(), 3);
        assert_eq!(body(&out[0]), "num_reqs 0 total_sum 0");
        assert_eq!(body(&out[1]), "server_addr 127.0.0.1");
        assert_eq!(body(&out[2]), "num_reqs 1 total_sum 2");
    }

    #[tokio::test]
    async fn consumer_wakes_for_each_later_line() {
        let (sink, task) = spawn(CountingWriter::default());

        sink.emit(Event::Startup(Aggregate::default()));
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        sink.emit(Event::Startup(Aggregate::default()));
        drop(sink);

        let writer = task.await.unwrap().unwrap();
        assert_eq!(lines(&writer).len(), 2);
        assert!(writer.flushes >= 1);
    }

    #[tokio::test]
    async fn emit_after_consumer_exit_is_harmless() {
        let (sink, task) = spawn(CountingWriter::default());
        task.abort();
        let _ = task.await;
        sink.emit(Event::Startup(Aggregate::default()));
    }
}
