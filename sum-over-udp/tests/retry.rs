//! Retry-engine tests over a fault-injecting network.
//!
//! The client (and in one test the server) talks through a
//! [`Simulator`] so acknowledgements and requests get lost or duplicated in
//! a reproducible way.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sum_over_udp::{
    aggregate::Aggregate,
    packet::{Body, Packet},
    simulator::{Simulator, SimulatorConfig},
    sink, Client, ClientConfig, Server, Socket, Transport,
};

async fn loopback() -> Socket {
    Socket::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap())
        .await
        .expect("bind loopback socket")
}

/// Spawn a server over `transport` and return it with its serving task.
fn serve<T: Transport>(transport: T) -> (Arc<Server<T>>, tokio::task::JoinHandle<()>) {
    let (sink, _output) = sink::spawn(tokio::io::sink());
    let server = Arc::new(Server::new(transport, sink));
    let task = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });
    (server, task)
}

fn lossy_client(
    server: SocketAddr,
    socket: Socket,
    config: SimulatorConfig,
) -> Client<Simulator<Socket>> {
    let (sink, _output) = sink::spawn(tokio::io::sink());
    Client::new(
        Simulator::new(socket, config),
        ClientConfig::unicast(server),
        sink,
    )
}

/// Dropping the first K acknowledgements forces K resends; the server
/// applies the value once and flags the rest as duplicates.
#[tokio::test]
async fn dropped_acks_are_retried_without_double_counting() {
    const K: u32 = 4;

    let (server, serving) = serve(loopback().await);
    let mut client = lossy_client(
        server.local_addr(),
        loopback().await,
        SimulatorConfig::default().with_drop_first_acks(K),
    );

    client.discover().await;
    let ack = tokio::time::timeout(Duration::from_secs(5), client.submit(7))
        .await
        .expect("submit never converged")
        .unwrap();

    assert_eq!(ack.seq, 1);
    assert_eq!(ack.request_count, 1);
    assert_eq!(ack.total_sum, 7);
    assert!(
        ack.transmissions >= K + 1,
        "expected at least {} transmissions, got {}",
        K + 1,
        ack.transmissions
    );
    assert_eq!(client.transport().stats().acks_dropped, K);
    // Every dropped ack costs one full retransmit timeout.
    assert!(ack.elapsed >= Duration::from_millis(10) * K);
    assert_eq!(
        server.registry().aggregate(),
        Aggregate { request_count: 1, total_sum: 7 }
    );

    // The next submission starts fresh at sequence 2.
    let next = client.submit(3).await.unwrap();
    assert_eq!(next.seq, 2);
    assert_eq!(next.total_sum, 10);

    serving.abort();
}

/// Random loss in both directions on the client side still yields an exact
/// aggregate.
#[tokio::test]
async fn lossy_client_link_converges() {
    const VALUES: u32 = 20;

    let (server, serving) = serve(loopback().await);
    let mut client = lossy_client(
        server.local_addr(),
        loopback().await,
        SimulatorConfig::default().with_loss_rate(0.3).with_seed(7),
    );

    client.discover().await;
    let mut expected_sum = 0u64;
    for v in 1..=VALUES {
        let ack = tokio::time::timeout(Duration::from_secs(10), client.submit(v))
            .await
            .expect("submit never converged")
            .unwrap();
        expected_sum += u64::from(v);
        assert_eq!(ack.seq, v);
        assert_eq!(ack.request_count, v);
        assert_eq!(ack.total_sum, expected_sum);
    }

    assert_eq!(
        server.registry().aggregate(),
        Aggregate {
            request_count: VALUES,
            total_sum: expected_sum,
        }
    );

    serving.abort();
}

/// A server whose every reply is duplicated: the extra acks arrive while the
/// client is already waiting on the next sequence and must be ignored.
#[tokio::test]
async fn duplicated_acks_are_ignored() {
    let server_transport = Simulator::new(
        loopback().await,
        SimulatorConfig::default().with_duplicate_rate(1.0),
    );
    let (server, serving) = serve(server_transport);

    let (sink, _output) = sink::spawn(tokio::io::sink());
    let mut client = Client::new(
        loopback().await,
        ClientConfig::unicast(server.local_addr()),
        sink,
    );
    client.discover().await;

    for v in 1..=5u32 {
        let ack = tokio::time::timeout(Duration::from_secs(5), client.submit(v))
            .await
            .expect("submit never converged")
            .unwrap();
        assert_eq!(ack.seq, v);
        assert_eq!(ack.request_count, v);
    }
    assert_eq!(
        server.registry().aggregate(),
        Aggregate { request_count: 5, total_sum: 15 }
    );

    serving.abort();
}

/// Stale acks arriving faster than the retransmit timeout must not push the
/// deadline back: the Request is still resent on schedule and the third copy
/// is the one that gets answered.
#[tokio::test]
async fn stale_acks_do_not_postpone_retransmission() {
    let fake = Arc::new(loopback().await);
    let (sink, _output) = sink::spawn(tokio::io::sink());
    let mut client = Client::new(
        loopback().await,
        ClientConfig::unicast(fake.local_addr),
        sink,
    );
    let client_addr = client.transport().local_addr();

    let flood = tokio::spawn({
        let fake = Arc::clone(&fake);
        async move {
            let mut tick = tokio::time::interval(Duration::from_millis(3));
            loop {
                tick.tick().await;
                let _ = fake.send_to(&Packet::request_ack(99, 0, 0), client_addr).await;
            }
        }
    });

    let responder = tokio::spawn({
        let fake = Arc::clone(&fake);
        async move {
            let mut requests = 0u32;
            loop {
                let (pkt, from) = fake.recv_from().await.unwrap();
                match pkt.body {
                    Body::Discover => fake.send_to(&Packet::discover_ack(), from).await.unwrap(),
                    Body::Request { value } => {
                        requests += 1;
                        if requests == 3 {
                            let ack = Packet::request_ack(pkt.seq, 1, u64::from(value));
                            fake.send_to(&ack, from).await.unwrap();
                            return requests;
                        }
                    }
                    _ => {}
                }
            }
        }
    });

    client.discover().await;
    let ack = tokio::time::timeout(Duration::from_secs(5), client.submit(8))
        .await
        .expect("stale acks held off retransmission")
        .unwrap();

    assert_eq!(ack.seq, 1);
    assert_eq!(ack.total_sum, 8);
    assert_eq!(ack.transmissions, 3);
    assert!(ack.elapsed >= Duration::from_millis(20));
    assert_eq!(responder.await.unwrap(), 3);

    flood.abort();
}
