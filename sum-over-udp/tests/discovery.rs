//! Integration tests for the discovery handshake against a real server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sum_over_udp::{
    simulator::{Simulator, SimulatorConfig},
    sink,
    state::ClientState,
    Client, ClientConfig, ClientError, Server, Socket, Transport,
};

async fn loopback() -> Socket {
    Socket::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap())
        .await
        .expect("bind loopback socket")
}

/// The client learns the server's address and the server registers the
/// client with a zeroed record.
#[tokio::test]
async fn client_discovers_server_and_is_registered() {
    let (sink, _out) = sink::spawn(tokio::io::sink());
    let server = Arc::new(Server::new(loopback().await, sink));
    let serving = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });

    let (sink, _out) = sink::spawn(tokio::io::sink());
    let mut client = Client::new(
        loopback().await,
        ClientConfig::unicast(server.local_addr()),
        sink,
    );
    assert_eq!(client.state(), ClientState::Discovering);
    assert_eq!(client.submit(1).await, Err(ClientError::ServerNotFound));

    let found = tokio::time::timeout(Duration::from_secs(5), client.discover())
        .await
        .expect("discovery timed out");

    assert_eq!(found, server.local_addr());
    assert_eq!(client.state(), ClientState::Ready { server: found });

    let record = server
        .registry()
        .lookup(client.transport().local_addr())
        .expect("client should be registered");
    assert_eq!(record.highest_seq_seen, 0);
    assert_eq!(record.last_known_sum, 0);

    serving.abort();
}

/// Discovery survives a lossy link by re-broadcasting.
#[tokio::test]
async fn discovery_retries_through_loss() {
    let (sink, _out) = sink::spawn(tokio::io::sink());
    let server = Arc::new(Server::new(loopback().await, sink));
    let serving = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });

    let (sink, _out) = sink::spawn(tokio::io::sink());
    let lossy = Simulator::new(
        loopback().await,
        SimulatorConfig::default().with_loss_rate(0.5).with_seed(42),
    );
    let mut client = Client::new(lossy, ClientConfig::unicast(server.local_addr()), sink);

    let found = tokio::time::timeout(Duration::from_secs(10), client.discover())
        .await
        .expect("discovery timed out");
    assert_eq!(found, server.local_addr());

    serving.abort();
}

/// Lines typed before the server answers are dropped, not queued.
#[tokio::test]
async fn input_before_discovery_is_dropped() {
    // Nobody answers at this address, so discovery never completes.
    let silent = loopback().await;
    let (sink, _out) = sink::spawn(tokio::io::sink());
    let mut client = Client::new(
        loopback().await,
        ClientConfig::unicast(silent.local_addr),
        sink,
    );

    let input: &[u8] = b"1\n2\n3\n";
    let res = tokio::time::timeout(Duration::from_millis(200), client.run(input)).await;

    assert!(res.is_err(), "run must keep discovering after input ends");
    assert_eq!(client.state(), ClientState::Discovering);
    assert_eq!(client.next_seq(), 1);
}
