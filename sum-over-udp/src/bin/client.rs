//! `sum-client` — read numbers from stdin and submit each to the server.
//!
//! The server is found by broadcasting on the given port.  One value per
//! line; the process ends when stdin does.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use sum_over_udp::{sink, Client, ClientConfig, Socket};
use tokio::io::BufReader;

/// Aggregation client over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// UDP port the server listens on.
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls diagnostic verbosity; protocol output goes to stdout.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ClientConfig::broadcast(cli.port);

    let local = SocketAddr::from(([0, 0, 0, 0], 0));
    let socket = Socket::bind(local)
        .await
        .with_context(|| format!("binding {local}"))?;

    let (sink, output) = sink::spawn(tokio::io::stdout());
    let mut client = Client::new(socket, config, sink);
    client
        .run(BufReader::new(tokio::io::stdin()))
        .await
        .context("reading stdin")?;

    drop(client);
    output.await?.context("writing output")?;
    Ok(())
}
