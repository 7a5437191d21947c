//! `sum-server` — accumulate values submitted by `sum-client`s.
//!
//! `main` owns only process setup (logging, argument parsing, Ctrl-C); all
//! protocol work lives in the library.

use anyhow::{Context, Result};
use clap::Parser;
use sum_over_udp::{sink, Server, ServerConfig};

/// Aggregation server over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// UDP port to listen on.
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls diagnostic verbosity; protocol output goes to stdout.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ServerConfig::any(cli.port);

    let (sink, output) = sink::spawn(tokio::io::stdout());
    let server = Server::bind(&config, sink)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    log::info!("listening on {}", server.local_addr());

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    drop(server);
    output.await?.context("writing output")?;
    Ok(())
}
