//! Entry point for `auctioneer`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client**
//! mode.  `main.rs` owns only process setup (logging, argument parsing); the
//! work lives in the library.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use auctioneer::{client, ClientConfig, ClientError, ClientOutcome, Server, ServerConfig};
use clap::{Parser, Subcommand};
use rdt_over_udp::packet::DEFAULT_CHUNK_SIZE;
use rdt_over_udp::{check_chunk_size, SimulatorConfig, TimerConfig, TransferConfig};
use tokio::io::BufReader;

/// Sealed-bid auctions with reliable item delivery over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run the auction server.
    Server {
        /// TCP port to listen on.
        port: u16,
        /// Invalid requests or bids tolerated per client (default: unlimited).
        #[arg(long)]
        max_invalid_attempts: Option<u32>,
    },
    /// Join an auction as seller or buyer.
    Client {
        server_ip: IpAddr,
        server_port: u16,
        /// UDP port for the item transfer.
        transfer_port: u16,
        /// Simulated loss probability in [0, 1).
        #[arg(default_value_t = 0.0)]
        loss_rate: f64,
        /// File to send when selling.
        #[arg(long, default_value = "tosend.txt")]
        file: PathBuf,
        /// Where to write the item when winning.
        #[arg(long, default_value = "received.txt")]
        output: PathBuf,
        #[arg(long, default_value = "performance.txt")]
        perf_log: PathBuf,
        /// Data bytes per frame.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
        chunk_size: usize,
        /// ACK timeout in milliseconds.
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
        /// Retransmissions per frame before giving up (default: unlimited).
        #[arg(long)]
        max_retries: Option<u32>,
        /// Seed for the loss simulator.
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn parse_chunk_size(raw: &str) -> Result<usize, String> {
    let size: usize = raw.parse().map_err(|e| format!("{e}"))?;
    check_chunk_size(size).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    match Cli::parse().mode {
        Mode::Server {
            port,
            max_invalid_attempts,
        } => {
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
            let server = Server::bind(addr, ServerConfig { max_invalid_attempts })
                .await
                .with_context(|| format!("binding auction server on {addr}"))?;
            server.run().await.context("auction server stopped")?;
        }
        Mode::Client {
            server_ip,
            server_port,
            transfer_port,
            loss_rate,
            file,
            output,
            perf_log,
            chunk_size,
            timeout_ms,
            max_retries,
            seed,
        } => {
            let mut config = ClientConfig::new(SocketAddr::new(server_ip, server_port));
            config.transfer_port = transfer_port;
            config.simulator = SimulatorConfig { loss_rate, seed };
            config.file = file;
            config.output = output;
            config.perf_log = perf_log;
            config.transfer = TransferConfig {
                chunk_size,
                timer: TimerConfig {
                    ack_timeout: Duration::from_millis(timeout_ms),
                    max_retries,
                },
            };

            let stdin = BufReader::new(tokio::io::stdin());
            match client::run(&config, stdin, tokio::io::stdout()).await {
                Ok(ClientOutcome::Sold(report)) => println!(
                    "Sent {} bytes in {:.3}s ({} retransmissions)",
                    report.bytes,
                    report.elapsed.as_secs_f64(),
                    report.retransmissions
                ),
                Ok(ClientOutcome::Won(report)) => println!(
                    "Saved {} bytes to {} ({:.1} bytes/s)",
                    report.bytes,
                    config.output.display(),
                    report.throughput()
                ),
                Ok(ClientOutcome::NotSold | ClientOutcome::Lost) => {}
                // The notice was already echoed.
                Err(ClientError::Busy(_)) => {}
                Err(e) => return Err(e).context("auction client failed"),
            }
        }
    }
    Ok(())
}
