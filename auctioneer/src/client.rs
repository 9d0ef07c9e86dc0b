//! Seller and buyer sides of the control protocol.
//!
//! The role is decided by the server.  Lines the user would type come from
//! any `AsyncBufRead` (stdin for the binary); every server line is echoed to
//! an `AsyncWrite` so an interactive user sees the prompts.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use rdt_over_udp::simulator::InvalidLossRate;
use rdt_over_udp::socket::SocketError;
use rdt_over_udp::{
    PerformanceLog, RdtReceiver, RdtSender, SendReport, Simulator, SimulatorConfig, Socket,
    TransferConfig, TransferError, TransferReport,
};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::channel::{ControlChannel, ProtocolError};
use crate::protocol::{self, HandshakeError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Busy(String),
    #[error("cannot reach auction server: {0}")]
    Connect(#[source] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error(transparent)]
    LossRate(#[from] InvalidLossRate),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("input ended before the server accepted a response")]
    InputExhausted,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: SocketAddr,
    /// UDP port for the item transfer; `0` picks an ephemeral one.
    pub transfer_port: u16,
    pub simulator: SimulatorConfig,
    /// Item file sent by a seller.
    pub file: PathBuf,
    /// Where a winning buyer writes the item.
    pub output: PathBuf,
    pub perf_log: PathBuf,
    pub transfer: TransferConfig,
}

impl ClientConfig {
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            transfer_port: 0,
            simulator: SimulatorConfig::default(),
            file: PathBuf::from("tosend.txt"),
            output: PathBuf::from("received.txt"),
            perf_log: PathBuf::from("performance.txt"),
            transfer: TransferConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ClientOutcome {
    /// Seller: item sold and delivered.
    Sold(SendReport),
    NotSold,
    /// Buyer: item won and received.
    Won(TransferReport),
    Lost,
}

/// Connect, take whatever role the server assigns and play it to the end.
pub async fn run<R, W>(
    config: &ClientConfig,
    input: R,
    console: W,
) -> Result<ClientOutcome, ClientError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let stream = TcpStream::connect(config.server)
        .await
        .map_err(ClientError::Connect)?;
    let mut client = Client {
        channel: ControlChannel::new(stream)?,
        input,
        console,
    };

    let role = client.recv().await?;
    if role.contains(protocol::MARK_BUSY) {
        return Err(ClientError::Busy(role));
    }
    if role.contains(protocol::MARK_SELLER) {
        log::info!("[client] role: seller");
        client.seller(config).await
    } else {
        log::info!("[client] role: buyer");
        client.buyer(config).await
    }
}

struct Client<R, W> {
    channel: ControlChannel,
    input: R,
    console: W,
}

impl<R, W> Client<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn seller(&mut self, config: &ClientConfig) -> Result<ClientOutcome, ClientError> {
        self.submit_until_accepted().await?;

        let result = self.recv().await?;
        if !result.starts_with(protocol::SOLD_PREFIX) {
            return Ok(ClientOutcome::NotSold);
        }

        let socket = self.bind_transfer(config).await?;
        let winner = self.read_peer().await?;
        log::info!("[client] sending {} to {winner}", config.file.display());
        let sim = Simulator::new(&config.simulator)?;
        let report = RdtSender::new(socket, winner, config.transfer.clone(), sim)
            .send_file(&config.file)
            .await?;
        Ok(ClientOutcome::Sold(report))
    }

    async fn buyer(&mut self, config: &ClientConfig) -> Result<ClientOutcome, ClientError> {
        while self.recv().await? != protocol::BIDDING_START {}
        self.submit_until_accepted().await?;

        let result = self.recv().await?;
        if !result.starts_with(protocol::WON_PREFIX) {
            return Ok(ClientOutcome::Lost);
        }

        let socket = self.bind_transfer(config).await?;
        let seller = self.read_peer().await?;
        log::info!("[client] receiving from {seller}");
        let sim = Simulator::new(&config.simulator)?;
        let report = RdtReceiver::new(socket, seller, sim)
            .receive_to_file(&config.output)
            .await?;

        PerformanceLog::new(&config.perf_log)
            .append(config.simulator.loss_rate, &report)
            .await?;
        self.echo(&format!(
            "Transmission finished: {} bytes in {:.3}s",
            report.bytes,
            report.elapsed.as_secs_f64()
        ))
        .await?;
        Ok(ClientOutcome::Won(report))
    }

    /// Send input lines until the server answers without `Invalid`.
    async fn submit_until_accepted(&mut self) -> Result<(), ClientError> {
        loop {
            let line = self.next_input().await?;
            self.channel.send_line(&line).await?;
            if !self.recv().await?.contains(protocol::MARK_INVALID) {
                return Ok(());
            }
        }
    }

    /// Bind the transfer socket and announce its port.
    async fn bind_transfer(&mut self, config: &ClientConfig) -> Result<Socket, ClientError> {
        let socket =
            Socket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.transfer_port))).await?;
        self.channel
            .send_line(&socket.local_addr.port().to_string())
            .await?;
        Ok(socket)
    }

    async fn read_peer(&mut self) -> Result<SocketAddr, ClientError> {
        let line = self.recv().await?;
        Ok(protocol::parse_endpoint(&line)?)
    }

    async fn recv(&mut self) -> Result<String, ClientError> {
        let line = self.channel.recv_line().await?;
        self.echo(&line).await?;
        Ok(line)
    }

    async fn echo(&mut self, line: &str) -> Result<(), ClientError> {
        self.console.write_all(line.as_bytes()).await?;
        self.console.write_all(b"\n").await?;
        self.console.flush().await?;
        Ok(())
    }

    async fn next_input(&mut self) -> Result<String, ClientError> {
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Err(ClientError::InputExhausted);
        }
        Ok(line.trim().to_string())
    }
}
