//! Stop-and-wait file transfer over a lossy datagram channel.
//!
//! # Architecture
//!
//! ```text
//!  RdtSender (seller)                          RdtReceiver (winner)
//!    ├── Sender          (seq bit, in-flight)    ├── Receiver  (expected bit, chunks)
//!    ├── RetransmitTimer (timeout, retry cap)    ├── Simulator (drops frames)
//!    ├── Simulator       (drops ACKs)            └── Socket
//!    └── Socket
//!
//!    start <n> ───────────────────────────────▶
//!              ◀─────────────────────────── ack 0
//!    data  ──────────────────────────────────▶
//!              ◀─────────────────────────── ack 1
//!    ...
//!    fin ────────────────────────────────────▶
//!              ◀──────────────────── ack x (three copies)
//! ```
//!
//! Each side drives its own loop; the two never share state beyond the wire.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::timeout_at;

use crate::metrics::TransferReport;
use crate::packet::{
    Ack, Control, Frame, SeqBit, DEFAULT_CHUNK_SIZE, HEADER_LEN, SOURCE_UNAVAILABLE_NOTICE,
};
use crate::receiver::{Event, Receiver};
use crate::sender::Sender;
use crate::simulator::Simulator;
use crate::socket::{Socket, SocketError};
use crate::timer::{RetransmitTimer, TimerConfig};

// ---------------------------------------------------------------------------
// Configuration & errors
// ---------------------------------------------------------------------------

/// Largest IPv4 UDP payload.
const MAX_DATAGRAM: usize = 65_507;

/// Largest chunk whose frame still fits in one datagram.
pub const MAX_CHUNK_SIZE: usize = MAX_DATAGRAM - HEADER_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("chunk size must be between 1 and {MAX_CHUNK_SIZE} bytes, got {0}")]
pub struct InvalidChunkSize(pub usize);

pub fn check_chunk_size(size: usize) -> Result<usize, InvalidChunkSize> {
    if (1..=MAX_CHUNK_SIZE).contains(&size) {
        Ok(size)
    } else {
        Err(InvalidChunkSize(size))
    }
}

/// Sender-side tuning.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Maximum data bytes per frame, at most [`MAX_CHUNK_SIZE`].
    pub chunk_size: usize,
    pub timer: TimerConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timer: TimerConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error(transparent)]
    ChunkSize(#[from] InvalidChunkSize),
    #[error("cannot read source file {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write output file: {0}")]
    Output(#[from] std::io::Error),
    #[error("frame seq={seq} unacknowledged after {attempts} transmissions")]
    MaxRetriesExceeded { seq: SeqBit, attempts: u32 },
    #[error("sender aborted the transfer: {0}")]
    SenderAborted(String),
}

// ---------------------------------------------------------------------------
// RdtSender
// ---------------------------------------------------------------------------

/// Counters for one completed send.
#[derive(Debug, Clone, PartialEq)]
pub struct SendReport {
    /// File bytes delivered.
    pub bytes: u64,
    /// Data frames acknowledged.
    pub data_frames: u64,
    /// Control frames acknowledged (`start` and `fin`).
    pub control_frames: u64,
    /// Frames put on the wire more than once, summed over all frames.
    pub retransmissions: u64,
    pub elapsed: Duration,
}

/// Seller side of a transfer.
pub struct RdtSender {
    socket: Socket,
    peer: SocketAddr,
    sender: Sender,
    timer: RetransmitTimer,
    sim: Simulator,
    chunk_size: usize,
    data_frames: u64,
    control_frames: u64,
}

impl RdtSender {
    pub fn new(socket: Socket, peer: SocketAddr, config: TransferConfig, sim: Simulator) -> Self {
        Self {
            socket,
            peer,
            sender: Sender::new(),
            timer: RetransmitTimer::new(config.timer),
            sim,
            chunk_size: config.chunk_size,
            data_frames: 0,
            control_frames: 0,
        }
    }

    /// Send the file at `path` to the peer.
    ///
    /// If the file cannot be read, a single error notice is sent (without
    /// waiting for an ACK) and [`TransferError::SourceUnavailable`] is returned.
    pub async fn send_file(mut self, path: impl AsRef<Path>) -> Result<SendReport, TransferError> {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(contents) => self.send_bytes(&contents).await,
            Err(source) => {
                log::warn!("[rdt:send] cannot open {}: {source}", path.display());
                let notice = self
                    .sender
                    .build_control(Control::Error(SOURCE_UNAVAILABLE_NOTICE.to_string()));
                self.socket.send_frame(&notice, self.peer).await?;
                Err(TransferError::SourceUnavailable {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Send an in-memory buffer as one transfer: `start`, data chunks, `fin`.
    pub async fn send_bytes(&mut self, contents: &[u8]) -> Result<SendReport, TransferError> {
        check_chunk_size(self.chunk_size)?;
        let started = Instant::now();
        let total = contents.len() as u64;

        log::info!("[rdt:send] start {total} bytes → {}", self.peer);
        let start = self.sender.build_control(Control::Start(total));
        self.deliver(start).await?;
        self.control_frames += 1;

        let mut sent = 0u64;
        for chunk in contents.chunks(self.chunk_size) {
            let frame = self.sender.build_data(chunk.to_vec());
            self.deliver(frame).await?;
            self.data_frames += 1;
            sent += chunk.len() as u64;
            log::debug!("[rdt:send] data {sent} / {total}");
        }

        let fin = self.sender.build_control(Control::Fin);
        self.deliver(fin).await?;
        self.control_frames += 1;

        let report = SendReport {
            bytes: sent,
            data_frames: self.data_frames,
            control_frames: self.control_frames,
            retransmissions: self.sender.retransmissions,
            elapsed: started.elapsed(),
        };
        log::info!(
            "[rdt:send] done: {} bytes, {} retransmissions",
            report.bytes,
            report.retransmissions
        );
        Ok(report)
    }

    /// Send `frame` and keep resending it until a matching ACK arrives.
    async fn deliver(&mut self, frame: Frame) -> Result<(), TransferError> {
        log::debug!("[rdt:send] → {frame}");
        self.socket.send_frame(&frame, self.peer).await?;
        self.sender.record_sent(frame);
        self.timer.reset();

        loop {
            if self.await_ack().await? {
                return Ok(());
            }

            let Some(frame) = self.sender.in_flight().cloned() else {
                return Ok(());
            };
            if !self.timer.back_off() {
                log::warn!("[rdt:send] giving up on seq={}", frame.seq);
                return Err(TransferError::MaxRetriesExceeded {
                    seq: frame.seq,
                    attempts: self.sender.retransmit_count(),
                });
            }
            self.sender.on_retransmit();
            log::debug!(
                "[rdt:send] ↻ {frame} (attempt {})",
                self.sender.retransmit_count()
            );
            self.socket.send_frame(&frame, self.peer).await?;
        }
    }

    /// Wait up to one timeout for an ACK.  Returns `true` if it acknowledged
    /// the in-flight frame and `false` when the frame must be resent.
    ///
    /// A stale ACK (the previous bit) is ignored: the clock keeps running and
    /// nothing is resent.
    async fn await_ack(&mut self) -> Result<bool, TransferError> {
        let deadline = tokio::time::Instant::now() + self.timer.timeout();
        loop {
            let (bytes, from) = match timeout_at(deadline, self.socket.recv_from()).await {
                Err(_elapsed) => {
                    log::debug!("[rdt:send] ack timeout");
                    return Ok(false);
                }
                Ok(result) => result?,
            };

            if self.sim.should_drop() {
                log::debug!("[rdt:send] ack dropped");
                return Ok(false);
            }
            if from != self.peer {
                log::warn!("[rdt:send] ack from unexpected sender {from}");
                return Ok(false);
            }

            match Ack::decode(&bytes) {
                Ok(ack) if self.sender.on_ack(ack) => {
                    log::debug!("[rdt:send] ← ack {}", ack.0);
                    return Ok(true);
                }
                Ok(ack) => log::debug!("[rdt:send] ← stale ack {}, still waiting", ack.0),
                Err(e) => {
                    log::debug!("[rdt:send] unreadable ack: {e}");
                    return Ok(false);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RdtReceiver
// ---------------------------------------------------------------------------

/// A fully reassembled transfer.
#[derive(Debug)]
pub struct Received {
    pub data: Vec<u8>,
    /// Size announced by `start`.
    pub total_bytes: u64,
    pub report: TransferReport,
}

/// Winning-buyer side of a transfer.
///
/// There is no receive timeout: if the sender disappears before `fin` is
/// accepted, [`RdtReceiver::receive`] waits forever.
pub struct RdtReceiver {
    socket: Socket,
    peer: SocketAddr,
    receiver: Receiver,
    sim: Simulator,
}

impl RdtReceiver {
    pub fn new(socket: Socket, peer: SocketAddr, sim: Simulator) -> Self {
        Self {
            socket,
            peer,
            receiver: Receiver::new(),
            sim,
        }
    }

    /// Run the receive loop until `fin` (or an abort notice) is accepted.
    pub async fn receive(mut self) -> Result<Received, TransferError> {
        let started = Instant::now();

        loop {
            let (bytes, from) = self.socket.recv_from().await?;

            if self.sim.should_drop() {
                log::debug!("[rdt:recv] frame dropped");
                continue;
            }
            if from != self.peer {
                log::debug!("[rdt:recv] ignoring datagram from {from}");
                continue;
            }
            let frame = match Frame::decode(&bytes) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("[rdt:recv] undecodable frame: {e}");
                    continue;
                }
            };

            log::debug!("[rdt:recv] ← {frame}");
            let delivery = self.receiver.on_frame(frame);
            for _ in 0..delivery.repeat {
                self.socket.send_ack(delivery.ack, self.peer).await?;
            }

            match delivery.event {
                Event::Duplicate => {
                    log::debug!(
                        "[rdt:recv] duplicate, expecting {}; re-ack {}",
                        self.receiver.expected_seq,
                        delivery.ack.0
                    );
                }
                Event::Started(total) => log::info!("[rdt:recv] start {total} bytes"),
                Event::Data(_) => log::debug!(
                    "[rdt:recv] data {} / {}",
                    self.receiver.bytes_received,
                    self.receiver.total_bytes
                ),
                Event::Finished => break,
                Event::Aborted(notice) => {
                    log::warn!("[rdt:recv] sender aborted: {notice}");
                    return Err(TransferError::SenderAborted(notice));
                }
            }
        }

        let report = TransferReport {
            bytes: self.receiver.bytes_received,
            elapsed: started.elapsed(),
        };
        let total_bytes = self.receiver.total_bytes;
        if report.bytes != total_bytes {
            log::warn!(
                "[rdt:recv] received {} bytes but start announced {total_bytes}",
                report.bytes
            );
        }
        log::info!(
            "[rdt:recv] finished: {} bytes in {:.3}s",
            report.bytes,
            report.elapsed.as_secs_f64()
        );

        Ok(Received {
            data: self.receiver.into_bytes(),
            total_bytes,
            report,
        })
    }

    /// Receive and write the assembled file to `path` in one go.
    pub async fn receive_to_file(
        self,
        path: impl AsRef<Path>,
    ) -> Result<TransferReport, TransferError> {
        let received = self.receive().await?;
        tokio::fs::write(path, &received.data).await?;
        Ok(received.report)
    }
}
