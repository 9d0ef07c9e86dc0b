//! `rdt-over-udp` — stop-and-wait reliable file delivery over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐    frames     ┌──────────┐
//!  │  Sender  │──────────────▶│ Receiver │
//!  └────┬─────┘               └─────┬────┘
//!       │                           │
//!       │          ACKs             │
//!       │◀──────────────────────────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │   RdtSender / RdtReceiver         │
//!  │ (transfer loops, loss simulator)  │
//!  └────┬──────────────────────────────┘
//!       │ raw UDP datagrams
//!  ┌────▼──────┐
//!  │  Socket   │  (thin async wrapper around tokio UdpSocket)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]    — wire format for frames and ACKs
//! - [`sender`]    — stop-and-wait outbound frame state
//! - [`receiver`]  — inbound sequencing and chunk reassembly
//! - [`transfer`]  — the async send / receive loops
//! - [`timer`]     — ACK timeout and retry cap
//! - [`simulator`] — injectable datagram loss
//! - [`socket`]    — async UDP socket abstraction
//! - [`metrics`]   — transfer report and performance log

pub mod metrics;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod socket;
pub mod timer;
pub mod transfer;

pub use metrics::{PerformanceLog, TransferReport};
pub use simulator::{Simulator, SimulatorConfig};
pub use socket::Socket;
pub use timer::TimerConfig;
pub use transfer::{
    check_chunk_size, InvalidChunkSize, RdtReceiver, RdtSender, Received, SendReport,
    TransferConfig, TransferError, MAX_CHUNK_SIZE,
};
