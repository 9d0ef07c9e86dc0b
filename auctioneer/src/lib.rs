//! `auctioneer` — one sealed-bid auction at a time, with the sold item
//! delivered to the winner over [`rdt_over_udp`].
//!
//! ```text
//!            TCP control lines                       UDP (RDT)
//!  seller ──────────────────▶ ┌─────────┐
//!  buyer  ──────────────────▶ │ arbiter │      seller ═══════════▶ winner
//!  buyer  ──────────────────▶ └────┬────┘
//!                                  │ spawns
//!                     ┌────────────┴────────────┐
//!               seller task               bidding task
//!                     └──────▶ Session ◀────────┘
//!                          (watch channel)
//! ```
//!
//! - [`arbiter`]     — accept loop, role assignment, session restart
//! - [`coordinator`] — seller and bidding tasks
//! - [`session`]     — shared auction record and rendezvous
//! - [`state`]       — session FSM and admission table
//! - [`resolver`]    — winner and clearing price
//! - [`protocol`]    — control-line vocabulary
//! - [`channel`]     — newline-delimited TCP connection
//! - [`client`]      — seller / buyer flows

pub mod arbiter;
pub mod channel;
pub mod client;
pub mod coordinator;
pub mod protocol;
pub mod resolver;
pub mod session;
pub mod state;

pub use arbiter::{Server, ServerConfig};
pub use client::{ClientConfig, ClientError, ClientOutcome};
pub use protocol::{AuctionParams, AuctionType};
pub use resolver::{resolve, Resolution};
