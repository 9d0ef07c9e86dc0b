//! Accept loop and role assignment.
//!
//! The arbiter is one sequential task.  For each inbound connection it reads
//! the current [`SessionState`] and applies [`SessionState::admission`]:
//!
//! | state            | new connection becomes                |
//! |------------------|---------------------------------------|
//! | `Idle`           | seller of a fresh session             |
//! | `AwaitingParams` | rejected (busy)                       |
//! | `AwaitingBuyers` | buyer; the last one opens bidding     |
//! | `Bidding`        | rejected (bidding on-going)           |
//! | `Resolved`       | rejected (bidding on-going)           |
//!
//! Buyers are parked here until the last slot fills, then handed to the
//! bidding task as one batch.  When every task of a session has finished the
//! session drops, its id arrives on `closed`, and the arbiter goes back to
//! `Idle`.

use std::io;
use std::mem;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::channel::ControlChannel;
use crate::coordinator::{run_bidding, run_seller};
use crate::protocol;
use crate::session::Session;
use crate::state::{Admission, SessionState};

/// Server-side tuning.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Rejected auction requests or bids tolerated per connection before the
    /// session is aborted.  `None` re-prompts forever.
    pub max_invalid_attempts: Option<u32>,
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    next_id: u64,
    current: Option<(u64, Weak<Session>)>,
    /// Buyers admitted to the current session, in join order.
    pending: Vec<ControlChannel>,
    closed_tx: mpsc::UnboundedSender<u64>,
    closed_rx: mpsc::UnboundedReceiver<u64>,
}

impl Server {
    pub async fn bind(addr: SocketAddr, config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        Ok(Self {
            listener,
            config,
            next_id: 1,
            current: None,
            pending: Vec::new(),
            closed_tx,
            closed_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve auctions until the listener fails.
    pub async fn run(mut self) -> io::Result<()> {
        log::info!("[arbiter] listening on {}", self.local_addr()?);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.admit(stream, addr).await,
                    Err(e) => log::warn!("[arbiter] accept failed: {e}"),
                },
                Some(id) = self.closed_rx.recv() => self.on_closed(id),
            }
        }
    }

    fn live_session(&self) -> Option<Arc<Session>> {
        self.current
            .as_ref()
            .and_then(|(_, weak)| weak.upgrade())
            .filter(|session| !session.is_aborted())
    }

    async fn admit(&mut self, stream: TcpStream, addr: SocketAddr) {
        let mut channel = match ControlChannel::new(stream) {
            Ok(channel) => channel,
            Err(e) => {
                log::warn!("[arbiter] dropping {addr}: {e}");
                return;
            }
        };

        let session = self.live_session();
        let state = match &session {
            Some(s) => s.state(),
            // A session whose tasks have ended or aborted no longer blocks
            // the seller slot.
            None if self.current.is_some() => {
                self.reset();
                SessionState::Idle
            }
            None => SessionState::Idle,
        };

        match (state.admission(), session) {
            (Admission::Seller, _) => {
                let id = self.next_id;
                self.next_id += 1;
                let session = Session::new(id, addr, self.closed_tx.clone());
                self.current = Some((id, Arc::downgrade(&session)));
                log::info!("[arbiter] auction {id}: seller {addr}");
                if let Err(e) = channel.send_line(protocol::SELLER_ROLE).await {
                    log::warn!("[arbiter] seller {addr} lost: {e}");
                    return;
                }
                tokio::spawn(run_seller(
                    session,
                    channel,
                    self.config.max_invalid_attempts,
                ));
            }
            (Admission::Buyer, Some(session)) => self.admit_buyer(session, channel).await,
            (Admission::Busy, _) => reject(channel, protocol::BUSY).await,
            (Admission::BiddingBusy, _) | (Admission::Buyer, None) => {
                reject(channel, protocol::BIDDING_BUSY).await
            }
        }
    }

    async fn admit_buyer(&mut self, session: Arc<Session>, mut channel: ControlChannel) {
        let addr = channel.peer();
        let joined = match session.add_buyer(addr) {
            Ok(joined) => joined,
            Err(e) => {
                log::debug!("[arbiter] buyer {addr} refused: {e}");
                reject(channel, protocol::BIDDING_BUSY).await;
                return;
            }
        };
        log::info!(
            "[arbiter] auction {}: buyer #{} {addr} ({} more needed)",
            session.id(),
            joined.index,
            joined.remaining
        );

        let mut greeting = channel.send_line(protocol::BUYER_ROLE).await;
        if greeting.is_ok() && joined.remaining > 0 {
            greeting = channel.send_line(protocol::WAITING_FOR_BUYERS).await;
        }
        if let Err(e) = greeting {
            // The slot stays taken; bidding will fail on this buyer and abort.
            log::warn!("[arbiter] buyer {addr} lost: {e}");
        }
        self.pending.push(channel);

        if joined.remaining == 0 {
            let buyers = mem::take(&mut self.pending);
            tokio::spawn(run_bidding(
                session,
                buyers,
                self.config.max_invalid_attempts,
            ));
        }
    }

    fn on_closed(&mut self, id: u64) {
        if matches!(self.current, Some((current, _)) if current == id) {
            log::info!("[arbiter] auction {id} closed; restarting, waiting for a seller");
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.current = None;
        self.pending.clear();
    }
}

async fn reject(channel: ControlChannel, notice: &str) {
    let addr = channel.peer();
    log::info!("[arbiter] rejecting {addr}: {notice}");
    if let Err(e) = channel.finish(notice).await {
        log::debug!("[arbiter] {addr}: {e}");
    }
}
