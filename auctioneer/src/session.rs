//! Shared state of the one live auction.
//!
//! An [`AuctionSession`] sits inside a `tokio::sync::watch` channel owned by a
//! [`Session`].  The seller task, the bidding task and the arbiter mutate it
//! with `send_modify`; tasks that must wait for the other side (resolution,
//! transfer endpoints) block in `wait_for` instead of polling.
//!
//! The arbiter keeps only a `Weak` handle.  Each task holds an `Arc<Session>`,
//! so when the last task ends the session drops and the arbiter is told
//! through the `closed` channel that it may start a fresh auction.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::protocol::AuctionParams;
use crate::resolver::Resolution;
use crate::state::SessionState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session aborted")]
    Aborted,
    #[error("session is {0}, not accepting buyers")]
    NotAcceptingBuyers(SessionState),
    #[error("no buyer slot {0}")]
    NoSuchBuyer(usize),
    #[error("buyer #{0} has not bid")]
    MissingBid(usize),
}

/// One joined buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidderSlot {
    pub addr: SocketAddr,
    pub bid: Option<u64>,
}

/// Which side of the transfer handshake is speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Seller,
    Winner,
}

#[derive(Debug, Clone)]
pub struct AuctionSession {
    pub state: SessionState,
    pub params: Option<AuctionParams>,
    pub seller_addr: SocketAddr,
    /// Join order; never longer than `params.bidder_count`.
    pub buyers: Vec<BidderSlot>,
    pub resolution: Option<Resolution>,
    pub seller_transfer: Option<SocketAddr>,
    pub winner_transfer: Option<SocketAddr>,
    pub aborted: bool,
}

impl AuctionSession {
    fn new(seller_addr: SocketAddr) -> Self {
        Self {
            state: SessionState::AwaitingParams,
            params: None,
            seller_addr,
            buyers: Vec::new(),
            resolution: None,
            seller_transfer: None,
            winner_transfer: None,
            aborted: false,
        }
    }

    fn endpoint(&self, party: Party) -> Option<SocketAddr> {
        match party {
            Party::Seller => self.seller_transfer,
            Party::Winner => self.winner_transfer,
        }
    }
}

/// Outcome of [`Session::add_buyer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    /// Position in join order.
    pub index: usize,
    /// Buyers still needed before bidding opens.
    pub remaining: usize,
}

pub struct Session {
    id: u64,
    tx: watch::Sender<AuctionSession>,
    closed: mpsc::UnboundedSender<u64>,
}

impl Session {
    pub fn new(id: u64, seller_addr: SocketAddr, closed: mpsc::UnboundedSender<u64>) -> Arc<Self> {
        let (tx, _rx) = watch::channel(AuctionSession::new(seller_addr));
        Arc::new(Self { id, tx, closed })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().state
    }

    pub fn snapshot(&self) -> AuctionSession {
        self.tx.borrow().clone()
    }

    pub fn accept_params(&self, params: AuctionParams) {
        self.tx.send_modify(|s| {
            s.params = Some(params);
            s.state = SessionState::AwaitingBuyers;
        });
    }

    /// Append a buyer.  The last slot moves the session to `Bidding`.
    pub fn add_buyer(&self, addr: SocketAddr) -> Result<Joined, SessionError> {
        let mut outcome = Err(SessionError::NotAcceptingBuyers(self.state()));
        self.tx.send_if_modified(|s| {
            let expected = match (&s.params, s.state) {
                (Some(p), SessionState::AwaitingBuyers) if s.buyers.len() < p.bidder_count => {
                    p.bidder_count
                }
                _ => {
                    outcome = Err(SessionError::NotAcceptingBuyers(s.state));
                    return false;
                }
            };
            s.buyers.push(BidderSlot { addr, bid: None });
            let remaining = expected - s.buyers.len();
            if remaining == 0 {
                s.state = SessionState::Bidding;
            }
            outcome = Ok(Joined {
                index: s.buyers.len() - 1,
                remaining,
            });
            true
        });
        outcome
    }

    pub fn record_bid(&self, index: usize, bid: u64) -> Result<(), SessionError> {
        let mut found = false;
        self.tx.send_if_modified(|s| match s.buyers.get_mut(index) {
            Some(slot) => {
                slot.bid = Some(bid);
                found = true;
                true
            }
            None => false,
        });
        if found {
            Ok(())
        } else {
            Err(SessionError::NoSuchBuyer(index))
        }
    }

    /// Every recorded bid in join order.
    pub fn bids(&self) -> Result<Vec<u64>, SessionError> {
        self.tx
            .borrow()
            .buyers
            .iter()
            .enumerate()
            .map(|(index, slot)| slot.bid.ok_or(SessionError::MissingBid(index)))
            .collect()
    }

    pub fn publish_resolution(&self, resolution: Resolution) {
        self.tx.send_modify(|s| {
            s.resolution = Some(resolution);
            s.state = SessionState::Resolved;
        });
    }

    /// Mark the session dead and wake every waiter.
    pub fn abort(&self) {
        self.tx.send_modify(|s| s.aborted = true);
    }

    pub fn is_aborted(&self) -> bool {
        self.tx.borrow().aborted
    }

    /// Block until the bidding task publishes a resolution.
    pub async fn wait_resolution(&self) -> Result<Resolution, SessionError> {
        let mut rx = self.tx.subscribe();
        let s = rx
            .wait_for(|s| s.aborted || s.resolution.is_some())
            .await
            .map_err(|_| SessionError::Aborted)?;
        match (s.aborted, s.resolution) {
            (false, Some(resolution)) => Ok(resolution),
            _ => Err(SessionError::Aborted),
        }
    }

    /// Publish this party's transfer endpoint and wait for the other's.
    pub async fn exchange(
        &self,
        party: Party,
        endpoint: SocketAddr,
    ) -> Result<SocketAddr, SessionError> {
        let other = match party {
            Party::Seller => Party::Winner,
            Party::Winner => Party::Seller,
        };
        self.tx.send_modify(|s| match party {
            Party::Seller => s.seller_transfer = Some(endpoint),
            Party::Winner => s.winner_transfer = Some(endpoint),
        });

        let mut rx = self.tx.subscribe();
        let s = rx
            .wait_for(|s| s.aborted || s.endpoint(other).is_some())
            .await
            .map_err(|_| SessionError::Aborted)?;
        match (s.aborted, s.endpoint(other)) {
            (false, Some(peer)) => Ok(peer),
            _ => Err(SessionError::Aborted),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The arbiter may already be gone during shutdown.
        let _ = self.closed.send(self.id);
    }
}
