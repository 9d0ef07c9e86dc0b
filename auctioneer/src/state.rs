//! Auction session finite-state machine (FSM) types.
//!
//! This module defines every state an auction session can occupy.  State
//! transitions are *not* implemented here — they live in
//! [`crate::arbiter`] and [`crate::coordinator`] — but the legal transitions
//! are documented so the accept policy can be read off one table.
//!
//! ```text
//!  IDLE ──first connection──▶ AWAITING_PARAMS ──valid request──▶ AWAITING_BUYERS
//!   ▲                                                                  │
//!   │                                                     Nth buyer    │
//!   │                                                                  ▼
//!   └──────── session dropped ◀──────── RESOLVED ◀──bids resolved── BIDDING
//! ```

use std::fmt;

/// All possible states of the auction session FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No auction exists; the next connection becomes the seller.
    #[default]
    Idle,
    /// Seller connected; auction request not yet accepted.
    AwaitingParams,
    /// Terms accepted; buyer slots are open.
    AwaitingBuyers,
    /// All buyers joined; bids are being collected.
    Bidding,
    /// Winner (or no sale) decided; results and handoff in progress.
    Resolved,
}

/// What the arbiter does with a new connection in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Seller,
    Buyer,
    /// Seller slot taken and still configuring.
    Busy,
    /// Bidding under way or finishing.
    BiddingBusy,
}

impl SessionState {
    pub fn admission(self) -> Admission {
        match self {
            SessionState::Idle => Admission::Seller,
            SessionState::AwaitingParams => Admission::Busy,
            SessionState::AwaitingBuyers => Admission::Buyer,
            SessionState::Bidding | SessionState::Resolved => Admission::BiddingBusy,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
