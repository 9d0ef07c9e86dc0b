//! Outbound frame state for stop-and-wait reliability.
//!
//! [`Sender`] tracks the alternating sequence bit and the single in-flight
//! frame.  It does **not** touch the socket; [`crate::transfer::RdtSender`]
//! calls these methods and owns the actual send/receive loop.
//!
//! # Stop-and-Wait contract
//! - At most **one** frame is in flight at any moment (`unacked`).
//! - A new frame may only be sent once `unacked` is `None`.
//! - On a matching ACK: flip `next_seq`; clear `unacked`.
//! - On a stale ACK: nothing changes; the transfer loop keeps waiting.
//! - On timeout or a lost ACK: increment `tx_count`; resend the same frame
//!   unchanged.

use crate::packet::{Ack, Control, Frame, SeqBit};

// ---------------------------------------------------------------------------
// RetransmitEntry
// ---------------------------------------------------------------------------

/// A frame that has been sent but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetransmitEntry {
    /// The frame on the wire.
    pub frame: Frame,
    /// How many times this frame has been transmitted (1 = first send).
    pub tx_count: u32,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Stop-and-wait send-side state for one transfer.
#[derive(Debug, Default)]
pub struct Sender {
    /// Sequence bit of the **next** frame to send.
    ///
    /// Flips each time an ACK for the in-flight frame is accepted.
    pub next_seq: SeqBit,

    /// The in-flight frame, or `None` when the sender is idle.
    pub unacked: Option<RetransmitEntry>,

    /// Total retransmissions across the whole transfer.
    pub retransmissions: u64,
}

impl Sender {
    /// A fresh sender; the first frame carries sequence bit 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_control(&self, control: Control) -> Frame {
        Frame::control(self.next_seq, control)
    }

    pub fn build_data(&self, chunk: Vec<u8>) -> Frame {
        Frame::data(self.next_seq, chunk)
    }

    /// Move `frame` into the in-flight slot (first transmission).
    ///
    /// Panics in debug mode if a frame is already in flight.
    pub fn record_sent(&mut self, frame: Frame) {
        debug_assert!(
            self.unacked.is_none(),
            "record_sent called while a frame is already in flight"
        );
        self.unacked = Some(RetransmitEntry {
            frame,
            tx_count: 1,
        });
    }

    /// Process an inbound ACK.
    ///
    /// Returns `true` if the ACK covers the in-flight frame.  A stale ACK
    /// (for the previous bit) or an ACK while idle returns `false` and leaves
    /// the state untouched.
    pub fn on_ack(&mut self, ack: Ack) -> bool {
        match self.unacked {
            Some(ref entry) if entry.frame.seq == ack.0 => {
                self.next_seq.flip();
                self.unacked = None;
                true
            }
            _ => false,
        }
    }

    /// Bump the transmit count of the in-flight frame before resending it.
    pub fn on_retransmit(&mut self) {
        if let Some(ref mut e) = self.unacked {
            e.tx_count += 1;
            self.retransmissions += 1;
        }
    }

    /// Number of times the in-flight frame has been sent, or `0` if idle.
    pub fn retransmit_count(&self) -> u32 {
        self.unacked.as_ref().map_or(0, |e| e.tx_count)
    }

    /// The frame awaiting an ACK, if any.
    pub fn in_flight(&self) -> Option<&Frame> {
        self.unacked.as_ref().map(|e| &e.frame)
    }
}
