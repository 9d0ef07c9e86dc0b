//! Inbound frame handling and file reassembly.
//!
//! The [`Receiver`] is responsible for everything that happens *after* a raw
//! datagram is decoded into a [`crate::packet::Frame`] and *before* the file
//! is written:
//! - Checking the frame's sequence bit against the expected bit.
//! - Answering stale duplicates with the previous ACK, without reprocessing.
//! - Recording `start`, appending data in receipt order, spotting `fin`.
//!
//! The [`Receiver`] does **not** send ACKs itself; it returns a
//! [`Delivery`] telling [`crate::transfer::RdtReceiver`] which ACK to send and
//! how many times.

use crate::packet::{Ack, Control, Frame, Payload, SeqBit};

/// How many times the ACK for `fin` is repeated.
pub const FIN_ACK_REPEAT: usize = 3;

/// Outcome of feeding one frame to the [`Receiver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// ACK to put on the wire.
    pub ack: Ack,
    /// How many copies of `ack` to send.
    pub repeat: usize,
    /// What the frame meant for the transfer.
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Wrong sequence bit; the previous ACK is repeated.
    Duplicate,
    /// `start` accepted; the sender announced this many bytes.
    Started(u64),
    /// Data chunk of this length appended.
    Data(usize),
    /// `fin` accepted; the transfer is complete.
    Finished,
    /// The sender aborted with this notice.
    Aborted(String),
}

/// Receive-side transfer state; discarded once the file is written.
#[derive(Debug, Default)]
pub struct Receiver {
    /// Sequence bit the next new frame must carry.
    pub expected_seq: SeqBit,
    /// Size announced by `start` (0 until then).
    pub total_bytes: u64,
    /// Data bytes accepted so far.
    pub bytes_received: u64,
    /// Accepted data payloads, in receipt order.
    pub chunks: Vec<Vec<u8>>,
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one frame that already passed the loss and peer checks.
    pub fn on_frame(&mut self, frame: Frame) -> Delivery {
        if frame.seq != self.expected_seq {
            return Delivery {
                ack: Ack(self.expected_seq.flipped()),
                repeat: 1,
                event: Event::Duplicate,
            };
        }

        let ack = Ack(self.expected_seq);
        let (repeat, event) = match frame.payload {
            Payload::Control(Control::Start(total)) => {
                self.total_bytes = total;
                (1, Event::Started(total))
            }
            Payload::Control(Control::Fin) => (FIN_ACK_REPEAT, Event::Finished),
            Payload::Control(Control::Error(notice)) => (1, Event::Aborted(notice)),
            Payload::Data(bytes) => {
                let len = bytes.len();
                self.bytes_received += len as u64;
                self.chunks.push(bytes);
                (1, Event::Data(len))
            }
        };
        self.expected_seq.flip();

        Delivery { ack, repeat, event }
    }

    /// Concatenate every accepted chunk, consuming the state.
    pub fn into_bytes(self) -> Vec<u8> {
        self.chunks.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        let r = Receiver::new();
        assert_eq!(r.expected_seq, SeqBit::Zero);
        assert_eq!(r.bytes_received, 0);
        assert!(r.chunks.is_empty());
    }

    #[test]
    fn start_records_total_and_flips() {
        let mut r = Receiver::new();
        let d = r.on_frame(Frame::control(SeqBit::Zero, Control::Start(42)));
        assert_eq!(d.ack, Ack(SeqBit::Zero));
        assert_eq!(d.event, Event::Started(42));
        assert_eq!(r.total_bytes, 42);
        assert_eq!(r.expected_seq, SeqBit::One);
    }

    #[test]
    fn duplicate_is_reacked_without_appending() {
        let mut r = Receiver::new();
        r.on_frame(Frame::control(SeqBit::Zero, Control::Start(3)));
        r.on_frame(Frame::data(SeqBit::One, b"abc".to_vec()));

        let d = r.on_frame(Frame::data(SeqBit::One, b"abc".to_vec()));
        assert_eq!(d.event, Event::Duplicate);
        assert_eq!(d.ack, Ack(SeqBit::One));
        assert_eq!(r.chunks.len(), 1);
        assert_eq!(r.bytes_received, 3);
        assert_eq!(r.expected_seq, SeqBit::Zero);
    }

    #[test]
    fn retransmitted_start_is_duplicate() {
        let mut r = Receiver::new();
        r.on_frame(Frame::control(SeqBit::Zero, Control::Start(3)));
        let d = r.on_frame(Frame::control(SeqBit::Zero, Control::Start(3)));
        assert_eq!(d.event, Event::Duplicate);
        assert_eq!(d.ack, Ack(SeqBit::Zero));
    }

    #[test]
    fn fin_is_acked_three_times() {
        let mut r = Receiver::new();
        r.on_frame(Frame::control(SeqBit::Zero, Control::Start(0)));
        let d = r.on_frame(Frame::control(SeqBit::One, Control::Fin));
        assert_eq!(d.event, Event::Finished);
        assert_eq!(d.ack, Ack(SeqBit::One));
        assert_eq!(d.repeat, FIN_ACK_REPEAT);
    }

    #[test]
    fn chunks_concatenate_in_receipt_order() {
        let mut r = Receiver::new();
        r.on_frame(Frame::control(SeqBit::Zero, Control::Start(6)));
        r.on_frame(Frame::data(SeqBit::One, b"ab".to_vec()));
        r.on_frame(Frame::data(SeqBit::Zero, b"cd".to_vec()));
        r.on_frame(Frame::data(SeqBit::One, b"ef".to_vec()));
        assert_eq!(r.bytes_received, 6);
        assert_eq!(r.into_bytes(), b"abcdef");
    }

    #[test]
    fn error_notice_aborts() {
        let mut r = Receiver::new();
        let d = r.on_frame(Frame::control(
            SeqBit::Zero,
            Control::Error("no file".to_string()),
        ));
        assert_eq!(d.event, Event::Aborted("no file".to_string()));
        assert_eq!(d.ack, Ack(SeqBit::Zero));
    }
}
