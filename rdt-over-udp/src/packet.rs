//! Wire-format definitions for RDT frames and acknowledgements.
//!
//! Every datagram the sender emits is a [`Frame`]; every datagram the receiver
//! emits is an [`Ack`].  This module is responsible for:
//! - Defining the on-wire layout (sequence digit, type digit, payload).
//! - Serialising frames and acks into bytes ready for transmission.
//! - Deserialising raw bytes back, returning errors for malformed input.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! ```text
//!  +-----+------+---------------------------------------+
//!  | seq | kind |               payload ...             |
//!  +-----+------+---------------------------------------+
//!    1B    1B      0..chunk_size bytes
//! ```
//!
//! `seq` and `kind` are ASCII digits: `seq` is `'0'` or `'1'`, `kind` is
//! `'0'` for control and `'1'` for data.  Control payloads are UTF-8 text
//! (see [`Control`]); data payloads are raw file bytes.
//!
//! An acknowledgement is the bare ASCII digit of the sequence bit it
//! acknowledges (`"0"` or `"1"`).

use std::fmt;

use thiserror::Error;

/// Byte length of the fixed frame header (sequence digit + type digit).
pub const HEADER_LEN: usize = 2;

/// Default number of file bytes carried by one data frame.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

const KIND_CONTROL: u8 = b'0';
const KIND_DATA: u8 = b'1';

/// Text sent in place of `start` when the sender cannot open its file.
pub const SOURCE_UNAVAILABLE_NOTICE: &str = "Can't open file item. Exiting.";

// ---------------------------------------------------------------------------
// SeqBit
// ---------------------------------------------------------------------------

/// Alternating-bit sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeqBit {
    #[default]
    Zero,
    One,
}

impl SeqBit {
    /// The other bit.
    pub fn flipped(self) -> Self {
        match self {
            SeqBit::Zero => SeqBit::One,
            SeqBit::One => SeqBit::Zero,
        }
    }

    /// Flip in place.
    pub fn flip(&mut self) {
        *self = self.flipped();
    }

    /// ASCII digit used on the wire.
    pub fn as_ascii(self) -> u8 {
        match self {
            SeqBit::Zero => b'0',
            SeqBit::One => b'1',
        }
    }

    /// Parse the ASCII digit used on the wire.
    pub fn from_ascii(byte: u8) -> Result<Self, FrameError> {
        match byte {
            b'0' => Ok(SeqBit::Zero),
            b'1' => Ok(SeqBit::One),
            other => Err(FrameError::BadSequence(other)),
        }
    }
}

impl fmt::Display for SeqBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeqBit::Zero => write!(f, "0"),
            SeqBit::One => write!(f, "1"),
        }
    }
}

// ---------------------------------------------------------------------------
// Control payloads
// ---------------------------------------------------------------------------

/// Text payload of a control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// `start <total_bytes>` — opens a transfer and announces its size.
    Start(u64),
    /// `fin` — the last data frame has been acknowledged.
    Fin,
    /// Any other text: the sender gave up and is telling the peer why.
    Error(String),
}

impl Control {
    fn to_text(&self) -> String {
        match self {
            Control::Start(total) => format!("start {total}"),
            Control::Fin => "fin".to_string(),
            Control::Error(notice) => notice.clone(),
        }
    }

    fn parse(text: &str) -> Result<Self, FrameError> {
        if text == "fin" {
            return Ok(Control::Fin);
        }
        if let Some(rest) = text.strip_prefix("start ") {
            let total = rest
                .trim()
                .parse::<u64>()
                .map_err(|_| FrameError::BadStart(text.to_string()))?;
            return Ok(Control::Start(total));
        }
        Ok(Control::Error(text.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// What a frame carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Control(Control),
    Data(Vec<u8>),
}

/// A complete RDT datagram: sequence bit + payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: SeqBit,
    pub payload: Payload,
}

impl Frame {
    pub fn control(seq: SeqBit, control: Control) -> Self {
        Self {
            seq,
            payload: Payload::Control(control),
        }
    }

    pub fn data(seq: SeqBit, bytes: Vec<u8>) -> Self {
        Self {
            seq,
            payload: Payload::Data(bytes),
        }
    }

    /// Serialise this frame into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let (kind, body) = match &self.payload {
            Payload::Control(c) => (KIND_CONTROL, c.to_text().into_bytes()),
            Payload::Data(bytes) => (KIND_DATA, bytes.clone()),
        };
        let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
        buf.push(self.seq.as_ascii());
        buf.push(kind);
        buf.extend_from_slice(&body);
        buf
    }

    /// Parse a [`Frame`] from a raw datagram.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - either header digit is not a recognised ASCII digit, or
    /// - a control payload is not UTF-8 or carries a malformed `start`.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_LEN {
            return Err(FrameError::BufferTooShort);
        }

        let seq = SeqBit::from_ascii(buf[0])?;
        let body = &buf[HEADER_LEN..];

        let payload = match buf[1] {
            KIND_CONTROL => {
                let text = std::str::from_utf8(body).map_err(|_| FrameError::ControlNotUtf8)?;
                Payload::Control(Control::parse(text)?)
            }
            KIND_DATA => Payload::Data(body.to_vec()),
            other => return Err(FrameError::BadKind(other)),
        };

        Ok(Frame { seq, payload })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Control(c) => write!(f, "control seq={} {:?}", self.seq, c.to_text()),
            Payload::Data(bytes) => write!(f, "data seq={} len={}", self.seq, bytes.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// Ack
// ---------------------------------------------------------------------------

/// Acknowledgement of one sequence bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack(pub SeqBit);

impl Ack {
    pub fn encode(self) -> Vec<u8> {
        vec![self.0.as_ascii()]
    }

    /// An ack is valid only if it is the decimal text of `0` or `1`.
    ///
    /// Surrounding whitespace is tolerated; anything else is rejected.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let text = std::str::from_utf8(buf).map_err(|_| FrameError::BadAck)?;
        match text.trim().parse::<u8>() {
            Ok(0) => Ok(Ack(SeqBit::Zero)),
            Ok(1) => Ok(Ack(SeqBit::One)),
            _ => Err(FrameError::BadAck),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("buffer too short to contain a frame header")]
    BufferTooShort,
    #[error("invalid sequence digit {0:#04x}")]
    BadSequence(u8),
    #[error("invalid frame type digit {0:#04x}")]
    BadKind(u8),
    #[error("control payload is not valid UTF-8")]
    ControlNotUtf8,
    #[error("malformed start message: {0:?}")]
    BadStart(String),
    #[error("acknowledgement is not a sequence digit")]
    BadAck,
}
