//! Retransmit timeout and retry policy.
//!
//! The stop-and-wait sender waits a fixed [`TimerConfig::ack_timeout`] for
//! each ACK; there is no RTT estimation and no back-off.  Every expiry (or
//! rejected ACK) costs one retry against [`TimerConfig::max_retries`].
//!
//! `max_retries = None` keeps retrying forever.  That matches the protocol as
//! deployed, but a sender whose peer has vanished will then never return, so
//! callers that need liveness should set a cap.

use std::time::Duration;

/// Default wait for an ACK before the frame is resent.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Adjustable timeout parameters.
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// How long to wait for an ACK after each transmission.
    pub ack_timeout: Duration,
    /// Retransmissions allowed per frame (`None` = unbounded).
    pub max_retries: Option<u32>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retries: None,
        }
    }
}

/// Per-frame retry accounting.
#[derive(Debug)]
pub struct RetransmitTimer {
    pub config: TimerConfig,
    /// Retries spent on the current frame.
    retries: u32,
}

impl RetransmitTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self { config, retries: 0 }
    }

    /// Wait budget for one ACK.
    pub fn timeout(&self) -> Duration {
        self.config.ack_timeout
    }

    /// Record one failed attempt.  Returns `false` once the cap is exceeded.
    pub fn back_off(&mut self) -> bool {
        self.retries = self.retries.saturating_add(1);
        self.config.max_retries.map_or(true, |cap| self.retries <= cap)
    }

    /// Start counting afresh for the next frame.
    pub fn reset(&mut self) {
        self.retries = 0;
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}
