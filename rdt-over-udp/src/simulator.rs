//! Loss injection for the datagram channel.
//!
//! Real networks drop packets.  To exercise the retransmission logic without
//! depending on actual network conditions, both transfer roles consult a
//! [`Simulator`] once for every unit they receive (frames on the receiver,
//! ACKs on the sender).  A unit the simulator drops is treated as if it never
//! arrived.
//!
//! | Mode      | Description                                            |
//! |-----------|--------------------------------------------------------|
//! | Random    | Drop each unit independently with `loss_rate`.         |
//! | Scripted  | Replay a fixed drop/keep sequence, then keep all.      |
//!
//! Random mode takes an optional seed so test failures are reproducible.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Configuration for the fault-injection model.
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    /// Probability in `[0.0, 1.0)` that any given unit is dropped.
    pub loss_rate: f64,
    /// Seed for the drop RNG (`None` = seeded from the OS).
    pub seed: Option<u64>,
}

#[derive(Debug, Error, PartialEq)]
#[error("loss rate must be in [0, 1), got {0}")]
pub struct InvalidLossRate(pub f64);

#[derive(Debug)]
enum Mode {
    Random { rng: StdRng, loss_rate: f64 },
    Scripted(VecDeque<bool>),
}

/// Decides, unit by unit, whether the channel loses a datagram.
#[derive(Debug)]
pub struct Simulator {
    mode: Mode,
}

impl Simulator {
    /// Build a random-loss simulator from `config`.
    pub fn new(config: &SimulatorConfig) -> Result<Self, InvalidLossRate> {
        let rate = config.loss_rate;
        if !(0.0..1.0).contains(&rate) {
            return Err(InvalidLossRate(rate));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            mode: Mode::Random {
                rng,
                loss_rate: rate,
            },
        })
    }

    /// A lossless pass-through channel.
    pub fn lossless() -> Self {
        Self::scripted(Vec::new())
    }

    /// Drop exactly the units whose position in `script` is `true`; every
    /// unit past the end of the script is delivered.
    pub fn scripted(script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            mode: Mode::Scripted(script.into_iter().collect()),
        }
    }

    /// Consult the model for the next unit.  Returns `true` if it is lost.
    pub fn should_drop(&mut self) -> bool {
        match &mut self.mode {
            Mode::Random { rng, loss_rate } => *loss_rate > 0.0 && rng.gen_bool(*loss_rate),
            Mode::Scripted(script) => script.pop_front().unwrap_or(false),
        }
    }
}
