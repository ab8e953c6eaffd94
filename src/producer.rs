// src/producer.rs

use std::thread;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::blocktime::{BlockGenerationState, BlockTimeCalculator, BlockTimeError};

pub const DEFAULT_TICK_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ProducerLoopConfig {
    /// Polling cadence of the loop. Each tick re-asks the schedule; a slot is
    /// produced into at most once however many ticks land inside it.
    pub tick: Duration,
}

impl Default for ProducerLoopConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }
}

// Generic over a concrete node type so tests can swap fakes
pub trait ProducerNode {
    /// Called once per owned slot with the slot being produced into.
    fn generate(&mut self, state: &BlockGenerationState) -> anyhow::Result<()>;
}

/// Ties the schedule to a producing node: tick, ask the calculator whether
/// this position owns the current slot, fire the node if so.
pub struct ProducerLoop<N> {
    calc: BlockTimeCalculator,
    position: u64,
    node: N,
    cfg: ProducerLoopConfig,
    /// Start of the slot last produced into, so extra ticks within one slot
    /// stay idle.
    last_attempt: Option<SystemTime>,
}

impl<N: ProducerNode> ProducerLoop<N> {
    pub fn new(
        calc: BlockTimeCalculator,
        position: u64,
        node: N,
        cfg: ProducerLoopConfig,
    ) -> Self {
        Self {
            calc,
            position,
            node,
            cfg,
            last_attempt: None,
        }
    }

    /// Single tick. Returns whether the node generated successfully.
    ///
    /// Pre-genesis clocks log a warning and idle; the producer keeps ticking
    /// until genesis arrives. Generation failures are logged and the slot is
    /// not retried, the next owned slot gets a fresh attempt.
    pub fn tick_once(&mut self) -> bool {
        let eligible = match self.calc.time_to_generate(self.position) {
            Ok(eligible) => eligible,
            Err(BlockTimeError::TimeBeforeGenesis) => {
                warn!(position = self.position, "clock before genesis, idling");
                return false;
            }
        };
        if !eligible {
            return false;
        }

        let state = match self.calc.count_block_time() {
            Ok(state) => state,
            Err(_) => return false,
        };
        // Re-check against the fresh observation: the slot may have turned
        // over between the eligibility query and this one.
        if state.duration.is_zero() || state.node_position != self.position {
            return false;
        }
        if self.last_attempt == Some(state.start) {
            return false;
        }
        self.last_attempt = Some(state.start);

        match self.node.generate(&state) {
            Ok(()) => {
                debug!(position = self.position, "block generated");
                true
            }
            Err(err) => {
                warn!(position = self.position, error = %err, "block generation failed");
                false
            }
        }
    }

    /// Runs `n` ticks, sleeping out the remainder of the configured tick
    /// between them. Returns how many ticks generated a block.
    pub fn run_for_ticks(&mut self, n: u64) -> u64 {
        let mut generated = 0;
        for i in 0..n {
            let begun = Instant::now();
            if self.tick_once() {
                generated += 1;
            }
            if i + 1 < n {
                let elapsed = begun.elapsed();
                if elapsed < self.cfg.tick {
                    thread::sleep(self.cfg.tick - elapsed);
                }
            }
        }
        generated
    }
}
