//! Proof-of-work difficulty controller.
//!
//! Tracks block cadence over windows of `difficulty_adjust_after` blocks and
//! scales the raw difficulty so that the observed inter-block interval
//! converges towards `block_gen.interval`. A single adjustment is clamped to
//! the configured factor limit in both directions.

use crate::clock::Timestamp;
use crate::config::BlockGenConfig;

/// Windowed difficulty state driven by block timestamps.
#[derive(Clone, Debug)]
pub struct DifficultyAdjuster {
    interval: u64,
    adjust_after: u64,
    factor_limit: f64,

    difficulty_raw: f64,
    difficulty_log2: u32,
    counter: u64,
    window_start: Timestamp,
    cumulative: f64,
}

impl DifficultyAdjuster {
    pub fn new(config: &BlockGenConfig) -> Self {
        DifficultyAdjuster {
            interval: config.interval,
            adjust_after: config.difficulty_adjust_after,
            factor_limit: config.difficulty_adjust_factor_limit,
            difficulty_raw: config.difficulty_init,
            difficulty_log2: log2_floor(config.difficulty_init),
            counter: 0,
            window_start: 0,
            cumulative: 0.0,
        }
    }

    /// Feed the timestamp of the next committed block.
    ///
    /// The first call only opens the adjustment window. Every
    /// `adjust_after`th call thereafter rescales the difficulty by
    /// `clamp(expected / actual, 1/limit, limit)` and resets the window.
    pub fn adjust(&mut self, timestamp: Timestamp) {
        if self.counter == 0 {
            self.window_start = timestamp;
        } else if self.counter % self.adjust_after == 0 {
            // Time that should have elapsed over the window vs. what did.
            let expected = (self.interval * self.adjust_after) as f64;
            let actual = timestamp.saturating_sub(self.window_start).max(1) as f64;

            let factor = (expected / actual).clamp(1.0 / self.factor_limit, self.factor_limit);

            self.difficulty_raw *= factor;
            self.difficulty_log2 = log2_floor(self.difficulty_raw);

            self.window_start = timestamp;
        }

        self.counter += 1;
        self.cumulative += self.difficulty_raw;
    }

    /// Required count of leading zero bits for the next block hash.
    pub fn difficulty_log2(&self) -> u32 {
        self.difficulty_log2
    }

    /// Current raw difficulty.
    pub fn difficulty_raw(&self) -> f64 {
        self.difficulty_raw
    }

    /// Running sum of per-block raw difficulty, the chain comparator under
    /// proof-of-work.
    pub fn cumulative_difficulty(&self) -> f64 {
        self.cumulative
    }
}

fn log2_floor(raw: f64) -> u32 {
    raw.log2().max(0.0) as u32
}
