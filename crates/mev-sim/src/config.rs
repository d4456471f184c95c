//! Engine limits and defaults.

use serde::{Deserialize, Serialize};

/// Tunables for scanning and simulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of blocks fetched and analyzed at once.
    pub max_concurrency: usize,
    /// Largest allowed `to - from` for a range scan.
    pub max_range: u64,
    /// Blocks behind the tip scanned when no lower bound is given.
    pub default_lookback: u64,
    /// Upper bound on historical blocks used to calibrate a simulation.
    pub history_window: u64,
    /// Largest allowed simulated block count.
    pub max_simulated_blocks: u64,
    /// Seed for reproducible simulations; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            max_range: 1000,
            default_lookback: 100,
            history_window: 100,
            max_simulated_blocks: 1000,
            seed: None,
        }
    }
}
