//! Stochastic reward projection.
//!
//! Calibrates a simple model from the most recent blocks (probability that a
//! block carries MEV, mean and max reward), then draws synthetic future
//! blocks: a Bernoulli trial per block and, on success, an exponentially
//! distributed reward capped at twice the historical maximum.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Exp1;
use serde::{Deserialize, Serialize};

use mev_data::provider::ProviderError;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::pipeline::BlockPipeline;

/// One synthesized future block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatedBlock {
    pub block_number: u64,
    pub has_mev: bool,
    /// Sampled validator reward in ETH; zero when `has_mev` is false.
    pub estimated_reward: f64,
}

/// Outcome of a reward simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub validator_index: u64,
    pub simulated_block_count: u64,
    pub total_reward: f64,
    pub average_reward: f64,
    pub blocks_with_mev: u64,
    /// Calibrated probability that a block carries MEV.
    pub mev_probability: f64,
    /// Synthesized blocks in ascending block order.
    pub blocks: Vec<SimulatedBlock>,
    pub completed_at: DateTime<Utc>,
}

/// Model parameters derived from recent blocks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistoricalStats {
    /// Number of blocks the window was meant to cover; the divisor for
    /// averages even when some fetches failed.
    pub window: u64,
    /// Blocks that were actually fetched and analyzed.
    pub sampled: u64,
    pub avg_reward: f64,
    pub mev_probability: f64,
    pub max_reward: f64,
}

impl HistoricalStats {
    /// Derives stats from the rewards of the blocks that could be fetched.
    ///
    /// Missing blocks count as zero reward: both averages divide by `window`.
    pub fn from_rewards(rewards: &[f64], window: u64) -> Self {
        if window == 0 {
            return Self {
                window,
                sampled: rewards.len() as u64,
                avg_reward: 0.0,
                mev_probability: 0.0,
                max_reward: 0.0,
            };
        }

        let total = rewards.iter().sum::<f64>();
        let mev_blocks = rewards.iter().filter(|r| **r > 0.0).count();
        let max_reward = rewards.iter().copied().fold(0.0_f64, f64::max);

        Self {
            window,
            sampled: rewards.len() as u64,
            avg_reward: total / window as f64,
            mev_probability: (mev_blocks as f64 / window as f64).clamp(0.0, 1.0),
            max_reward,
        }
    }

    /// Draws one block reward; `None` when the block carries no MEV.
    pub fn sample_reward<R: Rng>(&self, rng: &mut R) -> Option<f64> {
        if !rng.gen_bool(self.mev_probability) {
            return None;
        }
        let draw: f64 = rng.sample(Exp1);
        Some((draw * self.avg_reward).min(2.0 * self.max_reward))
    }
}

/// Projects future validator rewards from recent history.
#[derive(Clone)]
pub struct SimulationEngine {
    pipeline: BlockPipeline,
    config: EngineConfig,
}

impl SimulationEngine {
    pub fn new(pipeline: BlockPipeline, config: EngineConfig) -> Self {
        Self { pipeline, config }
    }

    /// Simulates `block_count` blocks following `latest_block`.
    ///
    /// Uses the configured seed when present so runs are reproducible.
    ///
    /// # Errors
    /// - `InvalidInput` when `validator_index` is zero
    /// - `InvalidBlockCount` when `block_count` is outside
    ///   `1..=max_simulated_blocks`
    /// - `ProviderData` when `latest_block + block_count` does not fit in a
    ///   block number
    ///
    /// Historical fetch failures are not errors.
    #[tracing::instrument(skip(self))]
    pub async fn simulate(
        &self,
        validator_index: u64,
        block_count: u64,
        latest_block: u64,
    ) -> Result<SimulationResult, EngineError> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.simulate_with_rng(validator_index, block_count, latest_block, &mut rng)
            .await
    }

    /// [`simulate`](Self::simulate) with a caller-supplied random source.
    pub async fn simulate_with_rng<R: Rng>(
        &self,
        validator_index: u64,
        block_count: u64,
        latest_block: u64,
        rng: &mut R,
    ) -> Result<SimulationResult, EngineError> {
        self.validate(validator_index, block_count)?;
        if latest_block.checked_add(block_count).is_none() {
            return Err(EngineError::ProviderData {
                block: None,
                source: ProviderError::Malformed(format!(
                    "latest block {latest_block} leaves no room for {block_count} future blocks"
                )),
            });
        }

        let window = block_count.min(self.config.history_window);
        let stats = self.calibrate(latest_block, window).await;

        tracing::info!(
            validator_index,
            window = stats.window,
            sampled = stats.sampled,
            avg_reward = stats.avg_reward,
            mev_probability = stats.mev_probability,
            max_reward = stats.max_reward,
            "calibrated simulation model"
        );

        Ok(synthesize(
            validator_index,
            block_count,
            latest_block,
            &stats,
            rng,
        ))
    }

    /// Rejects arguments `simulate` would refuse, without any I/O.
    pub fn validate(&self, validator_index: u64, block_count: u64) -> Result<(), EngineError> {
        if validator_index == 0 {
            return Err(EngineError::InvalidInput(
                "validator index must be positive".to_string(),
            ));
        }
        if block_count == 0 || block_count > self.config.max_simulated_blocks {
            return Err(EngineError::InvalidBlockCount {
                count: block_count,
                max: self.config.max_simulated_blocks,
            });
        }
        Ok(())
    }

    /// Analyzes the `window` most recent blocks ending at `latest_block`.
    ///
    /// Blocks that fail to fetch are skipped; they still count toward the
    /// window divisor.
    pub async fn calibrate(&self, latest_block: u64, window: u64) -> HistoricalStats {
        let mut rewards = Vec::with_capacity(window as usize);
        for block_number in (0..window).filter_map(|i| latest_block.checked_sub(i)) {
            match self.pipeline.run(block_number).await {
                Ok(result) => rewards.push(result.validator_reward),
                Err(e) => {
                    tracing::debug!(block_number, error = %e, "skipped historical block");
                }
            }
        }
        HistoricalStats::from_rewards(&rewards, window)
    }
}

/// Draws `block_count` synthetic blocks numbered `latest_block + 1` onward.
///
/// # Panics
/// If `latest_block + block_count` overflows; `SimulationEngine` rejects
/// such tips before calling this.
pub fn synthesize<R: Rng>(
    validator_index: u64,
    block_count: u64,
    latest_block: u64,
    stats: &HistoricalStats,
    rng: &mut R,
) -> SimulationResult {
    let mut total_reward = 0.0;
    let mut blocks_with_mev = 0;
    let mut blocks = Vec::with_capacity(block_count as usize);

    for offset in 1..=block_count {
        let sampled = stats.sample_reward(rng);
        if let Some(reward) = sampled {
            total_reward += reward;
            blocks_with_mev += 1;
        }
        blocks.push(SimulatedBlock {
            block_number: latest_block + offset,
            has_mev: sampled.is_some(),
            estimated_reward: sampled.unwrap_or(0.0),
        });
    }

    let average_reward = if block_count == 0 {
        0.0
    } else {
        total_reward / block_count as f64
    };

    SimulationResult {
        validator_index,
        simulated_block_count: block_count,
        total_reward,
        average_reward,
        blocks_with_mev,
        mev_probability: stats.mev_probability,
        blocks,
        completed_at: Utc::now(),
    }
}
