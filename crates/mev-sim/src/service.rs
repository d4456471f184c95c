//! Consumer-facing operations over a block data provider.

use std::sync::Arc;

use mev_analysis::{BlockAnalyzer, BlockResult};
use mev_data::provider::BlockDataProvider;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::pipeline::BlockPipeline;
use crate::scanner::{RangeResult, RangeScanner};
use crate::simulation::{SimulationEngine, SimulationResult};

/// Entry point for single-block analysis, range scans and simulations.
///
/// # Example
/// ```no_run
/// # use std::sync::Arc;
/// # use mev_sim::{EngineConfig, MevTracker};
/// # use mev_analysis::BlockAnalyzer;
/// # use tokio_util::sync::CancellationToken;
/// # async fn example(provider: Arc<dyn mev_data::BlockDataProvider>) -> Result<(), mev_sim::EngineError> {
/// let tracker = MevTracker::new(provider, BlockAnalyzer::default(), EngineConfig::default());
/// let result = tracker
///     .scan_range(5, Some(18_000_000), Some(18_000_010), &CancellationToken::new())
///     .await?;
/// println!("{} ETH over {} blocks", result.total_reward, result.total_blocks);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MevTracker {
    pipeline: BlockPipeline,
    scanner: RangeScanner,
    simulator: SimulationEngine,
}

impl MevTracker {
    pub fn new(
        provider: Arc<dyn BlockDataProvider>,
        analyzer: BlockAnalyzer,
        config: EngineConfig,
    ) -> Self {
        let pipeline = BlockPipeline::new(provider, analyzer);
        Self {
            scanner: RangeScanner::new(pipeline.clone(), config.clone()),
            simulator: SimulationEngine::new(pipeline.clone(), config),
            pipeline,
        }
    }

    pub fn scanner(&self) -> &RangeScanner {
        &self.scanner
    }

    pub fn simulator(&self) -> &SimulationEngine {
        &self.simulator
    }

    /// Fetches and analyzes a single block.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn detect_and_estimate(
        &self,
        block_number: u64,
        cancel: &CancellationToken,
    ) -> Result<BlockResult, EngineError> {
        self.pipeline.run_cancellable(block_number, cancel).await
    }

    /// Aggregates rewards over a block range; see [`RangeScanner::scan`].
    pub async fn scan_range(
        &self,
        validator_index: u64,
        from_block: Option<u64>,
        to_block: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<RangeResult, EngineError> {
        self.scanner
            .scan(validator_index, from_block, to_block, cancel)
            .await
    }

    /// Projects rewards for `block_count` blocks after the current tip.
    ///
    /// Failing to read the tip is fatal; see [`SimulationEngine::simulate`]
    /// for everything after that.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn simulate(
        &self,
        validator_index: u64,
        block_count: u64,
        cancel: &CancellationToken,
    ) -> Result<SimulationResult, EngineError> {
        self.simulator.validate(validator_index, block_count)?;
        let latest_block = self.pipeline.latest_block_number(cancel).await?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            result = self.simulator.simulate(validator_index, block_count, latest_block) => result,
        }
    }
}
