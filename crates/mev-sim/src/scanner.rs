//! Bounded-concurrency block range scanner.
//!
//! Fans out one fetch-detect-estimate unit per block under a semaphore cap,
//! collects results in completion order, and fails the whole scan on the first
//! unit error or on cancellation. No partial [`RangeResult`] is ever returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mev_analysis::BlockResult;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::pipeline::BlockPipeline;

/// Aggregated rewards for a validator over a block range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeResult {
    pub validator_index: u64,
    pub from_block: u64,
    pub to_block: u64,
    /// Sum of per-block validator rewards in ETH.
    pub total_reward: f64,
    /// Blocks with a nonzero reward.
    pub mev_blocks: u64,
    /// `to_block - from_block + 1`.
    pub total_blocks: u64,
    /// Per-block results in completion order, not block order.
    pub blocks: Vec<BlockResult>,
    pub completed_at: DateTime<Utc>,
}

/// Inclusive block range after defaults were applied and limits checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRange {
    from: u64,
    to: u64,
}

impl BlockRange {
    /// Validates `from <= to` and `to - from <= max_range`.
    pub fn new(from: u64, to: u64, max_range: u64) -> Result<Self, EngineError> {
        if from > to {
            return Err(EngineError::InvalidInput(format!(
                "fromBlock {from} must not be greater than toBlock {to}"
            )));
        }
        let span = to - from;
        if span > max_range {
            return Err(EngineError::RangeTooLarge {
                span,
                max: max_range,
            });
        }
        Ok(Self { from, to })
    }

    pub fn first(&self) -> u64 {
        self.from
    }

    pub fn last(&self) -> u64 {
        self.to
    }

    /// Number of blocks covered, both bounds inclusive.
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}

/// Scans block ranges with at most `max_concurrency` blocks in flight.
#[derive(Clone)]
pub struct RangeScanner {
    pipeline: BlockPipeline,
    config: EngineConfig,
}

impl RangeScanner {
    pub fn new(pipeline: BlockPipeline, config: EngineConfig) -> Self {
        Self { pipeline, config }
    }

    /// Scans `[from_block, to_block]` for `validator_index`.
    ///
    /// Missing bounds default to `latest - default_lookback ..= latest`, which
    /// costs one provider call. Explicit bounds are validated before any
    /// provider call is made.
    ///
    /// # Errors
    /// - `InvalidInput` / `RangeTooLarge` for bad bounds
    /// - `ProviderUnavailable` / `ProviderData` naming the first failing block
    /// - `Cancelled` when `cancel` fires first; it wins over unit failures
    #[tracing::instrument(skip(self, cancel))]
    pub async fn scan(
        &self,
        validator_index: u64,
        from_block: Option<u64>,
        to_block: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<RangeResult, EngineError> {
        let range = self.resolve_range(from_block, to_block, cancel).await?;
        self.scan_range(validator_index, range, cancel).await
    }

    async fn resolve_range(
        &self,
        from_block: Option<u64>,
        to_block: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<BlockRange, EngineError> {
        let (from, to) = match (from_block, to_block) {
            (Some(from), Some(to)) => (from, to),
            (from, to) => {
                let latest = self.pipeline.latest_block_number(cancel).await?;
                (
                    from.unwrap_or_else(|| latest.saturating_sub(self.config.default_lookback)),
                    to.unwrap_or(latest),
                )
            }
        };
        BlockRange::new(from, to, self.config.max_range)
    }

    /// Scans an already validated range.
    pub async fn scan_range(
        &self,
        validator_index: u64,
        range: BlockRange,
        cancel: &CancellationToken,
    ) -> Result<RangeResult, EngineError> {
        tracing::info!(
            validator_index,
            from_block = range.from,
            to_block = range.to,
            total_blocks = range.block_count(),
            max_concurrency = self.config.max_concurrency,
            "starting block range scan"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        // Dropping the set on any early return aborts the units still running.
        let mut tasks: JoinSet<(u64, Result<BlockResult, EngineError>)> = JoinSet::new();
        let mut blocks = Vec::with_capacity(range.block_count() as usize);
        let mut next = range.from;
        let mut dispatched_all = false;

        while !dispatched_all || !tasks.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(
                        validator_index,
                        completed = blocks.len(),
                        in_flight = tasks.len(),
                        "block range scan cancelled"
                    );
                    return Err(EngineError::Cancelled);
                }
                joined = tasks.join_next(), if !tasks.is_empty() => {
                    let Some(joined) = joined else { continue };
                    let (block_number, outcome) = joined.map_err(|e| {
                        if cancel.is_cancelled() {
                            EngineError::Cancelled
                        } else {
                            EngineError::Worker(e.to_string())
                        }
                    })?;
                    match outcome {
                        Ok(result) => blocks.push(result),
                        Err(_) if cancel.is_cancelled() => return Err(EngineError::Cancelled),
                        Err(err) => {
                            tracing::error!(
                                validator_index,
                                block_number,
                                error = %err,
                                "block failed, aborting range scan"
                            );
                            return Err(err);
                        }
                    }
                }
                permit = Arc::clone(&semaphore).acquire_owned(), if !dispatched_all => {
                    // The semaphore is never closed while the scan owns it.
                    let permit = permit.map_err(|e| EngineError::Worker(e.to_string()))?;
                    let block_number = next;
                    let pipeline = self.pipeline.clone();
                    let unit_cancel = cancel.child_token();
                    tasks.spawn(async move {
                        let _permit = permit;
                        let outcome = pipeline.run_cancellable(block_number, &unit_cancel).await;
                        (block_number, outcome)
                    });

                    if block_number == range.to {
                        dispatched_all = true;
                    } else {
                        next += 1;
                    }
                }
            }
        }

        let total_reward = blocks.iter().map(|b| b.validator_reward).sum::<f64>();
        let mev_blocks = blocks.iter().filter(|b| b.has_mev()).count() as u64;

        tracing::info!(
            validator_index,
            total_reward,
            mev_blocks,
            total_blocks = range.block_count(),
            "block range scan completed"
        );

        Ok(RangeResult {
            validator_index,
            from_block: range.from,
            to_block: range.to,
            total_reward,
            mev_blocks,
            total_blocks: range.block_count(),
            blocks,
            completed_at: Utc::now(),
        })
    }
}
