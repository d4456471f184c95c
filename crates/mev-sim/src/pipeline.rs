//! Fetch → detect → estimate for a single block.

use std::sync::Arc;

use mev_analysis::{BlockAnalyzer, BlockResult};
use mev_data::provider::{BlockDataProvider, ProviderError};
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

/// One unit of work: fetch a block and analyze it.
///
/// Cheap to clone; clones share the provider and the analyzer.
#[derive(Clone)]
pub struct BlockPipeline {
    provider: Arc<dyn BlockDataProvider>,
    analyzer: Arc<BlockAnalyzer>,
}

impl BlockPipeline {
    pub fn new(provider: Arc<dyn BlockDataProvider>, analyzer: BlockAnalyzer) -> Self {
        Self {
            provider,
            analyzer: Arc::new(analyzer),
        }
    }

    pub fn analyzer(&self) -> &BlockAnalyzer {
        &self.analyzer
    }

    /// Fetches and analyzes `block_number`, returning the raw provider error
    /// on failure.
    pub async fn run(&self, block_number: u64) -> Result<BlockResult, ProviderError> {
        let block = self.provider.fetch_block(block_number).await?;
        Ok(self.analyzer.analyze(&block))
    }

    /// Like [`run`](Self::run), but gives up as soon as `cancel` fires.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn run_cancellable(
        &self,
        block_number: u64,
        cancel: &CancellationToken,
    ) -> Result<BlockResult, EngineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            result = self.run(block_number) => {
                result.map_err(|source| EngineError::from_provider(Some(block_number), source))
            }
        }
    }

    /// Latest block number, abandoned when `cancel` fires.
    pub async fn latest_block_number(&self, cancel: &CancellationToken) -> Result<u64, EngineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            result = self.provider.latest_block_number() => {
                result.map_err(|source| EngineError::from_provider(None, source))
            }
        }
    }
}
