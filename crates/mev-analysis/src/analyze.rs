//! Per-block detect-and-estimate pipeline over an already fetched block.

use mev_data::types::Block;
use serde::{Deserialize, Serialize};

use crate::detect::{KnownBots, Opportunity, OpportunityDetector};
use crate::reward::RewardEstimator;

/// Detection and reward outcome for one block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockResult {
    /// Block number.
    pub block_number: u64,
    /// Detected opportunities (possibly empty).
    pub opportunities: Vec<Opportunity>,
    /// Estimated validator reward in ETH.
    pub validator_reward: f64,
}

impl BlockResult {
    pub fn has_mev(&self) -> bool {
        self.validator_reward > 0.0
    }
}

/// Detector and estimator bundled for one-call block analysis.
#[derive(Clone, Debug, Default)]
pub struct BlockAnalyzer {
    detector: OpportunityDetector,
    estimator: RewardEstimator,
}

impl BlockAnalyzer {
    pub fn new(detector: OpportunityDetector, estimator: RewardEstimator) -> Self {
        Self {
            detector,
            estimator,
        }
    }

    /// Analyzer using `known_bots` and the default validator share.
    pub fn with_known_bots(known_bots: KnownBots) -> Self {
        Self::new(OpportunityDetector::new(known_bots), RewardEstimator::default())
    }

    pub fn detector(&self) -> &OpportunityDetector {
        &self.detector
    }

    pub fn estimator(&self) -> &RewardEstimator {
        &self.estimator
    }

    /// Detects opportunities in `block` and estimates the validator reward.
    pub fn analyze(&self, block: &Block) -> BlockResult {
        let opportunities = self.detector.detect(block);
        let validator_reward = self.estimator.estimate(&opportunities);

        tracing::trace!(
            block_number = block.number,
            tx_count = block.transactions.len(),
            opportunities = opportunities.len(),
            validator_reward,
            "analyzed block"
        );

        BlockResult {
            block_number: block.number,
            opportunities,
            validator_reward,
        }
    }
}
