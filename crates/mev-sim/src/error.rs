//! Engine error type.

use mev_data::provider::ProviderError;
use thiserror::Error;

/// Failure of a scan, simulation or single-block analysis.
///
/// Every operation yields either a complete result or exactly one of these.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Arguments rejected before any provider call was made.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Simulation block count outside `1..=max`.
    #[error("invalid block count: {count} (must be between 1 and {max})")]
    InvalidBlockCount { count: u64, max: u64 },
    /// Requested block span exceeds the configured maximum.
    #[error("block range too large: {span} blocks requested (max {max})")]
    RangeTooLarge { span: u64, max: u64 },
    /// The data source could not be reached.
    #[error("provider unavailable{}: {source}", at_block(.block))]
    ProviderUnavailable {
        block: Option<u64>,
        source: ProviderError,
    },
    /// The data source answered with an error or unusable data.
    #[error("provider data error{}: {source}", at_block(.block))]
    ProviderData {
        block: Option<u64>,
        source: ProviderError,
    },
    /// Caller abort or deadline.
    #[error("operation cancelled")]
    Cancelled,
    /// A worker task died without reporting a result.
    #[error("worker task failed: {0}")]
    Worker(String),
}

fn at_block(block: &Option<u64>) -> String {
    match block {
        Some(number) => format!(" at block {number}"),
        None => String::new(),
    }
}

impl EngineError {
    /// Wraps a provider failure, classifying it as unavailable or data error.
    pub fn from_provider(block: Option<u64>, source: ProviderError) -> Self {
        if source.is_unavailable() {
            Self::ProviderUnavailable { block, source }
        } else {
            Self::ProviderData { block, source }
        }
    }

    /// Block number the failure is attributed to, if any.
    pub fn block(&self) -> Option<u64> {
        match self {
            Self::ProviderUnavailable { block, .. } | Self::ProviderData { block, .. } => *block,
            _ => None,
        }
    }
}
