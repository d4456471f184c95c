//! Block data source abstraction.
//!
//! The engine only needs two calls from a chain node: a full block by number
//! and the latest block number. Anything that can answer them (an RPC node, a
//! fixture, a cache) implements [`BlockDataProvider`].

use async_trait::async_trait;
use thiserror::Error;

use crate::types::Block;

/// Failure reported by a [`BlockDataProvider`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The node has no block with this number.
    #[error("block {0} not found")]
    NotFound(u64),
    /// The request did not complete within its deadline.
    #[error("request timed out")]
    Timeout,
    /// The node could not be reached.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node answered with a JSON-RPC error object.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The node answered, but the payload could not be used.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// True when the data source itself could not be reached in time, as
    /// opposed to answering with an error or unusable data.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }
}

/// Source of block data.
///
/// Implementations must be safe for concurrent use; the range scanner issues
/// up to its concurrency cap of calls at once. Cancellation is cooperative:
/// callers drop the returned future.
#[async_trait]
pub trait BlockDataProvider: Send + Sync {
    /// Fetches one block with its full transaction list.
    async fn fetch_block(&self, block_number: u64) -> Result<Block, ProviderError>;

    /// Returns the number of the most recent block known to the provider.
    async fn latest_block_number(&self) -> Result<u64, ProviderError>;
}
