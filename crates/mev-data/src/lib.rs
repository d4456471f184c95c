//! mev-data crate
//!
//! Chain data model and the block data provider used by the analysis engine.

pub mod blocks;
pub mod provider;
pub mod types;

pub use blocks::{RpcBlockProvider, RpcConfig};
pub use provider::{BlockDataProvider, ProviderError};
pub use types::{Block, Transaction};
