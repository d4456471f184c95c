//! Shared test helpers and utilities.
//!
//! Provides a scripted in-memory [`BlockDataProvider`] and factory functions
//! for blocks and transactions with sensible defaults.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use mev_analysis::detect::FLASHBOTS_BUILDER;
use mev_analysis::BlockAnalyzer;
use mev_data::provider::{BlockDataProvider, ProviderError};
use mev_data::types::{Block, Transaction};
use mev_sim::{EngineConfig, MevTracker};

pub const ONE_ETH: u128 = 1_000_000_000_000_000_000;
pub const GWEI: u64 = 1_000_000_000;

/// In-memory provider with scripted failures, hangs and latency.
///
/// Blocks that were not registered are served as empty blocks, so any range
/// can be scanned without setup.
pub struct MockProvider {
    latest: Result<u64, ProviderError>,
    blocks: HashMap<u64, Block>,
    failures: HashMap<u64, ProviderError>,
    hanging: HashSet<u64>,
    delay: Duration,
    block_calls: AtomicUsize,
    latest_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new(latest: u64) -> Self {
        Self {
            latest: Ok(latest),
            blocks: HashMap::new(),
            failures: HashMap::new(),
            hanging: HashSet::new(),
            delay: Duration::ZERO,
            block_calls: AtomicUsize::new(0),
            latest_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.insert(block.number, block);
        self
    }

    pub fn failing(mut self, block_number: u64, error: ProviderError) -> Self {
        self.failures.insert(block_number, error);
        self
    }

    /// Requests for this block never complete.
    pub fn hanging(mut self, block_number: u64) -> Self {
        self.hanging.insert(block_number);
        self
    }

    pub fn latest_failing(mut self, error: ProviderError) -> Self {
        self.latest = Err(error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.block_calls() + self.latest_calls()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the request future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlockDataProvider for MockProvider {
    async fn fetch_block(&self, block_number: u64) -> Result<Block, ProviderError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if self.hanging.contains(&block_number) {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = self.failures.get(&block_number) {
            return Err(error.clone());
        }

        Ok(self
            .blocks
            .get(&block_number)
            .cloned()
            .unwrap_or_else(|| empty_block(block_number)))
    }

    async fn latest_block_number(&self) -> Result<u64, ProviderError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.latest.clone()
    }
}

/// Builds a tracker over `provider` with the default analyzer.
pub fn tracker(provider: Arc<MockProvider>) -> MevTracker {
    tracker_with(provider, EngineConfig::default())
}

pub fn tracker_with(provider: Arc<MockProvider>, config: EngineConfig) -> MevTracker {
    MevTracker::new(provider, BlockAnalyzer::default(), config)
}

pub fn empty_block(number: u64) -> Block {
    block_with(number, vec![])
}

pub fn block_with(number: u64, transactions: Vec<Transaction>) -> Block {
    Block {
        number,
        timestamp: 1_708_617_600u64.wrapping_add(number.wrapping_mul(12)), // ~12 second blocks
        transactions,
    }
}

/// Plain transfer from an ordinary account that no heuristic flags.
pub fn plain_tx(seed: u8) -> Transaction {
    Transaction {
        hash: B256::repeat_byte(seed),
        from: Address::repeat_byte(0x11),
        to: Some(Address::repeat_byte(0x22)),
        value: U256::from(ONE_ETH),
        gas_price: U256::from(20 * GWEI),
        gas_used: U256::from(21_000u64),
        input: Bytes::new(),
    }
}

/// Transaction from the default registry's bot paying 100 gwei for 1M gas
/// (0.1 ETH fee, 0.01 ETH validator reward).
pub fn bot_tx(seed: u8) -> Transaction {
    Transaction {
        hash: B256::repeat_byte(seed),
        from: FLASHBOTS_BUILDER,
        to: Some(Address::repeat_byte(0x33)),
        value: U256::from(ONE_ETH),
        gas_price: U256::from(100 * GWEI),
        gas_used: U256::from(1_000_000u64),
        input: Bytes::new(),
    }
}

/// Block whose analysis yields exactly 0.01 ETH of validator reward.
pub fn mev_block(number: u64) -> Block {
    block_with(number, vec![plain_tx(1), bot_tx(2)])
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}
