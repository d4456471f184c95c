//! Alloy RPC provider integration for fetching on-chain block data.
//!
//! Fetches full blocks plus their receipts from an Ethereum JSON-RPC endpoint
//! and maps Alloy types to mev-data schema types.

use alloy::consensus::Transaction as _;
use alloy::network::Ethereum;
use alloy::primitives::U256;
use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::eth::{BlockId, BlockNumberOrTag};
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use eyre::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::provider::{BlockDataProvider, ProviderError};
use crate::types::{Block, Transaction};

type ProviderType = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider<Ethereum>,
>;

/// Default per-request deadline for RPC calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Invalid RPC endpoint configuration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No endpoint URL was supplied.
    #[error("missing RPC endpoint URL (set MEV_RPC_URL or pass --rpc-url)")]
    MissingUrl,
    /// The API key was supplied but is blank.
    #[error("RPC API key is empty")]
    EmptyApiKey,
}

/// Connection settings for [`RpcBlockProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcConfig {
    /// Base endpoint URL.
    pub url: String,
    /// Optional hosted-node API key, appended as `/v2/<key>`.
    pub api_key: Option<String>,
    /// Deadline for every individual RPC call.
    pub request_timeout: Duration,
}

impl RpcConfig {
    /// Builds a config from optional URL and key, as read from flags or the
    /// environment.
    pub fn new(url: Option<String>, api_key: Option<String>) -> Result<Self, ConfigError> {
        let url = url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingUrl)?;

        let api_key = match api_key {
            Some(key) if key.trim().is_empty() => return Err(ConfigError::EmptyApiKey),
            Some(key) => Some(key.trim().to_string()),
            None => None,
        };

        Ok(Self {
            url,
            api_key,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Sets the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Full endpoint URL. Hosted nodes take the key as a path segment.
    pub fn endpoint(&self) -> String {
        match &self.api_key {
            Some(key) => format!("{}/v2/{}", self.url.trim_end_matches('/'), key),
            None => self.url.clone(),
        }
    }
}

/// Fetches full blocks with transactions from Ethereum RPC via Alloy provider.
pub struct RpcBlockProvider {
    /// Alloy FillProvider with gas, nonce, chain_id, blob_gas fillers
    provider: Arc<ProviderType>,
    request_timeout: Duration,
}

impl RpcBlockProvider {
    /// Creates a new provider and tests RPC connectivity.
    ///
    /// Verifies connection via `eth_blockNumber` call and logs the RPC endpoint.
    ///
    /// # Errors
    /// Returns error if the URL is malformed or the connectivity test fails.
    ///
    /// # Example
    /// ```no_run
    /// # use mev_data::blocks::{RpcBlockProvider, RpcConfig};
    /// # async fn example() -> eyre::Result<()> {
    /// let config = RpcConfig::new(Some("https://eth-mainnet.g.alchemy.com".into()), Some("KEY".into()))?;
    /// let provider = RpcBlockProvider::connect(&config).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip_all, fields(rpc_url = %config.url))]
    pub async fn connect(config: &RpcConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        let provider =
            ProviderBuilder::new().on_http(endpoint.parse().wrap_err("invalid RPC URL format")?);
        let this = Self {
            provider: Arc::new(provider),
            request_timeout: config.request_timeout,
        };

        let block_number = this
            .latest_block_number()
            .await
            .wrap_err("failed to test RPC connectivity with eth_blockNumber")?;

        // The key is part of the endpoint path; only the base URL is logged.
        tracing::info!(
            rpc_url = %config.url,
            latest_block = block_number,
            "RPC connection successful"
        );

        Ok(this)
    }

    async fn with_deadline<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(classify_transport_error),
            Err(_) => Err(ProviderError::Timeout),
        }
    }
}

#[async_trait]
impl BlockDataProvider for RpcBlockProvider {
    /// Fetches a full block together with its receipts.
    ///
    /// Gas used and effective gas price are only known from receipts, so the
    /// block body and `eth_getBlockReceipts` are fetched concurrently and
    /// paired by position.
    #[tracing::instrument(skip(self))]
    async fn fetch_block(&self, block_number: u64) -> Result<Block, ProviderError> {
        let tag = BlockNumberOrTag::Number(block_number);
        let body = self.with_deadline(async {
            self.provider.get_block_by_number(tag).full().await
        });
        let receipts = self.with_deadline(async {
            self.provider.get_block_receipts(BlockId::Number(tag)).await
        });
        let (body, receipts) = tokio::try_join!(body, receipts)?;

        let body = match body {
            Some(body) => body,
            None => {
                tracing::debug!(block_number, "block not found");
                return Err(ProviderError::NotFound(block_number));
            }
        };
        let receipts = receipts.ok_or(ProviderError::NotFound(block_number))?;

        let txs: Vec<_> = body.transactions.txns().collect();
        if txs.len() != receipts.len() {
            return Err(ProviderError::Malformed(format!(
                "block {} has {} transactions but {} receipts",
                block_number,
                txs.len(),
                receipts.len()
            )));
        }

        let transactions = txs
            .into_iter()
            .zip(receipts)
            .map(|(tx, receipt)| Transaction {
                hash: receipt.transaction_hash,
                from: receipt.from,
                to: receipt.to,
                value: tx.value(),
                gas_price: U256::from(receipt.effective_gas_price),
                gas_used: U256::from(receipt.gas_used),
                input: tx.input().clone(),
            })
            .collect();

        Ok(Block {
            number: body.header.number,
            timestamp: body.header.timestamp,
            transactions,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn latest_block_number(&self) -> Result<u64, ProviderError> {
        self.with_deadline(async { self.provider.get_block_number().await })
            .await
    }
}

/// Splits transport failures into "could not reach the node" and "the node
/// answered with something unusable".
fn classify_transport_error(err: TransportError) -> ProviderError {
    match err {
        RpcError::ErrorResp(payload) => ProviderError::Rpc(payload.message.to_string()),
        RpcError::NullResp => ProviderError::Malformed("null response".to_string()),
        RpcError::DeserError { err, .. } => ProviderError::Malformed(err.to_string()),
        other => ProviderError::Transport(other.to_string()),
    }
}
