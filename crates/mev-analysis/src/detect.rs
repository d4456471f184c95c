//! Heuristic MEV opportunity detection.
//!
//! Each heuristic scans the whole block independently and yields at most one
//! [`Opportunity`] holding every transaction it matched. A transaction can be
//! flagged by several heuristics at once.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use alloy::primitives::{address, Address, U256};
use mev_data::types::{Block, Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reward::wei_to_eth;

/// Flashbots builder address seeded into the default registry.
pub const FLASHBOTS_BUILDER: Address = address!("0000000000007f150bd6f54c40a34d7c3d5e9f56");

/// Transfers of at least this many Wei are flagged (10 ETH).
pub const HIGH_VALUE_THRESHOLD_WEI: u128 = 10_000_000_000_000_000_000;

/// Payloads strictly longer than this many bytes are flagged.
pub const COMPLEX_INPUT_THRESHOLD_BYTES: usize = 500;

/// Heuristic that produced an opportunity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    /// Sender is a registered MEV bot.
    KnownBot,
    /// Transfer value at or above [`HIGH_VALUE_THRESHOLD_WEI`].
    HighValue,
    /// Large calldata, a proxy for multi-call contract interaction.
    Complex,
}

impl fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::KnownBot => "known_bot",
            Self::HighValue => "high_value",
            Self::Complex => "complex",
        };
        f.write_str(name)
    }
}

/// Group of transactions in one block flagged by one heuristic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Heuristic that matched.
    pub kind: OpportunityKind,
    /// Gross fees paid by the flagged transactions, in ETH.
    pub profit: f64,
    /// Flagged transactions in block order. Never empty.
    pub transactions: Vec<Transaction>,
    /// Block the transactions belong to.
    pub block_number: u64,
}

/// Address in the bot registry could not be parsed.
#[derive(Debug, Error)]
#[error("invalid bot address '{address}': {reason}")]
pub struct KnownBotsError {
    address: String,
    reason: String,
}

/// Immutable registry of known MEV bot sender addresses.
///
/// Addresses are parsed into 20-byte values, so lookups ignore hex case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownBots {
    addresses: HashSet<Address>,
}

impl KnownBots {
    /// Builds a registry from hex address strings.
    pub fn from_addresses<I, S>(addresses: I) -> Result<Self, KnownBotsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addresses = addresses
            .into_iter()
            .map(|raw| {
                let raw = raw.as_ref().trim();
                Address::from_str(raw).map_err(|e| KnownBotsError {
                    address: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(Self { addresses })
    }

    /// Returns a registry holding both sets of addresses.
    pub fn extended_with(mut self, other: KnownBots) -> Self {
        self.addresses.extend(other.addresses);
        self
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl Default for KnownBots {
    fn default() -> Self {
        Self {
            addresses: HashSet::from([FLASHBOTS_BUILDER]),
        }
    }
}

/// Runs the known-bot, high-value and complex-payload heuristics.
///
/// Pure: no I/O, and identical blocks always give identical results.
#[derive(Clone, Debug, Default)]
pub struct OpportunityDetector {
    known_bots: KnownBots,
}

impl OpportunityDetector {
    pub fn new(known_bots: KnownBots) -> Self {
        Self { known_bots }
    }

    pub fn known_bots(&self) -> &KnownBots {
        &self.known_bots
    }

    /// Detects opportunities in `block`, in heuristic order
    /// (known_bot, high_value, complex). Heuristics with no match are omitted.
    pub fn detect(&self, block: &Block) -> Vec<Opportunity> {
        let groups = [
            (OpportunityKind::KnownBot, self.known_bot_txs(block)),
            (OpportunityKind::HighValue, high_value_txs(block)),
            (OpportunityKind::Complex, complex_txs(block)),
        ];

        groups
            .into_iter()
            .filter(|(_, txs)| !txs.is_empty())
            .map(|(kind, transactions)| Opportunity {
                kind,
                profit: gross_fees_eth(&transactions),
                transactions,
                block_number: block.number,
            })
            .collect()
    }

    fn known_bot_txs(&self, block: &Block) -> Vec<Transaction> {
        block
            .transactions
            .iter()
            .filter(|tx| self.known_bots.contains(&tx.from))
            .cloned()
            .collect()
    }
}

fn high_value_txs(block: &Block) -> Vec<Transaction> {
    let threshold = U256::from(HIGH_VALUE_THRESHOLD_WEI);
    block
        .transactions
        .iter()
        .filter(|tx| tx.value >= threshold)
        .cloned()
        .collect()
}

fn complex_txs(block: &Block) -> Vec<Transaction> {
    block
        .transactions
        .iter()
        // Plain transfers carry no calldata.
        .filter(|tx| !tx.input.is_empty())
        .filter(|tx| tx.input.len() > COMPLEX_INPUT_THRESHOLD_BYTES)
        .cloned()
        .collect()
}

fn gross_fees_eth(txs: &[Transaction]) -> f64 {
    let total = txs
        .iter()
        .fold(alloy::primitives::U512::ZERO, |acc, tx| {
            acc.saturating_add(tx.fee_wei())
        });
    wei_to_eth(total)
}
