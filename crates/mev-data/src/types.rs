//! Type definitions for fetched chain data.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Transaction included in a block, as seen by the detectors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: B256,
    /// Sender address.
    pub from: Address,
    /// Recipient address (None for contract creation).
    pub to: Option<Address>,
    /// Transferred value in Wei.
    pub value: U256,
    /// Effective gas price in Wei per gas unit.
    pub gas_price: U256,
    /// Gas consumed by execution.
    pub gas_used: U256,
    /// Calldata payload.
    pub input: Bytes,
}

impl Transaction {
    /// Fee paid by this transaction in Wei (`gas_price * gas_used`), widened
    /// to 512 bits so the product of two 256-bit values cannot overflow.
    pub fn fee_wei(&self) -> alloy::primitives::U512 {
        use alloy::primitives::U512;
        U512::from(self.gas_price) * U512::from(self.gas_used)
    }
}

/// On-chain block with its full transaction list.
///
/// Transactions keep the order returned by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block number.
    pub number: u64,
    /// Timestamp in unix seconds.
    pub timestamp: u64,
    /// Transactions in execution order.
    pub transactions: Vec<Transaction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_of_max_values_does_not_overflow() {
        let tx = Transaction {
            hash: B256::ZERO,
            from: Address::ZERO,
            to: None,
            value: U256::ZERO,
            gas_price: U256::MAX,
            gas_used: U256::MAX,
            input: Bytes::new(),
        };

        let fee = tx.fee_wei();
        let max = alloy::primitives::U512::from(U256::MAX);
        assert_eq!(fee, max * max);
    }

    #[test]
    fn block_round_trips_through_json() {
        let block = Block {
            number: 18_000_000,
            timestamp: 1_708_617_600,
            transactions: vec![],
        };
        let json = serde_json::to_string(&block).expect("serialize");
        let back: Block = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, block);
    }
}
