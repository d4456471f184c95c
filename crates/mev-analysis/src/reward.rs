//! Validator reward estimation.
//!
//! Fees are summed as exact Wei integers and narrowed to a floating ETH
//! amount only once, after summation.

use alloy::primitives::U512;

use crate::detect::Opportunity;

/// Share of flagged fees assumed to reach the validator.
pub const VALIDATOR_SHARE: f64 = 0.10;

const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Converts a Wei amount to ETH.
///
/// The integer division by 10^18 is exact; only the whole and fractional
/// parts are narrowed to `f64`.
pub fn wei_to_eth(wei: U512) -> f64 {
    let (whole, fractional) = wei.div_rem(U512::from(WEI_PER_ETH));
    // `whole` can exceed u128 for pathological inputs; the decimal form always parses.
    let whole = whole.to_string().parse::<f64>().unwrap_or(f64::INFINITY);
    let fractional = u128::try_from(fractional).unwrap_or_default() as f64 / WEI_PER_ETH as f64;
    whole + fractional
}

/// Formats an ETH amount with exactly 6 decimal places.
///
/// Examples:
/// - `1.0` -> `"1.000000 ETH"`
/// - `0.000123` -> `"0.000123 ETH"`
pub fn format_eth(eth: f64) -> String {
    format!("{eth:.6} ETH")
}

/// Estimates the validator's cut of the fees paid by flagged transactions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RewardEstimator {
    share: f64,
}

impl Default for RewardEstimator {
    fn default() -> Self {
        Self {
            share: VALIDATOR_SHARE,
        }
    }
}

impl RewardEstimator {
    /// Total Wei fees of every transaction referenced by `opportunities`.
    ///
    /// A transaction flagged by two heuristics appears in two opportunities
    /// and is counted twice.
    pub fn flagged_fees_wei(&self, opportunities: &[Opportunity]) -> U512 {
        opportunities
            .iter()
            .flat_map(|opp| opp.transactions.iter())
            .fold(U512::ZERO, |acc, tx| acc.saturating_add(tx.fee_wei()))
    }

    /// Estimated validator reward in ETH. Zero for no opportunities.
    pub fn estimate(&self, opportunities: &[Opportunity]) -> f64 {
        wei_to_eth(self.flagged_fees_wei(opportunities)) * self.share
    }
}
