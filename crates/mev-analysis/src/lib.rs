//! mev-analysis crate
//!
//! Pure block analytics: heuristic MEV opportunity detection and validator
//! reward estimation. No I/O happens here.

pub mod analyze;
pub mod detect;
pub mod reward;

pub use analyze::{BlockAnalyzer, BlockResult};
pub use detect::{KnownBots, Opportunity, OpportunityDetector, OpportunityKind};
pub use reward::RewardEstimator;
