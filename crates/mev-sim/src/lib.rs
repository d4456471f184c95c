//! mev-sim: block range scanning and reward simulation.
//!
//! Drives the pure analysis in `mev-analysis` over a [`BlockDataProvider`]:
//! bounded-concurrency range scans with all-or-nothing results, and a
//! stochastic projection of future validator rewards.
//!
//! [`BlockDataProvider`]: mev_data::BlockDataProvider

pub mod config;
pub mod error;
pub mod pipeline;
pub mod scanner;
pub mod service;
pub mod simulation;

pub use config::EngineConfig;
pub use error::EngineError;
pub use scanner::{BlockRange, RangeResult, RangeScanner};
pub use service::MevTracker;
pub use simulation::{SimulatedBlock, SimulationEngine, SimulationResult};
