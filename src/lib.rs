//! Order book spread monitor
//!
//! Samples order book snapshots per instrument, scores spread and liquidity,
//! retries noisy readings within a cycle and tracks warning episodes across
//! cycles, with alerts and a daily CSV audit trail.

pub mod audit;
pub mod config;
pub mod error;
pub mod health;
pub mod monitor;
pub mod notify;
pub mod orderbook;
pub mod runner;
pub mod scheduler;
pub mod source;
pub mod types;

#[cfg(test)]
mod error_tests;

pub use error::{MonitorError, Result};
