//! rotator: bar-replay backtesting engine.
//!
//! Replays hourly bars for one or more instruments through a configurable
//! rule set (catastrophic-protection buy-and-hold or confirmed trend
//! following), keeps a long-only cash/position ledger with lagged fills and
//! fees, and summarizes each run in a performance report.
//!
//! Hexagonal layout: domain logic in [`domain`], port traits in [`ports`],
//! file-backed implementations in [`adapters`]. The crate emits `tracing`
//! events but never installs a subscriber.

pub mod domain;
pub mod ports;
pub mod adapters;

pub use domain::backtest::{run_backtest, BacktestConfig, BacktestResult, Backtester};
pub use domain::error::BacktestError;
pub use domain::metrics::PerformanceReport;
