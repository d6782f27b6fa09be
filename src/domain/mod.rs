//! Core domain types and logic.

pub mod ohlcv;
pub mod price_series;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod indicator;
pub mod indicator_state;
pub mod signal;
pub mod backtest;
pub mod metrics;
pub mod strategy;
pub mod universe;
pub mod config_validation;
pub mod error;
