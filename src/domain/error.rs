//! Domain error types.

use chrono::NaiveDateTime;

/// Top-level error type for rotator.
///
/// Only configuration and data problems are errors. Conditions the engine
/// handles on its own (missing indicator history, clamped trades, suppressed
/// dust orders) never surface here.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {instrument}")]
    NoData { instrument: String },

    #[error("out-of-order bar for {instrument} at index {index}: {timestamp} <= {previous}")]
    OutOfOrderBar {
        instrument: String,
        index: usize,
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },

    #[error("data gap for {instrument} at index {index}: expected {expected}, found {found}")]
    DataGap {
        instrument: String,
        index: usize,
        expected: NaiveDateTime,
        found: NaiveDateTime,
    },

    #[error("invalid bar for {instrument} at index {index}: {reason}")]
    InvalidBar {
        instrument: String,
        index: usize,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        BacktestError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors raised while validating configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            BacktestError::ConfigParse { .. }
                | BacktestError::ConfigMissing { .. }
                | BacktestError::ConfigInvalid { .. }
        )
    }
}
