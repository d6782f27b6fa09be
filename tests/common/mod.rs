#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rotator::domain::backtest::BacktestConfig;
use rotator::domain::error::BacktestError;
pub use rotator::domain::ohlcv::Bar;
use rotator::domain::price_series::PriceSeries;
use rotator::domain::strategy::StrategyConfig;
use rotator::ports::data_port::DataPort;
use std::collections::HashMap;

pub const HOUR: i64 = 3600;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, instrument: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(instrument.to_string(), bars);
        self
    }

    pub fn with_error(mut self, instrument: &str, reason: &str) -> Self {
        self.errors.insert(instrument.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        instrument: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, BacktestError> {
        if let Some(reason) = self.errors.get(instrument) {
            return Err(BacktestError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(instrument)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s))
            .filter(|b| end.is_none_or(|e| b.timestamp <= e))
            .collect())
    }

    fn list_instruments(&self) -> Result<Vec<String>, BacktestError> {
        let mut names: Vec<String> = self.data.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn get_data_range(
        &self,
        instrument: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, BacktestError> {
        match self.data.get(instrument) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.timestamp).min().unwrap();
                let max = bars.iter().map(|b| b.timestamp).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn hour(i: i64) -> NaiveDateTime {
    start() + chrono::Duration::hours(i)
}

pub fn series(instrument: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::from_closes(instrument, start(), HOUR, closes)
}

/// Closes rising by `step` per bar from `first`.
pub fn rising(first: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| first + step * i as f64).collect()
}

/// `n` bars at `price`.
pub fn flat(price: f64, n: usize) -> Vec<f64> {
    vec![price; n]
}

pub fn buy_and_hold_config(lookback: usize, max_drawdown_exit: f64) -> BacktestConfig {
    BacktestConfig {
        strategy: StrategyConfig {
            lookback_for_peak: lookback,
            max_drawdown_exit,
            ..StrategyConfig::buy_and_hold()
        },
        ..Default::default()
    }
}

pub fn trend_config(short: usize, long: usize, confirmation: usize) -> BacktestConfig {
    BacktestConfig {
        strategy: StrategyConfig {
            short_ma_window: short,
            long_ma_window: long,
            lookback_for_peak: long,
            confirmation_bars: confirmation,
            ..StrategyConfig::trend_following()
        },
        ..Default::default()
    }
}
