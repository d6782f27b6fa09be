//! Per-instrument rolling indicator state, advanced once per replayed bar.

use crate::domain::indicator::{FlagWindow, RollingMax, Sma};
use crate::domain::strategy::StrategyConfig;

/// Relative margin below which two prices or averages count as equal.
const REL_TOLERANCE: f64 = 1e-10;

fn above(a: f64, b: f64) -> bool {
    a - b > b.abs() * REL_TOLERANCE
}

fn below(a: f64, b: f64) -> bool {
    b - a > b.abs() * REL_TOLERANCE
}

#[derive(Debug, Clone)]
pub struct IndicatorState {
    short_ma: Sma,
    long_ma: Sma,
    peak: RollingMax,
    weakness: FlagWindow,
    uptrend_streak: usize,
}

impl IndicatorState {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            short_ma: Sma::new(config.short_ma_window),
            long_ma: Sma::new(config.long_ma_window),
            peak: RollingMax::new(config.lookback_for_peak),
            weakness: FlagWindow::new(config.weakness_window),
            uptrend_streak: 0,
        }
    }

    /// Fold the newest close into every window.
    ///
    /// The uptrend streak counts consecutive bars with short MA > long MA and
    /// price > short MA; it drops to zero on the first bar where that fails or
    /// either average is undefined. A weakness flag (price < short MA) is only
    /// recorded on bars where the short MA is defined. Comparisons ignore
    /// differences within `REL_TOLERANCE`, so a flat series is neither
    /// trending nor weak.
    pub fn update(&mut self, close: f64) {
        let short = self.short_ma.update(close);
        let long = self.long_ma.update(close);
        self.peak.update(close);

        match (short, long) {
            (Some(s), Some(l)) if above(s, l) && above(close, s) => self.uptrend_streak += 1,
            _ => self.uptrend_streak = 0,
        }
        if let Some(s) = short {
            self.weakness.push(below(close, s));
        }
    }

    /// Forget all history, e.g. after a gap in the bar sequence.
    pub fn reset(&mut self) {
        self.short_ma.reset();
        self.long_ma.reset();
        self.peak.reset();
        self.weakness.reset();
        self.uptrend_streak = 0;
    }

    pub fn short_ma(&self) -> Option<f64> {
        self.short_ma.value()
    }

    pub fn long_ma(&self) -> Option<f64> {
        self.long_ma.value()
    }

    pub fn peak(&self) -> Option<f64> {
        self.peak.value()
    }

    pub fn uptrend_streak(&self) -> usize {
        self.uptrend_streak
    }

    /// Weak bars among the trailing weakness window, once it has filled.
    pub fn weak_bars(&self) -> Option<usize> {
        self.weakness.count()
    }

    /// Fractional decline of `price` from the rolling peak.
    pub fn drawdown(&self, price: f64) -> Option<f64> {
        let peak = self.peak()?;
        if peak <= 0.0 {
            return None;
        }
        Some((peak - price) / peak)
    }
}
