//! Order execution: fees, fill prices, feasibility clamps and the pending
//! order that carries a decision across the execution lag.

use chrono::NaiveDateTime;

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use crate::domain::position::{Side, TradeReason};

const SECTION: &str = "execution";

/// Configuration for order execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub initial_cash: f64,
    pub fee_rate_per_side: f64,
    /// Bars between the decision bar and the fill bar. 0 fills at the next
    /// bar's open, n >= 1 fills at the close of bar t + n.
    pub execution_lag_bars: usize,
    /// Bars replayed before the first decision is requested.
    pub warmup_bars: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            initial_cash: 10_000.0,
            fee_rate_per_side: 0.001,
            execution_lag_bars: 1,
            warmup_bars: 0,
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(BacktestError::invalid(
                SECTION,
                "initial_cash",
                "initial_cash must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.fee_rate_per_side) {
            return Err(BacktestError::invalid(
                SECTION,
                "fee_rate_per_side",
                "fee_rate_per_side must be at least 0 and less than 1",
            ));
        }
        Ok(())
    }

    /// Bars between decision and fill; never zero.
    pub fn fill_delay(&self) -> usize {
        self.execution_lag_bars.max(1)
    }

    /// Price an order fills at on its fill bar.
    pub fn fill_price(&self, bar: &Bar) -> f64 {
        if self.execution_lag_bars == 0 {
            bar.open
        } else {
            bar.close
        }
    }
}

/// fee = notional * fee_rate_per_side
pub fn calculate_fee(notional: f64, config: &ExecutionConfig) -> f64 {
    notional * config.fee_rate_per_side
}

/// Largest quantity whose notional plus fee fits in `cash`.
pub fn max_affordable_quantity(cash: f64, price: f64, config: &ExecutionConfig) -> f64 {
    if price <= 0.0 || cash <= 0.0 {
        return 0.0;
    }
    cash / (price * (1.0 + config.fee_rate_per_side))
}

/// A quantity after feasibility limits, and whether it was reduced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clamped {
    pub quantity: f64,
    pub clamped: bool,
}

pub fn clamp_buy(requested: f64, cash: f64, price: f64, config: &ExecutionConfig) -> Clamped {
    let affordable = max_affordable_quantity(cash, price, config);
    if requested > affordable {
        Clamped {
            quantity: affordable,
            clamped: true,
        }
    } else {
        Clamped {
            quantity: requested.max(0.0),
            clamped: false,
        }
    }
}

pub fn clamp_sell(requested: f64, held: f64) -> Clamped {
    if requested > held {
        Clamped {
            quantity: held.max(0.0),
            clamped: true,
        }
    } else {
        Clamped {
            quantity: requested.max(0.0),
            clamped: false,
        }
    }
}

/// A screened decision waiting for its fill bar.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    pub side: Side,
    pub quantity: f64,
    pub reason: TradeReason,
    pub signal_bar: usize,
    pub decided_at: NaiveDateTime,
    pub decision_price: f64,
    /// Replayed-bar index at or after which the order fills.
    pub execute_at: usize,
}

impl PendingOrder {
    pub fn is_due(&self, bar: usize) -> bool {
        bar >= self.execute_at
    }

    /// Fractional move from the decision price to `fill_price`.
    pub fn slippage(&self, fill_price: f64) -> f64 {
        if self.decision_price > 0.0 {
            (fill_price - self.decision_price) / self.decision_price
        } else {
            0.0
        }
    }
}
