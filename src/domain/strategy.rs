//! Strategy configuration.
//!
//! A `StrategyConfig` is built once, validated, and then only ever read. The
//! variant tag selects which rule set the signal engine applies; all
//! thresholds live here rather than in the engine.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::BacktestError;

const SECTION: &str = "strategy";

/// Rule set selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyVariant {
    /// Enter once, exit only on a catastrophic drawdown from the rolling peak.
    BuyAndHold,
    /// Moving-average trend entry with bar confirmation and prioritized exits.
    TrendFollowing,
}

impl FromStr for StrategyVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy_and_hold" | "buyhold" | "catastrophic" => Ok(StrategyVariant::BuyAndHold),
            "trend_following" | "trend" => Ok(StrategyVariant::TrendFollowing),
            other => Err(format!(
                "unknown variant '{other}', expected buy_and_hold or trend_following"
            )),
        }
    }
}

impl fmt::Display for StrategyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyVariant::BuyAndHold => write!(f, "buy_and_hold"),
            StrategyVariant::TrendFollowing => write!(f, "trend_following"),
        }
    }
}

/// Whether a strategy may open a new position after it has exited one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReentryPolicy {
    /// The first exit is terminal for the instrument for the rest of the run.
    Never,
    /// Entry rules resume `cooldown_bars` bars after the exit fill. With a
    /// cooldown of 0 an entry may be decided on the exit's fill bar.
    Allow { cooldown_bars: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    pub variant: StrategyVariant,
    /// Target position value as a fraction of equity.
    pub max_position_pct: f64,
    /// Fractional decline from the rolling peak that forces an exit.
    pub max_drawdown_exit: f64,
    pub lookback_for_peak: usize,
    /// Minimum position drift, as a fraction of equity, worth rebalancing.
    pub rebalance_threshold: f64,
    pub min_trade_notional: f64,
    pub short_ma_window: usize,
    pub long_ma_window: usize,
    pub confirmation_bars: usize,
    /// Exit when price < long MA * (1 - margin).
    pub strong_downtrend_margin: f64,
    /// Number of trailing bars inspected by the short-MA weakness exit.
    pub weakness_window: usize,
    /// Weak bars within `weakness_window` needed to exit.
    pub weakness_min_count: usize,
    pub rebalance_while_holding: bool,
    pub reentry: ReentryPolicy,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::trend_following()
    }
}

impl StrategyConfig {
    pub fn trend_following() -> Self {
        StrategyConfig {
            name: "Confirmed Trend".into(),
            variant: StrategyVariant::TrendFollowing,
            max_position_pct: 0.55,
            max_drawdown_exit: 0.15,
            lookback_for_peak: 336,
            rebalance_threshold: 0.01,
            min_trade_notional: 200.0,
            short_ma_window: 96,
            long_ma_window: 336,
            confirmation_bars: 3,
            strong_downtrend_margin: 0.05,
            weakness_window: 3,
            weakness_min_count: 2,
            rebalance_while_holding: false,
            reentry: ReentryPolicy::Allow { cooldown_bars: 0 },
        }
    }

    pub fn buy_and_hold() -> Self {
        StrategyConfig {
            name: "Catastrophic Protection".into(),
            variant: StrategyVariant::BuyAndHold,
            reentry: ReentryPolicy::Never,
            ..StrategyConfig::trend_following()
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        fraction_open_closed("max_position_pct", self.max_position_pct)?;
        if !(self.max_drawdown_exit > 0.0 && self.max_drawdown_exit < 1.0) {
            return Err(BacktestError::invalid(
                SECTION,
                "max_drawdown_exit",
                "max_drawdown_exit must be between 0 and 1 (exclusive)",
            ));
        }
        fraction_closed_open("rebalance_threshold", self.rebalance_threshold)?;
        fraction_closed_open("strong_downtrend_margin", self.strong_downtrend_margin)?;
        if !self.min_trade_notional.is_finite() || self.min_trade_notional < 0.0 {
            return Err(BacktestError::invalid(
                SECTION,
                "min_trade_notional",
                "min_trade_notional must be non-negative",
            ));
        }
        positive_window("lookback_for_peak", self.lookback_for_peak)?;

        if self.variant == StrategyVariant::TrendFollowing {
            positive_window("short_ma_window", self.short_ma_window)?;
            positive_window("long_ma_window", self.long_ma_window)?;
            if self.short_ma_window >= self.long_ma_window {
                return Err(BacktestError::invalid(
                    SECTION,
                    "short_ma_window",
                    "short_ma_window must be less than long_ma_window",
                ));
            }
            positive_window("confirmation_bars", self.confirmation_bars)?;
            positive_window("weakness_window", self.weakness_window)?;
            if self.weakness_min_count == 0 || self.weakness_min_count > self.weakness_window {
                return Err(BacktestError::invalid(
                    SECTION,
                    "weakness_min_count",
                    "weakness_min_count must be between 1 and weakness_window",
                ));
            }
        }
        Ok(())
    }
}

fn fraction_open_closed(key: &str, value: f64) -> Result<(), BacktestError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(BacktestError::invalid(
            SECTION,
            key,
            format!("{key} must be greater than 0 and at most 1"),
        ))
    }
}

fn fraction_closed_open(key: &str, value: f64) -> Result<(), BacktestError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(BacktestError::invalid(
            SECTION,
            key,
            format!("{key} must be at least 0 and less than 1"),
        ))
    }
}

fn positive_window(key: &str, value: usize) -> Result<(), BacktestError> {
    if value == 0 {
        return Err(BacktestError::invalid(
            SECTION,
            key,
            format!("{key} must be at least 1"),
        ));
    }
    Ok(())
}
