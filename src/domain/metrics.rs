//! Performance analysis over a finished equity curve and trade log.
//!
//! Everything here is a pure function of its inputs; computing a report twice
//! on the same run yields identical values.

use std::collections::VecDeque;

use chrono::NaiveDateTime;

use super::backtest::BacktestResult;
use super::error::BacktestError;
use super::portfolio::EquityPoint;
use super::position::{Side, TradeRecord, QUANTITY_EPSILON};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Annualization factor for per-bar statistics (8760 for hourly bars).
    pub bars_per_year: f64,
    /// Annual risk-free rate subtracted from per-bar returns.
    pub risk_free_rate: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            bars_per_year: 8760.0,
            risk_free_rate: 0.0,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !self.bars_per_year.is_finite() || self.bars_per_year <= 0.0 {
            return Err(BacktestError::invalid(
                "analysis",
                "bars_per_year",
                "bars_per_year must be positive",
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(BacktestError::invalid(
                "analysis",
                "risk_free_rate",
                "risk_free_rate must be finite",
            ));
        }
        Ok(())
    }
}

/// A buy lot matched (FIFO) against part or all of a later sell.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Entry and exit fees, pro-rated by matched quantity.
    pub fees: f64,
    pub pnl: f64,
}

impl RoundTrip {
    /// Bars are not known here, so duration is wall-clock.
    pub fn holding_period(&self) -> chrono::Duration {
        self.exit_time - self.entry_time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of consecutive samples below the running peak.
    pub max_drawdown_duration: usize,
    pub trade_count: usize,
    pub total_fees: f64,
    pub round_trips: Vec<RoundTrip>,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl PerformanceReport {
    pub fn from_result(result: &BacktestResult, config: &AnalysisConfig) -> Self {
        Self::compute(
            &result.equity_curve,
            &result.trades,
            result.initial_cash,
            config,
        )
    }

    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[TradeRecord],
        initial_equity: f64,
        config: &AnalysisConfig,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_equity);

        let total_return = if initial_equity > 0.0 {
            final_equity / initial_equity - 1.0
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / config.bars_per_year;
        let annualized_return = if years > 0.0 && total_return > -1.0 && total_return.is_finite()
        {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let bar_rf = config.risk_free_rate / config.bars_per_year;
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(equity_curve, bar_rf, config.bars_per_year);

        let round_trips = match_round_trips(trades);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trip in &round_trips {
            let pnl = trip.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let total_trips = round_trips.len();
        let win_rate = if total_trips > 0 {
            trades_won as f64 / total_trips as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };
        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        PerformanceReport {
            initial_equity,
            final_equity,
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            trade_count: trades.len(),
            total_fees: trades.iter().map(|t| t.fee).sum(),
            round_trips,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
        }
    }
}

/// Maximum fractional drawdown and its longest duration in samples, using a
/// running peak seeded with the first sample.
pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut current_duration = 0usize;
    let mut max_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}

/// Annualized Sharpe and Sortino ratios from per-bar simple returns, using
/// population standard deviation.
pub fn compute_risk_adjusted(
    equity_curve: &[EquityPoint],
    bar_rf: f64,
    bars_per_year: f64,
) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess = mean - bar_rf;
    let scale = bars_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        excess / stddev * scale
    } else {
        0.0
    };

    let downside = returns
        .iter()
        .filter(|&&r| r < bar_rf)
        .map(|&r| (r - bar_rf).powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside.sqrt();
    let sortino = if downside_stddev > 0.0 {
        excess / downside_stddev * scale
    } else {
        0.0
    };

    (sharpe, sortino)
}

struct Lot {
    timestamp: NaiveDateTime,
    remaining: f64,
    price: f64,
    fee_per_unit: f64,
}

/// Pair sells with the oldest open buy lots. A sell spanning several lots
/// produces one round trip per lot; lots still open at the end are ignored.
pub fn match_round_trips(trades: &[TradeRecord]) -> Vec<RoundTrip> {
    let mut lots: VecDeque<Lot> = VecDeque::new();
    let mut trips = Vec::new();

    for trade in trades {
        if trade.quantity <= QUANTITY_EPSILON {
            continue;
        }
        match trade.side {
            Side::Buy => lots.push_back(Lot {
                timestamp: trade.timestamp,
                remaining: trade.quantity,
                price: trade.price,
                fee_per_unit: trade.fee / trade.quantity,
            }),
            Side::Sell => {
                let exit_fee_per_unit = trade.fee / trade.quantity;
                let mut to_match = trade.quantity;

                while to_match > QUANTITY_EPSILON {
                    let Some(lot) = lots.front_mut() else {
                        break;
                    };
                    let quantity = to_match.min(lot.remaining);
                    let fees = quantity * (lot.fee_per_unit + exit_fee_per_unit);
                    trips.push(RoundTrip {
                        entry_time: lot.timestamp,
                        exit_time: trade.timestamp,
                        quantity,
                        entry_price: lot.price,
                        exit_price: trade.price,
                        fees,
                        pnl: quantity * (trade.price - lot.price) - fees,
                    });

                    lot.remaining -= quantity;
                    to_match -= quantity;
                    if lot.remaining <= QUANTITY_EPSILON {
                        lots.pop_front();
                    }
                }
            }
        }
    }

    trips
}
