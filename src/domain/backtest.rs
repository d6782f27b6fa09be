//! Backtest engine: bar-by-bar replay of one instrument.
//!
//! Per replayed bar, in order:
//! 1. fill the pending order if its fill bar has arrived
//! 2. fold the close into the indicator state
//! 3. ask the rule set for a decision (unless warming up or an order is
//!    already pending) and screen it into a pending order
//! 4. append an equity sample
//!
//! Bars are validated before replay according to `DataConfig::on_gap`.

use std::str::FromStr;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::domain::error::BacktestError;
use crate::domain::execution::{
    calculate_fee, clamp_buy, clamp_sell, ExecutionConfig, PendingOrder,
};
use crate::domain::indicator_state::IndicatorState;
use crate::domain::metrics::AnalysisConfig;
use crate::domain::ohlcv::Bar;
use crate::domain::portfolio::{EquityPoint, PortfolioLedger};
use crate::domain::position::{PositionState, Side, TradeReason, TradeRecord, QUANTITY_EPSILON};
use crate::domain::price_series::PriceSeries;
use crate::domain::signal::{rules_for, Decision, SignalContext, SignalEngine};
use crate::domain::strategy::StrategyConfig;

/// What to do with a bar that is invalid, out of order, or follows a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapPolicy {
    /// Abort the instrument's run with an error.
    Reject,
    /// Drop invalid and out-of-order bars; on a gap, reset every rolling
    /// window so rules see insufficient history until they refill.
    Skip,
}

impl FromStr for GapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(GapPolicy::Reject),
            "skip" => Ok(GapPolicy::Skip),
            other => Err(format!("unknown gap policy '{other}', expected reject or skip")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub on_gap: GapPolicy,
    /// Nominal spacing between consecutive bars.
    pub bar_interval_secs: i64,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            on_gap: GapPolicy::Reject,
            bar_interval_secs: 3600,
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.bar_interval_secs <= 0 {
            return Err(BacktestError::invalid(
                "data",
                "bar_interval_secs",
                "bar_interval_secs must be positive",
            ));
        }
        Ok(())
    }

    fn interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.bar_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BacktestConfig {
    pub strategy: StrategyConfig,
    pub execution: ExecutionConfig,
    pub data: DataConfig,
    pub analysis: AnalysisConfig,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        self.strategy.validate()?;
        self.execution.validate()?;
        self.data.validate()?;
        self.analysis.validate()?;
        Ok(())
    }
}

/// Output of one instrument's replay.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub instrument: String,
    pub initial_cash: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    pub final_cash: f64,
    pub final_position: PositionState,
    pub bars_replayed: usize,
    pub bars_skipped: usize,
    pub gaps: usize,
    /// Order still waiting for its fill bar when the data ran out.
    pub unfilled_order: Option<PendingOrder>,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_cash)
    }
}

/// Validated, immutable engine. One instance may replay any number of
/// instruments; runs share no mutable state.
#[derive(Debug, Clone)]
pub struct Backtester {
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run(&self, series: &PriceSeries) -> Result<BacktestResult, BacktestError> {
        if series.is_empty() {
            return Err(BacktestError::NoData {
                instrument: series.instrument.clone(),
            });
        }

        let rules = rules_for(&self.config.strategy);
        let mut replay = Replay {
            config: &self.config,
            rules: rules.as_ref(),
            instrument: &series.instrument,
            indicators: IndicatorState::new(&self.config.strategy),
            ledger: PortfolioLedger::new(
                series.instrument.clone(),
                self.config.execution.initial_cash,
            ),
            pending: None,
            last_exit_bar: None,
            replayed: 0,
            skipped: 0,
            gaps: 0,
            previous: None,
        };

        info!(
            instrument = %series.instrument,
            bars = series.len(),
            variant = %self.config.strategy.variant,
            "starting replay"
        );

        for (index, bar) in series.bars.iter().enumerate() {
            if replay.admit(index, bar)? {
                replay.step(bar);
            }
        }

        Ok(replay.finish())
    }
}

/// Convenience wrapper: validate `config` and replay `series` once.
pub fn run_backtest(
    series: &PriceSeries,
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    Backtester::new(config.clone())?.run(series)
}

struct Replay<'a> {
    config: &'a BacktestConfig,
    rules: &'a (dyn SignalEngine + Send + Sync),
    instrument: &'a str,
    indicators: IndicatorState,
    ledger: PortfolioLedger,
    pending: Option<PendingOrder>,
    last_exit_bar: Option<usize>,
    replayed: usize,
    skipped: usize,
    gaps: usize,
    previous: Option<NaiveDateTime>,
}

impl Replay<'_> {
    /// Decide whether `bar` is replayed. Errors under `GapPolicy::Reject`.
    fn admit(&mut self, index: usize, bar: &Bar) -> Result<bool, BacktestError> {
        let policy = self.config.data.on_gap;

        if let Some(reason) = bar.defect() {
            if policy == GapPolicy::Reject {
                return Err(BacktestError::InvalidBar {
                    instrument: self.instrument.to_string(),
                    index,
                    reason: reason.to_string(),
                });
            }
            warn!(instrument = %self.instrument, index, reason, "skipping invalid bar");
            self.skipped += 1;
            return Ok(false);
        }

        if let Some(previous) = self.previous {
            if bar.timestamp <= previous {
                if policy == GapPolicy::Reject {
                    return Err(BacktestError::OutOfOrderBar {
                        instrument: self.instrument.to_string(),
                        index,
                        timestamp: bar.timestamp,
                        previous,
                    });
                }
                warn!(
                    instrument = %self.instrument,
                    index,
                    timestamp = %bar.timestamp,
                    previous = %previous,
                    "skipping out-of-order bar"
                );
                self.skipped += 1;
                return Ok(false);
            }

            let expected = previous + self.config.data.interval();
            if bar.timestamp > expected {
                if policy == GapPolicy::Reject {
                    return Err(BacktestError::DataGap {
                        instrument: self.instrument.to_string(),
                        index,
                        expected,
                        found: bar.timestamp,
                    });
                }
                warn!(
                    instrument = %self.instrument,
                    index,
                    expected = %expected,
                    found = %bar.timestamp,
                    "gap in bars, resetting indicator history"
                );
                self.indicators.reset();
                self.gaps += 1;
            }
        }

        self.previous = Some(bar.timestamp);
        Ok(true)
    }

    fn step(&mut self, bar: &Bar) {
        let t = self.replayed;
        self.replayed += 1;

        if self.pending.as_ref().is_some_and(|order| order.is_due(t)) {
            if let Some(order) = self.pending.take() {
                let price = self.config.execution.fill_price(bar);
                self.fill(order, t, bar.timestamp, price);
            }
        }

        self.indicators.update(bar.close);

        if self.pending.is_none() && self.replayed > self.config.execution.warmup_bars {
            let position = self.ledger.position();
            let equity = self.ledger.mark_to_market(bar.close);
            let ctx = SignalContext {
                indicators: &self.indicators,
                price: bar.close,
                position,
                equity,
                bar: t,
                last_exit_bar: self.last_exit_bar,
            };
            let decision = self.rules.decide(&ctx);
            self.pending = self.screen(decision, t, bar, position, equity);
        }

        self.ledger.record_equity(bar.timestamp, bar.close);
    }

    /// Turn a decision into a pending order, applying the rebalance band and
    /// the notional floor at the decision price.
    fn screen(
        &self,
        decision: Decision,
        t: usize,
        bar: &Bar,
        position: PositionState,
        equity: f64,
    ) -> Option<PendingOrder> {
        let strategy = &self.config.strategy;
        let price = bar.close;

        let (side, quantity, reason) = match decision {
            Decision::Hold => return None,
            Decision::Enter { quantity } => (Side::Buy, quantity, TradeReason::Entry),
            Decision::Exit { reason } => (Side::Sell, position.quantity, TradeReason::Exit(reason)),
            Decision::Rebalance { target_quantity } => {
                let delta = target_quantity - position.quantity;
                if (delta * price).abs() <= strategy.rebalance_threshold * equity {
                    return None;
                }
                let side = if delta > 0.0 { Side::Buy } else { Side::Sell };
                (side, delta.abs(), TradeReason::Rebalance)
            }
        };

        if quantity <= QUANTITY_EPSILON {
            return None;
        }
        let notional = quantity * price;
        if notional < strategy.min_trade_notional {
            debug!(
                instrument = %self.instrument,
                bar = t,
                %side,
                notional,
                "decision below notional floor"
            );
            return None;
        }

        Some(PendingOrder {
            side,
            quantity,
            reason,
            signal_bar: t,
            decided_at: bar.timestamp,
            decision_price: price,
            execute_at: t + self.config.execution.fill_delay(),
        })
    }

    fn fill(&mut self, order: PendingOrder, t: usize, timestamp: NaiveDateTime, price: f64) {
        let execution = &self.config.execution;
        let clamped = match order.side {
            Side::Buy => clamp_buy(order.quantity, self.ledger.cash(), price, execution),
            Side::Sell => clamp_sell(order.quantity, self.ledger.position().quantity),
        };

        let notional = clamped.quantity * price;
        if clamped.quantity <= QUANTITY_EPSILON
            || notional < self.config.strategy.min_trade_notional
        {
            debug!(
                instrument = %self.instrument,
                bar = t,
                side = %order.side,
                notional,
                "fill below notional floor after clamping, dropped"
            );
            return;
        }

        if clamped.clamped {
            warn!(
                instrument = %self.instrument,
                bar = t,
                side = %order.side,
                requested = order.quantity,
                filled = clamped.quantity,
                "order reduced to feasible quantity"
            );
        }

        let trade = TradeRecord {
            timestamp,
            instrument: self.instrument.to_string(),
            side: order.side,
            quantity: clamped.quantity,
            price,
            fee: calculate_fee(notional, execution),
            reason: order.reason,
            decided_at: order.decided_at,
            signal_bar: order.signal_bar,
            fill_bar: t,
            clamped: clamped.clamped,
        };
        debug!(
            instrument = %self.instrument,
            bar = t,
            side = %trade.side,
            quantity = trade.quantity,
            price,
            slippage = order.slippage(price),
            reason = %trade.reason,
            "filled"
        );

        self.ledger.apply(trade);
        if matches!(order.reason, TradeReason::Exit(_)) {
            self.last_exit_bar = Some(t);
        }
    }

    fn finish(self) -> BacktestResult {
        if let Some(order) = &self.pending {
            warn!(
                instrument = %self.instrument,
                side = %order.side,
                signal_bar = order.signal_bar,
                "replay ended with an unfilled order"
            );
        }

        let final_cash = self.ledger.cash();
        let final_position = self.ledger.position();
        let initial_cash = self.ledger.initial_cash;
        let (trades, equity_curve) = self.ledger.into_parts();

        info!(
            instrument = %self.instrument,
            bars = self.replayed,
            skipped = self.skipped,
            trades = trades.len(),
            "replay finished"
        );

        BacktestResult {
            instrument: self.instrument.to_string(),
            initial_cash,
            equity_curve,
            trades,
            final_cash,
            final_position,
            bars_replayed: self.replayed,
            bars_skipped: self.skipped,
            gaps: self.gaps,
            unfilled_order: self.pending,
        }
    }
}
