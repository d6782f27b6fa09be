//! Position state and the executed-trade record.

use chrono::NaiveDateTime;
use std::fmt;

/// Quantities at or below this are treated as no position.
pub const QUANTITY_EPSILON: f64 = 1e-12;

/// Long-only holding for one instrument. Owned by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionState {
    pub quantity: f64,
    pub avg_entry_price: f64,
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        self.quantity <= QUANTITY_EPSILON
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        if self.is_flat() {
            0.0
        } else {
            self.quantity * (price - self.avg_entry_price)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Why an exit fired. Trend-following exits are checked in declaration order
/// and the first that holds is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Price fell below the long MA by more than the downtrend margin.
    StrongDowntrend,
    /// Drawdown from the rolling peak exceeded the configured limit.
    DrawdownFromPeak,
    /// Enough recent bars closed under the short MA.
    ShortMaWeakness,
    /// Buy-and-hold protection: drawdown from the rolling peak.
    Catastrophic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeReason {
    Entry,
    Rebalance,
    Exit(ExitReason),
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeReason::Entry => write!(f, "entry"),
            TradeReason::Rebalance => write!(f, "rebalance"),
            TradeReason::Exit(ExitReason::StrongDowntrend) => write!(f, "exit_strong_downtrend"),
            TradeReason::Exit(ExitReason::DrawdownFromPeak) => write!(f, "exit_drawdown"),
            TradeReason::Exit(ExitReason::ShortMaWeakness) => write!(f, "exit_short_ma_weakness"),
            TradeReason::Exit(ExitReason::Catastrophic) => write!(f, "exit_catastrophic"),
        }
    }
}

/// One executed trade. Created once per fill and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    /// Timestamp of the fill bar.
    pub timestamp: NaiveDateTime,
    pub instrument: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub reason: TradeReason,
    /// Timestamp of the bar whose data produced the decision.
    pub decided_at: NaiveDateTime,
    /// Index (among replayed bars) of the decision bar.
    pub signal_bar: usize,
    /// Index (among replayed bars) of the fill bar.
    pub fill_bar: usize,
    /// Set when the requested quantity was reduced to what was feasible.
    pub clamped: bool,
}

impl TradeRecord {
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}
