//! Portfolio ledger: cash, position and the append-only trade log for one
//! instrument.

use chrono::NaiveDateTime;

use super::position::{PositionState, Side, TradeRecord, QUANTITY_EPSILON};

/// Cash shortfalls smaller than this after a fully-clamped buy are rounding.
const CASH_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    pub cash: f64,
    pub quantity: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioLedger {
    pub instrument: String,
    pub initial_cash: f64,
    cash: f64,
    position: PositionState,
    fees_paid: f64,
    trades: Vec<TradeRecord>,
    equity_curve: Vec<EquityPoint>,
}

impl PortfolioLedger {
    pub fn new(instrument: impl Into<String>, initial_cash: f64) -> Self {
        PortfolioLedger {
            instrument: instrument.into(),
            initial_cash,
            cash: initial_cash,
            position: PositionState::default(),
            fees_paid: 0.0,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> PositionState {
        self.position
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Apply an already-feasible trade and append it to the log.
    ///
    /// Buys move the average entry price to the volume-weighted mean; sells
    /// leave it unchanged until the position is closed.
    pub fn apply(&mut self, trade: TradeRecord) -> PositionState {
        let notional = trade.notional();
        match trade.side {
            Side::Buy => {
                let new_quantity = self.position.quantity + trade.quantity;
                if new_quantity > QUANTITY_EPSILON {
                    self.position.avg_entry_price = (self.position.avg_entry_price
                        * self.position.quantity
                        + trade.price * trade.quantity)
                        / new_quantity;
                }
                self.position.quantity = new_quantity;
                self.cash -= notional + trade.fee;
                if self.cash < 0.0 && self.cash > -CASH_EPSILON {
                    self.cash = 0.0;
                }
            }
            Side::Sell => {
                self.position.quantity -= trade.quantity;
                if self.position.quantity <= QUANTITY_EPSILON {
                    self.position = PositionState::default();
                }
                self.cash += notional - trade.fee;
            }
        }
        debug_assert!(self.cash >= 0.0, "ledger cash went negative");
        debug_assert!(self.position.quantity >= 0.0, "ledger went short");

        self.fees_paid += trade.fee;
        self.trades.push(trade);
        self.position
    }

    /// Cash plus the position valued at `price`.
    pub fn mark_to_market(&self, price: f64) -> f64 {
        self.cash + self.position.market_value(price)
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, price: f64) {
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity: self.mark_to_market(price),
            cash: self.cash,
            quantity: self.position.quantity,
            price,
        });
    }

    /// Hand the trade log and equity curve over at the end of a run.
    pub fn into_parts(self) -> (Vec<TradeRecord>, Vec<EquityPoint>) {
        (self.trades, self.equity_curve)
    }
}
