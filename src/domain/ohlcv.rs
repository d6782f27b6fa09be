//! OHLCV bar representation.

use chrono::NaiveDateTime;

/// One price sample for a fixed interval. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Bar whose open, high, low and close are all `price`.
    pub fn flat(timestamp: NaiveDateTime, price: f64) -> Self {
        Bar::new(timestamp, price, price, price, price, 0.0)
    }

    /// Returns the reason this bar cannot be replayed, if any.
    ///
    /// Open and close must be positive and finite since both can be used as
    /// fill prices. High/low are informational and only checked for finiteness.
    pub fn defect(&self) -> Option<&'static str> {
        if !self.close.is_finite() || self.close <= 0.0 {
            return Some("close must be positive and finite");
        }
        if !self.open.is_finite() || self.open <= 0.0 {
            return Some("open must be positive and finite");
        }
        if !self.high.is_finite() || !self.low.is_finite() {
            return Some("high and low must be finite");
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Some("volume must be non-negative");
        }
        None
    }
}
