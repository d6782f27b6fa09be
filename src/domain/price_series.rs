//! Per-instrument bar sequence handed to the simulation loop.

use crate::domain::ohlcv::Bar;
use chrono::NaiveDateTime;

/// Bars for a single instrument, in the order the data collaborator supplied
/// them. The series is not re-sorted here; ordering problems are detected and
/// handled by the simulation loop according to the configured gap policy.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub instrument: String,
    pub bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(instrument: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            instrument: instrument.into(),
            bars,
        }
    }

    /// Series of flat bars spaced `interval_secs` apart starting at `start`.
    pub fn from_closes(
        instrument: impl Into<String>,
        start: NaiveDateTime,
        interval_secs: i64,
        closes: &[f64],
    ) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Bar::flat(
                    start + chrono::Duration::seconds(interval_secs * i as i64),
                    close,
                )
            })
            .collect();
        Self::new(instrument, bars)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// First timestamp, last timestamp and bar count.
    pub fn span(&self) -> Option<(NaiveDateTime, NaiveDateTime, usize)> {
        let first = self.bars.first()?;
        let last = self.bars.last()?;
        Some((first.timestamp, last.timestamp, self.bars.len()))
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.close)
    }
}
