//! Bar data access port.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDateTime;

/// Source of historical bars. Implementations return bars in the order they
/// are stored; ordering and gaps are checked by the simulation loop.
pub trait DataPort {
    /// Bars for `instrument`, optionally limited to `[start, end]` inclusive.
    fn fetch_bars(
        &self,
        instrument: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, BacktestError>;

    fn list_instruments(&self) -> Result<Vec<String>, BacktestError>;

    /// First timestamp, last timestamp and bar count, or `None` when the
    /// instrument has no bars.
    fn get_data_range(
        &self,
        instrument: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, BacktestError>;
}
