//! Incremental rolling-window indicators.
//!
//! Every primitive here consumes one value per bar and reports `None` until
//! its window has filled:
//! - `Sma`: simple moving average over a ring buffer with a running sum
//! - `RollingMax`: trailing peak over a monotonic deque
//! - `FlagWindow`: number of true flags among the last n bars

pub mod flag_window;
pub mod rolling_max;
pub mod sma;

pub use flag_window::FlagWindow;
pub use rolling_max::RollingMax;
pub use sma::Sma;
