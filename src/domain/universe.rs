//! Multi-instrument runs.
//!
//! Parses instrument lists, loads each instrument's bars through a
//! [`DataPort`], and replays the instruments independently (optionally in
//! parallel). Results are combined only after every replay has finished.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::backtest::{BacktestConfig, BacktestResult, Backtester};
use crate::domain::error::BacktestError;
use crate::domain::metrics::PerformanceReport;
use crate::domain::price_series::PriceSeries;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in instrument list")]
    EmptyToken,

    #[error("duplicate instrument: {0}")]
    DuplicateInstrument(String),
}

/// Split a comma-separated instrument list, trimming whitespace.
pub fn parse_instruments(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut instruments = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(UniverseError::DuplicateInstrument(trimmed.to_string()));
        }
        instruments.push(trimmed.to_string());
    }

    Ok(instruments)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The data port failed for this instrument.
    Unavailable(String),
    NoData,
    InsufficientBars { bars: usize, minimum: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstrument {
    pub instrument: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct LoadedUniverse {
    pub series: Vec<PriceSeries>,
    pub skipped: Vec<SkippedInstrument>,
}

/// Load every instrument, skipping those that fail to load or have fewer
/// than `min_bars` bars. Errors only if nothing usable remains.
pub fn fetch_universe(
    data_port: &dyn DataPort,
    instruments: &[String],
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    min_bars: usize,
) -> Result<LoadedUniverse, BacktestError> {
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for instrument in instruments {
        let bars = match data_port.fetch_bars(instrument, start, end) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(%instrument, error = %e, "skipping instrument, data unavailable");
                skipped.push(SkippedInstrument {
                    instrument: instrument.clone(),
                    reason: SkipReason::Unavailable(e.to_string()),
                });
                continue;
            }
        };

        if bars.is_empty() {
            warn!(%instrument, "skipping instrument, no bars");
            skipped.push(SkippedInstrument {
                instrument: instrument.clone(),
                reason: SkipReason::NoData,
            });
            continue;
        }

        if bars.len() < min_bars {
            warn!(
                %instrument,
                bars = bars.len(),
                minimum = min_bars,
                "skipping instrument, too few bars"
            );
            skipped.push(SkippedInstrument {
                instrument: instrument.clone(),
                reason: SkipReason::InsufficientBars {
                    bars: bars.len(),
                    minimum: min_bars,
                },
            });
            continue;
        }

        info!(%instrument, bars = bars.len(), "loaded");
        series.push(PriceSeries::new(instrument.clone(), bars));
    }

    if series.is_empty() {
        return Err(BacktestError::NoData {
            instrument: instruments.join(","),
        });
    }

    Ok(LoadedUniverse { series, skipped })
}

/// One instrument's replay and its report, or the error that stopped it.
#[derive(Debug)]
pub struct InstrumentOutcome {
    pub instrument: String,
    pub result: Result<(BacktestResult, PerformanceReport), BacktestError>,
}

/// Totals across the instruments whose replay succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSummary {
    pub instruments_run: usize,
    pub instruments_failed: usize,
    pub start_equity: f64,
    pub end_equity: f64,
    pub total_return: f64,
    pub trade_count: usize,
}

impl CombinedSummary {
    pub fn from_outcomes(outcomes: &[InstrumentOutcome]) -> Self {
        let mut summary = CombinedSummary {
            instruments_run: 0,
            instruments_failed: 0,
            start_equity: 0.0,
            end_equity: 0.0,
            total_return: 0.0,
            trade_count: 0,
        };

        for outcome in outcomes {
            match &outcome.result {
                Ok((result, report)) => {
                    summary.instruments_run += 1;
                    summary.start_equity += report.initial_equity;
                    summary.end_equity += report.final_equity;
                    summary.trade_count += result.trades.len();
                }
                Err(_) => summary.instruments_failed += 1,
            }
        }

        if summary.start_equity > 0.0 {
            summary.total_return = summary.end_equity / summary.start_equity - 1.0;
        }
        summary
    }
}

#[derive(Debug)]
pub struct UniverseReport {
    pub outcomes: Vec<InstrumentOutcome>,
    pub summary: CombinedSummary,
}

/// Replay each series with its own ledger and indicator state. A bad config
/// fails the whole call; a data error fails only that instrument.
pub fn run_universe(
    series: &[PriceSeries],
    config: &BacktestConfig,
    parallel: bool,
) -> Result<UniverseReport, BacktestError> {
    let backtester = Backtester::new(config.clone())?;
    let analysis = &config.analysis;

    let run_one = |s: &PriceSeries| {
        let result = backtester.run(s).map(|result| {
            let report = PerformanceReport::from_result(&result, analysis);
            (result, report)
        });
        if let Err(e) = &result {
            warn!(instrument = %s.instrument, error = %e, "replay failed");
        }
        InstrumentOutcome {
            instrument: s.instrument.clone(),
            result,
        }
    };

    let outcomes: Vec<InstrumentOutcome> = if parallel {
        series.par_iter().map(run_one).collect()
    } else {
        series.iter().map(run_one).collect()
    };

    let summary = CombinedSummary::from_outcomes(&outcomes);
    info!(
        run = summary.instruments_run,
        failed = summary.instruments_failed,
        total_return = summary.total_return,
        "universe finished"
    );

    Ok(UniverseReport { outcomes, summary })
}
