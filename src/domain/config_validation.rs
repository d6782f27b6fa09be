//! Builds a validated `BacktestConfig` from a [`ConfigPort`].
//!
//! Missing keys keep their defaults. Present keys must parse; a value that
//! does not parse or is out of range yields `ConfigInvalid` naming the
//! section and key. Unknown keys are logged and ignored.

use std::str::FromStr;

use tracing::warn;

use crate::domain::backtest::{BacktestConfig, DataConfig, GapPolicy};
use crate::domain::error::BacktestError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::metrics::AnalysisConfig;
use crate::domain::strategy::{ReentryPolicy, StrategyConfig, StrategyVariant};
use crate::domain::universe::parse_instruments;
use crate::ports::config_port::ConfigPort;

const STRATEGY_KEYS: &[&str] = &[
    "name",
    "variant",
    "max_position_pct",
    "max_drawdown_exit",
    "lookback_for_peak",
    "rebalance_threshold",
    "min_trade_notional",
    "short_ma_window",
    "long_ma_window",
    "confirmation_bars",
    "strong_downtrend_margin",
    "weakness_window",
    "weakness_min_count",
    "rebalance_while_holding",
    "reentry",
    "reentry_cooldown_bars",
];
const EXECUTION_KEYS: &[&str] = &[
    "initial_cash",
    "fee_rate_per_side",
    "execution_lag_bars",
    "warmup_bars",
];
const DATA_KEYS: &[&str] = &["on_gap", "bar_interval_secs", "instruments"];
const ANALYSIS_KEYS: &[&str] = &["bars_per_year", "risk_free_rate"];

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, BacktestError> {
    warn_unknown_keys(config, "strategy", STRATEGY_KEYS);
    warn_unknown_keys(config, "execution", EXECUTION_KEYS);
    warn_unknown_keys(config, "data", DATA_KEYS);
    warn_unknown_keys(config, "analysis", ANALYSIS_KEYS);

    let built = BacktestConfig {
        strategy: build_strategy_config(config)?,
        execution: build_execution_config(config)?,
        data: build_data_config(config)?,
        analysis: build_analysis_config(config)?,
    };
    built.validate()?;
    Ok(built)
}

pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, BacktestError> {
    const S: &str = "strategy";

    let variant = parse_value::<StrategyVariant>(config, S, "variant")?
        .unwrap_or(StrategyVariant::TrendFollowing);
    let mut strategy = match variant {
        StrategyVariant::BuyAndHold => StrategyConfig::buy_and_hold(),
        StrategyVariant::TrendFollowing => StrategyConfig::trend_following(),
    };

    if let Some(name) = config.get_string(S, "name") {
        let name = name.trim();
        if !name.is_empty() {
            strategy.name = name.to_string();
        }
    }
    set(&mut strategy.max_position_pct, parse_value(config, S, "max_position_pct")?);
    set(&mut strategy.max_drawdown_exit, parse_value(config, S, "max_drawdown_exit")?);
    set(&mut strategy.lookback_for_peak, parse_value(config, S, "lookback_for_peak")?);
    set(&mut strategy.rebalance_threshold, parse_value(config, S, "rebalance_threshold")?);
    set(&mut strategy.min_trade_notional, parse_value(config, S, "min_trade_notional")?);
    set(&mut strategy.short_ma_window, parse_value(config, S, "short_ma_window")?);
    set(&mut strategy.long_ma_window, parse_value(config, S, "long_ma_window")?);
    set(&mut strategy.confirmation_bars, parse_value(config, S, "confirmation_bars")?);
    set(
        &mut strategy.strong_downtrend_margin,
        parse_value(config, S, "strong_downtrend_margin")?,
    );
    set(&mut strategy.weakness_window, parse_value(config, S, "weakness_window")?);
    set(&mut strategy.weakness_min_count, parse_value(config, S, "weakness_min_count")?);
    set(
        &mut strategy.rebalance_while_holding,
        parse_bool(config, S, "rebalance_while_holding")?,
    );

    let cooldown: Option<usize> = parse_value(config, S, "reentry_cooldown_bars")?;
    match config.get_string(S, "reentry") {
        Some(raw) => {
            strategy.reentry = match raw.trim().to_lowercase().as_str() {
                "never" => ReentryPolicy::Never,
                "allow" => ReentryPolicy::Allow {
                    cooldown_bars: cooldown.unwrap_or(0),
                },
                other => {
                    return Err(BacktestError::invalid(
                        S,
                        "reentry",
                        format!("unknown reentry policy '{other}', expected never or allow"),
                    ));
                }
            };
        }
        None => {
            if let (ReentryPolicy::Allow { cooldown_bars }, Some(c)) =
                (&mut strategy.reentry, cooldown)
            {
                *cooldown_bars = c;
            }
        }
    }
    if cooldown.is_some() && strategy.reentry == ReentryPolicy::Never {
        warn!("reentry_cooldown_bars has no effect with reentry = never");
    }

    Ok(strategy)
}

pub fn build_execution_config(config: &dyn ConfigPort) -> Result<ExecutionConfig, BacktestError> {
    const S: &str = "execution";
    let mut execution = ExecutionConfig::default();
    set(&mut execution.initial_cash, parse_value(config, S, "initial_cash")?);
    set(&mut execution.fee_rate_per_side, parse_value(config, S, "fee_rate_per_side")?);
    set(&mut execution.execution_lag_bars, parse_value(config, S, "execution_lag_bars")?);
    set(&mut execution.warmup_bars, parse_value(config, S, "warmup_bars")?);
    Ok(execution)
}

pub fn build_data_config(config: &dyn ConfigPort) -> Result<DataConfig, BacktestError> {
    const S: &str = "data";
    let mut data = DataConfig::default();
    set(&mut data.on_gap, parse_value::<GapPolicy>(config, S, "on_gap")?);
    set(&mut data.bar_interval_secs, parse_value(config, S, "bar_interval_secs")?);
    Ok(data)
}

pub fn build_analysis_config(config: &dyn ConfigPort) -> Result<AnalysisConfig, BacktestError> {
    const S: &str = "analysis";
    let mut analysis = AnalysisConfig::default();
    set(&mut analysis.bars_per_year, parse_value(config, S, "bars_per_year")?);
    set(&mut analysis.risk_free_rate, parse_value(config, S, "risk_free_rate")?);
    Ok(analysis)
}

/// The `[data] instruments` list.
pub fn instruments_from_config(config: &dyn ConfigPort) -> Result<Vec<String>, BacktestError> {
    let raw = config
        .get_string("data", "instruments")
        .ok_or_else(|| BacktestError::ConfigMissing {
            section: "data".to_string(),
            key: "instruments".to_string(),
        })?;
    parse_instruments(&raw)
        .map_err(|e| BacktestError::invalid("data", "instruments", e.to_string()))
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *field = v;
    }
}

fn parse_value<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, BacktestError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    raw.parse::<T>().map(Some).map_err(|e| {
        BacktestError::invalid(section, key, format!("cannot parse '{raw}': {e}"))
    })
}

fn parse_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<bool>, BacktestError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(Some(true)),
        "false" | "no" | "0" => Ok(Some(false)),
        other => Err(BacktestError::invalid(
            section,
            key,
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

fn warn_unknown_keys(config: &dyn ConfigPort, section: &str, known: &[&str]) {
    for key in config.keys(section) {
        if !known.contains(&key.as_str()) {
            warn!(section, key = %key, "ignoring unknown config key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            MapConfig(
                entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }

        fn keys(&self, section: &str) -> Vec<String> {
            self.0
                .keys()
                .filter(|(s, _)| s == section)
                .map(|(_, k)| k.clone())
                .collect()
        }
    }

    #[test]
    fn empty_config_gives_defaults() {
        let built = build_backtest_config(&MapConfig::new(&[])).unwrap();
        assert_eq!(built, BacktestConfig::default());
        assert_eq!(built.strategy.variant, StrategyVariant::TrendFollowing);
        assert_eq!(built.strategy.short_ma_window, 96);
        assert_eq!(built.strategy.long_ma_window, 336);
        assert!((built.analysis.bars_per_year - 8760.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = MapConfig::new(&[
            ("strategy", "variant", "buy_and_hold"),
            ("strategy", "max_position_pct", "0.8"),
            ("strategy", "lookback_for_peak", "48"),
            ("strategy", "rebalance_while_holding", "yes"),
            ("execution", "fee_rate_per_side", "0.002"),
            ("execution", "execution_lag_bars", "0"),
            ("data", "on_gap", "skip"),
            ("data", "bar_interval_secs", "900"),
            ("analysis", "bars_per_year", "35040"),
        ]);
        let built = build_backtest_config(&cfg).unwrap();

        assert_eq!(built.strategy.variant, StrategyVariant::BuyAndHold);
        assert_eq!(built.strategy.reentry, ReentryPolicy::Never);
        assert!((built.strategy.max_position_pct - 0.8).abs() < f64::EPSILON);
        assert_eq!(built.strategy.lookback_for_peak, 48);
        assert!(built.strategy.rebalance_while_holding);
        assert!((built.execution.fee_rate_per_side - 0.002).abs() < f64::EPSILON);
        assert_eq!(built.execution.execution_lag_bars, 0);
        assert_eq!(built.data.on_gap, GapPolicy::Skip);
        assert_eq!(built.data.bar_interval_secs, 900);
        assert!((built.analysis.bars_per_year - 35040.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_numeric_value_is_invalid() {
        let cfg = MapConfig::new(&[("strategy", "max_position_pct", "lots")]);
        let err = build_backtest_config(&cfg).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::ConfigInvalid { section, key, .. }
                if section == "strategy" && key == "max_position_pct"
        ));
    }

    #[test]
    fn negative_window_is_invalid() {
        let cfg = MapConfig::new(&[("strategy", "short_ma_window", "-5")]);
        assert!(matches!(
            build_backtest_config(&cfg).unwrap_err(),
            BacktestError::ConfigInvalid { key, .. } if key == "short_ma_window"
        ));
    }

    #[test]
    fn out_of_range_is_invalid() {
        let cfg = MapConfig::new(&[("strategy", "max_drawdown_exit", "1.5")]);
        assert!(matches!(
            build_backtest_config(&cfg).unwrap_err(),
            BacktestError::ConfigInvalid { key, .. } if key == "max_drawdown_exit"
        ));

        let cfg = MapConfig::new(&[
            ("strategy", "short_ma_window", "400"),
            ("strategy", "long_ma_window", "336"),
        ]);
        assert!(build_backtest_config(&cfg).unwrap_err().is_config());
    }

    #[test]
    fn unknown_enum_names_are_invalid() {
        let cfg = MapConfig::new(&[("strategy", "variant", "momentum")]);
        assert!(matches!(
            build_backtest_config(&cfg).unwrap_err(),
            BacktestError::ConfigInvalid { key, .. } if key == "variant"
        ));

        let cfg = MapConfig::new(&[("data", "on_gap", "interpolate")]);
        assert!(matches!(
            build_backtest_config(&cfg).unwrap_err(),
            BacktestError::ConfigInvalid { key, .. } if key == "on_gap"
        ));

        let cfg = MapConfig::new(&[("strategy", "reentry", "sometimes")]);
        assert!(matches!(
            build_backtest_config(&cfg).unwrap_err(),
            BacktestError::ConfigInvalid { key, .. } if key == "reentry"
        ));
    }

    #[test]
    fn reentry_policy_parsing() {
        let cfg = MapConfig::new(&[
            ("strategy", "variant", "buy_and_hold"),
            ("strategy", "reentry", "allow"),
            ("strategy", "reentry_cooldown_bars", "24"),
        ]);
        let built = build_backtest_config(&cfg).unwrap();
        assert_eq!(
            built.strategy.reentry,
            ReentryPolicy::Allow { cooldown_bars: 24 }
        );

        // trend-following allows re-entry by default; cooldown alone applies
        let cfg = MapConfig::new(&[("strategy", "reentry_cooldown_bars", "6")]);
        let built = build_backtest_config(&cfg).unwrap();
        assert_eq!(
            built.strategy.reentry,
            ReentryPolicy::Allow { cooldown_bars: 6 }
        );

        let cfg = MapConfig::new(&[("strategy", "reentry", "never")]);
        let built = build_backtest_config(&cfg).unwrap();
        assert_eq!(built.strategy.reentry, ReentryPolicy::Never);
    }

    #[test]
    fn bad_boolean_is_invalid() {
        let cfg = MapConfig::new(&[("strategy", "rebalance_while_holding", "maybe")]);
        assert!(matches!(
            build_backtest_config(&cfg).unwrap_err(),
            BacktestError::ConfigInvalid { key, .. } if key == "rebalance_while_holding"
        ));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg = MapConfig::new(&[("strategy", "stop_loss", "0.1")]);
        assert!(build_backtest_config(&cfg).is_ok());
    }

    #[test]
    fn instruments_list() {
        let cfg = MapConfig::new(&[("data", "instruments", "BTC-USD, ETH-USD")]);
        assert_eq!(
            instruments_from_config(&cfg).unwrap(),
            vec!["BTC-USD", "ETH-USD"]
        );

        let missing = MapConfig::new(&[]);
        assert!(matches!(
            instruments_from_config(&missing).unwrap_err(),
            BacktestError::ConfigMissing { key, .. } if key == "instruments"
        ));

        let dup = MapConfig::new(&[("data", "instruments", "A,A")]);
        assert!(instruments_from_config(&dup).unwrap_err().is_config());
    }
}
