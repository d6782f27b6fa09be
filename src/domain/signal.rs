//! Signal engine: maps indicator state, price and position to a decision.
//!
//! Rule sets are side-effect free. They read the state the simulation loop
//! hands them and return a `Decision`; they never touch the ledger.
//!
//! Trend-following exits are evaluated in this order, first match wins:
//! 1. price below long MA * (1 - strong_downtrend_margin)
//! 2. drawdown from the rolling peak above `max_drawdown_exit`
//! 3. at least `weakness_min_count` of the last `weakness_window` bars under
//!    the short MA

use crate::domain::indicator_state::IndicatorState;
use crate::domain::position::{ExitReason, PositionState};
use crate::domain::strategy::{ReentryPolicy, StrategyConfig, StrategyVariant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Hold,
    /// Open a position of `quantity` units, sized on the decision bar.
    Enter { quantity: f64 },
    /// Close the whole position.
    Exit { reason: ExitReason },
    /// Move a held position toward `target_quantity` units.
    Rebalance { target_quantity: f64 },
}

/// Everything a rule set may look at for one bar.
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    pub indicators: &'a IndicatorState,
    pub price: f64,
    pub position: PositionState,
    pub equity: f64,
    /// Index of the current bar among replayed bars.
    pub bar: usize,
    /// Fill bar of the most recent exit, if any.
    pub last_exit_bar: Option<usize>,
}

pub trait SignalEngine {
    fn decide(&self, ctx: &SignalContext<'_>) -> Decision;
}

/// Rule set for the configured variant.
pub fn rules_for(config: &StrategyConfig) -> Box<dyn SignalEngine + Send + Sync> {
    match config.variant {
        StrategyVariant::BuyAndHold => Box::new(CatastrophicProtection::new(config.clone())),
        StrategyVariant::TrendFollowing => Box::new(ConfirmedTrend::new(config.clone())),
    }
}

fn entry_allowed(policy: ReentryPolicy, ctx: &SignalContext<'_>) -> bool {
    match (policy, ctx.last_exit_bar) {
        (_, None) => true,
        (ReentryPolicy::Never, Some(_)) => false,
        (ReentryPolicy::Allow { cooldown_bars }, Some(exit_bar)) => {
            ctx.bar >= exit_bar + cooldown_bars
        }
    }
}

fn target_quantity(config: &StrategyConfig, ctx: &SignalContext<'_>) -> f64 {
    if ctx.price <= 0.0 {
        return 0.0;
    }
    config.max_position_pct * ctx.equity.max(0.0) / ctx.price
}

fn hold_or_rebalance(config: &StrategyConfig, ctx: &SignalContext<'_>) -> Decision {
    if config.rebalance_while_holding {
        Decision::Rebalance {
            target_quantity: target_quantity(config, ctx),
        }
    } else {
        Decision::Hold
    }
}

fn drawdown_exceeded(config: &StrategyConfig, ctx: &SignalContext<'_>) -> bool {
    ctx.indicators
        .drawdown(ctx.price)
        .is_some_and(|dd| dd > config.max_drawdown_exit)
}

/// Buy-and-hold with a catastrophic drawdown exit.
#[derive(Debug, Clone)]
pub struct CatastrophicProtection {
    config: StrategyConfig,
}

impl CatastrophicProtection {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }
}

impl SignalEngine for CatastrophicProtection {
    fn decide(&self, ctx: &SignalContext<'_>) -> Decision {
        if ctx.position.is_flat() {
            if !entry_allowed(self.config.reentry, ctx) {
                return Decision::Hold;
            }
            return Decision::Enter {
                quantity: target_quantity(&self.config, ctx),
            };
        }

        if drawdown_exceeded(&self.config, ctx) {
            return Decision::Exit {
                reason: ExitReason::Catastrophic,
            };
        }
        hold_or_rebalance(&self.config, ctx)
    }
}

/// Moving-average trend entry with bar confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmedTrend {
    config: StrategyConfig,
}

impl ConfirmedTrend {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    fn exit_reason(&self, ctx: &SignalContext<'_>) -> Option<ExitReason> {
        let ind = ctx.indicators;

        if let Some(long) = ind.long_ma() {
            if ctx.price < long * (1.0 - self.config.strong_downtrend_margin) {
                return Some(ExitReason::StrongDowntrend);
            }
        }
        if drawdown_exceeded(&self.config, ctx) {
            return Some(ExitReason::DrawdownFromPeak);
        }
        if ind
            .weak_bars()
            .is_some_and(|weak| weak >= self.config.weakness_min_count)
        {
            return Some(ExitReason::ShortMaWeakness);
        }
        None
    }
}

impl SignalEngine for ConfirmedTrend {
    fn decide(&self, ctx: &SignalContext<'_>) -> Decision {
        if ctx.position.is_flat() {
            if entry_allowed(self.config.reentry, ctx)
                && ctx.indicators.uptrend_streak() >= self.config.confirmation_bars
            {
                return Decision::Enter {
                    quantity: target_quantity(&self.config, ctx),
                };
            }
            return Decision::Hold;
        }

        match self.exit_reason(ctx) {
            Some(reason) => Decision::Exit { reason },
            None => hold_or_rebalance(&self.config, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend_config() -> StrategyConfig {
        StrategyConfig {
            short_ma_window: 2,
            long_ma_window: 4,
            lookback_for_peak: 4,
            confirmation_bars: 2,
            max_drawdown_exit: 0.2,
            ..StrategyConfig::trend_following()
        }
    }

    fn state_after(config: &StrategyConfig, prices: &[f64]) -> IndicatorState {
        let mut state = IndicatorState::new(config);
        for &p in prices {
            state.update(p);
        }
        state
    }

    fn ctx<'a>(
        indicators: &'a IndicatorState,
        price: f64,
        quantity: f64,
        last_exit_bar: Option<usize>,
    ) -> SignalContext<'a> {
        SignalContext {
            indicators,
            price,
            position: PositionState {
                quantity,
                avg_entry_price: if quantity > 0.0 { price } else { 0.0 },
            },
            equity: 10_000.0,
            bar: 10,
            last_exit_bar,
        }
    }

    #[test]
    fn buy_and_hold_enters_when_flat() {
        let config = StrategyConfig::buy_and_hold();
        let rules = rules_for(&config);
        let state = state_after(&config, &[100.0]);
        let decision = rules.decide(&ctx(&state, 100.0, 0.0, None));
        match decision {
            Decision::Enter { quantity } => assert!((quantity - 55.0).abs() < 1e-9),
            other => panic!("expected Enter, got {other:?}"),
        }
    }

    #[test]
    fn buy_and_hold_never_reenters_after_exit() {
        let config = StrategyConfig::buy_and_hold();
        let rules = rules_for(&config);
        let state = state_after(&config, &[100.0]);
        assert_eq!(
            rules.decide(&ctx(&state, 100.0, 0.0, Some(5))),
            Decision::Hold
        );
    }

    #[test]
    fn buy_and_hold_reenters_when_allowed() {
        let config = StrategyConfig {
            reentry: ReentryPolicy::Allow { cooldown_bars: 3 },
            ..StrategyConfig::buy_and_hold()
        };
        let rules = rules_for(&config);
        let state = state_after(&config, &[100.0]);
        // bar 10, exit at 8: cooldown not over
        assert_eq!(
            rules.decide(&ctx(&state, 100.0, 0.0, Some(8))),
            Decision::Hold
        );
        assert!(matches!(
            rules.decide(&ctx(&state, 100.0, 0.0, Some(7))),
            Decision::Enter { .. }
        ));
    }

    #[test]
    fn buy_and_hold_no_exit_without_lookback_history() {
        let config = StrategyConfig {
            lookback_for_peak: 5,
            max_drawdown_exit: 0.1,
            ..StrategyConfig::buy_and_hold()
        };
        let rules = rules_for(&config);
        let state = state_after(&config, &[100.0, 50.0, 20.0]);
        assert_eq!(rules.decide(&ctx(&state, 20.0, 1.0, None)), Decision::Hold);
    }

    #[test]
    fn buy_and_hold_exits_on_catastrophic_drawdown() {
        let config = StrategyConfig {
            lookback_for_peak: 3,
            max_drawdown_exit: 0.3,
            ..StrategyConfig::buy_and_hold()
        };
        let rules = rules_for(&config);
        let state = state_after(&config, &[100.0, 90.0, 60.0]);
        assert_eq!(
            rules.decide(&ctx(&state, 60.0, 1.0, None)),
            Decision::Exit {
                reason: ExitReason::Catastrophic
            }
        );
    }

    #[test]
    fn drawdown_at_threshold_does_not_exit() {
        let config = StrategyConfig {
            lookback_for_peak: 2,
            max_drawdown_exit: 0.5,
            ..StrategyConfig::buy_and_hold()
        };
        let rules = rules_for(&config);
        let state = state_after(&config, &[100.0, 50.0]);
        assert_eq!(rules.decide(&ctx(&state, 50.0, 1.0, None)), Decision::Hold);
    }

    #[test]
    fn holding_requests_rebalance_when_enabled() {
        let config = StrategyConfig {
            rebalance_while_holding: true,
            ..StrategyConfig::buy_and_hold()
        };
        let rules = rules_for(&config);
        let state = state_after(&config, &[100.0]);
        match rules.decide(&ctx(&state, 100.0, 10.0, None)) {
            Decision::Rebalance { target_quantity } => {
                assert!((target_quantity - 55.0).abs() < 1e-9)
            }
            other => panic!("expected Rebalance, got {other:?}"),
        }
    }

    #[test]
    fn trend_waits_for_confirmation() {
        let config = trend_config();
        let rules = rules_for(&config);
        // streak 1 after bar 4
        let state = state_after(&config, &[10.0, 11.0, 12.0, 13.0]);
        assert_eq!(state.uptrend_streak(), 1);
        assert_eq!(rules.decide(&ctx(&state, 13.0, 0.0, None)), Decision::Hold);

        let state = state_after(&config, &[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert!(matches!(
            rules.decide(&ctx(&state, 14.0, 0.0, None)),
            Decision::Enter { .. }
        ));
    }

    #[test]
    fn trend_no_entry_on_flat_prices() {
        let config = trend_config();
        let rules = rules_for(&config);
        let state = state_after(&config, &[100.0; 20]);
        assert_eq!(state.uptrend_streak(), 0);
        assert_eq!(rules.decide(&ctx(&state, 100.0, 0.0, None)), Decision::Hold);
    }

    #[test]
    fn trend_strong_downtrend_has_priority() {
        let config = trend_config();
        let rules = rules_for(&config);
        // long MA = 97.5, price 50 is far below it and also a big drawdown
        let state = state_after(&config, &[100.0, 100.0, 140.0, 50.0]);
        assert_eq!(
            rules.decide(&ctx(&state, 50.0, 1.0, None)),
            Decision::Exit {
                reason: ExitReason::StrongDowntrend
            }
        );
    }

    #[test]
    fn trend_drawdown_exit_when_above_long_ma() {
        let config = StrategyConfig {
            strong_downtrend_margin: 0.5,
            ..trend_config()
        };
        let rules = rules_for(&config);
        // peak 200, price 150: drawdown 0.25 > 0.2; long MA 156.25 * 0.5 < 150
        let state = state_after(&config, &[100.0, 175.0, 200.0, 150.0]);
        assert_eq!(
            rules.decide(&ctx(&state, 150.0, 1.0, None)),
            Decision::Exit {
                reason: ExitReason::DrawdownFromPeak
            }
        );
    }

    #[test]
    fn trend_short_ma_weakness_exit() {
        let config = StrategyConfig {
            strong_downtrend_margin: 0.5,
            max_drawdown_exit: 0.9,
            ..trend_config()
        };
        let rules = rules_for(&config);
        // short MA flags: 12>11 ok, 8<10 weak, 12>10 ok, 9<10.5 weak → 2 of 3
        let state = state_after(&config, &[10.0, 12.0, 8.0, 12.0, 9.0]);
        assert_eq!(
            rules.decide(&ctx(&state, 9.0, 1.0, None)),
            Decision::Exit {
                reason: ExitReason::ShortMaWeakness
            }
        );
    }

    #[test]
    fn trend_holds_position_without_exit_signal() {
        let config = trend_config();
        let rules = rules_for(&config);
        let state = state_after(&config, &[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert_eq!(rules.decide(&ctx(&state, 14.0, 1.0, None)), Decision::Hold);
    }

    #[test]
    fn trend_entry_respects_cooldown() {
        let config = StrategyConfig {
            reentry: ReentryPolicy::Allow { cooldown_bars: 5 },
            ..trend_config()
        };
        let rules = rules_for(&config);
        let state = state_after(&config, &[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert_eq!(
            rules.decide(&ctx(&state, 14.0, 0.0, Some(8))),
            Decision::Hold
        );
        assert!(matches!(
            rules.decide(&ctx(&state, 14.0, 0.0, Some(5))),
            Decision::Enter { .. }
        ));
    }
}
