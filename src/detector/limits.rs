use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{MarketHealth, MarketState, TradingLimits};

/// Adjusted copy of `baseline` for the given market verdict.
///
/// - `CRASH`: ROI target ×1.5, spend halved, normal buying paused.
/// - `SALE_PERIOD`: ROI target ×0.8, spend ×1.5.
/// - `BULL_RUN`: ROI target ×1.2, spend ×0.8.
/// - anything else: unchanged.
pub fn adjust_limits(baseline: &TradingLimits, health: &MarketHealth) -> TradingLimits {
    let (roi_factor, spend_factor, pause) = match health.state {
        MarketState::Crash => (dec!(1.5), dec!(0.5), true),
        MarketState::SalePeriod => (dec!(0.8), dec!(1.5), false),
        MarketState::BullRun => (dec!(1.2), dec!(0.8), false),
        MarketState::Stable | MarketState::Volatile | MarketState::Recovery => {
            (Decimal::ONE, Decimal::ONE, false)
        }
    };

    TradingLimits {
        min_roi_percent: (baseline.min_roi_percent * roi_factor).round_dp(2),
        max_spend: baseline
            .max_spend
            .map(|cap| cap.checked_mul(spend_factor).map_or(cap, |c| c.round_dp(2))),
        pause_normal_buying: baseline.pause_normal_buying || pause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Game;
    use chrono::Utc;

    fn health(state: MarketState) -> MarketHealth {
        let mut h = MarketHealth::unknown(Game::Csgo, 6, Utc::now());
        h.state = state;
        h.indicators_checked = 6;
        h
    }

    fn capped() -> TradingLimits {
        TradingLimits {
            max_spend: Some(dec!(100)),
            ..TradingLimits::default()
        }
    }

    #[test]
    fn crash_widens_roi_halves_spend_and_pauses() {
        let limits = adjust_limits(&capped(), &health(MarketState::Crash));
        assert_eq!(limits.min_roi_percent, dec!(7.5));
        assert_eq!(limits.max_spend, Some(dec!(50)));
        assert!(limits.pause_normal_buying);
    }

    #[test]
    fn sale_lowers_roi_and_raises_spend() {
        let limits = adjust_limits(&capped(), &health(MarketState::SalePeriod));
        assert_eq!(limits.min_roi_percent, dec!(4));
        assert_eq!(limits.max_spend, Some(dec!(150)));
        assert!(!limits.pause_normal_buying);
    }

    #[test]
    fn bull_run_tightens() {
        let limits = adjust_limits(&capped(), &health(MarketState::BullRun));
        assert_eq!(limits.min_roi_percent, dec!(6));
        assert_eq!(limits.max_spend, Some(dec!(80)));
    }

    #[test]
    fn uncapped_baseline_stays_uncapped() {
        let limits = adjust_limits(&TradingLimits::default(), &health(MarketState::Crash));
        assert_eq!(limits.max_spend, None);
        assert!(limits.pause_normal_buying);
    }

    #[test]
    fn stable_leaves_baseline_untouched() {
        let baseline = TradingLimits::default();
        for state in [MarketState::Stable, MarketState::Volatile, MarketState::Recovery] {
            assert_eq!(adjust_limits(&baseline, &health(state)), baseline);
        }
    }
}
