use tracing::debug;

use crate::config::PolicyThresholds;
use crate::types::{Decision, DecisionOutcome, ItemMeta, OpportunityScore, TradingLimits};

/// Turns a scored opportunity into one terminal decision.
///
/// Order of evaluation:
/// 1. liquidity gate: unknown or below-minimum daily volume → `INSUFFICIENT_LIQUIDITY`
/// 2. spend cap, only when `limits.max_spend` is set: buy price above it → `SKIP`
/// 3. ROI ≥ `limits.min_roi_percent` with no trade lock → `BUY_INSTANT`
///    (suppressed while `limits.pause_normal_buying` is set)
/// 4. ROI ≥ hold threshold with lock ≤ max lock days → `BUY_AND_HOLD`
/// 5. otherwise `SKIP`
///
/// ROI is always the commission-adjusted figure carried by the score.
#[derive(Debug, Clone)]
pub struct ArbitrageDecisionPolicy {
    thresholds: PolicyThresholds,
}

impl ArbitrageDecisionPolicy {
    pub fn new(thresholds: PolicyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn decide(
        &self,
        score: &OpportunityScore,
        meta: &ItemMeta,
        limits: &TradingLimits,
    ) -> DecisionOutcome {
        let outcome = self.evaluate(score, meta, limits);
        debug!(
            item = %score.opportunity.item_name,
            decision = %outcome.decision,
            roi = %score.profit.roi_percent.round_dp(2),
            lock_days = meta.trade_lock_days,
            "{}",
            outcome.reason,
        );
        outcome
    }

    fn evaluate(
        &self,
        score: &OpportunityScore,
        meta: &ItemMeta,
        limits: &TradingLimits,
    ) -> DecisionOutcome {
        let t = &self.thresholds;
        let opp = &score.opportunity;
        let roi = score.profit.roi_percent;
        let lock = meta.trade_lock_days;

        match opp.daily_volume {
            None => {
                return DecisionOutcome::new(
                    Decision::InsufficientLiquidity,
                    format!("Daily volume unknown (minimum {}/day)", t.min_daily_volume),
                );
            }
            Some(volume) if volume < t.min_daily_volume => {
                return DecisionOutcome::new(
                    Decision::InsufficientLiquidity,
                    format!("Insufficient liquidity ({volume}/day < {}/day)", t.min_daily_volume),
                );
            }
            Some(_) => {}
        }

        if let Some(cap) = limits.max_spend {
            if opp.buy_price > cap {
                return DecisionOutcome::new(
                    Decision::Skip,
                    format!("Price {:.2} exceeds max spend {:.2}", opp.buy_price, cap),
                );
            }
        }

        let meets_target = roi >= limits.min_roi_percent;
        if meets_target && lock == 0 && !limits.pause_normal_buying {
            return DecisionOutcome::new(
                Decision::BuyInstant,
                format!("Profit target reached ({roi:.1}%)"),
            );
        }

        if roi >= t.hold_roi_percent && lock <= t.max_lock_days {
            let reason = if lock == 0 {
                format!("Normal buying paused; high-margin hold ({roi:.1}%)")
            } else {
                format!("Hold through {lock}-day trade lock ({roi:.1}% ≥ {:.1}%)", t.hold_roi_percent)
            };
            return DecisionOutcome::new(Decision::BuyAndHold, reason);
        }

        let reason = if meets_target && lock == 0 {
            format!(
                "Normal buying paused; ROI {roi:.1}% below hold threshold {:.1}%",
                t.hold_roi_percent
            )
        } else if lock > t.max_lock_days {
            format!("Trade lock {lock}d exceeds maximum {}d", t.max_lock_days)
        } else if meets_target {
            format!(
                "ROI {roi:.1}% too low to hold through {lock}-day lock (needs {:.1}%)",
                t.hold_roi_percent
            )
        } else {
            format!("ROI {roi:.1}% below {:.1}% target", limits.min_roi_percent)
        };
        DecisionOutcome::new(Decision::Skip, reason)
    }
}

impl Default for ArbitrageDecisionPolicy {
    fn default() -> Self {
        Self::new(PolicyThresholds::default())
    }
}
