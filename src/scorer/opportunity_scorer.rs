use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::config::{ArbitrageConfig, ScoringWeights};
use crate::error::Result;
use crate::policy::CommissionTable;
use crate::scorer::volatility::coefficient_of_variation;
use crate::types::{OpportunityScore, RecommendedAction, RiskLevel, TradeOpportunity};

/// Weighted multi-factor score for a single opportunity.
///
/// Six sub-scores in [0, 100] (profit, liquidity, risk, speed, competition,
/// confidence) are combined with weights that sum to exactly 1. Pure: the
/// same opportunity and history always yield the same score.
#[derive(Debug, Clone)]
pub struct OpportunityScorer {
    weights: ScoringWeights,
    commissions: CommissionTable,
    min_roi_percent: Decimal,
}

impl OpportunityScorer {
    pub fn new(
        weights: ScoringWeights,
        commissions: CommissionTable,
        min_roi_percent: Decimal,
    ) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            commissions,
            min_roi_percent,
        })
    }

    pub fn from_config(cfg: &ArbitrageConfig) -> Result<Self> {
        Self::new(
            cfg.scoring.weights,
            CommissionTable::new(&cfg.commissions),
            cfg.scoring.min_roi_percent,
        )
    }

    /// `history_prices` feeds the derived volatility when the record carries none.
    pub fn score(
        &self,
        opp: &TradeOpportunity,
        history_prices: &[Decimal],
    ) -> Result<OpportunityScore> {
        opp.validate()?;
        let profit = self.commissions.breakdown(opp)?;
        let roi = profit.roi_percent;

        let volatility = opp
            .price_volatility
            .or_else(|| coefficient_of_variation(history_prices));

        let profit_score = profit_score(roi);
        let liquidity_score = liquidity_score(opp.daily_volume);
        let risk_score = risk_score(volatility);
        let speed_score = speed_score(estimated_sell_hours(opp));
        let competition_score = competition_score(opp.competition_count);
        let confidence_score = confidence_score(opp, volatility.is_some());

        let w = &self.weights;
        let total_score = clamp_score(
            w.profit * profit_score
                + w.liquidity * liquidity_score
                + w.risk * risk_score
                + w.speed * speed_score
                + w.competition * competition_score
                + w.confidence * confidence_score,
        );

        let risk_level = RiskLevel::from_factors(risk_factors(roi, volatility, opp.daily_volume));
        let recommended_action =
            recommended_action(roi, self.min_roi_percent, risk_level, total_score);

        debug!(
            item = %opp.item_name,
            roi = %roi.round_dp(2),
            total = %total_score.round_dp(2),
            risk = %risk_level,
            action = %recommended_action,
            "SCORED"
        );

        Ok(OpportunityScore {
            opportunity: opp.clone(),
            profit,
            profit_score,
            liquidity_score,
            risk_score,
            speed_score,
            competition_score,
            confidence_score,
            total_score,
            volatility,
            risk_level,
            recommended_action,
            priority_rank: 0,
        })
    }
}

impl Default for OpportunityScorer {
    fn default() -> Self {
        let cfg = ArbitrageConfig::default();
        Self {
            weights: cfg.scoring.weights,
            commissions: CommissionTable::new(&cfg.commissions),
            min_roi_percent: cfg.scoring.min_roi_percent,
        }
    }
}

/// Stable descending sort by total score; assigns 1-based `priority_rank`.
/// Equal totals keep their input order. Generic so callers can rank scores
/// still paired with their request context.
pub fn rank_opportunities<T>(mut items: Vec<T>) -> Vec<T>
where
    T: AsRef<OpportunityScore> + AsMut<OpportunityScore>,
{
    items.sort_by(|a, b| b.as_ref().total_score.cmp(&a.as_ref().total_score));
    for (i, item) in items.iter_mut().enumerate() {
        item.as_mut().priority_rank = i + 1;
    }
    items
}

impl AsRef<OpportunityScore> for OpportunityScore {
    fn as_ref(&self) -> &OpportunityScore {
        self
    }
}

impl AsMut<OpportunityScore> for OpportunityScore {
    fn as_mut(&mut self) -> &mut OpportunityScore {
        self
    }
}

// ---------------------------------------------------------------------------
// Sub-scores
// ---------------------------------------------------------------------------

fn clamp_score(v: Decimal) -> Decimal {
    v.max(Decimal::ZERO).min(Decimal::ONE_HUNDRED)
}

/// Piecewise-linear in ROI percent, continuous below 15%.
pub fn profit_score(roi: Decimal) -> Decimal {
    let score = if roi >= dec!(15) {
        dec!(100)
    } else if roi >= dec!(10) {
        dec!(80) + (roi - dec!(10)) * dec!(2)
    } else if roi >= dec!(5) {
        dec!(60) + (roi - dec!(5)) * dec!(4)
    } else if roi >= dec!(3) {
        dec!(40) + (roi - dec!(3)) * dec!(10)
    } else if roi > Decimal::ZERO {
        roi * dec!(40) / dec!(3)
    } else {
        Decimal::ZERO
    };
    clamp_score(score)
}

/// Unknown volume is neutral (50). Zero volume scores 10, and the thin
/// (0, 5) band never drops below that floor.
pub fn liquidity_score(daily_volume: Option<u32>) -> Decimal {
    let Some(v) = daily_volume else {
        return dec!(50);
    };
    let vol = Decimal::from(v);
    let score = match v {
        0 => dec!(10),
        1..=4 => (vol * dec!(8)).max(dec!(10)),
        5..=19 => dec!(40) + (vol - dec!(5)) * dec!(2),
        20..=49 => dec!(70) + (vol - dec!(20)),
        _ => dec!(100),
    };
    clamp_score(score)
}

pub fn risk_score(volatility: Option<f64>) -> Decimal {
    match volatility {
        None => dec!(50),
        Some(v) if v < 0.05 => dec!(100),
        Some(v) if v < 0.10 => dec!(80),
        Some(v) if v < 0.20 => dec!(60),
        Some(v) if v < 0.30 => dec!(40),
        Some(_) => dec!(20),
    }
}

/// Supplied sell time, otherwise 24 / volume * 10 hours. Zero volume
/// never sells; unknown on both counts is None.
pub fn estimated_sell_hours(opp: &TradeOpportunity) -> Option<f64> {
    if let Some(hours) = opp.average_sell_time_hours {
        return Some(hours);
    }
    match opp.daily_volume {
        Some(0) => Some(f64::INFINITY),
        Some(v) => Some(24.0 / f64::from(v) * 10.0),
        None => None,
    }
}

pub fn speed_score(sell_hours: Option<f64>) -> Decimal {
    match sell_hours {
        None => dec!(50),
        Some(h) if h <= 1.0 => dec!(100),
        Some(h) if h <= 6.0 => dec!(85),
        Some(h) if h <= 24.0 => dec!(70),
        Some(h) if h <= 72.0 => dec!(50),
        Some(h) if h <= 168.0 => dec!(30),
        Some(_) => dec!(10),
    }
}

pub fn competition_score(competitors: Option<u32>) -> Decimal {
    match competitors {
        None => dec!(50),
        Some(0) => dec!(100),
        Some(1..=3) => dec!(85),
        Some(4..=10) => dec!(70),
        Some(11..=25) => dec!(50),
        Some(_) => dec!(30),
    }
}

/// Penalises missing inputs and cross-platform execution; floored at 30.
pub fn confidence_score(opp: &TradeOpportunity, volatility_known: bool) -> Decimal {
    let mut score = dec!(100);
    if opp.daily_volume.is_none() {
        score -= dec!(15);
    }
    if !volatility_known {
        score -= dec!(15);
    }
    if opp.average_sell_time_hours.is_none() {
        score -= dec!(10);
    }
    if opp.competition_count.is_none() {
        score -= dec!(10);
    }
    if opp.spans_platforms() {
        score -= dec!(5);
    }
    score.max(dec!(30))
}

fn risk_factors(roi: Decimal, volatility: Option<f64>, daily_volume: Option<u32>) -> u32 {
    let mut factors = 0;
    if roi < dec!(5) {
        factors += 1;
    }
    if roi < dec!(3) {
        factors += 1;
    }
    match volatility {
        Some(v) if v > 0.30 => factors += 2,
        Some(v) if v > 0.20 => factors += 1,
        _ => {}
    }
    match daily_volume {
        Some(v) if v < 5 => factors += 2,
        Some(v) if v < 20 => factors += 1,
        _ => {}
    }
    factors
}

fn recommended_action(
    roi: Decimal,
    min_roi: Decimal,
    risk: RiskLevel,
    total: Decimal,
) -> RecommendedAction {
    if roi < min_roi {
        return RecommendedAction::Skip;
    }
    match risk {
        RiskLevel::VeryHigh => return RecommendedAction::Avoid,
        RiskLevel::High if total < dec!(70) => return RecommendedAction::Caution,
        _ => {}
    }
    if total >= dec!(80) {
        RecommendedAction::StrongBuy
    } else if total >= dec!(70) {
        RecommendedAction::Buy
    } else if total >= dec!(60) {
        RecommendedAction::Consider
    } else if total >= dec!(50) {
        RecommendedAction::Monitor
    } else {
        RecommendedAction::Skip
    }
}
