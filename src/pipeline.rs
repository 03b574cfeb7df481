use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ArbitrageConfig;
use crate::detector::adjust_limits;
use crate::error::Result;
use crate::policy::{ArbitrageDecisionPolicy, ItemFilter};
use crate::scorer::{rank_opportunities, OpportunityScorer};
use crate::state::PriceHistory;
use crate::types::{
    Decision, ItemMeta, MarketHealth, MarketState, OpportunityScore, TradeOpportunity,
    TradingLimits,
};

// ---------------------------------------------------------------------------
// Batch request / report
// ---------------------------------------------------------------------------

/// One item of an evaluation batch: the opportunity plus the catalogue
/// metadata the filter and decision policy need.
#[derive(Debug, Clone, Deserialize)]
pub struct OpportunityRequest {
    pub opportunity: TradeOpportunity,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub trade_lock_days: u32,
}

impl OpportunityRequest {
    fn meta(&self) -> ItemMeta {
        ItemMeta {
            category: self.category.clone(),
            trade_lock_days: self.trade_lock_days,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluatedOpportunity {
    pub score: OpportunityScore,
    pub decision: Decision,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub item_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub market_state: MarketState,
    pub limits: TradingLimits,
    /// Highest total score first.
    pub ranked: Vec<EvaluatedOpportunity>,
    /// Malformed, blacklisted or unpriceable items; never part of `ranked`.
    pub skipped: Vec<SkippedItem>,
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Validate → filter → score → rank → decide for one batch, against a single
/// `MarketHealth` snapshot. Holds no mutable state; batches may run concurrently.
#[derive(Debug, Clone)]
pub struct Evaluator {
    scorer: OpportunityScorer,
    policy: ArbitrageDecisionPolicy,
    filter: ItemFilter,
    baseline: TradingLimits,
}

impl Evaluator {
    pub fn new(
        scorer: OpportunityScorer,
        policy: ArbitrageDecisionPolicy,
        filter: ItemFilter,
        baseline: TradingLimits,
    ) -> Self {
        Self {
            scorer,
            policy,
            filter,
            baseline,
        }
    }

    pub fn from_config(cfg: &ArbitrageConfig) -> Result<Self> {
        Ok(Self::new(
            OpportunityScorer::from_config(cfg)?,
            ArbitrageDecisionPolicy::new(cfg.policy.clone()),
            ItemFilter::new(&cfg.filters),
            cfg.baseline_limits,
        ))
    }

    pub fn evaluate_batch(
        &self,
        requests: Vec<OpportunityRequest>,
        health: &MarketHealth,
        history: &PriceHistory,
    ) -> BatchReport {
        if health.is_unknown() {
            warn!(game = %health.game, "no indicator data yet, evaluating against a neutral market");
        }
        let limits = adjust_limits(&self.baseline, health);
        let mut skipped = Vec::new();
        let mut scored = Vec::with_capacity(requests.len());

        for request in requests {
            let item_name = request.opportunity.item_name.clone();
            let meta = request.meta();

            if request.opportunity.game != health.game {
                skipped.push(skip(
                    item_name,
                    format!(
                        "Game {} does not match batch game {}",
                        request.opportunity.game, health.game
                    ),
                ));
                continue;
            }
            if let Err(e) = request.opportunity.validate() {
                warn!(item = %item_name, "malformed opportunity skipped: {e}");
                skipped.push(skip(item_name, e.to_string()));
                continue;
            }
            if let Some(reason) = self.filter.exclusion_reason(&item_name, &meta) {
                debug!(item = %item_name, "{reason}");
                skipped.push(skip(item_name, reason));
                continue;
            }

            let prices = history.prices(health.game, &item_name);
            match self.scorer.score(&request.opportunity, &prices) {
                Ok(score) => scored.push(ScoredItem { score, meta }),
                Err(e) => {
                    warn!(item = %item_name, "opportunity not scored: {e}");
                    skipped.push(skip(item_name, e.to_string()));
                }
            }
        }

        let ranked = rank_opportunities(scored)
            .into_iter()
            .map(|ScoredItem { score, meta }| {
                let outcome = self.policy.decide(&score, &meta, &limits);
                EvaluatedOpportunity {
                    score,
                    decision: outcome.decision,
                    reason: outcome.reason,
                }
            })
            .collect::<Vec<_>>();

        let buys = ranked
            .iter()
            .filter(|e| matches!(e.decision, Decision::BuyInstant | Decision::BuyAndHold))
            .count();
        info!(
            event = "BATCH_EVALUATED",
            game = %health.game,
            state = %health.state,
            ranked = ranked.len(),
            skipped = skipped.len(),
            buys,
            "BATCH | {} | state: {} | ranked: {} | skipped: {} | buys: {}",
            health.game, health.state, ranked.len(), skipped.len(), buys,
        );

        BatchReport {
            market_state: health.state,
            limits,
            ranked,
            skipped,
        }
    }
}

fn skip(item_name: String, reason: String) -> SkippedItem {
    SkippedItem { item_name, reason }
}

struct ScoredItem {
    score: OpportunityScore,
    meta: ItemMeta,
}

impl AsRef<OpportunityScore> for ScoredItem {
    fn as_ref(&self) -> &OpportunityScore {
        &self.score
    }
}

impl AsMut<OpportunityScore> for ScoredItem {
    fn as_mut(&mut self) -> &mut OpportunityScore {
        &mut self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Game, OpportunityType, PriceSnapshot};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn request(name: &str, buy: Decimal, sell: Decimal, lock: u32) -> OpportunityRequest {
        OpportunityRequest {
            opportunity: TradeOpportunity {
                item_name: name.to_string(),
                buy_price: buy,
                sell_price: sell,
                platform_buy: "dmarket".to_string(),
                platform_sell: "dmarket".to_string(),
                opportunity_type: OpportunityType::Flip,
                game: Game::Csgo,
                item_id: None,
                quantity_available: 1,
                daily_volume: Some(40),
                average_sell_time_hours: Some(5.0),
                price_volatility: None,
                competition_count: Some(2),
            },
            category: Some("Rifle".to_string()),
            trade_lock_days: lock,
        }
    }

    fn health(state: MarketState) -> MarketHealth {
        let mut h = MarketHealth::unknown(Game::Csgo, 4, Utc::now());
        h.state = state;
        h.indicators_checked = 4;
        h
    }

    fn evaluator() -> Evaluator {
        Evaluator::from_config(&ArbitrageConfig::default()).unwrap()
    }

    #[test]
    fn batch_is_ranked_and_decided() {
        let requests = vec![
            request("AK-47 | Slate (Field-Tested)", dec!(10), dec!(12), 0),
            request("AWP | Asiimov (Field-Tested)", dec!(10), dec!(15), 0),
            request("Glock-18 | Candy Apple (Minimal Wear)", dec!(10), dec!(10.50), 0),
        ];
        let report = evaluator().evaluate_batch(
            requests,
            &health(MarketState::Stable),
            &PriceHistory::with_capacity(96),
        );

        assert_eq!(report.market_state, MarketState::Stable);
        assert!(report.skipped.is_empty());
        let names: Vec<_> = report
            .ranked
            .iter()
            .map(|e| e.score.opportunity.item_name.as_str())
            .collect();
        assert_eq!(names[0], "AWP | Asiimov (Field-Tested)");
        assert_eq!(names[2], "Glock-18 | Candy Apple (Minimal Wear)");
        let ranks: Vec<_> = report.ranked.iter().map(|e| e.score.priority_rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
        assert_eq!(report.ranked[0].decision, Decision::BuyInstant);
        assert_eq!(report.ranked[2].decision, Decision::Skip);
    }

    #[test]
    fn decisions_match_the_policy_for_the_same_inputs() {
        let requests = vec![
            request("AK-47 | Slate (Field-Tested)", dec!(10), dec!(12), 0),
            request("M4A1-S | Printstream (Field-Tested)", dec!(10), dec!(13), 7),
            request("Desert Eagle | Blaze (Factory New)", dec!(10), dec!(15), 9),
        ];
        let metas: Vec<(String, ItemMeta)> = requests
            .iter()
            .map(|r| (r.opportunity.item_name.clone(), r.meta()))
            .collect();
        let h = health(MarketState::Stable);
        let report = evaluator().evaluate_batch(requests, &h, &PriceHistory::with_capacity(96));
        let limits = adjust_limits(&TradingLimits::default(), &h);

        assert_eq!(report.ranked.len(), 3);
        for entry in &report.ranked {
            let (_, meta) = metas
                .iter()
                .find(|(name, _)| *name == entry.score.opportunity.item_name)
                .unwrap();
            let again = ArbitrageDecisionPolicy::default().decide(&entry.score, meta, &limits);
            assert_eq!(again.decision, entry.decision);
            assert_eq!(again.reason, entry.reason);
        }
    }

    #[test]
    fn crash_pauses_instant_buys() {
        let requests = vec![
            // 11.6% ROI clears the crash target of 7.5% but not the hold threshold
            request("AK-47 | Slate (Field-Tested)", dec!(10), dec!(12), 0),
            // 20.9% ROI
            request("AWP | Asiimov (Field-Tested)", dec!(10), dec!(13), 0),
        ];
        let report = evaluator().evaluate_batch(
            requests,
            &health(MarketState::Crash),
            &PriceHistory::with_capacity(96),
        );

        assert!(report.limits.pause_normal_buying);
        assert_eq!(report.limits.min_roi_percent, dec!(7.5));
        assert!(report.ranked.iter().all(|e| e.decision != Decision::BuyInstant));
        let awp = report
            .ranked
            .iter()
            .find(|e| e.score.opportunity.item_name.starts_with("AWP"))
            .unwrap();
        assert_eq!(awp.decision, Decision::BuyAndHold);
    }

    #[test]
    fn malformed_blacklisted_and_unpriced_items_are_skipped() {
        let mut bad_price = request("Broken", dec!(0), dec!(12), 0);
        bad_price.opportunity.buy_price = dec!(0);
        let mut sticker = request("Sticker | Crown (Foil)", dec!(10), dec!(12), 0);
        sticker.category = Some("Sticker".to_string());
        let mut unknown_platform = request("USP-S | Kill Confirmed (Field-Tested)", dec!(10), dec!(12), 0);
        unknown_platform.opportunity.platform_sell = "bitskins".to_string();
        let good = request("AK-47 | Slate (Field-Tested)", dec!(10), dec!(12), 0);

        let report = evaluator().evaluate_batch(
            vec![bad_price, sticker, unknown_platform, good],
            &health(MarketState::Stable),
            &PriceHistory::with_capacity(96),
        );

        assert_eq!(report.ranked.len(), 1);
        let skipped: Vec<_> = report.skipped.iter().map(|s| s.item_name.as_str()).collect();
        assert_eq!(
            skipped,
            ["Broken", "Sticker | Crown (Foil)", "USP-S | Kill Confirmed (Field-Tested)"]
        );
    }

    #[test]
    fn history_supplies_missing_volatility() {
        let history = PriceHistory::with_capacity(96);
        let start = Utc::now() - Duration::hours(4);
        for (i, price) in [dec!(8), dec!(12), dec!(8), dec!(12)].into_iter().enumerate() {
            history.push(
                Game::Csgo,
                PriceSnapshot {
                    item_name: "AK-47 | Slate (Field-Tested)".to_string(),
                    price,
                    volume: 30,
                    timestamp: start + Duration::hours(i as i64),
                },
            );
        }
        let report = evaluator().evaluate_batch(
            vec![request("AK-47 | Slate (Field-Tested)", dec!(10), dec!(12), 0)],
            &health(MarketState::Stable),
            &history,
        );
        let score = &report.ranked[0].score;
        assert!(score.volatility.is_some());
        assert_eq!(score.risk_score, dec!(40));
    }

    #[test]
    fn history_from_another_game_is_ignored() {
        let history = PriceHistory::with_capacity(96);
        let start = Utc::now() - Duration::hours(4);
        for (i, price) in [dec!(8), dec!(12), dec!(8), dec!(12)].into_iter().enumerate() {
            history.push(
                Game::Rust,
                PriceSnapshot {
                    item_name: "AK-47 | Slate (Field-Tested)".to_string(),
                    price,
                    volume: 30,
                    timestamp: start + Duration::hours(i as i64),
                },
            );
        }
        let report = evaluator().evaluate_batch(
            vec![request("AK-47 | Slate (Field-Tested)", dec!(10), dec!(12), 0)],
            &health(MarketState::Stable),
            &history,
        );
        assert!(report.ranked[0].score.volatility.is_none());
    }

    #[test]
    fn out_of_range_prices_are_skipped_without_stopping_the_batch() {
        let requests = vec![
            request(
                "M4A4 | Howl (Factory New)",
                dec!(0.0000000000000000000001),
                dec!(100000000),
                0,
            ),
            request("AK-47 | Slate (Field-Tested)", dec!(10), dec!(12), 0),
        ];
        let report = evaluator().evaluate_batch(
            requests,
            &health(MarketState::Stable),
            &PriceHistory::with_capacity(96),
        );

        assert_eq!(report.ranked.len(), 1);
        assert_eq!(
            report.ranked[0].score.opportunity.item_name,
            "AK-47 | Slate (Field-Tested)"
        );
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            report.skipped[0].item_name,
            "M4A4 | Howl (Factory New)"
        );
    }

    #[test]
    fn default_config_decides_expensive_items_on_roi() {
        // 24.0% ROI on a 150.00 buy
        let report = evaluator().evaluate_batch(
            vec![request("AWP | Gungnir (Field-Tested)", dec!(150), dec!(200), 0)],
            &health(MarketState::Stable),
            &PriceHistory::with_capacity(96),
        );
        assert!(report.limits.max_spend.is_none());
        assert_eq!(report.ranked[0].decision, Decision::BuyInstant);
    }
}
