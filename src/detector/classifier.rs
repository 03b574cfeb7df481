use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::{ArbitrageConfig, ClassifierThresholds, SeasonalWindow, DELTA_LOOKBACK_SECS};
use crate::state::PriceHistory;
use crate::types::{Game, MarketHealth, MarketState};

/// One indicator's movement between its latest snapshot and the most recent
/// snapshot at least an hour older.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorDelta {
    pub item_name: String,
    /// Fractional price change, e.g. -0.10 for a 10% drop.
    pub price_change: Decimal,
    pub volume_ratio: Decimal,
    pub hours: Decimal,
}

/// Averages across every indicator with valid history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateDelta {
    pub price_change: Decimal,
    pub volume_ratio: Decimal,
    /// Percent per hour.
    pub price_velocity: Decimal,
    pub samples: usize,
}

impl Default for AggregateDelta {
    fn default() -> Self {
        Self {
            price_change: Decimal::ZERO,
            volume_ratio: Decimal::ONE,
            price_velocity: Decimal::ZERO,
            samples: 0,
        }
    }
}

pub fn indicator_delta(history: &PriceHistory, game: Game, item_name: &str) -> Option<IndicatorDelta> {
    let (latest, baseline) =
        history.latest_with_baseline(game, item_name, Duration::seconds(DELTA_LOOKBACK_SECS))?;

    if baseline.price <= Decimal::ZERO || baseline.volume == 0 {
        debug!(item = %item_name, "baseline snapshot has no price or volume, excluded");
        return None;
    }

    let secs = (latest.timestamp - baseline.timestamp).num_seconds();
    let hours = Decimal::from(secs) / Decimal::from(3_600);

    // The velocity term must also fit, so the aggregate never overflows.
    let price_change = (latest.price - baseline.price).checked_div(baseline.price);
    let in_range = price_change
        .and_then(|dp| dp.checked_mul(Decimal::ONE_HUNDRED))
        .is_some();
    let volume_ratio = Decimal::from(latest.volume).checked_div(Decimal::from(baseline.volume));
    match (price_change, volume_ratio) {
        (Some(price_change), Some(volume_ratio)) if in_range => Some(IndicatorDelta {
            item_name: item_name.to_string(),
            price_change,
            volume_ratio,
            hours,
        }),
        _ => {
            debug!(item = %item_name, "indicator movement out of range, excluded");
            None
        }
    }
}

/// Mean taken as the sum of `x / n`, which stays in range for any inputs.
fn mean(mut values: impl Iterator<Item = Decimal>, n: Decimal) -> Option<Decimal> {
    values.try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v / n))
}

pub fn aggregate(deltas: &[IndicatorDelta]) -> AggregateDelta {
    if deltas.is_empty() {
        return AggregateDelta::default();
    }
    let fallback = AggregateDelta::default();
    let n = Decimal::from(deltas.len());
    let price_change =
        mean(deltas.iter().map(|d| d.price_change), n).unwrap_or(fallback.price_change);
    let volume_ratio =
        mean(deltas.iter().map(|d| d.volume_ratio), n).unwrap_or(fallback.volume_ratio);
    let price_velocity = mean(
        deltas.iter().map(|d| {
            if d.hours > Decimal::ZERO {
                (d.price_change * Decimal::ONE_HUNDRED)
                    .checked_div(d.hours)
                    .unwrap_or(Decimal::ZERO)
            } else {
                Decimal::ZERO
            }
        }),
        n,
    )
    .unwrap_or(fallback.price_velocity);

    AggregateDelta {
        price_change,
        volume_ratio,
        price_velocity,
        samples: deltas.len(),
    }
}

/// `checked / total * 100`, bounded to [0, 100].
pub fn confidence(checked: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    let checked = checked.min(total);
    (Decimal::from(checked) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(2)
}

pub struct MarketStateClassifier {
    thresholds: ClassifierThresholds,
    seasonal_windows: Vec<SeasonalWindow>,
}

impl MarketStateClassifier {
    pub fn new(thresholds: ClassifierThresholds, seasonal_windows: Vec<SeasonalWindow>) -> Self {
        Self { thresholds, seasonal_windows }
    }

    pub fn from_config(cfg: &ArbitrageConfig) -> Self {
        Self::new(cfg.classifier.clone(), cfg.seasonal_windows.clone())
    }

    pub fn active_sale(&self, today: NaiveDate) -> Option<&SeasonalWindow> {
        self.seasonal_windows.iter().find(|w| w.contains(today))
    }

    /// State transition rule, first match wins.
    pub fn classify(&self, agg: &AggregateDelta, today: NaiveDate) -> MarketState {
        let t = &self.thresholds;
        let dp = agg.price_change;
        let dv = agg.volume_ratio;

        if self.active_sale(today).is_some() {
            MarketState::SalePeriod
        } else if dp <= t.panic_price_change {
            MarketState::Crash
        } else if dp >= t.bull_price_change && dv >= t.bull_volume_ratio {
            MarketState::BullRun
        } else if dp >= t.recovery_price_change && dp < t.bull_price_change {
            MarketState::Recovery
        } else if dv >= t.volatile_volume_ratio && dp.abs() < t.volatile_price_band {
            MarketState::Volatile
        } else {
            MarketState::Stable
        }
    }

    /// Build a fresh verdict from the indicators refreshed this cycle.
    ///
    /// `checked` are the indicators whose snapshot was fetched this cycle; those
    /// without an hour-old sample still count toward confidence but are left
    /// out of the averages.
    pub fn evaluate(
        &self,
        game: Game,
        total_indicators: usize,
        checked: &[String],
        history: &PriceHistory,
        now: DateTime<Utc>,
    ) -> MarketHealth {
        let deltas: Vec<IndicatorDelta> = checked
            .iter()
            .filter_map(|item| indicator_delta(history, game, item))
            .collect();
        let agg = aggregate(&deltas);
        let state = self.classify(&agg, now.date_naive());

        debug!(
            game = %game,
            with_history = agg.samples,
            checked = checked.len(),
            "classified {state} from {} of {} indicators",
            agg.samples,
            total_indicators,
        );

        MarketHealth {
            game,
            state,
            price_velocity: agg.price_velocity.round_dp(4),
            volume_change: agg.volume_ratio.round_dp(4),
            confidence: confidence(checked.len(), total_indicators),
            indicators_checked: checked.len(),
            total_indicators,
            last_updated: now,
        }
    }
}

impl Default for MarketStateClassifier {
    fn default() -> Self {
        Self::from_config(&ArbitrageConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceSnapshot;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn agg(dp: Decimal, dv: Decimal) -> AggregateDelta {
        AggregateDelta {
            price_change: dp,
            volume_ratio: dv,
            price_velocity: dp * dec!(100),
            samples: 1,
        }
    }

    fn ordinary_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()
    }

    fn classifier() -> MarketStateClassifier {
        MarketStateClassifier::default()
    }

    fn push(history: &PriceHistory, item: &str, at: DateTime<Utc>, price: Decimal, volume: u64) {
        history.push(
            Game::Csgo,
            PriceSnapshot {
                item_name: item.to_string(),
                price,
                volume,
                timestamp: at,
            },
        );
    }

    #[test]
    fn crash_on_panic_drop() {
        assert_eq!(classifier().classify(&agg(dec!(-0.10), dec!(1.0)), ordinary_day()), MarketState::Crash);
        assert_eq!(classifier().classify(&agg(dec!(-0.07), dec!(1.0)), ordinary_day()), MarketState::Crash);
    }

    #[test]
    fn bull_run_needs_price_and_volume() {
        let c = classifier();
        assert_eq!(c.classify(&agg(dec!(0.06), dec!(1.5)), ordinary_day()), MarketState::BullRun);
        // price alone above the bull threshold is neither bull nor recovery
        assert_eq!(c.classify(&agg(dec!(0.06), dec!(1.0)), ordinary_day()), MarketState::Stable);
    }

    #[test]
    fn recovery_band() {
        let c = classifier();
        assert_eq!(c.classify(&agg(dec!(0.02), dec!(1.0)), ordinary_day()), MarketState::Recovery);
        assert_eq!(c.classify(&agg(dec!(0.049), dec!(3.0)), ordinary_day()), MarketState::Recovery);
    }

    #[test]
    fn volatile_on_volume_surge_with_flat_price() {
        let c = classifier();
        assert_eq!(c.classify(&agg(dec!(0.01), dec!(2.0)), ordinary_day()), MarketState::Volatile);
        assert_eq!(c.classify(&agg(dec!(-0.04), dec!(2.5)), ordinary_day()), MarketState::Stable);
    }

    #[test]
    fn sale_period_takes_priority_over_crash() {
        let c = classifier();
        let christmas = NaiveDate::from_ymd_opt(2025, 12, 28).unwrap();
        let new_year = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap();
        assert_eq!(c.classify(&agg(dec!(-0.20), dec!(1.0)), christmas), MarketState::SalePeriod);
        assert_eq!(c.classify(&agg(dec!(0), dec!(1.0)), new_year), MarketState::SalePeriod);
    }

    #[test]
    fn confidence_is_bounded_ratio() {
        assert_eq!(confidence(3, 6), dec!(50));
        assert_eq!(confidence(6, 6), dec!(100));
        assert_eq!(confidence(9, 6), dec!(100));
        assert_eq!(confidence(0, 0), Decimal::ZERO);
    }

    #[test]
    fn evaluate_detects_crash_from_history() {
        let history = PriceHistory::with_capacity(96);
        let t0 = Utc.with_ymd_and_hms(2025, 4, 15, 10, 0, 0).unwrap();
        let t1 = t0 + Duration::hours(1);
        push(&history, "A", t0, dec!(100), 50);
        push(&history, "A", t1, dec!(90), 60);
        push(&history, "B", t0, dec!(20), 10);
        push(&history, "B", t1, dec!(18), 10);
        // C has only a fresh sample: counted for confidence, excluded from averages
        push(&history, "C", t1, dec!(5), 10);

        let checked = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let health = classifier().evaluate(Game::Csgo, 4, &checked, &history, t1);

        assert_eq!(health.state, MarketState::Crash);
        assert_eq!(health.indicators_checked, 3);
        assert_eq!(health.confidence, dec!(75));
        assert_eq!(health.price_velocity, dec!(-10));
        assert_eq!(health.volume_change, dec!(1.1));
    }

    #[test]
    fn evaluate_without_history_is_stable() {
        let history = PriceHistory::with_capacity(96);
        let now = Utc.with_ymd_and_hms(2025, 4, 15, 10, 0, 0).unwrap();
        let health = classifier().evaluate(Game::Csgo, 6, &[], &history, now);
        assert_eq!(health.state, MarketState::Stable);
        assert_eq!(health.confidence, Decimal::ZERO);
        assert!(health.is_unknown());
    }

    #[test]
    fn indicator_with_extreme_move_is_excluded() {
        let history = PriceHistory::with_capacity(96);
        let t0 = Utc.with_ymd_and_hms(2025, 4, 15, 10, 0, 0).unwrap();
        let t1 = t0 + Duration::hours(1);
        push(&history, "A", t0, dec!(100), 50);
        push(&history, "A", t1, dec!(90), 50);
        push(&history, "Z", t0, dec!(0.0000000000000000000001), 50);
        push(&history, "Z", t1, dec!(100000000), 50);

        assert!(indicator_delta(&history, Game::Csgo, "Z").is_none());
        let checked = vec!["A".to_string(), "Z".to_string()];
        let health = classifier().evaluate(Game::Csgo, 2, &checked, &history, t1);
        assert_eq!(health.state, MarketState::Crash);
        assert_eq!(health.price_velocity, dec!(-10));
        assert_eq!(health.confidence, dec!(100));
    }

    #[test]
    fn aggregate_of_large_moves_stays_in_range() {
        let big = IndicatorDelta {
            item_name: "A".to_string(),
            price_change: dec!(500000000000000000000000000),
            volume_ratio: dec!(70000000000000000000000000000),
            hours: Decimal::ONE,
        };
        let agg = aggregate(&[big.clone(), big]);
        assert_eq!(agg.samples, 2);
        assert_eq!(agg.price_change, dec!(500000000000000000000000000));
        assert_eq!(agg.volume_ratio, dec!(70000000000000000000000000000));
    }

    #[test]
    fn history_of_another_game_is_not_read() {
        let history = PriceHistory::with_capacity(96);
        let t0 = Utc.with_ymd_and_hms(2025, 4, 15, 10, 0, 0).unwrap();
        push(&history, "A", t0, dec!(100), 50);
        push(&history, "A", t0 + Duration::hours(1), dec!(80), 50);
        assert!(indicator_delta(&history, Game::Dota2, "A").is_none());
        assert!(indicator_delta(&history, Game::Csgo, "A").is_some());
    }
}
