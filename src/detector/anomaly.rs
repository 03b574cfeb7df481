use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::config::{AnomalyConfig, SCAN_CONCURRENCY};
use crate::fetcher::PriceSource;
use crate::types::{AnomalyCandidate, CandidateFacts, Game};

/// Score one candidate. Bonuses add up independently:
/// volume spike ≥10× +40, ≥5× +25, ≥2× +10; price drop ≥30% +30, ≥20% +20,
/// ≥10% +10; legacy-collection keyword +20.
///
/// Returns None when the 7-day averages cannot serve as a baseline, or when
/// the ratios against them are too large to represent.
pub fn score_candidate(
    item_name: &str,
    game: Game,
    facts: &CandidateFacts,
    legacy_keywords: &[String],
    now: DateTime<Utc>,
) -> Option<AnomalyCandidate> {
    if facts.avg_price_7d <= Decimal::ZERO || facts.avg_volume_7d <= Decimal::ZERO {
        debug!(item = %item_name, "no usable 7d baseline, skipped");
        return None;
    }
    if facts.current_price <= Decimal::ZERO {
        debug!(item = %item_name, "non-positive current price, skipped");
        return None;
    }

    let volume_spike = Decimal::from(facts.current_volume).checked_div(facts.avg_volume_7d);
    let price_drop = (facts.avg_price_7d - facts.current_price)
        .checked_div(facts.avg_price_7d)
        .and_then(|d| d.checked_mul(Decimal::ONE_HUNDRED));
    let (Some(volume_spike), Some(price_drop)) = (volume_spike, price_drop) else {
        debug!(item = %item_name, "7d ratios out of range, skipped");
        return None;
    };

    let mut confidence: u32 = 0;
    let mut reasons: Vec<String> = Vec::new();

    let spike_bonus = if volume_spike >= dec!(10) {
        40
    } else if volume_spike >= dec!(5) {
        25
    } else if volume_spike >= dec!(2) {
        10
    } else {
        0
    };
    if spike_bonus > 0 {
        confidence += spike_bonus;
        reasons.push(format!("volume spike {:.1}x", volume_spike));
    }

    let drop_bonus = if price_drop >= dec!(30) {
        30
    } else if price_drop >= dec!(20) {
        20
    } else if price_drop >= dec!(10) {
        10
    } else {
        0
    };
    if drop_bonus > 0 {
        confidence += drop_bonus;
        reasons.push(format!("price {:.1}% below 7d average", price_drop));
    }

    let lowered = item_name.to_lowercase();
    if let Some(keyword) = legacy_keywords
        .iter()
        .find(|k| lowered.contains(&k.to_lowercase()))
    {
        confidence += 20;
        reasons.push(format!("legacy collection ({keyword})"));
    }

    let reason = if reasons.is_empty() {
        "no anomaly".to_string()
    } else {
        reasons.join("; ")
    };

    Some(AnomalyCandidate {
        item_name: item_name.to_string(),
        game,
        current_price: facts.current_price,
        avg_price_7d: facts.avg_price_7d,
        volume_spike: volume_spike.round_dp(2),
        price_drop_percent: price_drop.round_dp(2),
        confidence_score: confidence.min(100) as u8,
        reason,
        discovered_at: now,
    })
}

pub struct AnomalyScanner {
    legacy_keywords: Arc<[String]>,
    min_confidence: u8,
    top_n: usize,
    concurrency: usize,
}

impl AnomalyScanner {
    pub fn new(cfg: &AnomalyConfig, concurrency: usize) -> Self {
        Self {
            legacy_keywords: cfg.legacy_keywords.clone().into(),
            min_confidence: cfg.min_confidence,
            top_n: cfg.top_n,
            concurrency: concurrency.max(1),
        }
    }

    /// Drop everything under the confidence floor, then keep the top N by
    /// confidence. Equal scores keep their input order.
    pub fn select(&self, candidates: Vec<AnomalyCandidate>) -> Vec<AnomalyCandidate> {
        let mut kept: Vec<AnomalyCandidate> = candidates
            .into_iter()
            .filter(|c| c.confidence_score >= self.min_confidence)
            .collect();
        kept.sort_by(|a, b| b.confidence_score.cmp(&a.confidence_score));
        kept.truncate(self.top_n);
        kept
    }

    /// Look up every item (at most `concurrency` lookups in flight) and return
    /// the retained candidates. A failed or empty lookup only drops that item.
    pub async fn scan(
        &self,
        source: &Arc<dyn PriceSource>,
        game: Game,
        items: &[String],
    ) -> Vec<AnomalyCandidate> {
        let now = Utc::now();

        let mut scored: Vec<(usize, AnomalyCandidate)> =
            stream::iter(items.iter().cloned().enumerate().map(|(index, item)| {
                let source = Arc::clone(source);
                let keywords = Arc::clone(&self.legacy_keywords);
                async move {
                    match source.candidate_facts(game, &item).await {
                        Ok(Some(facts)) => score_candidate(&item, game, &facts, &keywords, now)
                            .map(|c| (index, c)),
                        Ok(None) => {
                            debug!(item = %item, "no candidate facts, skipped");
                            None
                        }
                        Err(e) => {
                            warn!(item = %item, "candidate lookup failed, skipped: {e}");
                            None
                        }
                    }
                }
            }))
            .buffer_unordered(self.concurrency)
            .filter_map(|entry| async move { entry })
            .collect()
            .await;

        scored.sort_by_key(|(index, _)| *index);
        let scanned = scored.len();
        let retained = self.select(scored.into_iter().map(|(_, c)| c).collect());

        info!(
            game = %game,
            requested = items.len(),
            scanned,
            retained = retained.len(),
            "anomaly scan complete: {} of {} items retained",
            retained.len(),
            items.len(),
        );
        retained
    }
}

impl Default for AnomalyScanner {
    fn default() -> Self {
        Self::new(&AnomalyConfig::default(), SCAN_CONCURRENCY)
    }
}
