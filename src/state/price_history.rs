use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::types::{Game, PriceSnapshot};

// ---------------------------------------------------------------------------
// PriceHistory
// ---------------------------------------------------------------------------

/// Per-item time-ordered ring buffers of price snapshots, one per
/// (game, item name) pair.
///
/// Capacity is fixed at construction (sized to cover 24h at the polling
/// interval). Pushing onto a full buffer evicts the oldest snapshot.
/// Snapshots older than the newest one already stored are dropped so each
/// buffer stays sorted by timestamp.
pub struct PriceHistory {
    capacity: usize,
    /// (game, item_name) → snapshots, oldest first
    items: DashMap<(Game, String), VecDeque<PriceSnapshot>>,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self::with_capacity(capacity))
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a snapshot. Returns false if it was out of order and discarded.
    pub fn push(&self, game: Game, snapshot: PriceSnapshot) -> bool {
        let mut buf = self
            .items
            .entry((game, snapshot.item_name.clone()))
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));

        if let Some(last) = buf.back() {
            if snapshot.timestamp < last.timestamp {
                return false;
            }
        }
        if buf.len() == self.capacity {
            buf.pop_front();
        }
        buf.push_back(snapshot);
        true
    }

    /// Latest snapshot paired with the most recent snapshot at least
    /// `lookback` older than it. None if either is missing.
    pub fn latest_with_baseline(
        &self,
        game: Game,
        item_name: &str,
        lookback: Duration,
    ) -> Option<(PriceSnapshot, PriceSnapshot)> {
        let buf = self.items.get(&key(game, item_name))?;
        let latest = buf.back()?;
        let cutoff = latest.timestamp - lookback;
        let baseline = buf.iter().rev().find(|s| s.timestamp <= cutoff)?;
        Some((latest.clone(), baseline.clone()))
    }

    /// Prices currently held for an item, oldest first.
    pub fn prices(&self, game: Game, item_name: &str) -> Vec<Decimal> {
        self.items
            .get(&key(game, item_name))
            .map(|buf| buf.iter().map(|s| s.price).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, game: Game, item_name: &str) -> usize {
        self.items.get(&key(game, item_name)).map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

fn key(game: Game, item_name: &str) -> (Game, String) {
    (game, item_name.to_string())
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::with_capacity(crate::config::history_capacity(
            crate::config::MARKET_REFRESH_INTERVAL_SECS,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn snap(minutes: i64, price: Decimal) -> PriceSnapshot {
        PriceSnapshot {
            item_name: "Recoil Case".to_string(),
            price,
            volume: 100,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn full_buffer_evicts_oldest() {
        let history = PriceHistory::new(3);
        for i in 0..5 {
            history.push(Game::Csgo, snap(i * 15, Decimal::from(i + 1)));
        }
        assert_eq!(history.len(Game::Csgo, "Recoil Case"), 3);
        assert_eq!(history.prices(Game::Csgo, "Recoil Case"), vec![dec!(3), dec!(4), dec!(5)]);
    }

    #[test]
    fn out_of_order_snapshot_is_dropped() {
        let history = PriceHistory::new(4);
        assert!(history.push(Game::Csgo, snap(30, dec!(1.00))));
        assert!(!history.push(Game::Csgo, snap(15, dec!(2.00))));
        assert_eq!(history.len(Game::Csgo, "Recoil Case"), 1);
    }

    #[test]
    fn baseline_is_most_recent_sample_an_hour_older() {
        let history = PriceHistory::new(16);
        history.push(Game::Csgo, snap(0, dec!(1.00)));
        history.push(Game::Csgo, snap(15, dec!(1.10)));
        history.push(Game::Csgo, snap(30, dec!(1.20)));
        history.push(Game::Csgo, snap(75, dec!(1.30)));

        let (latest, baseline) = history
            .latest_with_baseline(Game::Csgo, "Recoil Case", Duration::hours(1))
            .unwrap();
        assert_eq!(latest.price, dec!(1.30));
        // 75 - 60 = 15 → the sample at minute 15 is the newest qualifying one
        assert_eq!(baseline.price, dec!(1.10));
    }

    #[test]
    fn no_baseline_without_hour_old_sample() {
        let history = PriceHistory::new(16);
        history.push(Game::Csgo, snap(0, dec!(1.00)));
        history.push(Game::Csgo, snap(45, dec!(1.10)));
        assert!(history.latest_with_baseline(Game::Csgo, "Recoil Case", Duration::hours(1)).is_none());
        assert!(history.latest_with_baseline(Game::Csgo, "Unknown", Duration::hours(1)).is_none());
    }

    #[test]
    fn same_item_name_is_tracked_per_game() {
        let history = PriceHistory::new(8);
        history.push(Game::Csgo, snap(0, dec!(1.00)));
        history.push(Game::Rust, snap(0, dec!(40.00)));
        history.push(Game::Rust, snap(15, dec!(41.00)));

        assert_eq!(history.prices(Game::Csgo, "Recoil Case"), vec![dec!(1.00)]);
        assert_eq!(history.prices(Game::Rust, "Recoil Case"), vec![dec!(40.00), dec!(41.00)]);
        assert_eq!(history.len(Game::Dota2, "Recoil Case"), 0);
        assert_eq!(history.item_count(), 2);
    }
}
