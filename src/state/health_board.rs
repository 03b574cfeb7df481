use std::sync::Arc;

use dashmap::DashMap;

use crate::types::{AnomalyCandidate, Game, MarketHealth};

/// Published market verdicts, one per game.
///
/// Each publish swaps in a new `Arc<MarketHealth>`; readers clone the `Arc`
/// and keep evaluating against that snapshot even if a newer one lands.
/// Only the monitor cycle writes here.
#[derive(Default)]
pub struct HealthBoard {
    health: DashMap<Game, Arc<MarketHealth>>,
    anomalies: DashMap<Game, Arc<Vec<AnomalyCandidate>>>,
}

impl HealthBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the published verdict for `health.game`. Returns the previous one.
    pub fn publish(&self, health: MarketHealth) -> Option<Arc<MarketHealth>> {
        self.health.insert(health.game, Arc::new(health))
    }

    pub fn current(&self, game: Game) -> Option<Arc<MarketHealth>> {
        self.health.get(&game).map(|h| Arc::clone(h.value()))
    }

    pub fn publish_anomalies(&self, game: Game, candidates: Vec<AnomalyCandidate>) {
        self.anomalies.insert(game, Arc::new(candidates));
    }

    pub fn anomalies(&self, game: Game) -> Option<Arc<Vec<AnomalyCandidate>>> {
        self.anomalies.get(&game).map(|a| Arc::clone(a.value()))
    }

    pub fn games(&self) -> Vec<Game> {
        self.health.iter().map(|e| *e.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketState;
    use chrono::Utc;

    #[test]
    fn publish_replaces_wholesale_and_old_readers_keep_their_snapshot() {
        let board = HealthBoard::new();
        board.publish(MarketHealth::unknown(Game::Csgo, 6, Utc::now()));
        let reader = board.current(Game::Csgo).unwrap();

        let mut next = MarketHealth::unknown(Game::Csgo, 6, Utc::now());
        next.state = MarketState::Crash;
        next.indicators_checked = 6;
        let previous = board.publish(next).unwrap();

        assert_eq!(previous.state, MarketState::Stable);
        assert_eq!(reader.state, MarketState::Stable);
        assert_eq!(board.current(Game::Csgo).unwrap().state, MarketState::Crash);
        assert!(board.current(Game::Dota2).is_none());
    }
}
