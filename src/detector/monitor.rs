use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::health::HostHealth;
use crate::api::latency::LatencyStats;
use crate::config::ArbitrageConfig;
use crate::detector::anomaly::AnomalyScanner;
use crate::detector::classifier::MarketStateClassifier;
use crate::error::{AppError, Result};
use crate::fetcher::PriceSource;
use crate::state::{HealthBoard, PriceHistory};
use crate::types::{AnomalyCandidate, Game, MarketHealth, PriceSnapshot};

/// Sole writer of `MarketHealth`. Each cycle refreshes the indicator
/// snapshots of every configured market, classifies, and publishes a new
/// verdict to the board. Cycles never overlap: a cycle requested while one
/// is running fails with `CycleInProgress`.
pub struct MarketMonitor {
    cfg: Arc<ArbitrageConfig>,
    source: Arc<dyn PriceSource>,
    history: Arc<PriceHistory>,
    board: Arc<HealthBoard>,
    classifier: MarketStateClassifier,
    scanner: AnomalyScanner,
    host: Arc<HostHealth>,
    latency: Arc<LatencyStats>,
    concurrency: usize,
    cycle_lock: Mutex<()>,
}

impl MarketMonitor {
    pub fn new(
        cfg: Arc<ArbitrageConfig>,
        source: Arc<dyn PriceSource>,
        history: Arc<PriceHistory>,
        board: Arc<HealthBoard>,
        host: Arc<HostHealth>,
        latency: Arc<LatencyStats>,
        concurrency: usize,
    ) -> Self {
        let classifier = MarketStateClassifier::from_config(&cfg);
        let scanner = AnomalyScanner::new(&cfg.anomaly, concurrency);
        Self {
            cfg,
            source,
            history,
            board,
            classifier,
            scanner,
            host,
            latency,
            concurrency: concurrency.max(1),
            cycle_lock: Mutex::new(()),
        }
    }

    /// Runs one cycle immediately, then one per `interval_secs`. An overrunning
    /// cycle delays the next tick instead of bunching them up.
    pub async fn run(self: Arc<Self>, interval_secs: u64) {
        let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(_) => {}
                Err(AppError::CycleInProgress) => {
                    debug!("timer cycle skipped: a manual cycle is still publishing");
                }
                Err(e) => error!("Market cycle failed: {e}"),
            }
        }
    }

    pub async fn run_cycle(&self) -> Result<Vec<Arc<MarketHealth>>> {
        let _guard = self.cycle_lock.try_lock().map_err(|_| AppError::CycleInProgress)?;
        let started = Instant::now();
        let _running = self.host.cycle_running_guard();

        let mut published = Vec::with_capacity(self.cfg.markets.len());
        for market in &self.cfg.markets {
            let checked = self.refresh_indicators(market.game, &market.indicators).await;
            let health = self.classifier.evaluate(
                market.game,
                market.indicators.len(),
                &checked,
                &self.history,
                Utc::now(),
            );
            log_health(&health);
            self.board.publish(health);
            if let Some(current) = self.board.current(market.game) {
                published.push(current);
            }
        }

        self.latency.record(started.elapsed());
        self.host.record_cycle(Utc::now());
        Ok(published)
    }

    /// Fetch every indicator (bounded concurrency) and append fresh snapshots
    /// to the history. Returns the names that were refreshed.
    async fn refresh_indicators(&self, game: Game, indicators: &[String]) -> Vec<String> {
        let now = Utc::now();

        let mut fetched: Vec<(usize, PriceSnapshot)> =
            stream::iter(indicators.iter().cloned().enumerate().map(|(index, item)| {
                let source = Arc::clone(&self.source);
                async move {
                    match source.indicator_snapshot(game, &item).await {
                        Ok(Some(quote)) if quote.price > Decimal::ZERO => Some((
                            index,
                            PriceSnapshot {
                                item_name: item,
                                price: quote.price,
                                volume: quote.volume,
                                timestamp: now,
                            },
                        )),
                        Ok(Some(quote)) => {
                            warn!(item = %item, price = %quote.price, "non-positive indicator price, skipped");
                            None
                        }
                        Ok(None) => {
                            debug!(item = %item, "indicator absent from feed this cycle");
                            None
                        }
                        Err(e) => {
                            warn!(item = %item, "indicator lookup failed: {e}");
                            None
                        }
                    }
                }
            }))
            .buffer_unordered(self.concurrency)
            .filter_map(|entry| async move { entry })
            .collect()
            .await;

        fetched.sort_by_key(|(index, _)| *index);
        fetched
            .into_iter()
            .filter_map(|(_, snapshot)| {
                let name = snapshot.item_name.clone();
                self.history.push(game, snapshot).then_some(name)
            })
            .collect()
    }

    /// Scan `items` for anomalies and publish the retained list for `game`.
    pub async fn scan_anomalies(&self, game: Game, items: &[String]) -> Vec<AnomalyCandidate> {
        let retained = self.scanner.scan(&self.source, game, items).await;
        self.board.publish_anomalies(game, retained.clone());
        retained
    }

    pub fn config(&self) -> &ArbitrageConfig {
        &self.cfg
    }
}

fn log_health(h: &MarketHealth) {
    info!(
        event = "MARKET_HEALTH",
        game = %h.game,
        state = %h.state,
        price_velocity = %h.price_velocity,
        volume_change = %h.volume_change,
        confidence = %h.confidence,
        checked = h.indicators_checked,
        total = h.total_indicators,
        "MARKET HEALTH | {} | state: {} | velocity: {}%/h | volume: {}x | confidence: {}% ({}/{})",
        h.game, h.state, h.price_velocity, h.volume_change, h.confidence,
        h.indicators_checked, h.total_indicators,
    );
}
