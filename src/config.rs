use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::types::{Game, TradingLimits};

pub const PRICE_FEED_URL: &str = "http://localhost:8080";

/// Market-state refresh interval (seconds).
pub const MARKET_REFRESH_INTERVAL_SECS: u64 = 900;

/// Default bound on concurrent price-feed lookups per cycle or scan.
pub const SCAN_CONCURRENCY: usize = 8;

/// Price-feed request timeout (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 10;

/// Window the price history must cover, and the look-back used for Δp / Δv.
pub const HISTORY_WINDOW_SECS: i64 = 24 * 3_600;
pub const DELTA_LOOKBACK_SECS: i64 = 3_600;

/// Minimum samples needed before volatility is derived from history.
pub const MIN_VOLATILITY_SAMPLES: usize = 2;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    pub price_feed_url: String,
    /// Seconds between market-state cycles (MARKET_REFRESH_INTERVAL_SECS)
    pub refresh_interval_secs: u64,
    /// Concurrent price-feed lookups (SCAN_CONCURRENCY)
    pub scan_concurrency: usize,
    /// Optional TOML file overriding the domain defaults (ARBITRAGE_CONFIG)
    pub arbitrage_config_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            price_feed_url: std::env::var("PRICE_FEED_URL")
                .unwrap_or_else(|_| PRICE_FEED_URL.to_string()),
            refresh_interval_secs: std::env::var("MARKET_REFRESH_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(MARKET_REFRESH_INTERVAL_SECS),
            scan_concurrency: std::env::var("SCAN_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(SCAN_CONCURRENCY),
            arbitrage_config_path: std::env::var("ARBITRAGE_CONFIG")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        })
    }

    /// Ring-buffer capacity that covers the 24h window at the polling interval.
    pub fn history_capacity(&self) -> usize {
        history_capacity(self.refresh_interval_secs)
    }
}

pub fn history_capacity(interval_secs: u64) -> usize {
    let interval = interval_secs.max(1);
    let window = HISTORY_WINDOW_SECS as u64;
    (window.div_ceil(interval) as usize).max(2)
}

// ---------------------------------------------------------------------------
// Domain configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    pub markets: Vec<MarketConfig>,
    pub classifier: ClassifierThresholds,
    pub seasonal_windows: Vec<SeasonalWindow>,
    /// platform name → sell commission rate
    pub commissions: HashMap<String, Decimal>,
    pub filters: FilterConfig,
    pub anomaly: AnomalyConfig,
    pub scoring: ScoringConfig,
    pub policy: PolicyThresholds,
    pub baseline_limits: TradingLimits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    pub game: Game,
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub panic_price_change: Decimal,
    pub bull_price_change: Decimal,
    pub bull_volume_ratio: Decimal,
    pub recovery_price_change: Decimal,
    pub volatile_volume_ratio: Decimal,
    pub volatile_price_band: Decimal,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            panic_price_change: dec!(-0.07),
            bull_price_change: dec!(0.05),
            bull_volume_ratio: dec!(1.5),
            recovery_price_change: dec!(0.02),
            volatile_volume_ratio: dec!(2.0),
            volatile_price_band: dec!(0.03),
        }
    }
}

/// Recurring calendar window (inclusive). `start > end` wraps across the new year.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeasonalWindow {
    pub name: String,
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
}

impl SeasonalWindow {
    pub fn new(name: &str, start: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            name: name.to_string(),
            start_month: start.0,
            start_day: start.1,
            end_month: end.0,
            end_day: end.1,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let today = (date.month(), date.day());
        let start = (self.start_month, self.start_day);
        let end = (self.end_month, self.end_day);
        if start <= end {
            start <= today && today <= end
        } else {
            today >= start || today <= end
        }
    }

    fn validate(&self) -> Result<()> {
        let valid = |m: u32, d: u32| (1..=12).contains(&m) && (1..=31).contains(&d);
        if !valid(self.start_month, self.start_day) || !valid(self.end_month, self.end_day) {
            return Err(AppError::Config(format!(
                "seasonal window '{}' has an invalid month/day",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub category_blacklist: Vec<String>,
    pub keyword_blacklist: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            category_blacklist: to_strings(&[
                "Sticker",
                "Graffiti",
                "Patch",
                "Music Kit",
                "Collectible",
                "Pass",
                "Tag",
            ]),
            keyword_blacklist: to_strings(&[
                "Sealed Graffiti",
                "Souvenir Package",
                "Storage Unit",
                "Name Tag",
                "Viewer Pass",
            ]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub legacy_keywords: Vec<String>,
    pub min_confidence: u8,
    pub top_n: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            legacy_keywords: to_strings(&[
                "Howl",
                "Dragon Lore",
                "Medusa",
                "Gungnir",
                "Cobblestone",
                "eSports 2013",
                "Operation Breakout",
            ]),
            min_confidence: 30,
            top_n: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub profit: Decimal,
    pub liquidity: Decimal,
    pub risk: Decimal,
    pub speed: Decimal,
    pub competition: Decimal,
    pub confidence: Decimal,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            profit: dec!(0.30),
            liquidity: dec!(0.20),
            risk: dec!(0.20),
            speed: dec!(0.15),
            competition: dec!(0.10),
            confidence: dec!(0.05),
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> Decimal {
        self.profit + self.liquidity + self.risk + self.speed + self.competition + self.confidence
    }

    pub fn validate(&self) -> Result<()> {
        let all = [
            self.profit,
            self.liquidity,
            self.risk,
            self.speed,
            self.competition,
            self.confidence,
        ];
        if all.iter().any(|w| w.is_sign_negative()) {
            return Err(AppError::Config("scoring weights must be non-negative".to_string()));
        }
        let sum = self.sum();
        if sum != Decimal::ONE {
            return Err(AppError::Config(format!(
                "scoring weights must sum to exactly 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    /// ROI (percent) below which the recommendation is always `skip`.
    pub min_roi_percent: Decimal,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            min_roi_percent: dec!(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyThresholds {
    pub min_daily_volume: u32,
    pub hold_roi_percent: Decimal,
    pub max_lock_days: u32,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            min_daily_volume: 5,
            hold_roi_percent: dec!(15),
            max_lock_days: 8,
        }
    }
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            markets: vec![MarketConfig {
                game: Game::Csgo,
                indicators: to_strings(&[
                    "AK-47 | Redline (Field-Tested)",
                    "AWP | Asiimov (Field-Tested)",
                    "M4A1-S | Hyper Beast (Field-Tested)",
                    "Glock-18 | Water Elemental (Minimal Wear)",
                    "Desert Eagle | Blaze (Factory New)",
                    "Recoil Case",
                ]),
            }],
            classifier: ClassifierThresholds::default(),
            seasonal_windows: vec![
                SeasonalWindow::new("Spring Sale", (3, 14), (3, 21)),
                SeasonalWindow::new("Summer Sale", (6, 26), (7, 10)),
                SeasonalWindow::new("Autumn Sale", (11, 25), (12, 2)),
                SeasonalWindow::new("Winter Sale", (12, 20), (1, 5)),
            ],
            commissions: HashMap::from([
                ("dmarket".to_string(), dec!(0.07)),
                ("waxpeer".to_string(), dec!(0.06)),
                ("steam".to_string(), dec!(0.13)),
            ]),
            filters: FilterConfig::default(),
            anomaly: AnomalyConfig::default(),
            scoring: ScoringConfig::default(),
            policy: PolicyThresholds::default(),
            baseline_limits: TradingLimits::default(),
        }
    }
}

impl ArbitrageConfig {
    /// Load from `path` when given, otherwise use the built-in defaults.
    /// The result is always validated.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str::<ArbitrageConfig>(&contents)?
            }
            None => ArbitrageConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.weights.validate()?;

        if self.markets.is_empty() {
            return Err(AppError::Config("at least one market must be configured".to_string()));
        }
        for market in &self.markets {
            if market.indicators.is_empty() {
                return Err(AppError::Config(format!(
                    "market {} has no indicator items",
                    market.game
                )));
            }
        }

        if self.commissions.is_empty() {
            return Err(AppError::Config("commission table is empty".to_string()));
        }
        for (platform, rate) in &self.commissions {
            if rate.is_sign_negative() || *rate >= Decimal::ONE {
                return Err(AppError::Config(format!(
                    "commission for {platform} must be in [0, 1), got {rate}"
                )));
            }
        }

        for window in &self.seasonal_windows {
            window.validate()?;
        }

        if self.classifier.panic_price_change >= Decimal::ZERO {
            return Err(AppError::Config("panic_price_change must be negative".to_string()));
        }
        if self.anomaly.top_n == 0 {
            return Err(AppError::Config("anomaly.top_n must be positive".to_string()));
        }
        if let Some(cap) = self.baseline_limits.max_spend {
            if cap <= Decimal::ZERO {
                return Err(AppError::Config(
                    "baseline_limits.max_spend must be positive when set".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn market(&self, game: Game) -> Option<&MarketConfig> {
        self.markets.iter().find(|m| m.game == game)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
