use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// A monitored market. Exactly one `MarketHealth` is published per game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    #[serde(alias = "cs2")]
    Csgo,
    Dota2,
    Tf2,
    Rust,
}

impl std::fmt::Display for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Game::Csgo => "csgo",
            Game::Dota2 => "dota2",
            Game::Tf2 => "tf2",
            Game::Rust => "rust",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Game {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csgo" | "cs2" => Ok(Game::Csgo),
            "dota2" => Ok(Game::Dota2),
            "tf2" => Ok(Game::Tf2),
            "rust" => Ok(Game::Rust),
            other => Err(AppError::InvalidInput(format!("unknown game: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Price feed records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub item_name: String,
    pub price: Decimal,
    pub volume: u64,
    pub timestamp: DateTime<Utc>,
}

/// Current price/volume of one indicator item, as returned by the price feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorQuote {
    pub price: Decimal,
    pub volume: u64,
}

/// Current and 7-day average figures for an anomaly-scan candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateFacts {
    pub current_price: Decimal,
    pub current_volume: u64,
    pub avg_price_7d: Decimal,
    pub avg_volume_7d: Decimal,
}

// ---------------------------------------------------------------------------
// Market health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketState {
    #[default]
    Stable,
    Volatile,
    Crash,
    Recovery,
    BullRun,
    SalePeriod,
}

impl std::fmt::Display for MarketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MarketState::Stable => "STABLE",
            MarketState::Volatile => "VOLATILE",
            MarketState::Crash => "CRASH",
            MarketState::Recovery => "RECOVERY",
            MarketState::BullRun => "BULL_RUN",
            MarketState::SalePeriod => "SALE_PERIOD",
        };
        write!(f, "{s}")
    }
}

/// One evaluation cycle's verdict for a game. Never mutated after publication;
/// the next cycle produces a fresh instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketHealth {
    pub game: Game,
    pub state: MarketState,
    /// Average indicator price change, percent per hour.
    pub price_velocity: Decimal,
    /// Average indicator volume ratio (latest / hour-old sample).
    pub volume_change: Decimal,
    /// `indicators_checked / total_indicators * 100`.
    pub confidence: Decimal,
    pub indicators_checked: usize,
    pub total_indicators: usize,
    pub last_updated: DateTime<Utc>,
}

impl MarketHealth {
    /// Placeholder used before the first cycle has published anything.
    /// Zero confidence marks the verdict as unknown rather than measured.
    pub fn unknown(game: Game, total_indicators: usize, now: DateTime<Utc>) -> Self {
        Self {
            game,
            state: MarketState::Stable,
            price_velocity: Decimal::ZERO,
            volume_change: Decimal::ONE,
            confidence: Decimal::ZERO,
            indicators_checked: 0,
            total_indicators,
            last_updated: now,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.indicators_checked == 0
    }
}

// ---------------------------------------------------------------------------
// Anomaly ("X5") candidates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyCandidate {
    pub item_name: String,
    pub game: Game,
    pub current_price: Decimal,
    pub avg_price_7d: Decimal,
    pub volume_spike: Decimal,
    pub price_drop_percent: Decimal,
    pub confidence_score: u8,
    pub reason: String,
    pub discovered_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Trade opportunities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityType {
    /// Buy on one platform, sell on another.
    CrossPlatform,
    /// Buy and relist on the same platform.
    Flip,
    /// Surfaced by the anomaly scan.
    Spike,
}

impl std::fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OpportunityType::CrossPlatform => "cross_platform",
            OpportunityType::Flip => "flip",
            OpportunityType::Spike => "spike",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOpportunity {
    pub item_name: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub platform_buy: String,
    pub platform_sell: String,
    pub opportunity_type: OpportunityType,
    pub game: Game,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub quantity_available: u32,
    #[serde(default)]
    pub daily_volume: Option<u32>,
    #[serde(default)]
    pub average_sell_time_hours: Option<f64>,
    /// Coefficient of variation (stdev / mean) of recent prices.
    #[serde(default)]
    pub price_volatility: Option<f64>,
    #[serde(default)]
    pub competition_count: Option<u32>,
}

impl TradeOpportunity {
    pub fn gross_profit(&self) -> Result<Decimal> {
        self.sell_price
            .checked_sub(self.buy_price)
            .ok_or_else(|| self.overflow("gross profit"))
    }

    /// Profit after the destination platform's commission.
    pub fn net_profit(&self, sell_commission: Decimal) -> Result<Decimal> {
        Decimal::ONE
            .checked_sub(sell_commission)
            .and_then(|keep| self.sell_price.checked_mul(keep))
            .and_then(|proceeds| proceeds.checked_sub(self.buy_price))
            .ok_or_else(|| self.overflow("net profit"))
    }

    /// Net profit as a percentage of the pre-commission acquisition price.
    pub fn roi_percent(&self, sell_commission: Decimal) -> Result<Decimal> {
        if self.buy_price <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        self.net_profit(sell_commission)?
            .checked_div(self.buy_price)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(|| self.overflow("ROI"))
    }

    fn overflow(&self, what: &str) -> AppError {
        AppError::InvalidInput(format!(
            "{}: {what} out of range for buy {} / sell {}",
            self.item_name, self.buy_price, self.sell_price
        ))
    }

    pub fn spans_platforms(&self) -> bool {
        !self.platform_buy.eq_ignore_ascii_case(&self.platform_sell)
    }

    /// Rejects records whose numbers cannot be scored: non-positive prices,
    /// negative or non-finite volatility / sell time.
    pub fn validate(&self) -> Result<()> {
        if self.item_name.trim().is_empty() {
            return Err(AppError::InvalidInput("empty item name".to_string()));
        }
        if self.buy_price <= Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "{}: buy price must be positive, got {}",
                self.item_name, self.buy_price
            )));
        }
        if self.sell_price <= Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "{}: sell price must be positive, got {}",
                self.item_name, self.sell_price
            )));
        }
        if let Some(v) = self.price_volatility {
            if !v.is_finite() || v < 0.0 {
                return Err(AppError::InvalidInput(format!(
                    "{}: volatility must be finite and non-negative, got {v}",
                    self.item_name
                )));
            }
        }
        if let Some(h) = self.average_sell_time_hours {
            if !h.is_finite() || h < 0.0 {
                return Err(AppError::InvalidInput(format!(
                    "{}: sell time must be finite and non-negative, got {h}",
                    self.item_name
                )));
            }
        }
        Ok(())
    }
}

/// Commission-adjusted profit figures, computed once when an opportunity is scored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitBreakdown {
    pub commission_rate: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
    pub roi_percent: Decimal,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn from_factors(factors: u32) -> Self {
        match factors {
            0 => RiskLevel::Low,
            1 | 2 => RiskLevel::Medium,
            3 => RiskLevel::High,
            _ => RiskLevel::VeryHigh,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::VeryHigh => "VERY_HIGH",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    StrongBuy,
    Buy,
    Consider,
    Monitor,
    Caution,
    Avoid,
    Skip,
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecommendedAction::StrongBuy => "strong_buy",
            RecommendedAction::Buy => "buy",
            RecommendedAction::Consider => "consider",
            RecommendedAction::Monitor => "monitor",
            RecommendedAction::Caution => "caution",
            RecommendedAction::Avoid => "avoid",
            RecommendedAction::Skip => "skip",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityScore {
    pub opportunity: TradeOpportunity,
    pub profit: ProfitBreakdown,
    pub profit_score: Decimal,
    pub liquidity_score: Decimal,
    pub risk_score: Decimal,
    pub speed_score: Decimal,
    pub competition_score: Decimal,
    pub confidence_score: Decimal,
    pub total_score: Decimal,
    /// Volatility actually used for the risk score: supplied, derived from history, or unknown.
    pub volatility: Option<f64>,
    pub risk_level: RiskLevel,
    pub recommended_action: RecommendedAction,
    /// 1-based position after ranking; 0 until ranked.
    pub priority_rank: usize,
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    BuyInstant,
    BuyAndHold,
    Skip,
    InsufficientLiquidity,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Decision::BuyInstant => "BUY_INSTANT",
            Decision::BuyAndHold => "BUY_AND_HOLD",
            Decision::Skip => "SKIP",
            Decision::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
        };
        write!(f, "{s}")
    }
}

/// A terminal decision plus the human-readable reason shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub reason: String,
}

impl DecisionOutcome {
    pub fn new(decision: Decision, reason: impl Into<String>) -> Self {
        Self { decision, reason: reason.into() }
    }
}

/// Item facts the decision policy needs beyond the score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    #[serde(default)]
    pub category: Option<String>,
    /// Days the item cannot be resold after purchase; 0 means tradable immediately.
    #[serde(default)]
    pub trade_lock_days: u32,
}

/// Global buying limits, adjusted per cycle from the current market state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingLimits {
    pub min_roi_percent: Decimal,
    /// Per-item spend cap; None leaves price out of the decision.
    pub max_spend: Option<Decimal>,
    pub pause_normal_buying: bool,
}

impl Default for TradingLimits {
    fn default() -> Self {
        Self {
            min_roi_percent: Decimal::from(5),
            max_spend: None,
            pause_normal_buying: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn opportunity(buy: Decimal, sell: Decimal) -> TradeOpportunity {
        TradeOpportunity {
            item_name: "AK-47 | Redline (Field-Tested)".to_string(),
            buy_price: buy,
            sell_price: sell,
            platform_buy: "dmarket".to_string(),
            platform_sell: "dmarket".to_string(),
            opportunity_type: OpportunityType::Flip,
            game: Game::Csgo,
            item_id: None,
            quantity_available: 1,
            daily_volume: Some(40),
            average_sell_time_hours: None,
            price_volatility: None,
            competition_count: None,
        }
    }

    #[test]
    fn profit_figures_apply_sell_commission() {
        let opp = opportunity(dec!(10.00), dec!(15.00));
        assert_eq!(opp.gross_profit().unwrap(), dec!(5.00));
        assert_eq!(opp.net_profit(dec!(0.07)).unwrap(), dec!(3.95));
        assert_eq!(opp.roi_percent(dec!(0.07)).unwrap(), dec!(39.5));
    }

    #[test]
    fn extreme_price_ratio_is_invalid_input_not_a_panic() {
        let opp = opportunity(dec!(0.0000000000000000000001), dec!(100000000));
        assert!(opp.validate().is_ok());
        assert!(matches!(opp.roi_percent(dec!(0.07)), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn validate_rejects_non_positive_price() {
        let opp = opportunity(dec!(0), dec!(15.00));
        assert!(matches!(opp.validate(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn validate_rejects_non_finite_volatility() {
        let mut opp = opportunity(dec!(10), dec!(12));
        opp.price_volatility = Some(f64::NAN);
        assert!(opp.validate().is_err());
        opp.price_volatility = Some(0.12);
        assert!(opp.validate().is_ok());
    }

    #[test]
    fn risk_level_from_factor_tally() {
        assert_eq!(RiskLevel::from_factors(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_factors(2), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_factors(3), RiskLevel::High);
        assert_eq!(RiskLevel::from_factors(6), RiskLevel::VeryHigh);
    }

    #[test]
    fn game_parses_aliases() {
        assert_eq!("CS2".parse::<Game>().unwrap(), Game::Csgo);
        assert_eq!("dota2".parse::<Game>().unwrap(), Game::Dota2);
        assert!("minecraft".parse::<Game>().is_err());
    }
}
