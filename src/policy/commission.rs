use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::{AppError, Result};
use crate::types::{ProfitBreakdown, TradeOpportunity};

/// Fixed per-platform sell commission, keyed by lower-cased platform name.
#[derive(Debug, Clone)]
pub struct CommissionTable {
    rates: HashMap<String, Decimal>,
}

impl CommissionTable {
    pub fn new(rates: &HashMap<String, Decimal>) -> Self {
        Self {
            rates: rates
                .iter()
                .map(|(platform, rate)| (platform.trim().to_lowercase(), *rate))
                .collect(),
        }
    }

    pub fn rate(&self, platform: &str) -> Result<Decimal> {
        self.rates
            .get(&platform.trim().to_lowercase())
            .copied()
            .ok_or_else(|| AppError::UnknownPlatform(platform.to_string()))
    }

    /// Profit figures net of the destination platform's commission.
    pub fn breakdown(&self, opp: &TradeOpportunity) -> Result<ProfitBreakdown> {
        let rate = self.rate(&opp.platform_sell)?;
        Ok(ProfitBreakdown {
            commission_rate: rate,
            gross_profit: opp.gross_profit()?,
            net_profit: opp.net_profit(rate)?,
            roi_percent: opp.roi_percent(rate)?,
        })
    }
}

impl Default for CommissionTable {
    fn default() -> Self {
        Self::new(&crate::config::ArbitrageConfig::default().commissions)
    }
}
