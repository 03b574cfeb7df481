use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::{Config, FETCH_TIMEOUT_SECS};
use crate::error::Result;
use crate::types::{CandidateFacts, Game, IndicatorQuote};

/// Where prices come from. Implementations return `Ok(None)` when the feed
/// simply has nothing for the item; `Err` is reserved for transport failures.
/// Callers treat both as "skip this item".
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn indicator_snapshot(&self, game: Game, item_name: &str) -> Result<Option<IndicatorQuote>>;

    async fn candidate_facts(&self, game: Game, item_name: &str) -> Result<Option<CandidateFacts>>;
}

/// JSON price feed over HTTP:
/// `GET {base}/quote?game=..&item=..` and `GET {base}/stats?game=..&item=..`.
pub struct HttpPriceSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    price: rust_decimal::Decimal,
    volume: u64,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    current_price: rust_decimal::Decimal,
    current_volume: u64,
    avg_price_7d: rust_decimal::Decimal,
    avg_volume_7d: rust_decimal::Decimal,
}

impl HttpPriceSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.price_feed_url.clone())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        game: Game,
        item_name: &str,
    ) -> Result<Option<T>> {
        let url = format!("{}/{endpoint}", self.base_url);
        let game = game.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[("game", game.as_str()), ("item", item_name)])
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(item = %item_name, endpoint, "price feed has no data");
            return Ok(None);
        }
        let body = resp.error_for_status()?.json::<T>().await?;
        Ok(Some(body))
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn indicator_snapshot(&self, game: Game, item_name: &str) -> Result<Option<IndicatorQuote>> {
        let quote = self.get_json::<QuoteResponse>("quote", game, item_name).await?;
        Ok(quote.map(|q| IndicatorQuote { price: q.price, volume: q.volume }))
    }

    async fn candidate_facts(&self, game: Game, item_name: &str) -> Result<Option<CandidateFacts>> {
        let stats = self.get_json::<StatsResponse>("stats", game, item_name).await?;
        Ok(stats.map(|s| CandidateFacts {
            current_price: s.current_price,
            current_volume: s.current_volume,
            avg_price_7d: s.avg_price_7d,
            avg_volume_7d: s.avg_volume_7d,
        }))
    }
}
