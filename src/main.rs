use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use item_arbitrage::api::health::HostHealth;
use item_arbitrage::api::latency::LatencyStats;
use item_arbitrage::api::routes::{router, ApiState};
use item_arbitrage::config::{ArbitrageConfig, Config};
use item_arbitrage::detector::MarketMonitor;
use item_arbitrage::error::Result;
use item_arbitrage::fetcher::HttpPriceSource;
use item_arbitrage::pipeline::Evaluator;
use item_arbitrage::state::{HealthBoard, PriceHistory};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    let arbitrage = match ArbitrageConfig::load(cfg.arbitrage_config_path.as_deref()) {
        Ok(a) => a,
        Err(e) => {
            error!("Arbitrage config rejected: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cfg, arbitrage).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config, arbitrage: ArbitrageConfig) -> Result<()> {
    match cfg.arbitrage_config_path.as_deref() {
        Some(path) => info!("Arbitrage config loaded from {path}"),
        None => warn!("ARBITRAGE_CONFIG not set, using built-in defaults"),
    }
    info!(
        "Monitoring {} market(s) | refresh: {}s | concurrency: {} | feed: {}",
        arbitrage.markets.len(),
        cfg.refresh_interval_secs,
        cfg.scan_concurrency,
        cfg.price_feed_url,
    );

    let evaluator = Arc::new(Evaluator::from_config(&arbitrage)?);
    let arbitrage = Arc::new(arbitrage);

    // --- Shared state ---
    let history = PriceHistory::new(cfg.history_capacity());
    info!("Price history holds {} snapshots per item", history.capacity());
    let board = HealthBoard::new();
    let host = Arc::new(HostHealth::new());
    let cycle_latency = Arc::new(LatencyStats::new());
    let batch_latency = Arc::new(LatencyStats::new());

    // --- Market monitor (first cycle runs immediately) ---
    let source = Arc::new(HttpPriceSource::from_config(&cfg)?);
    let monitor = Arc::new(MarketMonitor::new(
        Arc::clone(&arbitrage),
        source,
        Arc::clone(&history),
        Arc::clone(&board),
        Arc::clone(&host),
        Arc::clone(&cycle_latency),
        cfg.scan_concurrency,
    ));
    let interval_secs = cfg.refresh_interval_secs;
    tokio::spawn(Arc::clone(&monitor).run(interval_secs));

    // --- HTTP API server ---
    let api_state = ApiState {
        monitor,
        board,
        history,
        evaluator,
        host,
        cycle_latency,
        batch_latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
