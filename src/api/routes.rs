use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::health::HostHealth;
use crate::api::latency::{LatencyStats, LatencySummary};
use crate::detector::MarketMonitor;
use crate::error::AppError;
use crate::pipeline::{BatchReport, Evaluator, OpportunityRequest};
use crate::state::{HealthBoard, PriceHistory};
use crate::types::{AnomalyCandidate, Game, MarketHealth};

#[derive(Clone)]
pub struct ApiState {
    pub monitor: Arc<MarketMonitor>,
    pub board: Arc<HealthBoard>,
    pub history: Arc<PriceHistory>,
    pub evaluator: Arc<Evaluator>,
    pub host: Arc<HostHealth>,
    pub cycle_latency: Arc<LatencyStats>,
    pub batch_latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/cycle", post(post_cycle))
        .route("/markets/:game/health", get(get_market_health))
        .route("/opportunities/evaluate", post(post_evaluate))
        .route("/anomalies/scan", post(post_anomaly_scan))
        .route("/anomalies/:game", get(get_anomalies))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct EvaluateRequest {
    pub game: Game,
    pub opportunities: Vec<OpportunityRequest>,
}

#[derive(Deserialize)]
pub struct AnomalyScanRequest {
    pub game: Game,
    pub items: Vec<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cycle_running: bool,
    pub cycles_completed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub batches_evaluated: u64,
    pub tracked_items: usize,
    pub games: Vec<Game>,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub cycle: LatencySummary,
    pub batch: LatencySummary,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cycle_running: state.host.cycle_running(),
        cycles_completed: state.host.cycles_completed(),
        last_cycle_at: state.host.last_cycle_at(),
        batches_evaluated: state.host.batches_evaluated(),
        tracked_items: state.history.item_count(),
        games: state.board.games(),
    })
}

async fn post_cycle(State(state): State<ApiState>) -> Result<Json<Vec<MarketHealth>>, AppError> {
    let published = state.monitor.run_cycle().await?;
    Ok(Json(published.iter().map(|h| MarketHealth::clone(h)).collect()))
}

async fn get_market_health(
    State(state): State<ApiState>,
    Path(game): Path<String>,
) -> Result<Json<MarketHealth>, AppError> {
    let game: Game = game.parse()?;
    let health = state
        .board
        .current(game)
        .ok_or_else(|| AppError::NotFound(format!("no market health published for {game}")))?;
    Ok(Json(MarketHealth::clone(&health)))
}

async fn post_evaluate(
    State(state): State<ApiState>,
    Json(body): Json<EvaluateRequest>,
) -> Result<Json<BatchReport>, AppError> {
    if body.opportunities.is_empty() {
        return Err(AppError::InvalidInput("opportunities must not be empty".to_string()));
    }

    let started = Instant::now();
    // Before the first cycle lands, evaluate against a neutral verdict.
    let health = state.board.current(body.game).unwrap_or_else(|| {
        let total = state
            .monitor
            .config()
            .market(body.game)
            .map(|m| m.indicators.len())
            .unwrap_or(0);
        Arc::new(MarketHealth::unknown(body.game, total, Utc::now()))
    });

    let report = state
        .evaluator
        .evaluate_batch(body.opportunities, &health, &state.history);

    state.batch_latency.record(started.elapsed());
    state.host.inc_batches_evaluated();
    Ok(Json(report))
}

async fn post_anomaly_scan(
    State(state): State<ApiState>,
    Json(body): Json<AnomalyScanRequest>,
) -> Json<Vec<AnomalyCandidate>> {
    Json(state.monitor.scan_anomalies(body.game, &body.items).await)
}

async fn get_anomalies(
    State(state): State<ApiState>,
    Path(game): Path<String>,
) -> Result<Json<Vec<AnomalyCandidate>>, AppError> {
    let game: Game = game.parse()?;
    let anomalies = state
        .board
        .anomalies(game)
        .ok_or_else(|| AppError::NotFound(format!("no anomaly scan recorded for {game}")))?;
    Ok(Json(anomalies.as_ref().clone()))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    Json(LatencyResponse {
        cycle: state.cycle_latency.summary(),
        batch: state.batch_latency.summary(),
    })
}
