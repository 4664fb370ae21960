// =============================================================================
// REST API — Read-only public surface over the engine's state
// =============================================================================
//
// Everything here reads AppState or the ledger; nothing mutates. CORS is
// permissive because the surface is public and read-only. Failures degrade to
// "no signal available" rather than taking the aggregate surface down.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::app_state::AppState;
use crate::history::HistoryStore;
use crate::performance::{asset_accuracy, compute_reputation};

const MAX_PAGE_SIZE: u32 = 200;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/signal", get(all_signals))
        .route("/api/v1/signal/:asset", get(asset_signal))
        .route("/api/v1/performance/reputation", get(reputation))
        .route("/api/v1/performance/:asset", get(asset_performance))
        .route("/api/v1/history/signals", get(signal_history))
        .route("/api/v1/history/evaluations", get(evaluation_history))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal error" })),
    )
        .into_response()
}

// ── handlers ─────────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let now = Utc::now();
    let errors = state.recent_errors();

    Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime_secs(now),
        "state_version": state.version(),
        "components": {
            "fusion": { "last_run_at": *state.last_fusion_at.read() },
            "snapshots": { "last_check_at": *state.last_snapshot_check_at.read() },
            "evaluation": { "last_run_at": *state.last_evaluation_at.read() },
        },
        "recent_errors": errors.len(),
        "last_error": errors.last(),
    }))
    .into_response()
}

async fn all_signals(State(state): State<Arc<AppState>>) -> Response {
    let assets = state.config.read().assets.clone();
    let latest = match state.history.latest_composites(&assets) {
        Ok(latest) => latest,
        Err(e) => return internal_error(e),
    };
    let portfolio = state.portfolio.read().clone();

    Json(json!({
        "portfolio": portfolio,
        "signals": latest,
    }))
    .into_response()
}

async fn asset_signal(
    State(state): State<Arc<AppState>>,
    Path(asset): Path<String>,
) -> Response {
    let asset = asset.to_ascii_uppercase();
    let assets = state.config.read().assets.clone();

    if !assets.iter().any(|a| *a == asset) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("unknown asset '{asset}'"),
                "valid_assets": assets,
            })),
        )
            .into_response();
    }

    let signal = match state.history.latest_composite(&asset) {
        Ok(signal) => signal,
        Err(e) => return internal_error(e),
    };
    let Some(signal) = signal else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no signal available for {asset} yet") })),
        )
            .into_response();
    };

    let (market_regime, risk_level) = state
        .portfolio
        .read()
        .as_ref()
        .map(|p| (p.market_regime.clone(), p.risk_level.clone()))
        .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));

    Json(json!({
        "signal": signal,
        "market_context": {
            "market_regime": market_regime,
            "risk_level": risk_level,
        },
    }))
    .into_response()
}

async fn reputation(State(state): State<Arc<AppState>>) -> Response {
    let window_days = state.config.read().reputation_window_days;
    match compute_reputation(state.history.as_ref(), window_days, Utc::now()) {
        Ok(score) => Json(score).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn asset_performance(
    State(state): State<Arc<AppState>>,
    Path(asset): Path<String>,
) -> Response {
    let asset = asset.to_ascii_uppercase();
    let window_days = state.config.read().reputation_window_days;

    match asset_accuracy(state.history.as_ref(), &asset, window_days, Utc::now()) {
        Ok(Some(stats)) => Json(json!({
            "asset": asset,
            "window_days": window_days,
            "accuracy": stats,
        }))
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no evaluated signals for {asset} in the window") })),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
    asset: Option<String>,
}

fn default_limit() -> u32 {
    50
}

async fn signal_history(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
) -> Response {
    let limit = page.limit.min(MAX_PAGE_SIZE);
    let asset = page.asset.map(|a| a.to_ascii_uppercase());

    match state
        .history
        .composites_page(asset.as_deref(), limit, page.offset)
    {
        Ok((signals, total)) => Json(json!({
            "total": total,
            "limit": limit,
            "offset": page.offset,
            "signals": signals,
        }))
        .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn evaluation_history(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
) -> Response {
    let limit = page.limit.min(MAX_PAGE_SIZE);
    let asset = page.asset.map(|a| a.to_ascii_uppercase());

    match state
        .history
        .evaluations_page(asset.as_deref(), limit, page.offset)
    {
        Ok((evaluations, total)) => Json(json!({
            "total": total,
            "limit": limit,
            "offset": page.offset,
            "evaluations": evaluations,
        }))
        .into_response(),
        Err(e) => internal_error(e),
    }
}
