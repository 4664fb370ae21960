// =============================================================================
// Nimbus Signals — Multi-source crypto signal fusion with self-evaluation
// =============================================================================
//
// Fuses five externally-scored dimensions (whale, technical, derivatives,
// narrative, market) into one composite signal per asset, snapshots its own
// predictions, and grades them against realized price at 24h/48h/7d horizons.
// Three independent loops (fusion, snapshot check, evaluation) plus a
// read-only HTTP surface.

mod api;
mod app_state;
mod collaborators;
mod errors;
mod fusion;
mod history;
mod orchestrator;
mod performance;
mod portfolio;
mod runtime_config;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::collaborators::{FearGreedClient, HttpDimensionScorer, PriceClient};
use crate::history::SqliteHistory;
use crate::orchestrator::Orchestrator;
use crate::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("starting nimbus-signals v{}", env!("CARGO_PKG_VERSION"));

    // ── configuration ────────────────────────────────────────────────────
    let mut config = match RuntimeConfig::load(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "runtime config not loaded, writing defaults");
            let config = RuntimeConfig::default();
            config
                .save(CONFIG_PATH)
                .context("writing default runtime config")?;
            config
        }
    };

    if let Ok(assets) = std::env::var("NIMBUS_ASSETS") {
        config.assets = assets
            .split(',')
            .map(|a| a.trim().to_ascii_uppercase())
            .filter(|a| !a.is_empty())
            .collect();
        info!(assets = config.assets.len(), "asset universe overridden from env");
    }
    if let Ok(db_path) = std::env::var("NIMBUS_DB_PATH") {
        config.db_path = db_path;
    }

    config.validate().context("invalid runtime configuration")?;

    // ── wiring ───────────────────────────────────────────────────────────
    let history = Arc::new(SqliteHistory::open(&config.db_path)?);
    let scorer = Arc::new(HttpDimensionScorer::new(
        config.scorer_base_url.clone(),
        config.collaborator_timeout_secs,
    ));
    let prices = Arc::new(PriceClient::new(config.collaborator_timeout_secs));
    let regime = Arc::new(FearGreedClient::new(config.collaborator_timeout_secs));

    let fusion_interval = config.fusion_interval_secs;
    let snapshot_interval = config.snapshot_check_interval_secs;
    let evaluation_interval = config.evaluation_interval_secs;

    let state = AppState::new(config, history);
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&state),
        scorer,
        prices,
        regime,
    ));

    // ── periodic loops ───────────────────────────────────────────────────
    {
        let orch = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(fusion_interval));
            loop {
                interval.tick().await;
                orch.run_fusion_cycle(Utc::now()).await;
            }
        });
    }

    {
        let orch = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(snapshot_interval));
            loop {
                interval.tick().await;
                orch.run_snapshot_check(Utc::now()).await;
            }
        });
    }

    {
        let orch = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(evaluation_interval));
            loop {
                interval.tick().await;
                orch.run_evaluation_pass(Utc::now()).await;
            }
        });
    }

    // ── HTTP surface ─────────────────────────────────────────────────────
    let bind_addr =
        std::env::var("NIMBUS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8090".to_string());
    let router = api::build_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding API listener on {bind_addr}"))?;
    info!(addr = %bind_addr, "API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("API server error")?;

    // Persist any config mutated at runtime before exit.
    let config = state.config.read().clone();
    if let Err(e) = config.save(CONFIG_PATH) {
        warn!(error = %e, "failed to save runtime config on shutdown");
    }

    info!("nimbus-signals stopped");
    Ok(())
}
