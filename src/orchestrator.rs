// =============================================================================
// Orchestrator — Drives the fusion, snapshot and evaluation cycles
// =============================================================================
//
// One fusion cycle fans out across the asset universe concurrently; within an
// asset the five dimension fetches run concurrently, each under its own
// timeout. A failure anywhere skips only that asset for the cycle; the
// previous composite stays the latest-known value. Per-asset guards serialize
// reentrant triggers so a slow cycle can never double-fuse an asset.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::collaborators::{DimensionScorer, PriceFeed, RegimeIndicator};
use crate::errors::CollaboratorError;
use crate::fusion::{CompositeSignal, DimensionScore, FusionEngine};
use crate::history::HistoryStore;
use crate::performance::{AccuracyEvaluator, SnapshotScheduler};
use crate::portfolio::PortfolioAggregator;
use crate::runtime_config::RuntimeConfig;
use crate::types::Dimension;

pub struct Orchestrator {
    state: Arc<AppState>,
    scorer: Arc<dyn DimensionScorer>,
    prices: Arc<dyn PriceFeed>,
    regime: Arc<dyn RegimeIndicator>,
    asset_guards: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        state: Arc<AppState>,
        scorer: Arc<dyn DimensionScorer>,
        prices: Arc<dyn PriceFeed>,
        regime: Arc<dyn RegimeIndicator>,
    ) -> Self {
        Self {
            state,
            scorer,
            prices,
            regime,
            asset_guards: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn guard_for(&self, asset: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.asset_guards
            .lock()
            .entry(asset.to_string())
            .or_default()
            .clone()
    }

    // ── fusion cycle ─────────────────────────────────────────────────────

    /// Run one full fusion cycle over the configured universe. Returns the
    /// number of assets fused.
    pub async fn run_fusion_cycle(&self, now: DateTime<Utc>) -> usize {
        let config = self.state.config.read().clone();
        let engine = FusionEngine::from_config(&config);

        let indicator = match self.regime.fear_greed().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "fear/greed indicator unavailable this cycle");
                self.state.push_error("regime", &e);
                None
            }
        };

        let results = join_all(
            config
                .assets
                .iter()
                .map(|asset| self.fuse_asset(asset, &engine, &config)),
        )
        .await;
        let fused = results.iter().filter(|fused| **fused).count();

        // Roll the universe up from the ledger so skipped assets keep their
        // previous composite in the summary.
        match self.state.history.latest_composites(&config.assets) {
            Ok(latest) => {
                let aggregator = PortfolioAggregator::new(config.portfolio.clone());
                let summary = aggregator.summarize(&latest, indicator, now);
                *self.state.portfolio.write() = Some(summary);
            }
            Err(e) => {
                warn!(error = %e, "portfolio roll-up failed");
                self.state.push_error("portfolio", &e);
            }
        }

        *self.state.last_fusion_at.write() = Some(now);
        self.state.bump_version();

        info!(fused, total = config.assets.len(), "fusion cycle complete");
        fused
    }

    /// Fuse one asset; true when a new composite was appended.
    async fn fuse_asset(&self, asset: &str, engine: &FusionEngine, config: &RuntimeConfig) -> bool {
        let guard = self.guard_for(asset);
        let Ok(_held) = guard.try_lock() else {
            warn!(asset = %asset, "previous fusion still in flight, skipping");
            return false;
        };

        let scores = match self.fetch_dimensions(asset, config).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(asset = %asset, error = %e, "dimension fetch failed, skipping asset");
                self.state.push_error("fusion", format!("{asset}: {e}"));
                return false;
            }
        };

        let prev = match self.state.history.latest_composite(asset) {
            Ok(prev) => prev,
            Err(e) => {
                warn!(asset = %asset, error = %e, "previous composite lookup failed");
                self.state.push_error("history", format!("{asset}: {e}"));
                return false;
            }
        };

        let signal = match engine.fuse(asset, scores, prev.as_ref(), Utc::now()) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(asset = %asset, error = %e, "fusion rejected input, skipping asset");
                self.state.push_error("fusion", format!("{asset}: {e}"));
                return false;
            }
        };

        if let Err(e) = self.state.history.append_composite(&signal) {
            warn!(asset = %asset, error = %e, "composite append failed");
            self.state.push_error("history", format!("{asset}: {e}"));
            return false;
        }

        debug!(
            asset = %asset,
            score = signal.composite_score,
            label = %signal.label,
            "composite appended"
        );
        true
    }

    /// Fetch all five dimension scores concurrently, each under the
    /// per-collaborator timeout. Any failure fails the asset; a missing score
    /// is never silently defaulted.
    async fn fetch_dimensions(
        &self,
        asset: &str,
        config: &RuntimeConfig,
    ) -> Result<Vec<DimensionScore>, CollaboratorError> {
        let timeout = Duration::from_secs(config.collaborator_timeout_secs);

        let fetches = Dimension::ALL.map(|dimension| {
            let scorer = Arc::clone(&self.scorer);
            async move {
                match tokio::time::timeout(timeout, scorer.score(asset, dimension)).await {
                    Ok(result) => result,
                    Err(_) => Err(CollaboratorError::Timeout {
                        collaborator: format!("{dimension} scorer"),
                        timeout_secs: config.collaborator_timeout_secs,
                    }),
                }
            }
        });

        join_all(fetches).await.into_iter().collect()
    }

    // ── snapshot cycle ───────────────────────────────────────────────────

    /// Check every asset against the snapshot cadence and quota. Returns the
    /// number of snapshots captured.
    pub async fn run_snapshot_check(&self, now: DateTime<Utc>) -> usize {
        let config = self.state.config.read().clone();
        let scheduler = SnapshotScheduler::from_config(&config);

        let latest: HashMap<String, CompositeSignal> =
            match self.state.history.latest_composites(&config.assets) {
                Ok(latest) => latest,
                Err(e) => {
                    warn!(error = %e, "snapshot check could not read latest composites");
                    self.state.push_error("snapshot", &e);
                    return 0;
                }
            };

        let mut captured = 0;
        for (asset, signal) in &latest {
            match scheduler
                .maybe_snapshot(self.state.history.as_ref(), self.prices.as_ref(), asset, signal, now)
                .await
            {
                Ok(Some(_)) => captured += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(asset = %asset, error = %e, "snapshot attempt failed");
                    self.state.push_error("snapshot", format!("{asset}: {e}"));
                }
            }
        }

        *self.state.last_snapshot_check_at.write() = Some(now);
        if captured > 0 {
            self.state.bump_version();
            info!(captured, "snapshot check complete");
        }
        captured
    }

    // ── evaluation pass ──────────────────────────────────────────────────

    /// Grade all due snapshots. Returns the number of evaluations appended.
    pub async fn run_evaluation_pass(&self, now: DateTime<Utc>) -> usize {
        let config = self.state.config.read().clone();
        let evaluator = AccuracyEvaluator::from_config(&config);

        let appended = match evaluator
            .evaluate_due(self.state.history.as_ref(), self.prices.as_ref(), now)
            .await
        {
            Ok(evaluations) => evaluations.len(),
            Err(e) => {
                warn!(error = %e, "evaluation pass failed");
                self.state.push_error("evaluation", &e);
                0
            }
        };

        *self.state.last_evaluation_at.write() = Some(now);
        if appended > 0 {
            self.state.bump_version();
            info!(appended, "evaluation pass complete");
        }
        appended
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryStore, SqliteHistory};
    use crate::types::Direction;
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Scorer returning fixed per-dimension values, with optional per-asset
    /// failures on one dimension.
    struct MockScorer {
        base: f64,
        failing_assets: HashSet<String>,
    }

    impl MockScorer {
        fn healthy(base: f64) -> Self {
            Self {
                base,
                failing_assets: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl DimensionScorer for MockScorer {
        async fn score(
            &self,
            asset: &str,
            dimension: Dimension,
        ) -> Result<DimensionScore, CollaboratorError> {
            if dimension == Dimension::Narrative && self.failing_assets.contains(asset) {
                return Err(CollaboratorError::unavailable("narrative scorer", "down"));
            }
            Ok(DimensionScore {
                dimension,
                score: self.base,
                label: "test".to_string(),
                detail: None,
                weight: 0.0,
            })
        }
    }

    struct MockPrices;

    #[async_trait]
    impl PriceFeed for MockPrices {
        async fn spot_price(&self, _asset: &str) -> Result<f64, CollaboratorError> {
            Ok(100.0)
        }

        async fn price_at(
            &self,
            _asset: &str,
            _at: DateTime<Utc>,
        ) -> Result<Option<f64>, CollaboratorError> {
            Ok(Some(103.0))
        }
    }

    struct MockRegime(Option<f64>);

    #[async_trait]
    impl RegimeIndicator for MockRegime {
        async fn fear_greed(&self) -> Result<f64, CollaboratorError> {
            self.0
                .ok_or_else(|| CollaboratorError::unavailable("fear/greed index", "down"))
        }
    }

    fn small_config() -> RuntimeConfig {
        RuntimeConfig {
            assets: vec!["BTC".to_string(), "ETH".to_string()],
            ..RuntimeConfig::default()
        }
    }

    fn orchestrator(config: RuntimeConfig, scorer: MockScorer, regime: MockRegime) -> Orchestrator {
        let history = Arc::new(SqliteHistory::open_in_memory().unwrap());
        let state = AppState::new(config, history);
        Orchestrator::new(state, Arc::new(scorer), Arc::new(MockPrices), Arc::new(regime))
    }

    #[tokio::test]
    async fn fusion_cycle_appends_and_caches_summary() {
        let orch = orchestrator(small_config(), MockScorer::healthy(65.0), MockRegime(Some(50.0)));

        let fused = orch.run_fusion_cycle(Utc::now()).await;
        assert_eq!(fused, 2);

        let latest = orch.state.history.latest_composite("BTC").unwrap().unwrap();
        assert!((latest.composite_score - 65.0).abs() < 1e-9);
        assert_eq!(latest.label, "MODERATE BUY");
        assert!(latest.momentum.is_none());

        let summary = orch.state.portfolio.read().clone().unwrap();
        assert_eq!(summary.assets_scored, 2);
        assert_eq!(summary.market_regime, "neutral");
        assert!(orch.state.version() > 0);
        assert!(orch.state.last_fusion_at.read().is_some());
    }

    #[tokio::test]
    async fn second_cycle_carries_momentum() {
        let orch = orchestrator(small_config(), MockScorer::healthy(65.0), MockRegime(Some(50.0)));
        orch.run_fusion_cycle(Utc::now()).await;

        // Raise the base score so the next cycle reads improving.
        let orch2 = Orchestrator::new(
            Arc::clone(&orch.state),
            Arc::new(MockScorer::healthy(70.0)),
            Arc::new(MockPrices),
            Arc::new(MockRegime(Some(50.0))),
        );
        orch2.run_fusion_cycle(Utc::now()).await;

        let latest = orch2.state.history.latest_composite("BTC").unwrap().unwrap();
        assert_eq!(latest.momentum, Some(crate::types::Momentum::Improving));
        assert_eq!(latest.prev_score, Some(65.0));
    }

    #[tokio::test]
    async fn one_failing_dimension_skips_only_that_asset() {
        let scorer = MockScorer {
            base: 65.0,
            failing_assets: ["BTC".to_string()].into_iter().collect(),
        };
        let orch = orchestrator(small_config(), scorer, MockRegime(Some(50.0)));

        let fused = orch.run_fusion_cycle(Utc::now()).await;
        assert_eq!(fused, 1);
        assert!(orch.state.history.latest_composite("BTC").unwrap().is_none());
        assert!(orch.state.history.latest_composite("ETH").unwrap().is_some());

        let errors = orch.state.recent_errors();
        assert!(errors.iter().any(|e| e.component == "fusion" && e.message.contains("BTC")));
    }

    #[tokio::test]
    async fn missing_indicator_yields_unknown_regime() {
        let orch = orchestrator(small_config(), MockScorer::healthy(65.0), MockRegime(None));
        orch.run_fusion_cycle(Utc::now()).await;

        let summary = orch.state.portfolio.read().clone().unwrap();
        assert_eq!(summary.market_regime, "unknown");
        assert_eq!(summary.risk_level, "unknown");
    }

    #[tokio::test]
    async fn snapshot_check_then_evaluation_end_to_end() {
        let orch = orchestrator(small_config(), MockScorer::healthy(65.0), MockRegime(Some(50.0)));
        let now = Utc::now();
        orch.run_fusion_cycle(now).await;

        let captured = orch.run_snapshot_check(now).await;
        assert_eq!(captured, 2);
        // Same instant again: cadence gate holds.
        assert_eq!(orch.run_snapshot_check(now).await, 0);

        // A day later every snapshot is due at 24h; MockPrices says +3%,
        // a hit for the bullish MODERATE BUY calls.
        let later = now + chrono::Duration::hours(25);
        let appended = orch.run_evaluation_pass(later).await;
        assert_eq!(appended, 2);

        let rep = crate::performance::compute_reputation(
            orch.state.history.as_ref(),
            30,
            later,
        )
        .unwrap();
        assert_eq!(rep.signals_evaluated, 2);
        assert_eq!(rep.signals_correct, 2);
        assert_eq!(rep.status, "ok");
    }
}
