// =============================================================================
// Accuracy Evaluator — Grades matured snapshots against realized price
// =============================================================================
//
// A (snapshot, horizon) pair becomes due once the horizon has elapsed since
// capture. Each pair is graded at most once; the ledger's UNIQUE constraint
// plus the due query make the pass idempotent. A realized price that is not
// yet available defers the pair to the next pass, it is never scored as a
// miss.
//
// Hit rule (band configurable, default ±2%):
//   bullish  -> move >  +band
//   bearish  -> move <  -band
//   neutral  -> |move| <= band

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::collaborators::PriceFeed;
use crate::history::HistoryStore;
use crate::performance::{PerformanceEvaluation, PerformanceSnapshot};
use crate::runtime_config::RuntimeConfig;
use crate::types::{Direction, Horizon};

pub struct AccuracyEvaluator {
    neutral_band_pct: f64,
}

impl AccuracyEvaluator {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            neutral_band_pct: config.neutral_band_pct,
        }
    }

    /// Grade every due (snapshot, horizon) pair. Returns the evaluations
    /// actually appended this pass.
    pub async fn evaluate_due(
        &self,
        store: &dyn HistoryStore,
        prices: &dyn PriceFeed,
        now: DateTime<Utc>,
    ) -> Result<Vec<PerformanceEvaluation>> {
        let mut appended = Vec::new();

        for horizon in Horizon::ALL {
            let due = store
                .due_snapshots(horizon, now)
                .with_context(|| format!("due-snapshot query at {horizon}"))?;

            for snapshot in due {
                match self.evaluate_one(prices, &snapshot, horizon, now).await {
                    Ok(Some(evaluation)) => {
                        if store
                            .append_evaluation(&evaluation)
                            .with_context(|| {
                                format!("persisting evaluation {}@{horizon}", snapshot.id)
                            })?
                        {
                            info!(
                                asset = %evaluation.asset,
                                horizon = %horizon,
                                move_pct = evaluation.price_move_pct,
                                hit = evaluation.hit,
                                "snapshot evaluated"
                            );
                            appended.push(evaluation);
                        }
                    }
                    Ok(None) => {
                        debug!(
                            asset = %snapshot.asset,
                            snapshot_id = %snapshot.id,
                            horizon = %horizon,
                            "realized price not yet available, deferring"
                        );
                    }
                    Err(e) => {
                        warn!(
                            asset = %snapshot.asset,
                            horizon = %horizon,
                            error = %e,
                            "evaluation deferred on price feed failure"
                        );
                    }
                }
            }
        }

        Ok(appended)
    }

    async fn evaluate_one(
        &self,
        prices: &dyn PriceFeed,
        snapshot: &PerformanceSnapshot,
        horizon: Horizon,
        now: DateTime<Utc>,
    ) -> Result<Option<PerformanceEvaluation>> {
        if snapshot.reference_price <= 0.0 {
            // Cannot compute a move from a zero reference; leave a trace and
            // skip permanently rather than divide by zero.
            warn!(
                asset = %snapshot.asset,
                snapshot_id = %snapshot.id,
                "snapshot has non-positive reference price, skipping"
            );
            return Ok(None);
        }

        let target = snapshot.captured_at + horizon.duration();
        let Some(realized_price) = prices
            .price_at(&snapshot.asset, target)
            .await
            .with_context(|| format!("realized price for {} at {target}", snapshot.asset))?
        else {
            return Ok(None);
        };

        let price_move_pct =
            (realized_price - snapshot.reference_price) / snapshot.reference_price * 100.0;
        let hit = self.is_hit(snapshot.predicted_direction, price_move_pct);

        Ok(Some(PerformanceEvaluation {
            snapshot_id: snapshot.id.clone(),
            asset: snapshot.asset.clone(),
            horizon,
            predicted_direction: snapshot.predicted_direction,
            captured_at: snapshot.captured_at,
            evaluated_at: now,
            realized_price,
            price_move_pct,
            hit,
        }))
    }

    fn is_hit(&self, predicted: Direction, move_pct: f64) -> bool {
        let band = self.neutral_band_pct;
        match predicted {
            Direction::Bullish => move_pct > band,
            Direction::Bearish => move_pct < -band,
            Direction::Neutral => move_pct.abs() <= band,
        }
    }
}
