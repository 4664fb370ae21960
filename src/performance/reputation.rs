// =============================================================================
// Reputation Score — Rolling-window roll-up of evaluation outcomes
// =============================================================================
//
// Recomputed from raw evaluation rows on every read instead of keeping
// incremental counters, so deferred or out-of-order evaluations can never
// drift the aggregate. The window keys on snapshot capture time, never on
// evaluation time.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::HistoryError;
use crate::history::HistoryStore;

/// Hit-rate over one slice (a horizon or an asset) of the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketStats {
    pub evaluated: u64,
    pub correct: u64,
    /// One decimal place.
    pub accuracy_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationScore {
    /// "ok" once at least one evaluation exists, else "collecting_data".
    pub status: String,
    /// Overall accuracy rounded to an integer in [0, 100].
    pub reputation_score: u32,
    /// Overall accuracy at one decimal place.
    pub accuracy_30d: f64,
    pub signals_evaluated: u64,
    pub signals_correct: u64,
    pub window_days: i64,
    pub by_timeframe: BTreeMap<String, BucketStats>,
    pub by_asset: BTreeMap<String, BucketStats>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn bucket(evaluated: u64, correct: u64) -> BucketStats {
    let accuracy_pct = if evaluated == 0 {
        0.0
    } else {
        round1(correct as f64 / evaluated as f64 * 100.0)
    };
    BucketStats {
        evaluated,
        correct,
        accuracy_pct,
    }
}

/// Compute the engine's reputation over the rolling window ending at `now`.
pub fn compute_reputation(
    store: &dyn HistoryStore,
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<ReputationScore, HistoryError> {
    let from = now - Duration::days(window_days);
    let evaluations = store.evaluations_in_window(from, now)?;

    let mut by_timeframe: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    let mut by_asset: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    let mut total: u64 = 0;
    let mut correct: u64 = 0;

    for evaluation in &evaluations {
        total += 1;
        let hit = u64::from(evaluation.hit);
        correct += hit;

        let tf = by_timeframe
            .entry(evaluation.horizon.as_str().to_string())
            .or_insert((0, 0));
        tf.0 += 1;
        tf.1 += hit;

        let asset = by_asset.entry(evaluation.asset.clone()).or_insert((0, 0));
        asset.0 += 1;
        asset.1 += hit;
    }

    let accuracy_30d = if total == 0 {
        0.0
    } else {
        round1(correct as f64 / total as f64 * 100.0)
    };

    Ok(ReputationScore {
        status: if total == 0 { "collecting_data" } else { "ok" }.to_string(),
        reputation_score: accuracy_30d.round() as u32,
        accuracy_30d,
        signals_evaluated: total,
        signals_correct: correct,
        window_days,
        by_timeframe: by_timeframe
            .into_iter()
            .map(|(k, (n, c))| (k, bucket(n, c)))
            .collect(),
        by_asset: by_asset
            .into_iter()
            .map(|(k, (n, c))| (k, bucket(n, c)))
            .collect(),
    })
}

/// Per-asset slice of the same window, for the per-asset read endpoint.
pub fn asset_accuracy(
    store: &dyn HistoryStore,
    asset: &str,
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<Option<BucketStats>, HistoryError> {
    let from = now - Duration::days(window_days);
    let evaluations = store.evaluations_in_window(from, now)?;

    let mut evaluated = 0;
    let mut correct = 0;
    for evaluation in evaluations.iter().filter(|e| e.asset == asset) {
        evaluated += 1;
        correct += u64::from(evaluation.hit);
    }
    if evaluated == 0 {
        return Ok(None);
    }
    Ok(Some(bucket(evaluated, correct)))
}
