// =============================================================================
// Self-evaluation: snapshots, accuracy evaluation, reputation
// =============================================================================
//
// The engine grades its own predictions. A snapshot freezes one prediction
// (direction + reference price); evaluations check it against realized price
// at fixed horizons; the reputation score rolls evaluations up over a 30-day
// window.

pub mod evaluator;
pub mod reputation;
pub mod snapshot;

pub use evaluator::AccuracyEvaluator;
pub use reputation::{asset_accuracy, compute_reputation, BucketStats, ReputationScore};
pub use snapshot::SnapshotScheduler;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Direction, Horizon};

/// A frozen prediction awaiting evaluation. At most one per asset per cadence
/// tick; the reference price is sampled at capture time, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// UUID v4.
    pub id: String,
    pub asset: String,
    pub captured_at: DateTime<Utc>,
    pub predicted_direction: Direction,
    /// Composite score at capture time.
    pub reference_score: f64,
    pub reference_price: f64,
}

/// One snapshot graded at one horizon. Snapshot fields are denormalised in so
/// that reputation rolls up from evaluation rows alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceEvaluation {
    pub snapshot_id: String,
    pub asset: String,
    pub horizon: Horizon,
    pub predicted_direction: Direction,
    /// Capture time of the underlying snapshot (reputation windows key on
    /// this, never on `evaluated_at`).
    pub captured_at: DateTime<Utc>,
    pub evaluated_at: DateTime<Utc>,
    pub realized_price: f64,
    /// Price move as a percentage (+3.0 means +3%).
    pub price_move_pct: f64,
    pub hit: bool,
}
