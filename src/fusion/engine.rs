// =============================================================================
// Fusion Engine — Weighted composite of the five dimension scores
// =============================================================================
//
// The engine is pure: it takes one score per dimension plus the asset's
// previous composite (if any) and produces a CompositeSignal. Persistence and
// collaborator IO belong to the orchestrator.
//
// composite = round1(Σ score × weight), weights fixed from config and summing
// to 1.0. A missing, duplicated, or out-of-range score is a typed error, never
// silently defaulted; substituting a default would corrupt the weighted sum.
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::FusionError;
use crate::runtime_config::{DimensionWeights, LabelBand, RuntimeConfig};
use crate::types::{Dimension, Direction, Momentum};

// =============================================================================
// Data model
// =============================================================================

/// One dimension's contribution to an asset's composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    /// Raw score in [0, 100].
    pub score: f64,
    /// Scorer-provided human label ("accumulating", "oversold", ...).
    pub label: String,
    /// Optional scorer detail line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Fusion weight applied, stamped in by the engine.
    #[serde(default)]
    pub weight: f64,
}

/// Fused signal for one asset at one instant. Appended to the ledger, never
/// mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeSignal {
    pub asset: String,
    pub timestamp: DateTime<Utc>,
    /// Weighted composite in [0, 100], one decimal place.
    pub composite_score: f64,
    pub label: String,
    pub direction: Direction,
    /// Trend vs. the previous composite; absent on the asset's first run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub momentum: Option<Momentum>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_score: Option<f64>,
    pub dimensions: Vec<DimensionScore>,
    /// Optional narrative insight from an external collaborator. The fusion
    /// path itself never fills this; it is carried and persisted so an
    /// enrichment step can attach one before the append without a schema
    /// change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_insight: Option<String>,
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug, Clone)]
pub struct FusionEngine {
    weights: DimensionWeights,
    bands: Vec<LabelBand>,
    momentum_epsilon: f64,
}

impl FusionEngine {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            bands: config.label_bands.clone(),
            momentum_epsilon: config.momentum_epsilon,
        }
    }

    /// Fuse one asset's dimension scores into a composite signal.
    ///
    /// Requires exactly one score per dimension, each in [0, 100]. The weight
    /// on each incoming score is ignored and re-stamped from config.
    pub fn fuse(
        &self,
        asset: &str,
        scores: Vec<DimensionScore>,
        prev: Option<&CompositeSignal>,
        now: DateTime<Utc>,
    ) -> Result<CompositeSignal, FusionError> {
        let mut by_dimension: HashMap<Dimension, DimensionScore> = HashMap::new();
        for score in scores {
            if by_dimension.contains_key(&score.dimension) {
                return Err(FusionError::DuplicateDimension(score.dimension));
            }
            if !score.score.is_finite() || !(0.0..=100.0).contains(&score.score) {
                return Err(FusionError::ScoreOutOfRange {
                    dimension: score.dimension,
                    score: score.score,
                });
            }
            by_dimension.insert(score.dimension, score);
        }

        let mut dimensions = Vec::with_capacity(Dimension::ALL.len());
        let mut weighted_sum = 0.0;
        for dim in Dimension::ALL {
            let mut score = by_dimension
                .remove(&dim)
                .ok_or(FusionError::MissingDimension(dim))?;
            score.weight = self.weights.weight(dim);
            weighted_sum += score.score * score.weight;
            dimensions.push(score);
        }

        let composite = (weighted_sum * 10.0).round() / 10.0;
        let composite = composite.clamp(0.0, 100.0);

        let band = self.classify(composite);
        let (prev_score, momentum) = match prev {
            Some(prev) => (
                Some(prev.composite_score),
                Some(self.momentum(composite, prev.composite_score)),
            ),
            None => (None, None),
        };

        debug!(
            asset = %asset,
            composite,
            label = %band.name,
            ?momentum,
            "fused composite signal"
        );

        Ok(CompositeSignal {
            asset: asset.to_string(),
            timestamp: now,
            composite_score: composite,
            label: band.name.clone(),
            direction: band.direction,
            momentum,
            prev_score,
            dimensions,
            llm_insight: None,
        })
    }

    /// First band whose min_score the composite reaches; the table is
    /// descending, so boundary scores land in the higher band.
    fn classify(&self, score: f64) -> &LabelBand {
        self.bands
            .iter()
            .find(|band| score >= band.min_score)
            .unwrap_or_else(|| {
                // Config validation guarantees coverage of 0 and the composite
                // is clamped to [0, 100], so this is unreachable in practice.
                &self.bands[self.bands.len() - 1]
            })
    }

    fn momentum(&self, current: f64, previous: f64) -> Momentum {
        let delta = current - previous;
        if delta.abs() <= self.momentum_epsilon {
            Momentum::Stable
        } else if delta > 0.0 {
            Momentum::Improving
        } else {
            Momentum::Degrading
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FusionEngine {
        FusionEngine::from_config(&RuntimeConfig::default())
    }

    fn score(dimension: Dimension, value: f64) -> DimensionScore {
        DimensionScore {
            dimension,
            score: value,
            label: "test".to_string(),
            detail: None,
            weight: 0.0,
        }
    }

    fn full_set(whale: f64, technical: f64, derivatives: f64, narrative: f64, market: f64) -> Vec<DimensionScore> {
        vec![
            score(Dimension::Whale, whale),
            score(Dimension::Technical, technical),
            score(Dimension::Derivatives, derivatives),
            score(Dimension::Narrative, narrative),
            score(Dimension::Market, market),
        ]
    }

    #[test]
    fn weighted_composite_moderate_sell() {
        // 7.9*.30 + 35.2*.25 + 25*.20 + 63.5*.15 + 60*.10 = 31.695 -> 31.7
        let signal = engine()
            .fuse("BTC", full_set(7.9, 35.2, 25.0, 63.5, 60.0), None, Utc::now())
            .unwrap();
        assert!((signal.composite_score - 31.7).abs() < 1e-9);
        assert_eq!(signal.label, "MODERATE SELL");
        assert_eq!(signal.direction, Direction::Bearish);
        assert!(signal.momentum.is_none());
        assert!(signal.prev_score.is_none());
    }

    #[test]
    fn dimension_weights_stamped_from_config() {
        let signal = engine()
            .fuse("ETH", full_set(50.0, 50.0, 50.0, 50.0, 50.0), None, Utc::now())
            .unwrap();
        let whale = signal
            .dimensions
            .iter()
            .find(|d| d.dimension == Dimension::Whale)
            .unwrap();
        assert!((whale.weight - 0.30).abs() < 1e-12);
        assert!((signal.composite_score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn boundary_scores_map_to_higher_band() {
        let eng = engine();
        for (value, expected) in [
            (100.0, "STRONG BUY"),
            (80.0, "STRONG BUY"),
            (79.9, "MODERATE BUY"),
            (60.0, "MODERATE BUY"),
            (40.0, "NEUTRAL"),
            (20.0, "MODERATE SELL"),
            (19.9, "STRONG SELL"),
            (0.0, "STRONG SELL"),
        ] {
            assert_eq!(eng.classify(value).name, expected, "score {value}");
        }
    }

    #[test]
    fn banding_is_total_over_the_range() {
        let eng = engine();
        let mut value = 0.0;
        while value <= 100.0 {
            let _ = eng.classify(value);
            value += 0.1;
        }
    }

    #[test]
    fn momentum_degrading_past_epsilon() {
        let eng = engine();
        let prev = eng
            .fuse("BTC", full_set(42.1, 42.1, 42.1, 42.1, 42.1), None, Utc::now())
            .unwrap();
        assert!((prev.composite_score - 42.1).abs() < 1e-9);

        let next = eng
            .fuse(
                "BTC",
                full_set(7.9, 35.2, 25.0, 63.5, 60.0),
                Some(&prev),
                Utc::now(),
            )
            .unwrap();
        assert!((next.composite_score - 31.7).abs() < 1e-9);
        assert_eq!(next.momentum, Some(Momentum::Degrading));
        assert_eq!(next.prev_score, Some(42.1));
    }

    #[test]
    fn momentum_stable_within_epsilon() {
        let eng = engine();
        assert_eq!(eng.momentum(50.0, 50.4), Momentum::Stable);
        assert_eq!(eng.momentum(50.0, 49.6), Momentum::Stable);
        assert_eq!(eng.momentum(50.0, 49.5), Momentum::Stable); // delta == epsilon
        assert_eq!(eng.momentum(50.6, 50.0), Momentum::Improving);
        assert_eq!(eng.momentum(49.4, 50.0), Momentum::Degrading);
    }

    #[test]
    fn missing_dimension_is_rejected() {
        let mut scores = full_set(50.0, 50.0, 50.0, 50.0, 50.0);
        scores.retain(|s| s.dimension != Dimension::Narrative);
        let err = engine().fuse("BTC", scores, None, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            FusionError::MissingDimension(Dimension::Narrative)
        ));
    }

    #[test]
    fn duplicate_dimension_is_rejected() {
        let mut scores = full_set(50.0, 50.0, 50.0, 50.0, 50.0);
        scores.push(score(Dimension::Whale, 60.0));
        let err = engine().fuse("BTC", scores, None, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            FusionError::DuplicateDimension(Dimension::Whale)
        ));
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let scores = full_set(101.0, 50.0, 50.0, 50.0, 50.0);
        let err = engine().fuse("BTC", scores, None, Utc::now()).unwrap_err();
        assert!(matches!(err, FusionError::ScoreOutOfRange { .. }));

        let scores = full_set(50.0, f64::NAN, 50.0, 50.0, 50.0);
        let err = engine().fuse("BTC", scores, None, Utc::now()).unwrap_err();
        assert!(matches!(err, FusionError::ScoreOutOfRange { .. }));
    }

    #[test]
    fn composite_stays_in_range_at_extremes() {
        let eng = engine();
        let low = eng
            .fuse("BTC", full_set(0.0, 0.0, 0.0, 0.0, 0.0), None, Utc::now())
            .unwrap();
        assert!((low.composite_score - 0.0).abs() < 1e-9);
        assert_eq!(low.label, "STRONG SELL");

        let high = eng
            .fuse("BTC", full_set(100.0, 100.0, 100.0, 100.0, 100.0), None, Utc::now())
            .unwrap();
        assert!((high.composite_score - 100.0).abs() < 1e-9);
        assert_eq!(high.label, "STRONG BUY");
    }
}
