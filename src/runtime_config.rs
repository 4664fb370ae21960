// =============================================================================
// Runtime Configuration — Hot-reloadable engine settings with atomic save
// =============================================================================
//
// Central configuration hub for the Nimbus signal engine. Every tunable
// parameter lives here: dimension weights, the label band table, the momentum
// deadband, cycle cadences, and the portfolio regime/risk tables.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields never
// breaks loading an older config file.
//
// `validate()` runs once at startup and is fatal: weights that do not sum to
// 1.0 or a gapped band table would silently corrupt every composite score, so
// the engine refuses to start instead.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ConfigError;
use crate::types::{Dimension, Direction};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_assets() -> Vec<String> {
    [
        "BTC", "ETH", "SOL", "BNB", "XRP", "ADA", "AVAX", "DOT", "MATIC", "LINK", "UNI", "ATOM",
        "LTC", "FIL", "NEAR", "APT", "ARB", "OP", "INJ", "SUI",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_whale_weight() -> f64 {
    0.30
}

fn default_technical_weight() -> f64 {
    0.25
}

fn default_derivatives_weight() -> f64 {
    0.20
}

fn default_narrative_weight() -> f64 {
    0.15
}

fn default_market_weight() -> f64 {
    0.10
}

fn default_label_bands() -> Vec<LabelBand> {
    vec![
        LabelBand {
            min_score: 80.0,
            name: "STRONG BUY".to_string(),
            direction: Direction::Bullish,
        },
        LabelBand {
            min_score: 60.0,
            name: "MODERATE BUY".to_string(),
            direction: Direction::Bullish,
        },
        LabelBand {
            min_score: 40.0,
            name: "NEUTRAL".to_string(),
            direction: Direction::Neutral,
        },
        LabelBand {
            min_score: 20.0,
            name: "MODERATE SELL".to_string(),
            direction: Direction::Bearish,
        },
        LabelBand {
            min_score: 0.0,
            name: "STRONG SELL".to_string(),
            direction: Direction::Bearish,
        },
    ]
}

fn default_momentum_epsilon() -> f64 {
    0.5
}

fn default_fusion_interval_secs() -> u64 {
    900
}

fn default_evaluation_interval_secs() -> u64 {
    900
}

fn default_snapshot_cadence_hours() -> u64 {
    12
}

fn default_snapshot_check_interval_secs() -> u64 {
    600
}

fn default_collaborator_timeout_secs() -> u64 {
    10
}

fn default_max_snapshots_per_day() -> u32 {
    40
}

fn default_neutral_band_pct() -> f64 {
    2.0
}

fn default_reputation_window_days() -> i64 {
    30
}

fn default_top_n() -> usize {
    3
}

fn default_high_conviction_threshold() -> f64 {
    70.0
}

fn default_momentum_margin() -> usize {
    2
}

fn default_regime_thresholds() -> RegimeThresholds {
    RegimeThresholds {
        extreme_fear_below: 25.0,
        fear_below: 45.0,
        neutral_below: 55.0,
        greed_below: 75.0,
    }
}

fn default_risk_rules() -> Vec<RiskRule> {
    vec![
        RiskRule {
            name: "low".to_string(),
            min_indicator: 40.0,
            max_bearish_fraction: 0.25,
        },
        RiskRule {
            name: "moderate".to_string(),
            min_indicator: 25.0,
            max_bearish_fraction: 0.50,
        },
        RiskRule {
            name: "elevated".to_string(),
            min_indicator: 0.0,
            max_bearish_fraction: 0.75,
        },
        RiskRule {
            name: "high".to_string(),
            min_indicator: 0.0,
            max_bearish_fraction: 1.0,
        },
    ]
}

fn default_db_path() -> String {
    "nimbus_signals.db".to_string()
}

fn default_scorer_base_url() -> String {
    "http://127.0.0.1:9100".to_string()
}

// =============================================================================
// Sub-tables
// =============================================================================

/// One row of the label band table. Bands are a descending `min_score` list;
/// classification picks the first row with `score >= min_score`, so boundary
/// scores land in the higher band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelBand {
    pub min_score: f64,
    pub name: String,
    pub direction: Direction,
}

/// Fixed per-dimension fusion weights. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionWeights {
    #[serde(default = "default_whale_weight")]
    pub whale: f64,
    #[serde(default = "default_technical_weight")]
    pub technical: f64,
    #[serde(default = "default_derivatives_weight")]
    pub derivatives: f64,
    #[serde(default = "default_narrative_weight")]
    pub narrative: f64,
    #[serde(default = "default_market_weight")]
    pub market: f64,
}

impl DimensionWeights {
    pub fn weight(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Whale => self.whale,
            Dimension::Technical => self.technical,
            Dimension::Derivatives => self.derivatives,
            Dimension::Narrative => self.narrative,
            Dimension::Market => self.market,
        }
    }

    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.weight(*d)).sum()
    }
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            whale: default_whale_weight(),
            technical: default_technical_weight(),
            derivatives: default_derivatives_weight(),
            narrative: default_narrative_weight(),
            market: default_market_weight(),
        }
    }
}

/// Fear & Greed thresholds mapping the market-wide indicator to a regime label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeThresholds {
    pub extreme_fear_below: f64,
    pub fear_below: f64,
    pub neutral_below: f64,
    pub greed_below: f64,
}

/// One row of the portfolio risk-level table, evaluated top-to-bottom; the
/// first rule whose conditions both hold names the risk level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRule {
    pub name: String,
    /// Minimum fear/greed reading for this rule to apply.
    pub min_indicator: f64,
    /// Maximum fraction of scored assets reading bearish.
    pub max_bearish_fraction: f64,
}

/// Tunables for portfolio-level aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioParams {
    /// Number of entries in top_buys / top_sells.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Composite score at or above which a top-buy is "high" conviction.
    #[serde(default = "default_high_conviction_threshold")]
    pub high_conviction_threshold: f64,

    /// How many more improving than degrading assets (or vice versa) before
    /// portfolio momentum reads improving/degrading instead of mixed.
    #[serde(default = "default_momentum_margin")]
    pub momentum_margin: usize,

    #[serde(default = "default_regime_thresholds")]
    pub regime_thresholds: RegimeThresholds,

    #[serde(default = "default_risk_rules")]
    pub risk_rules: Vec<RiskRule>,
}

impl Default for PortfolioParams {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            high_conviction_threshold: default_high_conviction_threshold(),
            momentum_margin: default_momentum_margin(),
            regime_thresholds: default_regime_thresholds(),
            risk_rules: default_risk_rules(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the Nimbus engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Asset universe -----------------------------------------------------
    /// Assets the engine fuses and tracks.
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,

    // --- Fusion -------------------------------------------------------------
    /// Fixed per-dimension weights (must sum to 1.0).
    #[serde(default)]
    pub weights: DimensionWeights,

    /// Label band table, descending by min_score.
    #[serde(default = "default_label_bands")]
    pub label_bands: Vec<LabelBand>,

    /// Momentum deadband: score deltas within ±ε read as stable.
    #[serde(default = "default_momentum_epsilon")]
    pub momentum_epsilon: f64,

    // --- Cadences -----------------------------------------------------------
    /// Seconds between fusion cycles.
    #[serde(default = "default_fusion_interval_secs")]
    pub fusion_interval_secs: u64,

    /// Seconds between accuracy-evaluation passes.
    #[serde(default = "default_evaluation_interval_secs")]
    pub evaluation_interval_secs: u64,

    /// Hours between performance snapshots per asset.
    #[serde(default = "default_snapshot_cadence_hours")]
    pub snapshot_cadence_hours: u64,

    /// Seconds between snapshot-eligibility checks (the check self-limits to
    /// the cadence above).
    #[serde(default = "default_snapshot_check_interval_secs")]
    pub snapshot_check_interval_secs: u64,

    /// Per-collaborator call timeout in seconds.
    #[serde(default = "default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,

    /// System-wide snapshot ceiling per calendar day.
    #[serde(default = "default_max_snapshots_per_day")]
    pub max_snapshots_per_day: u32,

    // --- Evaluation ---------------------------------------------------------
    /// Price-move band (in %) for hit determination: bullish needs a move
    /// above +band, bearish below -band, neutral within ±band.
    #[serde(default = "default_neutral_band_pct")]
    pub neutral_band_pct: f64,

    /// Rolling reputation window in days, keyed on snapshot capture time.
    #[serde(default = "default_reputation_window_days")]
    pub reputation_window_days: i64,

    // --- Portfolio ----------------------------------------------------------
    #[serde(default)]
    pub portfolio: PortfolioParams,

    // --- Plumbing -----------------------------------------------------------
    /// SQLite ledger path.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Base URL of the dimension-scorer collaborators.
    #[serde(default = "default_scorer_base_url")]
    pub scorer_base_url: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            weights: DimensionWeights::default(),
            label_bands: default_label_bands(),
            momentum_epsilon: default_momentum_epsilon(),
            fusion_interval_secs: default_fusion_interval_secs(),
            evaluation_interval_secs: default_evaluation_interval_secs(),
            snapshot_cadence_hours: default_snapshot_cadence_hours(),
            snapshot_check_interval_secs: default_snapshot_check_interval_secs(),
            collaborator_timeout_secs: default_collaborator_timeout_secs(),
            max_snapshots_per_day: default_max_snapshots_per_day(),
            neutral_band_pct: default_neutral_band_pct(),
            reputation_window_days: default_reputation_window_days(),
            portfolio: PortfolioParams::default(),
            db_path: default_db_path(),
            scorer_base_url: default_scorer_base_url(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            assets = config.assets.len(),
            fusion_interval_secs = config.fusion_interval_secs,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise runtime config")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Per-asset daily snapshot cap derived from the cadence.
    pub fn per_asset_daily_cap(&self) -> u32 {
        let cadence = self.snapshot_cadence_hours.max(1);
        24u64.div_ceil(cadence) as u32
    }

    /// Validate the configuration. Called once at startup; any error here is
    /// fatal because it would corrupt every downstream composite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Weights: each in (0, 1], summing to 1.0 within tolerance.
        for dim in Dimension::ALL {
            let w = self.weights.weight(dim);
            if !(w > 0.0 && w <= 1.0) {
                return Err(ConfigError::InvalidWeight {
                    dimension: dim,
                    weight: w,
                });
            }
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::WeightsDoNotSumToOne { sum });
        }

        // Band table: non-empty, strictly descending, covering score 0.
        if self.label_bands.is_empty() {
            return Err(ConfigError::EmptyBandTable);
        }
        let mut prev = f64::INFINITY;
        for band in &self.label_bands {
            if band.min_score >= prev {
                return Err(ConfigError::BandTableNotDescending {
                    name: band.name.clone(),
                    min_score: band.min_score,
                });
            }
            prev = band.min_score;
        }
        let lowest = self
            .label_bands
            .last()
            .map(|b| b.min_score)
            .unwrap_or(f64::INFINITY);
        if lowest > 0.0 {
            return Err(ConfigError::BandTableGap { lowest });
        }

        // Snapshot quota: cadence x asset count must fit the daily ceiling.
        let per_asset_cap = self.per_asset_daily_cap();
        let total = per_asset_cap * self.assets.len() as u32;
        if total > self.max_snapshots_per_day {
            return Err(ConfigError::SnapshotQuotaExceeded {
                assets: self.assets.len(),
                per_asset_cap,
                total,
                max: self.max_snapshots_per_day,
            });
        }

        Ok(())
    }
}
