// =============================================================================
// Error taxonomy for the Nimbus signal engine
// =============================================================================
//
// Failures are component-local by design: a dimension scorer outage skips one
// asset for one cycle; a missing realized price defers one evaluation. Only
// ConfigError is fatal, and only at startup.

use thiserror::Error;

use crate::types::Dimension;

/// Configuration errors. Fatal at startup, never triggered mid-run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("dimension weights sum to {sum:.6}, expected 1.0")]
    WeightsDoNotSumToOne { sum: f64 },

    #[error("dimension weight for {dimension} is {weight} (must be in (0, 1])")]
    InvalidWeight { dimension: Dimension, weight: f64 },

    #[error("label band table is empty")]
    EmptyBandTable,

    #[error("label band table does not cover score 0 (lowest min_score is {lowest})")]
    BandTableGap { lowest: f64 },

    #[error("label band table is not strictly descending at '{name}' (min_score {min_score})")]
    BandTableNotDescending { name: String, min_score: f64 },

    #[error(
        "snapshot quota exceeded: {assets} assets x {per_asset_cap}/day = {total}/day (max {max})"
    )]
    SnapshotQuotaExceeded {
        assets: usize,
        per_asset_cap: u32,
        total: u32,
        max: u32,
    },
}

/// A consumed collaborator (dimension scorer, price feed, regime indicator)
/// failed or timed out. Recovered locally; never propagated across assets.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: String,
        reason: String,
    },

    #[error("{collaborator} timed out after {timeout_secs}s")]
    Timeout {
        collaborator: String,
        timeout_secs: u64,
    },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            collaborator: collaborator.into(),
            reason: reason.to_string(),
        }
    }
}

/// Fusion input validation failures. The offending asset is excluded from the
/// cycle's output; the previous composite remains the latest-known value.
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("missing dimension score: {0}")]
    MissingDimension(Dimension),

    #[error("duplicate dimension score: {0}")]
    DuplicateDimension(Dimension),

    #[error("{dimension} score {score} is outside [0, 100]")]
    ScoreOutOfRange { dimension: Dimension, score: f64 },
}

/// Ledger read/write failures.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("ledger query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt ledger record: {0}")]
    Corrupt(String),
}
