// =============================================================================
// History ledger — append-only record of signals, snapshots and evaluations
// =============================================================================
//
// Everything downstream (momentum, snapshot cadence, evaluation dedup,
// reputation) reads from this ledger rather than in-memory caches, so the
// engine recovers its full state from disk after a restart.

pub mod sqlite;

pub use sqlite::SqliteHistory;

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

use crate::errors::HistoryError;
use crate::fusion::CompositeSignal;
use crate::performance::{PerformanceEvaluation, PerformanceSnapshot};
use crate::types::Horizon;

/// Append-only ledger contract. All writes append; nothing is ever updated or
/// deleted, and readers only ever see fully committed rows.
pub trait HistoryStore: Send + Sync {
    // ── composite signals ────────────────────────────────────────────────

    fn append_composite(&self, signal: &CompositeSignal) -> Result<(), HistoryError>;

    /// Most recent composite for one asset.
    fn latest_composite(&self, asset: &str) -> Result<Option<CompositeSignal>, HistoryError>;

    /// Most recent composite per asset, for the given universe.
    fn latest_composites(
        &self,
        assets: &[String],
    ) -> Result<HashMap<String, CompositeSignal>, HistoryError>;

    /// Page of composites, newest first, optionally filtered by asset.
    /// Returns the page plus the total row count for the filter.
    fn composites_page(
        &self,
        asset: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<CompositeSignal>, u64), HistoryError>;

    // ── performance snapshots ────────────────────────────────────────────

    fn append_snapshot(&self, snapshot: &PerformanceSnapshot) -> Result<(), HistoryError>;

    fn last_snapshot_at(&self, asset: &str) -> Result<Option<DateTime<Utc>>, HistoryError>;

    /// Snapshot count for one asset on one UTC calendar day.
    fn snapshots_on_day(&self, asset: &str, day: NaiveDate) -> Result<u32, HistoryError>;

    /// Snapshots old enough for `horizon` that have no evaluation at that
    /// horizon yet, oldest first.
    fn due_snapshots(
        &self,
        horizon: Horizon,
        now: DateTime<Utc>,
    ) -> Result<Vec<PerformanceSnapshot>, HistoryError>;

    // ── evaluations ──────────────────────────────────────────────────────

    /// Append one evaluation. Returns false when the (snapshot, horizon) pair
    /// was already evaluated; the existing row wins.
    fn append_evaluation(&self, evaluation: &PerformanceEvaluation)
        -> Result<bool, HistoryError>;

    /// Evaluations whose snapshot was captured inside [from, to].
    fn evaluations_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PerformanceEvaluation>, HistoryError>;

    /// Page of evaluations, newest first, optionally filtered by asset.
    /// Returns the page plus the total row count for the filter.
    fn evaluations_page(
        &self,
        asset: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<PerformanceEvaluation>, u64), HistoryError>;
}
