// =============================================================================
// SQLite ledger adapter
// =============================================================================
//
// Single-file database in WAL mode. Timestamps are stored as fixed-width
// RFC 3339 text (microsecond precision, Z suffix) so that lexical comparison
// in SQL matches chronological order. Dimension breakdowns are stored as a
// JSON column; everything queried on has its own column and index.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use tracing::info;

use crate::errors::HistoryError;
use crate::fusion::{CompositeSignal, DimensionScore};
use crate::history::HistoryStore;
use crate::performance::{PerformanceEvaluation, PerformanceSnapshot};
use crate::types::{Direction, Horizon, Momentum};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS composite_signals (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    asset           TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    composite_score REAL NOT NULL,
    label           TEXT NOT NULL,
    direction       TEXT NOT NULL,
    momentum        TEXT,
    prev_score      REAL,
    dimensions      TEXT NOT NULL,
    llm_insight     TEXT
);
CREATE INDEX IF NOT EXISTS idx_composites_asset_ts
    ON composite_signals(asset, timestamp DESC);

CREATE TABLE IF NOT EXISTS performance_snapshots (
    id                  TEXT PRIMARY KEY,
    asset               TEXT NOT NULL,
    captured_at         TEXT NOT NULL,
    predicted_direction TEXT NOT NULL,
    reference_score     REAL NOT NULL,
    reference_price     REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_snapshots_asset_ts
    ON performance_snapshots(asset, captured_at DESC);

CREATE TABLE IF NOT EXISTS performance_evaluations (
    snapshot_id         TEXT NOT NULL,
    asset               TEXT NOT NULL,
    horizon             TEXT NOT NULL,
    predicted_direction TEXT NOT NULL,
    captured_at         TEXT NOT NULL,
    evaluated_at        TEXT NOT NULL,
    realized_price      REAL NOT NULL,
    price_move_pct      REAL NOT NULL,
    hit                 INTEGER NOT NULL,
    UNIQUE(snapshot_id, horizon)
);
CREATE INDEX IF NOT EXISTS idx_evaluations_captured
    ON performance_evaluations(captured_at);
CREATE INDEX IF NOT EXISTS idx_evaluations_asset
    ON performance_evaluations(asset);
";

pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open (or create) the ledger at `path`, enabling WAL and ensuring the
    /// schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %path.display(), "history ledger opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory ledger for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

// ── row mapping helpers ──────────────────────────────────────────────────

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(text: &str) -> Result<DateTime<Utc>, HistoryError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HistoryError::Corrupt(format!("bad timestamp '{text}': {e}")))
}

fn parse_direction(text: &str) -> Result<Direction, HistoryError> {
    text.parse().map_err(HistoryError::Corrupt)
}

fn composite_from_row(row: &Row<'_>) -> rusqlite::Result<RawComposite> {
    Ok(RawComposite {
        asset: row.get("asset")?,
        timestamp: row.get("timestamp")?,
        composite_score: row.get("composite_score")?,
        label: row.get("label")?,
        direction: row.get("direction")?,
        momentum: row.get("momentum")?,
        prev_score: row.get("prev_score")?,
        dimensions: row.get("dimensions")?,
        llm_insight: row.get("llm_insight")?,
    })
}

/// Column values straight off a composite row, before text fields are parsed.
struct RawComposite {
    asset: String,
    timestamp: String,
    composite_score: f64,
    label: String,
    direction: String,
    momentum: Option<String>,
    prev_score: Option<f64>,
    dimensions: String,
    llm_insight: Option<String>,
}

impl RawComposite {
    fn decode(self) -> Result<CompositeSignal, HistoryError> {
        let momentum = match self.momentum {
            Some(text) => Some(
                text.parse::<Momentum>()
                    .map_err(HistoryError::Corrupt)?,
            ),
            None => None,
        };
        let dimensions: Vec<DimensionScore> = serde_json::from_str(&self.dimensions)
            .map_err(|e| HistoryError::Corrupt(format!("bad dimensions json: {e}")))?;

        Ok(CompositeSignal {
            asset: self.asset,
            timestamp: parse_ts(&self.timestamp)?,
            composite_score: self.composite_score,
            label: self.label,
            direction: parse_direction(&self.direction)?,
            momentum,
            prev_score: self.prev_score,
            dimensions,
            llm_insight: self.llm_insight,
        })
    }
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<RawSnapshot> {
    Ok(RawSnapshot {
        id: row.get("id")?,
        asset: row.get("asset")?,
        captured_at: row.get("captured_at")?,
        predicted_direction: row.get("predicted_direction")?,
        reference_score: row.get("reference_score")?,
        reference_price: row.get("reference_price")?,
    })
}

struct RawSnapshot {
    id: String,
    asset: String,
    captured_at: String,
    predicted_direction: String,
    reference_score: f64,
    reference_price: f64,
}

impl RawSnapshot {
    fn decode(self) -> Result<PerformanceSnapshot, HistoryError> {
        Ok(PerformanceSnapshot {
            id: self.id,
            asset: self.asset,
            captured_at: parse_ts(&self.captured_at)?,
            predicted_direction: parse_direction(&self.predicted_direction)?,
            reference_score: self.reference_score,
            reference_price: self.reference_price,
        })
    }
}

fn evaluation_from_row(row: &Row<'_>) -> rusqlite::Result<RawEvaluation> {
    Ok(RawEvaluation {
        snapshot_id: row.get("snapshot_id")?,
        asset: row.get("asset")?,
        horizon: row.get("horizon")?,
        predicted_direction: row.get("predicted_direction")?,
        captured_at: row.get("captured_at")?,
        evaluated_at: row.get("evaluated_at")?,
        realized_price: row.get("realized_price")?,
        price_move_pct: row.get("price_move_pct")?,
        hit: row.get("hit")?,
    })
}

struct RawEvaluation {
    snapshot_id: String,
    asset: String,
    horizon: String,
    predicted_direction: String,
    captured_at: String,
    evaluated_at: String,
    realized_price: f64,
    price_move_pct: f64,
    hit: bool,
}

impl RawEvaluation {
    fn decode(self) -> Result<PerformanceEvaluation, HistoryError> {
        Ok(PerformanceEvaluation {
            snapshot_id: self.snapshot_id,
            asset: self.asset,
            horizon: self
                .horizon
                .parse::<Horizon>()
                .map_err(HistoryError::Corrupt)?,
            predicted_direction: parse_direction(&self.predicted_direction)?,
            captured_at: parse_ts(&self.captured_at)?,
            evaluated_at: parse_ts(&self.evaluated_at)?,
            realized_price: self.realized_price,
            price_move_pct: self.price_move_pct,
            hit: self.hit,
        })
    }
}

// ── trait impl ───────────────────────────────────────────────────────────

impl HistoryStore for SqliteHistory {
    fn append_composite(&self, signal: &CompositeSignal) -> Result<(), HistoryError> {
        let dimensions = serde_json::to_string(&signal.dimensions)
            .map_err(|e| HistoryError::Corrupt(format!("dimensions encode failed: {e}")))?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO composite_signals
                (asset, timestamp, composite_score, label, direction, momentum,
                 prev_score, dimensions, llm_insight)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                signal.asset,
                fmt_ts(signal.timestamp),
                signal.composite_score,
                signal.label,
                signal.direction.to_string(),
                signal.momentum.map(|m| m.to_string()),
                signal.prev_score,
                dimensions,
                signal.llm_insight,
            ],
        )?;
        Ok(())
    }

    fn latest_composite(&self, asset: &str) -> Result<Option<CompositeSignal>, HistoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM composite_signals
             WHERE asset = ?1 ORDER BY timestamp DESC LIMIT 1",
        )?;
        let raw = stmt
            .query_row(params![asset], composite_from_row)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        raw.map(RawComposite::decode).transpose()
    }

    fn latest_composites(
        &self,
        assets: &[String],
    ) -> Result<HashMap<String, CompositeSignal>, HistoryError> {
        let mut out = HashMap::with_capacity(assets.len());
        for asset in assets {
            if let Some(signal) = self.latest_composite(asset)? {
                out.insert(asset.clone(), signal);
            }
        }
        Ok(out)
    }

    fn composites_page(
        &self,
        asset: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<CompositeSignal>, u64), HistoryError> {
        let conn = self.conn.lock();

        let (total, raws): (u64, Vec<RawComposite>) = match asset {
            Some(asset) => {
                let total = conn.query_row(
                    "SELECT COUNT(*) FROM composite_signals WHERE asset = ?1",
                    params![asset],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare_cached(
                    "SELECT * FROM composite_signals WHERE asset = ?1
                     ORDER BY timestamp DESC LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt
                    .query_map(params![asset, limit, offset], composite_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                (total, rows)
            }
            None => {
                let total = conn.query_row(
                    "SELECT COUNT(*) FROM composite_signals",
                    [],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare_cached(
                    "SELECT * FROM composite_signals
                     ORDER BY timestamp DESC LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt
                    .query_map(params![limit, offset], composite_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                (total, rows)
            }
        };

        let signals = raws
            .into_iter()
            .map(RawComposite::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((signals, total))
    }

    fn append_snapshot(&self, snapshot: &PerformanceSnapshot) -> Result<(), HistoryError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO performance_snapshots
                (id, asset, captured_at, predicted_direction, reference_score, reference_price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.id,
                snapshot.asset,
                fmt_ts(snapshot.captured_at),
                snapshot.predicted_direction.to_string(),
                snapshot.reference_score,
                snapshot.reference_price,
            ],
        )?;
        Ok(())
    }

    fn last_snapshot_at(&self, asset: &str) -> Result<Option<DateTime<Utc>>, HistoryError> {
        let conn = self.conn.lock();
        let text: Option<String> = conn
            .query_row(
                "SELECT captured_at FROM performance_snapshots
                 WHERE asset = ?1 ORDER BY captured_at DESC LIMIT 1",
                params![asset],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        text.as_deref().map(parse_ts).transpose()
    }

    fn snapshots_on_day(&self, asset: &str, day: NaiveDate) -> Result<u32, HistoryError> {
        let start = day
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| HistoryError::Corrupt(format!("bad day {day}")))?;
        let end = start + chrono::Duration::days(1);

        let conn = self.conn.lock();
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM performance_snapshots
             WHERE asset = ?1 AND captured_at >= ?2 AND captured_at < ?3",
            params![asset, fmt_ts(start), fmt_ts(end)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn due_snapshots(
        &self,
        horizon: Horizon,
        now: DateTime<Utc>,
    ) -> Result<Vec<PerformanceSnapshot>, HistoryError> {
        let cutoff = now - horizon.duration();

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT s.* FROM performance_snapshots s
             WHERE s.captured_at <= ?1
               AND NOT EXISTS (
                   SELECT 1 FROM performance_evaluations e
                   WHERE e.snapshot_id = s.id AND e.horizon = ?2)
             ORDER BY s.captured_at ASC",
        )?;
        let raws = stmt
            .query_map(params![fmt_ts(cutoff), horizon.as_str()], snapshot_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raws.into_iter().map(RawSnapshot::decode).collect()
    }

    fn append_evaluation(
        &self,
        evaluation: &PerformanceEvaluation,
    ) -> Result<bool, HistoryError> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO performance_evaluations
                (snapshot_id, asset, horizon, predicted_direction, captured_at,
                 evaluated_at, realized_price, price_move_pct, hit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                evaluation.snapshot_id,
                evaluation.asset,
                evaluation.horizon.as_str(),
                evaluation.predicted_direction.to_string(),
                fmt_ts(evaluation.captured_at),
                fmt_ts(evaluation.evaluated_at),
                evaluation.realized_price,
                evaluation.price_move_pct,
                evaluation.hit,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn evaluations_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PerformanceEvaluation>, HistoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM performance_evaluations
             WHERE captured_at >= ?1 AND captured_at <= ?2
             ORDER BY captured_at ASC",
        )?;
        let raws = stmt
            .query_map(params![fmt_ts(from), fmt_ts(to)], evaluation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raws.into_iter().map(RawEvaluation::decode).collect()
    }

    fn evaluations_page(
        &self,
        asset: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<PerformanceEvaluation>, u64), HistoryError> {
        let conn = self.conn.lock();

        let (total, raws): (u64, Vec<RawEvaluation>) = match asset {
            Some(asset) => {
                let total = conn.query_row(
                    "SELECT COUNT(*) FROM performance_evaluations WHERE asset = ?1",
                    params![asset],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare_cached(
                    "SELECT * FROM performance_evaluations WHERE asset = ?1
                     ORDER BY evaluated_at DESC LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt
                    .query_map(params![asset, limit, offset], evaluation_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                (total, rows)
            }
            None => {
                let total = conn.query_row(
                    "SELECT COUNT(*) FROM performance_evaluations",
                    [],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare_cached(
                    "SELECT * FROM performance_evaluations
                     ORDER BY evaluated_at DESC LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt
                    .query_map(params![limit, offset], evaluation_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                (total, rows)
            }
        };

        let evaluations = raws
            .into_iter()
            .map(RawEvaluation::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((evaluations, total))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimension;
    use chrono::Duration;

    fn composite(asset: &str, ts: DateTime<Utc>, score: f64) -> CompositeSignal {
        CompositeSignal {
            asset: asset.to_string(),
            timestamp: ts,
            composite_score: score,
            label: "NEUTRAL".to_string(),
            direction: Direction::Neutral,
            momentum: None,
            prev_score: None,
            dimensions: vec![DimensionScore {
                dimension: Dimension::Whale,
                score,
                label: "test".to_string(),
                detail: None,
                weight: 0.30,
            }],
            llm_insight: None,
        }
    }

    fn snapshot(id: &str, asset: &str, captured_at: DateTime<Utc>) -> PerformanceSnapshot {
        PerformanceSnapshot {
            id: id.to_string(),
            asset: asset.to_string(),
            captured_at,
            predicted_direction: Direction::Bullish,
            reference_score: 65.0,
            reference_price: 100.0,
        }
    }

    fn evaluation(snapshot_id: &str, horizon: Horizon, captured_at: DateTime<Utc>) -> PerformanceEvaluation {
        PerformanceEvaluation {
            snapshot_id: snapshot_id.to_string(),
            asset: "BTC".to_string(),
            horizon,
            predicted_direction: Direction::Bullish,
            captured_at,
            evaluated_at: captured_at + horizon.duration(),
            realized_price: 103.0,
            price_move_pct: 3.0,
            hit: true,
        }
    }

    #[test]
    fn file_backed_ledger_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let now = Utc::now();

        {
            let store = SqliteHistory::open(&path).unwrap();
            store.append_composite(&composite("BTC", now, 42.1)).unwrap();
            store.append_snapshot(&snapshot("s1", "BTC", now)).unwrap();
        }
        assert!(path.exists());

        // A fresh handle on the same file sees everything committed before.
        let store = SqliteHistory::open(&path).unwrap();
        let back = store.latest_composite("BTC").unwrap().unwrap();
        assert!((back.composite_score - 42.1).abs() < 1e-9);
        let last = store.last_snapshot_at("BTC").unwrap().unwrap();
        assert!((last - now).num_seconds().abs() < 2);
    }

    #[test]
    fn composite_roundtrip_preserves_fields() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let now = Utc::now();

        let mut signal = composite("BTC", now, 42.1);
        signal.momentum = Some(Momentum::Improving);
        signal.prev_score = Some(40.0);
        signal.llm_insight = Some("whales accumulating".to_string());
        store.append_composite(&signal).unwrap();

        let back = store.latest_composite("BTC").unwrap().unwrap();
        assert_eq!(back.asset, "BTC");
        assert!((back.composite_score - 42.1).abs() < 1e-9);
        assert_eq!(back.momentum, Some(Momentum::Improving));
        assert_eq!(back.prev_score, Some(40.0));
        assert_eq!(back.llm_insight.as_deref(), Some("whales accumulating"));
        assert_eq!(back.dimensions.len(), 1);
        assert_eq!(back.dimensions[0].dimension, Dimension::Whale);
    }

    #[test]
    fn latest_composite_is_newest_by_timestamp() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let now = Utc::now();
        store.append_composite(&composite("BTC", now - Duration::hours(1), 40.0)).unwrap();
        store.append_composite(&composite("BTC", now, 45.0)).unwrap();
        store.append_composite(&composite("ETH", now, 60.0)).unwrap();

        let latest = store.latest_composite("BTC").unwrap().unwrap();
        assert!((latest.composite_score - 45.0).abs() < 1e-9);

        let all = store
            .latest_composites(&["BTC".to_string(), "ETH".to_string(), "SOL".to_string()])
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(!all.contains_key("SOL"));
    }

    #[test]
    fn composites_page_orders_and_counts() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let now = Utc::now();
        for i in 0..5 {
            store
                .append_composite(&composite("BTC", now - Duration::minutes(i), 40.0 + i as f64))
                .unwrap();
        }

        let (page, total) = store.composites_page(Some("BTC"), 2, 0).unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        // Newest first: minute offset 0 then 1.
        assert!((page[0].composite_score - 40.0).abs() < 1e-9);
        assert!((page[1].composite_score - 41.0).abs() < 1e-9);

        let (rest, _) = store.composites_page(Some("BTC"), 10, 4).unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn snapshot_cadence_queries() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let now = Utc::now();

        assert!(store.last_snapshot_at("BTC").unwrap().is_none());
        store.append_snapshot(&snapshot("s1", "BTC", now - Duration::hours(13))).unwrap();
        store.append_snapshot(&snapshot("s2", "BTC", now - Duration::hours(1))).unwrap();

        let last = store.last_snapshot_at("BTC").unwrap().unwrap();
        assert!((last - (now - Duration::hours(1))).num_seconds().abs() < 2);

        let today = now.date_naive();
        let count = store.snapshots_on_day("BTC", today).unwrap();
        // Both may fall on today depending on wall clock; at least the 1h-old one does.
        assert!(count >= 1);
    }

    #[test]
    fn due_snapshots_respects_horizon_and_existing_evaluations() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let now = Utc::now();

        store.append_snapshot(&snapshot("old", "BTC", now - Duration::hours(50))).unwrap();
        store.append_snapshot(&snapshot("young", "BTC", now - Duration::hours(2))).unwrap();

        let due = store.due_snapshots(Horizon::H24, now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "old");

        // 48h also due for the old one; 7d not yet.
        assert_eq!(store.due_snapshots(Horizon::H48, now).unwrap().len(), 1);
        assert!(store.due_snapshots(Horizon::D7, now).unwrap().is_empty());

        // Once evaluated at 24h it drops off that horizon's due list only.
        let eval = evaluation("old", Horizon::H24, now - Duration::hours(50));
        assert!(store.append_evaluation(&eval).unwrap());
        assert!(store.due_snapshots(Horizon::H24, now).unwrap().is_empty());
        assert_eq!(store.due_snapshots(Horizon::H48, now).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_evaluation_is_ignored() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let now = Utc::now();
        store.append_snapshot(&snapshot("s1", "BTC", now - Duration::hours(25))).unwrap();

        let eval = evaluation("s1", Horizon::H24, now - Duration::hours(25));
        assert!(store.append_evaluation(&eval).unwrap());
        assert!(!store.append_evaluation(&eval).unwrap());

        let (page, total) = store.evaluations_page(None, 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].snapshot_id, "s1");
        assert!(page[0].hit);
    }

    #[test]
    fn evaluations_window_keys_on_captured_at() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let now = Utc::now();

        let inside = evaluation("in", Horizon::H24, now - Duration::days(10));
        let outside = evaluation("out", Horizon::H24, now - Duration::days(40));
        store.append_evaluation(&inside).unwrap();
        store.append_evaluation(&outside).unwrap();

        let window = store
            .evaluations_in_window(now - Duration::days(30), now)
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].snapshot_id, "in");
    }
}
