// =============================================================================
// Snapshot Scheduler — Cadence- and quota-gated prediction capture
// =============================================================================
//
// A snapshot freezes the engine's current prediction for one asset so the
// evaluator can grade it later. Two gates before capture: the per-asset
// cadence (default 12 h) and the cadence-derived daily cap per asset. The
// reference price is sampled from the price feed at capture time, never from
// a cached quote.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collaborators::PriceFeed;
use crate::fusion::CompositeSignal;
use crate::history::HistoryStore;
use crate::performance::PerformanceSnapshot;
use crate::runtime_config::RuntimeConfig;

pub struct SnapshotScheduler {
    cadence: Duration,
    per_asset_daily_cap: u32,
}

impl SnapshotScheduler {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            cadence: Duration::hours(config.snapshot_cadence_hours as i64),
            per_asset_daily_cap: config.per_asset_daily_cap(),
        }
    }

    /// Capture a snapshot for `asset` if both gates pass. Returns None when
    /// the cadence or the daily cap says "not yet"; that is the common case.
    pub async fn maybe_snapshot(
        &self,
        store: &dyn HistoryStore,
        prices: &dyn PriceFeed,
        asset: &str,
        latest: &CompositeSignal,
        now: DateTime<Utc>,
    ) -> Result<Option<PerformanceSnapshot>> {
        if let Some(last) = store
            .last_snapshot_at(asset)
            .with_context(|| format!("snapshot cadence lookup for {asset}"))?
        {
            if now - last < self.cadence {
                debug!(asset = %asset, "snapshot cadence not reached");
                return Ok(None);
            }
        }

        let today = store
            .snapshots_on_day(asset, now.date_naive())
            .with_context(|| format!("snapshot quota lookup for {asset}"))?;
        if today >= self.per_asset_daily_cap {
            warn!(
                asset = %asset,
                today,
                cap = self.per_asset_daily_cap,
                "daily snapshot cap reached"
            );
            return Ok(None);
        }

        let reference_price = prices
            .spot_price(asset)
            .await
            .with_context(|| format!("reference price for {asset}"))?;

        let snapshot = PerformanceSnapshot {
            id: Uuid::new_v4().to_string(),
            asset: asset.to_string(),
            captured_at: now,
            predicted_direction: latest.direction,
            reference_score: latest.composite_score,
            reference_price,
        };
        store
            .append_snapshot(&snapshot)
            .with_context(|| format!("persisting snapshot for {asset}"))?;

        info!(
            asset = %asset,
            direction = %snapshot.predicted_direction,
            score = snapshot.reference_score,
            price = reference_price,
            "performance snapshot captured"
        );
        Ok(Some(snapshot))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::PriceFeed;
    use crate::errors::CollaboratorError;
    use crate::history::SqliteHistory;
    use crate::types::Direction;
    use async_trait::async_trait;

    struct FixedPrice(f64);

    #[async_trait]
    impl PriceFeed for FixedPrice {
        async fn spot_price(&self, _asset: &str) -> Result<f64, CollaboratorError> {
            Ok(self.0)
        }

        async fn price_at(
            &self,
            _asset: &str,
            _at: DateTime<Utc>,
        ) -> Result<Option<f64>, CollaboratorError> {
            Ok(Some(self.0))
        }
    }

    struct DownFeed;

    #[async_trait]
    impl PriceFeed for DownFeed {
        async fn spot_price(&self, _asset: &str) -> Result<f64, CollaboratorError> {
            Err(CollaboratorError::unavailable("price feed", "outage"))
        }

        async fn price_at(
            &self,
            _asset: &str,
            _at: DateTime<Utc>,
        ) -> Result<Option<f64>, CollaboratorError> {
            Err(CollaboratorError::unavailable("price feed", "outage"))
        }
    }

    fn latest(asset: &str) -> CompositeSignal {
        CompositeSignal {
            asset: asset.to_string(),
            timestamp: Utc::now(),
            composite_score: 31.7,
            label: "MODERATE SELL".to_string(),
            direction: Direction::Bearish,
            momentum: None,
            prev_score: None,
            dimensions: vec![],
            llm_insight: None,
        }
    }

    fn scheduler() -> SnapshotScheduler {
        SnapshotScheduler::from_config(&RuntimeConfig::default())
    }

    #[tokio::test]
    async fn first_snapshot_captures_direction_and_price() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let now = Utc::now();

        let snap = scheduler()
            .maybe_snapshot(&store, &FixedPrice(100.0), "BTC", &latest("BTC"), now)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(snap.asset, "BTC");
        assert_eq!(snap.predicted_direction, Direction::Bearish);
        assert!((snap.reference_price - 100.0).abs() < 1e-9);
        assert!((snap.reference_score - 31.7).abs() < 1e-9);
        assert!(store.last_snapshot_at("BTC").unwrap().is_some());
    }

    #[tokio::test]
    async fn second_snapshot_within_cadence_is_skipped() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let sched = scheduler();
        let now = Utc::now();
        let feed = FixedPrice(100.0);
        let signal = latest("BTC");

        assert!(sched
            .maybe_snapshot(&store, &feed, "BTC", &signal, now)
            .await
            .unwrap()
            .is_some());
        assert!(sched
            .maybe_snapshot(&store, &feed, "BTC", &signal, now + Duration::hours(1))
            .await
            .unwrap()
            .is_none());
        // Past the cadence it fires again.
        assert!(sched
            .maybe_snapshot(&store, &feed, "BTC", &signal, now + Duration::hours(13))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn daily_cap_blocks_further_snapshots() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let sched = scheduler();
        let feed = FixedPrice(100.0);
        let signal = latest("BTC");
        // Two snapshots already on today's ledger, closer together than the
        // cadence would normally allow.
        let day_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 30)
            .unwrap()
            .and_utc();
        for (id, hours) in [("s1", 0), ("s2", 11)] {
            store
                .append_snapshot(&PerformanceSnapshot {
                    id: id.to_string(),
                    asset: "BTC".to_string(),
                    captured_at: day_start + Duration::hours(hours),
                    predicted_direction: Direction::Bearish,
                    reference_score: 31.7,
                    reference_price: 100.0,
                })
                .unwrap();
        }

        // 23:30 passes the cadence gate (12.5 h since the last snapshot) but
        // the per-day cap of 2 is already spent.
        let attempt = day_start + Duration::minutes(23 * 60 + 30);
        assert!(sched
            .maybe_snapshot(&store, &feed, "BTC", &signal, attempt)
            .await
            .unwrap()
            .is_none());

        // Next day the cap resets.
        let next_day = day_start + Duration::hours(24);
        assert!(sched
            .maybe_snapshot(&store, &feed, "BTC", &signal, next_day)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn price_feed_outage_captures_nothing() {
        let store = SqliteHistory::open_in_memory().unwrap();
        let result = scheduler()
            .maybe_snapshot(&store, &DownFeed, "BTC", &latest("BTC"), Utc::now())
            .await;
        assert!(result.is_err());
        assert!(store.last_snapshot_at("BTC").unwrap().is_none());
    }
}
