// =============================================================================
// Application State — Shared runtime state behind an Arc
// =============================================================================
//
// One instance is built at startup and shared by the periodic loops and the
// HTTP read surface. Mutable pieces sit behind parking_lot RwLocks; the
// version counter bumps on every visible change so readers can cheaply detect
// staleness.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::history::HistoryStore;
use crate::portfolio::PortfolioSummary;
use crate::runtime_config::RuntimeConfig;

const MAX_RECENT_ERRORS: usize = 50;

/// One absorbed failure, kept for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RecentError {
    pub at: DateTime<Utc>,
    pub component: String,
    pub message: String,
}

pub struct AppState {
    pub config: RwLock<RuntimeConfig>,
    pub history: Arc<dyn HistoryStore>,

    /// Latest portfolio roll-up, refreshed every fusion cycle.
    pub portfolio: RwLock<Option<PortfolioSummary>>,

    pub last_fusion_at: RwLock<Option<DateTime<Utc>>>,
    pub last_snapshot_check_at: RwLock<Option<DateTime<Utc>>>,
    pub last_evaluation_at: RwLock<Option<DateTime<Utc>>>,

    pub started_at: DateTime<Utc>,
    state_version: AtomicU64,
    recent_errors: RwLock<VecDeque<RecentError>>,
}

impl AppState {
    pub fn new(config: RuntimeConfig, history: Arc<dyn HistoryStore>) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            history,
            portfolio: RwLock::new(None),
            last_fusion_at: RwLock::new(None),
            last_snapshot_check_at: RwLock::new(None),
            last_evaluation_at: RwLock::new(None),
            started_at: Utc::now(),
            state_version: AtomicU64::new(0),
            recent_errors: RwLock::new(VecDeque::with_capacity(MAX_RECENT_ERRORS)),
        })
    }

    pub fn bump_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    /// Record an absorbed failure; the buffer keeps the newest 50.
    pub fn push_error(&self, component: impl Into<String>, message: impl std::fmt::Display) {
        let mut errors = self.recent_errors.write();
        if errors.len() >= MAX_RECENT_ERRORS {
            errors.pop_front();
        }
        errors.push_back(RecentError {
            at: Utc::now(),
            component: component.into(),
            message: message.to_string(),
        });
    }

    pub fn recent_errors(&self) -> Vec<RecentError> {
        self.recent_errors.read().iter().cloned().collect()
    }

    pub fn uptime_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }
}
