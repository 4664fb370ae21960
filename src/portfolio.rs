// =============================================================================
// Portfolio Aggregator — Cross-asset roll-up of the latest composites
// =============================================================================
//
// Pure function over the latest composite per asset plus the market-wide
// fear/greed reading. Recomputed fresh every fusion cycle and cached in
// AppState for the read surface; never persisted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fusion::CompositeSignal;
use crate::runtime_config::PortfolioParams;
use crate::types::{Direction, Momentum};

/// One row of top_buys / top_sells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntry {
    pub asset: String,
    pub score: f64,
    pub label: String,
    /// "high" past the configured conviction threshold, else "moderate".
    pub conviction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub timestamp: DateTime<Utc>,
    pub assets_scored: usize,
    pub top_buys: Vec<RankedEntry>,
    pub top_sells: Vec<RankedEntry>,
    /// From the fear/greed indicator; "unknown" when unavailable.
    pub market_regime: String,
    pub risk_level: String,
    /// "improving" / "degrading" / "mixed" across the asset universe.
    pub signal_momentum: String,
    pub assets_improving: usize,
    pub assets_degrading: usize,
}

pub struct PortfolioAggregator {
    params: PortfolioParams,
}

impl PortfolioAggregator {
    pub fn new(params: PortfolioParams) -> Self {
        Self { params }
    }

    /// Roll the latest composites up into one portfolio view.
    pub fn summarize(
        &self,
        latest: &HashMap<String, CompositeSignal>,
        indicator: Option<f64>,
        now: DateTime<Utc>,
    ) -> PortfolioSummary {
        // Deterministic base order: score desc, ties lexical by symbol.
        let mut ranked: Vec<&CompositeSignal> = latest.values().collect();
        ranked.sort_by(|a, b| {
            b.composite_score
                .partial_cmp(&a.composite_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.asset.cmp(&b.asset))
        });

        let top_buys: Vec<RankedEntry> = ranked
            .iter()
            .take(self.params.top_n)
            .map(|s| self.entry(s, true))
            .collect();

        // Worst scores first; ties still lexical asc.
        let mut worst: Vec<&CompositeSignal> = latest.values().collect();
        worst.sort_by(|a, b| {
            a.composite_score
                .partial_cmp(&b.composite_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.asset.cmp(&b.asset))
        });
        let top_sells: Vec<RankedEntry> = worst
            .iter()
            .take(self.params.top_n)
            .map(|s| self.entry(s, false))
            .collect();

        let improving = latest
            .values()
            .filter(|s| s.momentum == Some(Momentum::Improving))
            .count();
        let degrading = latest
            .values()
            .filter(|s| s.momentum == Some(Momentum::Degrading))
            .count();

        let signal_momentum = if improving > degrading + self.params.momentum_margin {
            "improving"
        } else if degrading > improving + self.params.momentum_margin {
            "degrading"
        } else {
            "mixed"
        }
        .to_string();

        let bearish = latest
            .values()
            .filter(|s| s.direction == Direction::Bearish)
            .count();

        PortfolioSummary {
            timestamp: now,
            assets_scored: latest.len(),
            top_buys,
            top_sells,
            market_regime: self.market_regime(indicator),
            risk_level: self.risk_level(indicator, bearish, latest.len()),
            signal_momentum,
            assets_improving: improving,
            assets_degrading: degrading,
        }
    }

    fn entry(&self, signal: &CompositeSignal, buy_side: bool) -> RankedEntry {
        let threshold = self.params.high_conviction_threshold;
        // Sell-side conviction mirrors the buy threshold around the midpoint.
        let high = if buy_side {
            signal.composite_score >= threshold
        } else {
            signal.composite_score <= 100.0 - threshold
        };
        RankedEntry {
            asset: signal.asset.clone(),
            score: signal.composite_score,
            label: signal.label.clone(),
            conviction: if high { "high" } else { "moderate" }.to_string(),
        }
    }

    fn market_regime(&self, indicator: Option<f64>) -> String {
        let Some(value) = indicator else {
            return "unknown".to_string();
        };
        let t = &self.params.regime_thresholds;
        if value < t.extreme_fear_below {
            "extreme_fear"
        } else if value < t.fear_below {
            "fear"
        } else if value < t.neutral_below {
            "neutral"
        } else if value < t.greed_below {
            "greed"
        } else {
            "extreme_greed"
        }
        .to_string()
    }

    /// First matching rule wins; "unknown" with no indicator or no match.
    fn risk_level(&self, indicator: Option<f64>, bearish: usize, total: usize) -> String {
        let Some(value) = indicator else {
            return "unknown".to_string();
        };
        let bearish_fraction = if total == 0 {
            0.0
        } else {
            bearish as f64 / total as f64
        };
        self.params
            .risk_rules
            .iter()
            .find(|rule| value >= rule.min_indicator && bearish_fraction <= rule.max_bearish_fraction)
            .map(|rule| rule.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
