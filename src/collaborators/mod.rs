// =============================================================================
// Consumed collaborators
// =============================================================================
//
// The engine consumes three kinds of external services: the five dimension
// scorers, a spot/historical price feed, and the market-wide fear/greed
// indicator. Each is a trait so the orchestrator and evaluator can be tested
// against in-process mocks.

pub mod http;

pub use http::{FearGreedClient, HttpDimensionScorer, PriceClient};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::CollaboratorError;
use crate::fusion::DimensionScore;
use crate::types::Dimension;

/// Produces one dimension's score for one asset.
#[async_trait]
pub trait DimensionScorer: Send + Sync {
    async fn score(
        &self,
        asset: &str,
        dimension: Dimension,
    ) -> Result<DimensionScore, CollaboratorError>;
}

/// Spot and historical prices. `price_at` returns None when the price for the
/// requested instant is not (yet) available; the caller defers, it is not an
/// error.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn spot_price(&self, asset: &str) -> Result<f64, CollaboratorError>;

    async fn price_at(
        &self,
        asset: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<f64>, CollaboratorError>;
}

/// Market-wide fear/greed reading in [0, 100].
#[async_trait]
pub trait RegimeIndicator: Send + Sync {
    async fn fear_greed(&self) -> Result<f64, CollaboratorError>;
}
