// =============================================================================
// HTTP collaborator clients
// =============================================================================
//
// Concrete clients for the scorer agents, CoinGecko prices, and the
// alternative.me Fear & Greed index. All requests share a 10 s client timeout;
// failures map to CollaboratorError and are absorbed per asset upstream.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::collaborators::{DimensionScorer, PriceFeed, RegimeIndicator};
use crate::errors::CollaboratorError;
use crate::fusion::DimensionScore;
use crate::types::Dimension;

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// =============================================================================
// Dimension scorer agents
// =============================================================================

/// Wire shape returned by a scorer agent.
#[derive(Debug, Deserialize)]
struct ScorerResponse {
    score: f64,
    label: String,
    #[serde(default)]
    detail: Option<String>,
}

/// Calls the per-dimension scorer agents over HTTP:
/// `GET {base_url}/score/{dimension}/{asset}`.
pub struct HttpDimensionScorer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDimensionScorer {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DimensionScorer for HttpDimensionScorer {
    async fn score(
        &self,
        asset: &str,
        dimension: Dimension,
    ) -> Result<DimensionScore, CollaboratorError> {
        let url = format!("{}/score/{}/{}", self.base_url, dimension, asset);
        let name = format!("{dimension} scorer");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable(&name, e))?;

        if !resp.status().is_success() {
            return Err(CollaboratorError::unavailable(
                &name,
                format!("HTTP {}", resp.status()),
            ));
        }

        let body: ScorerResponse = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::unavailable(&name, e))?;

        debug!(asset = %asset, dimension = %dimension, score = body.score, "dimension scored");

        Ok(DimensionScore {
            dimension,
            score: body.score,
            label: body.label,
            detail: body.detail,
            weight: 0.0,
        })
    }
}

// =============================================================================
// CoinGecko price feed
// =============================================================================

const COINGECKO_BASE: &str = "https://api.coingecko.com/api/v3";

/// Symbol -> CoinGecko id for the default universe. Unknown symbols fall back
/// to the lowercased symbol.
fn coingecko_id(asset: &str) -> String {
    match asset.to_ascii_uppercase().as_str() {
        "BTC" => "bitcoin",
        "ETH" => "ethereum",
        "SOL" => "solana",
        "BNB" => "binancecoin",
        "XRP" => "ripple",
        "ADA" => "cardano",
        "AVAX" => "avalanche-2",
        "DOT" => "polkadot",
        "MATIC" => "matic-network",
        "LINK" => "chainlink",
        "UNI" => "uniswap",
        "ATOM" => "cosmos",
        "LTC" => "litecoin",
        "FIL" => "filecoin",
        "NEAR" => "near",
        "APT" => "aptos",
        "ARB" => "arbitrum",
        "OP" => "optimism",
        "INJ" => "injective-protocol",
        "SUI" => "sui",
        other => return other.to_ascii_lowercase(),
    }
    .to_string()
}

pub struct PriceClient {
    client: reqwest::Client,
    base_url: String,
}

impl PriceClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
            base_url: COINGECKO_BASE.to_string(),
        }
    }

}

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    /// [unix_millis, price] pairs.
    prices: Vec<(i64, f64)>,
}

#[async_trait]
impl PriceFeed for PriceClient {
    async fn spot_price(&self, asset: &str) -> Result<f64, CollaboratorError> {
        let id = coingecko_id(asset);
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, id
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable("price feed", e))?;

        if !resp.status().is_success() {
            return Err(CollaboratorError::unavailable(
                "price feed",
                format!("HTTP {}", resp.status()),
            ));
        }

        let body: HashMap<String, HashMap<String, f64>> = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::unavailable("price feed", e))?;

        body.get(&id)
            .and_then(|prices| prices.get("usd"))
            .copied()
            .ok_or_else(|| {
                CollaboratorError::unavailable("price feed", format!("no usd price for {id}"))
            })
    }

    /// Nearest recorded price to `at`, from the hourly market chart around
    /// that instant. None when the range has no datapoints yet.
    async fn price_at(
        &self,
        asset: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<f64>, CollaboratorError> {
        let id = coingecko_id(asset);
        let from = (at - chrono::Duration::hours(2)).timestamp();
        let to = (at + chrono::Duration::hours(2)).timestamp();
        let url = format!(
            "{}/coins/{}/market_chart/range?vs_currency=usd&from={}&to={}",
            self.base_url, id, from, to
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable("price feed", e))?;

        if !resp.status().is_success() {
            return Err(CollaboratorError::unavailable(
                "price feed",
                format!("HTTP {}", resp.status()),
            ));
        }

        let body: MarketChartResponse = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::unavailable("price feed", e))?;

        let target_millis = at.timestamp_millis();
        let nearest = body
            .prices
            .iter()
            .min_by_key(|(ts, _)| (ts - target_millis).abs())
            .map(|(_, price)| *price);

        Ok(nearest)
    }
}

// =============================================================================
// Fear & Greed index (alternative.me)
// =============================================================================

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
}

pub struct FearGreedClient {
    client: reqwest::Client,
    base_url: String,
}

impl FearGreedClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
            base_url: "https://api.alternative.me".to_string(),
        }
    }
}

#[async_trait]
impl RegimeIndicator for FearGreedClient {
    async fn fear_greed(&self) -> Result<f64, CollaboratorError> {
        let url = format!("{}/fng/?limit=1", self.base_url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable("fear/greed index", e))?;

        if !resp.status().is_success() {
            return Err(CollaboratorError::unavailable(
                "fear/greed index",
                format!("HTTP {}", resp.status()),
            ));
        }

        let body: FngResponse = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::unavailable("fear/greed index", e))?;

        let entry = body.data.first().ok_or_else(|| {
            CollaboratorError::unavailable("fear/greed index", "empty data array")
        })?;

        entry.value.parse::<f64>().map_err(|e| {
            CollaboratorError::unavailable("fear/greed index", format!("bad value: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_symbols_map_to_coingecko_ids() {
        assert_eq!(coingecko_id("BTC"), "bitcoin");
        assert_eq!(coingecko_id("btc"), "bitcoin");
        assert_eq!(coingecko_id("AVAX"), "avalanche-2");
        assert_eq!(coingecko_id("PEPE"), "pepe");
    }

    #[test]
    fn scorer_response_parses_without_detail() {
        let body: ScorerResponse =
            serde_json::from_str(r#"{"score": 63.5, "label": "hot narrative"}"#).unwrap();
        assert!((body.score - 63.5).abs() < 1e-9);
        assert!(body.detail.is_none());
    }

    #[test]
    fn fng_response_parses() {
        let body: FngResponse = serde_json::from_str(
            r#"{"name":"Fear and Greed Index","data":[{"value":"34","value_classification":"Fear"}]}"#,
        )
        .unwrap();
        assert_eq!(body.data[0].value, "34");
    }
}
