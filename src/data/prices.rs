//! Price quotes, fallback prices, and the static oracle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::PriceOracle;
use crate::types::PriceMap;

/// Fallback confidence band as a fraction of the price.
const FALLBACK_CONFIDENCE_FRACTION: f64 = 0.01;
/// Fallback price for assets without a known mock value.
const DEFAULT_FALLBACK_PRICE: f64 = 50_000.0;

/// Where a quote's price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    /// Fresh from the upstream feed.
    Live,
    /// Upstream answered without data, or no live source is configured.
    Mock,
    /// Upstream failed; price is a fallback.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub asset: String,
    pub price: f64,
    /// Upstream confidence interval, in price units.
    pub confidence: f64,
    pub status: QuoteStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PriceQuote {
    /// Clearly flagged fallback quote for `asset`.
    pub fn fallback(asset: &str, status: QuoteStatus, error: Option<String>) -> Self {
        let price = fallback_price(asset);
        Self {
            asset: asset.to_uppercase(),
            price,
            confidence: price * FALLBACK_CONFIDENCE_FRACTION,
            status,
            timestamp: Utc::now(),
            error,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == QuoteStatus::Live
    }
}

/// Known mock price for an asset.
pub fn fallback_price(asset: &str) -> f64 {
    match asset.to_uppercase().as_str() {
        "BTC" => 106_632.0,
        "ETH" => 2_650.0,
        "HBAR" => 0.12,
        _ => DEFAULT_FALLBACK_PRICE,
    }
}

/// Quote several assets concurrently, in input order.
pub async fn fetch_quotes(oracle: &dyn PriceOracle, assets: &[String]) -> Vec<PriceQuote> {
    join_all(assets.iter().map(|a| oracle.quote(a))).await
}

/// Collapse quotes into the plain price map the analyzer consumes.
pub fn to_price_map(quotes: &[PriceQuote]) -> PriceMap {
    quotes
        .iter()
        .filter(|q| q.price.is_finite() && q.price > 0.0)
        .map(|q| (q.asset.clone(), q.price))
        .collect()
}

// ---------------------------------------------------------------------------
// Static oracle
// ---------------------------------------------------------------------------

/// Fixed price table. Used when no live feed is configured and in tests.
pub struct StaticOracle {
    prices: HashMap<String, f64>,
}

impl StaticOracle {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .map(|(k, v)| (k.to_uppercase(), v))
                .collect(),
        }
    }

    /// The built-in mock prices.
    pub fn with_mock_prices() -> Self {
        Self::new(
            ["BTC", "ETH", "HBAR"]
                .into_iter()
                .map(|a| (a.to_string(), fallback_price(a)))
                .collect(),
        )
    }
}

#[async_trait]
impl PriceOracle for StaticOracle {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn quote(&self, asset: &str) -> PriceQuote {
        let symbol = asset.to_uppercase();
        match self.prices.get(&symbol) {
            Some(&price) => PriceQuote {
                asset: symbol,
                price,
                confidence: price * FALLBACK_CONFIDENCE_FRACTION,
                status: QuoteStatus::Mock,
                timestamp: Utc::now(),
                error: None,
            },
            None => PriceQuote::fallback(&symbol, QuoteStatus::Mock, None),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_prices() {
        assert_eq!(fallback_price("BTC"), 106_632.0);
        assert_eq!(fallback_price("eth"), 2_650.0);
        assert_eq!(fallback_price("HBAR"), 0.12);
        assert_eq!(fallback_price("DOGE"), 50_000.0);

        let q = PriceQuote::fallback("btc", QuoteStatus::Error, Some("timeout".into()));
        assert_eq!(q.asset, "BTC");
        assert!((q.confidence - 1066.32).abs() < 1e-9);
        assert!(!q.is_live());
    }

    #[test]
    fn test_static_oracle_quotes() {
        let oracle = StaticOracle::new(HashMap::from([("btc".to_string(), 90_000.0)]));
        let q = tokio_test::block_on(oracle.quote("BTC"));
        assert_eq!(q.price, 90_000.0);
        assert_eq!(q.status, QuoteStatus::Mock);

        let q = tokio_test::block_on(oracle.quote("SOL"));
        assert_eq!(q.price, 50_000.0);
    }

    #[test]
    fn test_fetch_quotes_keeps_order_and_builds_map() {
        let oracle = StaticOracle::with_mock_prices();
        let assets = vec!["ETH".to_string(), "BTC".to_string()];
        let quotes = tokio_test::block_on(fetch_quotes(&oracle, &assets));
        assert_eq!(quotes[0].asset, "ETH");
        assert_eq!(quotes[1].asset, "BTC");

        let map = to_price_map(&quotes);
        assert_eq!(map.get("BTC"), Some(&106_632.0));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_price_map_skips_unusable_prices() {
        let mut q = PriceQuote::fallback("BTC", QuoteStatus::Error, None);
        q.price = f64::NAN;
        assert!(to_price_map(&[q]).is_empty());
    }

    #[test]
    fn test_quote_serializes_status_lowercase() {
        let q = PriceQuote::fallback("ETH", QuoteStatus::Mock, None);
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["status"], "mock");
        assert!(json.get("error").is_none());
    }
}
