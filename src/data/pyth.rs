//! Pyth Network price oracle.
//!
//! Reads the latest price feeds from the Hermes REST service.
//!
//! API: `https://hermes.pyth.network/api/latest_price_feeds?ids[]={feed_id}`
//! Auth: none for the public endpoint; dedicated endpoints accept an
//! `x-api-key` header.
//!
//! Prices are fixed-point: the real value is `price * 10^expo`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::prices::{PriceQuote, QuoteStatus};
use super::PriceOracle;
use crate::config::{AppConfig, OracleConfig};
use crate::types::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const HERMES_ENDPOINT: &str = "https://hermes.pyth.network/api/latest_price_feeds";
const SOURCE_NAME: &str = "pyth";

/// Built-in feed ids (USD pairs).
pub fn default_feeds() -> HashMap<String, String> {
    HashMap::from([
        (
            "BTC".to_string(),
            "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43".to_string(),
        ),
        (
            "ETH".to_string(),
            "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace".to_string(),
        ),
        (
            "HBAR".to_string(),
            "0x8ac0c70fff57e9aefdf5edf44b51d62c2d433653cbb2cf5cc06bb115af04d221".to_string(),
        ),
    ])
}

// ---------------------------------------------------------------------------
// Hermes response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HermesFeed {
    #[serde(default)]
    id: String,
    price: HermesPrice,
}

#[derive(Debug, Deserialize)]
struct HermesPrice {
    /// Integer mantissa, sent as a string.
    price: String,
    conf: String,
    expo: i32,
    publish_time: i64,
}

impl HermesPrice {
    fn scaled(raw: &str, expo: i32) -> Result<f64> {
        let mantissa: i64 = raw
            .parse()
            .with_context(|| format!("Invalid Pyth mantissa '{raw}'"))?;
        Ok(mantissa as f64 * 10f64.powi(expo))
    }

    fn to_quote(&self, asset: &str) -> Result<PriceQuote> {
        let price = Self::scaled(&self.price, self.expo)?;
        let confidence = Self::scaled(&self.conf, self.expo)?;
        let timestamp = DateTime::<Utc>::from_timestamp(self.publish_time, 0).unwrap_or_else(Utc::now);
        Ok(PriceQuote {
            asset: asset.to_string(),
            price,
            confidence,
            status: QuoteStatus::Live,
            timestamp,
            error: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

pub struct PythOracle {
    http: Client,
    endpoint: String,
    feeds: HashMap<String, String>,
    api_key: Option<SecretString>,
}

impl PythOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent("contrarian/0.1.0")
            .build()
            .context("Failed to build Pyth HTTP client")?;

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| AppConfig::resolve_env(var).ok())
            .filter(|k| !k.is_empty())
            .map(SecretString::new);

        let mut feeds = default_feeds();
        feeds.extend(
            config
                .feeds
                .iter()
                .map(|(asset, id)| (asset.to_uppercase(), id.clone())),
        );

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            feeds,
            api_key,
        })
    }

    pub fn feed_id(&self, asset: &str) -> Option<&str> {
        self.feeds.get(&asset.to_uppercase()).map(String::as_str)
    }

    fn feed_url(&self, feed_id: &str) -> String {
        format!(
            "{}?{}={}",
            self.endpoint,
            urlencoding::encode("ids[]"),
            urlencoding::encode(feed_id)
        )
    }

    async fn request_feeds(&self, feed_id: &str) -> Result<Option<Vec<HermesFeed>>> {
        let mut req = self.http.get(self.feed_url(feed_id));
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key.expose_secret().as_str());
        }

        let resp = req.send().await.context("Pyth request failed")?;
        if !resp.status().is_success() {
            debug!(status = %resp.status(), feed_id, "Pyth returned non-success status");
            return Ok(None);
        }

        let feeds: Vec<HermesFeed> = resp
            .json()
            .await
            .context("Failed to parse Pyth price feeds")?;
        Ok(Some(feeds))
    }

    /// Live quote, `Ok(None)` when Hermes has nothing for this asset.
    async fn fetch_live(&self, asset: &str) -> Result<Option<PriceQuote>, EngineError> {
        let Some(feed_id) = self.feed_id(asset) else {
            return Ok(None);
        };

        let upstream = |e: anyhow::Error| EngineError::UpstreamData {
            source_name: SOURCE_NAME.to_string(),
            message: format!("{e:#}"),
        };

        let Some(feeds) = self.request_feeds(feed_id).await.map_err(upstream)? else {
            return Ok(None);
        };
        match feeds.first() {
            Some(feed) => {
                debug!(asset, feed = %feed.id, "Pyth feed received");
                feed.price.to_quote(asset).map(Some).map_err(upstream)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PriceOracle for PythOracle {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn quote(&self, asset: &str) -> PriceQuote {
        let symbol = asset.to_uppercase();
        match self.fetch_live(&symbol).await {
            Ok(Some(quote)) => quote,
            Ok(None) => {
                debug!(asset = %symbol, "No live Pyth price, using mock");
                PriceQuote::fallback(&symbol, QuoteStatus::Mock, None)
            }
            Err(e) => {
                warn!(asset = %symbol, error = %e, "Pyth price fetch failed, using fallback");
                PriceQuote::fallback(&symbol, QuoteStatus::Error, Some(e.to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
