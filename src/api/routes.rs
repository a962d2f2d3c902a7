//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.
//! Analysis endpoints are throttled per caller identity, taken from the
//! `x-client-id` header.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AgentConfig;
use crate::data::prices::{fetch_quotes, to_price_map};
use crate::data::{MarketDataSource, PriceOracle, PriceQuote};
use crate::strategy::Analyzer;
use crate::throttle::RequestThrottle;
use crate::types::{EngineError, MarketSnapshot, Recommendation};

pub const CLIENT_ID_HEADER: &str = "x-client-id";
const ANONYMOUS: &str = "anonymous";

/// Words too common in market titles to count as a query match.
const STOP_WORDS: &[&str] = &[
    "the", "will", "and", "for", "what", "which", "should", "show", "market", "markets",
    "analyze", "analysis", "reach", "by", "end",
];

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub analyzer: Analyzer,
    pub markets: Arc<dyn MarketDataSource>,
    pub oracle: Arc<dyn PriceOracle>,
    pub throttle: RequestThrottle,
    pub agent: AgentConfig,
    /// Assets quoted ahead of each analysis.
    pub price_assets: Vec<String>,
    pub started_at: DateTime<Utc>,
}

pub type AppState = Arc<ApiState>;

impl ApiState {
    /// Admit the caller or produce a 429.
    fn admit(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        let identity = client_identity(headers);
        self.throttle.try_admit(&identity, Utc::now())?;
        Ok(identity)
    }

    async fn current_prices(&self) -> Vec<PriceQuote> {
        fetch_quotes(self.oracle.as_ref(), &self.price_assets).await
    }
}

/// Caller identity from the `x-client-id` header.
pub fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string()
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    retry_after_secs: Option<i64>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after_secs: None,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::ThrottleExceeded {
                retry_after_secs, ..
            } => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: e.to_string(),
                retry_after_secs: Some(retry_after_secs),
            },
            EngineError::InsufficientSignal { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            EngineError::UpstreamData { .. } => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
            EngineError::ReasonerUnavailable(_) | EngineError::Config(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut resp = (self.status, Json(json!({ "error": self.message }))).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
                resp.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }
        resp
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// String or numeric market id; absent means "first market".
    #[serde(default)]
    pub market_id: Option<Value>,
}

impl AnalyzeRequest {
    fn market_id(&self) -> Option<String> {
        match &self.market_id {
            Some(Value::String(s)) if !s.is_empty() && s != "unknown" => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub market_title: String,
    pub market_data: MarketSnapshot,
    pub prices: Vec<PriceQuote>,
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub message: String,
    pub analysis: Vec<Recommendation>,
    #[serde(rename = "type")]
    pub kind: String,
    pub opportunities: usize,
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PricesParams {
    pub symbols: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PricesResponse {
    pub prices: BTreeMap<String, PriceQuote>,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub agent_name: String,
    pub reasoner: String,
    pub market_source: String,
    pub price_oracle: String,
    pub capabilities: Vec<String>,
    pub configuration: StatusConfiguration,
    pub uptime_secs: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusConfiguration {
    pub min_confidence: f64,
    pub throttle_window_secs: i64,
    pub throttle_max_requests: usize,
    pub price_assets: Vec<String>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "agent": state.agent.name,
    }))
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let mut capabilities = vec![
        "market_analysis".to_string(),
        "contrarian_analysis".to_string(),
        "price_context".to_string(),
        "betting_recommendations".to_string(),
    ];
    if state.analyzer.reasoner_name() == "symbolic" {
        capabilities.push("symbolic_reasoning".to_string());
    }

    Json(StatusResponse {
        status: "online".into(),
        agent_name: state.agent.name.clone(),
        reasoner: state.analyzer.reasoner_name().into(),
        market_source: state.markets.name().into(),
        price_oracle: state.oracle.name().into(),
        capabilities,
        configuration: StatusConfiguration {
            min_confidence: state.agent.min_confidence,
            throttle_window_secs: state.throttle.window_secs(),
            throttle_max_requests: state.throttle.cap(),
            price_assets: state.price_assets.clone(),
        },
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        timestamp: Utc::now(),
    })
}

/// POST /analyze-market
pub async fn analyze_market(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<AnalyzeRequest>>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let identity = state.admit(&headers)?;
    let request_id = uuid::Uuid::new_v4().to_string();
    let wanted = body.map(|Json(b)| b).unwrap_or_default().market_id();

    let markets = state.markets.fetch_markets().await;
    let market = wanted
        .as_deref()
        .and_then(|id| markets.iter().find(|m| m.id == id))
        .or_else(|| markets.first())
        .cloned()
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "No market data available"))?;

    let quotes = state.current_prices().await;
    let prices = to_price_map(&quotes);
    let recommendation = state.analyzer.analyze(&market, Some(&prices));

    info!(
        request_id = %request_id,
        identity = %identity,
        requested = ?wanted,
        market_id = %market.id,
        action = %recommendation.recommendation,
        confidence = format!("{:.2}", recommendation.confidence),
        "Market analyzed"
    );

    Ok(Json(AnalyzeResponse {
        recommendation,
        market_title: market.title.clone(),
        market_data: market,
        prices: quotes,
        request_id,
    }))
}

/// POST /query
pub async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let identity = state.admit(&headers)?;
    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Query is required"));
    }
    let request_id = uuid::Uuid::new_v4().to_string();

    let markets = state.markets.fetch_markets().await;
    let mut selected = match_markets(query, &markets);
    let matched = !selected.is_empty();
    if !matched {
        selected = markets
            .iter()
            .take(state.agent.query_fallback_count)
            .collect();
    }

    let quotes = state.current_prices().await;
    let prices = to_price_map(&quotes);
    let now = Utc::now();
    let analysis: Vec<Recommendation> = selected
        .iter()
        .map(|m| state.analyzer.analyze_at(m, Some(&prices), now))
        .collect();
    let actionable: Vec<&Recommendation> = analysis
        .iter()
        .filter(|r| r.is_actionable(state.agent.min_confidence))
        .collect();
    let opportunities = actionable.len();
    let best_return_pct = actionable
        .iter()
        .map(|r| r.expected_return_pct())
        .fold(None, |best: Option<f64>, pct| Some(best.map_or(pct, |b| b.max(pct))));

    info!(
        request_id = %request_id,
        identity = %identity,
        matched,
        analyzed = analysis.len(),
        opportunities,
        has_parameters = req.parameters.is_some(),
        "Query processed"
    );

    let kind = if analysis.is_empty() {
        "general_response"
    } else {
        "market_analysis"
    };
    let message = if analysis.is_empty() {
        format!("Processed query: \"{query}\". No market data available right now.")
    } else {
        let mut message = format!(
            "Analyzed {} markets based on query: \"{query}\". Found {opportunities} betting \
             opportunities at or above {:.0}% confidence.",
            analysis.len(),
            state.agent.min_confidence * 100.0
        );
        if let Some(pct) = best_return_pct {
            message.push_str(&format!(" Best expected return: +{pct:.0}%."));
        }
        message
    };

    Ok(Json(QueryResponse {
        message,
        analysis,
        kind: kind.to_string(),
        opportunities,
        request_id,
    }))
}

/// GET /prices?symbols=BTC,ETH
pub async fn get_prices(
    State(state): State<AppState>,
    Query(params): Query<PricesParams>,
) -> Json<PricesResponse> {
    let assets: Vec<String> = match params.symbols.as_deref() {
        Some(s) if !s.trim().is_empty() => s
            .split(',')
            .map(|a| a.trim().to_uppercase())
            .filter(|a| !a.is_empty())
            .collect(),
        _ => state.price_assets.clone(),
    };

    let quotes = fetch_quotes(state.oracle.as_ref(), &assets).await;
    if quotes.iter().any(|q| !q.is_live()) {
        warn!(oracle = state.oracle.name(), "Serving fallback prices");
    }

    Json(PricesResponse {
        prices: quotes.into_iter().map(|q| (q.asset.clone(), q)).collect(),
        timestamp: Utc::now(),
        status: "success".into(),
    })
}

/// Markets whose titles share a significant word with the query.
pub fn match_markets<'a>(query: &str, markets: &'a [MarketSnapshot]) -> Vec<&'a MarketSnapshot> {
    let words: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        return Vec::new();
    }

    markets
        .iter()
        .filter(|m| {
            let title = m.title.to_lowercase();
            title
                .split(|c: char| !c.is_alphanumeric())
                .any(|t| words.iter().any(|w| w == t))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockMarketSource;

    async fn sample_markets() -> Vec<MarketSnapshot> {
        MockMarketSource::default().fetch_markets().await
    }

    #[test]
    fn test_client_identity() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers), "anonymous");
        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static("  user1 "));
        assert_eq!(client_identity(&headers), "user1");
        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static(""));
        assert_eq!(client_identity(&headers), "anonymous");
    }

    #[test]
    fn test_analyze_request_market_id_forms() {
        let r: AnalyzeRequest = serde_json::from_str(r#"{"marketId": 3}"#).unwrap();
        assert_eq!(r.market_id().as_deref(), Some("3"));
        let r: AnalyzeRequest = serde_json::from_str(r#"{"marketId": "2"}"#).unwrap();
        assert_eq!(r.market_id().as_deref(), Some("2"));
        let r: AnalyzeRequest = serde_json::from_str(r#"{"marketId": "unknown"}"#).unwrap();
        assert_eq!(r.market_id(), None);
        let r: AnalyzeRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(r.market_id(), None);
    }

    #[tokio::test]
    async fn test_match_markets_by_title_words() {
        let markets = sample_markets().await;
        let hits = match_markets("what about hedera?", &markets);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].title.contains("HBAR"));

        let hits = match_markets("bitcoin", &markets);
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_match_markets_ignores_stop_words() {
        let markets = sample_markets().await;
        assert!(match_markets("analyze the markets", &markets).is_empty());
        assert!(match_markets("", &markets).is_empty());
    }

    #[test]
    fn test_throttle_error_maps_to_429() {
        let err: ApiError = EngineError::ThrottleExceeded {
            identity: "u".into(),
            retry_after_secs: 42,
        }
        .into();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "42");
    }
}
