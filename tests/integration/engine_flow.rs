//! End-to-end flows through the analyzer, throttle, and HTTP API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tower::ServiceExt;

use contrarian::api::{build_router, ApiState};
use contrarian::config::AppConfig;
use contrarian::data::{MarketDataSource, StaticOracle};
use contrarian::reasoning::ReasonerConfig;
use contrarian::strategy::Analyzer;
use contrarian::throttle::RequestThrottle;
use contrarian::types::{Action, AnalysisPath, PriceMap, RiskLevel};

use crate::mock_source::{market, ScriptedSource};

// ---- helpers ---------------------------------------------------------------

fn analyzer_from(cfg: &AppConfig) -> Analyzer {
    Analyzer::from_config(
        &cfg.reasoner,
        &cfg.reasoning,
        cfg.risk.clone(),
        cfg.price_targets.clone(),
    )
}

fn default_analyzer() -> Analyzer {
    analyzer_from(&AppConfig::default())
}

fn btc_prices(price: f64) -> PriceMap {
    PriceMap::from([("BTC".to_string(), price)])
}

// ---- worked examples -------------------------------------------------------

#[test]
fn test_heavily_favored_a_recommends_b() {
    let now = Utc::now();
    let m = market("ex1", "Will HBAR flip ETH?", 85, 15, dec!(15000), now, 14);
    let rec = default_analyzer().analyze_at(&m, None, now);

    assert_eq!(rec.recommendation, Action::BuyB);
    assert!((rec.confidence - 0.70).abs() < 1e-9);
    assert_eq!(rec.risk_level, RiskLevel::Low);
    assert!(rec.is_actionable(0.6));
}

#[test]
fn test_balanced_market_holds_with_volume_driven_risk() {
    let now = Utc::now();
    let analyzer = default_analyzer();

    let medium = market("ex2", "Coin flip", 50, 50, dec!(2500), now, 14);
    let rec = analyzer.analyze_at(&medium, None, now);
    assert_eq!(rec.recommendation, Action::Hold);
    assert_eq!(rec.confidence, 0.5);
    assert_eq!(rec.risk_level, RiskLevel::Medium);
    assert!(!rec.is_actionable(0.0));

    // Below 1000 PYUSD the volume rule marks the market high risk.
    let thin = market("ex2b", "Coin flip", 50, 50, dec!(500), now, 14);
    let rec = analyzer.analyze_at(&thin, None, now);
    assert_eq!(rec.recommendation, Action::Hold);
    assert_eq!(rec.risk_level, RiskLevel::High);
}

#[test]
fn test_idle_btc_market_uses_price_distance() {
    let now = Utc::now();
    let m = market(
        "ex3",
        "Will Bitcoin reach $150,000 by December 31, 2025?",
        0,
        0,
        dec!(0),
        now,
        75,
    );
    // 40% below target
    let rec = default_analyzer().analyze_at(&m, Some(&btc_prices(107_142.86)), now);

    assert_eq!(rec.recommendation, Action::BuyA);
    assert!(rec.confidence >= 0.70 && rec.confidence <= 0.75);
    assert_eq!(rec.risk_level, RiskLevel::Medium);
    assert_eq!(rec.path, AnalysisPath::PriceContext);
}

#[test]
fn test_throttle_rejects_31st_request_per_identity() {
    let throttle = RequestThrottle::new(&AppConfig::default().throttle);
    let now = Utc::now();

    for i in 0..30 {
        assert!(throttle.admit("user1", now + Duration::seconds(i)));
    }
    assert!(!throttle.admit("user1", now + Duration::seconds(31)));
    assert!(throttle.admit("user2", now + Duration::seconds(31)));
}

// ---- properties ------------------------------------------------------------

#[test]
fn test_symbolic_and_heuristic_agree_on_direction() {
    let now = Utc::now();
    let symbolic = default_analyzer();
    let heuristic = analyzer_from(&AppConfig {
        reasoner: ReasonerConfig {
            symbolic_enabled: false,
            rules: None,
        },
        ..AppConfig::default()
    });
    assert_eq!(symbolic.reasoner_name(), "symbolic");
    assert_eq!(heuristic.reasoner_name(), "heuristic");

    for a in (0..=100u64).filter(|a| *a > 70 || *a < 30) {
        let m = market("p", "Property", a, 100 - a, dec!(3000), now, 14);
        let s = symbolic.analyze_at(&m, None, now);
        let h = heuristic.analyze_at(&m, None, now);
        assert_eq!(s.recommendation, h.recommendation, "a={a}");
        assert!(s.recommendation.is_directional(), "a={a}");
    }
}

#[test]
fn test_confidence_never_decreases_with_stronger_bias() {
    let now = Utc::now();
    let analyzer = default_analyzer();
    let mut last = 0.0;
    for a in 71..=100u64 {
        let m = market("p", "Property", a, 100 - a, dec!(3000), now, 14);
        let rec = analyzer.analyze_at(&m, None, now);
        assert_eq!(rec.recommendation, Action::BuyB);
        assert!(rec.confidence >= last, "a={a}");
        last = rec.confidence;
    }
}

#[test]
fn test_repeated_analysis_is_identical_apart_from_timestamp() {
    let now = Utc::now();
    let analyzer = default_analyzer();
    let m = market("p", "Property", 33, 67, dec!(700), now, 40);
    let first = analyzer.analyze(&m, None);
    let second = analyzer.analyze(&m, None);
    assert_eq!(first.without_timestamp(), second.without_timestamp());
}

#[test]
fn test_broken_rule_program_falls_back_to_heuristic() {
    let cfg = AppConfig::from_toml_str(
        r#"
        [reasoner]
        rules = "(contrarian BUY_B (> RATIO"
        "#,
    )
    .unwrap();
    let analyzer = analyzer_from(&cfg);
    assert_eq!(analyzer.reasoner_name(), "heuristic");

    let now = Utc::now();
    let m = market("p", "Property", 68, 32, dec!(3000), now, 14);
    let rec = analyzer.analyze_at(&m, None, now);
    assert_eq!(rec.recommendation, Action::BuyB);
    assert_eq!(rec.confidence, 0.65);
    assert_eq!(rec.path, AnalysisPath::Heuristic);
}

#[test]
fn test_custom_rule_program_is_used() {
    let cfg = AppConfig::from_toml_str(
        r#"
        [reasoner]
        rules = "(contrarian BUY_B (>= RATIO 0.6))"
        "#,
    )
    .unwrap();
    let analyzer = analyzer_from(&cfg);
    assert_eq!(analyzer.reasoner_name(), "symbolic");

    let now = Utc::now();
    let m = market("p", "Property", 62, 38, dec!(3000), now, 14);
    let rec = analyzer.analyze_at(&m, None, now);
    assert_eq!(rec.recommendation, Action::BuyB);
    assert_eq!(rec.confidence, 0.6);
    assert_eq!(rec.path, AnalysisPath::Symbolic);
}

// ---- HTTP ------------------------------------------------------------------

#[tokio::test]
async fn test_api_serves_nothing_when_source_is_down() {
    let now = Utc::now();
    let source = Arc::new(ScriptedSource::new(vec![market(
        "1", "Will ETH flip BTC?", 80, 20, dec!(9000), now, 30,
    )]));
    let state = Arc::new(ApiState {
        analyzer: default_analyzer(),
        markets: source.clone() as Arc<dyn MarketDataSource>,
        oracle: Arc::new(StaticOracle::with_mock_prices()),
        throttle: RequestThrottle::new(&AppConfig::default().throttle),
        agent: AppConfig::default().agent,
        price_assets: vec!["BTC".into()],
        started_at: now,
    });
    let app = build_router(state);
    let request = || {
        Request::builder()
            .method("POST")
            .uri("/analyze-market")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"marketId": "1"}"#))
            .unwrap()
    };

    let resp = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    source.set_failing(true);
    let resp = app.oneshot(request()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(source.fetch_count(), 2);
}
