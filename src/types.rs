//! Shared types for the contrarian engine.
//!
//! Market snapshots flow in, recommendations flow out. Everything in
//! between (reasoners, price context, risk annotation) speaks in terms
//! of the types defined here.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Asset symbol → reference price, already resolved by a price oracle.
pub type PriceMap = HashMap<String, f64>;

// ---------------------------------------------------------------------------
// Market snapshot
// ---------------------------------------------------------------------------

/// Immutable view of a binary market at the time of analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub id: String,
    pub title: String,
    /// Label of the first outcome (the "yes" side).
    pub option_a: String,
    /// Label of the second outcome (the "no" side).
    pub option_b: String,
    pub option_a_shares: u64,
    pub option_b_shares: u64,
    /// Total pooled stake, in PYUSD.
    pub total_pool: Decimal,
    /// Resolution deadline.
    pub end_time: DateTime<Utc>,
}

impl fmt::Display for MarketSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (A: {:.0}% | B: {:.0}% | pool: {} PYUSD)",
            self.id,
            self.title,
            self.option_a_ratio() * 100.0,
            self.option_b_ratio() * 100.0,
            self.total_pool.round_dp(2),
        )
    }
}

impl MarketSnapshot {
    pub fn total_shares(&self) -> u64 {
        self.option_a_shares.saturating_add(self.option_b_shares)
    }

    /// Whether any stake has been placed on either side.
    pub fn has_activity(&self) -> bool {
        self.total_shares() > 0
    }

    /// Fraction of shares on option A. 0.5 for an empty market.
    pub fn option_a_ratio(&self) -> f64 {
        let total = self.total_shares();
        if total == 0 {
            return 0.5;
        }
        normalize_ratio(self.option_a_shares as f64 / total as f64)
    }

    pub fn option_b_ratio(&self) -> f64 {
        1.0 - self.option_a_ratio()
    }

    /// Pool volume as a float for display and factor math.
    pub fn volume(&self) -> f64 {
        self.total_pool.to_f64().unwrap_or(0.0).max(0.0)
    }

    /// Days until the deadline (negative once the market has closed).
    pub fn days_remaining(&self, now: DateTime<Utc>) -> f64 {
        (self.end_time - now).num_seconds() as f64 / 86_400.0
    }

    /// Helper to build a test/sample market with sensible defaults.
    #[cfg(test)]
    pub fn sample(option_a_shares: u64, option_b_shares: u64, total_pool: Decimal) -> Self {
        MarketSnapshot {
            id: "test-001".to_string(),
            title: "Will HBAR reach $1 by end of 2025?".to_string(),
            option_a: "Yes".to_string(),
            option_b: "No".to_string(),
            option_a_shares,
            option_b_shares,
            total_pool,
            end_time: Utc::now() + chrono::Duration::days(14),
        }
    }
}

/// Clamp a ratio into [0, 1]; NaN becomes the neutral 0.5.
pub fn normalize_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        0.5
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    BuyA,
    BuyB,
    Hold,
    Wait,
}

impl Action {
    /// Whether the action commits to one side of the market.
    pub fn is_directional(&self) -> bool {
        matches!(self, Action::BuyA | Action::BuyB)
    }

    /// The side this action buys, if any.
    pub fn side(&self) -> Option<OptionSide> {
        match self {
            Action::BuyA => Some(OptionSide::A),
            Action::BuyB => Some(OptionSide::B),
            Action::Hold | Action::Wait => None,
        }
    }

    /// Parse the tag used by the rule language (`BUY_A`, `BUY_B`, ...).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "BUY_A" => Some(Action::BuyA),
            "BUY_B" => Some(Action::BuyB),
            "HOLD" => Some(Action::Hold),
            "WAIT" => Some(Action::Wait),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::BuyA => write!(f, "BUY_A"),
            Action::BuyB => write!(f, "BUY_B"),
            Action::Hold => write!(f, "HOLD"),
            Action::Wait => write!(f, "WAIT"),
        }
    }
}

/// One of the two outcomes of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionSide {
    A,
    B,
}

impl OptionSide {
    pub fn opposite(&self) -> Self {
        match self {
            OptionSide::A => OptionSide::B,
            OptionSide::B => OptionSide::A,
        }
    }

    /// The action that buys this side.
    pub fn buy(&self) -> Action {
        match self {
            OptionSide::A => Action::BuyA,
            OptionSide::B => Action::BuyB,
        }
    }
}

/// Risk tier, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// One step more severe, saturating at `High`.
    pub fn escalate(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium | RiskLevel::High => RiskLevel::High,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Which upstream layer produced the bias signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPath {
    Symbolic,
    Heuristic,
    PriceContext,
}

impl fmt::Display for AnalysisPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisPath::Symbolic => write!(f, "symbolic"),
            AnalysisPath::Heuristic => write!(f, "heuristic"),
            AnalysisPath::PriceContext => write!(f, "price_context"),
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// How far a market (or a price proxy) deviates from a 50/50 split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasSignal {
    /// 0.0 = perfectly balanced, 1.0 = all on one side.
    pub strength: f64,
    /// Side the crowd (or the price proxy) favors.
    pub favored: Option<OptionSide>,
}

impl BiasSignal {
    /// Bias implied by an option-A ratio.
    pub fn from_ratio(option_a_ratio: f64) -> Self {
        let a = normalize_ratio(option_a_ratio);
        let favored = if a > 0.5 {
            Some(OptionSide::A)
        } else if a < 0.5 {
            Some(OptionSide::B)
        } else {
            None
        };
        Self {
            strength: ((a - 0.5).abs() * 2.0).min(1.0),
            favored,
        }
    }

    pub fn neutral() -> Self {
        Self {
            strength: 0.0,
            favored: None,
        }
    }
}

/// Tier of the contrarian signal, used to derive expected value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum SignalTier {
    /// A heavily favored side; `underdog_ratio` is the minority share.
    Strong { underdog_ratio: f64 },
    /// A 60/40-or-wider skew below the strong threshold.
    Moderate,
    Neutral,
}

/// Output of a reasoning layer before risk annotation and assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub action: Action,
    pub confidence: f64,
    pub tier: SignalTier,
    pub reasoning: String,
    /// Volume-seeded risk tier, refined later by the annotator.
    pub risk: RiskLevel,
    pub path: AnalysisPath,
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// One contributing factor, for explainability only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorEntry {
    pub name: String,
    /// Relative importance hint in [0, 1]; weights need not sum to 1.
    pub weight: f64,
    pub value: f64,
    pub description: String,
}

impl FactorEntry {
    pub fn new(name: &str, weight: f64, value: f64, description: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            weight,
            value,
            description: description.into(),
        }
    }
}

/// Final engine output. Created fresh per request and owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub market_id: String,
    pub recommendation: Action,
    pub confidence: f64,
    pub reasoning: String,
    pub risk_level: RiskLevel,
    pub expected_value: f64,
    pub factors: Vec<FactorEntry>,
    pub bias: BiasSignal,
    pub path: AnalysisPath,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Market {}: {} (confidence {:.1}%, risk {}, EV {:.2}, via {})",
            self.market_id,
            self.recommendation,
            self.confidence * 100.0,
            self.risk_level,
            self.expected_value,
            self.path,
        )
    }
}

impl Recommendation {
    /// Whether the recommendation is a directional bet at or above the
    /// given confidence.
    pub fn is_actionable(&self, min_confidence: f64) -> bool {
        self.recommendation.is_directional() && self.confidence >= min_confidence
    }

    /// Expected return in percent (0 when at or below breakeven).
    pub fn expected_return_pct(&self) -> f64 {
        ((self.expected_value - 1.0) * 100.0).max(0.0)
    }

    /// Same recommendation with the timestamp zeroed, for comparisons that
    /// should ignore generation time.
    pub fn without_timestamp(&self) -> Self {
        Self {
            timestamp: DateTime::<Utc>::default(),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the engine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Symbolic reasoner unavailable: {0}")]
    ReasonerUnavailable(String),

    #[error("Insufficient signal for market {market_id}: {reason}")]
    InsufficientSignal { market_id: String, reason: String },

    #[error("Upstream data error ({source_name}): {message}")]
    UpstreamData { source_name: String, message: String },

    #[error("Rate limit exceeded for {identity}; retry in {retry_after_secs}s")]
    ThrottleExceeded { identity: String, retry_after_secs: i64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ratio_of_empty_market_is_neutral() {
        let m = MarketSnapshot::sample(0, 0, dec!(0));
        assert!(!m.has_activity());
        assert_eq!(m.option_a_ratio(), 0.5);
        assert_eq!(m.option_b_ratio(), 0.5);
    }

    #[test]
    fn test_ratios_sum_to_one() {
        let m = MarketSnapshot::sample(85, 15, dec!(15000));
        assert!(m.has_activity());
        assert!((m.option_a_ratio() - 0.85).abs() < 1e-12);
        assert!((m.option_a_ratio() + m.option_b_ratio() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_ratio_clamps_and_neutralizes_nan() {
        assert_eq!(normalize_ratio(1.7), 1.0);
        assert_eq!(normalize_ratio(-0.2), 0.0);
        assert_eq!(normalize_ratio(f64::NAN), 0.5);
    }

    #[test]
    fn test_bias_signal_from_ratio() {
        let b = BiasSignal::from_ratio(0.85);
        assert_eq!(b.favored, Some(OptionSide::A));
        assert!((b.strength - 0.7).abs() < 1e-12);

        let b = BiasSignal::from_ratio(0.2);
        assert_eq!(b.favored, Some(OptionSide::B));

        assert_eq!(BiasSignal::from_ratio(0.5), BiasSignal::neutral());
    }

    #[test]
    fn test_risk_level_ordering_and_escalation() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::Low.escalate(), RiskLevel::Medium);
        assert_eq!(RiskLevel::High.escalate(), RiskLevel::High);
    }

    #[test]
    fn test_action_tags() {
        assert_eq!(Action::from_tag("buy_b"), Some(Action::BuyB));
        assert_eq!(Action::from_tag("SELL"), None);
        assert_eq!(Action::BuyA.to_string(), "BUY_A");
        assert_eq!(serde_json::to_string(&Action::BuyB).unwrap(), "\"BUY_B\"");
        assert_eq!(OptionSide::A.opposite().buy(), Action::BuyB);
    }

    #[test]
    fn test_risk_level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn test_recommendation_actionable() {
        let rec = Recommendation {
            market_id: "m1".into(),
            recommendation: Action::BuyB,
            confidence: 0.7,
            reasoning: String::new(),
            risk_level: RiskLevel::Low,
            expected_value: 1.5,
            factors: Vec::new(),
            bias: BiasSignal::neutral(),
            path: AnalysisPath::Heuristic,
            timestamp: Utc::now(),
        };
        assert!(rec.is_actionable(0.6));
        assert!(!rec.is_actionable(0.8));
        assert!((rec.expected_return_pct() - 50.0).abs() < 1e-9);

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["marketId"], "m1");
        assert_eq!(json["riskLevel"], "low");
    }

    #[test]
    fn test_snapshot_display() {
        let m = MarketSnapshot::sample(3, 1, dec!(1234.567));
        let s = m.to_string();
        assert!(s.contains("test-001"));
        assert!(s.contains("75%"));
        assert!(s.contains("1234.57"));
    }
}
