//! Price-context adjustment for markets without betting activity.
//!
//! With no stake on either side there is no crowd bias to lean against,
//! so the signal comes from how far an external reference price sits from
//! the target named in the market title.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{
    Action, AnalysisPath, AnalysisResult, EngineError, MarketSnapshot, PriceMap, RiskLevel,
    SignalTier,
};

// ---------------------------------------------------------------------------
// Configuration (defaults, overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

/// Confidence of the generic no-activity WAIT.
pub const INSUFFICIENT_SIGNAL_CONFIDENCE: f64 = 0.3;

/// Asset-specific factor reported alongside the price distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryFactor {
    /// Favorable when the target is within reach.
    Momentum,
    /// Fixed upside credit for volatile assets.
    Volatility,
}

/// One recognized price-target market family.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceTarget {
    /// Symbol looked up in the price map, e.g. `BTC`.
    pub asset: String,
    pub target: f64,
    /// Any of these (case-insensitive) must appear in the title.
    pub keywords: Vec<String>,
    /// Any of these must also appear, pinning the market to this target.
    pub markers: Vec<String>,
    /// Distance (percent) below which "yes" is favored.
    #[serde(default = "default_buy_yes_below")]
    pub buy_yes_below: f64,
    /// Distance (percent) above which "no" is favored.
    pub buy_no_above: f64,
    pub buy_yes_confidence: f64,
    pub buy_no_confidence: f64,
    pub wait_confidence: f64,
    pub wait_risk: RiskLevel,
    /// Distance at which the distance factor reaches zero.
    pub distance_scale: f64,
    pub secondary: SecondaryFactor,
}

fn default_buy_yes_below() -> f64 {
    50.0
}

impl PriceTarget {
    /// BTC to $150k.
    pub fn bitcoin() -> Self {
        Self {
            asset: "BTC".into(),
            target: 150_000.0,
            keywords: vec!["bitcoin".into(), "btc".into()],
            markers: vec!["150".into()],
            buy_yes_below: 50.0,
            buy_no_above: 100.0,
            buy_yes_confidence: 0.70,
            buy_no_confidence: 0.60,
            wait_confidence: 0.40,
            wait_risk: RiskLevel::Medium,
            distance_scale: 100.0,
            secondary: SecondaryFactor::Momentum,
        }
    }

    /// ETH to $7k. ETH is more volatile, so the bands are wider.
    pub fn ethereum() -> Self {
        Self {
            asset: "ETH".into(),
            target: 7_000.0,
            keywords: vec!["ethereum".into()],
            markers: vec!["7".into()],
            buy_yes_below: 50.0,
            buy_no_above: 120.0,
            buy_yes_confidence: 0.75,
            buy_no_confidence: 0.65,
            wait_confidence: 0.50,
            wait_risk: RiskLevel::High,
            distance_scale: 120.0,
            secondary: SecondaryFactor::Volatility,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::bitcoin(), Self::ethereum()]
    }

    /// Whether a market title refers to this target.
    pub fn matches(&self, title: &str) -> bool {
        let lower = title.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
            && self.markers.iter().any(|m| lower.contains(&m.to_lowercase()))
    }
}

// ---------------------------------------------------------------------------
// Price reading
// ---------------------------------------------------------------------------

/// Reference price resolved against a recognized target.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceReading {
    pub asset: String,
    pub reference: f64,
    pub target: f64,
    /// `(target - reference) / reference * 100`.
    pub distance: f64,
    pub distance_scale: f64,
    pub secondary: SecondaryFactor,
}

impl PriceReading {
    /// How close the reference is to the target, in [0, 1].
    pub fn closeness(&self) -> f64 {
        (1.0 - self.distance.abs() / self.distance_scale).max(0.0)
    }
}

/// Percent distance from `reference` to `target`.
pub fn distance_to_target(target: f64, reference: f64) -> f64 {
    (target - reference) / reference * 100.0
}

/// Outcome of the price-context path.
#[derive(Debug, Clone)]
pub struct PriceContextOutcome {
    pub result: AnalysisResult,
    /// `None` when the market fell through to the generic WAIT.
    pub reading: Option<PriceReading>,
}

// ---------------------------------------------------------------------------
// Adjuster
// ---------------------------------------------------------------------------

pub struct PriceContextAdjuster {
    targets: Vec<PriceTarget>,
}

impl Default for PriceContextAdjuster {
    fn default() -> Self {
        Self::new(PriceTarget::defaults())
    }
}

impl PriceContextAdjuster {
    pub fn new(targets: Vec<PriceTarget>) -> Self {
        Self { targets }
    }

    /// Find the target this market refers to and read its reference price.
    pub fn resolve(
        &self,
        market: &MarketSnapshot,
        prices: Option<&PriceMap>,
    ) -> Result<(&PriceTarget, PriceReading), EngineError> {
        let target = self
            .targets
            .iter()
            .find(|t| t.matches(&market.title))
            .ok_or_else(|| EngineError::InsufficientSignal {
                market_id: market.id.clone(),
                reason: "no recognized price target in title".into(),
            })?;

        let reference = prices
            .and_then(|p| p.get(&target.asset))
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| EngineError::InsufficientSignal {
                market_id: market.id.clone(),
                reason: format!("no usable {} reference price", target.asset),
            })?;

        let reading = PriceReading {
            asset: target.asset.clone(),
            reference,
            target: target.target,
            distance: distance_to_target(target.target, reference),
            distance_scale: target.distance_scale,
            secondary: target.secondary,
        };
        Ok((target, reading))
    }

    /// Analyze a market with no betting activity. Never consults the
    /// odds-based reasoners.
    pub fn adjust(
        &self,
        market: &MarketSnapshot,
        prices: Option<&PriceMap>,
        now: DateTime<Utc>,
    ) -> PriceContextOutcome {
        let (target, reading) = match self.resolve(market, prices) {
            Ok(found) => found,
            Err(e) => {
                debug!(market_id = %market.id, reason = %e, "Price context unavailable");
                return PriceContextOutcome {
                    result: insufficient_signal(market),
                    reading: None,
                };
            }
        };

        let d = reading.distance;
        let asset = &reading.asset;
        let price = reading.reference;
        let goal = format_usd(reading.target);

        let (action, confidence, risk, reasoning) = if d < target.buy_yes_below {
            (
                Action::BuyA,
                target.buy_yes_confidence,
                RiskLevel::Medium,
                format!(
                    "{asset} analysis: currently at ${price:.0}, only {d:.1}% away from the \
                     {goal} target. Strong fundamental case for '{}'. No crowd bias yet, \
                     good entry opportunity.",
                    market.option_a
                ),
            )
        } else if d > target.buy_no_above {
            (
                Action::BuyB,
                target.buy_no_confidence,
                RiskLevel::Medium,
                format!(
                    "{asset} analysis: at ${price:.0}, needs a {d:.1}% gain to reach {goal}. \
                     Significant challenge ahead, '{}' has value at current levels.",
                    market.option_b
                ),
            )
        } else {
            (
                Action::Wait,
                target.wait_confidence,
                target.wait_risk,
                format!(
                    "{asset} analysis: at ${price:.0}, {d:.1}% from the {goal} target. \
                     Balanced risk/reward, wait for crowd bias or price movement."
                ),
            )
        };

        debug!(
            market_id = %market.id,
            asset = %asset,
            reference = price,
            distance = format!("{:.1}%", d),
            action = %action,
            days_remaining = format!("{:.1}", market.days_remaining(now)),
            "Price-context analysis"
        );

        PriceContextOutcome {
            result: AnalysisResult {
                action,
                confidence,
                tier: SignalTier::Neutral,
                reasoning,
                risk,
                path: AnalysisPath::PriceContext,
            },
            reading: Some(reading),
        }
    }
}

/// Generic WAIT for a fresh market with nothing to anchor on.
fn insufficient_signal(market: &MarketSnapshot) -> AnalysisResult {
    AnalysisResult {
        action: Action::Wait,
        confidence: INSUFFICIENT_SIGNAL_CONFIDENCE,
        tier: SignalTier::Neutral,
        reasoning: format!(
            "No betting activity yet on '{}'. Fresh market with no crowd bias to exploit. \
             Consider being first to bet or wait for activity.",
            market.title
        ),
        risk: RiskLevel::High,
        path: AnalysisPath::PriceContext,
    }
}

fn format_usd(amount: f64) -> String {
    if amount >= 1_000.0 && amount % 1_000.0 == 0.0 {
        format!("${:.0}k", amount / 1_000.0)
    } else {
        format!("${amount}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
