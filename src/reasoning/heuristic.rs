//! Threshold-based contrarian heuristic.
//!
//! Always available. Serves as the default reasoner when the symbolic
//! layer is disabled and as its safety net when it faults.

use tracing::debug;

use super::{ContrarianReasoner, ReasoningConfig};
use crate::types::{
    Action, AnalysisPath, AnalysisResult, EngineError, MarketSnapshot, SignalTier,
};

pub struct HeuristicEngine {
    config: ReasoningConfig,
}

impl HeuristicEngine {
    pub fn new(config: ReasoningConfig) -> Self {
        Self { config }
    }

    /// Classify a market's odds. Infallible.
    pub fn analyze(&self, market: &MarketSnapshot) -> AnalysisResult {
        let cfg = &self.config;
        let a = market.option_a_ratio();
        let b = 1.0 - a;

        let (action, confidence, tier, reasoning) = if a > cfg.strong_bias_threshold {
            (
                Action::BuyB,
                ((a - 0.5) * 2.0).min(cfg.heuristic_confidence_cap),
                SignalTier::Strong { underdog_ratio: b },
                format!(
                    "Strong contrarian opportunity: '{}' heavily favored at {:.1}%. \
                     Crowd bias detected, '{}' offers value.",
                    market.option_a,
                    a * 100.0,
                    market.option_b
                ),
            )
        } else if b > cfg.strong_bias_threshold {
            (
                Action::BuyA,
                ((b - 0.5) * 2.0).min(cfg.heuristic_confidence_cap),
                SignalTier::Strong { underdog_ratio: a },
                format!(
                    "Strong contrarian opportunity: '{}' heavily favored at {:.1}%. \
                     Crowd bias detected, '{}' offers value.",
                    market.option_b,
                    b * 100.0,
                    market.option_a
                ),
            )
        } else if (a - 0.5).abs() > cfg.moderate_skew {
            let (favored, favored_ratio, other, action) = if a > 0.5 {
                (&market.option_a, a, &market.option_b, Action::BuyB)
            } else {
                (&market.option_b, b, &market.option_a, Action::BuyA)
            };
            (
                action,
                cfg.moderate_confidence,
                SignalTier::Moderate,
                format!(
                    "Moderate contrarian signal: '{favored}' favored at {:.1}%. \
                     Mild crowd bias suggests '{other}' has value.",
                    favored_ratio * 100.0
                ),
            )
        } else {
            (
                Action::Hold,
                cfg.baseline_confidence,
                SignalTier::Neutral,
                format!(
                    "Balanced market: '{}' {:.1}% vs '{}' {:.1}%. No clear crowd bias, \
                     waiting for a better opportunity.",
                    market.option_a,
                    a * 100.0,
                    market.option_b,
                    b * 100.0
                ),
            )
        };

        debug!(
            market_id = %market.id,
            ratio = format!("{:.3}", a),
            action = %action,
            confidence = format!("{:.2}", confidence),
            "Heuristic analysis"
        );

        AnalysisResult {
            action,
            confidence,
            tier,
            reasoning,
            risk: cfg.seed_risk(market.total_pool),
            path: AnalysisPath::Heuristic,
        }
    }
}

impl ContrarianReasoner for HeuristicEngine {
    fn evaluate(&self, market: &MarketSnapshot) -> Result<AnalysisResult, EngineError> {
        Ok(self.analyze(market))
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
