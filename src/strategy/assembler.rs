//! Recommendation assembly.
//!
//! Pure composition of a reasoning result, its risk assessment, and the
//! bias signal into the final `Recommendation`.

use chrono::{DateTime, Utc};

use super::risk::RiskAssessment;
use crate::types::{AnalysisResult, BiasSignal, MarketSnapshot, Recommendation, SignalTier};

/// Expected value of a moderate contrarian signal.
pub const MODERATE_EXPECTED_VALUE: f64 = 1.2;
/// Expected value when the underdog side holds no shares at all.
pub const EMPTY_UNDERDOG_EXPECTED_VALUE: f64 = 2.0;
/// Breakeven.
pub const NEUTRAL_EXPECTED_VALUE: f64 = 1.0;

/// Expected payoff multiple for a signal tier (1.0 = breakeven).
pub fn expected_value(tier: &SignalTier) -> f64 {
    match tier {
        SignalTier::Strong { underdog_ratio } if *underdog_ratio > 0.0 => 1.0 / underdog_ratio,
        SignalTier::Strong { .. } => EMPTY_UNDERDOG_EXPECTED_VALUE,
        SignalTier::Moderate => MODERATE_EXPECTED_VALUE,
        SignalTier::Neutral => NEUTRAL_EXPECTED_VALUE,
    }
}

pub fn assemble(
    market: &MarketSnapshot,
    result: &AnalysisResult,
    assessment: RiskAssessment,
    bias: BiasSignal,
    now: DateTime<Utc>,
) -> Recommendation {
    let mut reasoning = result.reasoning.clone();
    for note in &assessment.notes {
        reasoning.push(' ');
        reasoning.push_str(note);
    }

    Recommendation {
        market_id: market.id.clone(),
        recommendation: result.action,
        confidence: result.confidence.clamp(0.0, 1.0),
        reasoning,
        risk_level: assessment.risk,
        expected_value: expected_value(&result.tier),
        factors: assessment.factors,
        bias,
        path: result.path,
        timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, AnalysisPath, FactorEntry, RiskLevel};
    use rust_decimal_macros::dec;

    #[test]
    fn test_expected_value_by_tier() {
        let strong = SignalTier::Strong {
            underdog_ratio: 0.15,
        };
        assert!((expected_value(&strong) - 1.0 / 0.15).abs() < 1e-9);
        assert_eq!(
            expected_value(&SignalTier::Strong {
                underdog_ratio: 0.0
            }),
            2.0
        );
        assert_eq!(expected_value(&SignalTier::Moderate), 1.2);
        assert_eq!(expected_value(&SignalTier::Neutral), 1.0);
    }

    #[test]
    fn test_assemble_appends_notes_and_stamps_time() {
        let market = MarketSnapshot::sample(85, 15, dec!(15000));
        let result = AnalysisResult {
            action: Action::BuyB,
            confidence: 0.7,
            tier: SignalTier::Strong {
                underdog_ratio: 0.15,
            },
            reasoning: "Strong signal.".into(),
            risk: RiskLevel::Low,
            path: AnalysisPath::Heuristic,
        };
        let assessment = RiskAssessment {
            risk: RiskLevel::Low,
            notes: vec!["High volume.".into()],
            factors: vec![FactorEntry::new("Contrarian Signal Strength", 0.4, 0.7, "")],
        };
        let now = Utc::now();
        let rec = assemble(&market, &result, assessment, BiasSignal::from_ratio(0.85), now);

        assert_eq!(rec.market_id, "test-001");
        assert_eq!(rec.recommendation, Action::BuyB);
        assert_eq!(rec.reasoning, "Strong signal. High volume.");
        assert_eq!(rec.timestamp, now);
        assert_eq!(rec.factors.len(), 1);
        assert!(rec.expected_value > 6.0);
        // input untouched
        assert_eq!(result.reasoning, "Strong signal.");
    }
}
