//! Contrarian reasoning layers.
//!
//! Defines the `ContrarianReasoner` trait and its two implementations:
//! the rule-based `SymbolicEngine` and the always-available
//! `HeuristicEngine`. Which one leads is decided once, at construction,
//! by probing whether the symbolic rule program loads.

pub mod heuristic;
pub mod symbolic;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::{info, warn};

use crate::types::{AnalysisResult, EngineError, MarketSnapshot, RiskLevel};
use heuristic::HeuristicEngine;
use symbolic::SymbolicEngine;

// ---------------------------------------------------------------------------
// Configuration (defaults, overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

/// Ratio above which one side counts as heavily favored.
pub const STRONG_BIAS_THRESHOLD: f64 = 0.7;
/// Distance from 0.5 that counts as a moderate (60/40+) skew.
pub const MODERATE_SKEW: f64 = 0.15;
/// Confidence floor of the symbolic layer when a predicate fires.
pub const SYMBOLIC_CONFIDENCE_FLOOR: f64 = 0.6;
/// Confidence cap of the symbolic layer.
pub const SYMBOLIC_CONFIDENCE_CAP: f64 = 0.9;
/// Confidence cap of the heuristic layer in the strong-bias case.
/// Deliberately distinct from `SYMBOLIC_CONFIDENCE_CAP`.
pub const HEURISTIC_CONFIDENCE_CAP: f64 = 0.8;
/// Fixed confidence of the heuristic moderate tier.
pub const MODERATE_CONFIDENCE: f64 = 0.65;
/// Confidence when no contrarian signal is present.
pub const BASELINE_CONFIDENCE: f64 = 0.5;

/// Thresholds shared by both reasoning layers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub strong_bias_threshold: f64,
    pub moderate_skew: f64,
    pub symbolic_confidence_floor: f64,
    pub symbolic_confidence_cap: f64,
    pub heuristic_confidence_cap: f64,
    pub moderate_confidence: f64,
    pub baseline_confidence: f64,
    /// Below this pool volume the seeded risk tier is high.
    pub seed_high_risk_below: Decimal,
    /// Above this pool volume the seeded risk tier is low.
    pub seed_low_risk_above: Decimal,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            strong_bias_threshold: STRONG_BIAS_THRESHOLD,
            moderate_skew: MODERATE_SKEW,
            symbolic_confidence_floor: SYMBOLIC_CONFIDENCE_FLOOR,
            symbolic_confidence_cap: SYMBOLIC_CONFIDENCE_CAP,
            heuristic_confidence_cap: HEURISTIC_CONFIDENCE_CAP,
            moderate_confidence: MODERATE_CONFIDENCE,
            baseline_confidence: BASELINE_CONFIDENCE,
            seed_high_risk_below: dec!(1000),
            seed_low_risk_above: dec!(10000),
        }
    }
}

impl ReasoningConfig {
    /// Initial risk tier from pool volume alone.
    pub fn seed_risk(&self, total_pool: Decimal) -> RiskLevel {
        if total_pool < self.seed_high_risk_below {
            RiskLevel::High
        } else if total_pool > self.seed_low_risk_above {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    }
}

/// How the symbolic layer should be set up.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    /// Attempt to load the symbolic layer at all.
    pub symbolic_enabled: bool,
    /// Rule program; `None` uses the built-in contrarian rules.
    pub rules: Option<String>,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            symbolic_enabled: true,
            rules: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over odds-based contrarian reasoning.
///
/// Implementors inspect a market with betting activity and return an
/// action, confidence, and signal tier. An `Err` means the layer faulted
/// and the caller should fall back to the heuristic.
pub trait ContrarianReasoner: Send + Sync {
    fn evaluate(&self, market: &MarketSnapshot) -> Result<AnalysisResult, EngineError>;

    /// Reasoner identifier for logging and status reporting.
    fn name(&self) -> &'static str;
}

/// Pick the leading reasoner via a capability probe.
///
/// Returns the symbolic engine when it is enabled and its rule program
/// loads; otherwise the heuristic engine. Never fails.
pub fn select_reasoner(
    reasoner: &ReasonerConfig,
    thresholds: &ReasoningConfig,
) -> Box<dyn ContrarianReasoner> {
    if !reasoner.symbolic_enabled {
        info!("Symbolic reasoner disabled, using heuristic engine");
        return Box::new(HeuristicEngine::new(thresholds.clone()));
    }

    let program = reasoner.rules.as_deref().unwrap_or(symbolic::DEFAULT_RULES);
    match SymbolicEngine::probe(program, thresholds.clone()) {
        Ok(engine) => {
            info!(rules = engine.rule_count(), "Symbolic reasoner loaded");
            Box::new(engine)
        }
        Err(e) => {
            warn!(error = %e, "Symbolic reasoner unavailable, using heuristic engine");
            Box::new(HeuristicEngine::new(thresholds.clone()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
