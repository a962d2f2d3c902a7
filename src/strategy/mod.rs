//! Analysis pipeline: reasoning, price context, risk, and assembly.

pub mod assembler;
pub mod price_context;
pub mod risk;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::reasoning::heuristic::HeuristicEngine;
use crate::reasoning::{select_reasoner, ContrarianReasoner, ReasonerConfig, ReasoningConfig};
use crate::types::{BiasSignal, MarketSnapshot, PriceMap, Recommendation};
use price_context::{PriceContextAdjuster, PriceTarget};
use risk::{RiskAnnotator, RiskConfig};

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Turns a market snapshot (and already-resolved prices) into a
/// recommendation.
///
/// Pipeline per call:
/// 1. No activity: price-context adjuster supplies the signal.
/// 2. Otherwise the leading reasoner runs; if it faults the heuristic
///    engine answers instead.
/// 3. Risk annotation and assembly always run last.
///
/// Stateless per call and `Send + Sync`; share it behind an `Arc`.
pub struct Analyzer {
    reasoner: Box<dyn ContrarianReasoner>,
    fallback: HeuristicEngine,
    price_context: PriceContextAdjuster,
    annotator: RiskAnnotator,
}

impl Analyzer {
    pub fn new(
        reasoner: Box<dyn ContrarianReasoner>,
        thresholds: ReasoningConfig,
        price_context: PriceContextAdjuster,
        annotator: RiskAnnotator,
    ) -> Self {
        Self {
            reasoner,
            fallback: HeuristicEngine::new(thresholds),
            price_context,
            annotator,
        }
    }

    /// Build the full pipeline from configuration, probing the symbolic
    /// layer once.
    pub fn from_config(
        reasoner: &ReasonerConfig,
        thresholds: &ReasoningConfig,
        risk: RiskConfig,
        targets: Vec<PriceTarget>,
    ) -> Self {
        let leading = select_reasoner(reasoner, thresholds);
        info!(
            reasoner = leading.name(),
            price_targets = targets.len(),
            "Analyzer ready"
        );
        Self::new(
            leading,
            thresholds.clone(),
            PriceContextAdjuster::new(targets),
            RiskAnnotator::new(risk),
        )
    }

    /// Name of the leading reasoner ("symbolic" or "heuristic").
    pub fn reasoner_name(&self) -> &'static str {
        self.reasoner.name()
    }

    pub fn analyze(&self, market: &MarketSnapshot, prices: Option<&PriceMap>) -> Recommendation {
        self.analyze_at(market, prices, Utc::now())
    }

    /// Same as `analyze` with an explicit clock.
    pub fn analyze_at(
        &self,
        market: &MarketSnapshot,
        prices: Option<&PriceMap>,
        now: DateTime<Utc>,
    ) -> Recommendation {
        if !market.has_activity() {
            let outcome = self.price_context.adjust(market, prices, now);
            let bias = match &outcome.reading {
                Some(reading) => BiasSignal {
                    strength: reading.closeness(),
                    favored: outcome.result.action.side(),
                },
                None => BiasSignal::neutral(),
            };
            let assessment = self.annotator.annotate_idle(
                market,
                outcome.result.risk,
                outcome.reading.as_ref(),
                now,
            );
            let rec = assembler::assemble(market, &outcome.result, assessment, bias, now);
            log_recommendation(&rec);
            return rec;
        }

        let result = match self.reasoner.evaluate(market) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    market_id = %market.id,
                    reasoner = self.reasoner.name(),
                    error = %e,
                    "Reasoner failed, falling back to heuristic"
                );
                self.fallback.analyze(market)
            }
        };

        let ev = assembler::expected_value(&result.tier);
        let assessment = self.annotator.annotate_active(market, result.risk, ev, now);
        let bias = BiasSignal::from_ratio(market.option_a_ratio());
        let rec = assembler::assemble(market, &result, assessment, bias, now);
        log_recommendation(&rec);
        rec
    }

    /// Analyze a batch of markets against one price map.
    pub fn analyze_all(
        &self,
        markets: &[MarketSnapshot],
        prices: Option<&PriceMap>,
    ) -> Vec<Recommendation> {
        let now = Utc::now();
        markets
            .iter()
            .map(|m| self.analyze_at(m, prices, now))
            .collect()
    }
}

fn log_recommendation(rec: &Recommendation) {
    debug!(
        market_id = %rec.market_id,
        action = %rec.recommendation,
        confidence = format!("{:.2}", rec.confidence),
        risk = %rec.risk_level,
        ev = format!("{:.2}", rec.expected_value),
        path = %rec.path,
        "Recommendation assembled"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
