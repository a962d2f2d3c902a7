//! Risk and factor annotation.
//!
//! Refines the seeded risk tier from pool volume and time to resolution,
//! and attaches the weighted factors that explain a recommendation.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::price_context::{PriceReading, SecondaryFactor};
use crate::types::{FactorEntry, MarketSnapshot, RiskLevel};

// ---------------------------------------------------------------------------
// Configuration (defaults, overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Below this volume slippage dominates.
    pub very_low_volume: f64,
    pub low_volume: f64,
    /// Above this volume liquidity is good enough to lower the risk tier.
    pub high_volume: f64,
    /// Fewer days than this remaining adds time pressure.
    pub time_pressure_days: f64,
    /// More days than this remaining is noted as a long horizon.
    pub long_horizon_days: f64,
    /// Volume at which the liquidity factor saturates.
    pub liquidity_scale: f64,
    /// Volume at which the maturity factor saturates.
    pub maturity_scale: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            very_low_volume: 100.0,
            low_volume: 1_000.0,
            high_volume: 5_000.0,
            time_pressure_days: 1.0,
            long_horizon_days: 30.0,
            liquidity_scale: 2_000.0,
            maturity_scale: 500.0,
        }
    }
}

/// Risk tier plus the notes and factors that justify it.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub risk: RiskLevel,
    pub notes: Vec<String>,
    /// Ordered by descending weight.
    pub factors: Vec<FactorEntry>,
}

// ---------------------------------------------------------------------------
// Annotator
// ---------------------------------------------------------------------------

pub struct RiskAnnotator {
    config: RiskConfig,
}

impl RiskAnnotator {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Annotate a market with betting activity.
    pub fn annotate_active(
        &self,
        market: &MarketSnapshot,
        seeded: RiskLevel,
        expected_value: f64,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let cfg = &self.config;
        let volume = market.volume();
        let mut notes = Vec::new();

        let mut risk = if volume < cfg.very_low_volume {
            notes.push(format!(
                "Very low volume ({volume:.1} PYUSD): low liquidity, high slippage risk."
            ));
            RiskLevel::High
        } else if volume < cfg.low_volume {
            notes.push(format!("Low volume ({volume:.1} PYUSD) increases risk."));
            RiskLevel::High
        } else if volume > cfg.high_volume {
            notes.push(format!(
                "High volume ({volume:.1} PYUSD) provides good liquidity."
            ));
            RiskLevel::Low
        } else {
            notes.push(format!("Moderate volume ({volume:.1} PYUSD)."));
            seeded
        };

        risk = self.apply_time_rule(market, risk, now, &mut notes);

        let bias_strength = (market.option_a_ratio() - 0.5).abs() * 2.0;
        let liquidity = (volume / cfg.liquidity_scale).min(1.0);
        let return_pct = (expected_value - 1.0) * 100.0;
        let factors = vec![
            FactorEntry::new(
                "Contrarian Signal Strength",
                0.4,
                bias_strength,
                format!(
                    "Crowd bias: {:.0}% (higher = better contrarian opportunity)",
                    bias_strength * 100.0
                ),
            ),
            FactorEntry::new(
                "Liquidity & Volume",
                0.3,
                liquidity,
                format!(
                    "Volume: {volume:.1} PYUSD ({:.0}% liquidity score)",
                    liquidity * 100.0
                ),
            ),
            FactorEntry::new(
                "Market Maturity",
                0.2,
                (volume / cfg.maturity_scale).min(1.0),
                "Activity level: Active",
            ),
            FactorEntry::new(
                "Risk-Reward Ratio",
                0.1,
                (expected_value - 1.0).clamp(0.0, 1.0),
                format!("Expected return: {return_pct:.0}%"),
            ),
        ];

        RiskAssessment {
            risk,
            notes,
            factors,
        }
    }

    /// Annotate a market with no betting activity. Volume carries no
    /// signal here; only the time rule applies.
    pub fn annotate_idle(
        &self,
        market: &MarketSnapshot,
        seeded: RiskLevel,
        reading: Option<&PriceReading>,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let mut notes = Vec::new();
        let risk = self.apply_time_rule(market, seeded, now, &mut notes);

        let factors = match reading {
            Some(r) => {
                let secondary = match r.secondary {
                    SecondaryFactor::Momentum => {
                        let favorable = r.distance < 75.0;
                        FactorEntry::new(
                            "Fundamental Analysis",
                            0.2,
                            if favorable { 0.7 } else { 0.3 },
                            format!(
                                "Price momentum: {}",
                                if favorable { "Favorable" } else { "Challenging" }
                            ),
                        )
                    }
                    SecondaryFactor::Volatility => FactorEntry::new(
                        "Volatility Factor",
                        0.2,
                        0.8,
                        format!("{} high volatility = higher upside potential", r.asset),
                    ),
                };
                vec![
                    FactorEntry::new(
                        "Price Distance to Target",
                        0.4,
                        r.closeness(),
                        format!(
                            "{} ${:.0} -> ${:.0} ({:+.1}%)",
                            r.asset, r.reference, r.target, r.distance
                        ),
                    ),
                    FactorEntry::new(
                        "Market Activity",
                        0.3,
                        0.0,
                        "No bets placed yet, fresh market",
                    ),
                    secondary,
                    FactorEntry::new(
                        "Time Horizon",
                        0.1,
                        0.8,
                        format!(
                            "{:.0} days until resolution",
                            market.days_remaining(now).max(0.0)
                        ),
                    ),
                ]
            }
            None => vec![
                FactorEntry::new(
                    "Market Activity",
                    0.5,
                    0.0,
                    "No bets placed yet, high uncertainty",
                ),
                FactorEntry::new(
                    "First Mover Risk",
                    0.3,
                    0.2,
                    "Being first to bet carries additional risk",
                ),
                FactorEntry::new(
                    "Information Advantage",
                    0.2,
                    0.6,
                    "Potential to set initial market direction",
                ),
            ],
        };

        RiskAssessment {
            risk,
            notes,
            factors,
        }
    }

    /// Time pressure can only raise the tier.
    fn apply_time_rule(
        &self,
        market: &MarketSnapshot,
        risk: RiskLevel,
        now: DateTime<Utc>,
        notes: &mut Vec<String>,
    ) -> RiskLevel {
        let days = market.days_remaining(now);
        if days < self.config.time_pressure_days {
            notes.push("Less than 24h remaining, time pressure.".to_string());
            if risk == RiskLevel::Low {
                return RiskLevel::Medium;
            }
        } else if days > self.config.long_horizon_days {
            notes.push(format!("{days:.0} days remaining, plenty of time."));
        }
        risk
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
