//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section is optional; omitted values fall back to the named defaults of
//! the module that owns them. Secrets (API keys) are referenced by env-var
//! name in the config and resolved at runtime.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::data::pyth::HERMES_ENDPOINT;
use crate::reasoning::{ReasonerConfig, ReasoningConfig};
use crate::strategy::price_context::PriceTarget;
use crate::strategy::risk::RiskConfig;
use crate::throttle::ThrottleConfig;
use crate::types::EngineError;

/// Longest accepted throttle window (30 days).
pub const MAX_THROTTLE_WINDOW_SECS: i64 = 30 * 24 * 3600;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub reasoner: ReasonerConfig,
    pub reasoning: ReasoningConfig,
    pub risk: RiskConfig,
    pub throttle: ThrottleConfig,
    pub oracle: OracleConfig,
    pub api: ApiConfig,
    pub price_targets: Vec<PriceTarget>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            reasoner: ReasonerConfig::default(),
            reasoning: ReasoningConfig::default(),
            risk: RiskConfig::default(),
            throttle: ThrottleConfig::default(),
            oracle: OracleConfig::default(),
            api: ApiConfig::default(),
            price_targets: PriceTarget::defaults(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Directional recommendations at or above this confidence count as
    /// opportunities.
    pub min_confidence: f64,
    /// Markets analyzed by `/query` when nothing matches the query text.
    pub query_fallback_count: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "contrarian-001".to_string(),
            min_confidence: 0.6,
            query_fallback_count: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OracleProvider {
    /// Pyth Hermes REST API.
    Pyth,
    /// Built-in mock price table.
    Static,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OracleConfig {
    pub provider: OracleProvider,
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Env var holding an API key for dedicated Hermes endpoints.
    pub api_key_env: Option<String>,
    /// Extra or overriding asset → feed id mappings.
    pub feeds: HashMap<String, String>,
    /// Assets quoted ahead of each analysis.
    pub assets: Vec<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: OracleProvider::Pyth,
            endpoint: HERMES_ENDPOINT.to_string(),
            timeout_secs: 10,
            api_key_env: None,
            feeds: HashMap::new(),
            assets: vec!["BTC".into(), "ETH".into(), "HBAR".into()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject threshold combinations the engine cannot honor.
    pub fn validate(&self) -> Result<(), EngineError> {
        let r = &self.reasoning;
        if !(0.5..1.0).contains(&r.strong_bias_threshold) {
            return Err(EngineError::Config(format!(
                "reasoning.strong_bias_threshold must be in [0.5, 1.0), got {}",
                r.strong_bias_threshold
            )));
        }
        if r.symbolic_confidence_floor > r.symbolic_confidence_cap {
            return Err(EngineError::Config(
                "reasoning.symbolic_confidence_floor exceeds symbolic_confidence_cap".into(),
            ));
        }
        if !(1..=MAX_THROTTLE_WINDOW_SECS).contains(&self.throttle.window_secs) {
            return Err(EngineError::Config(format!(
                "throttle.window_secs must be in [1, {MAX_THROTTLE_WINDOW_SECS}], got {}",
                self.throttle.window_secs
            )));
        }
        if let Some(t) = self
            .price_targets
            .iter()
            .find(|t| t.target <= 0.0 || t.distance_scale <= 0.0)
        {
            return Err(EngineError::Config(format!(
                "price target for {} needs a positive target and distance_scale",
                t.asset
            )));
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskLevel;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.agent.min_confidence, 0.6);
        assert_eq!(cfg.throttle.max_requests, 30);
        assert_eq!(cfg.throttle.window_secs, 3600);
        assert_eq!(cfg.oracle.provider, OracleProvider::Pyth);
        assert_eq!(cfg.api.port, 8001);
        assert_eq!(cfg.price_targets.len(), 2);
        assert!(cfg.reasoner.symbolic_enabled);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [throttle]
            max_requests = 5

            [reasoning]
            strong_bias_threshold = 0.75

            [oracle]
            provider = "static"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.throttle.max_requests, 5);
        assert_eq!(cfg.throttle.window_secs, 3600);
        assert_eq!(cfg.reasoning.strong_bias_threshold, 0.75);
        assert_eq!(cfg.reasoning.moderate_skew, 0.15);
        assert_eq!(cfg.oracle.provider, OracleProvider::Static);
    }

    #[test]
    fn test_price_targets_table() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [[price_targets]]
            asset = "HBAR"
            target = 1.0
            keywords = ["hbar", "hedera"]
            markers = ["$1"]
            buy_no_above = 300.0
            buy_yes_confidence = 0.7
            buy_no_confidence = 0.6
            wait_confidence = 0.4
            wait_risk = "high"
            distance_scale = 300.0
            secondary = "volatility"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.price_targets.len(), 1);
        let t = &cfg.price_targets[0];
        assert_eq!(t.buy_yes_below, 50.0);
        assert_eq!(t.wait_risk, RiskLevel::High);
        assert!(t.matches("Will Hedera HBAR reach $1 by end of 2024?"));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(AppConfig::from_toml_str("[throttle]\nwindow_secs = 0").is_err());
        assert!(AppConfig::from_toml_str("[throttle]\nwindow_secs = 10000000000000").is_err());
        assert!(AppConfig::from_toml_str("[throttle]\nwindow_secs = 2592000").is_ok());
        assert!(AppConfig::from_toml_str(
            "[reasoning]\nsymbolic_confidence_floor = 0.95"
        )
        .is_err());
        assert!(AppConfig::from_toml_str("[reasoning]\nstrong_bias_threshold = 0.3").is_err());
    }

    #[test]
    fn test_load_shipped_config_file() {
        let cfg = AppConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml")).unwrap();
        assert_eq!(cfg.agent.name, "contrarian-001");
        assert!(cfg.reasoning.heuristic_confidence_cap < cfg.reasoning.symbolic_confidence_cap);
        assert_eq!(cfg.reasoning.seed_high_risk_below, dec!(1000));
        assert_eq!(cfg.reasoning.seed_low_risk_above, dec!(10000));
        assert_eq!(cfg.price_targets.len(), 2);
        assert_eq!(cfg.price_targets[0].asset, "BTC");
        assert_eq!(cfg.price_targets[1].target, 7000.0);
        assert_eq!(cfg.price_targets[1].wait_risk, RiskLevel::High);
    }

    #[test]
    fn test_resolve_env() {
        std::env::set_var("CONTRARIAN_TEST_RESOLVE", "value");
        assert_eq!(AppConfig::resolve_env("CONTRARIAN_TEST_RESOLVE").unwrap(), "value");
        assert!(AppConfig::resolve_env("CONTRARIAN_TEST_RESOLVE_UNSET").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(AppConfig::load("does-not-exist.toml").is_err());
    }
}
