//! Deterministic market source.
//!
//! Serves a fixed set of sample markets whose deadlines are anchored to a
//! given instant, so repeated fetches return identical snapshots.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::MarketDataSource;
use crate::types::MarketSnapshot;

struct SampleMarket {
    title: &'static str,
    option_a: &'static str,
    option_b: &'static str,
    a_shares: u64,
    b_shares: u64,
    pool: Decimal,
    days: i64,
}

const SAMPLES: &[SampleMarket] = &[
    SampleMarket {
        title: "Will Bitcoin reach $150,000 by December 31, 2025?",
        option_a: "Yes - BTC will hit $150K",
        option_b: "No - BTC stays below $150K",
        a_shares: 0,
        b_shares: 0,
        pool: dec!(0),
        days: 75,
    },
    SampleMarket {
        title: "Will ETH surpass $10k by Q1 2025?",
        option_a: "Yes",
        option_b: "No",
        a_shares: 850,
        b_shares: 150,
        pool: dec!(15000),
        days: 45,
    },
    SampleMarket {
        title: "Will Hedera HBAR reach $1 by end of 2024?",
        option_a: "Yes",
        option_b: "No",
        a_shares: 200,
        b_shares: 800,
        pool: dec!(2400),
        days: 20,
    },
    SampleMarket {
        title: "Will AI tokens outperform BTC in 2024?",
        option_a: "AI tokens",
        option_b: "BTC",
        a_shares: 680,
        b_shares: 320,
        pool: dec!(3200),
        days: 10,
    },
    SampleMarket {
        title: "Will DeFi TVL exceed $200B by 2025?",
        option_a: "Yes",
        option_b: "No",
        a_shares: 250,
        b_shares: 250,
        pool: dec!(500),
        days: 60,
    },
    SampleMarket {
        title: "Will Ethereum reach $7,000 by end of 2025?",
        option_a: "Yes - ETH will hit $7K",
        option_b: "No - ETH stays below $7K",
        a_shares: 0,
        b_shares: 0,
        pool: dec!(0),
        days: 75,
    },
    SampleMarket {
        title: "Will a major bank adopt CBDC by 2025?",
        option_a: "Yes",
        option_b: "No",
        a_shares: 0,
        b_shares: 0,
        pool: dec!(0),
        days: 1,
    },
];

pub struct MockMarketSource {
    markets: Vec<MarketSnapshot>,
}

impl Default for MockMarketSource {
    fn default() -> Self {
        Self::anchored_at(Utc::now())
    }
}

impl MockMarketSource {
    /// Built-in sample markets with deadlines relative to `anchor`.
    pub fn anchored_at(anchor: DateTime<Utc>) -> Self {
        let markets = SAMPLES
            .iter()
            .enumerate()
            .map(|(i, s)| MarketSnapshot {
                id: (i + 1).to_string(),
                title: s.title.to_string(),
                option_a: s.option_a.to_string(),
                option_b: s.option_b.to_string(),
                option_a_shares: s.a_shares,
                option_b_shares: s.b_shares,
                total_pool: s.pool,
                end_time: anchor + Duration::days(s.days),
            })
            .collect();
        Self { markets }
    }

    /// Serve exactly these markets.
    pub fn from_markets(markets: Vec<MarketSnapshot>) -> Self {
        Self { markets }
    }
}

#[async_trait]
impl MarketDataSource for MockMarketSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_markets(&self) -> Vec<MarketSnapshot> {
        debug!(count = self.markets.len(), "Serving mock markets");
        self.markets.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_is_deterministic() {
        let anchor = Utc::now();
        let source = MockMarketSource::anchored_at(anchor);
        let first = source.fetch_markets().await;
        let second = source.fetch_markets().await;
        assert_eq!(first, second);
        assert_eq!(first.len(), SAMPLES.len());
        assert_eq!(first[0].id, "1");
        assert_eq!(first[0].end_time, anchor + Duration::days(75));
    }

    #[tokio::test]
    async fn test_samples_cover_active_and_idle_markets() {
        let markets = MockMarketSource::default().fetch_markets().await;
        assert!(markets.iter().any(|m| m.has_activity()));
        assert!(markets.iter().any(|m| !m.has_activity()));
        assert!(markets
            .iter()
            .all(|m| (m.option_a_ratio() + m.option_b_ratio() - 1.0).abs() < 1e-12));
    }

    #[tokio::test]
    async fn test_from_markets() {
        let source = MockMarketSource::from_markets(Vec::new());
        assert!(source.fetch_markets().await.is_empty());
    }
}
