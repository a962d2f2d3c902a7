//! Controllable market source for integration testing.
//!
//! Serves a caller-supplied set of markets and can be switched into a
//! failing mode, in which it behaves like an unreachable upstream: the
//! failure is swallowed and an empty list is returned.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use contrarian::data::MarketDataSource;
use contrarian::types::MarketSnapshot;

pub struct ScriptedSource {
    markets: Vec<MarketSnapshot>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(markets: Vec<MarketSnapshot>) -> Self {
        Self {
            markets,
            failing: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent fetch behave like an upstream outage.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_markets(&self) -> Vec<MarketSnapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Vec::new();
        }
        self.markets.clone()
    }
}

/// A market with the given stake split and pool, resolving `days` after
/// `now`.
pub fn market(
    id: &str,
    title: &str,
    a_shares: u64,
    b_shares: u64,
    pool: Decimal,
    now: DateTime<Utc>,
    days: i64,
) -> MarketSnapshot {
    MarketSnapshot {
        id: id.to_string(),
        title: title.to_string(),
        option_a: "Yes".to_string(),
        option_b: "No".to_string(),
        option_a_shares: a_shares,
        option_b_shares: b_shares,
        total_pool: pool,
        end_time: now + Duration::days(days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_failing_source_returns_empty() {
        let now = Utc::now();
        let source = ScriptedSource::new(vec![market("m1", "Test", 1, 1, dec!(10), now, 5)]);
        assert_eq!(source.fetch_markets().await.len(), 1);

        source.set_failing(true);
        assert!(source.fetch_markets().await.is_empty());

        source.set_failing(false);
        assert_eq!(source.fetch_markets().await.len(), 1);
        assert_eq!(source.fetch_count(), 3);
    }
}
