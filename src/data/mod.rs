//! Market and price data collaborators.
//!
//! The engine itself performs no I/O. These traits describe where market
//! snapshots and reference prices come from; the HTTP service resolves
//! them before handing plain values to the `Analyzer`.

pub mod markets;
pub mod prices;
pub mod pyth;

use async_trait::async_trait;

use crate::types::MarketSnapshot;
pub use markets::MockMarketSource;
pub use prices::{PriceQuote, QuoteStatus, StaticOracle};
pub use pyth::PythOracle;

/// Source of market snapshots.
///
/// Never fails past its boundary: implementations log upstream errors and
/// return an empty list.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Source identifier for logging and status reporting.
    fn name(&self) -> &'static str;

    async fn fetch_markets(&self) -> Vec<MarketSnapshot>;
}

/// Source of reference prices.
///
/// Always returns a quote. When the live source is unreachable the quote
/// carries a fallback price and a non-`Live` status.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    fn name(&self) -> &'static str;

    async fn quote(&self, asset: &str) -> PriceQuote;
}
