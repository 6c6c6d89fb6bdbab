//! Source abstraction for fetching market data from the upstream API

use crate::{error::UpstreamError, types::MarketData};
use async_trait::async_trait;

/// Trait for market data sources
///
/// One call fetches every requested coin in a single upstream request.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches market data for `coin_ids` priced in `currency`
    ///
    /// # Arguments
    /// * `coin_ids` - Upstream coin ids, without duplicates
    /// * `currency` - vs-currency code (e.g. "usd")
    ///
    /// # Returns
    /// Entries keyed by coin id. Ids the upstream does not know are simply
    /// missing from the map.
    async fn fetch_markets(
        &self,
        coin_ids: &[String],
        currency: &str,
    ) -> Result<MarketData, UpstreamError>;

    /// Returns the name of this source
    fn source_name(&self) -> &'static str;
}
