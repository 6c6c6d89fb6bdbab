//! Market data source implementations

pub mod coingecko;

pub use coingecko::CoinGeckoClient;
