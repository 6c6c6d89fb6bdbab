//! Constants for the coordinated market poller
//!
//! Everything that is not part of a tracker's own configuration is defined
//! here. The only runtime override is the `COINGECKO_API_URL` environment
//! variable read by [`crate::providers::CoinGeckoClient::new`].

use crate::types::PriceHorizon;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Environment variable overriding [`COINGECKO_API_URL`]
pub const COINGECKO_API_URL_ENV: &str = "COINGECKO_API_URL";

/// CoinGecko API endpoint for batched market data
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// Price change horizons requested when none are configured
pub const DEFAULT_PRICE_CHANGE_HORIZONS: &[PriceHorizon] = &[
    PriceHorizon::OneHour,
    PriceHorizon::OneDay,
    PriceHorizon::SevenDays,
    PriceHorizon::ThirtyDays,
];

/// HTTP request timeout when fetching market data (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "cryptoinfo-sdk/0.1.0";

/// Shared minimum time between upstream requests when nothing is persisted (in minutes)
pub const DEFAULT_MIN_TIME_BETWEEN_REQUESTS_MINUTES: f64 = 1.0;

/// Grace margin subtracted from the shared spacing so a tick firing slightly
/// early does not wait a full extra period (in milliseconds)
pub const THROTTLE_GRACE_MS: u64 = 1000;

/// Initial backoff delay after a failed tick (in milliseconds)
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum backoff delay after failed ticks (in milliseconds)
pub const MAX_BACKOFF_MS: u64 = 30000;

/// Capacity of each tracker's event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Prefix used for view names and identifiers
pub const SENSOR_PREFIX: &str = "Cryptoinfo ";

/// Entity domain prepended to view entity ids
pub const ENTITY_DOMAIN: &str = "sensor";

/// Display format of the `last_update` attribute
pub const LAST_UPDATE_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Key of the persisted settings document
pub const STORAGE_KEY: &str = "cryptoinfo_data";

/// Version of the persisted settings document
pub const STORAGE_VERSION: u32 = 1;
