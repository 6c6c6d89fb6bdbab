//! Types shared by the poller, its upstream client and the value views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Identifier of a registered tracker
///
/// Assigned in increasing order by the coordination registry and never
/// handed out twice, even after the tracker is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackerId(pub u64);

impl TrackerId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TrackerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Price change horizons supported by the markets endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceHorizon {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "14d")]
    FourteenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "200d")]
    TwoHundredDays,
    #[serde(rename = "1y")]
    OneYear,
}

impl PriceHorizon {
    /// Get the query parameter token for this horizon
    pub fn as_param(&self) -> &'static str {
        match self {
            PriceHorizon::OneHour => "1h",
            PriceHorizon::OneDay => "24h",
            PriceHorizon::SevenDays => "7d",
            PriceHorizon::FourteenDays => "14d",
            PriceHorizon::ThirtyDays => "30d",
            PriceHorizon::TwoHundredDays => "200d",
            PriceHorizon::OneYear => "1y",
        }
    }

    /// Get all supported horizons
    pub fn all() -> &'static [PriceHorizon] {
        &[
            PriceHorizon::OneHour,
            PriceHorizon::OneDay,
            PriceHorizon::SevenDays,
            PriceHorizon::FourteenDays,
            PriceHorizon::ThirtyDays,
            PriceHorizon::TwoHundredDays,
            PriceHorizon::OneYear,
        ]
    }
}

/// One element of the markets response
///
/// Numeric fields are optional: the API reports `null` for coins without a
/// market cap, an unknown supply, or a horizon that was not requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedEntry {
    /// Upstream coin id (e.g. "bitcoin")
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Ticker symbol
    #[serde(default)]
    pub symbol: String,

    #[serde(default)]
    pub current_price: Option<f64>,

    #[serde(default)]
    pub total_volume: Option<f64>,

    #[serde(default)]
    pub market_cap: Option<f64>,

    #[serde(default)]
    pub circulating_supply: Option<f64>,

    #[serde(default)]
    pub total_supply: Option<f64>,

    #[serde(default, rename = "price_change_percentage_1h_in_currency")]
    pub change_1h: Option<f64>,

    #[serde(default, rename = "price_change_percentage_24h_in_currency")]
    pub change_24h: Option<f64>,

    #[serde(default, rename = "price_change_percentage_7d_in_currency")]
    pub change_7d: Option<f64>,

    #[serde(default, rename = "price_change_percentage_14d_in_currency")]
    pub change_14d: Option<f64>,

    #[serde(default, rename = "price_change_percentage_30d_in_currency")]
    pub change_30d: Option<f64>,

    #[serde(default, rename = "price_change_percentage_200d_in_currency")]
    pub change_200d: Option<f64>,

    #[serde(default, rename = "price_change_percentage_1y_in_currency")]
    pub change_1y: Option<f64>,
}

impl PricedEntry {
    /// Percentage change over the given horizon, if reported
    pub fn change(&self, horizon: PriceHorizon) -> Option<f64> {
        match horizon {
            PriceHorizon::OneHour => self.change_1h,
            PriceHorizon::OneDay => self.change_24h,
            PriceHorizon::SevenDays => self.change_7d,
            PriceHorizon::FourteenDays => self.change_14d,
            PriceHorizon::ThirtyDays => self.change_30d,
            PriceHorizon::TwoHundredDays => self.change_200d,
            PriceHorizon::OneYear => self.change_1y,
        }
    }
}

/// Market data keyed by coin id
pub type MarketData = HashMap<String, PricedEntry>;

/// Result of the last successful fetch of one tracker
#[derive(Debug, Clone)]
pub struct CachedDataset {
    pub entries: MarketData,
    pub fetched_at: DateTime<Utc>,
}

impl CachedDataset {
    pub fn new(entries: MarketData, fetched_at: DateTime<Utc>) -> Self {
        Self { entries, fetched_at }
    }

    pub fn get(&self, coin_id: &str) -> Option<&PricedEntry> {
        self.entries.get(coin_id)
    }

    /// Get the age of the data relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> std::time::Duration {
        now.signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Events published by a tracker's coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollEvent {
    /// A fetch succeeded and the cached dataset was replaced
    DatasetUpdated {
        id: Uuid,
        tracker: TrackerId,
        coins: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A fetch was attempted and failed
    FetchFailed {
        id: Uuid,
        tracker: TrackerId,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl PollEvent {
    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            PollEvent::DatasetUpdated { id, .. } => *id,
            PollEvent::FetchFailed { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            PollEvent::DatasetUpdated { .. } => "DATASET_UPDATED",
            PollEvent::FetchFailed { .. } => "FETCH_FAILED",
        }
    }
}

impl std::fmt::Display for PollEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollEvent::DatasetUpdated { tracker, coins, .. } => {
                write!(f, "Tracker {} updated {} coins", tracker, coins.len())
            }
            PollEvent::FetchFailed {
                tracker,
                error_message,
                ..
            } => {
                write!(f, "Tracker {} fetch failed: {}", tracker, error_message)
            }
        }
    }
}
