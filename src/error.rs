//! Error types for the coordinated market poller

use crate::types::TrackerId;
use thiserror::Error;

/// Errors that can occur when fetching market data from the upstream API
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Request URL could not be built
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Body was not the expected JSON array
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,
}

impl UpstreamError {
    /// Maps a transport error, separating timeouts from other failures
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::NetworkError(err)
        }
    }
}

/// Errors in a tracker configuration, raised before the tracker is registered
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The coin id and multiplier lists have different lengths
    #[error(
        "Length mismatch: multipliers ({multiplier_count}) and cryptocurrency ids ({crypto_count}) must have the same length"
    )]
    MismatchedValues {
        crypto_count: usize,
        multiplier_count: usize,
    },

    /// A coin id in the list is empty
    #[error("Cryptocurrency id #{position} is empty")]
    EmptyCoinId { position: usize },

    /// No vs-currency given
    #[error("Currency name must not be empty")]
    EmptyCurrency,

    /// A multiplier is not a finite, non-negative number
    #[error("Invalid multiplier '{value}' for {coin_id}")]
    InvalidMultiplier { coin_id: String, value: String },

    /// The same (coin, multiplier) pair appears twice
    #[error("Duplicate value for {coin_id} with multiplier {multiplier}")]
    DuplicateView { coin_id: String, multiplier: String },

    /// Update frequency must be strictly positive
    #[error("Update frequency must be a positive number of minutes, got {0}")]
    InvalidUpdateFrequency(f64),

    /// Minimum time between requests must be finite and non-negative
    #[error("Minimum time between requests must be zero or more minutes, got {0}")]
    InvalidMinTimeBetweenRequests(f64),
}

/// Errors reading or writing the persisted shared settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File system failure
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings document is not valid JSON of the expected shape
    #[error("Malformed settings document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The stored value cannot be used
    #[error("Invalid setting {key}: {value}")]
    InvalidValue { key: &'static str, value: f64 },
}

/// Crate-level error returned by the hub
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// No tracker is registered under this id
    #[error("Unknown tracker {0}")]
    UnknownTracker(TrackerId),
}
