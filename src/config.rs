//! Tracker configuration as entered by the user, and its validated form

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Raw tracker configuration
///
/// Field names match the keys of the settings form. Lists are comma
/// separated strings; intervals are minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Optional display name used in view ids
    #[serde(default)]
    pub id: String,

    /// Comma separated upstream coin ids, e.g. "bitcoin, ethereum"
    pub cryptocurrency_ids: String,

    /// vs-currency code, e.g. "usd"
    pub currency_name: String,

    /// Comma separated multipliers, one per coin id
    pub multipliers: String,

    #[serde(default)]
    pub unit_of_measurement: String,

    /// Tick period in minutes
    pub update_frequency: f64,

    /// Shared spacing in minutes; the persisted value is used when absent
    #[serde(default)]
    pub min_time_between_requests: Option<f64>,
}

/// One (coin, multiplier) pair exposed as a value view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    pub coin_id: String,
    pub multiplier: f64,
    /// Multiplier as entered, used in view identifiers
    pub multiplier_label: String,
}

/// Validated tracker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSpec {
    pub name: String,
    /// Coin ids to request, in first-seen order without duplicates
    pub coin_ids: Vec<String>,
    pub currency: String,
    pub unit_of_measurement: String,
    pub views: Vec<ViewSpec>,
    pub poll_interval: Duration,
    pub min_time_between_requests: Option<f64>,
}

impl TrackerConfig {
    /// Validates the configuration
    ///
    /// Coin ids are trimmed and lowercased. The coin and multiplier lists must
    /// have the same length.
    pub fn parse(&self) -> Result<TrackerSpec, ConfigError> {
        let crypto_ids: Vec<String> = split_list(&self.cryptocurrency_ids)
            .map(|id| id.to_lowercase())
            .collect();
        let multipliers: Vec<&str> = split_list(&self.multipliers).collect();

        if crypto_ids.len() != multipliers.len() {
            return Err(ConfigError::MismatchedValues {
                crypto_count: crypto_ids.len(),
                multiplier_count: multipliers.len(),
            });
        }

        if let Some(position) = crypto_ids.iter().position(|id| id.is_empty()) {
            return Err(ConfigError::EmptyCoinId { position });
        }

        let currency = self.currency_name.trim().to_string();
        if currency.is_empty() {
            return Err(ConfigError::EmptyCurrency);
        }

        let poll_interval = minutes_to_duration(self.update_frequency)
            .filter(|interval| !interval.is_zero())
            .ok_or(ConfigError::InvalidUpdateFrequency(self.update_frequency))?;

        if let Some(minutes) = self.min_time_between_requests {
            validate_min_time_between_requests(minutes)?;
        }

        let mut views = Vec::with_capacity(crypto_ids.len());
        let mut seen_views = HashSet::new();
        let mut coin_ids = Vec::new();

        for (coin_id, label) in crypto_ids.into_iter().zip(multipliers) {
            let multiplier = parse_multiplier(&coin_id, label)?;

            if !seen_views.insert((coin_id.clone(), label.to_string())) {
                return Err(ConfigError::DuplicateView {
                    coin_id,
                    multiplier: label.to_string(),
                });
            }
            if !coin_ids.contains(&coin_id) {
                coin_ids.push(coin_id.clone());
            }

            views.push(ViewSpec {
                coin_id,
                multiplier,
                multiplier_label: label.to_string(),
            });
        }

        Ok(TrackerSpec {
            name: self.id.trim().to_string(),
            coin_ids,
            currency,
            unit_of_measurement: self.unit_of_measurement.trim().to_string(),
            views,
            poll_interval,
            min_time_between_requests: self.min_time_between_requests,
        })
    }
}

/// Checks a shared spacing value in minutes and returns it as a duration
pub fn validate_min_time_between_requests(minutes: f64) -> Result<Duration, ConfigError> {
    minutes_to_duration(minutes).ok_or(ConfigError::InvalidMinTimeBetweenRequests(minutes))
}

/// Converts fractional minutes into a duration
///
/// `None` for negative, non-finite, or values too large for a `Duration`.
pub fn minutes_to_duration(minutes: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(minutes * 60.0).ok()
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim)
}

fn parse_multiplier(coin_id: &str, value: &str) -> Result<f64, ConfigError> {
    match value.parse::<f64>() {
        Ok(m) if m.is_finite() && m >= 0.0 => Ok(m),
        _ => Err(ConfigError::InvalidMultiplier {
            coin_id: coin_id.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ids: &str, multipliers: &str) -> TrackerConfig {
        TrackerConfig {
            id: " Wallet ".to_string(),
            cryptocurrency_ids: ids.to_string(),
            currency_name: " eur ".to_string(),
            multipliers: multipliers.to_string(),
            unit_of_measurement: "€".to_string(),
            update_frequency: 0.5,
            min_time_between_requests: None,
        }
    }

    #[test]
    fn test_parse_normalizes_values() {
        let spec = config(" Bitcoin , ethereum", "1, 0.25").parse().unwrap();

        assert_eq!(spec.name, "Wallet");
        assert_eq!(spec.currency, "eur");
        assert_eq!(spec.coin_ids, vec!["bitcoin", "ethereum"]);
        assert_eq!(spec.views[1].multiplier, 0.25);
        assert_eq!(spec.views[1].multiplier_label, "0.25");
        assert_eq!(spec.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_mismatched_counts_are_rejected() {
        let err = config("bitcoin,ethereum,solana", "1,2").parse().unwrap_err();
        assert_eq!(
            err,
            ConfigError::MismatchedValues {
                crypto_count: 3,
                multiplier_count: 2
            }
        );
    }

    #[test]
    fn test_same_coin_with_two_multipliers_is_one_request_id() {
        let spec = config("bitcoin,bitcoin", "1,0.5").parse().unwrap();
        assert_eq!(spec.coin_ids, vec!["bitcoin"]);
        assert_eq!(spec.views.len(), 2);
    }

    #[test]
    fn test_duplicate_view_is_rejected() {
        let err = config("bitcoin,bitcoin", "1,1").parse().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateView { .. }));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            config("bitcoin,", "1,1").parse(),
            Err(ConfigError::EmptyCoinId { position: 1 })
        ));
        assert!(matches!(
            config("bitcoin", "abc").parse(),
            Err(ConfigError::InvalidMultiplier { .. })
        ));

        let mut zero_frequency = config("bitcoin", "1");
        zero_frequency.update_frequency = 0.0;
        assert!(matches!(
            zero_frequency.parse(),
            Err(ConfigError::InvalidUpdateFrequency(_))
        ));

        let mut negative_spacing = config("bitcoin", "1");
        negative_spacing.min_time_between_requests = Some(-1.0);
        assert!(matches!(
            negative_spacing.parse(),
            Err(ConfigError::InvalidMinTimeBetweenRequests(_))
        ));

        let mut no_currency = config("bitcoin", "1");
        no_currency.currency_name = "  ".to_string();
        assert_eq!(no_currency.parse().unwrap_err(), ConfigError::EmptyCurrency);
    }

    #[test]
    fn test_out_of_range_intervals_are_rejected() {
        let mut huge_frequency = config("bitcoin", "1");
        huge_frequency.update_frequency = 1e300;
        assert_eq!(
            huge_frequency.parse().unwrap_err(),
            ConfigError::InvalidUpdateFrequency(1e300)
        );

        let mut tiny_frequency = config("bitcoin", "1");
        tiny_frequency.update_frequency = 1e-300;
        assert!(matches!(
            tiny_frequency.parse(),
            Err(ConfigError::InvalidUpdateFrequency(_))
        ));

        let mut huge_spacing = config("bitcoin", "1");
        huge_spacing.min_time_between_requests = Some(1e300);
        assert_eq!(
            huge_spacing.parse().unwrap_err(),
            ConfigError::InvalidMinTimeBetweenRequests(1e300)
        );
    }

    #[test]
    fn test_minutes_to_duration() {
        assert_eq!(minutes_to_duration(0.25), Some(Duration::from_secs(15)));
        assert_eq!(minutes_to_duration(0.0), Some(Duration::ZERO));
        assert_eq!(minutes_to_duration(-1.0), None);
        assert_eq!(minutes_to_duration(f64::INFINITY), None);
        assert_eq!(minutes_to_duration(1e300), None);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: TrackerConfig = serde_json::from_str(
            r#"{"cryptocurrency_ids":"bitcoin","currency_name":"usd","multipliers":"1","update_frequency":1}"#,
        )
        .unwrap();

        assert_eq!(config.id, "");
        assert_eq!(config.unit_of_measurement, "");
        assert_eq!(config.min_time_between_requests, None);
        assert!(config.parse().is_ok());
    }
}
