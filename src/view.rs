//! Read-only value views over a tracker's cached dataset
//!
//! Views never fetch. Every read projects the coordinator's latest dataset,
//! so a view of a coin the upstream did not return simply has no value.

use crate::{
    config::ViewSpec,
    constants::{ENTITY_DOMAIN, LAST_UPDATE_FORMAT, SENSOR_PREFIX},
    coordinator::PollCoordinator,
    types::{CachedDataset, PriceHorizon, PricedEntry, TrackerId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Multiplied price of `coin_id` in `dataset`, if known
pub fn project_price(dataset: Option<&CachedDataset>, coin_id: &str, multiplier: f64) -> Option<f64> {
    dataset?
        .get(coin_id)?
        .current_price
        .map(|price| price * multiplier)
}

/// Attributes published next to a view's value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueAttributes {
    pub last_update: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub base_price: Option<f64>,
    pub multiplier: Option<f64>,
    #[serde(rename = "24h_volume")]
    pub volume_24h: Option<f64>,
    #[serde(rename = "1h_change")]
    pub change_1h: Option<f64>,
    #[serde(rename = "24h_change")]
    pub change_24h: Option<f64>,
    #[serde(rename = "7d_change")]
    pub change_7d: Option<f64>,
    #[serde(rename = "14d_change")]
    pub change_14d: Option<f64>,
    #[serde(rename = "30d_change")]
    pub change_30d: Option<f64>,
    #[serde(rename = "1y_change")]
    pub change_1y: Option<f64>,
    pub market_cap: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
}

impl ValueAttributes {
    fn empty(last_update: String) -> Self {
        Self {
            last_update,
            name: None,
            symbol: None,
            base_price: None,
            multiplier: None,
            volume_24h: None,
            change_1h: None,
            change_24h: None,
            change_7d: None,
            change_14d: None,
            change_30d: None,
            change_1y: None,
            market_cap: None,
            circulating_supply: None,
            total_supply: None,
        }
    }

    fn from_entry(last_update: String, entry: &PricedEntry, multiplier: f64) -> Self {
        Self {
            last_update,
            name: Some(entry.name.clone()),
            symbol: Some(entry.symbol.clone()),
            base_price: entry.current_price,
            multiplier: Some(multiplier),
            volume_24h: entry.total_volume,
            change_1h: entry.change(PriceHorizon::OneHour),
            change_24h: entry.change(PriceHorizon::OneDay),
            change_7d: entry.change(PriceHorizon::SevenDays),
            change_14d: entry.change(PriceHorizon::FourteenDays),
            change_30d: entry.change(PriceHorizon::ThirtyDays),
            change_1y: entry.change(PriceHorizon::OneYear),
            market_cap: entry.market_cap,
            circulating_supply: entry.circulating_supply,
            total_supply: entry.total_supply,
        }
    }
}

/// Everything a host needs to publish one view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub entity_id: String,
    pub unique_id: String,
    pub tracker: TrackerId,
    /// Multiplied price, `None` when there is no data for the coin
    pub state: Option<f64>,
    pub unit_of_measurement: String,
    pub device_class: String,
    pub state_class: String,
    pub icon: String,
    pub attributes: ValueAttributes,
    /// When the data behind `state` was fetched
    pub fetched_at: Option<DateTime<Utc>>,
    /// True when no data is available for the coin
    pub stale: bool,
}

/// Projection of one (coin, currency, multiplier) tuple
#[derive(Clone)]
pub struct ValueView {
    coordinator: Arc<PollCoordinator>,
    spec: ViewSpec,
    entity_id: String,
    unique_id: String,
}

impl ValueView {
    pub fn new(coordinator: Arc<PollCoordinator>, spec: ViewSpec) -> Self {
        let tracker = coordinator.spec();
        let prefix = if tracker.name.is_empty() {
            SENSOR_PREFIX.to_string()
        } else {
            format!("{}{} ", SENSOR_PREFIX, tracker.name)
        };

        let entity_id = format!(
            "{}.{}{}_{}_{}",
            ENTITY_DOMAIN,
            prefix.to_lowercase().replace(' ', "_"),
            spec.coin_id,
            tracker.currency,
            spec.multiplier_label
        );
        let unique_id = format!(
            "{}{}{}{}",
            prefix, spec.coin_id, tracker.currency, spec.multiplier_label
        );

        Self {
            coordinator,
            spec,
            entity_id,
            unique_id,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn coin_id(&self) -> &str {
        &self.spec.coin_id
    }

    pub fn currency(&self) -> &str {
        &self.coordinator.spec().currency
    }

    pub fn multiplier(&self) -> f64 {
        self.spec.multiplier
    }

    pub fn tracker(&self) -> TrackerId {
        self.coordinator.id()
    }

    /// Current entry for this coin, if the last fetch returned it
    pub fn entry(&self) -> Option<PricedEntry> {
        self.coordinator
            .dataset()?
            .get(&self.spec.coin_id)
            .cloned()
    }

    /// Current multiplied price
    pub fn price(&self) -> Option<f64> {
        project_price(
            self.coordinator.dataset().as_deref(),
            &self.spec.coin_id,
            self.spec.multiplier,
        )
    }

    /// Snapshot of the view as of `now`
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> ValueSnapshot {
        let dataset = self.coordinator.dataset();
        let entry = dataset.as_deref().and_then(|d| d.get(&self.spec.coin_id));
        let last_update = now.format(LAST_UPDATE_FORMAT).to_string();

        let attributes = match entry {
            Some(entry) => ValueAttributes::from_entry(last_update, entry, self.spec.multiplier),
            None => ValueAttributes::empty(last_update),
        };

        ValueSnapshot {
            entity_id: self.entity_id.clone(),
            unique_id: self.unique_id.clone(),
            tracker: self.coordinator.id(),
            state: project_price(dataset.as_deref(), &self.spec.coin_id, self.spec.multiplier),
            unit_of_measurement: self.coordinator.spec().unit_of_measurement.clone(),
            device_class: "monetary".to_string(),
            state_class: "measurement".to_string(),
            icon: "mdi:bitcoin".to_string(),
            attributes,
            fetched_at: entry.and(dataset.as_ref().map(|d| d.fetched_at)),
            stale: entry.is_none(),
        }
    }

    pub fn snapshot(&self) -> ValueSnapshot {
        self.snapshot_at(Utc::now())
    }
}

impl std::fmt::Debug for ValueView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueView")
            .field("entity_id", &self.entity_id)
            .field("tracker", &self.coordinator.id())
            .field("coin_id", &self.spec.coin_id)
            .field("multiplier", &self.spec.multiplier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::provider::mock::MockSource;
    use crate::registry::CoordinationRegistry;
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn tracker(name: &str, ids: &str, multipliers: &str, source: &Arc<MockSource>) -> Arc<PollCoordinator> {
        let spec = TrackerConfig {
            id: name.to_string(),
            cryptocurrency_ids: ids.to_string(),
            currency_name: "usd".to_string(),
            multipliers: multipliers.to_string(),
            unit_of_measurement: "$".to_string(),
            update_frequency: 1.0,
            min_time_between_requests: None,
        }
        .parse()
        .unwrap();

        Arc::new(PollCoordinator::new(
            spec,
            Duration::from_secs(60),
            Arc::new(CoordinationRegistry::new()),
            source.clone(),
        ))
    }

    fn views(coordinator: &Arc<PollCoordinator>) -> Vec<ValueView> {
        coordinator
            .spec()
            .views
            .iter()
            .map(|spec| ValueView::new(coordinator.clone(), spec.clone()))
            .collect()
    }

    #[test]
    fn test_project_price() {
        let mut entries = crate::types::MarketData::new();
        entries.insert("bitcoin".to_string(), MockSource::entry("bitcoin", 100.0));
        let dataset = CachedDataset::new(entries, at(0));

        assert_eq!(project_price(Some(&dataset), "bitcoin", 2.5), Some(250.0));
        assert_eq!(project_price(Some(&dataset), "ethereum", 1.0), None);
        assert_eq!(project_price(None, "bitcoin", 1.0), None);
    }

    #[tokio::test]
    async fn test_delisted_coin_has_no_value() {
        let source = Arc::new(MockSource::new());
        source.set_price("bitcoin", 64000.0);
        let coordinator = tracker("", "bitcoin,doge-delisted", "1,1", &source);
        let views = views(&coordinator);

        assert_eq!(views[0].price(), None);
        coordinator.tick(at(0)).await.unwrap();

        assert_eq!(views[0].price(), Some(64000.0));
        assert_eq!(views[1].price(), None);

        let snapshot = views[1].snapshot_at(at(30));
        assert_eq!(snapshot.state, None);
        assert!(snapshot.stale);
        assert_eq!(snapshot.fetched_at, None);
        assert_eq!(snapshot.attributes.base_price, None);
        assert_eq!(snapshot.attributes.last_update, at(30).format("%d-%m-%Y %H:%M").to_string());
    }

    #[tokio::test]
    async fn test_views_share_one_coordinator() {
        let source = Arc::new(MockSource::new());
        source.set_price("bitcoin", 64000.0);
        let coordinator = tracker("Wallet", "bitcoin,bitcoin", "1,0.5", &source);
        let views = views(&coordinator);

        coordinator.tick(at(0)).await.unwrap();
        assert_eq!(source.call_count(), 1);
        assert_eq!(views[0].price(), Some(64000.0));
        assert_eq!(views[1].price(), Some(32000.0));

        source.set_price("bitcoin", 10.0);
        coordinator.tick(at(61)).await.unwrap();
        assert_eq!(views[1].price(), Some(5.0));
    }

    #[tokio::test]
    async fn test_snapshot_attributes() {
        let source = Arc::new(MockSource::new());
        source.set_price("bitcoin", 200.0);
        let coordinator = tracker("Wallet", "bitcoin", "0.5", &source);
        let view = views(&coordinator).remove(0);

        coordinator.tick(at(0)).await.unwrap();
        let snapshot = view.snapshot_at(at(10));

        assert_eq!(snapshot.state, Some(100.0));
        assert!(!snapshot.stale);
        assert_eq!(snapshot.fetched_at, Some(at(0)));
        assert_eq!(snapshot.unit_of_measurement, "$");
        assert_eq!(snapshot.attributes.base_price, Some(200.0));
        assert_eq!(snapshot.attributes.multiplier, Some(0.5));
        assert_eq!(snapshot.attributes.change_24h, Some(-2.5));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["attributes"]["24h_volume"], 1000.0);
        assert!(json["attributes"]["1y_change"].is_null());
    }

    #[test]
    fn test_identifiers() {
        let source = Arc::new(MockSource::new());
        let named = tracker("My Wallet", "bitcoin", "1", &source);
        let view = views(&named).remove(0);
        assert_eq!(view.entity_id(), "sensor.cryptoinfo_my_wallet_bitcoin_usd_1");
        assert_eq!(view.unique_id(), "Cryptoinfo My Wallet bitcoinusd1");

        let unnamed = tracker("", "ethereum", "0.5", &source);
        let view = views(&unnamed).remove(0);
        assert_eq!(view.entity_id(), "sensor.cryptoinfo_ethereum_usd_0.5");
        assert_eq!(view.unique_id(), "Cryptoinfo ethereumusd0.5");
    }
}
