//! Host-facing facade that manages trackers
//!
//! The hub plays the part of the host platform: it validates configuration,
//! persists the shared spacing, runs each tracker's poll loop and hands out
//! value views.
//!
//! ```no_run
//! use cryptoinfo_sdk::{CryptoInfoHub, TrackerConfig};
//!
//! # async fn example() -> Result<(), cryptoinfo_sdk::Error> {
//! let hub = CryptoInfoHub::open("cryptoinfo.json").await?;
//! let config: TrackerConfig = serde_json::from_str(
//!     r#"{"cryptocurrency_ids":"bitcoin,ethereum","currency_name":"usd",
//!         "multipliers":"1,0.5","update_frequency":1.0}"#,
//! ).unwrap();
//!
//! let tracker = hub.add_tracker(&config).await?;
//! for view in hub.views(tracker)? {
//!     println!("{}: {:?}", view.entity_id(), view.price());
//! }
//! # Ok(())
//! # }
//! ```

use crate::{
    config::{validate_min_time_between_requests, TrackerConfig},
    coordinator::PollCoordinator,
    error::Error,
    provider::MarketDataSource,
    providers::CoinGeckoClient,
    registry::CoordinationRegistry,
    store::SettingsStore,
    types::{PollEvent, TrackerId},
    view::{ValueSnapshot, ValueView},
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

struct TrackerHandle {
    coordinator: Arc<PollCoordinator>,
    views: Vec<ValueView>,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    fn stop(self) {
        self.task.abort();
        self.coordinator.unregister();
    }
}

/// Manages every tracker of the process
pub struct CryptoInfoHub {
    registry: Arc<CoordinationRegistry>,
    source: Arc<dyn MarketDataSource>,
    settings: Arc<SettingsStore>,
    trackers: RwLock<HashMap<TrackerId, TrackerHandle>>,
}

impl CryptoInfoHub {
    /// Creates a hub using the CoinGecko API and settings stored at `settings_path`
    pub async fn open(settings_path: impl Into<PathBuf>) -> Result<Self, Error> {
        let source = Arc::new(CoinGeckoClient::new()?);
        let settings = SettingsStore::load(settings_path).await?;
        Ok(Self::new(source, settings))
    }

    /// Creates a hub with a custom data source
    pub fn new(source: Arc<dyn MarketDataSource>, settings: SettingsStore) -> Self {
        Self {
            registry: Arc::new(CoordinationRegistry::new()),
            source,
            settings: Arc::new(settings),
            trackers: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<CoordinationRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// Validates and starts a tracker
    ///
    /// The tracker is refreshed once before this returns. If that refresh
    /// fails the tracker is discarded and the upstream error returned. A
    /// configured spacing is persisted only after the refresh succeeded; if
    /// saving it fails the tracker is discarded as well.
    pub async fn add_tracker(&self, config: &TrackerConfig) -> Result<TrackerId, Error> {
        let spec = config.parse()?;
        let configured_minutes = spec.min_time_between_requests;
        let min_spacing = match configured_minutes {
            Some(minutes) => validate_min_time_between_requests(minutes)?,
            None => self.settings.min_spacing(),
        };

        let coordinator = Arc::new(PollCoordinator::new(
            spec,
            min_spacing,
            self.registry.clone(),
            self.source.clone(),
        ));
        let id = coordinator.id();

        if let Err(e) = coordinator.tick(Utc::now()).await {
            tracing::warn!(tracker_id = %id, error = %e, "First refresh failed, discarding tracker");
            coordinator.unregister();
            return Err(e.into());
        }

        if let Some(minutes) = configured_minutes {
            if let Err(e) = self.settings.set_min_time_between_requests(minutes).await {
                tracing::warn!(tracker_id = %id, error = %e, "Could not persist spacing, discarding tracker");
                coordinator.unregister();
                return Err(e.into());
            }
        }

        let views: Vec<ValueView> = coordinator
            .spec()
            .views
            .iter()
            .map(|view| ValueView::new(coordinator.clone(), view.clone()))
            .collect();
        let task = coordinator.spawn();

        tracing::info!(
            tracker_id = %id,
            name = %coordinator.spec().name,
            views = views.len(),
            "Tracker added"
        );

        self.trackers.write().insert(
            id,
            TrackerHandle {
                coordinator,
                views,
                task,
            },
        );

        Ok(id)
    }

    /// Stops a tracker and removes it from the rotation
    pub fn remove_tracker(&self, id: TrackerId) -> Result<(), Error> {
        let handle = self
            .trackers
            .write()
            .remove(&id)
            .ok_or(Error::UnknownTracker(id))?;
        handle.stop();

        tracing::info!(tracker_id = %id, "Tracker removed");
        Ok(())
    }

    /// Replaces a tracker with a new configuration
    ///
    /// The replacement gets a fresh id. An invalid configuration leaves the
    /// existing tracker running.
    pub async fn reconfigure(&self, id: TrackerId, config: &TrackerConfig) -> Result<TrackerId, Error> {
        config.parse()?;
        self.remove_tracker(id)?;
        self.add_tracker(config).await
    }

    /// Ids of all running trackers, ascending
    pub fn tracker_ids(&self) -> Vec<TrackerId> {
        let mut ids: Vec<_> = self.trackers.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn coordinator(&self, id: TrackerId) -> Option<Arc<PollCoordinator>> {
        self.trackers.read().get(&id).map(|h| h.coordinator.clone())
    }

    /// Value views of one tracker
    pub fn views(&self, id: TrackerId) -> Result<Vec<ValueView>, Error> {
        self.trackers
            .read()
            .get(&id)
            .map(|h| h.views.clone())
            .ok_or(Error::UnknownTracker(id))
    }

    /// Snapshots of every view, sorted by entity id
    pub fn snapshots(&self) -> Vec<ValueSnapshot> {
        let now = Utc::now();
        let mut snapshots: Vec<_> = self
            .trackers
            .read()
            .values()
            .flat_map(|h| h.views.iter().map(|v| v.snapshot_at(now)))
            .collect();
        snapshots.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        snapshots
    }

    /// Subscribes to one tracker's events
    pub fn subscribe(&self, id: TrackerId) -> Result<broadcast::Receiver<PollEvent>, Error> {
        self.trackers
            .read()
            .get(&id)
            .map(|h| h.coordinator.subscribe())
            .ok_or(Error::UnknownTracker(id))
    }

    /// Stops every tracker and saves the shared settings
    pub async fn shutdown(&self) -> Result<(), Error> {
        let handles: Vec<_> = self.trackers.write().drain().map(|(_, h)| h).collect();
        let count = handles.len();
        for handle in handles {
            handle.stop();
        }

        self.settings.save().await?;
        tracing::info!(trackers = count, "Hub shut down");
        Ok(())
    }
}

impl Drop for CryptoInfoHub {
    fn drop(&mut self) {
        for (_, handle) in self.trackers.get_mut().drain() {
            handle.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::provider::mock::MockSource;
    use crate::store::SharedSettings;

    fn config(ids: &str, multipliers: &str) -> TrackerConfig {
        TrackerConfig {
            id: String::new(),
            cryptocurrency_ids: ids.to_string(),
            currency_name: "usd".to_string(),
            multipliers: multipliers.to_string(),
            unit_of_measurement: "$".to_string(),
            update_frequency: 1.0,
            min_time_between_requests: None,
        }
    }

    fn hub(source: &Arc<MockSource>) -> CryptoInfoHub {
        CryptoInfoHub::new(source.clone(), SettingsStore::in_memory(SharedSettings::default()))
    }

    #[tokio::test]
    async fn test_add_tracker_refreshes_once() {
        let source = Arc::new(MockSource::new());
        source.set_price("bitcoin", 64000.0);
        let hub = hub(&source);

        let id = hub.add_tracker(&config("bitcoin,doge-delisted", "2,1")).await.unwrap();
        let views = hub.views(id).unwrap();

        assert_eq!(source.call_count(), 1);
        assert_eq!(views[0].price(), Some(128000.0));
        assert_eq!(views[1].price(), None);
        assert_eq!(hub.snapshots().len(), 2);
        hub.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_tracker_waits_for_spacing() {
        let source = Arc::new(MockSource::new());
        source.set_price("bitcoin", 64000.0);
        source.set_price("ethereum", 3100.0);
        let hub = hub(&source);

        let a = hub.add_tracker(&config("bitcoin", "1")).await.unwrap();
        let b = hub.add_tracker(&config("ethereum", "1")).await.unwrap();

        assert_eq!(source.call_count(), 1);
        assert!(hub.views(a).unwrap()[0].price().is_some());
        assert!(hub.views(b).unwrap()[0].snapshot().stale);
        assert_eq!(hub.registry().next_turn_holder(), Some(b));
        hub.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_never_registers() {
        let source = Arc::new(MockSource::new());
        let hub = hub(&source);

        let err = hub.add_tracker(&config("bitcoin,ethereum", "1")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MismatchedValues {
                crypto_count: 2,
                multiplier_count: 1
            })
        ));
        assert!(hub.registry().snapshot().active.is_empty());
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_first_refresh_discards_tracker() {
        let source = Arc::new(MockSource::new());
        source.set_failure(Some("down"));
        let hub = hub(&source);

        let err = hub.add_tracker(&config("bitcoin", "1")).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert!(hub.tracker_ids().is_empty());
        assert!(hub.registry().snapshot().active.is_empty());
        assert_eq!(hub.registry().snapshot().last_fetch_time, None);
    }

    #[tokio::test]
    async fn test_failed_first_refresh_keeps_stored_spacing() {
        let source = Arc::new(MockSource::new());
        source.set_failure(Some("down"));
        let hub = hub(&source);

        let mut spaced = config("bitcoin", "1");
        spaced.min_time_between_requests = Some(0.25);
        assert!(hub.add_tracker(&spaced).await.is_err());

        assert_eq!(hub.settings().min_time_between_requests(), 1.0);
        assert_eq!(hub.settings().min_spacing().as_secs(), 60);
    }

    #[tokio::test]
    async fn test_unsaved_spacing_discards_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("cryptoinfo.json");
        let source = Arc::new(MockSource::new());
        source.set_price("bitcoin", 64000.0);
        let hub = CryptoInfoHub::new(source.clone(), SettingsStore::load(&path).await.unwrap());

        // A regular file where the settings directory should be
        std::fs::write(dir.path().join("sub"), "").unwrap();

        let mut spaced = config("bitcoin", "1");
        spaced.min_time_between_requests = Some(0.25);
        let err = hub.add_tracker(&spaced).await.unwrap_err();

        assert!(matches!(err, Error::Settings(_)));
        assert!(hub.tracker_ids().is_empty());
        assert!(hub.registry().snapshot().active.is_empty());
        assert_eq!(hub.settings().min_time_between_requests(), 1.0);
    }

    #[tokio::test]
    async fn test_reconfigure_assigns_new_id_and_persists_spacing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cryptoinfo.json");
        let source = Arc::new(MockSource::new());
        source.set_price("bitcoin", 64000.0);
        let hub = CryptoInfoHub::new(source.clone(), SettingsStore::load(&path).await.unwrap());

        let old = hub.add_tracker(&config("bitcoin", "1")).await.unwrap();
        let mut updated = config("bitcoin", "3");
        updated.min_time_between_requests = Some(0.25);
        let new = hub.reconfigure(old, &updated).await.unwrap();

        assert_ne!(old, new);
        assert_eq!(hub.tracker_ids(), vec![new]);
        assert!(matches!(hub.views(old), Err(Error::UnknownTracker(_))));
        assert_eq!(hub.coordinator(new).unwrap().min_spacing().as_secs(), 15);

        let reloaded = SettingsStore::load(&path).await.unwrap();
        assert_eq!(reloaded.min_time_between_requests(), 0.25);
        hub.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconfigure_with_bad_config_keeps_tracker() {
        let source = Arc::new(MockSource::new());
        source.set_price("bitcoin", 64000.0);
        let hub = hub(&source);

        let id = hub.add_tracker(&config("bitcoin", "1")).await.unwrap();
        assert!(hub.reconfigure(id, &config("bitcoin", "1,2")).await.is_err());
        assert_eq!(hub.tracker_ids(), vec![id]);
        hub.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_unknown_tracker() {
        let source = Arc::new(MockSource::new());
        let hub = hub(&source);
        assert!(matches!(
            hub.remove_tracker(TrackerId(7)),
            Err(Error::UnknownTracker(TrackerId(7)))
        ));
    }

    #[tokio::test]
    async fn test_removing_last_holder_rotates_to_remaining() {
        let source = Arc::new(MockSource::new());
        source.set_price("bitcoin", 64000.0);
        let hub = hub(&source);

        let a = hub.add_tracker(&config("bitcoin", "1")).await.unwrap();
        let b = hub.add_tracker(&config("bitcoin", "2")).await.unwrap();
        hub.remove_tracker(a).unwrap();

        let snapshot = hub.registry().snapshot();
        assert_eq!(snapshot.active, vec![b]);
        assert_eq!(snapshot.last_fetch_tracker, None);
        assert_eq!(hub.registry().next_turn_holder(), Some(b));
        hub.shutdown().await.unwrap();
    }
}
