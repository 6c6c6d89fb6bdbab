//! Per-tracker polling
//!
//! A [`PollCoordinator`] owns one tracker's cached dataset. Each tick asks the
//! shared [`CoordinationRegistry`] whether this tracker may call the upstream
//! API now. If it may not, the tick returns the cached dataset untouched.

use crate::{
    config::TrackerSpec,
    constants::{EVENT_CHANNEL_CAPACITY, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS},
    error::UpstreamError,
    provider::MarketDataSource,
    registry::{CoordinationRegistry, TickDecision},
    types::{CachedDataset, PollEvent, TrackerId},
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Upstream was called and the cached dataset replaced
    Fetched,
    /// Too soon after the last fetch of any tracker
    Throttled,
    /// Another tracker is due
    WaitTurn,
    /// Another tracker is fetching right now
    Pending,
    /// The tracker has been removed
    Inactive,
}

/// Result of a successful tick
#[derive(Debug, Clone)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Dataset after the tick, `None` until the first successful fetch
    pub dataset: Option<Arc<CachedDataset>>,
}

/// Polls the upstream API for one tracker
pub struct PollCoordinator {
    id: TrackerId,
    spec: TrackerSpec,
    min_spacing: Duration,
    registry: Arc<CoordinationRegistry>,
    source: Arc<dyn MarketDataSource>,
    dataset: RwLock<Option<Arc<CachedDataset>>>,
    events: broadcast::Sender<PollEvent>,
}

impl PollCoordinator {
    /// Creates a coordinator and registers it with the registry
    pub fn new(
        spec: TrackerSpec,
        min_spacing: Duration,
        registry: Arc<CoordinationRegistry>,
        source: Arc<dyn MarketDataSource>,
    ) -> Self {
        let id = registry.register();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            id,
            spec,
            min_spacing,
            registry,
            source,
            dataset: RwLock::new(None),
            events,
        }
    }

    pub fn id(&self) -> TrackerId {
        self.id
    }

    pub fn spec(&self) -> &TrackerSpec {
        &self.spec
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    pub fn poll_interval(&self) -> Duration {
        self.spec.poll_interval
    }

    /// Last successfully fetched dataset
    pub fn dataset(&self) -> Option<Arc<CachedDataset>> {
        self.dataset.read().clone()
    }

    /// Subscribes to this tracker's update and failure events
    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.events.subscribe()
    }

    /// Removes this tracker from the rotation
    pub fn unregister(&self) -> bool {
        self.registry.unregister(self.id)
    }

    /// Runs one poll cycle at `now`
    ///
    /// A failed fetch is returned as an error and changes nothing: the cached
    /// dataset stays, and neither the spacing slot nor the turn is used up.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, UpstreamError> {
        let decision = self.registry.decide(self.id, now, self.min_spacing);

        let (permit, first_ever) = match decision {
            TickDecision::FirstEver(permit) => (permit, true),
            TickDecision::Fetch(permit) => (permit, false),
            other => {
                tracing::debug!(tracker_id = %self.id, decision = other.label(), "Skipping fetch");
                let outcome = match other {
                    TickDecision::Throttled => TickOutcome::Throttled,
                    TickDecision::WaitTurn { .. } => TickOutcome::WaitTurn,
                    TickDecision::Pending { .. } => TickOutcome::Pending,
                    _ => TickOutcome::Inactive,
                };
                return Ok(TickReport {
                    outcome,
                    dataset: self.dataset(),
                });
            }
        };

        tracing::info!(
            tracker_id = %self.id,
            name = %self.spec.name,
            coins = %self.spec.coin_ids.join(","),
            currency = %self.spec.currency,
            first_ever,
            source = self.source.source_name(),
            "Fetching market data"
        );

        match self
            .source
            .fetch_markets(&self.spec.coin_ids, &self.spec.currency)
            .await
        {
            Ok(entries) => {
                let dataset = Arc::new(CachedDataset::new(entries, now));
                *self.dataset.write() = Some(dataset.clone());
                permit.complete(now);

                let _ = self.events.send(PollEvent::DatasetUpdated {
                    id: Uuid::new_v4(),
                    tracker: self.id,
                    coins: dataset.entries.keys().cloned().collect(),
                    timestamp: now,
                });

                Ok(TickReport {
                    outcome: TickOutcome::Fetched,
                    dataset: Some(dataset),
                })
            }
            Err(e) => {
                drop(permit);
                tracing::warn!(tracker_id = %self.id, error = %e, "Error fetching market data");

                let _ = self.events.send(PollEvent::FetchFailed {
                    id: Uuid::new_v4(),
                    tracker: self.id,
                    error_message: e.to_string(),
                    timestamp: now,
                });

                Err(e)
            }
        }
    }

    /// Starts the periodic poll loop
    ///
    /// The first tick happens one poll interval from now. Failed ticks are
    /// retried with exponential backoff, never waiting longer than the poll
    /// interval. The loop ends once the tracker is unregistered.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);

        tokio::spawn(async move {
            let poll_interval = coordinator.poll_interval();
            let initial_backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
            let mut delay = poll_interval;
            let mut backoff = initial_backoff;

            tracing::info!(
                tracker_id = %coordinator.id,
                poll_interval_secs = poll_interval.as_secs_f64(),
                min_spacing_secs = coordinator.min_spacing.as_secs_f64(),
                "Starting poll loop"
            );

            loop {
                sleep(delay).await;

                match coordinator.tick(Utc::now()).await {
                    Ok(report) if report.outcome == TickOutcome::Inactive => {
                        tracing::info!(tracker_id = %coordinator.id, "Tracker removed, stopping poll loop");
                        break;
                    }
                    Ok(_) => {
                        delay = poll_interval;
                        backoff = initial_backoff;
                    }
                    Err(e) => {
                        delay = backoff.min(poll_interval);
                        tracing::warn!(
                            tracker_id = %coordinator.id,
                            error = %e,
                            retry_in_ms = delay.as_millis() as u64,
                            "Tick failed, retrying"
                        );
                        backoff = (backoff * 2).min(Duration::from_millis(MAX_BACKOFF_MS));
                    }
                }
            }
        })
    }
}
