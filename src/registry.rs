//! Process-wide coordination shared by every tracker
//!
//! The registry owns the rate gate, the active tracker set and the in-flight
//! claim. One instance is created by the host and handed to each coordinator
//! through an `Arc`.
//!
//! ```text
//! tick(now) ──► decide() ──┬─ Throttled / WaitTurn / Pending / Inactive ──► cached data
//!                          └─ FirstEver / Fetch(permit) ──► HTTP ──► permit.complete(now)
//!                                                              └─ error: permit dropped
//! ```
//!
//! Every method takes the lock for a short synchronous section only. The
//! network call happens while holding a [`FetchPermit`], never the lock.

use crate::{
    rate_gate::RateGate,
    sequencer::{next_turn_holder, FairnessSequencer},
    types::TrackerId,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
struct RegistryState {
    gate: RateGate,
    sequencer: FairnessSequencer,
    in_flight: Option<TrackerId>,
}

/// Point-in-time copy of the registry state
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySnapshot {
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub last_fetch_tracker: Option<TrackerId>,
    pub active: Vec<TrackerId>,
    pub in_flight: Option<TrackerId>,
}

/// Outcome of asking the registry whether a tracker may fetch now
#[derive(Debug)]
pub enum TickDecision<'a> {
    /// Nothing was ever fetched, go ahead
    FirstEver(FetchPermit<'a>),
    /// Spacing elapsed and it is this tracker's turn
    Fetch(FetchPermit<'a>),
    /// Too soon after the last fetch of any tracker
    Throttled,
    /// Spacing elapsed but another tracker is due
    WaitTurn { holder: Option<TrackerId> },
    /// Another tracker's fetch is still in flight
    Pending { fetching: TrackerId },
    /// The tracker is not registered (anymore)
    Inactive,
}

impl TickDecision<'_> {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            TickDecision::FirstEver(_) => "first_ever",
            TickDecision::Fetch(_) => "fetch",
            TickDecision::Throttled => "throttled",
            TickDecision::WaitTurn { .. } => "wait_turn",
            TickDecision::Pending { .. } => "pending",
            TickDecision::Inactive => "inactive",
        }
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, TickDecision::FirstEver(_) | TickDecision::Fetch(_))
    }
}

/// Owner of all state shared between trackers
#[derive(Debug, Default)]
pub struct CoordinationRegistry {
    state: Mutex<RegistryState>,
}

impl CoordinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new tracker and returns its id
    pub fn register(&self) -> TrackerId {
        let mut state = self.state.lock();
        let id = state.sequencer.register();
        tracing::debug!(tracker_id = %id, active = state.sequencer.len(), "Tracker registered");
        id
    }

    /// Removes a tracker from the rotation
    ///
    /// If it was the last to fetch, the next decision restarts the rotation at
    /// the smallest remaining id. Returns false if the id was not active.
    pub fn unregister(&self, id: TrackerId) -> bool {
        let mut state = self.state.lock();
        let removed = state.sequencer.unregister(id);
        if state.gate.last_fetch_tracker() == Some(id) {
            state.gate.clear_tracker();
        }
        tracing::debug!(tracker_id = %id, removed, active = state.sequencer.len(), "Tracker unregistered");
        removed
    }

    pub fn is_active(&self, id: TrackerId) -> bool {
        self.state.lock().sequencer.is_active(id)
    }

    /// Tracker that would be allowed to fetch next
    pub fn next_turn_holder(&self) -> Option<TrackerId> {
        let state = self.state.lock();
        next_turn_holder(state.sequencer.active(), state.gate.last_fetch_tracker())
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.lock();
        RegistrySnapshot {
            last_fetch_time: state.gate.last_fetch_time(),
            last_fetch_tracker: state.gate.last_fetch_tracker(),
            active: state.sequencer.active().iter().copied().collect(),
            in_flight: state.in_flight,
        }
    }

    /// Decides what `tracker` should do on a tick at `now`
    ///
    /// A fetch decision claims the in-flight slot; it is released when the
    /// returned permit is completed or dropped.
    pub fn decide(&self, tracker: TrackerId, now: DateTime<Utc>, min_spacing: Duration) -> TickDecision<'_> {
        let mut state = self.state.lock();

        if !state.sequencer.is_active(tracker) {
            return TickDecision::Inactive;
        }

        if let Some(fetching) = state.in_flight {
            return TickDecision::Pending { fetching };
        }

        if !state.gate.has_fetched() {
            state.in_flight = Some(tracker);
            return TickDecision::FirstEver(FetchPermit::new(self, tracker));
        }

        if state.gate.should_throttle(now, min_spacing) {
            return TickDecision::Throttled;
        }

        let holder = next_turn_holder(state.sequencer.active(), state.gate.last_fetch_tracker());
        if holder != Some(tracker) {
            return TickDecision::WaitTurn { holder };
        }

        state.in_flight = Some(tracker);
        TickDecision::Fetch(FetchPermit::new(self, tracker))
    }

    fn complete_fetch(&self, tracker: TrackerId, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        // A tracker removed mid-fetch still consumed the slot but cannot hold the turn
        let holder = state.sequencer.is_active(tracker).then_some(tracker);
        state.gate.record_fetch(now, holder);
        if state.in_flight == Some(tracker) {
            state.in_flight = None;
        }
    }

    fn release(&self, tracker: TrackerId) {
        let mut state = self.state.lock();
        if state.in_flight == Some(tracker) {
            state.in_flight = None;
        }
    }
}

/// Claim on the single upstream request slot
///
/// Completing the permit records the fetch in the rate gate. Dropping it
/// without completing (failed request, cancelled task) only frees the slot.
#[derive(Debug)]
#[must_use = "dropping a permit releases the fetch slot without recording it"]
pub struct FetchPermit<'a> {
    registry: &'a CoordinationRegistry,
    tracker: TrackerId,
    completed: bool,
}

impl<'a> FetchPermit<'a> {
    fn new(registry: &'a CoordinationRegistry, tracker: TrackerId) -> Self {
        Self {
            registry,
            tracker,
            completed: false,
        }
    }

    pub fn tracker(&self) -> TrackerId {
        self.tracker
    }

    /// Records a successful fetch that started at `now`
    pub fn complete(mut self, now: DateTime<Utc>) {
        self.registry.complete_fetch(self.tracker, now);
        self.completed = true;
    }
}

impl Drop for FetchPermit<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.registry.release(self.tracker);
        }
    }
}
