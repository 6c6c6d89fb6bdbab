//! Shared minimum spacing between upstream requests

use crate::{constants::THROTTLE_GRACE_MS, types::TrackerId};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Time and author of the last successful upstream fetch
///
/// Only ever written after a fetch succeeded. Failed or skipped fetches
/// leave it untouched, so a failing tracker cannot use up a slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateGate {
    last_fetch_time: Option<DateTime<Utc>>,
    last_fetch_tracker: Option<TrackerId>,
}

impl RateGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any tracker has completed a fetch
    pub fn has_fetched(&self) -> bool {
        self.last_fetch_time.is_some()
    }

    pub fn last_fetch_time(&self) -> Option<DateTime<Utc>> {
        self.last_fetch_time
    }

    pub fn last_fetch_tracker(&self) -> Option<TrackerId> {
        self.last_fetch_tracker
    }

    /// Returns true if a fetch at `now` would come too soon after the last one
    ///
    /// The one second grace keeps a tick that fires a hair early from waiting a
    /// whole extra interval. A `now` before the last fetch counts as no time
    /// elapsed.
    pub fn should_throttle(&self, now: DateTime<Utc>, min_spacing: Duration) -> bool {
        match self.last_fetch_time {
            None => false,
            Some(last) => {
                let elapsed = now.signed_duration_since(last).to_std().unwrap_or_default();
                elapsed + Duration::from_millis(THROTTLE_GRACE_MS) < min_spacing
            }
        }
    }

    /// Records a successful fetch
    pub fn record_fetch(&mut self, now: DateTime<Utc>, tracker: Option<TrackerId>) {
        self.last_fetch_time = Some(now);
        self.last_fetch_tracker = tracker;
    }

    /// Forgets the last fetch author without touching the timestamp
    pub fn clear_tracker(&mut self) {
        self.last_fetch_tracker = None;
    }
}
